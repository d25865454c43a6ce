//! ACS pcodes and encoded instructions.
//!
//! Every instruction is a 32-bit pcode followed by 32-bit immediates, so an
//! instruction's size never depends on its operand values. Layout can be
//! computed before glyphs are resolved.

use crate::error::{CodegenError, CodegenResult};
use acsc_ir::{ExpId, Program};

macro_rules! pcodes {
    ($($name:ident = $num:expr,)*) => {
        /// ACS pcode numbers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Pcode {
            $($name,)*
        }

        impl Pcode {
            pub fn number(self) -> u32 {
                match self {
                    $(Pcode::$name => $num,)*
                }
            }
        }
    };
}

pcodes! {
    Nop = 0,
    Terminate = 1,
    PushNumber = 3,
    LSpec1 = 4,
    LSpec2 = 5,
    LSpec3 = 6,
    LSpec4 = 7,
    LSpec5 = 8,
    Add = 14,
    Subtract = 15,
    Multiply = 16,
    Divide = 17,
    Modulus = 18,
    Eq = 19,
    Ne = 20,
    Lt = 21,
    Gt = 22,
    Le = 23,
    Ge = 24,
    AssignScriptVar = 25,
    AssignMapVar = 26,
    AssignWorldVar = 27,
    PushScriptVar = 28,
    PushMapVar = 29,
    PushWorldVar = 30,
    Goto = 52,
    IfGoto = 53,
    Drop = 54,
    Delay = 55,
    DelayDirect = 56,
    AndLogical = 70,
    OrLogical = 71,
    AndBitwise = 72,
    OrBitwise = 73,
    EorBitwise = 74,
    NegateLogical = 75,
    LShift = 76,
    RShift = 77,
    UnaryMinus = 78,
    IfNotGoto = 79,
    CaseGoto = 84,
    FixedMul = 136,
    FixedDiv = 137,
    PushGlobalVar = 181,
    AssignGlobalVar = 182,
    CallDiscard = 204,
    Call = 203,
    ReturnVoid = 205,
    ReturnVal = 206,
    PushMapArray = 207,
    AssignMapArray = 208,
    Dup = 216,
    Swap = 217,
    TagString = 225,
    PushWorldArray = 226,
    AssignWorldArray = 227,
    PushGlobalArray = 235,
    AssignGlobalArray = 236,
    SetResultValue = 257,
    NegateBinary = 330,
    CallFunc = 351,
    LSpec5Result = 358,
    PushFunction = 380,
    CallStack = 381,
}

/// An instruction immediate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    Word(u32),
    /// Word `word` of an expression's folded value, plus `add`.
    Exp { exp: ExpId, word: u32, add: u32 },
    /// Value of a named glyph.
    Glyph(String),
}

impl Imm {
    pub fn exp(exp: ExpId) -> Self {
        Imm::Exp { exp, word: 0, add: 0 }
    }

    pub fn resolve(&self, prog: &Program) -> CodegenResult<u32> {
        match self {
            Imm::Word(w) => Ok(*w),
            Imm::Exp { exp, word, add } => {
                let words = prog.exps.words_of(*exp, &prog.glyphs)?;
                Ok(words.get(*word as usize).copied().unwrap_or(0).wrapping_add(*add))
            }
            Imm::Glyph(name) => {
                let value = prog
                    .glyphs
                    .get(name)
                    .and_then(|g| g.value)
                    .ok_or_else(|| CodegenError::UnresolvedGlyph(name.clone()))?;
                let words = prog.exps.words_of(value, &prog.glyphs)?;
                Ok(words.first().copied().unwrap_or(0))
            }
        }
    }
}

/// One encoded instruction: a pcode number and its immediates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub code: u32,
    pub args: Vec<Imm>,
}

impl Instr {
    pub fn new(op: Pcode, args: Vec<Imm>) -> Self {
        Self {
            code: op.number(),
            args,
        }
    }

    pub fn op(op: Pcode) -> Self {
        Self::new(op, Vec::new())
    }

    pub fn word(op: Pcode, w: u32) -> Self {
        Self::new(op, vec![Imm::Word(w)])
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> u32 {
        4 + 4 * self.args.len() as u32
    }

    pub fn encode(&self, prog: &Program, out: &mut Vec<u8>) -> CodegenResult<()> {
        out.extend_from_slice(&self.code.to_le_bytes());
        for a in &self.args {
            out.extend_from_slice(&a.resolve(prog)?.to_le_bytes());
        }
        Ok(())
    }
}

/// Total encoded size of `instrs`.
pub fn size_of(instrs: &[Instr]) -> u32 {
    instrs.iter().map(Instr::size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_immediate_count() {
        assert_eq!(Instr::op(Pcode::Drop).size(), 4);
        assert_eq!(Instr::word(Pcode::PushNumber, 7).size(), 8);
        let call = Instr::new(Pcode::CallFunc, vec![Imm::Word(2), Imm::Word(44)]);
        assert_eq!(call.size(), 12);
    }

    #[test]
    fn encodes_little_endian() {
        let prog = Program::new();
        let mut out = Vec::new();
        Instr::word(Pcode::PushNumber, 0x0102_0304).encode(&prog, &mut out).unwrap();
        assert_eq!(out, vec![3, 0, 0, 0, 4, 3, 2, 1]);
    }

    #[test]
    fn unresolved_glyph_is_reported() {
        let prog = Program::new();
        let err = Imm::Glyph("nowhere".into()).resolve(&prog).unwrap_err();
        assert!(matches!(err, CodegenError::UnresolvedGlyph(ref n) if n == "nowhere"));
    }
}
