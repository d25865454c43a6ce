//! Arithmetic helper routines.
//!
//! A statement with no native form at its width becomes a call to
//! `__acsc_<Code>_W<n>`. A few helpers are synthesized here as IR; the rest
//! are declared external and resolved from the runtime library at load time.
//! Synthesized bodies may call other helpers, which legalize then defines in
//! turn.

use acsc_ir::{Arg, Block, CallType, Code, ExpArena, Function, Linkage, Origin, Statement};

/// Allocates automatic storage for a frame.
pub const PLSA: &str = "__acsc_Plsa";

/// Frees the current automatic storage frame.
pub const PLSF: &str = "__acsc_Plsf";

/// Build the helper implementing `code` at `size` words.
pub fn helper(code: Code, size: u32, exps: &mut ExpArena) -> Function {
    let mut f = Function::new(code.helper_name(size));
    f.ctype = CallType::StkCall;
    f.param = code.operand_sizes(size).iter().sum();
    f.retrn = code.result_size(size);
    f.local_reg = f.param;

    let mut b = Body {
        exps,
        func: &mut f,
        block: Block::new(),
    };
    let synthesized = match (code, size) {
        (Code::CmpULt | Code::CmpUGt | Code::CmpULe | Code::CmpUGe, 1) => {
            b.cmp_unsigned_w1(code);
            true
        }
        (Code::ShRU, 1) => {
            b.shru_w1();
            true
        }
        (Code::AddU, 2) => {
            b.addu_w2();
            true
        }
        (Code::SubU, 2) => {
            b.subu_w2();
            true
        }
        (Code::NegI, 2) => {
            b.negi_w2();
            true
        }
        (Code::CmpUEq | Code::CmpUNe, n) if n > 1 => {
            b.cmp_eq_wide(code == Code::CmpUEq, n);
            true
        }
        (
            Code::CmpILt | Code::CmpIGt | Code::CmpILe | Code::CmpIGe | Code::CmpULt | Code::CmpUGt
            | Code::CmpULe | Code::CmpUGe,
            n,
        ) if n > 1 => {
            b.cmp_ordered_wide(code, n);
            true
        }
        _ => false,
    };
    let block = b.block;

    if synthesized {
        f.block = block;
        f.block.seal();
        f.defin = true;
        f.linka = Linkage::IntC;
    } else {
        f.linka = Linkage::ExtC;
    }
    f
}

/// External declaration of an automatic storage helper.
pub fn storage_helper(name: &str) -> Function {
    let mut f = Function::new(name);
    f.ctype = CallType::StkCall;
    f.linka = Linkage::ExtC;
    f.param = u32::from(name == PLSA);
    f
}

// ══════════════════════════════════════════════════════════════════════
// Synthesized bodies
// ══════════════════════════════════════════════════════════════════════

struct Body<'a> {
    exps: &'a mut ExpArena,
    func: &'a mut Function,
    block: Block,
}

impl Body<'_> {
    fn lit(&mut self, v: u32) -> Arg {
        Arg::lit(1, self.exps.lit_u32(v, Origin::none()))
    }

    fn loc(&mut self, i: u32) -> Arg {
        let idx = self.lit(i);
        Arg::loc_reg(1, idx, 0)
    }

    fn add(&mut self, code: Code, size: u32, args: Vec<Arg>) {
        self.block.add(Statement::new(code, size, args, Origin::none()));
    }

    fn retn(&mut self, size: u32) {
        self.add(Code::Retn, size, vec![Arg::stk(size)]);
    }

    /// Flip both sign bits, then compare signed.
    fn cmp_unsigned_w1(&mut self, code: Code) {
        let signed = match code {
            Code::CmpULt => Code::CmpILt,
            Code::CmpUGt => Code::CmpIGt,
            Code::CmpULe => Code::CmpILe,
            _ => Code::CmpIGe,
        };
        for i in 0..2 {
            let a = self.loc(i);
            let sign = self.lit(0x8000_0000);
            self.add(Code::OrXU, 1, vec![Arg::stk(1), a, sign]);
        }
        self.add(signed, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
        self.retn(1);
    }

    /// Arithmetic shift, then clear the copied sign bits.
    fn shru_w1(&mut self) {
        let (a, n) = (self.loc(0), self.loc(1));
        self.add(Code::ShRI, 1, vec![Arg::stk(1), a, n.clone()]);
        let top = self.lit(0x8000_0000);
        self.add(Code::Move, 1, vec![Arg::stk(1), top]);
        self.add(Code::ShRI, 1, vec![Arg::stk(1), Arg::stk(1), n]);
        let one = self.lit(1);
        self.add(Code::ShLU, 1, vec![Arg::stk(1), Arg::stk(1), one]);
        self.add(Code::InvU, 1, vec![Arg::stk(1), Arg::stk(1)]);
        self.add(Code::AndU, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
        self.retn(1);
    }

    /// Low words add; the carry is the low sum wrapping below an addend.
    fn addu_w2(&mut self) {
        let lo = self.func.alloc_local(1);
        let lo = {
            let idx = self.lit(lo);
            Arg::loc_reg(1, idx, 0)
        };
        let (a0, a1, b0, b1) = (self.loc(0), self.loc(1), self.loc(2), self.loc(3));
        self.add(Code::AddU, 1, vec![lo.clone(), a0.clone(), b0]);
        self.add(Code::Move, 1, vec![Arg::stk(1), lo.clone()]);
        self.add(Code::AddU, 1, vec![Arg::stk(1), a1, b1]);
        self.add(Code::CmpULt, 1, vec![Arg::stk(1), lo, a0]);
        self.add(Code::AddU, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
        self.retn(2);
    }

    fn subu_w2(&mut self) {
        let (a0, a1, b0, b1) = (self.loc(0), self.loc(1), self.loc(2), self.loc(3));
        self.add(Code::SubU, 1, vec![Arg::stk(1), a0.clone(), b0.clone()]);
        self.add(Code::SubU, 1, vec![Arg::stk(1), a1, b1]);
        self.add(Code::CmpULt, 1, vec![Arg::stk(1), a0, b0]);
        self.add(Code::SubU, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
        self.retn(2);
    }

    /// `-a = ~a + 1`; the carry out of the low word happens only when it is zero.
    fn negi_w2(&mut self) {
        let (a0, a1) = (self.loc(0), self.loc(1));
        self.add(Code::NegI, 1, vec![Arg::stk(1), a0.clone()]);
        self.add(Code::InvU, 1, vec![Arg::stk(1), a1]);
        self.add(Code::NotU, 1, vec![Arg::stk(1), a0]);
        self.add(Code::AddU, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
        self.retn(2);
    }

    /// OR together the XOR of each word pair.
    fn cmp_eq_wide(&mut self, eq: bool, n: u32) {
        for i in 0..n {
            let (a, b) = (self.loc(i), self.loc(n + i));
            self.add(Code::OrXU, 1, vec![Arg::stk(1), a, b]);
            if i > 0 {
                self.add(Code::OrIU, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
            }
        }
        if eq {
            self.add(Code::NotU, 1, vec![Arg::stk(1), Arg::stk(1)]);
        } else {
            let zero = self.lit(0);
            self.add(Code::CmpINe, 1, vec![Arg::stk(1), Arg::stk(1), zero]);
        }
        self.retn(1);
    }

    /// Compare from the top word down; the first differing word decides.
    fn cmp_ordered_wide(&mut self, code: Code, n: u32) {
        let (signed, unsigned) = match code {
            Code::CmpILt | Code::CmpULt => (Code::CmpILt, Code::CmpULt),
            Code::CmpIGt | Code::CmpUGt => (Code::CmpIGt, Code::CmpUGt),
            Code::CmpILe | Code::CmpULe => (Code::CmpILt, Code::CmpULt),
            _ => (Code::CmpIGt, Code::CmpUGt),
        };
        let is_signed = matches!(code, Code::CmpILt | Code::CmpIGt | Code::CmpILe | Code::CmpIGe);
        let or_equal = matches!(code, Code::CmpILe | Code::CmpIGe | Code::CmpULe | Code::CmpUGe);

        for i in (0..n).rev() {
            let next = self.func.gen_label();
            let (a, b) = (self.loc(i), self.loc(n + i));
            self.add(Code::CmpIEq, 1, vec![Arg::stk(1), a.clone(), b.clone()]);
            let target = Arg::lit(1, self.exps.glyph(next.as_str(), Origin::none()));
            self.add(Code::JcndTru, 1, vec![Arg::stk(1), target]);
            let cmp = if is_signed && i == n - 1 { signed } else { unsigned };
            self.add(cmp, 1, vec![Arg::stk(1), a, b]);
            self.retn(1);
            self.block.add_label(next);
        }
        let tail = self.lit(u32::from(or_equal));
        self.add(Code::Retn, 1, vec![tail]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_widths_are_external() {
        let mut exps = ExpArena::new();
        let f = helper(Code::DivU, 1, &mut exps);
        assert_eq!(f.name, "__acsc_DivU_W1");
        assert!(!f.defin);
        assert_eq!((f.param, f.retrn), (2, 1));
        assert_eq!(f.linka, Linkage::ExtC);
    }

    #[test]
    fn shifts_take_one_word_amount() {
        let mut exps = ExpArena::new();
        let f = helper(Code::ShLU, 3, &mut exps);
        assert_eq!((f.param, f.retrn), (4, 3));
    }

    #[test]
    fn synthesized_add_reserves_a_temporary() {
        let mut exps = ExpArena::new();
        let f = helper(Code::AddU, 2, &mut exps);
        assert!(f.defin);
        assert_eq!((f.param, f.retrn, f.local_reg), (4, 2, 5));
        assert_eq!(f.block.stmnts.last().map(|s| s.code), Some(Code::Retn));
    }

    #[test]
    fn storage_helpers_declare_parameters() {
        assert_eq!(storage_helper(PLSA).param, 1);
        assert_eq!(storage_helper(PLSF).param, 0);
    }
}
