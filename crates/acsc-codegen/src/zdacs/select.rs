//! Instruction selection for normal-form statements.
//!
//! Each statement maps onto a fixed pcode sequence, so the encoded size of a
//! function is known before any glyph has a value.

use super::helpers::{PLSA, PLSF};
use super::pcode::{Imm, Instr, Pcode};
use super::{AUTO_PTR_REG, TARGET};
use crate::error::{CodegenError, CodegenResult};
use acsc_ir::{Arg, ArgData, ArgPtr1, ArgPtr2, Code, Program, Statement, Type};

/// Arguments accepted by the line specials.
const SPEC_ARGS: usize = 5;

/// Pcodes for `stmt`. `is_script` selects script-style returns.
pub fn select(stmt: &Statement, is_script: bool, prog: &Program) -> CodegenResult<Vec<Instr>> {
    let s = stmt;
    let fail = || CodegenError::Untranslatable {
        pos: s.pos.clone(),
        code: s.code,
        size: s.size,
        target: TARGET,
    };

    let out = match s.code {
        Code::Nop | Code::XcodSid => Vec::new(),

        Code::Move => match (&s.args[0].data, &s.args[1].data) {
            (ArgData::Stk, ArgData::Lit { exp, off }) => {
                let mut v = vec![Instr::new(Pcode::PushNumber, vec![lit_imm(*exp, *off)])];
                if matches!(prog.type_of(*exp), Ok(Type::StrEn)) {
                    v.push(Instr::op(Pcode::TagString));
                }
                v
            }
            (ArgData::Stk, src) => vec![load(src).ok_or_else(fail)?],
            (ArgData::Nul, ArgData::Stk) => vec![Instr::op(Pcode::Drop)],
            (dst, ArgData::Stk) => vec![store(dst).ok_or_else(fail)?],
            _ => return Err(fail()),
        },

        Code::Copy => vec![Instr::op(Pcode::Dup)],
        Code::Swap => vec![Instr::op(Pcode::Swap)],

        Code::Jump => vec![Instr::new(Pcode::Goto, vec![arg_imm(&s.args[0]).ok_or_else(fail)?])],
        Code::JcndNil => vec![Instr::new(Pcode::IfNotGoto, vec![arg_imm(&s.args[1]).ok_or_else(fail)?])],
        Code::JcndTru => vec![Instr::new(Pcode::IfGoto, vec![arg_imm(&s.args[1]).ok_or_else(fail)?])],

        Code::Call => call(s).ok_or_else(fail)?,
        Code::Retn => retn(s, is_script),

        Code::Cnat => {
            let func = arg_imm(&s.args[1]).ok_or_else(fail)?;
            let argc = param_words(s);
            let mut v = vec![Instr::new(Pcode::CallFunc, vec![Imm::Word(argc), func])];
            if discards(&s.args[0]) {
                v.push(Instr::op(Pcode::Drop));
            }
            v
        }

        Code::Cspe => {
            let spec = arg_imm(&s.args[1]).ok_or_else(fail)?;
            let argc = param_words(s) as usize;
            if argc > SPEC_ARGS {
                return Err(fail());
            }
            let mut v = Vec::new();
            if discards(&s.args[0]) {
                let op = match argc {
                    0 | 1 => Pcode::LSpec1,
                    2 => Pcode::LSpec2,
                    3 => Pcode::LSpec3,
                    4 => Pcode::LSpec4,
                    _ => Pcode::LSpec5,
                };
                if argc == 0 {
                    v.push(Instr::word(Pcode::PushNumber, 0));
                }
                v.push(Instr::new(op, vec![spec]));
            } else {
                v.extend((argc..SPEC_ARGS).map(|_| Instr::word(Pcode::PushNumber, 0)));
                v.push(Instr::new(Pcode::LSpec5Result, vec![spec]));
            }
            v
        }

        Code::Casm => {
            let (first, rest) = s.args.split_first().ok_or_else(fail)?;
            let code = prog.lit_words(first)?.first().copied().unwrap_or(0);
            let args = rest.iter().map(|a| arg_imm(a).ok_or_else(fail)).collect::<Result<_, _>>()?;
            vec![Instr { code, args }]
        }

        Code::Pltn => vec![Instr::word(Pcode::PushGlobalVar, AUTO_PTR_REG), Instr::op(Pcode::Add)],
        Code::Plsa => vec![Instr::new(Pcode::CallDiscard, vec![Imm::Glyph(PLSA.into())])],
        Code::Plsf => vec![Instr::new(Pcode::CallDiscard, vec![Imm::Glyph(PLSF.into())])],

        code if s.size == 1 => vec![Instr::op(stack_op(code).ok_or_else(fail)?)],
        _ => return Err(fail()),
    };
    Ok(out)
}

fn stack_op(code: Code) -> Option<Pcode> {
    Some(match code {
        Code::AddU | Code::AddI => Pcode::Add,
        Code::SubU | Code::SubI => Pcode::Subtract,
        Code::MulU | Code::MulI => Pcode::Multiply,
        Code::DivI => Pcode::Divide,
        Code::ModI => Pcode::Modulus,
        Code::MulX => Pcode::FixedMul,
        Code::DivX => Pcode::FixedDiv,
        Code::CmpIEq | Code::CmpUEq => Pcode::Eq,
        Code::CmpINe | Code::CmpUNe => Pcode::Ne,
        Code::CmpILt => Pcode::Lt,
        Code::CmpIGt => Pcode::Gt,
        Code::CmpILe => Pcode::Le,
        Code::CmpIGe => Pcode::Ge,
        Code::AndU => Pcode::AndBitwise,
        Code::OrIU => Pcode::OrBitwise,
        Code::OrXU => Pcode::EorBitwise,
        Code::ShLU => Pcode::LShift,
        Code::ShRI => Pcode::RShift,
        Code::LAnd => Pcode::AndLogical,
        Code::LOrI => Pcode::OrLogical,
        Code::NegI => Pcode::UnaryMinus,
        Code::InvU => Pcode::NegateBinary,
        Code::NotU => Pcode::NegateLogical,
        _ => return None,
    })
}

fn lit_imm(exp: acsc_ir::ExpId, off: u32) -> Imm {
    Imm::Exp { exp, word: off, add: 0 }
}

fn arg_imm(arg: &Arg) -> Option<Imm> {
    match arg.data {
        ArgData::Lit { exp, off } => Some(lit_imm(exp, off)),
        _ => None,
    }
}

/// Register number immediate: the literal index plus the word offset.
fn reg_imm(p: &ArgPtr1) -> Option<Imm> {
    match p.idx.data {
        ArgData::Lit { exp, off } => Some(Imm::Exp {
            exp,
            word: off,
            add: p.off,
        }),
        _ => None,
    }
}

/// Array number immediate of an element indexed by the stack top.
fn arr_imm(p: &ArgPtr2) -> Option<Imm> {
    if !p.idx.is_stk() || p.off != 0 {
        return None;
    }
    arg_imm(&p.arr)
}

fn load(src: &ArgData) -> Option<Instr> {
    let (op, imm) = match src {
        ArgData::LocReg(p) => (Pcode::PushScriptVar, reg_imm(p)?),
        ArgData::ModReg(p) => (Pcode::PushMapVar, reg_imm(p)?),
        ArgData::HubReg(p) => (Pcode::PushWorldVar, reg_imm(p)?),
        ArgData::GblReg(p) => (Pcode::PushGlobalVar, reg_imm(p)?),
        ArgData::ModArr(p) => (Pcode::PushMapArray, arr_imm(p)?),
        ArgData::HubArr(p) => (Pcode::PushWorldArray, arr_imm(p)?),
        ArgData::GblArr(p) => (Pcode::PushGlobalArray, arr_imm(p)?),
        _ => return None,
    };
    Some(Instr::new(op, vec![imm]))
}

fn store(dst: &ArgData) -> Option<Instr> {
    let (op, imm) = match dst {
        ArgData::LocReg(p) => (Pcode::AssignScriptVar, reg_imm(p)?),
        ArgData::ModReg(p) => (Pcode::AssignMapVar, reg_imm(p)?),
        ArgData::HubReg(p) => (Pcode::AssignWorldVar, reg_imm(p)?),
        ArgData::GblReg(p) => (Pcode::AssignGlobalVar, reg_imm(p)?),
        ArgData::ModArr(p) => (Pcode::AssignMapArray, arr_imm(p)?),
        ArgData::HubArr(p) => (Pcode::AssignWorldArray, arr_imm(p)?),
        ArgData::GblArr(p) => (Pcode::AssignGlobalArray, arr_imm(p)?),
        _ => return None,
    };
    Some(Instr::new(op, vec![imm]))
}

/// The result is thrown away rather than left on the stack.
fn discards(dst: &Arg) -> bool {
    dst.is_nul() || dst.size == 0
}

fn param_words(s: &Statement) -> u32 {
    s.args.iter().skip(2).map(|a| a.size).sum()
}

/// Global register receiving result word `i`, for `i >= 1`.
fn return_reg(i: u32) -> u32 {
    super::RETURN_REG + 1 - i
}

fn call(s: &Statement) -> Option<Vec<Instr>> {
    let dst = &s.args[0];
    let mut v = Vec::new();
    match &s.args[1].data {
        ArgData::Lit { exp, off } => {
            let op = if discards(dst) { Pcode::CallDiscard } else { Pcode::Call };
            v.push(Instr::new(op, vec![lit_imm(*exp, *off)]));
        }
        ArgData::LocReg(p) => {
            v.push(Instr::new(Pcode::PushScriptVar, vec![reg_imm(p)?]));
            v.push(Instr::op(Pcode::CallStack));
            if dst.is_nul() && dst.size > 0 {
                v.push(Instr::op(Pcode::Drop));
            }
        }
        _ => return None,
    }
    if dst.is_stk() {
        v.extend((1..dst.size).map(|i| Instr::word(Pcode::PushGlobalVar, return_reg(i))));
    }
    Some(v)
}

fn retn(s: &Statement, is_script: bool) -> Vec<Instr> {
    let n = s.args.first().map(|a| a.size).unwrap_or(0);
    let mut v = Vec::new();
    if is_script {
        if n > 0 {
            v.extend((1..n).map(|_| Instr::op(Pcode::Drop)));
            v.push(Instr::op(Pcode::SetResultValue));
        }
        v.push(Instr::op(Pcode::Terminate));
    } else if n == 0 {
        v.push(Instr::op(Pcode::ReturnVoid));
    } else {
        v.extend((1..n).rev().map(|i| Instr::word(Pcode::AssignGlobalVar, return_reg(i))));
        v.push(Instr::op(Pcode::ReturnVal));
    }
    v
}
