//! Legalize for ZDoom ACS.
//!
//! Every statement leaves this pass in a form the translator can map onto
//! pcodes: native opcodes at widths the VM handles, inline sequences for
//! cheap rewrites, and calls to helper routines for everything else. When a
//! required helper does not exist yet it is added to the program and the
//! pass asks to be rerun. The function being processed is left untouched in
//! that case.

use super::helpers;
use crate::convert::{expand_conv, GenCtx};
use crate::error::CodegenResult;
use crate::info::{check_arity, LegalizeStatus, RestartReason};
use acsc_ir::{
    Arg, ArgData, Block, CallType, Code, Diagnostic, ExpArena, Function, GlyphTable, Origin, Program, Statement, Type,
};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Run one legalize pass over `prog`.
pub fn legalize(prog: &mut Program) -> CodegenResult<LegalizeStatus> {
    if let Some(helper) = pre_program(prog) {
        return Ok(define(prog, helper));
    }

    let names: Vec<String> = prog.functions.keys().cloned().collect();
    for name in names {
        let Some(func) = prog.functions.get(&name).filter(|f| f.defin) else {
            continue;
        };
        let mut func = func.clone();
        let mut lz = Legalizer {
            exps: &mut prog.exps,
            glyphs: &prog.glyphs,
            functions: &prog.functions,
        };
        match lz.function(&mut func)? {
            None => {
                prog.functions.insert(name, func);
            }
            Some(helper) => {
                debug!(func = %name, helper = %helper.name, "helper required");
                return Ok(define(prog, helper));
            }
        }
    }
    Ok(LegalizeStatus::Complete)
}

/// Add `helper` to the program and request a restart.
fn define(prog: &mut Program, helper: Function) -> LegalizeStatus {
    let name = helper.name.clone();
    prog.glyphs.set_type(&name, Type::Funct(helper.ctype));
    prog.add_function(helper);
    LegalizeStatus::Restart(RestartReason::HelperDefined(name))
}

/// Glyph types and storage helpers. Returns a helper that must be defined first.
fn pre_program(prog: &mut Program) -> Option<Function> {
    let mut needs_storage = false;
    for f in prog.functions.values() {
        if f.defin && matches!(f.ctype, CallType::StdCall | CallType::StkCall) {
            prog.glyphs.set_type(&f.name, Type::Funct(f.ctype));
        }
        needs_storage |= f.defin && f.alloc_aut > 0;
    }
    for s in prog.strs.values() {
        prog.glyphs.set_type(&s.glyph, Type::StrEn);
    }
    for o in prog.objects.values_mut() {
        if !o.space.base.is_array() {
            o.space.name.clear();
        }
    }
    if needs_storage {
        for name in [helpers::PLSA, helpers::PLSF] {
            if !prog.functions.contains_key(name) {
                return Some(helpers::storage_helper(name));
            }
        }
    }
    None
}

// ══════════════════════════════════════════════════════════════════════
// Statement rewriting
// ══════════════════════════════════════════════════════════════════════

/// Whether the VM executes `code` at `size` words without help.
pub fn is_native(code: Code, size: u32) -> bool {
    match code {
        Code::Move | Code::Copy | Code::Swap | Code::AndU | Code::OrIU | Code::OrXU | Code::InvU => true,

        Code::Nop
        | Code::XcodSid
        | Code::Jump
        | Code::Call
        | Code::Retn
        | Code::Cnat
        | Code::Cspe
        | Code::CscrIA
        | Code::CscrIS
        | Code::CscrSA
        | Code::CscrSS
        | Code::Casm
        | Code::Pltn
        | Code::Plsa
        | Code::Plsf => true,

        Code::JcndNil | Code::JcndTru => size <= 1,

        Code::AddU
        | Code::AddI
        | Code::SubU
        | Code::SubI
        | Code::MulU
        | Code::MulI
        | Code::DivI
        | Code::ModI
        | Code::MulX
        | Code::DivX
        | Code::NotU
        | Code::NegI
        | Code::LAnd
        | Code::LOrI
        | Code::ShLU
        | Code::ShRI
        | Code::CmpIEq
        | Code::CmpINe
        | Code::CmpILt
        | Code::CmpIGt
        | Code::CmpILe
        | Code::CmpIGe
        | Code::CmpUEq
        | Code::CmpUNe => size == 1,

        _ => false,
    }
}

/// Helper naming folds opcodes that share an implementation.
fn helper_code(code: Code) -> Code {
    match code {
        Code::AddI => Code::AddU,
        Code::SubI => Code::SubU,
        Code::MulI => Code::MulU,
        Code::CmpIEq => Code::CmpUEq,
        Code::CmpINe => Code::CmpUNe,
        c => c,
    }
}

struct Legalizer<'p> {
    exps: &'p mut ExpArena,
    glyphs: &'p GlyphTable,
    functions: &'p BTreeMap<String, Function>,
}

/// `Some(helper)` when a helper must be defined before continuing.
type Need = Option<Function>;

impl Legalizer<'_> {
    fn function(&mut self, func: &mut Function) -> CodegenResult<Need> {
        let old = std::mem::take(&mut func.block);
        let mut out = Block::new();
        for stmt in old.stmnts {
            if let Some(h) = self.stmt(func, &mut out, stmt)? {
                return Ok(Some(h));
            }
        }
        for l in old.pending {
            out.add_label(l);
        }
        out.seal();
        func.block = out;
        Ok(None)
    }

    /// Legalize every statement of a generated block.
    fn expand(&mut self, func: &mut Function, out: &mut Block, block: Block) -> CodegenResult<Need> {
        for s in block.stmnts {
            if let Some(h) = self.stmt(func, out, s)? {
                return Ok(Some(h));
            }
        }
        Ok(None)
    }

    fn stmt(&mut self, func: &mut Function, out: &mut Block, mut stmt: Statement) -> CodegenResult<Need> {
        check_arity(&stmt)?;
        for l in std::mem::take(&mut stmt.labels) {
            out.add_label(l);
        }
        let size = stmt.size;

        match stmt.code {
            Code::Conv => {
                let dst_t = self.type_of(&stmt.args[2])?;
                let src_t = self.type_of(&stmt.args[3])?;
                let mut ctx = GenCtx::new(&mut *self.exps, func, stmt.pos.clone());
                expand_conv(&mut ctx, &stmt, &dst_t, &src_t)?;
                let block = ctx.finish();
                trace!(func = %func.name, stmts = block.len(), "expanded Conv");
                self.expand(func, out, block)
            }

            Code::JcndNil | Code::JcndTru if size > 1 => {
                let mut ctx = GenCtx::new(&mut *self.exps, func, stmt.pos.clone());
                if !stmt.args[0].is_stk() {
                    ctx.push(stmt.args[0].clone());
                }
                for _ in 1..size {
                    ctx.stk_op(Code::OrIU, 1, Arg::stk(1));
                }
                ctx.stmt(stmt.code, 1, vec![Arg::stk(1), stmt.args[1].clone()]);
                let block = ctx.finish();
                self.expand(func, out, block)
            }

            Code::NegF if size == 1 => {
                let sign = Arg::lit(1, self.exps.lit_u32(0x8000_0000, stmt.pos.clone()));
                let args = vec![stmt.args[0].clone(), stmt.args[1].clone(), sign];
                out.add(Statement::new(Code::OrXU, 1, args, stmt.pos));
                Ok(None)
            }

            Code::ShRU if size == 1 && self.lit_amount(&stmt.args[2]).is_some() => {
                let k = self.lit_amount(&stmt.args[2]).unwrap_or(0);
                self.shru_lit(out, &stmt, k);
                Ok(None)
            }

            Code::ShLU | Code::ShRI | Code::ShRU if size > 1 && self.lit_amount(&stmt.args[2]).is_some() => {
                let k = self.lit_amount(&stmt.args[2]).unwrap_or(0);
                let mut ctx = GenCtx::new(&mut *self.exps, func, stmt.pos.clone());
                shift_words(&mut ctx, &stmt, k);
                let block = ctx.finish();
                self.expand(func, out, block)
            }

            code if is_native(code, size) => {
                out.add(stmt);
                Ok(None)
            }

            code => self.helper_call(out, stmt, helper_code(code)),
        }
    }

    fn type_of(&self, arg: &Arg) -> CodegenResult<Type> {
        match arg.data {
            ArgData::Lit { exp, .. } => Ok(self.exps.type_of(exp, self.glyphs)?),
            _ => Err(Diagnostic::internal(Origin::none(), "conversion type must be a literal").into()),
        }
    }

    /// Shift amount of a literal operand.
    fn lit_amount(&self, arg: &Arg) -> Option<u32> {
        let ArgData::Lit { exp, off } = arg.data else {
            return None;
        };
        self.exps.words_of(exp, self.glyphs).ok()?.get(off as usize).copied()
    }

    /// Logical right shift by a constant: arithmetic shift, then mask.
    fn shru_lit(&mut self, out: &mut Block, stmt: &Statement, k: u32) {
        let pos = stmt.pos.clone();
        let (dst, src) = (stmt.args[0].clone(), stmt.args[1].clone());
        let k = k & 31;
        if k == 0 {
            out.add(Statement::new(Code::Move, 1, vec![dst, src], pos));
            return;
        }
        let amount = Arg::lit(1, self.exps.lit_u32(k, pos.clone()));
        let mask = Arg::lit(1, self.exps.lit_u32(u32::MAX >> k, pos.clone()));
        out.add(Statement::new(Code::ShRI, 1, vec![Arg::stk(1), src, amount], pos.clone()));
        out.add(Statement::new(Code::AndU, 1, vec![dst, Arg::stk(1), mask], pos));
    }

    fn helper_call(&mut self, out: &mut Block, stmt: Statement, code: Code) -> CodegenResult<Need> {
        let name = code.helper_name(stmt.size);
        if !self.functions.contains_key(&name) {
            return Ok(Some(helpers::helper(code, stmt.size, self.exps)));
        }
        let callee = Arg::lit(1, self.exps.glyph(name.as_str(), stmt.pos.clone()));
        let mut args = stmt.args;
        args.insert(1, callee);
        out.add(Statement::new(Code::Call, stmt.size, args, stmt.pos));
        Ok(None)
    }
}

// ══════════════════════════════════════════════════════════════════════
// Constant multiword shifts
// ══════════════════════════════════════════════════════════════════════

/// Expand a multiword shift by the constant `k` into word operations.
fn shift_words(ctx: &mut GenCtx, stmt: &Statement, k: u32) {
    let n = stmt.size;
    let (dst, src) = (stmt.args[0].clone(), stmt.args[1].clone());
    let tmp = ctx.temp(n);
    ctx.stmt(Code::Move, n, vec![tmp.clone(), src]);

    let (q, r) = (k / 32, k % 32);
    let word = |i: i64| -> Option<Arg> { (0..n as i64).contains(&i).then(|| tmp.word(i as u32)) };

    for i in 0..n as i64 {
        match stmt.code {
            Code::ShLU => {
                let Some(hi) = word(i - q as i64) else {
                    ctx.push_u32(0);
                    continue;
                };
                ctx.push(hi);
                if r > 0 {
                    let amount = ctx.lit(r);
                    ctx.stk_op(Code::ShLU, 1, amount);
                    if let Some(lo) = word(i - q as i64 - 1) {
                        ctx.push(lo);
                        shr_logical(ctx, 32 - r);
                        ctx.stk_op(Code::OrIU, 1, Arg::stk(1));
                    }
                }
            }
            _ => {
                let signed = stmt.code == Code::ShRI;
                let Some(lo) = word(i + q as i64) else {
                    if signed {
                        ctx.push(tmp.word(n - 1));
                        let amount = ctx.lit(31);
                        ctx.stk_op(Code::ShRI, 1, amount);
                    } else {
                        ctx.push_u32(0);
                    }
                    continue;
                };
                ctx.push(lo);
                if r == 0 {
                    continue;
                }
                match word(i + q as i64 + 1) {
                    Some(hi) => {
                        shr_logical(ctx, r);
                        ctx.push(hi);
                        let amount = ctx.lit(32 - r);
                        ctx.stk_op(Code::ShLU, 1, amount);
                        ctx.stk_op(Code::OrIU, 1, Arg::stk(1));
                    }
                    None if signed => {
                        let amount = ctx.lit(r);
                        ctx.stk_op(Code::ShRI, 1, amount);
                    }
                    None => shr_logical(ctx, r),
                }
            }
        }
    }

    if !dst.is_stk() {
        ctx.store(dst);
    }
}

/// Logical right shift of the stack top by a constant in `1..32`.
fn shr_logical(ctx: &mut GenCtx, k: u32) {
    let amount = ctx.lit(k);
    ctx.stk_op(Code::ShRI, 1, amount);
    let mask = ctx.lit(u32::MAX >> k);
    ctx.stk_op(Code::AndU, 1, mask);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_forms() {
        assert!(is_native(Code::AddU, 1));
        assert!(!is_native(Code::AddU, 2));
        assert!(is_native(Code::AndU, 3));
        assert!(!is_native(Code::ShRU, 1));
        assert!(!is_native(Code::DivU, 1));
        assert!(is_native(Code::JcndTru, 1));
        assert!(!is_native(Code::JcndTru, 2));
    }

    #[test]
    fn signed_helpers_share_unsigned_names() {
        assert_eq!(helper_code(Code::AddI), Code::AddU);
        assert_eq!(helper_code(Code::CmpIEq), Code::CmpUEq);
        assert_eq!(helper_code(Code::CmpILt), Code::CmpILt);
    }

    #[test]
    fn storage_helpers_are_declared_first() {
        let mut prog = Program::new();
        let mut f = Function::new("main");
        f.defin = true;
        f.alloc_aut = 4;
        prog.add_function(f);

        let status = legalize(&mut prog).unwrap();
        assert_eq!(status, LegalizeStatus::Restart(RestartReason::HelperDefined(helpers::PLSA.into())));
        let status = legalize(&mut prog).unwrap();
        assert_eq!(status, LegalizeStatus::Restart(RestartReason::HelperDefined(helpers::PLSF.into())));
        assert_eq!(legalize(&mut prog).unwrap(), LegalizeStatus::Complete);
    }

    #[test]
    fn register_objects_lose_space_names() {
        let mut prog = Program::new();
        let obj = acsc_ir::Object::new("x", acsc_ir::AddrSpace::new(acsc_ir::AddrBase::ModReg, "junk"), 1);
        prog.add_object(obj);
        legalize(&mut prog).unwrap();
        assert_eq!(prog.objects["x"].space.name, "");
    }
}
