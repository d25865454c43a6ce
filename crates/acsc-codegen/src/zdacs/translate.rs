//! Translate into stack-machine normal form.
//!
//! After this pass every statement selects one fixed pcode sequence. Its
//! operands are on the stack, literals, registers with literal indices, or
//! one-word array elements indexed by the stack top. The output is still
//! ordinary IR, and translating it again changes nothing.
//!
//! Stack operands must appear in evaluation order: once an operand that
//! does not touch the stack has been seen, a later stack operand would have
//! to be dug out from under it. Such statements are rejected.

use super::legalize::is_native;
use super::TARGET;
use crate::convert::GenCtx;
use crate::error::{CodegenError, CodegenResult};
use crate::info::{check_arg_base, check_arity};
use acsc_ir::{Arg, ArgBase, ArgData, ArgPtr2, Code, Origin, Program, Statement};
use tracing::trace;

/// `ACS_Execute`.
const SPEC_EXECUTE: u32 = 80;
/// `ACS_ExecuteWithResult`.
const SPEC_EXECUTE_RESULT: u32 = 84;
/// `ACS_NamedExecute`.
const FUNC_NAMED_EXECUTE: u32 = 39;
/// `ACS_NamedExecuteWithResult`.
const FUNC_NAMED_EXECUTE_RESULT: u32 = 44;

/// Arguments taken by the script-start specials and functions.
const SCRIPT_CALL_ARGS: usize = 5;

pub fn translate(prog: &mut Program) -> CodegenResult<()> {
    for func in prog.functions.values_mut().filter(|f| f.defin) {
        let old = std::mem::take(&mut func.block);
        let name = func.name.clone();
        let mut ctx = GenCtx::new(&mut prog.exps, &mut *func, Origin::none());
        for s in old.stmnts {
            trace!(func = %name, stmt = %s, "translate");
            stmt(&mut ctx, s)?;
        }
        for l in &old.pending {
            ctx.place(l);
        }
        let block = ctx.finish();
        func.block = block;
    }
    Ok(())
}

fn stmt(ctx: &mut GenCtx, mut s: Statement) -> CodegenResult<()> {
    check_arity(&s)?;
    for l in std::mem::take(&mut s.labels) {
        ctx.place(&l);
    }
    ctx.pos = s.pos.clone();
    let n = s.size;

    match s.code {
        Code::Nop | Code::XcodSid | Code::Plsf => {
            ctx.stmt(s.code, n, s.args.clone());
            Ok(())
        }

        Code::Move => {
            let (dst, src) = (&s.args[0], &s.args[1]);
            if (dst.is_stk() && src.is_stk()) || (dst.is_nul() && !src.uses_stk()) {
                return Ok(());
            }
            move_src(ctx, &s, src)?;
            move_dst(ctx, &s, dst)
        }

        Code::Copy if n == 1 => {
            ctx.dup();
            Ok(())
        }
        Code::Copy => {
            let t = ctx.temp(n);
            move_dst(ctx, &s, &t)?;
            move_src(ctx, &s, &t)?;
            move_src(ctx, &s, &t)
        }

        Code::Swap if n == 1 => {
            ctx.stmt(Code::Swap, 1, vec![Arg::stk(1), Arg::stk(1)]);
            Ok(())
        }
        Code::Swap => {
            let (tb, ta) = (ctx.temp(n), ctx.temp(n));
            move_dst(ctx, &s, &tb)?;
            move_dst(ctx, &s, &ta)?;
            move_src(ctx, &s, &tb)?;
            move_src(ctx, &s, &ta)
        }

        Code::AndU | Code::OrIU | Code::OrXU if n > 1 => bitwise_wide(ctx, &s),
        Code::InvU if n > 1 => bitwise_wide(ctx, &s),

        Code::Jump => {
            check_arg_base(&s, 0, ArgBase::Lit)?;
            ctx.stmt(Code::Jump, n, s.args.clone());
            Ok(())
        }

        Code::JcndNil | Code::JcndTru if n <= 1 => {
            check_arg_base(&s, 1, ArgBase::Lit)?;
            push_operands(ctx, &s, &s.args[..1])?;
            let cond = Arg::stk(s.args[0].size);
            ctx.stmt(s.code, n, vec![cond, s.args[1].clone()]);
            Ok(())
        }

        Code::Call => call(ctx, &s),
        Code::Cnat | Code::Cspe => {
            check_arg_base(&s, 1, ArgBase::Lit)?;
            let params = s.args[2..].to_vec();
            push_operands(ctx, &s, &params)?;
            finish_call(ctx, &s, s.code, s.args[1].clone(), &params)
        }
        Code::CscrIA | Code::CscrIS | Code::CscrSA | Code::CscrSS => script_call(ctx, &s),

        Code::Casm => {
            for i in 0..s.args.len() {
                check_arg_base(&s, i, ArgBase::Lit)?;
            }
            ctx.stmt(Code::Casm, n, s.args.clone());
            Ok(())
        }

        Code::Retn => {
            let args = match s.args.first() {
                Some(a) => {
                    push_operands(ctx, &s, std::slice::from_ref(a))?;
                    vec![Arg::stk(a.size)]
                }
                None => Vec::new(),
            };
            ctx.stmt(Code::Retn, n, args);
            Ok(())
        }

        Code::Plsa => {
            push_operands(ctx, &s, &s.args[..1])?;
            ctx.stmt(Code::Plsa, n, vec![Arg::stk(1)]);
            Ok(())
        }

        Code::Pltn => {
            push_operands(ctx, &s, &s.args[1..2])?;
            ctx.stmt(Code::Pltn, 1, vec![Arg::stk(1), Arg::stk(1)]);
            move_dst(ctx, &s, &s.args[0])
        }

        Code::NotU | Code::NegI | Code::InvU if n == 1 => {
            push_operands(ctx, &s, &s.args[1..2])?;
            ctx.stmt(s.code, 1, vec![Arg::stk(1), Arg::stk(1)]);
            move_dst(ctx, &s, &s.args[0])
        }

        code if n == 1 && s.args.len() == 3 && is_native(code, 1) => {
            let (a, b) = (&s.args[1], &s.args[2]);
            if !a.uses_stk() && b.uses_stk() && is_commutative(code) {
                push_operands(ctx, &s, &[b.clone(), a.clone()])?;
            } else {
                push_operands(ctx, &s, &s.args[1..])?;
            }
            ctx.stmt(code, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
            move_dst(ctx, &s, &s.args[0])
        }

        code => Err(untranslatable(&s, code)),
    }
}

fn is_commutative(code: Code) -> bool {
    matches!(
        code,
        Code::AddU
            | Code::AddI
            | Code::MulU
            | Code::MulI
            | Code::MulX
            | Code::AndU
            | Code::OrIU
            | Code::OrXU
            | Code::LAnd
            | Code::LOrI
            | Code::CmpIEq
            | Code::CmpINe
            | Code::CmpUEq
            | Code::CmpUNe
    )
}

fn untranslatable(s: &Statement, code: Code) -> CodegenError {
    CodegenError::Untranslatable {
        pos: s.pos.clone(),
        code,
        size: s.size,
        target: TARGET,
    }
}

fn disorder(s: &Statement) -> CodegenError {
    CodegenError::Disorder {
        pos: s.pos.clone(),
        code: s.code,
    }
}

fn bad_base(s: &Statement, arg: &Arg) -> CodegenError {
    let index = s.args.iter().position(|a| a == arg).unwrap_or(0);
    CodegenError::ArgBase {
        pos: s.pos.clone(),
        code: s.code,
        index,
        base: arg.base(),
    }
}

// ══════════════════════════════════════════════════════════════════════
// Operand order
// ══════════════════════════════════════════════════════════════════════

/// Stack users must form a prefix, and only the last of them may reach the
/// stack through an index.
fn check_order(s: &Statement, args: &[Arg]) -> CodegenResult<()> {
    let users = args.iter().take_while(|a| a.uses_stk()).count();
    let rest_clean = args[users..].iter().all(|a| !a.uses_stk());
    let prefix_plain = args[..users.saturating_sub(1)].iter().all(Arg::is_stk);
    if rest_clean && prefix_plain {
        Ok(())
    } else {
        Err(disorder(s))
    }
}

/// Bring `args` onto the stack in order.
fn push_operands(ctx: &mut GenCtx, s: &Statement, args: &[Arg]) -> CodegenResult<()> {
    check_order(s, args)?;
    for a in args {
        move_src(ctx, s, a)?;
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════
// Loads and stores
// ══════════════════════════════════════════════════════════════════════

/// One-word element of `arr`'s array indexed by the stack top.
fn elem(arr: &Arg) -> Arg {
    let at = |p: &ArgPtr2| ArgPtr2::new((*p.arr).clone(), Arg::stk(1), 0);
    let data = match &arr.data {
        ArgData::ModArr(p) => ArgData::ModArr(at(p)),
        ArgData::HubArr(p) => ArgData::HubArr(at(p)),
        ArgData::GblArr(p) => ArgData::GblArr(at(p)),
        other => other.clone(),
    };
    Arg::new(1, data)
}

fn add_offset(ctx: &mut GenCtx, off: u32) {
    if off != 0 {
        ctx.push_u32(off);
        ctx.stmt(Code::AddU, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
    }
}

fn check_reg_index(s: &Statement, idx: &Arg) -> CodegenResult<()> {
    if idx.is_lit() {
        Ok(())
    } else {
        Err(untranslatable(s, s.code))
    }
}

fn check_array(s: &Statement, p: &ArgPtr2) -> CodegenResult<()> {
    if p.arr.is_lit() {
        Ok(())
    } else {
        Err(untranslatable(s, s.code))
    }
}

/// Pop the array index into a temporary.
fn spill_index(ctx: &mut GenCtx, s: &Statement, p: &ArgPtr2) -> CodegenResult<Arg> {
    let t = ctx.temp(1);
    move_src(ctx, s, &p.idx.resized(1))?;
    move_dst(ctx, s, &t)?;
    Ok(t)
}

/// Push the words of `src`, least significant first.
fn move_src(ctx: &mut GenCtx, s: &Statement, src: &Arg) -> CodegenResult<()> {
    let n = src.size;
    match &src.data {
        ArgData::Stk => {}
        ArgData::Nul => return Err(bad_base(s, src)),
        ArgData::Cpy if n == 1 => ctx.dup(),
        ArgData::Cpy => {
            let t = ctx.temp(n);
            move_dst(ctx, s, &t)?;
            move_src(ctx, s, &t)?;
            move_src(ctx, s, &t)?;
        }
        ArgData::Lit { .. } => {
            for i in 0..n {
                ctx.push(src.word(i));
            }
        }
        ArgData::LocReg(p) | ArgData::ModReg(p) | ArgData::HubReg(p) | ArgData::GblReg(p) => {
            check_reg_index(s, &p.idx)?;
            for i in 0..n {
                ctx.push(src.word(i));
            }
        }
        ArgData::ModArr(p) | ArgData::HubArr(p) | ArgData::GblArr(p) => {
            check_array(s, p)?;
            if n == 1 && p.idx.is_stk() {
                add_offset(ctx, p.off);
                ctx.push(elem(src));
                return Ok(());
            }
            let idx = if p.idx.uses_stk() {
                spill_index(ctx, s, p)?
            } else {
                p.idx.resized(1)
            };
            for i in 0..n {
                move_src(ctx, s, &idx)?;
                add_offset(ctx, p.off + i);
                ctx.push(elem(src));
            }
        }
    }
    Ok(())
}

/// Pop `dst.size` words into `dst`.
fn move_dst(ctx: &mut GenCtx, s: &Statement, dst: &Arg) -> CodegenResult<()> {
    let n = dst.size;
    match &dst.data {
        ArgData::Stk => {}
        ArgData::Nul => ctx.drop_words(n),
        ArgData::Lit { .. } | ArgData::Cpy => return Err(bad_base(s, dst)),
        ArgData::LocReg(p) | ArgData::ModReg(p) | ArgData::HubReg(p) | ArgData::GblReg(p) => {
            check_reg_index(s, &p.idx)?;
            for i in (0..n).rev() {
                ctx.store(dst.word(i));
            }
        }
        ArgData::ModArr(p) | ArgData::HubArr(p) | ArgData::GblArr(p) => {
            check_array(s, p)?;
            if n == 1 && p.idx.is_stk() {
                if p.off != 0 {
                    ctx.stmt(Code::Swap, 1, vec![Arg::stk(1), Arg::stk(1)]);
                    add_offset(ctx, p.off);
                    ctx.stmt(Code::Swap, 1, vec![Arg::stk(1), Arg::stk(1)]);
                }
                ctx.store(elem(dst));
            } else if p.idx.uses_stk() {
                // The index sits below the value.
                let t = ctx.temp(n);
                move_dst(ctx, s, &t)?;
                let idx = spill_index(ctx, s, p)?;
                for i in 0..n {
                    move_src(ctx, s, &idx)?;
                    add_offset(ctx, p.off + i);
                    move_src(ctx, s, &t.word(i))?;
                    ctx.store(elem(dst));
                }
            } else {
                for i in (0..n).rev() {
                    move_src(ctx, s, &p.idx.resized(1))?;
                    add_offset(ctx, p.off + i);
                    ctx.stmt(Code::Swap, 1, vec![Arg::stk(1), Arg::stk(1)]);
                    ctx.store(elem(dst));
                }
            }
        }
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════
// Wide bitwise operations
// ══════════════════════════════════════════════════════════════════════

/// Word-by-word bitwise operation; stack operands go through temporaries.
fn bitwise_wide(ctx: &mut GenCtx, s: &Statement) -> CodegenResult<()> {
    let n = s.size;
    let srcs = &s.args[1..];
    check_order(s, srcs)?;

    let mut spilled: Vec<Arg> = srcs.to_vec();
    for a in spilled.iter_mut().rev() {
        if a.uses_stk() {
            let t = ctx.temp(n);
            move_src(ctx, s, a)?;
            move_dst(ctx, s, &t)?;
            *a = t;
        }
    }

    for i in 0..n {
        for a in &spilled {
            move_src(ctx, s, &a.word(i))?;
        }
        ctx.stmt(s.code, 1, vec![Arg::stk(1); srcs.len() + 1]);
    }
    move_dst(ctx, s, &s.args[0])
}

// ══════════════════════════════════════════════════════════════════════
// Calls
// ══════════════════════════════════════════════════════════════════════

fn call(ctx: &mut GenCtx, s: &Statement) -> CodegenResult<()> {
    let callee = &s.args[1];
    let params = s.args[2..].to_vec();

    let callee = match &callee.data {
        ArgData::Lit { .. } => callee.clone(),
        ArgData::LocReg(p) if p.idx.is_lit() => callee.clone(),
        ArgData::Stk => {
            if params.iter().any(|p| p.uses_stk() && !p.is_stk()) {
                return Err(disorder(s));
            }
            check_order(s, &params)?;
            let k: u32 = params.iter().filter(|p| p.is_stk()).map(|p| p.size).sum();
            let tp = if k > 0 { Some(ctx.temp(k)) } else { None };
            if let Some(t) = &tp {
                move_dst(ctx, s, t)?;
            }
            let tc = ctx.temp(1);
            move_dst(ctx, s, &tc)?;
            if let Some(t) = &tp {
                move_src(ctx, s, t)?;
            }
            tc
        }
        _ => {
            if callee.uses_stk() && params.iter().any(Arg::uses_stk) {
                return Err(disorder(s));
            }
            let tc = ctx.temp(1);
            move_src(ctx, s, &callee.resized(1))?;
            move_dst(ctx, s, &tc)?;
            tc
        }
    };

    push_operands(ctx, s, &params)?;
    finish_call(ctx, s, Code::Call, callee, &params)
}

/// Emit a call whose parameters are already on the stack, then store its result.
fn finish_call(ctx: &mut GenCtx, s: &Statement, code: Code, callee: Arg, params: &[Arg]) -> CodegenResult<()> {
    let dst = &s.args[0];
    let ret = if dst.is_stk() || dst.is_nul() {
        dst.clone()
    } else {
        Arg::stk(dst.size)
    };
    let mut args = vec![ret, callee];
    args.extend(params.iter().map(|p| Arg::stk(p.size)));
    ctx.stmt(code, s.size, args);
    if dst.is_stk() || dst.is_nul() {
        Ok(())
    } else {
        move_dst(ctx, s, dst)
    }
}

/// Script starts become the matching special or native function.
fn script_call(ctx: &mut GenCtx, s: &Statement) -> CodegenResult<()> {
    let always = matches!(s.code, Code::CscrIA | Code::CscrSA);
    let max = if always { SCRIPT_CALL_ARGS - 2 } else { SCRIPT_CALL_ARGS - 1 };
    let args = &s.args[1..];
    if args.len() - 1 > max {
        return Err(CodegenError::Unsupported {
            pos: s.pos.clone(),
            what: format!("{} with {} arguments", s.code, args.len() - 1),
        });
    }
    check_order(s, args)?;

    // The map argument goes between the script and its arguments.
    if always {
        let k: u32 = args[1..].iter().filter(|a| a.is_stk()).map(|a| a.size).sum();
        let spill = if k > 0 { Some(ctx.temp(k)) } else { None };
        if let Some(t) = &spill {
            move_dst(ctx, s, t)?;
        }
        move_src(ctx, s, &args[0])?;
        ctx.push_u32(0);
        if let Some(t) = &spill {
            move_src(ctx, s, t)?;
        }
        for a in args[1..].iter().filter(|a| !a.is_stk()) {
            move_src(ctx, s, a)?;
        }
    } else {
        push_operands(ctx, s, args)?;
    }
    let pushed = args.len() + usize::from(always);
    for _ in pushed..SCRIPT_CALL_ARGS {
        ctx.push_u32(0);
    }

    let (code, number) = match s.code {
        Code::CscrIA => (Code::Cspe, SPEC_EXECUTE),
        Code::CscrIS => (Code::Cspe, SPEC_EXECUTE_RESULT),
        Code::CscrSA => (Code::Cnat, FUNC_NAMED_EXECUTE),
        _ => (Code::Cnat, FUNC_NAMED_EXECUTE_RESULT),
    };
    let number = ctx.lit(number);
    let dst = &s.args[0];
    let mut call = vec![if always { Arg::nul(0) } else { Arg::stk(1) }, number];
    call.extend((0..SCRIPT_CALL_ARGS).map(|_| Arg::stk(1)));
    ctx.stmt(code, 1, call);

    if always {
        if !dst.is_nul() && dst.size > 0 {
            ctx.push_words(&vec![0; dst.size as usize]);
            move_dst(ctx, s, dst)?;
        }
        Ok(())
    } else {
        move_dst(ctx, s, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acsc_ir::Function;

    fn program(stmts: Vec<Statement>) -> Program {
        let mut prog = Program::new();
        let mut f = Function::new("f");
        f.defin = true;
        f.param = 2;
        f.local_reg = 2;
        for s in stmts {
            f.block.add(s);
        }
        prog.add_function(f);
        prog
    }

    fn loc(prog: &mut Program, i: u32) -> Arg {
        let idx = Arg::lit(1, prog.exps.lit_u32(i, Origin::none()));
        Arg::loc_reg(1, idx, 0)
    }

    fn codes(prog: &Program) -> Vec<Code> {
        prog.functions["f"].block.iter().map(|s| s.code).collect()
    }

    #[test]
    fn binary_op_pushes_operands() {
        let mut prog = program(Vec::new());
        let (r0, r1) = (loc(&mut prog, 0), loc(&mut prog, 1));
        let s = Statement::new(Code::SubU, 1, vec![r0.clone(), r0, r1], Origin::none());
        prog.get_function("f").block.add(s);

        translate(&mut prog).unwrap();
        assert_eq!(codes(&prog), vec![Code::Move, Code::Move, Code::SubU, Code::Move]);
        let sub = &prog.functions["f"].block.stmnts[2];
        assert!(sub.args.iter().all(Arg::is_stk));
    }

    #[test]
    fn ordered_stack_operand_after_register_is_rejected() {
        let mut prog = program(Vec::new());
        let r0 = loc(&mut prog, 0);
        let s = Statement::new(Code::SubU, 1, vec![Arg::stk(1), r0, Arg::stk(1)], Origin::none());
        prog.get_function("f").block.add(s);
        let err = translate(&mut prog).unwrap_err();
        assert!(matches!(err, CodegenError::Disorder { code: Code::SubU, .. }));
    }

    #[test]
    fn commutative_operands_are_swapped() {
        let mut prog = program(Vec::new());
        let r0 = loc(&mut prog, 0);
        let s = Statement::new(Code::AddU, 1, vec![Arg::stk(1), r0, Arg::stk(1)], Origin::none());
        prog.get_function("f").block.add(s);
        translate(&mut prog).unwrap();
        assert_eq!(codes(&prog), vec![Code::Move, Code::AddU]);
    }

    #[test]
    fn normal_form_is_stable() {
        let mut prog = program(Vec::new());
        let (r0, r1) = (loc(&mut prog, 0), loc(&mut prog, 1));
        let arr = Arg::lit(1, prog.exps.lit_u32(3, Origin::none()));
        let elem = Arg::gbl_arr(2, arr, r1.clone(), 4);
        let f = prog.get_function("f");
        f.block.add(Statement::new(Code::Move, 2, vec![elem, Arg::stk(2)], Origin::none()));
        f.block.add(Statement::new(Code::MulU, 1, vec![r0.clone(), r0, r1], Origin::none()));

        translate(&mut prog).unwrap();
        let once = prog.functions["f"].block.clone();
        translate(&mut prog).unwrap();
        assert_eq!(prog.functions["f"].block, once);
    }

    #[test]
    fn script_start_pads_to_five_arguments() {
        let mut prog = program(Vec::new());
        let script = Arg::lit(1, prog.exps.lit_u32(7, Origin::none()));
        let s = Statement::new(Code::CscrIA, 1, vec![Arg::nul(0), script], Origin::none());
        prog.get_function("f").block.add(s);

        translate(&mut prog).unwrap();
        let block = &prog.functions["f"].block;
        let last = &block.stmnts[block.len() - 1];
        assert_eq!(last.code, Code::Cspe);
        assert_eq!(last.args.len(), 2 + SCRIPT_CALL_ARGS);
        assert_eq!(block.len(), SCRIPT_CALL_ARGS + 1);
    }

    #[test]
    fn too_many_script_arguments_are_unsupported() {
        let mut prog = program(Vec::new());
        let mut args = vec![Arg::nul(0)];
        for i in 0..5 {
            args.push(Arg::lit(1, prog.exps.lit_u32(i, Origin::none())));
        }
        prog.get_function("f").block.add(Statement::new(Code::CscrIA, 1, args, Origin::none()));
        let err = translate(&mut prog).unwrap_err();
        assert!(matches!(err, CodegenError::Unsupported { .. }));
    }
}
