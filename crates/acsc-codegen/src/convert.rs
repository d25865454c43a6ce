//! Arithmetic conversion codegen.
//!
//! The target has no float or wide fixed-point instructions, so `Conv` is
//! expanded into mask, shift and branch sequences over the operand stack.
//! Every routine expects the source value on the stack (least significant
//! word deepest) and leaves the converted value in its place.
//!
//! Known approximations:
//! - Floats are always signed, with sign and exponent in the top word.
//! - NaN converts to the destination's maximum (or minimum, if negative).
//! - Float results truncate; subnormals read and write as zero.

use crate::error::{CodegenError, CodegenResult};
use acsc_ir::{Arg, Block, Code, Diagnostic, ExpArena, Function, Origin, Statement, Type, TypeFixed, TypeFloat};

// ══════════════════════════════════════════════════════════════════════
// Generation context
// ══════════════════════════════════════════════════════════════════════

/// Appends generated statements for one function.
pub struct GenCtx<'a> {
    pub exps: &'a mut ExpArena,
    pub func: &'a mut Function,
    pub block: Block,
    pub pos: Origin,
}

impl<'a> GenCtx<'a> {
    pub fn new(exps: &'a mut ExpArena, func: &'a mut Function, pos: Origin) -> Self {
        Self {
            exps,
            func,
            block: Block::new(),
            pos,
        }
    }

    /// One-word literal operand.
    pub fn lit(&mut self, v: u32) -> Arg {
        Arg::lit(1, self.exps.lit_u32(v, self.pos.clone()))
    }

    /// Multiword literal operand, least significant word first.
    pub fn lit_words(&mut self, words: &[u32]) -> Arg {
        Arg::lit(words.len() as u32, self.exps.lit_words(words, self.pos.clone()))
    }

    /// Literal operand holding the address of `label`.
    pub fn label_arg(&mut self, label: &str) -> Arg {
        Arg::lit(1, self.exps.glyph(label, self.pos.clone()))
    }

    pub fn label(&mut self) -> String {
        self.func.gen_label()
    }

    /// Bind `label` to the next statement.
    pub fn place(&mut self, label: &str) {
        self.block.add_label(label);
    }

    /// A fresh local register temporary of `size` words.
    pub fn temp(&mut self, size: u32) -> Arg {
        if self.func.local_reg < self.func.param {
            self.func.local_reg = self.func.param;
        }
        let idx = self.func.alloc_local(size);
        let idx = self.lit(idx);
        Arg::loc_reg(size, idx, 0)
    }

    pub fn stmt(&mut self, code: Code, size: u32, args: Vec<Arg>) {
        self.block.add(Statement::new(code, size, args, self.pos.clone()));
    }

    /// `code` at `size` words over the stack top, result to the stack.
    pub fn stk_op(&mut self, code: Code, size: u32, rhs: Arg) {
        let res = code.result_size(size);
        self.stmt(code, size, vec![Arg::stk(res), Arg::stk(size), rhs]);
    }

    pub fn push(&mut self, src: Arg) {
        let size = src.size;
        self.stmt(Code::Move, size, vec![Arg::stk(size), src]);
    }

    pub fn push_u32(&mut self, v: u32) {
        let a = self.lit(v);
        self.push(a);
    }

    pub fn push_words(&mut self, words: &[u32]) {
        for w in words {
            self.push_u32(*w);
        }
    }

    /// Pop into `dst`.
    pub fn store(&mut self, dst: Arg) {
        let size = dst.size;
        self.stmt(Code::Move, size, vec![dst, Arg::stk(size)]);
    }

    /// Discard `n` words from the stack top.
    pub fn drop_words(&mut self, n: u32) {
        for _ in 0..n {
            self.stmt(Code::Move, 1, vec![Arg::nul(1), Arg::stk(1)]);
        }
    }

    /// Duplicate the top stack word.
    pub fn dup(&mut self) {
        self.stmt(Code::Copy, 1, vec![Arg::stk(1), Arg::stk(1)]);
    }

    pub fn jump(&mut self, label: &str) {
        let l = self.label_arg(label);
        self.stmt(Code::Jump, 1, vec![l]);
    }

    /// Pop one word; branch to `label` if it is nonzero (`JcndTru`) or zero (`JcndNil`).
    pub fn jcnd(&mut self, code: Code, label: &str) {
        let l = self.label_arg(label);
        self.stmt(code, 1, vec![Arg::stk(1), l]);
    }

    /// Finish, returning the generated block.
    pub fn finish(mut self) -> Block {
        self.block.seal();
        self.block
    }
}

// ══════════════════════════════════════════════════════════════════════
// Masks
// ══════════════════════════════════════════════════════════════════════

fn low_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Exponent field, within the top word.
fn mask_exp(t: &TypeFloat) -> u32 {
    low_mask(t.bits_f) << (t.bits_i % 32)
}

/// Explicit mantissa bits of the top word.
fn mask_man(t: &TypeFloat) -> u32 {
    low_mask(t.bits_i % 32)
}

fn mask_sig_float(t: &TypeFloat) -> u32 {
    1u32 << ((t.bits_i + t.bits_f) % 32)
}

fn mask_sig_fixed(t: &TypeFixed) -> u32 {
    1u32 << ((t.bits_i + t.bits_f) % 32)
}

/// Two's complement words of `v` at `n` words.
fn raw_words(v: i128, n: u32) -> Vec<u32> {
    (0..n).map(|i| (v >> (32 * i)) as u32).collect()
}

/// Exponent `e` placed in the exponent field of `t`'s top word.
fn exp_field(t: &TypeFloat, e: i64) -> u32 {
    (e << (t.bits_i % 32)) as u32
}

// ══════════════════════════════════════════════════════════════════════
// Entry points
// ══════════════════════════════════════════════════════════════════════

/// Convert the stack top from `src` to `dst`.
pub fn convert_arith(ctx: &mut GenCtx, dst: &Type, src: &Type) -> CodegenResult<()> {
    if dst == src {
        return Ok(());
    }
    let word = TypeFixed::int(32, false);
    match (dst, src) {
        (Type::Fixed(d), Type::Fixed(s)) => fixed_to_fixed(ctx, d, s),
        (Type::Float(d), Type::Fixed(s)) => fixed_to_float(ctx, d, s),
        (Type::Fixed(d), Type::Float(s)) => float_to_fixed(ctx, d, s),
        (Type::Float(d), Type::Float(s)) => float_to_float(ctx, d, s),
        (Type::Fixed(d), Type::Funct(_) | Type::StrEn | Type::Point) => fixed_to_fixed(ctx, d, &word),
        (Type::Funct(_) | Type::StrEn | Type::Point, Type::Fixed(s)) => fixed_to_fixed(ctx, &word, s),
        (Type::Funct(_) | Type::StrEn | Type::Point, Type::Funct(_) | Type::StrEn | Type::Point) => {}
        _ => {
            return Err(CodegenError::Unsupported {
                pos: ctx.pos.clone(),
                what: format!("conversion from {src} to {dst}"),
            })
        }
    }
    Ok(())
}

/// Expand `Conv dst, src, dstType, srcType` given the resolved types.
pub fn expand_conv(ctx: &mut GenCtx, stmt: &Statement, dst_t: &Type, src_t: &Type) -> CodegenResult<()> {
    let (dst, src) = match stmt.args.as_slice() {
        [dst, src, _, _] => (dst.clone(), src.clone()),
        _ => {
            return Err(CodegenError::ArgCount {
                pos: stmt.pos.clone(),
                code: stmt.code,
                expected: "4".into(),
                found: stmt.args.len(),
            })
        }
    };
    if src.size != src_t.words() || dst.size != dst_t.words() {
        return Err(Diagnostic::internal(
            stmt.pos.clone(),
            format!("Conv operand sizes {}/{} do not match {dst_t} from {src_t}", dst.size, src.size),
        )
        .into());
    }
    if !src.is_stk() {
        ctx.push(src);
    }
    convert_arith(ctx, dst_t, src_t)?;
    if !dst.is_stk() {
        ctx.store(dst);
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════
// Fixed to fixed
// ══════════════════════════════════════════════════════════════════════

fn fixed_to_fixed(ctx: &mut GenCtx, dst: &TypeFixed, src: &TypeFixed) {
    if dst.satur {
        return fixed_to_fixed_satur(ctx, dst, src);
    }

    let diff_words = dst.words() as i32 - src.words() as i32;
    if diff_words > 0 {
        extend(ctx, src.signed, diff_words as u32);
    }
    let width = src.words().max(dst.words());
    shift_fixed(ctx, width, src.signed, dst.bits_f as i32 - src.bits_f as i32);
    if diff_words < 0 {
        ctx.drop_words((-diff_words) as u32);
    }
    if dst.bits_i < src.bits_i || (src.signed && !dst.signed) {
        normalize_top(ctx, dst);
    }
}

/// Sign- or zero-extend the top word from the width of `t`. Types that
/// fill their top word are left alone.
fn normalize_top(ctx: &mut GenCtx, t: &TypeFixed) {
    let used = t.bits() % 32;
    if used == 0 {
        return;
    }
    if t.signed {
        let k = ctx.lit(32 - used);
        ctx.stk_op(Code::ShLU, 1, k);
        let k = ctx.lit(32 - used);
        ctx.stk_op(Code::ShRI, 1, k);
    } else {
        let m = ctx.lit(low_mask(used));
        ctx.stk_op(Code::AndU, 1, m);
    }
}

/// Widen, shift, then clamp at one word wider than either side.
fn fixed_to_fixed_satur(ctx: &mut GenCtx, dst: &TypeFixed, src: &TypeFixed) {
    let width = src.words().max(dst.words()) + 1;
    extend(ctx, src.signed, width - src.words());
    shift_fixed(ctx, width, src.signed, dst.bits_f as i32 - src.bits_f as i32);

    let tmp = ctx.temp(width);
    let label_lo = ctx.label();
    let label_in = ctx.label();
    let label_end = ctx.label();
    ctx.store(tmp.clone());

    let max = ctx.lit_words(&raw_words(dst.max_raw(), width));
    ctx.stmt(Code::CmpIGt, width, vec![Arg::stk(1), tmp.clone(), max]);
    ctx.jcnd(Code::JcndNil, &label_lo);
    ctx.push_words(&raw_words(dst.max_raw(), width));
    ctx.jump(&label_end);

    ctx.place(&label_lo);
    let min = ctx.lit_words(&raw_words(dst.min_raw(), width));
    ctx.stmt(Code::CmpILt, width, vec![Arg::stk(1), tmp.clone(), min]);
    ctx.jcnd(Code::JcndNil, &label_in);
    ctx.push_words(&raw_words(dst.min_raw(), width));
    ctx.jump(&label_end);

    ctx.place(&label_in);
    ctx.push(tmp);

    ctx.place(&label_end);
    ctx.drop_words(width - dst.words());
}

/// Push `n` high words: copies of the sign if `signed`, zeros otherwise.
fn extend(ctx: &mut GenCtx, signed: bool, n: u32) {
    if !signed {
        ctx.push_words(&vec![0; n as usize]);
        return;
    }
    let label_pos = ctx.label();
    let label_end = ctx.label();
    ctx.dup();
    let zero = ctx.lit(0);
    ctx.stk_op(Code::CmpILt, 1, zero);
    ctx.jcnd(Code::JcndNil, &label_pos);
    ctx.push_words(&vec![u32::MAX; n as usize]);
    ctx.jump(&label_end);
    ctx.place(&label_pos);
    ctx.push_words(&vec![0; n as usize]);
    ctx.place(&label_end);
}

/// Shift by the fractional bit difference. Right shifts of signed values
/// truncate toward zero.
fn shift_fixed(ctx: &mut GenCtx, width: u32, signed: bool, diff_f: i32) {
    if diff_f > 0 {
        let k = ctx.lit(diff_f as u32);
        ctx.stk_op(Code::ShLU, width, k);
    } else if diff_f < 0 {
        let k = (-diff_f) as u32;
        if signed {
            let label_pos = ctx.label();
            ctx.dup();
            let zero = ctx.lit(0);
            ctx.stk_op(Code::CmpILt, 1, zero);
            ctx.jcnd(Code::JcndNil, &label_pos);
            let bias = ctx.lit_words(&raw_words((1i128 << k) - 1, width));
            ctx.stk_op(Code::AddU, width, bias);
            ctx.place(&label_pos);
            let k = ctx.lit(k);
            ctx.stk_op(Code::ShRI, width, k);
        } else {
            let k = ctx.lit(k);
            ctx.stk_op(Code::ShRU, width, k);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════
// Fixed to float
// ══════════════════════════════════════════════════════════════════════

fn fixed_to_float(ctx: &mut GenCtx, dst: &TypeFloat, src: &TypeFixed) {
    let diff_words = dst.words() as i64 - src.words() as i64;
    let code_words = dst.words().max(src.words());
    let exp_mid = dst.bias() as i64 + 32 * (code_words as i64 - 1) + (dst.bits_i % 32) as i64
        - src.bits_f as i64
        - 32 * diff_words.max(0);
    let man_one = mask_man(dst).wrapping_add(1);

    let label_nz = ctx.label();
    let label_end = ctx.label();
    let label_shr = ctx.label();
    let label_shr_body = ctx.label();
    let label_shl = ctx.label();
    let label_shl_body = ctx.label();

    // Zero has no leading bit to find.
    let src_tmp = ctx.temp(src.words());
    ctx.store(src_tmp.clone());
    ctx.push(src_tmp.clone());
    for _ in 1..src.words() {
        ctx.stk_op(Code::OrIU, 1, Arg::stk(1));
    }
    ctx.jcnd(Code::JcndTru, &label_nz);
    ctx.push_words(&vec![0; dst.words() as usize]);
    ctx.jump(&label_end);

    ctx.place(&label_nz);
    ctx.push(src_tmp);

    let exp = ctx.temp(1);
    let e = ctx.lit(exp_field(dst, exp_mid));
    ctx.stmt(Code::Move, 1, vec![exp.clone(), e]);

    if src.signed {
        let label_pos = ctx.label();
        ctx.dup();
        let sig = ctx.lit(mask_sig_fixed(src));
        ctx.stk_op(Code::AndU, 1, sig);
        ctx.jcnd(Code::JcndNil, &label_pos);
        let sig = ctx.lit(mask_sig_float(dst));
        ctx.stmt(Code::OrIU, 1, vec![exp.clone(), exp.clone(), sig]);
        ctx.stmt(Code::NegI, src.words(), vec![Arg::stk(src.words()), Arg::stk(src.words())]);
        ctx.place(&label_pos);
    }

    if diff_words > 0 {
        fill_low(ctx, src.words(), diff_words as u32);
    }

    // Normalize: shift right while bits sit above the implicit one...
    ctx.jump(&label_shr);
    ctx.place(&label_shr_body);
    let one = ctx.lit(1);
    ctx.stk_op(Code::ShRU, code_words, one);
    let step = ctx.lit(man_one);
    ctx.stmt(Code::AddU, 1, vec![exp.clone(), exp.clone(), step]);
    ctx.place(&label_shr);
    ctx.dup();
    let high = ctx.lit((mask_sig_float(dst) | mask_exp(dst)) << 1);
    ctx.stk_op(Code::AndU, 1, high);
    ctx.jcnd(Code::JcndTru, &label_shr_body);

    // ...then left until the implicit one is set.
    ctx.jump(&label_shl);
    ctx.place(&label_shl_body);
    let one = ctx.lit(1);
    ctx.stk_op(Code::ShLU, code_words, one);
    let step = ctx.lit(man_one);
    ctx.stmt(Code::SubU, 1, vec![exp.clone(), exp.clone(), step]);
    ctx.place(&label_shl);
    ctx.dup();
    let imp = ctx.lit(man_one);
    ctx.stk_op(Code::AndU, 1, imp);
    ctx.jcnd(Code::JcndNil, &label_shl_body);

    if diff_words < 0 {
        drop_low(ctx, dst.words(), (-diff_words) as u32);
    }
    let man = ctx.lit(mask_man(dst));
    ctx.stk_op(Code::AndU, 1, man);
    ctx.stk_op(Code::OrIU, 1, exp);

    ctx.place(&label_end);
}

/// Insert `n` zero words below a `keep`-word stack value.
fn fill_low(ctx: &mut GenCtx, keep: u32, n: u32) {
    let tmp = ctx.temp(keep);
    ctx.store(tmp.clone());
    ctx.push_words(&vec![0; n as usize]);
    ctx.push(tmp);
}

/// Remove `n` words from below a `keep`-word stack value.
fn drop_low(ctx: &mut GenCtx, keep: u32, n: u32) {
    let tmp = ctx.temp(keep);
    ctx.store(tmp.clone());
    ctx.drop_words(n);
    ctx.push(tmp);
}

// ══════════════════════════════════════════════════════════════════════
// Float to fixed
// ══════════════════════════════════════════════════════════════════════

fn float_to_fixed(ctx: &mut GenCtx, dst: &TypeFixed, src: &TypeFloat) {
    let diff_words = dst.words() as i64 - src.words() as i64;
    let bias = src.bias() as i64;
    let exp_max = bias + dst.bits_i as i64;
    let exp_mid = bias + src.bits_i as i64 - dst.bits_f as i64;
    // Zero exponents are zero or subnormal, whatever the layouts.
    let exp_min = (bias - dst.bits_f as i64).max(1);

    let label_zero = ctx.label();
    let label_gt = ctx.label();
    let label_inf = ctx.label();
    let label_lt = ctx.label();
    let label_man = ctx.label();
    let label_sig = ctx.label();
    let label_pos = ctx.label();

    let src_tmp = ctx.temp(src.words());
    ctx.store(src_tmp.clone());
    let top = src_tmp.word(src.words() - 1);

    check_exp(ctx, src, &top, Code::CmpIGe, exp_max, Code::JcndTru, &label_inf);
    check_exp(ctx, src, &top, Code::CmpIEq, 0, Code::JcndTru, &label_zero);
    check_exp(ctx, src, &top, Code::CmpIGt, exp_mid, Code::JcndTru, &label_gt);
    check_exp(ctx, src, &top, Code::CmpILt, exp_mid, Code::JcndTru, &label_lt);
    get_man(ctx, src, &src_tmp, true);
    ctx.jump(&label_man);

    // Out of range, INF and NaN.
    ctx.place(&label_inf);
    if dst.signed {
        let label_neg = ctx.label();
        let sig = ctx.lit(mask_sig_float(src));
        ctx.stmt(Code::AndU, 1, vec![Arg::stk(1), top.clone(), sig]);
        ctx.jcnd(Code::JcndTru, &label_neg);
        ctx.push_words(&raw_words(dst.max_raw(), dst.words()));
        ctx.jump(&label_pos);
        ctx.place(&label_neg);
        ctx.push_words(&raw_words(dst.min_raw(), dst.words()));
    } else {
        ctx.push_words(&raw_words(dst.max_raw(), dst.words()));
    }
    ctx.jump(&label_pos);

    ctx.place(&label_zero);
    ctx.push_words(&vec![0; dst.words() as usize]);
    ctx.jump(&label_pos);

    // Exponent above the mantissa's weight: shift left.
    ctx.place(&label_gt);
    get_man(ctx, src, &src_tmp, true);
    if diff_words > 0 {
        ctx.push_words(&vec![0; diff_words as usize]);
    }
    get_exp(ctx, src, &top);
    let mid = ctx.lit(exp_mid as u32);
    ctx.stk_op(Code::SubU, 1, mid);
    if diff_words > 0 {
        ctx.stmt(
            Code::ShLU,
            dst.words(),
            vec![Arg::stk(dst.words()), Arg::stk(dst.words()), Arg::stk(1)],
        );
        ctx.jump(&label_sig);
    } else {
        ctx.stmt(
            Code::ShLU,
            src.words(),
            vec![Arg::stk(src.words()), Arg::stk(src.words()), Arg::stk(1)],
        );
        ctx.jump(&label_man);
    }

    // Exponent below: shift right, or zero when nothing survives.
    ctx.place(&label_lt);
    check_exp(ctx, src, &top, Code::CmpILt, exp_min, Code::JcndTru, &label_zero);
    get_man(ctx, src, &src_tmp, true);
    ctx.push_u32(exp_mid as u32);
    get_exp(ctx, src, &top);
    ctx.stmt(Code::SubU, 1, vec![Arg::stk(1), Arg::stk(1), Arg::stk(1)]);
    ctx.stmt(
        Code::ShRU,
        src.words(),
        vec![Arg::stk(src.words()), Arg::stk(src.words()), Arg::stk(1)],
    );

    ctx.place(&label_man);
    if diff_words > 0 {
        ctx.push_words(&vec![0; diff_words as usize]);
    } else if diff_words < 0 {
        ctx.drop_words((-diff_words) as u32);
    }

    ctx.place(&label_sig);
    let sig = ctx.lit(mask_sig_float(src));
    ctx.stmt(Code::AndU, 1, vec![Arg::stk(1), top, sig]);
    ctx.jcnd(Code::JcndNil, &label_pos);
    if dst.satur && !dst.signed {
        ctx.drop_words(dst.words());
        ctx.push_words(&vec![0; dst.words() as usize]);
    } else {
        ctx.stmt(Code::NegI, dst.words(), vec![Arg::stk(dst.words()), Arg::stk(dst.words())]);
    }

    ctx.place(&label_pos);
}

/// Compare the biased exponent of `top` against `exp`, branching on the result.
fn check_exp(ctx: &mut GenCtx, t: &TypeFloat, top: &Arg, cmp: Code, exp: i64, jcnd: Code, label: &str) {
    let mask = ctx.lit(mask_exp(t));
    ctx.stmt(Code::AndU, 1, vec![Arg::stk(1), top.clone(), mask]);
    let e = ctx.lit(exp_field(t, exp));
    ctx.stk_op(cmp, 1, e);
    ctx.jcnd(jcnd, label);
}

/// Push the mantissa words of `src`, with the implicit one if `full`.
fn get_man(ctx: &mut GenCtx, t: &TypeFloat, src: &Arg, full: bool) {
    ctx.push(src.clone());
    let man = ctx.lit(mask_man(t));
    ctx.stk_op(Code::AndU, 1, man);
    if full {
        let one = ctx.lit(mask_man(t).wrapping_add(1));
        ctx.stk_op(Code::OrIU, 1, one);
    }
}

/// Push the biased exponent of `top` as an integer.
fn get_exp(ctx: &mut GenCtx, t: &TypeFloat, top: &Arg) {
    let mask = ctx.lit(mask_exp(t));
    ctx.stmt(Code::AndU, 1, vec![Arg::stk(1), top.clone(), mask]);
    let sh = ctx.lit(t.bits_i % 32);
    ctx.stk_op(Code::ShRI, 1, sh);
}

// ══════════════════════════════════════════════════════════════════════
// Float to float
// ══════════════════════════════════════════════════════════════════════

fn float_to_float(ctx: &mut GenCtx, dst: &TypeFloat, src: &TypeFloat) {
    let diff_words = dst.words() as i64 - src.words() as i64;
    let diff_f = dst.bits_f as i64 - src.bits_f as i64;
    let diff_i = (dst.bits_i % 32) as i64 - (src.bits_i % 32) as i64;
    if diff_words == 0 && diff_f == 0 && diff_i == 0 {
        return;
    }

    let (exp_max, exp_min) = if diff_f < 0 {
        let sb = src.bias() as i64;
        let db = dst.bias() as i64;
        (sb + db + 1, sb - db)
    } else {
        (src.exp_max() as i64, 0)
    };

    let label_inf = ctx.label();
    let label_zero = ctx.label();
    let label_man = ctx.label();
    let label_sig = ctx.label();

    let src_tmp = ctx.temp(src.words());
    ctx.store(src_tmp.clone());
    let top = src_tmp.word(src.words() - 1);

    // NaN.
    let body = ctx.lit(mask_man(src) | mask_exp(src));
    ctx.stmt(Code::AndU, 1, vec![Arg::stk(1), top.clone(), body]);
    let exp = ctx.lit(mask_exp(src));
    ctx.stk_op(Code::CmpIGt, 1, exp);
    ctx.jcnd(Code::JcndNil, &label_inf);
    ctx.push_words(&vec![u32::MAX; dst.words() as usize - 1]);
    ctx.push_u32(0x7FFF_FFFF);
    ctx.jump(&label_sig);

    // INF, or too large for the destination.
    ctx.place(&label_inf);
    check_exp(ctx, src, &top, Code::CmpIGe, exp_max, Code::JcndNil, &label_zero);
    ctx.push_words(&vec![0; dst.words() as usize - 1]);
    ctx.push_u32(mask_exp(dst));
    ctx.jump(&label_sig);

    // Zero, subnormal, or too small for the destination.
    ctx.place(&label_zero);
    check_exp(ctx, src, &top, Code::CmpILe, exp_min, Code::JcndNil, &label_man);
    ctx.push_words(&vec![0; dst.words() as usize]);
    ctx.jump(&label_sig);

    ctx.place(&label_man);
    if diff_words > 0 {
        ctx.push_words(&vec![0; diff_words as usize]);
    }
    get_man(ctx, src, &src_tmp, false);
    let shift_words = dst.words().max(src.words());
    if diff_i > 0 {
        let k = ctx.lit(diff_i as u32);
        ctx.stk_op(Code::ShLU, shift_words, k);
    } else if diff_i < 0 {
        let k = ctx.lit((-diff_i) as u32);
        ctx.stk_op(Code::ShRU, shift_words, k);
    }
    if diff_words < 0 {
        drop_low(ctx, dst.words(), (-diff_words) as u32);
    }

    // Rebias the exponent into the destination field.
    let mask = ctx.lit(mask_exp(src));
    ctx.stmt(Code::AndU, 1, vec![Arg::stk(1), top.clone(), mask]);
    if diff_f > 0 {
        let k = ctx.lit(diff_f as u32);
        ctx.stk_op(Code::ShRI, 1, k);
        let rebias = dst.bias() as i64 - src.bias() as i64;
        let r = ctx.lit(exp_field(dst, rebias));
        ctx.stk_op(Code::AddU, 1, r);
    } else if diff_f < 0 {
        let rebias = src.bias() as i64 - dst.bias() as i64;
        let r = ctx.lit(exp_field(src, rebias));
        ctx.stk_op(Code::SubU, 1, r);
        let k = ctx.lit((-diff_f) as u32);
        ctx.stk_op(Code::ShLU, 1, k);
    } else if diff_i != 0 {
        let k = ctx.lit(diff_i.unsigned_abs() as u32);
        let code = if diff_i > 0 { Code::ShLU } else { Code::ShRI };
        ctx.stk_op(code, 1, k);
    }
    ctx.stk_op(Code::OrIU, 1, Arg::stk(1));

    ctx.place(&label_sig);
    let sig = ctx.lit(mask_sig_float(src));
    ctx.stmt(Code::AndU, 1, vec![Arg::stk(1), top, sig]);
    ctx.stk_op(Code::OrIU, 1, Arg::stk(1));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_masks() {
        let f = TypeFloat::f32();
        assert_eq!(mask_exp(&f), 0x7F80_0000);
        assert_eq!(mask_man(&f), 0x007F_FFFF);
        assert_eq!(mask_sig_float(&f), 0x8000_0000);

        let d = TypeFloat::f64();
        assert_eq!(mask_exp(&d), 0x7FF0_0000);
        assert_eq!(mask_man(&d), 0x000F_FFFF);
        assert_eq!(mask_sig_float(&d), 0x8000_0000);
    }

    #[test]
    fn raw_words_sign_extend() {
        assert_eq!(raw_words(-1, 2), vec![u32::MAX, u32::MAX]);
        assert_eq!(raw_words(0x7FFF_FFFF, 2), vec![0x7FFF_FFFF, 0]);
        assert_eq!(raw_words(-0x8000_0000, 2), vec![0x8000_0000, u32::MAX]);
    }

    #[test]
    fn identity_conversion_emits_nothing() {
        let mut exps = ExpArena::new();
        let mut f = Function::new("f");
        let mut ctx = GenCtx::new(&mut exps, &mut f, Origin::none());
        convert_arith(&mut ctx, &Type::word(), &Type::word()).unwrap();
        assert!(ctx.finish().is_empty());
    }
}
