//! Integration tests for the ZDoom ACS lowering passes.
//!
//! Lowered IR is executed in the reference interpreter and compared with
//! the value model, so conversions and helper bodies are checked by what
//! they compute rather than by their exact statement sequences.

use acsc_codegen::zdacs::generate::CODE_BASE;
use acsc_codegen::zdacs::init::{Slot, FLAG_CLIENTSIDE};
use acsc_codegen::zdacs::pcode::size_of;
use acsc_codegen::{BytecodeInfo, Engine, InitOptions, LegalizeStatus, ZdacsInfo};
use acsc_eval::{ops, Machine};
use acsc_ir::{
    AddrBase, AddrSpace, Arg, CallType, Code, Function, Object, Origin, Program, Statement, StrEnt, Type, TypeFixed,
    TypeFloat, Value,
};
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pos() -> Origin {
    Origin::none()
}

fn loc(p: &mut Program, size: u32, i: u32) -> Arg {
    let idx = Arg::lit(1, p.exps.lit_u32(0, pos()));
    Arg::loc_reg(size, idx, i)
}

fn type_arg(p: &mut Program, ty: &Type) -> Arg {
    Arg::lit(1, p.exps.value(Value::zero(ty), pos()))
}

fn define(p: &mut Program, name: &str, param: u32, retrn: u32, stmts: Vec<Statement>) {
    let mut f = Function::new(name);
    f.param = param;
    f.retrn = retrn;
    f.local_reg = param;
    f.defin = true;
    for s in stmts {
        f.block.add(s);
    }
    p.add_function(f);
}

fn stmt(code: Code, size: u32, args: Vec<Arg>) -> Statement {
    Statement::new(code, size, args, pos())
}

/// Run legalize to completion, returning the number of restarts.
fn legalize(p: &mut Program, info: &mut ZdacsInfo) -> usize {
    let mut restarts = 0;
    while info.legalize(p).unwrap() != LegalizeStatus::Complete {
        restarts += 1;
        assert!(restarts < 64, "legalize does not converge");
    }
    restarts
}

fn process(p: &mut Program, info: &mut ZdacsInfo) {
    legalize(p, info);
    info.optimize(p).unwrap();
    info.translate(p).unwrap();
    info.optimize(p).unwrap();
    info.translate(p).unwrap();
}

/// `conv(x) = (dst) x`, lowered.
fn lowered_conv(dst: &Type, src: &Type) -> Program {
    let mut p = Program::new();
    let (dst_t, src_t) = (type_arg(&mut p, dst), type_arg(&mut p, src));
    let x = loc(&mut p, src.words(), 0);
    define(
        &mut p,
        "conv",
        src.words(),
        dst.words(),
        vec![
            stmt(Code::Conv, dst.words(), vec![Arg::stk(dst.words()), x, dst_t, src_t]),
            stmt(Code::Retn, dst.words(), vec![Arg::stk(dst.words())]),
        ],
    );
    legalize(&mut p, &mut ZdacsInfo::default());
    p
}

/// Raw result words, before any re-normalization by the value model.
fn conv_words(v: &Value, dst: &Type) -> Vec<u32> {
    let p = lowered_conv(dst, &v.ty());
    Machine::new(&p).call("conv", &v.to_words()).unwrap()
}

fn run_conv(v: &Value, dst: &Type) -> Value {
    Value::from_words(dst, &conv_words(v, dst)).unwrap()
}

fn fix16(x: f64) -> Value {
    Value::fixed((x * 65536.0) as i128, TypeFixed::acs_fixed())
}

fn f32v(x: f64) -> Value {
    Value::float(x, TypeFloat::f32())
}

// ══════════════════════════════════════════════════════════════════════════════
// Conversions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn fixed_to_int_truncates_toward_zero() {
    init_test_logging();
    assert_eq!(run_conv(&fix16(1.5), &Type::word()), Value::word(1));
    assert_eq!(run_conv(&fix16(-1.5), &Type::word()), Value::word(-1));
}

#[test]
fn fixed_to_wider_int_sign_extends() {
    let dst = Type::Fixed(TypeFixed::int(64, true));
    assert_eq!(run_conv(&fix16(-1.5), &dst).to_words(), vec![0xFFFF_FFFF, 0xFFFF_FFFF]);
    assert_eq!(run_conv(&fix16(2.5), &dst).to_words(), vec![2, 0]);
}

#[test]
fn int_to_fixed_matches_value_model() {
    let dst = Type::Fixed(TypeFixed::acs_fixed());
    for i in [0, 1, -1, 3, -7, 0x7FFF] {
        let v = Value::word(i);
        assert_eq!(run_conv(&v, &dst), v.convert(&dst).unwrap(), "converting {i}");
    }
}

#[test]
fn narrowing_to_sub_word_ints_wraps() {
    for dst in [TypeFixed::int(8, true), TypeFixed::int(16, false)] {
        let dst = Type::Fixed(dst);
        for i in [0, 44, 300, -200, 200, -1, 70000, i32::MIN] {
            let v = Value::word(i);
            let want = v.convert(&dst).unwrap().to_words();
            assert_eq!(conv_words(&v, &dst), want, "converting {i} to {dst}");
        }
    }
    assert_eq!(conv_words(&Value::word(300), &Type::Fixed(TypeFixed::int(8, true))), vec![44]);
    assert_eq!(conv_words(&Value::word(-1), &Type::Fixed(TypeFixed::int(16, false))), vec![0xFFFF]);
}

#[test]
fn sub_word_sources_widen_by_sign() {
    let dst = Type::word();
    let v = Value::fixed(-56, TypeFixed::int(8, true));
    assert_eq!(conv_words(&v, &dst), vec![0xFFFF_FFC8]);
    let v = Value::fixed(0xFFFF, TypeFixed::int(16, false));
    assert_eq!(conv_words(&v, &dst), vec![0xFFFF]);
}

#[test]
fn saturating_destination_clamps() {
    let t = TypeFixed::new(7, 8, true, true);
    let dst = Type::Fixed(t);
    assert_eq!(run_conv(&fix16(300.0), &dst).raw(), Some(t.max_raw()));
    assert_eq!(run_conv(&fix16(-300.0), &dst).raw(), Some(t.min_raw()));
}

#[test]
fn int_to_float_matches_value_model() {
    let dst = Type::Float(TypeFloat::f32());
    for i in [0, 1, -1, 3, 1000, i32::MIN, 0x0100_0001] {
        let v = Value::word(i);
        assert_eq!(run_conv(&v, &dst).to_words(), v.convert(&dst).unwrap().to_words(), "converting {i}");
    }
}

#[test]
fn float_to_int_boundaries() {
    let dst = Type::word();
    let cases = [
        (0.0, 0),
        (-2.75, -2),
        (1.0e-6, 0),
        (1.0e20, i32::MAX),
        (-1.0e20, i32::MIN),
        (f64::INFINITY, i32::MAX),
    ];
    for (x, want) in cases {
        assert_eq!(run_conv(&f32v(x), &dst), Value::word(want), "converting {x}");
    }
}

#[test]
fn small_exponent_float_to_fixed() {
    let half = TypeFloat::new(10, 5);
    let dst = Type::Fixed(TypeFixed::acs_fixed());
    for x in [0.0, -0.0, 2f64.powi(-14), 1.0, -2.5, 1000.0] {
        let v = Value::float(x, half);
        assert_eq!(run_conv(&v, &dst), v.convert(&dst).unwrap(), "converting {x}");
    }
    assert_eq!(run_conv(&Value::float(0.0, half), &dst).raw(), Some(0));
    assert_eq!(run_conv(&Value::float(2f64.powi(-14), half), &dst).raw(), Some(4));
}

#[test]
fn float_to_fixed_saturates() {
    let dst = Type::Fixed(TypeFixed::acs_fixed());
    assert_eq!(run_conv(&f32v(1.0e9), &dst).to_words(), vec![0x7FFF_FFFF]);
    assert_eq!(run_conv(&f32v(-1.0e9), &dst).to_words(), vec![0x8000_0000]);
    assert_eq!(run_conv(&f32v(1.5), &dst), fix16(1.5));
}

#[test]
fn float_widening_and_narrowing() {
    let f64t = Type::Float(TypeFloat::f64());
    let f32t = Type::Float(TypeFloat::f32());
    let bits = 1.5f64.to_bits();
    assert_eq!(run_conv(&f32v(1.5), &f64t).to_words(), vec![bits as u32, (bits >> 32) as u32]);

    let big = Value::float(1.0e300, TypeFloat::f64());
    assert_eq!(run_conv(&big, &f32t).to_words(), vec![0x7F80_0000]);
    let tiny = Value::float(-1.0e-300, TypeFloat::f64());
    assert_eq!(run_conv(&tiny, &f32t).to_words(), vec![0x8000_0000]);
}

#[test]
fn float_nan_takes_the_signed_bound() {
    let f64t = Type::Float(TypeFloat::f64());
    let f32t = Type::Float(TypeFloat::f32());
    let nan = Value::from_words(&f64t, &[0, 0x7FF8_0000]).unwrap();
    assert_eq!(run_conv(&nan, &f32t).to_words(), vec![0x7FFF_FFFF]);
    let neg_nan = Value::from_words(&f64t, &[0, 0xFFF8_0000]).unwrap();
    assert_eq!(run_conv(&neg_nan, &f32t).to_words(), vec![0xFFFF_FFFF]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers and legalize
// ══════════════════════════════════════════════════════════════════════════════

/// `op(a, b)` at `size` words, lowered.
fn lowered_binary(code: Code, size: u32) -> Program {
    let mut p = Program::new();
    let (a, b) = (loc(&mut p, size, 0), loc(&mut p, size, size));
    let r = code.result_size(size);
    define(
        &mut p,
        "op",
        2 * size,
        r,
        vec![
            stmt(code, size, vec![Arg::stk(r), a, b]),
            stmt(Code::Retn, r, vec![Arg::stk(r)]),
        ],
    );
    legalize(&mut p, &mut ZdacsInfo::default());
    p
}

#[test]
fn synthesized_helpers_compute_generic_results() {
    let cases: &[(Code, u32, [u32; 4])] = &[
        (Code::AddU, 2, [0xFFFF_FFFF, 0, 1, 0]),
        (Code::SubU, 2, [0, 1, 1, 0]),
        (Code::CmpULt, 1, [1, 0xFFFF_FFFF, 0, 0]),
        (Code::CmpUGe, 1, [0x8000_0000, 5, 0, 0]),
        (Code::CmpUEq, 2, [7, 9, 7, 9]),
        (Code::CmpILt, 2, [0, 0xFFFF_FFFF, 0, 0]),
    ];
    for &(code, size, words) in cases {
        let p = lowered_binary(code, size);
        let args = &words[..2 * size as usize];
        let got = Machine::new(&p).call("op", args).unwrap();
        let (a, b) = args.split_at(size as usize);
        let want = ops::apply(code, size, &[a.to_vec(), b.to_vec()]).unwrap();
        assert_eq!(got, want, "{code}_W{size}");
    }
}

#[test]
fn missing_helper_restarts_once_per_definition() {
    let mut p = Program::new();
    let (a, b) = (loc(&mut p, 2, 0), loc(&mut p, 2, 2));
    define(&mut p, "op", 4, 2, vec![stmt(Code::AddU, 2, vec![Arg::stk(2), a, b])]);

    let restarts = legalize(&mut p, &mut ZdacsInfo::default());
    assert!(restarts >= 1);
    assert!(p.functions.contains_key(&Code::AddU.helper_name(2)));

    let before = p.clone();
    assert_eq!(legalize(&mut p, &mut ZdacsInfo::default()), 0);
    assert_eq!(p, before);
}

#[test]
fn undefined_helpers_are_declared_external() {
    let p = lowered_binary(Code::DivU, 1);
    let helper = &p.functions[&Code::DivU.helper_name(1)];
    assert!(!helper.defin);
    assert_eq!(helper.ctype, CallType::StkCall);
    assert_eq!(Machine::new(&p).call("op", &[7, 2]).unwrap(), vec![3]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Translate
// ══════════════════════════════════════════════════════════════════════════════

fn mixed_program() -> Program {
    let mut p = Program::new();
    let (a, b) = (loc(&mut p, 1, 0), loc(&mut p, 1, 1));
    let t = loc(&mut p, 1, 2);
    let (a2, b2) = (loc(&mut p, 2, 0), loc(&mut p, 2, 2));
    let three = Arg::lit(1, p.exps.lit_u32(3, pos()));
    define(
        &mut p,
        "arith",
        2,
        1,
        vec![
            stmt(Code::MulU, 1, vec![t.clone(), a.clone(), three]),
            stmt(Code::AddU, 1, vec![t.clone(), t.clone(), b.clone()]),
            stmt(Code::SubU, 1, vec![Arg::stk(1), t, a]),
            stmt(Code::Retn, 1, vec![Arg::stk(1)]),
        ],
    );
    define(
        &mut p,
        "wide",
        4,
        2,
        vec![
            stmt(Code::AndU, 2, vec![Arg::stk(2), a2, b2]),
            stmt(Code::Retn, 2, vec![Arg::stk(2)]),
        ],
    );
    if let Some(f) = p.functions.get_mut("arith") {
        f.local_reg = 3;
    }
    p
}

#[test]
fn translate_is_total_on_legalized_programs() {
    init_test_logging();
    let mut p = mixed_program();
    let mut info = ZdacsInfo::default();
    process(&mut p, &mut info);

    let once = p.clone();
    info.translate(&mut p).unwrap();
    assert_eq!(p, once);
}

#[test]
fn translated_code_computes_the_same_results() {
    let source = mixed_program();
    let mut p = source.clone();
    process(&mut p, &mut ZdacsInfo::default());

    assert_eq!(
        Machine::new(&p).call("arith", &[5, 4]).unwrap(),
        Machine::new(&source).call("arith", &[5, 4]).unwrap()
    );
    assert_eq!(Machine::new(&p).call("arith", &[5, 4]).unwrap(), vec![14]);
    assert_eq!(
        Machine::new(&p).call("wide", &[0xF0, 0xFF, 0x3C, 0x0F]).unwrap(),
        vec![0x30, 0x0F]
    );
}

#[test]
fn optimize_reaches_a_fixed_point() {
    let mut p = mixed_program();
    let mut info = ZdacsInfo::default();
    process(&mut p, &mut info);
    let settled = p.clone();
    info.optimize(&mut p).unwrap();
    assert_eq!(p, settled);
}

// ══════════════════════════════════════════════════════════════════════════════
// Generate and emit
// ══════════════════════════════════════════════════════════════════════════════

fn build(p: &mut Program, info: &mut ZdacsInfo) -> Vec<u8> {
    process(p, info);
    info.generate(p).unwrap();
    let mut out = Vec::new();
    info.emit(p, &mut out).unwrap();
    out
}

fn data_program() -> Program {
    let mut p = mixed_program();
    p.add_str(StrEnt::new("str0", "hello"));

    let mut o = Object::new("counts", AddrSpace::new(AddrBase::GblArr, "globals"), 3);
    let items = vec![p.exps.lit_u32(4, pos()), p.exps.lit_u32(0, pos()), p.exps.lit_u32(9, pos())];
    o.initi = Some(p.exps.tuple(items, pos()));
    p.add_object(o);

    let mut o = Object::new("greeting", AddrSpace::new(AddrBase::HubArr, "shared"), 1);
    o.initi = Some(p.exps.glyph("str0", pos()));
    p.add_object(o);

    let mut o = Object::new("handler", AddrSpace::new(AddrBase::HubArr, "shared"), 1);
    o.initi = Some(p.exps.glyph("arith", pos()));
    p.add_object(o);
    p
}

#[test]
fn init_script_size_matches_plan() {
    init_test_logging();
    let mut p = data_program();
    let mut info = ZdacsInfo::default();
    let bytes = build(&mut p, &mut info);

    let layout = info.layout().unwrap();
    let init = layout.init.as_ref().unwrap();
    let code = init.emit().unwrap();
    assert_eq!(init.code_init + size_of(&code), init.code_end);
    assert_eq!(init.code_end, layout.code_end);
    assert_eq!(&bytes[4..8], &layout.code_end.to_le_bytes());

    // Two guards, four nonzero slots, two flags and the terminator.
    let slots = 24 + 24 + 28 + 24;
    assert_eq!(init.code_end - init.code_init, 24 + 24 + slots + 24 + 24 + 4);
}

#[test]
fn function_initializer_uses_function_index() {
    let mut p = data_program();
    let mut info = ZdacsInfo::default();
    build(&mut p, &mut info);
    let init = info.layout().unwrap().init.clone().unwrap();
    let funcs: Vec<_> = init
        .hub
        .iter()
        .flat_map(|a| a.slots.iter())
        .filter(|s| matches!(s, Slot::Funct(_)))
        .collect();
    assert_eq!(funcs, vec![&Slot::Funct(0)]);
    assert_eq!(p.functions["arith"].value_int, 0);
}

#[test]
fn zandronum_adds_clientside_entry() {
    let mut p = data_program();
    let mut info = ZdacsInfo::new(Engine::Zandronum, InitOptions::default(), "mod");
    build(&mut p, &mut info);
    let scripts = &info.layout().unwrap().scripts;
    assert_eq!(scripts.iter().map(|s| s.number).collect::<Vec<_>>(), vec![999, 1000]);
    assert_eq!(scripts[1].flags, FLAG_CLIENTSIDE);
}

#[test]
fn code_starts_after_header() {
    let mut p = mixed_program();
    let mut info = ZdacsInfo::default();
    let bytes = build(&mut p, &mut info);
    let layout = info.layout().unwrap();
    assert!(layout.init.is_none());
    assert_eq!(layout.funcs[0].addr, CODE_BASE);
    assert_eq!(&bytes[..4], b"ACSE");
    assert!(bytes.windows(4).any(|w| w == b"FUNC"));
}
