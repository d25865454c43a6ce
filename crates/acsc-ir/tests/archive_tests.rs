//! Integration tests for the IR archive codec.

use acsc_ir::archive::{decode, encode, ArchiveError};
use acsc_ir::{
    AddrBase, AddrSpace, Arg, BinOp, CallType, Code, Function, Linkage, Object, Origin, Program,
    StrEnt, Type, TypeFixed, TypeFloat, Value,
};
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// A program touching every construct of the data model.
fn sample_program() -> Program {
    let mut p = Program::new();
    let pos = Origin::new("sample.c", 3);

    let big = p.exps.value(Value::fixed(-(1 << 40), TypeFixed::int(64, true)), pos.clone());
    let flt = p.exps.value(Value::float(f64::NAN, TypeFloat::f32()), pos.clone());
    let one = p.exps.lit_u32(1, pos.clone());
    let sym = p.exps.glyph("counter", pos.clone());
    let sum = p.exps.binary(BinOp::Add, sym, one, pos.clone());
    let tup = p.exps.tuple(vec![big, flt], pos.clone());
    let arr = p.exps.array(Type::word(), vec![one, one], pos.clone());
    let cst = p.exps.cst(Type::Point, one, pos.clone());

    p.glyphs.set_type("counter", Type::word());
    p.glyphs.set_value("counter", one);

    let mut f = Function::new("main");
    f.ctype = CallType::ScriptS;
    f.linka = Linkage::ExtAcs;
    f.defin = true;
    f.value_str = Some("main".into());
    f.local_reg = 2;
    f.block.add_label("top");
    let r0 = Arg::loc_reg(1, Arg::lit(1, one), 0);
    f.block.add_stmnt(Code::Move, vec![r0.clone(), Arg::lit(1, sum)], pos.clone());
    f.block.add_stmnt(
        Code::AddU,
        vec![Arg::stk(1), r0, Arg::gbl_arr(1, Arg::lit(1, one), Arg::stk(1), 2)],
        pos.clone(),
    );
    f.block.add_stmnt(Code::Move, vec![Arg::nul(2), Arg::lit(2, tup)], pos.clone());
    f.block.add_stmnt(Code::Move, vec![Arg::nul(2), Arg::lit(2, arr)], pos.clone());
    f.block.add_stmnt(Code::Move, vec![Arg::nul(1), Arg::lit(1, cst)], pos.clone());
    f.block.add_stmnt(Code::Retn, vec![], pos.clone());
    f.gen_label();
    p.add_function(f);

    let mut o = Object::new("table", AddrSpace::new(AddrBase::HubArr, "hub0"), 2);
    o.initi = Some(arr);
    p.add_object(o);
    p.get_space(AddrBase::HubArr, "hub0");
    p.add_str(StrEnt::new("STR$0", "hello"));
    p.add_import("acsclib");
    p
}

// ══════════════════════════════════════════════════════════════════════════════
// Round trip
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn every_construct_round_trips() {
    let p = sample_program();
    let bytes = encode(&p).unwrap();
    let back = decode(&bytes).unwrap();
    assert_eq!(back, p);
}

#[test]
fn decoded_arena_interns_again() {
    let p = sample_program();
    let mut back = decode(&encode(&p).unwrap()).unwrap();
    let before = back.exps.len();
    back.exps.lit_u32(1, Origin::none());
    assert_eq!(back.exps.len(), before);
}

#[test]
fn encoding_is_deterministic() {
    let p = sample_program();
    assert_eq!(encode(&p).unwrap(), encode(&p).unwrap());
}

// ══════════════════════════════════════════════════════════════════════════════
// Corruption
// ══════════════════════════════════════════════════════════════════════════════

fn reseal(body: &str) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    let digest: String = Sha256::digest(body.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("{{\"magic\":\"acsc-ir\",\"version\":1,\"digest\":\"{digest}\"}}\n{body}").into_bytes()
}

fn body_of(bytes: &[u8]) -> String {
    let s = String::from_utf8(bytes.to_vec()).unwrap();
    s.split_once('\n').unwrap().1.to_string()
}

#[test]
fn unknown_tag_is_rejected() {
    let body = body_of(&encode(&sample_program()).unwrap()).replace("\"AddU\"", "\"AddQ\"");
    assert!(matches!(decode(&reseal(&body)), Err(ArchiveError::Body(_))));
}

#[test]
fn unknown_expression_tag_is_rejected() {
    let body = body_of(&encode(&sample_program()).unwrap()).replace("\"Binary\"", "\"Ternary\"");
    assert!(matches!(decode(&reseal(&body)), Err(ArchiveError::Body(_))));
}

#[test]
fn tampered_body_fails_digest() {
    let mut bytes = encode(&sample_program()).unwrap();
    let last = bytes.len() - 2;
    bytes[last] = b' ';
    assert!(matches!(decode(&bytes), Err(ArchiveError::Digest)));
}

#[test]
fn wrong_magic_and_version() {
    let bytes = b"{\"magic\":\"elf\",\"version\":1,\"digest\":\"\"}\n{}".to_vec();
    assert!(matches!(decode(&bytes), Err(ArchiveError::Magic(m)) if m == "elf"));
    let bytes = b"{\"magic\":\"acsc-ir\",\"version\":9,\"digest\":\"\"}\n{}".to_vec();
    assert!(matches!(decode(&bytes), Err(ArchiveError::Version(9))));
}

#[test]
fn forward_reference_is_invalid() {
    let p = sample_program();
    let body = body_of(&encode(&p).unwrap());
    let n = p.exps.len();
    let bad = body.replacen("{\"Binary\":[\"Add\",3,", &format!("{{\"Binary\":[\"Add\",{n},"), 1);
    assert_ne!(bad, body);
    assert!(matches!(decode(&reseal(&bad)), Err(ArchiveError::Invalid(_))));
}
