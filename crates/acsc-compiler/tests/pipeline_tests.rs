//! End-to-end pipeline tests: archives in, bytecode or archives out.

use acsc_codegen::{BytecodeInfo, CodegenResult, LegalizeStatus, RestartReason};
use acsc_compiler::error::{EXIT_ARCHIVE, EXIT_INTERNAL, EXIT_USER};
use acsc_compiler::{exit_code, legalize, link, process_ir, put_bytecode, report, LinkError, Options};
use acsc_ir::{archive, Arg, Code, Function, Origin, Program, Statement, Type, Value};
use pretty_assertions::assert_eq;
use std::io::Write;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn loc(p: &mut Program, i: u32) -> Arg {
    let idx = Arg::lit(1, p.exps.lit_u32(0, Origin::none()));
    Arg::loc_reg(1, idx, i)
}

/// `name(a, b) = a + b`.
fn add_module(name: &str) -> Program {
    let mut p = Program::new();
    let (a, b) = (loc(&mut p, 0), loc(&mut p, 1));
    let mut f = Function::new(name);
    f.param = 2;
    f.retrn = 1;
    f.local_reg = 2;
    f.defin = true;
    f.pos = Origin::new("add.ir", 1);
    f.block.add(Statement::new(Code::AddU, 1, vec![Arg::stk(1), a, b], Origin::none()));
    f.block.add(Statement::new(Code::Retn, 1, vec![Arg::stk(1)], Origin::none()));
    p.add_function(f);
    p
}

fn encode(p: &Program) -> Vec<u8> {
    archive::encode(p).unwrap()
}

/// Chunk names of an `ACSE` container, in file order.
fn chunks(bytes: &[u8]) -> Vec<String> {
    let mut at = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let mut names = Vec::new();
    while at + 8 <= bytes.len() {
        names.push(String::from_utf8_lossy(&bytes[at..at + 4]).into_owned());
        at += 8 + u32::from_le_bytes(bytes[at + 4..at + 8].try_into().unwrap()) as usize;
    }
    names
}

/// A backend whose legalize never settles.
struct Restless;

impl BytecodeInfo for Restless {
    fn name(&self) -> &'static str {
        "restless"
    }

    fn legalize(&mut self, _: &mut Program) -> CodegenResult<LegalizeStatus> {
        Ok(LegalizeStatus::Restart(RestartReason::HelperDefined("again".into())))
    }

    fn translate(&mut self, _: &mut Program) -> CodegenResult<()> {
        Ok(())
    }

    fn generate(&mut self, _: &mut Program) -> CodegenResult<()> {
        Ok(())
    }

    fn emit(&mut self, _: &Program, _: &mut dyn Write) -> CodegenResult<()> {
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Linking
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn links_modules_to_bytecode() {
    init_test_logging();
    let inputs = vec![encode(&add_module("add")), encode(&add_module("plus"))];
    let bytes = link(&inputs, &Options::default()).unwrap();
    assert_eq!(&bytes[..4], b"ACSE");
    assert_eq!(chunks(&bytes), vec!["FNAM", "FUNC"]);
}

#[test]
fn links_modules_to_archive() {
    let opts = Options {
        output_ir: true,
        ..Options::default()
    };
    let inputs = vec![encode(&add_module("add")), encode(&add_module("plus"))];
    let prog = archive::decode(&link(&inputs, &opts).unwrap()).unwrap();
    assert_eq!(prog.functions.keys().collect::<Vec<_>>(), vec!["add", "plus"]);
}

#[test]
fn definition_replaces_declaration() {
    let mut decl = Program::new();
    decl.add_function(Function::new("add"));
    let opts = Options {
        output_ir: true,
        ..Options::default()
    };
    let bytes = link(&[encode(&decl), encode(&add_module("add"))], &opts).unwrap();
    assert!(archive::decode(&bytes).unwrap().functions["add"].defin);
}

#[test]
fn libraries_become_imports() {
    let opts = Options {
        libraries: vec!["acsclib".into(), "acsclib".into()],
        ..Options::default()
    };
    let bytes = link(&[encode(&add_module("add"))], &opts).unwrap();
    assert!(chunks(&bytes).contains(&"LOAD".to_string()));
    assert!(bytes.windows(8).any(|w| w == b"acsclib\0"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Failures
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn multiple_definitions_are_user_errors() {
    let inputs = vec![encode(&add_module("add")), encode(&add_module("add"))];
    let err = link(&inputs, &Options::default()).unwrap_err();
    assert_eq!(exit_code(&err), EXIT_USER);
    assert_eq!(report(&err), "add.ir:1: multiple definition of add");
}

#[test]
fn corrupt_archives_are_rejected() {
    let mut bytes = encode(&add_module("add"));
    let last = bytes.len() - 2;
    bytes[last] ^= 1;
    let err = link(&[bytes], &Options::default()).unwrap_err();
    assert_eq!(exit_code(&err), EXIT_ARCHIVE);
}

#[test]
fn restart_guard_stops_runaway_legalize() {
    let err = legalize(&mut Program::new(), &mut Restless).unwrap_err();
    assert!(matches!(err, LinkError::RestartLimit(_)));
    assert_eq!(exit_code(&err), EXIT_INTERNAL);
    assert!(report(&err).starts_with("internal error: "));
    assert!(process_ir(&mut Program::new(), &mut Restless).is_err());
}

#[test]
fn failed_build_writes_nothing() {
    let mut p = Program::new();
    let src = Arg::lit(1, p.exps.lit_u32(1, Origin::none()));
    let dst_t = Arg::lit(1, p.exps.value(Value::zero(&Type::Tuple(vec![Type::word()])), Origin::none()));
    let src_t = Arg::lit(1, p.exps.value(Value::word(0), Origin::none()));
    let mut f = Function::new("bad");
    f.defin = true;
    f.block.add(Statement::new(
        Code::Conv,
        1,
        vec![Arg::stk(1), src, dst_t, src_t],
        Origin::new("bad.ir", 7),
    ));
    p.add_function(f);

    let mut out = Vec::new();
    let err = put_bytecode(&mut p, &Options::default(), &mut out).unwrap_err();
    assert_eq!(exit_code(&err), EXIT_USER);
    assert!(out.is_empty());
}
