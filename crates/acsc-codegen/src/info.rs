//! The backend contract and shared statement checks.

use crate::error::{CodegenError, CodegenResult};
use crate::optimize;
use acsc_ir::{ArgBase, Program, Statement};
use std::io::Write;

/// Why legalize asked to be rerun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// A helper function was added to the program.
    HelperDefined(String),
}

/// Outcome of one legalize pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegalizeStatus {
    Complete,
    Restart(RestartReason),
}

/// One target's pipeline hooks.
pub trait BytecodeInfo {
    /// Short target name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Rewrite unsupported operations. Runs until it returns `Complete`.
    fn legalize(&mut self, prog: &mut Program) -> CodegenResult<LegalizeStatus>;

    fn optimize(&mut self, prog: &mut Program) -> CodegenResult<()> {
        optimize::optimize(prog);
        Ok(())
    }

    fn translate(&mut self, prog: &mut Program) -> CodegenResult<()>;

    fn generate(&mut self, prog: &mut Program) -> CodegenResult<()>;

    fn emit(&mut self, prog: &Program, out: &mut dyn Write) -> CodegenResult<()>;
}

/// Fail unless `stmt` has exactly `n` operands.
pub fn check_arg_count(stmt: &Statement, n: usize) -> CodegenResult<()> {
    if stmt.args.len() == n {
        Ok(())
    } else {
        Err(CodegenError::ArgCount {
            pos: stmt.pos.clone(),
            code: stmt.code,
            expected: n.to_string(),
            found: stmt.args.len(),
        })
    }
}

/// Fail unless `stmt` has an operand count its opcode accepts.
pub fn check_arity(stmt: &Statement) -> CodegenResult<()> {
    let arity = stmt.code.arity();
    if arity.accepts(stmt.args.len()) {
        Ok(())
    } else {
        Err(CodegenError::ArgCount {
            pos: stmt.pos.clone(),
            code: stmt.code,
            expected: arity.to_string(),
            found: stmt.args.len(),
        })
    }
}

/// Fail unless operand `i` of `stmt` lives in `base`.
pub fn check_arg_base(stmt: &Statement, i: usize, base: ArgBase) -> CodegenResult<()> {
    match stmt.args.get(i) {
        Some(a) if a.base() == base => Ok(()),
        Some(a) => Err(CodegenError::ArgBase {
            pos: stmt.pos.clone(),
            code: stmt.code,
            index: i,
            base: a.base(),
        }),
        None => check_arg_count(stmt, i + 1),
    }
}
