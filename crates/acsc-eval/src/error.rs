//! Runtime error types for the IR interpreter.

use acsc_ir::Diagnostic;
use std::fmt;

/// Evaluation error: traps, missing symbols and unsupported operations.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// Division by zero and friends.
    ArithmeticTrap(String),
    /// Read from an empty operand stack.
    StackUnderflow,
    /// Call to a function with no body and no reference implementation.
    UndefinedFunction(String),
    /// Jump to a label not bound in the current function.
    UndefinedLabel(String),
    /// Operand shape the interpreter cannot handle.
    BadOperand(String),
    /// Operation outside the interpreter's reach (natives, raw pcodes).
    Unsupported(String),
    /// Folding a literal failed.
    Ir(Diagnostic),
    /// Gas exhaustion
    GasExhausted,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArithmeticTrap(msg) => write!(f, "arithmetic trap: {msg}"),
            Self::StackUnderflow => write!(f, "operand stack underflow"),
            Self::UndefinedFunction(name) => write!(f, "undefined function: {name}"),
            Self::UndefinedLabel(name) => write!(f, "undefined label: {name}"),
            Self::BadOperand(msg) => write!(f, "bad operand: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Self::Ir(d) => write!(f, "{d}"),
            Self::GasExhausted => write!(f, "gas exhausted"),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<Diagnostic> for EvalError {
    fn from(d: Diagnostic) -> Self {
        Self::Ir(d)
    }
}

/// Result alias for interpreter operations.
pub type EvalResult<T> = Result<T, EvalError>;
