//! ACSC IR interpreter: reference implementation.
//!
//! Executes generic IR statements directly over a word machine, without
//! lowering to bytecode. Used as the golden reference when checking that
//! lowered sequences (conversions, helper bodies) compute what the generic
//! operation computes.

pub mod error;
pub mod machine;
pub mod ops;

pub use error::{EvalError, EvalResult};
pub use machine::{Machine, DEFAULT_GAS_LIMIT};
