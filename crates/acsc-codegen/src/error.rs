//! Codegen error types.

use acsc_ir::{ArgBase, Code, Diagnostic, Origin};
use thiserror::Error;

/// Errors raised by a backend pass.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// A positioned diagnostic from the IR layer (type mismatch, folding).
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),

    /// Stack operands would have to be reordered to translate a statement.
    #[error("{pos}: {code} operand disorder")]
    Disorder { pos: Origin, code: Code },

    /// A statement carries the wrong number of operands.
    #[error("{pos}: {code} expects {expected} operands, found {found}")]
    ArgCount {
        pos: Origin,
        code: Code,
        expected: String,
        found: usize,
    },

    /// An operand lives in an address space the statement cannot use.
    #[error("{pos}: {code} operand {index} cannot be {base}")]
    ArgBase {
        pos: Origin,
        code: Code,
        index: usize,
        base: ArgBase,
    },

    /// No instruction sequence exists for this statement on the target.
    #[error("{pos}: cannot translate {code}_W{size} for {target}")]
    Untranslatable {
        pos: Origin,
        code: Code,
        size: u32,
        target: &'static str,
    },

    /// A helper routine was expected to exist after legalize.
    #[error("{pos}: missing helper {name}")]
    MissingHelper { pos: Origin, name: String },

    /// A conversion or operation the backend does not implement.
    #[error("{pos}: unsupported: {what}")]
    Unsupported { pos: Origin, what: String },

    /// A glyph has no value at generate or emit time.
    #[error("unresolved glyph: {0}")]
    UnresolvedGlyph(String),

    /// Emitted byte count differs from the layout computed by generate.
    #[error("size mismatch in {what}: expected {expected} bytes, emitted {actual}")]
    SizeMismatch {
        what: String,
        expected: u32,
        actual: u32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodegenError {
    /// Failures that indicate a compiler bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        match self {
            CodegenError::Diagnostic(d) => d.is_internal(),
            CodegenError::Disorder { .. }
            | CodegenError::ArgCount { .. }
            | CodegenError::ArgBase { .. }
            | CodegenError::Untranslatable { .. }
            | CodegenError::MissingHelper { .. }
            | CodegenError::SizeMismatch { .. } => true,
            CodegenError::Unsupported { .. }
            | CodegenError::UnresolvedGlyph(_)
            | CodegenError::Io(_) => false,
        }
    }
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
