use crate::Origin;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure raised by the pure value/type operations.
///
/// These never escape on their own: the expression layer converts them into
/// a positioned [`Diagnostic`] one call frame up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("type mismatch")]
    Mismatch,

    #[error("division by zero")]
    DivisionByZero,

    #[error("glyph has no value: {0}")]
    NoValue(String),

    #[error("glyph has no type: {0}")]
    NoType(String),

    #[error("glyph value chain too deep: {0}")]
    GlyphDepth(String),

    #[error("expression is not a value")]
    NotValue,

    #[error("type too wide: {0} bits")]
    TooWide(u32),
}

/// Who is to blame for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    /// The input program is wrong.
    User,
    /// A compiler invariant was broken.
    Internal,
}

/// A positioned, one-line compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub pos: Origin,
    pub message: String,
    pub category: DiagnosticCategory,
}

impl Diagnostic {
    /// A diagnostic caused by the input program.
    pub fn user(pos: Origin, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
            category: DiagnosticCategory::User,
        }
    }

    /// A diagnostic reporting a broken compiler invariant.
    pub fn internal(pos: Origin, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
            category: DiagnosticCategory::Internal,
        }
    }

    /// Attach a position to a value/type failure.
    pub fn from_type_error(pos: Origin, err: TypeError) -> Self {
        Self::user(pos, err.to_string())
    }

    pub fn is_internal(&self) -> bool {
        self.category == DiagnosticCategory::Internal
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_error_becomes_positioned_line() {
        let d = Diagnostic::from_type_error(Origin::new("lib.c", 4), TypeError::Mismatch);
        assert_eq!(d.to_string(), "lib.c:4: type mismatch");
        assert!(!d.is_internal());
    }

    #[test]
    fn internal_category() {
        let d = Diagnostic::internal(Origin::none(), "bad arity");
        assert!(d.is_internal());
        assert_eq!(d.to_string(), "<internal>: bad arity");
    }
}
