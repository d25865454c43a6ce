use serde::{Deserialize, Serialize};
use std::fmt;

/// Source position carried by expressions and statements.
///
/// Lines are 1-based. A default origin (empty file, line 0) marks
/// compiler-generated code with no source counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Origin {
    pub file: String,
    pub line: u32,
}

impl Origin {
    /// Create a new origin.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Origin for synthesized code.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether this origin points at real source.
    pub fn is_known(&self) -> bool {
        !self.file.is_empty() || self.line != 0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.file, self.line)
        } else {
            write!(f, "<internal>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_display() {
        assert_eq!(Origin::new("map01.c", 12).to_string(), "map01.c:12");
        assert_eq!(Origin::none().to_string(), "<internal>");
    }

    #[test]
    fn origin_ordering_is_file_then_line() {
        let a = Origin::new("a.c", 9);
        let b = Origin::new("a.c", 10);
        let c = Origin::new("b.c", 1);
        assert!(a < b && b < c);
    }
}
