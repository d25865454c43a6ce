use crate::{Arg, Code, Origin};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One VM-level operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub code: Code,
    /// Operation width in words.
    pub size: u32,
    pub args: Vec<Arg>,
    /// Labels bound to this statement's position.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub pos: Origin,
}

impl Statement {
    pub fn new(code: Code, size: u32, args: Vec<Arg>, pos: Origin) -> Self {
        Self {
            code,
            size,
            args,
            labels: Vec::new(),
            pos,
        }
    }

    /// Build a statement whose width is taken from its first operand.
    pub fn sized(code: Code, args: Vec<Arg>, pos: Origin) -> Self {
        let size = args.first().map(|a| a.size).unwrap_or(0);
        Self::new(code, size, args, pos)
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for l in &self.labels {
            writeln!(f, "{l}:")?;
        }
        write!(f, "  {}_W{}", self.code, self.size)?;
        for (i, a) in self.args.iter().enumerate() {
            write!(f, "{}{a}", if i == 0 { " " } else { ", " })?;
        }
        Ok(())
    }
}

/// An ordered statement list with pending label bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub stmnts: Vec<Statement>,
    /// Labels waiting for the next appended statement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<String>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stmnts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmnts.is_empty()
    }

    /// Append a statement; pending labels bind to it.
    pub fn add(&mut self, mut stmt: Statement) {
        stmt.labels.append(&mut self.pending);
        self.stmnts.push(stmt);
    }

    /// Append a statement whose width is taken from its first operand.
    pub fn add_stmnt(&mut self, code: Code, args: Vec<Arg>, pos: Origin) {
        self.add(Statement::sized(code, args, pos));
    }

    /// Append a statement with an explicit width.
    pub fn add_stmnt_sized(&mut self, code: Code, size: u32, args: Vec<Arg>, pos: Origin) {
        self.add(Statement::new(code, size, args, pos));
    }

    /// Bind `label` to the next appended statement.
    pub fn add_label(&mut self, label: impl Into<String>) {
        self.pending.push(label.into());
    }

    /// Give trailing labels a statement to attach to.
    pub fn seal(&mut self) {
        if !self.pending.is_empty() {
            self.add(Statement::new(Code::Nop, 0, Vec::new(), Origin::none()));
        }
    }

    /// Append another block's statements, keeping its labels.
    pub fn append(&mut self, mut other: Block) {
        other.seal();
        for stmt in other.stmnts {
            self.add(stmt);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.stmnts.iter()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.stmnts {
            writeln!(f, "{s}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_bind_to_next_statement() {
        let mut b = Block::new();
        b.add_label("top");
        b.add_stmnt(Code::Nop, vec![], Origin::none());
        b.add_stmnt(Code::Move, vec![Arg::nul(1), Arg::stk(1)], Origin::none());
        assert_eq!(b.stmnts[0].labels, vec!["top".to_string()]);
        assert!(b.stmnts[1].labels.is_empty());
        assert_eq!(b.stmnts[1].size, 1);
    }

    #[test]
    fn seal_keeps_trailing_labels() {
        let mut b = Block::new();
        b.add_label("end");
        b.seal();
        assert_eq!(b.len(), 1);
        assert_eq!(b.stmnts[0].code, Code::Nop);
        assert_eq!(b.stmnts[0].labels, vec!["end".to_string()]);
    }
}
