//! The expression DAG.
//!
//! Expressions live in an [`ExpArena`] and are addressed by [`ExpId`].
//! Construction interns on the node kind (position excluded), so two
//! structurally identical constants share one id, and an operand always
//! has a smaller id than its user, which keeps the graph acyclic.

use crate::{Diagnostic, GlyphTable, IrResult, Origin, Type, TypeError, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Glyph value chains deeper than this are treated as cycles.
const MAX_GLYPH_DEPTH: u32 = 64;

/// Index of an expression node within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExpId(pub u32);

impl ExpId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Inv,
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOrI,
    BitOrX,
    ShL,
    ShR,
    CmpEQ,
    CmpNE,
    CmpLT,
    CmpGT,
    CmpLE,
    CmpGE,
    LogAnd,
    LogOrI,
    LogOrX,
}

impl BinOp {
    pub fn is_compare(self) -> bool {
        matches!(
            self,
            BinOp::CmpEQ | BinOp::CmpNE | BinOp::CmpLT | BinOp::CmpGT | BinOp::CmpLE | BinOp::CmpGE
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::LogAnd | BinOp::LogOrI | BinOp::LogOrX)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::ShL | BinOp::ShR)
    }
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpKind {
    Value(Value),
    Glyph(String),
    Unary(UnOp, ExpId),
    Binary(BinOp, ExpId, ExpId),
    Cnd(ExpId, ExpId, ExpId),
    Cst(Type, ExpId),
    Tuple(Vec<ExpId>),
    Array(Type, Vec<ExpId>),
}

impl ExpKind {
    /// Operand ids, in order.
    pub fn operands(&self) -> Vec<ExpId> {
        match self {
            ExpKind::Value(_) | ExpKind::Glyph(_) => Vec::new(),
            ExpKind::Unary(_, e) | ExpKind::Cst(_, e) => vec![*e],
            ExpKind::Binary(_, l, r) => vec![*l, *r],
            ExpKind::Cnd(c, t, f) => vec![*c, *t, *f],
            ExpKind::Tuple(es) | ExpKind::Array(_, es) => es.clone(),
        }
    }
}

/// A positioned expression node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpNode {
    pub kind: ExpKind,
    pub pos: Origin,
}

#[derive(Deserialize)]
struct ArenaRepr {
    nodes: Vec<ExpNode>,
}

/// Interned storage for every expression of a program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "ArenaRepr")]
pub struct ExpArena {
    nodes: Vec<ExpNode>,
    #[serde(skip)]
    intern: HashMap<ExpKind, ExpId>,
}

impl From<ArenaRepr> for ExpArena {
    fn from(repr: ArenaRepr) -> Self {
        let mut arena = ExpArena {
            nodes: repr.nodes,
            intern: HashMap::new(),
        };
        arena.rebuild_intern();
        arena
    }
}

impl PartialEq for ExpArena {
    fn eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&other.nodes)
                .all(|(a, b)| a.kind == b.kind && a.pos == b.pos)
    }
}

impl ExpArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: ExpId) -> &ExpNode {
        &self.nodes[id.index()]
    }

    pub fn try_get(&self, id: ExpId) -> Option<&ExpNode> {
        self.nodes.get(id.index())
    }

    pub fn kind(&self, id: ExpId) -> &ExpKind {
        &self.get(id).kind
    }

    pub fn pos(&self, id: ExpId) -> &Origin {
        &self.get(id).pos
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExpId, &ExpNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (ExpId(i as u32), n))
    }

    /// First occurrence wins, matching construction order.
    fn rebuild_intern(&mut self) {
        self.intern.clear();
        for (i, n) in self.nodes.iter().enumerate() {
            self.intern.entry(n.kind.clone()).or_insert(ExpId(i as u32));
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Construction
    // ══════════════════════════════════════════════════════════════════

    /// Intern a node. Operands must already live in this arena.
    pub fn push(&mut self, kind: ExpKind, pos: Origin) -> ExpId {
        if let Some(id) = self.intern.get(&kind) {
            return *id;
        }
        let id = ExpId(self.nodes.len() as u32);
        self.intern.insert(kind.clone(), id);
        self.nodes.push(ExpNode { kind, pos });
        id
    }

    pub fn value(&mut self, v: Value, pos: Origin) -> ExpId {
        self.push(ExpKind::Value(v), pos)
    }

    /// Unsigned word literal.
    pub fn lit_u32(&mut self, v: u32, pos: Origin) -> ExpId {
        self.value(Value::uword(v), pos)
    }

    /// Unsigned multiword literal, least significant word first.
    pub fn lit_words(&mut self, words: &[u32], pos: Origin) -> ExpId {
        self.value(Value::uwords(words), pos)
    }

    pub fn glyph(&mut self, name: impl Into<String>, pos: Origin) -> ExpId {
        self.push(ExpKind::Glyph(name.into()), pos)
    }

    pub fn unary(&mut self, op: UnOp, e: ExpId, pos: Origin) -> ExpId {
        self.push(ExpKind::Unary(op, e), pos)
    }

    pub fn binary(&mut self, op: BinOp, l: ExpId, r: ExpId, pos: Origin) -> ExpId {
        self.push(ExpKind::Binary(op, l, r), pos)
    }

    pub fn cnd(&mut self, c: ExpId, t: ExpId, f: ExpId, pos: Origin) -> ExpId {
        self.push(ExpKind::Cnd(c, t, f), pos)
    }

    pub fn cst(&mut self, ty: Type, e: ExpId, pos: Origin) -> ExpId {
        self.push(ExpKind::Cst(ty, e), pos)
    }

    pub fn tuple(&mut self, es: Vec<ExpId>, pos: Origin) -> ExpId {
        self.push(ExpKind::Tuple(es), pos)
    }

    pub fn array(&mut self, elem: Type, es: Vec<ExpId>, pos: Origin) -> ExpId {
        self.push(ExpKind::Array(elem, es), pos)
    }

    /// Copy the subgraph rooted at `id` from `other` into this arena.
    pub fn import(&mut self, other: &ExpArena, id: ExpId, memo: &mut HashMap<ExpId, ExpId>) -> ExpId {
        if let Some(mapped) = memo.get(&id) {
            return *mapped;
        }
        let node = other.get(id);
        let mut map = |e: &ExpId, this: &mut ExpArena| this.import(other, *e, memo);
        let kind = match &node.kind {
            ExpKind::Value(v) => ExpKind::Value(v.clone()),
            ExpKind::Glyph(g) => ExpKind::Glyph(g.clone()),
            ExpKind::Unary(op, e) => ExpKind::Unary(*op, map(e, self)),
            ExpKind::Binary(op, l, r) => {
                let l = map(l, self);
                ExpKind::Binary(*op, l, map(r, self))
            }
            ExpKind::Cnd(c, t, f) => {
                let c = map(c, self);
                let t = map(t, self);
                ExpKind::Cnd(c, t, map(f, self))
            }
            ExpKind::Cst(ty, e) => ExpKind::Cst(ty.clone(), map(e, self)),
            ExpKind::Tuple(es) => ExpKind::Tuple(es.iter().map(|e| map(e, self)).collect()),
            ExpKind::Array(ty, es) => {
                ExpKind::Array(ty.clone(), es.iter().map(|e| map(e, self)).collect())
            }
        };
        let new = self.push(kind, node.pos.clone());
        memo.insert(id, new);
        new
    }

    // ══════════════════════════════════════════════════════════════════
    // Structural checks
    // ══════════════════════════════════════════════════════════════════

    /// Every operand precedes its user.
    pub fn validate(&self) -> Result<(), String> {
        for (id, node) in self.iter() {
            for op in node.kind.operands() {
                if op >= id {
                    return Err(format!("expression {id} references {op} out of order"));
                }
            }
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════
    // Type derivation and folding
    // ══════════════════════════════════════════════════════════════════

    /// Derive the type of `id`. Failures are positioned at the failing node.
    pub fn type_of(&self, id: ExpId, glyphs: &GlyphTable) -> IrResult<Type> {
        Fold::new(self, glyphs).ty(id).map_err(|e| self.diagnose(e))
    }

    /// Fold `id` to a value. Failures are positioned at the failing node.
    pub fn value_of(&self, id: ExpId, glyphs: &GlyphTable) -> IrResult<Value> {
        Fold::new(self, glyphs).value(id, 0).map_err(|e| self.diagnose(e))
    }

    fn diagnose(&self, (at, err): FoldError) -> Diagnostic {
        Diagnostic::from_type_error(self.pos(at).clone(), err)
    }

    /// Whether `id` folds to a value without error.
    pub fn is_value(&self, id: ExpId, glyphs: &GlyphTable) -> bool {
        Fold::new(self, glyphs).value(id, 0).is_ok()
    }

    pub fn is_zero(&self, id: ExpId, glyphs: &GlyphTable) -> bool {
        matches!(Fold::new(self, glyphs).value(id, 0), Ok(v) if v.is_zero())
    }

    pub fn is_nonzero(&self, id: ExpId, glyphs: &GlyphTable) -> bool {
        matches!(Fold::new(self, glyphs).value(id, 0), Ok(v) if !v.is_zero())
    }

    /// Folded target words of `id`, least significant first.
    pub fn words_of(&self, id: ExpId, glyphs: &GlyphTable) -> IrResult<Vec<u32>> {
        self.value_of(id, glyphs).map(|v| v.to_words())
    }

    // ══════════════════════════════════════════════════════════════════
    // Equality
    // ══════════════════════════════════════════════════════════════════

    /// Identity, node-specific structural equality, or equal folded values.
    pub fn equals(&self, a: ExpId, b: ExpId, glyphs: &GlyphTable) -> bool {
        let mut fold = Fold::new(self, glyphs);
        self.equals_in(a, b, &mut fold, &mut HashMap::new())
    }

    fn equals_in(&self, a: ExpId, b: ExpId, fold: &mut Fold<'_>, seen: &mut EqMemo) -> bool {
        if a == b {
            return true;
        }
        if let Some(eq) = seen.get(&(a, b)) {
            return *eq;
        }
        let eq = self.equals_structural(a, b, fold, seen)
            || matches!((fold.value(a, 0), fold.value(b, 0)), (Ok(va), Ok(vb)) if va == vb);
        seen.insert((a, b), eq);
        eq
    }

    fn equals_structural(&self, a: ExpId, b: ExpId, fold: &mut Fold<'_>, seen: &mut EqMemo) -> bool {
        let mut eq = |x: &ExpId, y: &ExpId| self.equals_in(*x, *y, fold, seen);
        match (self.kind(a), self.kind(b)) {
            (ExpKind::Value(x), ExpKind::Value(y)) => x == y,
            (ExpKind::Glyph(x), ExpKind::Glyph(y)) => x == y,
            (ExpKind::Unary(o1, x), ExpKind::Unary(o2, y)) => o1 == o2 && eq(x, y),
            (ExpKind::Binary(o1, l1, r1), ExpKind::Binary(o2, l2, r2)) => {
                o1 == o2 && eq(l1, l2) && eq(r1, r2)
            }
            (ExpKind::Cnd(c1, t1, f1), ExpKind::Cnd(c2, t2, f2)) => {
                eq(c1, c2) && eq(t1, t2) && eq(f1, f2)
            }
            (ExpKind::Cst(t1, x), ExpKind::Cst(t2, y)) => t1 == t2 && eq(x, y),
            (ExpKind::Tuple(xs), ExpKind::Tuple(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| eq(x, y))
            }
            (ExpKind::Array(t1, xs), ExpKind::Array(t2, ys)) => {
                t1 == t2 && xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| eq(x, y))
            }
            _ => false,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Folding
// ══════════════════════════════════════════════════════════════════════════

/// A fold failure and the node it happened at.
type FoldError = (ExpId, TypeError);

type EqMemo = HashMap<(ExpId, ExpId), bool>;

/// One folding query. Shared operands are derived once.
struct Fold<'a> {
    arena: &'a ExpArena,
    glyphs: &'a GlyphTable,
    types: HashMap<ExpId, Type>,
    values: HashMap<ExpId, Value>,
}

impl<'a> Fold<'a> {
    fn new(arena: &'a ExpArena, glyphs: &'a GlyphTable) -> Self {
        Self {
            arena,
            glyphs,
            types: HashMap::new(),
            values: HashMap::new(),
        }
    }

    fn ty(&mut self, id: ExpId) -> Result<Type, FoldError> {
        if let Some(t) = self.types.get(&id) {
            return Ok(t.clone());
        }
        let t = self.derive_type(id)?;
        self.types.insert(id, t.clone());
        Ok(t)
    }

    fn derive_type(&mut self, id: ExpId) -> Result<Type, FoldError> {
        let arena = self.arena;
        match arena.kind(id) {
            ExpKind::Value(v) => Ok(v.ty()),
            ExpKind::Glyph(name) => self
                .glyphs
                .get(name)
                .and_then(|g| g.ty.clone())
                .ok_or_else(|| (id, TypeError::NoType(name.clone()))),
            ExpKind::Unary(UnOp::Not, _) => Ok(Type::word()),
            ExpKind::Unary(_, e) => self.ty(*e),
            ExpKind::Binary(op, l, r) => {
                let tl = self.ty(*l)?;
                if op.is_shift() {
                    return Ok(tl);
                }
                let tr = self.ty(*r)?;
                if op.is_logical() {
                    return Ok(Type::word());
                }
                if tl != tr {
                    return Err((id, TypeError::Mismatch));
                }
                if op.is_compare() {
                    Ok(Type::word())
                } else {
                    Ok(tl)
                }
            }
            ExpKind::Cnd(_, t, f) => {
                let tt = self.ty(*t)?;
                if tt != self.ty(*f)? {
                    return Err((id, TypeError::Mismatch));
                }
                Ok(tt)
            }
            ExpKind::Cst(ty, _) => Ok(ty.clone()),
            ExpKind::Tuple(es) => es
                .iter()
                .map(|e| self.ty(*e))
                .collect::<Result<Vec<_>, _>>()
                .map(Type::Tuple),
            ExpKind::Array(ty, es) => Ok(Type::Array(Box::new(ty.clone()), es.len() as u32)),
        }
    }

    /// Failures are not kept: a glyph chain that is too deep from one user
    /// may be fine from another.
    fn value(&mut self, id: ExpId, depth: u32) -> Result<Value, FoldError> {
        if let Some(v) = self.values.get(&id) {
            return Ok(v.clone());
        }
        let v = self.derive_value(id, depth)?;
        self.values.insert(id, v.clone());
        Ok(v)
    }

    fn derive_value(&mut self, id: ExpId, depth: u32) -> Result<Value, FoldError> {
        let arena = self.arena;
        let at = |e: TypeError| (id, e);
        match arena.kind(id) {
            ExpKind::Value(v) => Ok(v.clone()),
            ExpKind::Glyph(name) => {
                if depth >= MAX_GLYPH_DEPTH {
                    return Err(at(TypeError::GlyphDepth(name.clone())));
                }
                let glyphs = self.glyphs;
                let data = glyphs.get(name).ok_or_else(|| at(TypeError::NoValue(name.clone())))?;
                let exp = data.value.ok_or_else(|| at(TypeError::NoValue(name.clone())))?;
                let v = self.value(exp, depth + 1)?;
                match &data.ty {
                    Some(ty) if *ty != v.ty() => v.convert(ty).map_err(at),
                    _ => Ok(v),
                }
            }
            ExpKind::Unary(op, e) => self.value(*e, depth)?.unary(*op).map_err(at),
            ExpKind::Binary(op, l, r) => {
                let l = self.value(*l, depth)?;
                let r = self.value(*r, depth)?;
                l.binary(*op, &r).map_err(at)
            }
            ExpKind::Cnd(c, t, f) => {
                if self.value(*c, depth)?.is_zero() {
                    self.value(*f, depth)
                } else {
                    self.value(*t, depth)
                }
            }
            ExpKind::Cst(ty, e) => self.value(*e, depth)?.convert(ty).map_err(at),
            ExpKind::Tuple(es) => es
                .iter()
                .map(|e| self.value(*e, depth))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Tuple),
            ExpKind::Array(ty, es) => {
                let items = es
                    .iter()
                    .map(|e| self.value(*e, depth)?.convert(ty).map_err(at))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array {
                    elem: ty.clone(),
                    items,
                })
            }
        }
    }
}
