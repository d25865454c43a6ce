//! Shared IR for the ACSC toolchain.
//!
//! This crate defines the architecture-neutral program representation
//! consumed by every backend:
//!
//! - [`Value`] / [`Type`]: immutable typed values with target wraparound
//!   and saturation semantics.
//! - [`ExpArena`]: the interned expression DAG, with folding and equality.
//! - [`Statement`], [`Block`], [`Function`], [`Program`]: the mutable
//!   compilation units rewritten in place by the lowering passes.
//! - [`archive`]: the self-describing serialized form of a [`Program`].

mod arg;
mod block;
mod code;
mod error;
mod exp;
mod function;
mod glyph;
mod origin;
mod program;
mod space;
mod ty;
mod value;

pub mod archive;

pub use arg::{Arg, ArgBase, ArgData, ArgPtr1, ArgPtr2};
pub use block::{Block, Statement};
pub use code::{Arity, Code, HELPER_PREFIX};
pub use error::{Diagnostic, DiagnosticCategory, TypeError};
pub use exp::{BinOp, ExpArena, ExpId, ExpKind, ExpNode, UnOp};
pub use function::{CallType, Function, Linkage};
pub use glyph::{GlyphData, GlyphTable};
pub use origin::Origin;
pub use program::Program;
pub use space::{AddrBase, AddrSpace, Import, Object, Space, StrEnt};
pub use ty::{Type, TypeFixed, TypeFloat, MAX_BITS, WORD_BITS};
pub use value::Value;

/// Result type used throughout the IR: failures carry a positioned diagnostic.
pub type IrResult<T> = std::result::Result<T, Diagnostic>;
