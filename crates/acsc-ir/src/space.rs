use crate::{ExpId, Origin};
use serde::{Deserialize, Serialize};

/// Storage class of static data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddrBase {
    GblArr,
    GblReg,
    HubArr,
    HubReg,
    ModArr,
    ModReg,
}

impl AddrBase {
    pub fn is_array(self) -> bool {
        matches!(self, AddrBase::GblArr | AddrBase::HubArr | AddrBase::ModArr)
    }
}

/// Storage class plus, for arrays, the owning space name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddrSpace {
    pub base: AddrBase,
    pub name: String,
}

impl AddrSpace {
    pub fn new(base: AddrBase, name: impl Into<String>) -> Self {
        Self {
            base,
            name: name.into(),
        }
    }
}

/// A named array of static data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub name: String,
    pub base: AddrBase,
    /// Size in words.
    pub words: u32,
    /// Array number.
    pub value: u32,
    pub alloc: bool,
    pub defin: bool,
}

impl Space {
    pub fn new(base: AddrBase, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base,
            words: 0,
            value: 0,
            alloc: true,
            defin: true,
        }
    }
}

/// A statically allocated variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub name: String,
    pub space: AddrSpace,
    /// Initializer expression; `None` means zero.
    pub initi: Option<ExpId>,
    pub words: u32,
    /// Address within its space.
    pub value: u32,
    pub alloc: bool,
    pub defin: bool,
    pub pos: Origin,
}

impl Object {
    pub fn new(name: impl Into<String>, space: AddrSpace, words: u32) -> Self {
        Self {
            name: name.into(),
            space,
            initi: None,
            words,
            value: 0,
            alloc: true,
            defin: true,
            pos: Origin::none(),
        }
    }
}

/// A string-table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrEnt {
    pub glyph: String,
    pub value_str: String,
    /// String table index.
    pub value: u32,
    pub alloc: bool,
    pub defin: bool,
}

impl StrEnt {
    pub fn new(glyph: impl Into<String>, value_str: impl Into<String>) -> Self {
        Self {
            glyph: glyph.into(),
            value_str: value_str.into(),
            value: 0,
            alloc: true,
            defin: true,
        }
    }
}

/// A library the output depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Import {
    pub name: String,
}
