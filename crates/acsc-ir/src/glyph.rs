use crate::{ExpId, Type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What is known about a glyph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphData {
    pub value: Option<ExpId>,
    pub ty: Option<Type>,
}

/// Program-wide symbol table. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlyphTable {
    glyphs: BTreeMap<String, GlyphData>,
}

impl GlyphTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&GlyphData> {
        self.glyphs.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GlyphData> {
        self.glyphs.get_mut(name)
    }

    /// Look up a glyph, creating an empty entry on first use.
    pub fn entry(&mut self, name: &str) -> &mut GlyphData {
        self.glyphs.entry(name.to_string()).or_default()
    }

    pub fn set_value(&mut self, name: &str, value: ExpId) {
        self.entry(name).value = Some(value);
    }

    pub fn set_type(&mut self, name: &str, ty: Type) {
        self.entry(name).ty = Some(ty);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.glyphs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GlyphData)> {
        self.glyphs.iter()
    }
}
