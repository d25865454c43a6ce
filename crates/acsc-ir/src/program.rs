//! The whole-program container.
//!
//! A [`Program`] owns every function, object, space, string and glyph of a
//! build. Passes mutate it in place; it is never rebuilt.

use crate::{
    AddrBase, Arg, ArgData, Diagnostic, ExpArena, ExpId, Function, GlyphTable, Import, IrResult,
    Object, Origin, Space, StrEnt, Type, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub exps: ExpArena,
    pub glyphs: GlyphTable,
    pub functions: BTreeMap<String, Function>,
    pub objects: BTreeMap<String, Object>,
    pub space_gbl_ars: BTreeMap<String, Space>,
    pub space_hub_ars: BTreeMap<String, Space>,
    pub space_mod_ars: BTreeMap<String, Space>,
    pub strs: BTreeMap<String, StrEnt>,
    pub imports: BTreeSet<Import>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Lookup ─────────────────────────────────────────────────────────

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Get a function, creating an undefined declaration on first use.
    pub fn get_function(&mut self, name: &str) -> &mut Function {
        self.functions
            .entry(name.to_string())
            .or_insert_with(|| Function::new(name))
    }

    pub fn add_function(&mut self, f: Function) {
        self.functions.insert(f.name.clone(), f);
    }

    pub fn find_object(&self, name: &str) -> Option<&Object> {
        self.objects.get(name)
    }

    pub fn add_object(&mut self, o: Object) {
        self.objects.insert(o.name.clone(), o);
    }

    pub fn add_str(&mut self, s: StrEnt) {
        self.strs.insert(s.glyph.clone(), s);
    }

    pub fn add_import(&mut self, name: impl Into<String>) {
        self.imports.insert(Import { name: name.into() });
    }

    pub fn spaces(&self, base: AddrBase) -> Option<&BTreeMap<String, Space>> {
        match base {
            AddrBase::GblArr => Some(&self.space_gbl_ars),
            AddrBase::HubArr => Some(&self.space_hub_ars),
            AddrBase::ModArr => Some(&self.space_mod_ars),
            _ => None,
        }
    }

    pub fn spaces_mut(&mut self, base: AddrBase) -> Option<&mut BTreeMap<String, Space>> {
        match base {
            AddrBase::GblArr => Some(&mut self.space_gbl_ars),
            AddrBase::HubArr => Some(&mut self.space_hub_ars),
            AddrBase::ModArr => Some(&mut self.space_mod_ars),
            _ => None,
        }
    }

    /// Get an array space, creating it on first use.
    pub fn get_space(&mut self, base: AddrBase, name: &str) -> Option<&mut Space> {
        let map = self.spaces_mut(base)?;
        Some(
            map.entry(name.to_string())
                .or_insert_with(|| Space::new(base, name)),
        )
    }

    // ── Expression shortcuts ───────────────────────────────────────────

    pub fn value_of(&self, id: ExpId) -> IrResult<Value> {
        self.exps.value_of(id, &self.glyphs)
    }

    pub fn type_of(&self, id: ExpId) -> IrResult<Type> {
        self.exps.type_of(id, &self.glyphs)
    }

    pub fn is_value(&self, id: ExpId) -> bool {
        self.exps.is_value(id, &self.glyphs)
    }

    /// Folded words of a literal operand, honoring its offset and size.
    pub fn lit_words(&self, arg: &Arg) -> IrResult<Vec<u32>> {
        let ArgData::Lit { exp, off } = arg.data else {
            return Err(Diagnostic::internal(Origin::none(), "operand is not a literal"));
        };
        let words = self.exps.words_of(exp, &self.glyphs)?;
        Ok((0..arg.size)
            .map(|i| words.get((off + i) as usize).copied().unwrap_or(0))
            .collect())
    }

    // ── Consistency ────────────────────────────────────────────────────

    /// Structural checks applied to decoded archives.
    pub fn validate(&self) -> Result<(), String> {
        self.exps.validate()?;
        let n = self.exps.len() as u32;
        let check = |id: ExpId| {
            if id.0 < n {
                Ok(())
            } else {
                Err(format!("expression {id} out of range"))
            }
        };
        for f in self.functions.values() {
            for s in f.block.iter() {
                if !s.code.arity().accepts(s.args.len()) {
                    return Err(format!(
                        "{}: {} takes {} operands, found {}",
                        f.name,
                        s.code,
                        s.code.arity(),
                        s.args.len()
                    ));
                }
                for a in &s.args {
                    a.exps().into_iter().try_for_each(check)?;
                }
            }
        }
        for o in self.objects.values() {
            if let Some(e) = o.initi {
                check(e)?;
            }
        }
        for (_, g) in self.glyphs.iter() {
            if let Some(e) = g.value {
                check(e)?;
            }
        }
        Ok(())
    }

    // ── Linking ────────────────────────────────────────────────────────

    /// Merge `other` into this program. A definition replaces a
    /// declaration; two definitions of one name are an error.
    pub fn merge(&mut self, other: Program) -> IrResult<()> {
        let mut memo = HashMap::new();
        let mut remap = |this: &mut Program, id: ExpId| this.exps.import(&other.exps, id, &mut memo);

        for (name, g) in other.glyphs.iter() {
            let value = g.value.map(|e| remap(self, e));
            let entry = self.glyphs.entry(name);
            if entry.value.is_none() {
                entry.value = value;
            }
            if entry.ty.is_none() {
                entry.ty = g.ty.clone();
            }
        }

        for (name, mut f) in other.functions.clone() {
            for s in &mut f.block.stmnts {
                for a in &mut s.args {
                    remap_arg(a, &mut |e| remap(self, e));
                }
            }
            match self.functions.get(&name) {
                Some(old) if old.defin && f.defin => {
                    return Err(Diagnostic::user(f.pos.clone(), format!("multiple definition of {name}")));
                }
                Some(old) if old.defin => {}
                _ => {
                    self.functions.insert(name, f);
                }
            }
        }

        for (name, mut o) in other.objects.clone() {
            o.initi = o.initi.map(|e| remap(self, e));
            match self.objects.get(&name) {
                Some(old) if old.defin && o.defin => {
                    return Err(Diagnostic::user(o.pos.clone(), format!("multiple definition of {name}")));
                }
                Some(old) if old.defin => {}
                _ => {
                    self.objects.insert(name, o);
                }
            }
        }

        for base in [AddrBase::GblArr, AddrBase::HubArr, AddrBase::ModArr] {
            if let Some(spaces) = other.spaces(base) {
                for (name, sp) in spaces {
                    if let Some(mine) = self.get_space(base, name) {
                        mine.words = mine.words.max(sp.words);
                        mine.defin |= sp.defin;
                    }
                }
            }
        }

        for (name, s) in &other.strs {
            self.strs.entry(name.clone()).or_insert_with(|| s.clone());
        }
        self.imports.extend(other.imports.iter().cloned());
        Ok(())
    }
}

fn remap_arg(arg: &mut Arg, f: &mut dyn FnMut(ExpId) -> ExpId) {
    match &mut arg.data {
        ArgData::Lit { exp, .. } => *exp = f(*exp),
        ArgData::LocReg(p) | ArgData::ModReg(p) | ArgData::HubReg(p) | ArgData::GblReg(p) => {
            remap_arg(&mut p.idx, f)
        }
        ArgData::ModArr(p) | ArgData::HubArr(p) | ArgData::GblArr(p) => {
            remap_arg(&mut p.arr, f);
            remap_arg(&mut p.idx, f);
        }
        _ => {}
    }
}
