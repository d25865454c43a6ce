//! Allocation and code layout.
//!
//! Generate gives every glyph its final value: function indices, script
//! numbers, string indices, array numbers, object addresses and label
//! offsets. Code is selected here as well, so the byte layout is fixed
//! before anything is written.

use super::init::{init_scripts, slots_of, Flag, InitArray, InitLayout, Slot};
use super::pcode::{size_of, Instr};
use super::select::select;
use super::{Engine, InitOptions, RETURN_REG};
use crate::error::{CodegenError, CodegenResult};
use acsc_ir::{AddrBase, CallType, Diagnostic, Origin, Program, Value, MAX_BITS, WORD_BITS};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Code starts after the `ACSE` header and directory offset.
pub const CODE_BASE: u32 = 8;

/// Hidden array holding the global initialized flag.
pub const GBL_GUARD: &str = "__acsc_init_gbl";
/// Hidden array holding the hub initialized flag.
pub const HUB_GUARD: &str = "__acsc_init_hub";

/// First global register reserved for multiword results.
const GBL_REG_LIMIT: u32 = RETURN_REG + 2 - 2 * MAX_BITS / WORD_BITS;
const MOD_REG_LIMIT: u32 = 128;
const HUB_REG_LIMIT: u32 = 256;

/// A `FUNC` chunk entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncEntry {
    pub name: String,
    pub argc: u8,
    pub locals: u8,
    pub has_return: bool,
    /// Code offset, or 0 for imported functions.
    pub addr: u32,
}

/// A `SPTR` chunk entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub number: i32,
    pub stype: u8,
    pub argc: u8,
    pub flags: u16,
    pub addr: u32,
    pub locals: u32,
}

/// A map array and its initial contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapArray {
    pub number: u32,
    pub words: u32,
    /// Empty when every element starts at zero.
    pub init: Vec<u32>,
}

/// Everything emit needs, computed by [`generate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Selected code of every defined function, in layout order.
    pub code: Vec<Instr>,
    /// End of all code, including the init script.
    pub code_end: u32,
    pub init: Option<InitLayout>,
    /// Functions in index order.
    pub funcs: Vec<FuncEntry>,
    pub scripts: Vec<ScriptEntry>,
    /// Script names; named script `i` has number `-1 - i`.
    pub script_names: Vec<String>,
    /// String table in index order.
    pub strings: Vec<String>,
    pub map_arrays: Vec<MapArray>,
    /// Initial values of the map registers, from register 0.
    pub map_regs: Vec<u32>,
    /// Map register names by register number.
    pub map_reg_names: Vec<String>,
    pub imports: Vec<String>,
}

pub fn generate(prog: &mut Program, engine: Engine, opts: &InitOptions, output_name: &str) -> CodegenResult<Layout> {
    let mut layout = Layout::default();

    alloc_functions(prog, &mut layout)?;
    alloc_scripts(prog, &mut layout);
    alloc_strings(prog, &mut layout);
    alloc_objects(prog)?;
    let data = collect_data(prog)?;

    let hub_needed = data.get(&AddrBase::HubArr).is_some_and(has_init);
    let gbl_needed = data.get(&AddrBase::GblArr).is_some_and(has_init);
    if hub_needed && opts.hub_array.is_none() {
        guard_space(prog, AddrBase::HubArr, HUB_GUARD);
    }
    if gbl_needed && opts.gbl_array.is_none() {
        guard_space(prog, AddrBase::GblArr, GBL_GUARD);
    }
    alloc_arrays(prog, opts)?;

    layout_code(prog, &mut layout)?;

    let prog: &Program = prog;
    let init_arrays = |base: AddrBase| -> Vec<InitArray> {
        data.get(&base)
            .into_iter()
            .flatten()
            .filter(|(_, slots)| slots.iter().any(|s| s.is_set()))
            .filter_map(|(name, slots)| {
                Some(InitArray {
                    arr: array_number(prog, base, name)?,
                    slots: slots.clone(),
                })
            })
            .collect()
    };
    let flag = |needed: bool, base, guard, arr: Option<u32>, idx| {
        needed.then(|| match arr {
            Some(arr) => Flag { arr, idx },
            None => Flag {
                arr: array_number(prog, base, guard).unwrap_or(0),
                idx: 0,
            },
        })
    };
    let hub_flag = flag(hub_needed, AddrBase::HubArr, HUB_GUARD, opts.hub_array, opts.hub_index);
    let gbl_flag = flag(gbl_needed, AddrBase::GblArr, GBL_GUARD, opts.gbl_array, opts.gbl_index);
    let (hub, gbl) = (init_arrays(AddrBase::HubArr), init_arrays(AddrBase::GblArr));

    layout.code_end = CODE_BASE + size_of(&layout.code);
    if hub_flag.is_some() || gbl_flag.is_some() {
        let init = InitLayout::plan(layout.code_end, opts, hub, gbl, hub_flag, gbl_flag);
        let entries = init_scripts(&init, engine, opts, output_name, &mut layout.script_names);
        layout.scripts.extend(entries);
        layout.code_end = init.code_end;
        layout.init = Some(init);
    }

    map_data(prog, &data, &mut layout);
    layout.imports = prog.imports.iter().map(|i| i.name.clone()).collect();
    Ok(layout)
}

// ══════════════════════════════════════════════════════════════════════
// Functions, scripts and strings
// ══════════════════════════════════════════════════════════════════════

fn too_big(pos: &Origin, what: String) -> CodegenError {
    CodegenError::Unsupported { pos: pos.clone(), what }
}

fn alloc_functions(prog: &mut Program, layout: &mut Layout) -> CodegenResult<()> {
    let mut index = 0;
    for f in prog.functions.values_mut() {
        if !matches!(f.ctype, CallType::StdCall | CallType::StkCall) {
            continue;
        }
        if f.alloc {
            f.value_int = index;
            f.alloc = false;
        }
        index += 1;

        let value = prog.exps.value(
            Value::Funct {
                addr: f.value_int as u32,
                ctype: f.ctype,
            },
            f.pos.clone(),
        );
        prog.glyphs.set_value(&f.name, value);

        let locals = f.local_reg.max(f.param);
        layout.funcs.push(FuncEntry {
            name: f.name.clone(),
            argc: u8::try_from(f.param).map_err(|_| too_big(&f.pos, format!("{} parameters", f.param)))?,
            locals: u8::try_from(locals).map_err(|_| too_big(&f.pos, format!("{locals} local registers")))?,
            has_return: f.retrn > 0,
            addr: 0,
        });
    }
    debug!(count = layout.funcs.len(), "functions numbered");
    Ok(())
}

fn alloc_scripts(prog: &mut Program, layout: &mut Layout) {
    for f in prog.functions.values_mut().filter(|f| f.ctype.is_script()) {
        if f.ctype == CallType::ScriptS || f.value_str.is_some() {
            let name = f.value_str.clone().unwrap_or_else(|| f.name.clone());
            f.value_int = -1 - layout.script_names.len() as i32;
            layout.script_names.push(name);
        }
        let value = prog.exps.value(Value::word(f.value_int), f.pos.clone());
        prog.glyphs.set_value(&f.name, value);
    }
}

fn alloc_strings(prog: &mut Program, layout: &mut Layout) {
    let mut seen: BTreeMap<String, u32> = BTreeMap::new();
    for s in prog.strs.values_mut() {
        let idx = *seen.entry(s.value_str.clone()).or_insert_with(|| {
            layout.strings.push(s.value_str.clone());
            layout.strings.len() as u32 - 1
        });
        s.value = idx;
        s.alloc = false;
        let value = prog.exps.value(Value::StrEn { idx }, Origin::none());
        prog.glyphs.set_value(&s.glyph, value);
    }
}

// ══════════════════════════════════════════════════════════════════════
// Objects and arrays
// ══════════════════════════════════════════════════════════════════════

/// Space an object lives in: its array name, or empty for registers.
fn space_key(base: AddrBase, name: &str) -> String {
    if base.is_array() {
        name.to_string()
    } else {
        String::new()
    }
}

fn alloc_objects(prog: &mut Program) -> CodegenResult<()> {
    let mut next: BTreeMap<(AddrBase, String), u32> = BTreeMap::new();
    for o in prog.objects.values().filter(|o| !o.alloc) {
        let end = next.entry((o.space.base, space_key(o.space.base, &o.space.name))).or_insert(0);
        *end = (*end).max(o.value + o.words);
    }

    for o in prog.objects.values_mut().filter(|o| o.defin) {
        let key = (o.space.base, space_key(o.space.base, &o.space.name));
        let end = next.entry(key).or_insert(0);
        if o.alloc {
            o.value = *end;
            o.alloc = false;
            *end += o.words;
        }

        let limit = match o.space.base {
            AddrBase::GblReg => Some(GBL_REG_LIMIT),
            AddrBase::HubReg => Some(HUB_REG_LIMIT),
            AddrBase::ModReg => Some(MOD_REG_LIMIT),
            _ => None,
        };
        if limit.is_some_and(|l| o.value + o.words > l) {
            return Err(too_big(&o.pos, format!("{:?} registers exhausted by {}", o.space.base, o.name)));
        }

        let value = prog.exps.value(Value::uword(o.value), o.pos.clone());
        prog.glyphs.set_value(&o.name, value);
    }

    for ((base, name), end) in next {
        if let Some(space) = prog.get_space(base, &name) {
            space.words = space.words.max(end);
        }
    }
    Ok(())
}

/// Initializer slots by storage class and space name.
type Data = BTreeMap<AddrBase, BTreeMap<String, Vec<Slot>>>;

fn collect_data(prog: &Program) -> CodegenResult<Data> {
    let mut data = Data::new();
    for o in prog.objects.values().filter(|o| o.defin) {
        let mut words = Vec::new();
        if let Some(e) = o.initi {
            slots_of(&prog.value_of(e)?, &mut words);
        }
        words.resize(o.words as usize, Slot::Empty);

        let slots = data
            .entry(o.space.base)
            .or_default()
            .entry(space_key(o.space.base, &o.space.name))
            .or_default();
        let end = (o.value + o.words) as usize;
        if slots.len() < end {
            slots.resize(end, Slot::Empty);
        }
        slots[o.value as usize..end].copy_from_slice(&words);
    }
    Ok(data)
}

fn array_number(prog: &Program, base: AddrBase, name: &str) -> Option<u32> {
    prog.spaces(base)?.get(name).map(|s| s.value)
}

fn has_init(spaces: &BTreeMap<String, Vec<Slot>>) -> bool {
    spaces.values().flatten().any(|s| s.is_set())
}

fn guard_space(prog: &mut Program, base: AddrBase, name: &str) {
    if let Some(space) = prog.get_space(base, name) {
        space.words = space.words.max(1);
    }
}

/// Number the arrays of each kind, skipping configured flag arrays and the
/// numbers of arrays placed by their declarations.
///
/// Array names are glyphs, so one name cannot denote arrays of two kinds.
fn alloc_arrays(prog: &mut Program, opts: &InitOptions) -> CodegenResult<()> {
    let mut kinds: BTreeMap<String, AddrBase> = BTreeMap::new();
    for (base, reserved) in [
        (AddrBase::ModArr, None),
        (AddrBase::HubArr, opts.hub_array),
        (AddrBase::GblArr, opts.gbl_array),
    ] {
        let Some(spaces) = prog.spaces_mut(base) else {
            continue;
        };
        let mut used: BTreeSet<u32> = spaces.values().filter(|s| !s.alloc).map(|s| s.value).collect();
        used.extend(reserved);

        let mut n = 0;
        let mut numbered = Vec::new();
        for s in spaces.values_mut() {
            if s.alloc {
                while used.contains(&n) {
                    n += 1;
                }
                s.value = n;
                s.alloc = false;
                used.insert(n);
            }
            numbered.push((s.name.clone(), s.value));
        }
        for (name, number) in numbered {
            if let Some(other) = kinds.insert(name.clone(), base) {
                return Err(Diagnostic::user(
                    Origin::none(),
                    format!("array {name} declared as both {other:?} and {base:?}"),
                )
                .into());
            }
            let value = prog.exps.value(Value::uword(number), Origin::none());
            prog.glyphs.set_value(&name, value);
        }
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════
// Code
// ══════════════════════════════════════════════════════════════════════

fn layout_code(prog: &mut Program, layout: &mut Layout) -> CodegenResult<()> {
    let mut at = CODE_BASE;
    let mut labels = Vec::new();
    let mut addrs = BTreeMap::new();

    for f in prog.functions.values().filter(|f| f.defin) {
        addrs.insert(f.name.clone(), at);
        let is_script = f.ctype.is_script();
        for s in f.block.iter() {
            labels.extend(s.labels.iter().map(|l| (l.clone(), at)));
            let instrs = select(s, is_script, prog)?;
            at += size_of(&instrs);
            layout.code.extend(instrs);
        }
    }

    for (label, offset) in labels {
        let value = prog.exps.value(Value::uword(offset), Origin::none());
        prog.glyphs.set_value(&label, value);
    }
    for entry in &mut layout.funcs {
        entry.addr = addrs.get(&entry.name).copied().unwrap_or(0);
    }
    for f in prog.functions.values().filter(|f| f.defin && f.ctype.is_script()) {
        layout.scripts.push(ScriptEntry {
            number: f.value_int,
            stype: f.stype,
            argc: u8::try_from(f.param).map_err(|_| too_big(&f.pos, format!("{} script arguments", f.param)))?,
            flags: f.sflags,
            addr: addrs.get(&f.name).copied().unwrap_or(0),
            locals: f.local_reg.max(f.param),
        });
    }
    debug!(bytes = at - CODE_BASE, "code laid out");
    Ok(())
}

/// Map registers and map arrays are initialized from data chunks.
fn map_data(prog: &Program, data: &Data, layout: &mut Layout) {
    if let Some(spaces) = data.get(&AddrBase::ModArr) {
        for (name, slots) in spaces {
            let Some(space) = prog.space_mod_ars.get(name) else {
                continue;
            };
            let init = if slots.iter().any(|s| s.word() != 0) {
                slots.iter().map(|s| s.word()).collect()
            } else {
                Vec::new()
            };
            layout.map_arrays.push(MapArray {
                number: space.value,
                words: space.words,
                init,
            });
        }
    }
    for space in prog.space_mod_ars.values() {
        if !layout.map_arrays.iter().any(|a| a.number == space.value) {
            layout.map_arrays.push(MapArray {
                number: space.value,
                words: space.words,
                init: Vec::new(),
            });
        }
    }
    layout.map_arrays.sort_by_key(|a| a.number);

    if let Some(regs) = data.get(&AddrBase::ModReg).and_then(|m| m.get("")) {
        layout.map_regs = regs.iter().map(|s| s.word()).collect();
        layout.map_reg_names = vec![String::new(); regs.len()];
        for o in prog.objects.values().filter(|o| o.defin && o.space.base == AddrBase::ModReg) {
            if let Some(n) = layout.map_reg_names.get_mut(o.value as usize) {
                n.clone_from(&o.name);
            }
        }
    }
}
