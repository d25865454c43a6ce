//! Static initializer script.
//!
//! Hub and global arrays survive map changes, so they cannot be initialized
//! from the module's data chunks. An init script stores every nonzero slot
//! instead, guarded by a per-kind flag so that data is written only once.
//!
//! The script is laid out in two phases. [`InitLayout::plan`] sizes every
//! fragment from fixed per-fragment costs and records the jump targets and
//! the `code_init`/`code_init_end` markers. [`InitLayout::emit`] then
//! produces the instructions and checks each fragment against the plan.

use super::generate::ScriptEntry;
use super::pcode::{size_of, Imm, Instr, Pcode};
use super::{Engine, InitOptions};
use crate::error::{CodegenError, CodegenResult};
use acsc_ir::Value;
use tracing::warn;

/// Event type an event init script waits for.
pub const INIT_EVENT: u32 = 16;

const SCRIPT_OPEN: u8 = 1;
const SCRIPT_EVENT: u8 = 16;

/// Event scripts receive the event type and two arguments.
const EVENT_ARGS: u8 = 3;

/// Script flag marking a clientside script.
pub const FLAG_CLIENTSIDE: u16 = 2;

// Fragment costs in bytes.
const COST_EVENT_CHECK: u32 = 28;
const COST_GUARD: u32 = 24;
const COST_FIXED: u32 = 24;
const COST_FUNCT: u32 = 24;
const COST_STREN: u32 = 28;
const COST_DELAY: u32 = 8;
const COST_FLAG: u32 = 24;
const COST_TERMINATE: u32 = 4;

/// One word of initializer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Empty,
    Fixed(u32),
    /// Function index.
    Funct(u32),
    /// String table index.
    StrEn(u32),
}

impl Slot {
    /// Bytes of init code needed to store this slot.
    pub fn cost(self) -> u32 {
        match self {
            Slot::Empty | Slot::Fixed(0) => 0,
            Slot::Fixed(_) => COST_FIXED,
            Slot::Funct(_) => COST_FUNCT,
            Slot::StrEn(_) => COST_STREN,
        }
    }

    pub fn word(self) -> u32 {
        match self {
            Slot::Empty => 0,
            Slot::Fixed(w) | Slot::Funct(w) | Slot::StrEn(w) => w,
        }
    }

    /// Whether the slot needs code to initialize.
    pub fn is_set(self) -> bool {
        self.cost() > 0
    }
}

/// Flatten an initializer value into word slots.
pub fn slots_of(v: &Value, out: &mut Vec<Slot>) {
    match v {
        Value::Empty => {}
        Value::Funct { addr, .. } => out.push(Slot::Funct(*addr)),
        Value::StrEn { idx } => out.push(Slot::StrEn(*idx)),
        Value::Tuple(vs) => vs.iter().for_each(|v| slots_of(v, out)),
        Value::Array { items, .. } => items.iter().for_each(|v| slots_of(v, out)),
        other => out.extend(other.to_words().into_iter().map(Slot::Fixed)),
    }
}

/// Initializer data of one array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitArray {
    pub arr: u32,
    /// Slot `i` initializes element `i`.
    pub slots: Vec<Slot>,
}

impl InitArray {
    fn cost(&self) -> u32 {
        self.slots.iter().map(|s| s.cost()).sum()
    }
}

/// Array element holding an initialized flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag {
    pub arr: u32,
    pub idx: u32,
}

/// Running byte offset through the init script.
struct Sizer {
    at: u32,
}

impl Sizer {
    fn add(&mut self, n: u32) -> u32 {
        self.at += n;
        self.at
    }
}

/// Sized init script. Offsets are absolute within the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitLayout {
    pub code_init: u32,
    /// End of the initializing code, before the terminator.
    pub code_init_end: u32,
    pub code_end: u32,
    pub event: bool,
    pub delay: Option<u32>,
    pub hub: Vec<InitArray>,
    pub gbl: Vec<InitArray>,
    pub hub_flag: Option<Flag>,
    pub gbl_flag: Option<Flag>,
    event_ok: u32,
    hub_skip: u32,
    gbl_skip: u32,
}

impl InitLayout {
    /// Size the script starting at `code_init`. A kind is initialized only
    /// when it has a flag.
    pub fn plan(
        code_init: u32,
        opts: &InitOptions,
        hub: Vec<InitArray>,
        gbl: Vec<InitArray>,
        hub_flag: Option<Flag>,
        gbl_flag: Option<Flag>,
    ) -> Self {
        let mut sz = Sizer { at: code_init };
        let event_ok = sz.add(if opts.script_event { COST_EVENT_CHECK } else { 0 });

        let mut hub_skip = sz.at;
        if hub_flag.is_some() {
            sz.add(COST_GUARD);
            hub_skip = sz.add(hub.iter().map(InitArray::cost).sum());
        }
        let mut gbl_skip = sz.at;
        if gbl_flag.is_some() {
            sz.add(COST_GUARD);
            gbl_skip = sz.add(gbl.iter().map(InitArray::cost).sum());
        }

        if opts.delay.is_some() {
            sz.add(COST_DELAY);
        }
        if hub_flag.is_some() {
            sz.add(COST_FLAG);
        }
        if gbl_flag.is_some() {
            sz.add(COST_FLAG);
        }
        let code_init_end = sz.at;
        let code_end = sz.add(COST_TERMINATE);

        Self {
            code_init,
            code_init_end,
            code_end,
            event: opts.script_event,
            delay: opts.delay,
            hub,
            gbl,
            hub_flag,
            gbl_flag,
            event_ok,
            hub_skip,
            gbl_skip,
        }
    }

    /// Script type and argument count of the init script.
    pub fn script_kind(&self) -> (u8, u8) {
        if self.event {
            (SCRIPT_EVENT, EVENT_ARGS)
        } else {
            (SCRIPT_OPEN, 0)
        }
    }

    /// Instructions of the init script, checked against the plan.
    pub fn emit(&self) -> CodegenResult<Vec<Instr>> {
        let mut v = Vec::new();

        if self.event {
            v.push(Instr::word(Pcode::PushScriptVar, 0));
            v.push(Instr::new(Pcode::CaseGoto, vec![Imm::Word(INIT_EVENT), Imm::Word(self.event_ok)]));
            v.push(Instr::op(Pcode::Drop));
            v.push(Instr::op(Pcode::Terminate));
        }
        self.check("event check", self.event_ok, &v)?;

        if let Some(flag) = self.hub_flag {
            guard(&mut v, flag, Pcode::PushWorldArray, self.hub_skip);
            slots(&mut v, &self.hub, Pcode::AssignWorldArray);
        }
        self.check("hub initializers", self.hub_skip, &v)?;

        if let Some(flag) = self.gbl_flag {
            guard(&mut v, flag, Pcode::PushGlobalArray, self.gbl_skip);
            slots(&mut v, &self.gbl, Pcode::AssignGlobalArray);
        }
        self.check("global initializers", self.gbl_skip, &v)?;

        if let Some(tics) = self.delay {
            v.push(Instr::word(Pcode::DelayDirect, tics));
        }
        if let Some(flag) = self.hub_flag {
            set_flag(&mut v, flag, Pcode::AssignWorldArray);
        }
        if let Some(flag) = self.gbl_flag {
            set_flag(&mut v, flag, Pcode::AssignGlobalArray);
        }
        self.check("init flags", self.code_init_end, &v)?;

        v.push(Instr::op(Pcode::Terminate));
        self.check("init script", self.code_end, &v)?;
        Ok(v)
    }

    fn check(&self, what: &str, expected: u32, v: &[Instr]) -> CodegenResult<()> {
        let actual = self.code_init + size_of(v);
        if actual == expected {
            Ok(())
        } else {
            Err(CodegenError::SizeMismatch {
                what: what.into(),
                expected: expected - self.code_init,
                actual: actual - self.code_init,
            })
        }
    }
}

fn guard(v: &mut Vec<Instr>, flag: Flag, load: Pcode, skip: u32) {
    v.push(Instr::word(Pcode::PushNumber, flag.idx));
    v.push(Instr::word(load, flag.arr));
    v.push(Instr::word(Pcode::IfGoto, skip));
}

fn slots(v: &mut Vec<Instr>, arrays: &[InitArray], assign: Pcode) {
    for a in arrays {
        for (i, slot) in a.slots.iter().enumerate().filter(|(_, s)| s.is_set()) {
            v.push(Instr::word(Pcode::PushNumber, i as u32));
            match *slot {
                Slot::Funct(f) => v.push(Instr::word(Pcode::PushFunction, f)),
                Slot::StrEn(s) => {
                    v.push(Instr::word(Pcode::PushNumber, s));
                    v.push(Instr::op(Pcode::TagString));
                }
                other => v.push(Instr::word(Pcode::PushNumber, other.word())),
            }
            v.push(Instr::word(assign, a.arr));
        }
    }
}

fn set_flag(v: &mut Vec<Instr>, flag: Flag, assign: Pcode) {
    v.push(Instr::word(Pcode::PushNumber, flag.idx));
    v.push(Instr::word(Pcode::PushNumber, 1));
    v.push(Instr::word(assign, flag.arr));
}

/// Script table entries for the init script at `addr`. Named scripts take
/// their numbers from `names`, which is extended.
pub fn init_scripts(
    layout: &InitLayout,
    engine: Engine,
    opts: &InitOptions,
    output_name: &str,
    names: &mut Vec<String>,
) -> Vec<ScriptEntry> {
    let (stype, argc) = layout.script_kind();
    let entry = |number: i32, flags: u16| ScriptEntry {
        number,
        stype,
        argc,
        flags,
        addr: layout.code_init,
        locals: u32::from(argc),
    };

    let named = opts.script_named || opts.script_name.is_some();
    let mut out = Vec::new();
    if named {
        let name = match &opts.script_name {
            Some(n) => n.clone(),
            None => {
                let n = format!("{output_name}$init");
                warn!(name = %n, "init script name generated");
                n
            }
        };
        let mut add = |name: String, flags: u16| {
            let number = -1 - names.len() as i32;
            names.push(name);
            out.push(entry(number, flags));
        };
        if engine == Engine::Zandronum {
            add(format!("{name}$client"), FLAG_CLIENTSIDE);
        }
        add(name, 0);
        out.reverse();
    } else {
        out.push(entry(opts.script_number, 0));
        if engine == Engine::Zandronum {
            out.push(entry(opts.script_number + 1, FLAG_CLIENTSIDE));
        }
    }
    out
}
