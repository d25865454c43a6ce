use crate::{Block, Origin};
use serde::{Deserialize, Serialize};

/// Calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallType {
    #[default]
    None,
    StdCall,
    StkCall,
    Native,
    Special,
    Script,
    ScriptI,
    ScriptS,
}

impl CallType {
    pub fn is_script(self) -> bool {
        matches!(self, CallType::Script | CallType::ScriptI | CallType::ScriptS)
    }
}

/// Symbol linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Linkage {
    #[default]
    None,
    ExtAcs,
    ExtC,
    IntC,
}

impl Linkage {
    pub fn is_external(self) -> bool {
        matches!(self, Linkage::ExtAcs | Linkage::ExtC)
    }
}

/// A function or script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub block: Block,
    pub ctype: CallType,
    pub linka: Linkage,
    pub pos: Origin,
    /// Parameter words.
    pub param: u32,
    /// Return words.
    pub retrn: u32,
    /// Local register words.
    pub local_reg: u32,
    /// Automatic-storage words.
    pub alloc_aut: u32,
    /// Has a body in this program.
    pub defin: bool,
    /// Needs an index or script number assigned.
    pub alloc: bool,
    /// Function index, or script number.
    pub value_int: i32,
    /// Script name for named scripts.
    pub value_str: Option<String>,
    /// Script type (open, enter, ...).
    pub stype: u8,
    /// Script flags.
    pub sflags: u16,
    label_count: u32,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            block: Block::new(),
            ctype: CallType::StkCall,
            linka: Linkage::ExtC,
            pos: Origin::none(),
            param: 0,
            retrn: 0,
            local_reg: 0,
            alloc_aut: 0,
            defin: false,
            alloc: true,
            value_int: 0,
            value_str: None,
            stype: 0,
            sflags: 0,
            label_count: 0,
        }
    }

    /// A fresh label name scoped to this function.
    pub fn gen_label(&mut self) -> String {
        let n = self.label_count;
        self.label_count += 1;
        format!("{}$L{n}", self.name)
    }

    /// Reserve `n` local register words, returning the first index.
    pub fn alloc_local(&mut self, n: u32) -> u32 {
        let first = self.local_reg;
        self.local_reg += n;
        first
    }
}
