//! Statement operands, tagged with the address space they live in.

use crate::ExpId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Register-style operand: a single index plus word offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgPtr1 {
    pub idx: Box<Arg>,
    pub off: u32,
}

/// Array-style operand: array number, element index and word offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgPtr2 {
    pub arr: Box<Arg>,
    pub idx: Box<Arg>,
    pub off: u32,
}

/// Where an operand's words live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgData {
    /// Copy of the operand stack top.
    Cpy,
    /// Literal words of an expression, starting at word `off`.
    Lit { exp: ExpId, off: u32 },
    /// Discard.
    Nul,
    /// Operand stack.
    Stk,
    LocReg(ArgPtr1),
    ModReg(ArgPtr1),
    HubReg(ArgPtr1),
    GblReg(ArgPtr1),
    ModArr(ArgPtr2),
    HubArr(ArgPtr2),
    GblArr(ArgPtr2),
}

/// Address-space kind of an [`Arg`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgBase {
    Cpy,
    Lit,
    Nul,
    Stk,
    LocReg,
    ModReg,
    HubReg,
    GblReg,
    ModArr,
    HubArr,
    GblArr,
}

impl fmt::Display for ArgBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A sized operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arg {
    /// Size in words.
    pub size: u32,
    pub data: ArgData,
}

impl Arg {
    pub fn new(size: u32, data: ArgData) -> Self {
        Self { size, data }
    }

    pub fn stk(size: u32) -> Self {
        Self::new(size, ArgData::Stk)
    }

    pub fn nul(size: u32) -> Self {
        Self::new(size, ArgData::Nul)
    }

    pub fn cpy(size: u32) -> Self {
        Self::new(size, ArgData::Cpy)
    }

    pub fn lit(size: u32, exp: ExpId) -> Self {
        Self::new(size, ArgData::Lit { exp, off: 0 })
    }

    /// Local register `idx` (a literal operand) plus `off` words.
    pub fn loc_reg(size: u32, idx: Arg, off: u32) -> Self {
        Self::new(size, ArgData::LocReg(ArgPtr1::new(idx, off)))
    }

    pub fn mod_reg(size: u32, idx: Arg, off: u32) -> Self {
        Self::new(size, ArgData::ModReg(ArgPtr1::new(idx, off)))
    }

    pub fn hub_reg(size: u32, idx: Arg, off: u32) -> Self {
        Self::new(size, ArgData::HubReg(ArgPtr1::new(idx, off)))
    }

    pub fn gbl_reg(size: u32, idx: Arg, off: u32) -> Self {
        Self::new(size, ArgData::GblReg(ArgPtr1::new(idx, off)))
    }

    pub fn mod_arr(size: u32, arr: Arg, idx: Arg, off: u32) -> Self {
        Self::new(size, ArgData::ModArr(ArgPtr2::new(arr, idx, off)))
    }

    pub fn hub_arr(size: u32, arr: Arg, idx: Arg, off: u32) -> Self {
        Self::new(size, ArgData::HubArr(ArgPtr2::new(arr, idx, off)))
    }

    pub fn gbl_arr(size: u32, arr: Arg, idx: Arg, off: u32) -> Self {
        Self::new(size, ArgData::GblArr(ArgPtr2::new(arr, idx, off)))
    }

    pub fn base(&self) -> ArgBase {
        match self.data {
            ArgData::Cpy => ArgBase::Cpy,
            ArgData::Lit { .. } => ArgBase::Lit,
            ArgData::Nul => ArgBase::Nul,
            ArgData::Stk => ArgBase::Stk,
            ArgData::LocReg(_) => ArgBase::LocReg,
            ArgData::ModReg(_) => ArgBase::ModReg,
            ArgData::HubReg(_) => ArgBase::HubReg,
            ArgData::GblReg(_) => ArgBase::GblReg,
            ArgData::ModArr(_) => ArgBase::ModArr,
            ArgData::HubArr(_) => ArgBase::HubArr,
            ArgData::GblArr(_) => ArgBase::GblArr,
        }
    }

    pub fn is_stk(&self) -> bool {
        matches!(self.data, ArgData::Stk)
    }

    pub fn is_lit(&self) -> bool {
        matches!(self.data, ArgData::Lit { .. })
    }

    pub fn is_nul(&self) -> bool {
        matches!(self.data, ArgData::Nul)
    }

    /// The one-word operand at word `i` of this operand.
    pub fn word(&self, i: u32) -> Arg {
        let data = match &self.data {
            ArgData::Lit { exp, off } => ArgData::Lit {
                exp: *exp,
                off: off + i,
            },
            ArgData::LocReg(p) => ArgData::LocReg(p.offset(i)),
            ArgData::ModReg(p) => ArgData::ModReg(p.offset(i)),
            ArgData::HubReg(p) => ArgData::HubReg(p.offset(i)),
            ArgData::GblReg(p) => ArgData::GblReg(p.offset(i)),
            ArgData::ModArr(p) => ArgData::ModArr(p.offset(i)),
            ArgData::HubArr(p) => ArgData::HubArr(p.offset(i)),
            ArgData::GblArr(p) => ArgData::GblArr(p.offset(i)),
            other => other.clone(),
        };
        Arg::new(1, data)
    }

    /// Same location, different size.
    pub fn resized(&self, size: u32) -> Arg {
        Arg::new(size, self.data.clone())
    }

    /// Operands nested inside this one (register and array indices).
    pub fn sub_args(&self) -> Vec<&Arg> {
        match &self.data {
            ArgData::LocReg(p) | ArgData::ModReg(p) | ArgData::HubReg(p) | ArgData::GblReg(p) => {
                vec![&*p.idx]
            }
            ArgData::ModArr(p) | ArgData::HubArr(p) | ArgData::GblArr(p) => vec![&*p.arr, &*p.idx],
            _ => Vec::new(),
        }
    }

    /// Whether this operand reads the operand stack, directly or through an index.
    pub fn uses_stk(&self) -> bool {
        self.is_stk() || self.sub_args().iter().any(|a| a.uses_stk())
    }

    /// Every expression referenced by this operand.
    pub fn exps(&self) -> Vec<ExpId> {
        let mut out = Vec::new();
        if let ArgData::Lit { exp, .. } = self.data {
            out.push(exp);
        }
        for a in self.sub_args() {
            out.extend(a.exps());
        }
        out
    }
}

impl ArgPtr1 {
    pub fn new(idx: Arg, off: u32) -> Self {
        Self {
            idx: Box::new(idx),
            off,
        }
    }

    fn offset(&self, i: u32) -> Self {
        Self {
            idx: self.idx.clone(),
            off: self.off + i,
        }
    }
}

impl ArgPtr2 {
    pub fn new(arr: Arg, idx: Arg, off: u32) -> Self {
        Self {
            arr: Box::new(arr),
            idx: Box::new(idx),
            off,
        }
    }

    fn offset(&self, i: u32) -> Self {
        Self {
            arr: self.arr.clone(),
            idx: self.idx.clone(),
            off: self.off + i,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ArgData::Lit { exp, off } => write!(f, "Lit({exp}+{off})"),
            ArgData::LocReg(p) | ArgData::ModReg(p) | ArgData::HubReg(p) | ArgData::GblReg(p) => {
                write!(f, "{}({}+{})", self.base(), p.idx, p.off)
            }
            ArgData::ModArr(p) | ArgData::HubArr(p) | ArgData::GblArr(p) => {
                write!(f, "{}({}, {}+{})", self.base(), p.arr, p.idx, p.off)
            }
            _ => write!(f, "{}", self.base()),
        }?;
        if self.size != 1 {
            write!(f, ":{}", self.size)?;
        }
        Ok(())
    }
}
