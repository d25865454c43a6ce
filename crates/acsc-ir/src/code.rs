//! Generic stack-machine opcodes.
//!
//! Every opcode has a fixed operand count ([`Arity`]) that translation
//! checks before it emits anything. Word size lives on the statement, so
//! one opcode covers every width.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of arithmetic helper routine names, `__acsc_<Code>_W<n>`.
pub const HELPER_PREFIX: &str = "__acsc_";

/// Operand count accepted by an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{k}"),
            Arity::Range(lo, hi) => write!(f, "{lo}..={hi}"),
            Arity::AtLeast(k) => write!(f, "{k}+"),
        }
    }
}

macro_rules! codes {
    ($($variant:ident => $name:literal, $arity:expr;)*) => {
        /// A generic IR opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Code {
            $($variant,)*
        }

        impl Code {
            /// Every opcode, in declaration order.
            pub const ALL: &'static [Code] = &[$(Code::$variant,)*];

            /// Textual name, used in diagnostics and helper names.
            pub fn name(self) -> &'static str {
                match self {
                    $(Code::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Code> {
                match name {
                    $($name => Some(Code::$variant),)*
                    _ => None,
                }
            }

            pub fn arity(self) -> Arity {
                match self {
                    $(Code::$variant => $arity,)*
                }
            }
        }
    };
}

codes! {
    Nop     => "Nop",     Arity::Exact(0);

    AdXU    => "AdXU",    Arity::Range(3, 4);
    AddF    => "AddF",    Arity::Exact(3);
    AddI    => "AddI",    Arity::Exact(3);
    AddU    => "AddU",    Arity::Exact(3);
    AndU    => "AndU",    Arity::Exact(3);

    Bclo    => "Bclo",    Arity::Exact(2);
    Bclz    => "Bclz",    Arity::Exact(2);

    Call    => "Call",    Arity::AtLeast(2);
    Casm    => "Casm",    Arity::AtLeast(1);

    CmpFEq  => "CmpF_EQ", Arity::Exact(3);
    CmpFGe  => "CmpF_GE", Arity::Exact(3);
    CmpFGt  => "CmpF_GT", Arity::Exact(3);
    CmpFLe  => "CmpF_LE", Arity::Exact(3);
    CmpFLt  => "CmpF_LT", Arity::Exact(3);
    CmpFNe  => "CmpF_NE", Arity::Exact(3);
    CmpIEq  => "CmpI_EQ", Arity::Exact(3);
    CmpIGe  => "CmpI_GE", Arity::Exact(3);
    CmpIGt  => "CmpI_GT", Arity::Exact(3);
    CmpILe  => "CmpI_LE", Arity::Exact(3);
    CmpILt  => "CmpI_LT", Arity::Exact(3);
    CmpINe  => "CmpI_NE", Arity::Exact(3);
    CmpUEq  => "CmpU_EQ", Arity::Exact(3);
    CmpUGe  => "CmpU_GE", Arity::Exact(3);
    CmpUGt  => "CmpU_GT", Arity::Exact(3);
    CmpULe  => "CmpU_LE", Arity::Exact(3);
    CmpULt  => "CmpU_LT", Arity::Exact(3);
    CmpUNe  => "CmpU_NE", Arity::Exact(3);

    Cnat    => "Cnat",    Arity::AtLeast(2);
    Conv    => "Conv",    Arity::Exact(4);
    Copy    => "Copy",    Arity::Exact(2);
    CscrIA  => "Cscr_IA", Arity::AtLeast(2);
    CscrIS  => "Cscr_IS", Arity::AtLeast(2);
    CscrSA  => "Cscr_SA", Arity::AtLeast(2);
    CscrSS  => "Cscr_SS", Arity::AtLeast(2);
    Cspe    => "Cspe",    Arity::AtLeast(2);

    DiXI    => "DiXI",    Arity::Exact(3);
    DiXU    => "DiXU",    Arity::Exact(3);
    DivF    => "DivF",    Arity::Exact(3);
    DivI    => "DivI",    Arity::Exact(3);
    DivK    => "DivK",    Arity::Exact(3);
    DivU    => "DivU",    Arity::Exact(3);
    DivX    => "DivX",    Arity::Exact(3);

    InvU    => "InvU",    Arity::Exact(2);

    JcndNil => "Jcnd_Nil", Arity::Exact(2);
    JcndTru => "Jcnd_Tru", Arity::Exact(2);
    Jump    => "Jump",    Arity::Exact(1);

    LAnd    => "LAnd",    Arity::Exact(3);
    LOrI    => "LOrI",    Arity::Exact(3);

    ModI    => "ModI",    Arity::Exact(3);
    ModU    => "ModU",    Arity::Exact(3);
    Move    => "Move",    Arity::Exact(2);
    MuXU    => "MuXU",    Arity::Exact(3);
    MulF    => "MulF",    Arity::Exact(3);
    MulI    => "MulI",    Arity::Exact(3);
    MulK    => "MulK",    Arity::Exact(3);
    MulU    => "MulU",    Arity::Exact(3);
    MulX    => "MulX",    Arity::Exact(3);

    NegF    => "NegF",    Arity::Exact(2);
    NegI    => "NegI",    Arity::Exact(2);
    NotU    => "NotU",    Arity::Exact(2);

    OrIU    => "OrIU",    Arity::Exact(3);
    OrXU    => "OrXU",    Arity::Exact(3);

    Plsa    => "Plsa",    Arity::Exact(1);
    Plsf    => "Plsf",    Arity::Exact(0);
    Pltn    => "Pltn",    Arity::Exact(2);

    Retn    => "Retn",    Arity::Range(0, 1);

    ShLF    => "ShLF",    Arity::Exact(3);
    ShLU    => "ShLU",    Arity::Exact(3);
    ShRF    => "ShRF",    Arity::Exact(3);
    ShRI    => "ShRI",    Arity::Exact(3);
    ShRU    => "ShRU",    Arity::Exact(3);
    SuXU    => "SuXU",    Arity::Range(3, 4);
    SubF    => "SubF",    Arity::Exact(3);
    SubI    => "SubI",    Arity::Exact(3);
    SubU    => "SubU",    Arity::Exact(3);
    Swap    => "Swap",    Arity::Exact(2);

    XcodSid => "Xcod_SID", Arity::Exact(0);
}

impl Code {
    /// Name of the routine implementing this opcode at `size` words.
    pub fn helper_name(self, size: u32) -> String {
        format!("{HELPER_PREFIX}{}_W{size}", self.name())
    }

    /// Split a helper routine name into its opcode and width.
    pub fn from_helper_name(name: &str) -> Option<(Code, u32)> {
        let rest = name.strip_prefix(HELPER_PREFIX)?;
        let (code, n) = rest.rsplit_once("_W")?;
        Some((Code::from_name(code)?, n.parse().ok()?))
    }

    /// Operand sizes at width `n`, in operand order.
    pub fn operand_sizes(self, n: u32) -> Vec<u32> {
        match self {
            Code::ShLU | Code::ShRI | Code::ShRU | Code::ShLF | Code::ShRF => vec![n, 1],
            Code::NegF | Code::NegI | Code::InvU | Code::NotU | Code::Bclo | Code::Bclz => vec![n],
            _ => vec![n, n],
        }
    }

    /// Result size at width `n`.
    pub fn result_size(self, n: u32) -> u32 {
        match self {
            Code::NotU | Code::LAnd | Code::LOrI | Code::Bclo | Code::Bclz => 1,
            c if c.is_compare() => 1,
            Code::MuXU | Code::DiXI | Code::DiXU => 2 * n,
            Code::AdXU | Code::SuXU => n + 1,
            _ => n,
        }
    }

    /// Comparisons produce one word regardless of operand size.
    pub fn is_compare(self) -> bool {
        self.name().starts_with("Cmp")
    }

    /// Float operations.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Code::AddF
                | Code::SubF
                | Code::MulF
                | Code::DivF
                | Code::NegF
                | Code::ShLF
                | Code::ShRF
                | Code::CmpFEq
                | Code::CmpFNe
                | Code::CmpFLt
                | Code::CmpFGt
                | Code::CmpFLe
                | Code::CmpFGe
        )
    }

    /// Control transfers that end straight-line flow.
    pub fn is_terminator(self) -> bool {
        matches!(self, Code::Jump | Code::Retn)
    }

    /// Calls of any flavor.
    pub fn is_call(self) -> bool {
        matches!(
            self,
            Code::Call
                | Code::Cnat
                | Code::Cspe
                | Code::CscrIA
                | Code::CscrIS
                | Code::CscrSA
                | Code::CscrSS
        )
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
