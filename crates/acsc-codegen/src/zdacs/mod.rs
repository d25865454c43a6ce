//! ZDoom ACS backend.
//!
//! # Pipeline
//!
//! 1. [`legalize`]: helper calls, inline rewrites and `Conv` expansion, so
//!    every statement has a native form at its width.
//! 2. [`translate`]: rewrite statements into stack-machine normal form,
//!    where each statement selects a fixed pcode sequence ([`select`]).
//! 3. [`generate`]: number functions, scripts, strings and arrays, place
//!    objects, lay out code and the static initializer ([`init`]).
//! 4. [`emit`]: write the `ACSE` container.

pub mod emit;
pub mod generate;
pub mod helpers;
pub mod init;
pub mod legalize;
pub mod pcode;
pub mod select;
pub mod translate;

use crate::error::CodegenResult;
use crate::info::{BytecodeInfo, LegalizeStatus};
use acsc_ir::{Diagnostic, Origin, Program};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::info;

pub use generate::Layout;
pub use init::InitLayout;

/// Target name used in diagnostics.
pub const TARGET: &str = "ZDACS";

/// Global register holding the automatic storage pointer.
pub const AUTO_PTR_REG: u32 = 63;

/// Global register receiving the second word of multiword returns. Further
/// words use the registers below it.
pub const RETURN_REG: u32 = 62;

/// Engine variant of the ZDoom ACS family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Engine {
    #[default]
    ZDoom,
    Zandronum,
}

/// Settings for the static initializer script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitOptions {
    /// Tics to wait before marking data initialized.
    pub delay: Option<u32>,
    pub script_name: Option<String>,
    pub script_named: bool,
    pub script_number: i32,
    /// Run as an event script and check the event type first.
    pub script_event: bool,
    /// Global array holding the initialized flag. A hidden array is used when unset.
    pub gbl_array: Option<u32>,
    pub gbl_index: u32,
    pub hub_array: Option<u32>,
    pub hub_index: u32,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            delay: None,
            script_name: None,
            script_named: false,
            script_number: 999,
            script_event: false,
            gbl_array: None,
            gbl_index: 0,
            hub_array: None,
            hub_index: 0,
        }
    }
}

/// The ZDoom ACS target.
#[derive(Debug, Clone, Default)]
pub struct ZdacsInfo {
    pub engine: Engine,
    pub init: InitOptions,
    /// Output base name, used to name the init script.
    pub output_name: String,
    layout: Option<Layout>,
}

impl ZdacsInfo {
    pub fn new(engine: Engine, init: InitOptions, output_name: impl Into<String>) -> Self {
        Self {
            engine,
            init,
            output_name: output_name.into(),
            layout: None,
        }
    }

    /// Layout computed by the last `generate`.
    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }
}

impl BytecodeInfo for ZdacsInfo {
    fn name(&self) -> &'static str {
        TARGET
    }

    fn legalize(&mut self, prog: &mut Program) -> CodegenResult<LegalizeStatus> {
        legalize::legalize(prog)
    }

    fn translate(&mut self, prog: &mut Program) -> CodegenResult<()> {
        translate::translate(prog)
    }

    fn generate(&mut self, prog: &mut Program) -> CodegenResult<()> {
        let layout = generate::generate(prog, self.engine, &self.init, &self.output_name)?;
        info!(
            code = layout.code_end,
            functions = layout.funcs.len(),
            scripts = layout.scripts.len(),
            "generated"
        );
        self.layout = Some(layout);
        Ok(())
    }

    fn emit(&mut self, prog: &Program, out: &mut dyn Write) -> CodegenResult<()> {
        let Some(layout) = self.layout.as_ref() else {
            return Err(Diagnostic::internal(Origin::none(), "emit before generate").into());
        };
        let bytes = emit::emit(prog, layout)?;
        info!(bytes = bytes.len(), "emitted");
        out.write_all(&bytes)?;
        Ok(())
    }
}
