//! ACSC compiler: drives IR through a bytecode backend.
//!
//! ```text
//! IR archives → link → legalize ⟲ → optimize → translate → optimize → translate
//!             → generate → emit → bytecode
//! ```
//!
//! Library code never installs a logging subscriber and never prints; a
//! failed build is reported through [`report`] and [`exit_code`].

pub mod error;
pub mod options;

pub use error::{exit_code, report, LinkError, LinkResult};
pub use options::{Options, Target};

use acsc_codegen::{BytecodeInfo, LegalizeStatus, ZdacsInfo};
use acsc_ir::{archive, Program};
use std::io::Write;
use tracing::{debug, info, warn};

/// Restarts allowed before legalize is considered stuck.
pub const MAX_RESTARTS: usize = 256;

// ══════════════════════════════════════════════════════════════════════════════
// Pipeline
// ══════════════════════════════════════════════════════════════════════════════

/// Run the backend's legalize pass until it stops asking for restarts.
pub fn legalize(prog: &mut Program, info: &mut dyn BytecodeInfo) -> LinkResult<()> {
    for restarts in 0..=MAX_RESTARTS {
        match info.legalize(prog)? {
            LegalizeStatus::Complete => {
                debug!(backend = info.name(), restarts, "legalize complete");
                return Ok(());
            }
            LegalizeStatus::Restart(reason) => debug!(?reason, "legalize restart"),
        }
    }
    Err(LinkError::RestartLimit(MAX_RESTARTS))
}

/// Bring a program into the backend's normal form.
pub fn process_ir(prog: &mut Program, info: &mut dyn BytecodeInfo) -> LinkResult<()> {
    legalize(prog, info)?;
    info.optimize(prog)?;
    info.translate(prog)?;
    info.optimize(prog)?;
    info.translate(prog)?;
    Ok(())
}

/// The backend for `target`, configured from `opts`.
pub fn get_bytecode_info(target: Target, opts: &Options) -> Box<dyn BytecodeInfo> {
    match target {
        Target::Zdacs => Box::new(ZdacsInfo::new(opts.engine, opts.init.clone(), opts.output_name.clone())),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Output
// ══════════════════════════════════════════════════════════════════════════════

/// Write `prog` as an IR archive.
pub fn put_ir(prog: &Program, out: &mut dyn Write) -> LinkResult<()> {
    out.write_all(&archive::encode(prog)?)?;
    Ok(())
}

/// Lower `prog` and write bytecode. Nothing is written unless every pass
/// succeeds.
pub fn put_bytecode(prog: &mut Program, opts: &Options, out: &mut dyn Write) -> LinkResult<()> {
    let mut info = get_bytecode_info(opts.target, opts);
    process_ir(prog, info.as_mut())?;
    info.generate(prog)?;

    let mut bytes = Vec::new();
    info.emit(prog, &mut bytes)?;
    out.write_all(&bytes)?;
    Ok(())
}

/// Merge IR archives into one program and write the requested output.
pub fn link(inputs: &[Vec<u8>], opts: &Options) -> LinkResult<Vec<u8>> {
    let mut prog = Program::new();
    for input in inputs {
        prog.merge(archive::decode(input)?)?;
    }

    for lib in &opts.libraries {
        if prog.imports.iter().any(|i| &i.name == lib) {
            warn!(library = %lib, "duplicate import");
        }
        prog.add_import(lib.clone());
    }
    info!(inputs = inputs.len(), functions = prog.functions.len(), "linked");

    let mut out = Vec::new();
    if opts.output_ir {
        put_ir(&prog, &mut out)?;
    } else {
        put_bytecode(&mut prog, opts, &mut out)?;
    }
    Ok(out)
}
