//! ACSC bytecode backends.
//!
//! # Architecture
//!
//! A backend implements [`BytecodeInfo`], the five hooks the pipeline driver
//! calls in a fixed order:
//!
//! 1. `legalize`: rewrite operations the target lacks into helper calls or
//!    inline sequences. Defining a new helper yields
//!    [`LegalizeStatus::Restart`] and the driver reruns the pass.
//! 2. `optimize`: peephole rewrites to a fixed point (see [`optimize`]).
//! 3. `translate`: bring every statement into the target's stack-machine
//!    normal form.
//! 4. `generate`: allocate indices and addresses, lay out code.
//! 5. `emit`: write the final container.
//!
//! Arithmetic conversions (`Conv`) are expanded by [`convert`] during
//! legalize. [`zdacs`] is the ZDoom ACS backend.

pub mod convert;
pub mod error;
pub mod info;
pub mod optimize;
pub mod zdacs;

pub use error::{CodegenError, CodegenResult};
pub use info::{BytecodeInfo, LegalizeStatus, RestartReason};
pub use zdacs::{Engine, InitOptions, ZdacsInfo};
