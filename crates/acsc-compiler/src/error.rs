//! Driver error types and exit statuses.

use acsc_codegen::CodegenError;
use acsc_ir::archive::ArchiveError;
use acsc_ir::Diagnostic;
use thiserror::Error;

pub const EXIT_OK: i32 = 0;
pub const EXIT_USER: i32 = 1;
pub const EXIT_IO: i32 = 2;
pub const EXIT_ARCHIVE: i32 = 3;
pub const EXIT_INTERNAL: i32 = 70;

/// Anything that stops a build.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{0}")]
    Archive(#[from] ArchiveError),

    #[error("{0}")]
    Codegen(#[from] CodegenError),

    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),

    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),

    /// Legalize kept asking for restarts.
    #[error("legalize did not converge after {0} restarts")]
    RestartLimit(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LinkResult<T> = Result<T, LinkError>;

/// Process exit status for a failed build.
pub fn exit_code(err: &LinkError) -> i32 {
    match err {
        LinkError::Archive(_) => EXIT_ARCHIVE,
        LinkError::Codegen(CodegenError::Io(_)) | LinkError::Io(_) => EXIT_IO,
        LinkError::Codegen(e) if e.is_internal() => EXIT_INTERNAL,
        LinkError::Diagnostic(d) if d.is_internal() => EXIT_INTERNAL,
        LinkError::RestartLimit(_) => EXIT_INTERNAL,
        LinkError::Codegen(_) | LinkError::Diagnostic(_) | LinkError::Options(_) => EXIT_USER,
    }
}

/// The single diagnostic line printed for a failed build.
pub fn report(err: &LinkError) -> String {
    let line = err.to_string();
    match exit_code(err) {
        EXIT_INTERNAL => format!("internal error: {line}"),
        _ => line,
    }
}
