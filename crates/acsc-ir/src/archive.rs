//! IR archive codec.
//!
//! An archive is one JSON header line followed by the JSON body:
//!
//! ```text
//! {"magic":"acsc-ir","version":1,"digest":"<sha256 of body>"}
//! {"exps":{"nodes":[...]},"glyphs":{...},"functions":{...},...}
//! ```
//!
//! Every sum type in the body is tagged by variant name, so an unknown or
//! malformed tag fails the decode. The digest catches truncated and
//! hand-edited archives.

use crate::Program;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

pub const MAGIC: &str = "acsc-ir";
pub const VERSION: u32 = 1;

/// Errors raised while decoding an IR archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive header")]
    Header,

    #[error("not an IR archive (magic {0:?})")]
    Magic(String),

    #[error("unsupported archive version {0}")]
    Version(u32),

    #[error("archive digest mismatch")]
    Digest,

    #[error("invalid archive body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("invalid expression: {0}")]
    Invalid(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Serialize, Deserialize)]
struct Header {
    magic: String,
    version: u32,
    digest: String,
}

fn digest(body: &[u8]) -> String {
    Sha256::digest(body)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Serialize `prog` to archive bytes.
pub fn encode(prog: &Program) -> ArchiveResult<Vec<u8>> {
    let body = serde_json::to_vec(prog)?;
    let header = Header {
        magic: MAGIC.to_string(),
        version: VERSION,
        digest: digest(&body),
    };
    let mut out = serde_json::to_vec(&header)?;
    out.push(b'\n');
    out.extend_from_slice(&body);
    debug!(bytes = out.len(), "encoded IR archive");
    Ok(out)
}

/// Decode and validate archive bytes.
pub fn decode(bytes: &[u8]) -> ArchiveResult<Program> {
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or(ArchiveError::Header)?;
    let header: Header =
        serde_json::from_slice(&bytes[..split]).map_err(|_| ArchiveError::Header)?;
    if header.magic != MAGIC {
        return Err(ArchiveError::Magic(header.magic));
    }
    if header.version != VERSION {
        return Err(ArchiveError::Version(header.version));
    }

    let body = &bytes[split + 1..];
    if digest(body) != header.digest {
        return Err(ArchiveError::Digest);
    }

    let prog: Program = serde_json::from_slice(body)?;
    prog.validate().map_err(ArchiveError::Invalid)?;
    debug!(functions = prog.functions.len(), exps = prog.exps.len(), "decoded IR archive");
    Ok(prog)
}

/// Whether `bytes` starts like an IR archive.
pub fn is_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(b"{\"magic\":\"acsc-ir\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_round_trips() {
        let p = Program::new();
        let bytes = encode(&p).unwrap();
        assert!(is_archive(&bytes));
        assert_eq!(decode(&bytes).unwrap(), p);
    }

    #[test]
    fn missing_header_rejected() {
        assert!(matches!(decode(b"{}"), Err(ArchiveError::Header)));
    }
}
