//! `ACSE` container output.
//!
//! ```text
//! "ACSE" u32 chunk_offset
//! code ... init script
//! chunks: name[4] u32 size data[size]  (repeated to end of file)
//! ```

use super::generate::{Layout, CODE_BASE};
use super::pcode::Instr;
use crate::error::{CodegenError, CodegenResult};
use acsc_ir::Program;
use tracing::trace;

/// Scripts with more locals than this need an `SVCT` entry.
const DEFAULT_SCRIPT_LOCALS: u32 = 20;

pub fn emit(prog: &Program, layout: &Layout) -> CodegenResult<Vec<u8>> {
    let mut out = Vec::with_capacity(layout.code_end as usize + 256);
    out.extend_from_slice(b"ACSE");
    put_u32(&mut out, layout.code_end);

    encode(prog, &layout.code, &mut out)?;
    let code_end = layout.init.as_ref().map_or(layout.code_end, |i| i.code_init);
    check("code", code_end, out.len())?;

    if let Some(init) = &layout.init {
        encode(prog, &init.emit()?, &mut out)?;
        check("init script", layout.code_end, out.len())?;
    }

    let chunks_at = out.len();
    put_chunks(layout, &mut out);
    trace!(code = chunks_at - CODE_BASE as usize, chunks = out.len() - chunks_at, "container written");
    Ok(out)
}

fn encode(prog: &Program, code: &[Instr], out: &mut Vec<u8>) -> CodegenResult<()> {
    code.iter().try_for_each(|i| i.encode(prog, out))
}

fn check(what: &str, expected: u32, actual: usize) -> CodegenResult<()> {
    if actual == expected as usize {
        Ok(())
    } else {
        Err(CodegenError::SizeMismatch {
            what: what.into(),
            expected,
            actual: actual as u32,
        })
    }
}

// ══════════════════════════════════════════════════════════════════════
// Chunks
// ══════════════════════════════════════════════════════════════════════

fn put_chunks(layout: &Layout, out: &mut Vec<u8>) {
    let mut data = Vec::new();
    for a in &layout.map_arrays {
        put_u32(&mut data, a.number);
        put_u32(&mut data, a.words);
    }
    chunk(out, b"ARAY", &data);

    for a in layout.map_arrays.iter().filter(|a| !a.init.is_empty()) {
        let mut data = Vec::new();
        put_u32(&mut data, a.number);
        a.init.iter().for_each(|&w| put_u32(&mut data, w));
        chunk(out, b"AINI", &data);
    }

    chunk(out, b"FNAM", &name_table(layout.funcs.iter().map(|f| f.name.as_str())));

    let mut data = Vec::new();
    for f in &layout.funcs {
        data.extend_from_slice(&[f.argc, f.locals, u8::from(f.has_return), 0]);
        put_u32(&mut data, f.addr);
    }
    chunk(out, b"FUNC", &data);

    let mut data = Vec::new();
    for name in &layout.imports {
        data.extend_from_slice(name.as_bytes());
        data.push(0);
    }
    chunk(out, b"LOAD", &data);

    if layout.map_reg_names.iter().any(|n| !n.is_empty()) {
        chunk(out, b"MEXP", &name_table(layout.map_reg_names.iter().map(String::as_str)));
    }

    if layout.map_regs.iter().any(|&w| w != 0) {
        let mut data = Vec::new();
        put_u32(&mut data, 0);
        layout.map_regs.iter().for_each(|&w| put_u32(&mut data, w));
        chunk(out, b"MINI", &data);
    }

    let mut data = Vec::new();
    for s in layout.scripts.iter().filter(|s| s.flags != 0) {
        put_i16(&mut data, s.number);
        data.extend_from_slice(&s.flags.to_le_bytes());
    }
    chunk(out, b"SFLG", &data);

    chunk(out, b"SNAM", &name_table(layout.script_names.iter().map(String::as_str)));

    let mut data = Vec::new();
    for s in &layout.scripts {
        put_i16(&mut data, s.number);
        data.extend_from_slice(&[s.stype, s.argc]);
        put_u32(&mut data, s.addr);
    }
    chunk(out, b"SPTR", &data);

    if !layout.strings.is_empty() {
        chunk(out, b"STRL", &string_list(&layout.strings));
    }

    let mut data = Vec::new();
    for s in layout.scripts.iter().filter(|s| s.locals > DEFAULT_SCRIPT_LOCALS) {
        put_i16(&mut data, s.number);
        data.extend_from_slice(&(s.locals.min(u16::MAX as u32) as u16).to_le_bytes());
    }
    chunk(out, b"SVCT", &data);
}

/// Write a chunk; empty chunks are omitted.
fn chunk(out: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
    if data.is_empty() {
        return;
    }
    out.extend_from_slice(name);
    put_u32(out, data.len() as u32);
    out.extend_from_slice(data);
}

/// Count, offsets relative to the chunk start, then NUL-terminated names.
fn name_table<'a>(names: impl ExactSizeIterator<Item = &'a str> + Clone) -> Vec<u8> {
    let count = names.len();
    if count == 0 {
        return Vec::new();
    }
    let mut data = Vec::new();
    put_u32(&mut data, count as u32);
    let mut at = 4 + 4 * count;
    for n in names.clone() {
        put_u32(&mut data, at as u32);
        at += n.len() + 1;
    }
    for n in names {
        data.extend_from_slice(n.as_bytes());
        data.push(0);
    }
    data
}

/// `STRL`: reserved word, count, reserved word, offsets, strings.
fn string_list(strings: &[String]) -> Vec<u8> {
    let mut data = Vec::new();
    put_u32(&mut data, 0);
    put_u32(&mut data, strings.len() as u32);
    put_u32(&mut data, 0);
    let mut at = 12 + 4 * strings.len();
    for s in strings {
        put_u32(&mut data, at as u32);
        at += s.len() + 1;
    }
    for s in strings {
        data.extend_from_slice(s.as_bytes());
        data.push(0);
    }
    data
}

fn put_u32(out: &mut Vec<u8>, w: u32) {
    out.extend_from_slice(&w.to_le_bytes());
}

fn put_i16(out: &mut Vec<u8>, n: i32) {
    out.extend_from_slice(&(n as i16).to_le_bytes());
}
