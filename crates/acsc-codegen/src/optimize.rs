//! Target-independent peephole optimizer.
//!
//! Each rule only removes statements, so repeated passes reach a fixed point.
//! Labels of removed statements move to the next surviving statement.

use acsc_ir::{Arg, ArgData, Block, Code, ExpArena, ExpKind, Program, Statement};
use tracing::debug;

/// Optimize every defined function. Returns whether anything changed.
pub fn optimize(prog: &mut Program) -> bool {
    let exps = &prog.exps;
    let mut changed = false;
    for f in prog.functions.values_mut().filter(|f| f.defin) {
        let before = f.block.len();
        if optimize_block(&mut f.block, exps) {
            debug!(func = %f.name, before, after = f.block.len(), "optimized");
            changed = true;
        }
    }
    changed
}

/// Run peephole passes over one block until nothing changes.
pub fn optimize_block(block: &mut Block, exps: &ExpArena) -> bool {
    let mut changed = false;
    while pass(block, exps) {
        changed = true;
    }
    changed
}

fn pass(block: &mut Block, exps: &ExpArena) -> bool {
    let old = std::mem::take(&mut block.stmnts);
    let mut out = Block::new();
    let mut changed = false;
    let mut dead = false;
    let mut i = 0;

    while let Some(s) = old.get(i) {
        let next = old.get(i + 1);
        i += 1;

        if !s.labels.is_empty() {
            dead = false;
        }

        // Unreachable.
        if dead {
            changed = true;
            continue;
        }

        if removable(s, next, exps) {
            carry(&mut out, s);
            changed = true;
            continue;
        }

        // Push immediately undone by a pop.
        if let Some(n) = next {
            if n.labels.is_empty() && cancels(s, n) {
                carry(&mut out, s);
                i += 1;
                changed = true;
                continue;
            }
        }

        dead = s.code.is_terminator();
        out.add(s.clone());
    }

    out.seal();
    block.stmnts = out.stmnts;
    changed
}

/// Move a removed statement's labels to the next surviving one.
fn carry(out: &mut Block, s: &Statement) {
    for l in &s.labels {
        out.add_label(l.clone());
    }
}

fn removable(s: &Statement, next: Option<&Statement>, exps: &ExpArena) -> bool {
    match s.code {
        Code::Nop => next.is_some() || s.labels.is_empty(),
        Code::Move => {
            s.args.len() == 2 && s.args[0] == s.args[1] && !s.args[0].uses_stk() && !s.args[0].is_nul()
        }
        Code::Jump => match (s.args.first(), next) {
            (Some(Arg { data: ArgData::Lit { exp, .. }, .. }), Some(n)) => match exps.kind(*exp) {
                ExpKind::Glyph(name) => n.labels.iter().any(|l| l == name),
                _ => false,
            },
            _ => false,
        },
        _ => false,
    }
}

/// `Move Stk <- X` followed by `Move Nul <- Stk` or `Move X <- Stk`.
fn cancels(s: &Statement, n: &Statement) -> bool {
    if s.code != Code::Move || n.code != Code::Move || s.args.len() != 2 || n.args.len() != 2 {
        return false;
    }
    let (push_dst, push_src) = (&s.args[0], &s.args[1]);
    let (pop_dst, pop_src) = (&n.args[0], &n.args[1]);
    if !push_dst.is_stk() || !pop_src.is_stk() || push_src.uses_stk() || push_dst.size != pop_src.size {
        return false;
    }
    pop_dst.is_nul() || (pop_dst == push_src && !pop_dst.is_lit())
}
