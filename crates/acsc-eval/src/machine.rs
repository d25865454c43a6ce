//! The IR word machine.

use crate::error::{EvalError, EvalResult};
use crate::ops;
use acsc_ir::{Arg, ArgData, Code, ExpKind, Function, Program, Statement, Value};
use std::collections::HashMap;
use tracing::trace;

/// Steps allowed per [`Machine::call`] before giving up.
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

#[derive(Default)]
struct Frame {
    locals: HashMap<u32, u32>,
}

/// Executes the functions of one program.
pub struct Machine<'p> {
    prog: &'p Program,
    stack: Vec<u32>,
    mod_regs: HashMap<u32, u32>,
    hub_regs: HashMap<u32, u32>,
    gbl_regs: HashMap<u32, u32>,
    mod_arrs: HashMap<(u32, u32), u32>,
    hub_arrs: HashMap<(u32, u32), u32>,
    gbl_arrs: HashMap<(u32, u32), u32>,
    auto: Vec<u32>,
    auto_frames: Vec<usize>,
    /// Gas counter: statements executed so far.
    pub gas: u64,
    pub gas_limit: u64,
}

impl<'p> Machine<'p> {
    pub fn new(prog: &'p Program) -> Self {
        Self {
            prog,
            stack: Vec::new(),
            mod_regs: HashMap::new(),
            hub_regs: HashMap::new(),
            gbl_regs: HashMap::new(),
            mod_arrs: HashMap::new(),
            hub_arrs: HashMap::new(),
            gbl_arrs: HashMap::new(),
            auto: Vec::new(),
            auto_frames: Vec::new(),
            gas: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }

    pub fn stack(&self) -> &[u32] {
        &self.stack
    }

    pub fn gbl_reg(&self, idx: u32) -> u32 {
        self.gbl_regs.get(&idx).copied().unwrap_or(0)
    }

    pub fn set_gbl_reg(&mut self, idx: u32, v: u32) {
        self.gbl_regs.insert(idx, v);
    }

    pub fn mod_reg(&self, idx: u32) -> u32 {
        self.mod_regs.get(&idx).copied().unwrap_or(0)
    }

    pub fn gbl_arr(&self, arr: u32, idx: u32) -> u32 {
        self.gbl_arrs.get(&(arr, idx)).copied().unwrap_or(0)
    }

    pub fn hub_arr(&self, arr: u32, idx: u32) -> u32 {
        self.hub_arrs.get(&(arr, idx)).copied().unwrap_or(0)
    }

    pub fn mod_arr(&self, arr: u32, idx: u32) -> u32 {
        self.mod_arrs.get(&(arr, idx)).copied().unwrap_or(0)
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.gas += 1;
        if self.gas > self.gas_limit {
            Err(EvalError::GasExhausted)
        } else {
            Ok(())
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Calls
    // ══════════════════════════════════════════════════════════════════

    /// Call `name` with parameter words `args`, returning its result words.
    ///
    /// Declared helpers without a body run the generic operation they stand for.
    pub fn call(&mut self, name: &str, args: &[u32]) -> EvalResult<Vec<u32>> {
        let prog = self.prog;
        match prog.find_function(name) {
            Some(f) if f.defin => self.run(f, args),
            _ => {
                let (code, n) =
                    Code::from_helper_name(name).ok_or_else(|| EvalError::UndefinedFunction(name.into()))?;
                let mut operands = Vec::new();
                let mut rest = args;
                for size in code.operand_sizes(n) {
                    let size = size as usize;
                    if rest.len() < size {
                        return Err(EvalError::BadOperand(format!("{name}: too few arguments")));
                    }
                    operands.push(rest[..size].to_vec());
                    rest = &rest[size..];
                }
                ops::apply(code, n, &operands)
            }
        }
    }

    fn run(&mut self, f: &'p Function, args: &[u32]) -> EvalResult<Vec<u32>> {
        let stmts = &f.block.stmnts;
        let mut labels = HashMap::new();
        for (i, s) in stmts.iter().enumerate() {
            for l in &s.labels {
                labels.insert(l.as_str(), i);
            }
        }

        let mut frame = Frame::default();
        for (i, w) in args.iter().enumerate() {
            frame.locals.insert(i as u32, *w);
        }

        let mut pc = 0;
        while let Some(s) = stmts.get(pc) {
            self.tick()?;
            pc += 1;
            trace!(func = %f.name, stmt = %s, "exec");

            match s.code {
                Code::Nop | Code::XcodSid => {}
                Code::Move => {
                    let v = self.read(&mut frame, &s.args[1])?;
                    self.write(&mut frame, &s.args[0], &v)?;
                }
                Code::Copy => {
                    let v = self.peek(s.args[1].size)?;
                    self.stack.extend(v);
                }
                Code::Swap => {
                    let n = s.args[0].size;
                    let b = self.pop(n)?;
                    let a = self.pop(n)?;
                    self.stack.extend(b);
                    self.stack.extend(a);
                }
                Code::Jump => pc = self.target(&labels, &s.args[0])?,
                Code::JcndNil | Code::JcndTru => {
                    let c = self.read(&mut frame, &s.args[0])?;
                    let zero = c.iter().all(|w| *w == 0);
                    if zero == (s.code == Code::JcndNil) {
                        pc = self.target(&labels, &s.args[1])?;
                    }
                }
                Code::Retn => {
                    return match s.args.first() {
                        Some(a) => self.read(&mut frame, a),
                        None => Ok(Vec::new()),
                    };
                }
                Code::Call => self.exec_call(&mut frame, s)?,
                Code::Conv => self.exec_conv(&mut frame, s)?,
                Code::Plsa => {
                    let n = self.index(&mut frame, &s.args[0])? as usize;
                    self.auto_frames.push(self.auto.len());
                    self.auto.resize(self.auto.len() + n, 0);
                }
                Code::Plsf => {
                    if let Some(base) = self.auto_frames.pop() {
                        self.auto.truncate(base);
                    }
                }
                Code::Pltn => {
                    let v = self.index(&mut frame, &s.args[1])?;
                    let base = self.auto_frames.last().copied().unwrap_or(0) as u32;
                    self.write(&mut frame, &s.args[0], &[v.wrapping_add(base)])?;
                }
                Code::Cnat | Code::Cspe | Code::Casm => {
                    return Err(EvalError::Unsupported(s.code.to_string()));
                }
                c if c.is_call() => return Err(EvalError::Unsupported(c.to_string())),
                code => {
                    let srcs = self.read_sources(&mut frame, &s.args[1..])?;
                    let r = ops::apply(code, s.size, &srcs)?;
                    self.write(&mut frame, &s.args[0], &r)?;
                }
            }
        }
        Ok(Vec::new())
    }

    fn exec_call(&mut self, frame: &mut Frame, s: &Statement) -> EvalResult<()> {
        let params = self.read_sources(frame, &s.args[2..])?;
        let name = match &s.args[1].data {
            ArgData::Lit { exp, .. } => match self.prog.exps.kind(*exp) {
                ExpKind::Glyph(name) => name.clone(),
                _ => {
                    let idx = self.index(frame, &s.args[1])?;
                    self.function_by_index(idx)?
                }
            },
            _ => {
                let idx = self.index(frame, &s.args[1])?;
                self.function_by_index(idx)?
            }
        };
        let words: Vec<u32> = params.into_iter().flatten().collect();
        let r = self.call(&name, &words)?;
        self.write(frame, &s.args[0], &r)
    }

    fn exec_conv(&mut self, frame: &mut Frame, s: &Statement) -> EvalResult<()> {
        let ty_of = |a: &Arg| match a.data {
            ArgData::Lit { exp, .. } => Ok(self.prog.type_of(exp)?),
            _ => Err(EvalError::BadOperand("conversion type must be a literal".into())),
        };
        let dst_t = ty_of(&s.args[2])?;
        let src_t = ty_of(&s.args[3])?;
        let src = self.read(frame, &s.args[1])?;
        let v = Value::from_words(&src_t, &src)
            .and_then(|v| v.convert(&dst_t))
            .map_err(|e| EvalError::BadOperand(e.to_string()))?;
        self.write(frame, &s.args[0], &v.to_words())
    }

    fn function_by_index(&self, idx: u32) -> EvalResult<String> {
        self.prog
            .functions
            .values()
            .find(|f| f.value_int as u32 == idx && !f.ctype.is_script())
            .map(|f| f.name.clone())
            .ok_or_else(|| EvalError::UndefinedFunction(format!("#{idx}")))
    }

    fn target(&self, labels: &HashMap<&str, usize>, arg: &Arg) -> EvalResult<usize> {
        let ArgData::Lit { exp, .. } = arg.data else {
            return Err(EvalError::BadOperand("jump target must be a literal".into()));
        };
        match self.prog.exps.kind(exp) {
            ExpKind::Glyph(name) => labels
                .get(name.as_str())
                .copied()
                .ok_or_else(|| EvalError::UndefinedLabel(name.clone())),
            other => Err(EvalError::BadOperand(format!("jump target {other:?}"))),
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Operand access
    // ══════════════════════════════════════════════════════════════════

    /// Stack operands are popped last to first.
    fn read_sources(&mut self, frame: &mut Frame, args: &[Arg]) -> EvalResult<Vec<Vec<u32>>> {
        let mut out = vec![Vec::new(); args.len()];
        for i in (0..args.len()).rev() {
            out[i] = self.read(frame, &args[i])?;
        }
        Ok(out)
    }

    fn pop(&mut self, n: u32) -> EvalResult<Vec<u32>> {
        let n = n as usize;
        if self.stack.len() < n {
            return Err(EvalError::StackUnderflow);
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn peek(&self, n: u32) -> EvalResult<Vec<u32>> {
        let n = n as usize;
        if self.stack.len() < n {
            return Err(EvalError::StackUnderflow);
        }
        Ok(self.stack[self.stack.len() - n..].to_vec())
    }

    fn index(&mut self, frame: &mut Frame, arg: &Arg) -> EvalResult<u32> {
        let w = self.read(frame, &arg.resized(1))?;
        Ok(w.first().copied().unwrap_or(0))
    }

    fn read(&mut self, frame: &mut Frame, arg: &Arg) -> EvalResult<Vec<u32>> {
        let n = arg.size;
        match &arg.data {
            ArgData::Stk => self.pop(n),
            ArgData::Cpy => self.peek(n),
            ArgData::Lit { .. } => Ok(self.prog.lit_words(arg)?),
            ArgData::Nul => Err(EvalError::BadOperand("read from Nul".into())),
            ArgData::LocReg(p) => {
                let base = self.index(frame, &p.idx)? + p.off;
                Ok((0..n)
                    .map(|i| frame.locals.get(&(base + i)).copied().unwrap_or(0))
                    .collect())
            }
            ArgData::ModReg(p) | ArgData::HubReg(p) | ArgData::GblReg(p) => {
                let base = self.index(frame, &p.idx)? + p.off;
                let regs = match arg.data {
                    ArgData::ModReg(_) => &self.mod_regs,
                    ArgData::HubReg(_) => &self.hub_regs,
                    _ => &self.gbl_regs,
                };
                Ok((0..n)
                    .map(|i| regs.get(&(base + i)).copied().unwrap_or(0))
                    .collect())
            }
            ArgData::ModArr(p) | ArgData::HubArr(p) | ArgData::GblArr(p) => {
                let idx = self.index(frame, &p.idx)? + p.off;
                let arr = self.index(frame, &p.arr)?;
                let arrs = match arg.data {
                    ArgData::ModArr(_) => &self.mod_arrs,
                    ArgData::HubArr(_) => &self.hub_arrs,
                    _ => &self.gbl_arrs,
                };
                Ok((0..n)
                    .map(|i| arrs.get(&(arr, idx + i)).copied().unwrap_or(0))
                    .collect())
            }
        }
    }

    fn write(&mut self, frame: &mut Frame, arg: &Arg, words: &[u32]) -> EvalResult<()> {
        let word = |i: u32| words.get(i as usize).copied().unwrap_or(0);
        let n = arg.size;
        match &arg.data {
            ArgData::Stk => self.stack.extend((0..n).map(word)),
            ArgData::Nul => {}
            ArgData::LocReg(p) => {
                let base = self.index(frame, &p.idx)? + p.off;
                for i in 0..n {
                    frame.locals.insert(base + i, word(i));
                }
            }
            ArgData::ModReg(p) | ArgData::HubReg(p) | ArgData::GblReg(p) => {
                let base = self.index(frame, &p.idx)? + p.off;
                let regs = match arg.data {
                    ArgData::ModReg(_) => &mut self.mod_regs,
                    ArgData::HubReg(_) => &mut self.hub_regs,
                    _ => &mut self.gbl_regs,
                };
                for i in 0..n {
                    regs.insert(base + i, word(i));
                }
            }
            ArgData::ModArr(p) | ArgData::HubArr(p) | ArgData::GblArr(p) => {
                let idx = self.index(frame, &p.idx)? + p.off;
                let arr = self.index(frame, &p.arr)?;
                let arrs = match arg.data {
                    ArgData::ModArr(_) => &mut self.mod_arrs,
                    ArgData::HubArr(_) => &mut self.hub_arrs,
                    _ => &mut self.gbl_arrs,
                };
                for i in 0..n {
                    arrs.insert((arr, idx + i), word(i));
                }
            }
            ArgData::Lit { .. } | ArgData::Cpy => {
                return Err(EvalError::BadOperand(format!("cannot write to {arg}")));
            }
        }
        Ok(())
    }
}
