use std::collections::HashMap;

use crate::error::generic_error;
use crate::host::{Host, HostResult};
use crate::value::{Pointer, RtValue, Thrown};
use crate::{interp_bail, interp_ensure};
use sf_core::error::Result;
use sf_core::ir::{BlockId, Callee, Function, Module, OpId, OpKind, ValueId};
use sf_core::rtti::TypeInfoResolver;

mod operators;

const DEFAULT_STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Ops executed per `run` before giving up, counted across nested calls.
    pub step_limit: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

/// How a simulated call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Returned(Option<RtValue>),
    /// An exception left the function.
    Threw(Thrown),
}

impl Outcome {
    pub fn returned(&self) -> Option<&RtValue> {
        match self {
            Outcome::Returned(value) => value.as_ref(),
            Outcome::Threw(_) => None,
        }
    }

    pub fn thrown(&self) -> Option<&Thrown> {
        match self {
            Outcome::Threw(thrown) => Some(thrown),
            Outcome::Returned(_) => None,
        }
    }
}

/// Where control goes once an op has run.
enum Flow {
    Next,
    Jump(BlockId),
    Done(Outcome),
}

/// Per-call state: SSA values and the exception currently being handled.
struct Frame<'m> {
    func: &'m Function,
    values: HashMap<ValueId, RtValue>,
    in_flight: Option<Thrown>,
}

impl<'m> Frame<'m> {
    fn new(func: &'m Function) -> Self {
        Self {
            func,
            values: HashMap::new(),
            in_flight: None,
        }
    }

    fn get(&self, value: ValueId) -> Result<RtValue> {
        match self.values.get(&value) {
            Some(v) => Ok(v.clone()),
            None => interp_bail!(format!(
                "use of {} before definition in {}",
                value, self.func.name
            )),
        }
    }

    fn operand(&self, op: OpId, index: usize) -> Result<RtValue> {
        match self.func.op(op).operands.get(index) {
            Some(value) => self.get(*value),
            None => interp_bail!(format!("missing operand {}", index), op),
        }
    }

    fn operands(&self, op: OpId, from: usize) -> Result<Vec<RtValue>> {
        self.func
            .op(op)
            .operands
            .iter()
            .skip(from)
            .map(|value| self.get(*value))
            .collect()
    }

    fn define(&mut self, op: OpId, value: RtValue) -> Result<()> {
        let Some(result) = self.func.result(op) else {
            interp_bail!("op has no result to define", op);
        };
        self.values.insert(result, value);
        Ok(())
    }

    /// Bind call results; a host that returns fewer values than the op declares leaves the
    /// rest undefined.
    fn define_all(&mut self, op: OpId, mut values: Vec<RtValue>) {
        let results = &self.func.op(op).results;
        values.resize(results.len().max(values.len()), RtValue::Undef);
        for (result, value) in results.iter().zip(values) {
            self.values.insert(*result, value);
        }
    }

    fn enter(&mut self, block: BlockId, args: Vec<RtValue>) -> Result<()> {
        let params = &self.func.block(block).args;
        interp_ensure!(
            params.len() == args.len(),
            format!(
                "{} expects {} arguments, got {}",
                block,
                params.len(),
                args.len()
            )
        );
        for (param, arg) in params.iter().zip(args) {
            self.values.insert(*param, arg);
        }
        Ok(())
    }
}

/// Executes lowered functions of one module.
///
/// Calls resolve against the module first and fall back to the [`Host`]. Exceptions are
/// modelled the way the lowered code expects: an unwinding edge stores the exception as the
/// frame's in-flight exception, landing pads read it back and `EndCatch` retires it.
pub struct Interpreter<'m> {
    module: &'m Module,
    host: Host,
    options: InterpreterOptions,
    heap: Vec<RtValue>,
    steps: usize,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m Module, host: Host) -> Self {
        Self::with_options(module, host, InterpreterOptions::default())
    }

    pub fn with_options(module: &'m Module, host: Host, options: InterpreterOptions) -> Self {
        Self {
            module,
            host,
            options,
            heap: Vec::new(),
            steps: 0,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    /// Ops executed by the last `run`.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Call `name` with `args` and run it to completion.
    pub fn run(&mut self, name: &str, args: Vec<RtValue>) -> Result<Outcome> {
        let Some(func) = self.module.function(name) else {
            interp_bail!(format!("no function named {}", name));
        };
        self.steps = 0;
        let outcome = self.execute(func, args)?;
        tracing::debug!(function = name, steps = self.steps, ?outcome, "run finished");
        Ok(outcome)
    }

    /// Contents of the heap cell `ptr` points into.
    pub fn read(&self, ptr: &Pointer) -> Result<RtValue> {
        let Some(mut value) = self.heap.get(ptr.cell) else {
            interp_bail!(format!("dangling pointer to cell {}", ptr.cell));
        };
        for &index in &ptr.path {
            let field = match value {
                RtValue::Tuple(items) => items.get(index as usize),
                _ => None,
            };
            let Some(field) = field else {
                interp_bail!(format!("no field {} in {}", index, value));
            };
            value = field;
        }
        Ok(value.clone())
    }

    fn write(&mut self, ptr: &Pointer, new_value: RtValue) -> Result<()> {
        let Some(mut value) = self.heap.get_mut(ptr.cell) else {
            interp_bail!(format!("dangling pointer to cell {}", ptr.cell));
        };
        for &index in &ptr.path {
            value = match value {
                RtValue::Tuple(items) => match items.get_mut(index as usize) {
                    Some(field) => field,
                    None => interp_bail!(format!("no field {} in a tuple", index)),
                },
                _ => interp_bail!(format!("no field {} in a non-tuple cell", index)),
            };
        }
        *value = new_value;
        Ok(())
    }

    fn allocate(&mut self, value: RtValue) -> Pointer {
        self.heap.push(value);
        Pointer {
            cell: self.heap.len() - 1,
            path: Vec::new(),
        }
    }

    fn execute(&mut self, func: &'m Function, args: Vec<RtValue>) -> Result<Outcome> {
        let Some(entry) = func.entry_block() else {
            interp_bail!(format!("{} has no body", func.name));
        };
        let mut frame = Frame::new(func);
        frame.enter(entry, args)?;

        let mut block = entry;
        loop {
            tracing::trace!(function = %func.name, block = %block, "enter block");
            block = match self.run_block(&mut frame, block)? {
                Flow::Jump(next) => next,
                Flow::Done(outcome) => return Ok(outcome),
                Flow::Next => interp_bail!(format!("{} fell off its end", block)),
            };
        }
    }

    fn run_block(&mut self, frame: &mut Frame<'m>, block: BlockId) -> Result<Flow> {
        let func = frame.func;
        for &op in &func.block(block).ops {
            self.steps += 1;
            if self.steps > self.options.step_limit {
                return Err(generic_error(eyre::eyre!(
                    "step limit of {} exceeded in {}",
                    self.options.step_limit,
                    func.name
                )));
            }
            match self.step(frame, op)? {
                Flow::Next => continue,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn step(&mut self, frame: &mut Frame<'m>, op: OpId) -> Result<Flow> {
        let func = frame.func;
        let kind = func.kind(op);
        tracing::trace!(op = %op, kind = %kind, "step");
        match kind {
            OpKind::Constant(value) => frame.define(op, RtValue::from(value))?,
            OpKind::Null => frame.define(op, RtValue::Null)?,
            OpKind::Undef => frame.define(op, RtValue::Undef)?,
            OpKind::Variable { .. } => {
                let initial = match func.op(op).operands.first() {
                    Some(init) => frame.get(*init)?,
                    None => {
                        let ty = func.op(op).results.first().map(|r| func.value_ty(*r));
                        match ty.and_then(|ty| ty.pointee()) {
                            Some(pointee) => RtValue::default_for(pointee),
                            None => RtValue::Undef,
                        }
                    }
                };
                let ptr = self.allocate(initial);
                frame.define(op, RtValue::Ref(ptr))?;
            }
            OpKind::Load => {
                let ptr = self.pointer(frame.operand(op, 0)?, op)?;
                let value = self.read(&ptr)?;
                frame.define(op, value)?;
            }
            OpKind::Store => {
                let value = frame.operand(op, 0)?;
                let ptr = self.pointer(frame.operand(op, 1)?, op)?;
                self.write(&ptr, value)?;
            }
            OpKind::SaveCatchVar => {
                let payload = frame.operand(op, 0)?;
                let ptr = self.pointer(frame.operand(op, 1)?, op)?;
                self.write(&ptr, payload)?;
            }
            OpKind::PropertyRef { index } => {
                let base = self.pointer(frame.operand(op, 0)?, op)?;
                frame.define(op, RtValue::Ref(base.field(*index)))?;
            }
            OpKind::Cast => {
                let value = frame.operand(op, 0)?;
                let Some(result) = func.result(op) else {
                    interp_bail!("cast without a result", op);
                };
                frame.define(op, operators::cast(value, func.value_ty(result)))?;
            }
            OpKind::Binary(bin) => {
                let lhs = frame.operand(op, 0)?;
                let rhs = frame.operand(op, 1)?;
                let Some(value) = operators::binary(*bin, &lhs, &rhs) else {
                    interp_bail!(format!("cannot evaluate {} {} {}", lhs, bin, rhs), op);
                };
                frame.define(op, value)?;
            }
            OpKind::CallInternal { callee } => {
                let args = frame.operands(op, 0)?;
                match self.call(callee, args)? {
                    Ok(results) => frame.define_all(op, results),
                    Err(thrown) => return Ok(Flow::Done(Outcome::Threw(thrown))),
                }
            }
            OpKind::CallIndirectInternal => {
                let callee = self.callee_name(frame.operand(op, 0)?, op)?;
                let args = frame.operands(op, 1)?;
                match self.call(&callee, args)? {
                    Ok(results) => frame.define_all(op, results),
                    Err(thrown) => return Ok(Flow::Done(Outcome::Threw(thrown))),
                }
            }
            OpKind::LandingPad { .. } => {
                let Some(thrown) = frame.in_flight.clone() else {
                    interp_bail!("landing pad reached without an exception in flight", op);
                };
                frame.define(op, RtValue::Exception(Box::new(thrown)))?;
            }
            OpKind::CompareCatchType { token } => {
                let thrown = self.exception(frame, op, 0)?;
                let matched = self.module.rtti.type_token(&thrown.ty) == Some(*token);
                frame.define(op, RtValue::Bool(matched))?;
            }
            OpKind::BeginCatch => {
                let thrown = self.exception(frame, op, 0)?;
                frame.define(op, thrown.payload)?;
            }
            OpKind::EndCatch => frame.in_flight = None,
            OpKind::BeginCleanup => {}

            OpKind::Br { target } => {
                let args = frame.operands(op, 0)?;
                frame.enter(*target, args)?;
                return Ok(Flow::Jump(*target));
            }
            OpKind::CondBr {
                then_dest,
                else_dest,
                then_args,
            } => {
                let cond = frame.operand(op, 0)?;
                let rest = frame.operands(op, 1)?;
                let split = (*then_args as usize).min(rest.len());
                let (then_values, else_values) = rest.split_at(split);
                let (dest, args) = if cond.truthy() {
                    (*then_dest, then_values)
                } else {
                    (*else_dest, else_values)
                };
                frame.enter(dest, args.to_vec())?;
                return Ok(Flow::Jump(dest));
            }
            OpKind::SwitchInt { default, cases } => {
                let value = frame.operand(op, 0)?;
                let Some(value) = value.as_int() else {
                    interp_bail!(format!("switch on non-integer {}", value), op);
                };
                let dest = cases
                    .iter()
                    .find(|(case, _)| *case == value)
                    .map_or(*default, |(_, dest)| *dest);
                frame.enter(dest, Vec::new())?;
                return Ok(Flow::Jump(dest));
            }
            OpKind::Invoke {
                callee,
                normal,
                unwind,
            } => {
                let (name, from) = match callee {
                    Callee::Symbol(name) => (name.clone(), 0),
                    Callee::Indirect => (self.callee_name(frame.operand(op, 0)?, op)?, 1),
                };
                let args = frame.operands(op, from)?;
                return match self.call(&name, args)? {
                    Ok(results) => {
                        frame.define_all(op, results);
                        frame.enter(*normal, Vec::new())?;
                        Ok(Flow::Jump(*normal))
                    }
                    Err(thrown) => {
                        tracing::trace!(op = %op, callee = %name, unwind = %unwind, "invoke unwinds");
                        frame.in_flight = Some(thrown);
                        frame.enter(*unwind, Vec::new())?;
                        Ok(Flow::Jump(*unwind))
                    }
                };
            }
            OpKind::ThrowUnwind { unwind } => {
                frame.in_flight = Some(self.thrown_value(frame, op)?);
                frame.enter(*unwind, Vec::new())?;
                return Ok(Flow::Jump(*unwind));
            }
            OpKind::ThrowCall => {
                let thrown = self.thrown_value(frame, op)?;
                return Ok(Flow::Done(Outcome::Threw(thrown)));
            }
            OpKind::EndCleanup { unwind } => {
                let thrown = self.thrown_value(frame, op)?;
                return match unwind {
                    Some(unwind) => {
                        frame.in_flight = Some(thrown);
                        frame.enter(*unwind, Vec::new())?;
                        Ok(Flow::Jump(*unwind))
                    }
                    None => Ok(Flow::Done(Outcome::Threw(thrown))),
                };
            }
            OpKind::ReturnInternal => {
                let value = match func.op(op).operands.first() {
                    Some(value) => Some(frame.get(*value)?),
                    None => None,
                };
                return Ok(Flow::Done(Outcome::Returned(value)));
            }
            OpKind::Unreachable => interp_bail!("reached unreachable code", op),
            kind if kind.is_structured() => {
                interp_bail!(format!("structured op {} left in {}", kind, func.name), op)
            }
            kind => interp_bail!(format!("cannot execute {}", kind), op),
        }
        Ok(Flow::Next)
    }

    /// Call a module function or, failing that, the host.
    fn call(&mut self, callee: &str, args: Vec<RtValue>) -> Result<HostResult> {
        let module = self.module;
        match module.function(callee) {
            Some(func) => Ok(match self.execute(func, args)? {
                Outcome::Returned(value) => Ok(value.into_iter().collect()),
                Outcome::Threw(thrown) => Err(thrown),
            }),
            None => Ok(self.host.call(callee, &args)),
        }
    }

    fn pointer(&self, value: RtValue, op: OpId) -> Result<Pointer> {
        match value {
            RtValue::Ref(ptr) => Ok(ptr),
            other => interp_bail!(format!("expected a reference, found {}", other), op),
        }
    }

    fn callee_name(&self, value: RtValue, op: OpId) -> Result<String> {
        match value {
            RtValue::Fn(name) => Ok(name),
            other => interp_bail!(format!("expected a function, found {}", other), op),
        }
    }

    fn exception(&self, frame: &Frame<'m>, op: OpId, index: usize) -> Result<Thrown> {
        match frame.operand(op, index)? {
            RtValue::Exception(thrown) => Ok(*thrown),
            other => interp_bail!(format!("expected an exception, found {}", other), op),
        }
    }

    /// The exception raised by a throwing terminator: a pad exception is rethrown as is, any
    /// other value is thrown with its static type.
    fn thrown_value(&self, frame: &Frame<'m>, op: OpId) -> Result<Thrown> {
        let Some(&operand) = frame.func.op(op).operands.first() else {
            interp_bail!("throw without a value", op);
        };
        Ok(match frame.get(operand)? {
            RtValue::Exception(thrown) => *thrown,
            payload => Thrown {
                ty: frame.func.value_ty(operand).clone(),
                payload,
            },
        })
    }
}
