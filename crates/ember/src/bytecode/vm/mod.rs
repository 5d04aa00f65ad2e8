//! The frame engine.
//!
//! A [`Frame`] executes one instruction sequence against a scope chain. Calls,
//! class bodies and try/catch/finally sections run as nested frames driven
//! recursively by the same [`Vm`]; the recursion depth is bounded by the
//! resource tracker.
//!
//! Yields do not unwind: a frame that reaches `Yield` returns
//! [`Completion::Yield`] with its state intact, and a try section that yields
//! parks its sub-frame on the owning frame so the generator can resume it.
//!
//! Garbage collection runs between instructions once the resource tracker asks
//! for it. Values held only by Rust code while nested frames run are pinned on
//! the [`Vm`] root stack so the collector can see them.

mod attr;
mod call;
mod dispatch;
mod exceptions;
mod iteration;

use std::borrow::Cow;

pub(crate) use attr::LookupMode;
pub(crate) use exceptions::SuspendedTry;

use crate::{
    bytecode::{Code, Instruction, Opcode},
    exception_private::{ExcType, RunError, RunResult},
    heap::{Heap, ScopeId},
    io::PrintWriter,
    special::SpecialMethods,
    tracer::VmTracer,
    types::Map,
    value::{ObjectData, Value},
};

/// One execution of an instruction sequence.
#[derive(Debug)]
pub(crate) struct Frame {
    pub code: Code,
    pub ip: usize,
    pub stack: Vec<Value>,
    pub scope: ScopeId,
    /// Scope the frame started in; `ExitScope` never leaves it.
    pub base_scope: ScopeId,
    /// Set by `Return`; halts the frame once set.
    pub return_value: Option<Value>,
    /// A try section parked at the current `Try` instruction by a yield.
    pub suspended: Option<Box<SuspendedTry>>,
}

impl Frame {
    pub fn new(code: Code, scope: ScopeId) -> Self {
        Self {
            code,
            ip: 0,
            stack: Vec::new(),
            scope,
            base_scope: scope,
            return_value: None,
            suspended: None,
        }
    }

    pub fn pop(&mut self) -> RunResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RunError::internal("operand stack underflow"))
    }

    /// Pops `n` values, returned in push order.
    pub fn pop_n(&mut self, n: usize) -> RunResult<Vec<Value>> {
        if n > self.stack.len() {
            return Err(RunError::internal("operand stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    pub fn peek(&self) -> RunResult<Value> {
        self.stack
            .last()
            .copied()
            .ok_or_else(|| RunError::internal("operand stack underflow"))
    }

    /// Collects the heap references held by this frame for garbage collection.
    pub fn collect_refs(&self, objects: &mut Vec<Value>, scopes: &mut Vec<ScopeId>) {
        objects.extend(self.stack.iter().copied());
        objects.extend(self.return_value);
        scopes.push(self.scope);
        scopes.push(self.base_scope);
        if let Some(suspended) = &self.suspended {
            suspended.collect_refs(objects, scopes);
        }
    }
}

/// How a frame stopped.
#[derive(Debug)]
pub(crate) enum Completion {
    /// Ran off the end (`None`) or returned a value.
    Done(Option<Value>),
    /// Suspended on a yield; the frame can be run again to resume.
    Yield(Value),
}

/// Effect of one instruction on the instruction pointer.
enum Step {
    Next,
    Jump(usize),
    /// Yield and continue after this instruction on resume.
    Yield(Value),
    /// Yield from a nested section and re-execute this instruction on resume.
    Suspend(Value),
}

/// The execution engine.
///
/// Borrows the runtime state for the duration of one host request.
pub(crate) struct Vm<'a> {
    pub heap: &'a mut Heap,
    pub specials: &'a SpecialMethods,
    pub print: &'a mut dyn PrintWriter,
    pub tracer: &'a mut dyn VmTracer,
    /// Number of frames currently executing.
    pub depth: usize,
    /// Values pinned for garbage collection, in push order.
    pub roots: Vec<Value>,
    /// Scopes pinned for garbage collection: the host's root scopes and the
    /// scopes of suspended callers.
    pub scope_roots: Vec<ScopeId>,
}

impl<'a> Vm<'a> {
    pub fn new(
        heap: &'a mut Heap,
        specials: &'a SpecialMethods,
        print: &'a mut dyn PrintWriter,
        tracer: &'a mut dyn VmTracer,
    ) -> Self {
        Self {
            heap,
            specials,
            print,
            tracer,
            depth: 0,
            roots: Vec::new(),
            scope_roots: Vec::new(),
        }
    }

    /// Pins values as garbage-collection roots until [`Vm::unpin`] is called
    /// with the returned mark.
    pub fn pin(&mut self, values: &[Value]) -> usize {
        let mark = self.roots.len();
        self.roots.extend_from_slice(values);
        mark
    }

    pub fn unpin(&mut self, mark: usize) {
        self.roots.truncate(mark);
    }

    /// Runs `f` with `values` pinned.
    pub fn with_pinned<R>(&mut self, values: &[Value], f: impl FnOnce(&mut Self) -> R) -> R {
        let mark = self.pin(values);
        let result = f(self);
        self.unpin(mark);
        result
    }

    /// Collects garbage with every pinned value and the running frame as roots.
    fn collect_garbage(&mut self, frame: &Frame) {
        let mut objects = self.roots.clone();
        let mut scopes = self.scope_roots.clone();
        frame.collect_refs(&mut objects, &mut scopes);
        let freed = self.heap.collect_garbage(objects, scopes);
        tracing::debug!(freed, depth = self.depth, "collected garbage");
    }

    /// Counts a new frame against the recursion limit.
    pub fn enter_frame(&mut self) -> RunResult<()> {
        self.heap.tracker().check_recursion_depth(self.depth)?;
        self.depth += 1;
        Ok(())
    }

    pub fn leave_frame(&mut self) {
        self.depth -= 1;
    }

    /// Runs a frame until it completes, returns, yields or raises.
    ///
    /// Internal errors are annotated with the failing instruction and its
    /// index; runtime errors propagate unchanged.
    pub fn run_frame(&mut self, frame: &mut Frame) -> RunResult<Completion> {
        let code = frame.code.clone();
        let instructions = code.instructions();
        while let Some(instr) = instructions.get(frame.ip) {
            self.heap.tracker_mut().check_time()?;
            if self.heap.should_gc() {
                self.collect_garbage(frame);
            }
            self.tracer
                .on_instruction(frame.ip, instr.op.name(), frame.stack.len(), self.depth);

            // Nested frames may collect while this frame's operands are popped.
            let marks = (self.roots.len(), self.scope_roots.len());
            if instr.op.runs_code() {
                frame.collect_refs(&mut self.roots, &mut self.scope_roots);
            }
            let step = self.step(frame, instr);
            self.roots.truncate(marks.0);
            self.scope_roots.truncate(marks.1);

            match step {
                Ok(Step::Next) => frame.ip += 1,
                Ok(Step::Jump(target)) => frame.ip = target,
                Ok(Step::Yield(value)) => {
                    frame.ip += 1;
                    return Ok(Completion::Yield(value));
                }
                Ok(Step::Suspend(value)) => return Ok(Completion::Yield(value)),
                Err(RunError::Internal(msg)) => {
                    return Err(RunError::Internal(Cow::Owned(format!(
                        "{msg} (while executing {:?} at index {})",
                        instr.op, frame.ip
                    ))));
                }
                Err(err) => return Err(err),
            }

            if let Some(value) = frame.return_value {
                return Ok(Completion::Done(Some(value)));
            }
        }
        Ok(Completion::Done(None))
    }

    fn jump_target(frame: &Frame, tag: &str) -> RunResult<usize> {
        frame
            .code
            .find_tag(tag)
            .ok_or_else(|| RunError::internal(format!("jump to unknown tag '{tag}'")))
    }

    fn step(&mut self, frame: &mut Frame, instr: &Instruction) -> RunResult<Step> {
        match &instr.op {
            Opcode::PushInt(i) => {
                let value = self.heap.int(*i)?;
                frame.stack.push(value);
            }
            Opcode::PushNum(n) => {
                let value = self.heap.num(*n)?;
                frame.stack.push(value);
            }
            Opcode::PushStr(s) => {
                let value = self.heap.string(s.as_str())?;
                frame.stack.push(value);
            }
            Opcode::PushBool(b) => frame.stack.push(self.heap.bool_value(*b)),
            Opcode::PushNull => frame.stack.push(self.heap.null()),
            Opcode::Pop(n) => {
                frame.pop_n(*n)?;
            }
            Opcode::Dup => {
                let top = frame.peek()?;
                frame.stack.push(top);
            }
            Opcode::Swap => {
                let len = frame.stack.len();
                if len < 2 {
                    return Err(RunError::internal("operand stack underflow"));
                }
                frame.stack.swap(len - 1, len - 2);
            }
            Opcode::BuildList(n) => {
                let items = frame.pop_n(*n)?;
                let list = self.heap.list(items)?;
                frame.stack.push(list);
            }
            Opcode::BuildMap(n) => {
                let count = n
                    .checked_mul(2)
                    .ok_or_else(|| RunError::internal("map operand count overflows"))?;
                let items = frame.pop_n(count)?;
                let map = self.build_map(&items)?;
                frame.stack.push(map);
            }

            Opcode::GetVar(name) => {
                let value = self.heap.scope_get(frame.scope, name)?;
                frame.stack.push(value);
            }
            Opcode::DefineVar(name) => {
                let value = frame.pop()?;
                self.heap.scope_define(frame.scope, name, value);
            }
            Opcode::SetVar(name) => {
                let value = frame.pop()?;
                self.heap.scope_set(frame.scope, name, value)?;
            }
            Opcode::DeleteVar(name) => self.heap.scope_delete(frame.scope, name)?,

            Opcode::GetMember(name) => {
                let obj = frame.pop()?;
                let value = self.get_member(obj, name)?;
                frame.stack.push(value);
            }
            Opcode::SetMember(name) => {
                let value = frame.pop()?;
                let obj = frame.pop()?;
                self.set_member(obj, name, value)?;
            }
            Opcode::DeleteMember(name) => {
                let obj = frame.pop()?;
                self.delete_member(obj, name)?;
            }

            Opcode::Call(argc) => {
                let args = frame.pop_n(*argc)?;
                let callee = frame.pop()?;
                let result = self.call_value(callee, args)?;
                frame.stack.push(result);
            }
            Opcode::CallSpread => {
                let list = frame.pop()?;
                let callee = frame.pop()?;
                let ObjectData::List(items) = self.heap.data(list) else {
                    return Err(ExcType::TypeError.msg(format!(
                        "spread arguments must be a list, not '{}'",
                        self.heap.type_name(list)
                    )));
                };
                let args = items.clone();
                let result = self.call_value(callee, args)?;
                frame.stack.push(result);
            }
            Opcode::Operator { name, argc } => {
                let args = frame.pop_n(*argc)?;
                let result = self.call_operator(name, args, true)?;
                frame.stack.push(result);
            }

            Opcode::EnterScope => frame.scope = self.heap.create_inner_scope(frame.scope)?,
            Opcode::ExitScope => {
                if frame.scope == frame.base_scope {
                    return Err(RunError::internal("cannot exit the frame's base scope"));
                }
                frame.scope = self
                    .heap
                    .scope(frame.scope)
                    .outer
                    .ok_or_else(|| RunError::internal("scope has no outer scope"))?;
            }

            Opcode::Jump(tag) => return Ok(Step::Jump(Self::jump_target(frame, tag)?)),
            Opcode::JumpIfTrue(tag) | Opcode::JumpIfFalse(tag) => {
                let cond = frame.pop()?;
                let truthy = self.truthy(cond)?;
                if truthy == matches!(instr.op, Opcode::JumpIfTrue(_)) {
                    return Ok(Step::Jump(Self::jump_target(frame, tag)?));
                }
            }
            Opcode::TypeTest(tag) => {
                let ty = frame.pop()?;
                let value = frame.peek()?;
                if self.heap.as_type(ty).is_none() {
                    return Err(ExcType::TypeError.msg(format!(
                        "type test requires a type, not '{}'",
                        self.heap.type_name(ty)
                    )));
                }
                if !self.heap.is_instance(value, ty) {
                    return Ok(Step::Jump(Self::jump_target(frame, tag)?));
                }
            }
            Opcode::Not => {
                let value = frame.pop()?;
                let truthy = self.truthy(value)?;
                frame.stack.push(self.heap.bool_value(!truthy));
            }
            Opcode::Is => {
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.stack.push(self.heap.bool_value(a == b));
            }
            Opcode::IterNext(tag) => {
                let iterator = frame.peek()?;
                match self.iterate_next(iterator) {
                    Ok(item) => frame.stack.push(item),
                    Err(RunError::Exc(err)) if self.error_is(&err, ExcType::IteratorStopped) => {
                        frame.pop()?;
                        return Ok(Step::Jump(Self::jump_target(frame, tag)?));
                    }
                    Err(err) => return Err(err),
                }
            }

            Opcode::BodyStart { end } => {
                let end = frame
                    .code
                    .find_tag_from(frame.ip + 1, end)
                    .ok_or_else(|| RunError::internal(format!("body end tag '{end}' not found")))?;
                return Ok(Step::Jump(end + 1));
            }
            Opcode::BodyEnd | Opcode::Nop => {}
            Opcode::MakeFunction {
                name,
                body,
                params,
                generator,
            } => {
                let function = self.make_function(frame, name, body, params, *generator)?;
                frame.stack.push(function);
            }
            Opcode::MakeClass { name, body, parents } => {
                let class = self.make_class(frame, name, body, *parents)?;
                frame.stack.push(class);
            }

            Opcode::Throw => {
                let value = frame.pop()?;
                return Err(self.throw_value(value)?);
            }
            Opcode::Try { block, binding } => return self.exec_try(frame, block, binding.as_deref()),
            Opcode::Return => frame.return_value = Some(frame.pop()?),
            Opcode::Yield => return Ok(Step::Yield(frame.pop()?)),
        }
        Ok(Step::Next)
    }

    /// Builds a map from alternating key/value operands.
    pub fn build_map(&mut self, items: &[Value]) -> RunResult<Value> {
        let mut map = Map::default();
        for pair in items.chunks(2) {
            let key = crate::types::map_key(self.heap, pair[0]);
            map.insert(key, pair[0], pair[1]);
        }
        self.heap.allocate(ObjectData::Map(map))
    }
}
