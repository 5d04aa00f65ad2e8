//! Structured exception handling and error objects.
//!
//! A `Try` instruction runs its try, catch and finally bodies as sub-frames.
//! The try and finally bodies share the enclosing scope; the catch body gets
//! a new inner scope holding the error binding. Finally bodies run exactly
//! once whichever way the protected region exits, and a return or error from
//! the finally body replaces the pending outcome.
//!
//! Errors raised by resource limits and internal errors are not catchable and
//! leave the block without running its finally body.

use strum::IntoEnumIterator;

use super::{Completion, Frame, Step, Vm};
use crate::{
    bytecode::Code,
    exception_private::{ErrorKind, ExcType, RunError, RunResult, RuntimeError},
    heap::ScopeId,
    types::{ErrorData, collect_error_refs},
    value::{ObjectData, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Try,
    Catch,
    Finally,
}

/// What the block does once its finally body completes normally.
#[derive(Debug)]
enum Pending {
    /// Continue after the block.
    Normal,
    Return(Value),
    Throw(RunError),
}

/// A try block in progress, parked on its frame while a generator is suspended.
#[derive(Debug)]
pub(crate) struct SuspendedTry {
    phase: Phase,
    pending: Pending,
    frame: Frame,
}

impl Pending {
    fn collect_refs(&self, objects: &mut Vec<Value>) {
        match self {
            Self::Normal => {}
            Self::Return(value) => objects.push(*value),
            Self::Throw(RunError::Exc(err) | RunError::Uncatchable(err)) => collect_error_refs(err, objects),
            Self::Throw(RunError::Internal(_)) => {}
        }
    }
}

impl SuspendedTry {
    pub fn collect_refs(&self, objects: &mut Vec<Value>, scopes: &mut Vec<ScopeId>) {
        self.frame.collect_refs(objects, scopes);
        self.pending.collect_refs(objects);
    }
}

/// The bodies of one try block.
struct Sections {
    try_body: Code,
    catch: Option<Code>,
    finally: Option<Code>,
    /// Index of the first instruction after the block.
    next_ip: usize,
}

fn find_sections(frame: &Frame, block: &str) -> RunResult<Sections> {
    let from = frame.ip + 1;
    let (_, mut last_end, try_body) = frame
        .code
        .body_from(from, &format!("{block}.try"))
        .ok_or_else(|| RunError::internal(format!("try block '{block}' has no try body")))?;
    let mut section = |name: &str| {
        frame.code.body_from(from, &format!("{block}.{name}")).map(|(_, end, code)| {
            last_end = last_end.max(end);
            code
        })
    };
    let catch = section("catch");
    let finally = section("finally");
    Ok(Sections {
        try_body,
        catch,
        finally,
        next_ip: last_end + 1,
    })
}

impl Vm<'_> {
    /// Executes a `Try` instruction, or resumes the one parked on `frame`.
    pub(super) fn exec_try(&mut self, frame: &mut Frame, block: &str, binding: Option<&str>) -> RunResult<Step> {
        let sections = find_sections(frame, block)?;
        let mut state = match frame.suspended.take() {
            Some(suspended) => *suspended,
            None => {
                self.tracer.on_try_enter(self.depth);
                SuspendedTry {
                    phase: Phase::Try,
                    pending: Pending::Normal,
                    frame: Frame::new(sections.try_body.clone(), frame.scope),
                }
            }
        };

        loop {
            self.enter_frame()?;
            let mark = self.roots.len();
            state.pending.collect_refs(&mut self.roots);
            let outcome = self.run_frame(&mut state.frame);
            self.unpin(mark);
            self.leave_frame();
            let outcome = match outcome {
                Ok(Completion::Yield(value)) => {
                    frame.suspended = Some(Box::new(state));
                    return Ok(Step::Suspend(value));
                }
                Ok(Completion::Done(value)) => Ok(value),
                Err(err) => Err(err),
            };

            if state.phase == Phase::Finally {
                let pending = match outcome {
                    Ok(Some(value)) => Pending::Return(value),
                    Ok(None) => state.pending,
                    Err(err) => Pending::Throw(err),
                };
                return self.finish_try(frame, pending, sections.next_ip);
            }

            let catch = match state.phase {
                Phase::Try => sections.catch.clone(),
                _ => None,
            };
            let pending = match (outcome, catch) {
                (Ok(Some(value)), _) => Pending::Return(value),
                (Ok(None), _) => Pending::Normal,
                (Err(RunError::Exc(mut err)), Some(catch)) => {
                    let scope = self.heap.create_inner_scope(frame.scope)?;
                    if let Some(name) = binding {
                        let error = self.error_object(&mut err)?;
                        self.heap.scope_define(scope, name, error);
                    }
                    state = SuspendedTry {
                        phase: Phase::Catch,
                        pending: Pending::Normal,
                        frame: Frame::new(catch, scope),
                    };
                    continue;
                }
                (Err(err @ RunError::Exc(_)), None) => Pending::Throw(err),
                (Err(err), _) => {
                    self.tracer.on_try_exit(self.depth);
                    return Err(err);
                }
            };
            match &sections.finally {
                Some(finally) => {
                    state = SuspendedTry {
                        phase: Phase::Finally,
                        pending,
                        frame: Frame::new(finally.clone(), frame.scope),
                    };
                }
                None => return self.finish_try(frame, pending, sections.next_ip),
            }
        }
    }

    fn finish_try(&mut self, frame: &mut Frame, pending: Pending, next_ip: usize) -> RunResult<Step> {
        self.tracer.on_try_exit(self.depth);
        match pending {
            Pending::Normal => Ok(Step::Jump(next_ip)),
            Pending::Return(value) => {
                frame.return_value = Some(value);
                Ok(Step::Jump(next_ip))
            }
            Pending::Throw(err) => Err(err),
        }
    }

    /// The Type of an in-flight error.
    pub fn error_type(&self, err: &RuntimeError) -> Value {
        match err.kind {
            ErrorKind::Builtin(kind) => self.heap.exc_type(kind),
            ErrorKind::Type(ty) => ty,
        }
    }

    /// Whether an error's Type is `kind` or inherits from it.
    pub fn error_is(&self, err: &RuntimeError, kind: ExcType) -> bool {
        match err.kind {
            ErrorKind::Builtin(own) => own.is_subclass_of(kind),
            ErrorKind::Type(ty) => self.heap.is_subtype(ty, self.heap.exc_type(kind)),
        }
    }

    /// Returns the error object for an in-flight error, creating it on first use.
    ///
    /// The object carries `message`, the error's payload values and, when
    /// present, a `causes` list of error objects. An existing object has its
    /// trace and causes brought up to date, so rethrowing it keeps the layers
    /// gathered since it was created.
    pub fn error_object(&mut self, err: &mut RuntimeError) -> RunResult<Value> {
        if let Some(value) = err.value {
            if let ObjectData::Error(data) = &mut self.heap.get_mut(value).data {
                data.trace.clone_from(&err.trace);
                data.causes.clone_from(&err.causes);
            }
            return Ok(value);
        }
        let ty = self.error_type(err);
        let data = ErrorData {
            trace: err.trace.clone(),
            causes: err.causes.clone(),
        };
        let object = self.heap.allocate_typed(ObjectData::Error(Box::new(data)), ty)?;
        let message = self.heap.string(err.message.as_str())?;
        let mut members = vec![("message", message)];
        members.extend(err.payload.iter().copied());
        if !err.causes.is_empty() {
            let mut causes = Vec::with_capacity(err.causes.len());
            for cause in &mut err.causes {
                causes.push(self.error_object(cause)?);
            }
            members.push(("causes", self.heap.list(causes)?));
        }
        let table = &mut self.heap.get_mut(object).members;
        for (name, value) in members {
            table.insert(name.to_owned(), value);
        }
        err.value = Some(object);
        Ok(object)
    }

    /// Turns a thrown value into an error.
    ///
    /// Strings become root `Error`s. Anything else must be an instance of
    /// `Error`; error objects keep the trace and causes they were caught with.
    pub fn throw_value(&mut self, value: Value) -> RunResult<RunError> {
        let value = match self.heap.as_str(value) {
            Some(message) => {
                let mut err = RuntimeError::new(ErrorKind::Builtin(ExcType::Error), message);
                self.error_object(&mut err)?
            }
            None => value,
        };
        let ty = self.heap.type_of(value);
        if !self.heap.is_subtype(ty, self.heap.exc_type(ExcType::Error)) {
            return Err(ExcType::TypeError.msg(format!(
                "can only throw Error instances, not '{}'",
                self.heap.type_name(value)
            )));
        }

        let object = self.heap.get(value);
        let message = object
            .members
            .get("message")
            .and_then(|&m| self.heap.as_str(m))
            .unwrap_or_default()
            .to_owned();
        let (trace, causes) = match &object.data {
            ObjectData::Error(data) => (data.trace.clone(), data.causes.clone()),
            _ => (Vec::new(), Vec::new()),
        };
        let kind = self.builtin_exc_of(ty).map_or(ErrorKind::Type(ty), ErrorKind::Builtin);
        let mut err = RuntimeError::new(kind, message).with_causes(causes);
        err.trace = trace;
        err.value = Some(value);
        Ok(err.into())
    }

    /// The builtin error kind materialized as exactly `ty`, if any.
    pub fn builtin_exc_of(&self, ty: Value) -> Option<ExcType> {
        ExcType::iter().find(|&kind| self.heap.exc_type(kind) == ty)
    }
}
