//! Public interface for running bytecode.

use std::any::Any;

use crate::{
    Exception,
    builtins,
    bytecode::{
        Code,
        vm::{Completion, Frame, Vm},
    },
    exception_private::{ExcType, RunResult},
    exception_public::RegistrationError,
    heap::{Heap, HeapStats, ScopeId},
    io::{PrintWriter, StdPrint},
    object::{InvalidInputError, Object},
    resource::{LimitedTracker, NoLimitTracker, ResourceLimits, ResourceTracker},
    special::SpecialMethods,
    tracer::{NoopTracer, VmTracer},
    value::Value,
};

/// An embedded runtime: a heap, the builtin Types and a global scope.
///
/// Globals persist across [`Runtime::execute`] calls, so a host can run
/// several code blocks against the same state.
///
/// Garbage is collected automatically between instructions. The roots are the
/// builtins, the globals and whatever the running code and its callers still
/// hold, so a [`Value`] kept by the host across requests must be bound to a
/// global (or passed as an argument of the request) to stay alive.
///
/// # Example
/// ```
/// use ember::{CodeBuilder, CollectStringPrint, Object, Opcode, Runtime};
///
/// let mut runtime = Runtime::new().unwrap();
/// let mut b = CodeBuilder::new();
/// b.push_int(3).push_int(4).push_int(2);
/// b.operator("op_mul", 2).operator("op_add", 2);
/// b.emit(Opcode::Return);
///
/// let mut print = CollectStringPrint::new();
/// let result = runtime.execute(&b.build(), &mut print).unwrap();
/// assert_eq!(result, Object::Int(11));
/// ```
#[derive(Debug)]
pub struct Runtime {
    heap: Heap,
    specials: SpecialMethods,
    /// Outermost scope holding the builtin Types and functions.
    builtins: ScopeId,
    /// Scope top-level code runs in, nested in `builtins`.
    globals: ScopeId,
    tracer: Box<dyn VmTracer>,
}

impl Runtime {
    /// Creates a runtime that only enforces the default recursion limit.
    ///
    /// # Errors
    /// Returns [`RegistrationError`] if a native binding does not fit the
    /// special-method table.
    pub fn new() -> Result<Self, RegistrationError> {
        Self::with_tracker(Box::new(NoLimitTracker))
    }

    /// Creates a runtime enforcing `limits`.
    pub fn with_limits(limits: ResourceLimits) -> Result<Self, RegistrationError> {
        Self::with_tracker(Box::new(LimitedTracker::new(limits)))
    }

    /// Creates a runtime with a custom resource tracker.
    ///
    /// Builtins are installed before the tracker is attached, so bootstrap
    /// allocations do not count against its limits.
    pub fn with_tracker(tracker: Box<dyn ResourceTracker>) -> Result<Self, RegistrationError> {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let specials = SpecialMethods::new();
        let builtins = builtins::install(&mut heap, &specials)?;
        let globals = heap
            .allocate_scope(Some(builtins))
            .map_err(|err| RegistrationError::new("runtime", "globals", format!("{err:?}")))?;
        heap.replace_tracker(tracker);
        tracing::debug!(live_objects = heap.stats().live_objects, "runtime bootstrapped");
        Ok(Self {
            heap,
            specials,
            builtins,
            globals,
            tracer: Box::new(NoopTracer),
        })
    }

    /// Replaces the execution tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Box<dyn VmTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Returns the tracer if it is a `T`.
    #[must_use]
    pub fn tracer<T: VmTracer>(&self) -> Option<&T> {
        (&*self.tracer as &dyn Any).downcast_ref::<T>()
    }

    /// Runs `code` in the global scope and converts its result for the host.
    ///
    /// A top-level `Return` supplies the result; running off the end gives
    /// [`Object::Null`].
    pub fn execute(&mut self, code: &Code, print: &mut dyn PrintWriter) -> Result<Object, Exception> {
        let value = self.run(code, print)?;
        Ok(self.to_object(value))
    }

    /// Like [`Runtime::execute`] but returns the runtime value itself.
    pub fn run(&mut self, code: &Code, print: &mut dyn PrintWriter) -> Result<Value, Exception> {
        self.heap.tracker_mut().begin_execution();
        tracing::debug!(instructions = code.len(), "executing code block");
        let mut frame = Frame::new(code.clone(), self.globals);
        self.with_vm(print, |vm| {
            vm.enter_frame()?;
            let completion = vm.run_frame(&mut frame);
            vm.leave_frame();
            match completion? {
                Completion::Done(value) => Ok(value.unwrap_or_else(|| vm.heap.null())),
                Completion::Yield(_) => Err(ExcType::YieldSignal.msg("yield outside a generator function")),
            }
        })
    }

    /// Calls any callable value.
    pub fn call(&mut self, callee: Value, args: Vec<Value>, print: &mut dyn PrintWriter) -> Result<Value, Exception> {
        self.with_vm(print, |vm| vm.call_value(callee, args))
    }

    /// Invokes an operator or hook by name, e.g. `op_add`, with the table
    /// default as a fallback. Output from user code goes to stdout.
    pub fn call_operator(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Exception> {
        self.with_vm(&mut StdPrint, |vm| vm.call_operator(name, args, true))
    }

    /// Reads a member through the full lookup protocol, hooks included.
    pub fn get_member(&mut self, obj: Value, name: &str) -> Result<Value, Exception> {
        self.with_vm(&mut StdPrint, |vm| vm.get_member(obj, name))
    }

    /// Writes a member through the setter hooks.
    pub fn set_member(&mut self, obj: Value, name: &str, value: Value) -> Result<(), Exception> {
        self.with_vm(&mut StdPrint, |vm| vm.set_member(obj, name, value))
    }

    fn with_vm<R>(
        &mut self,
        print: &mut dyn PrintWriter,
        f: impl FnOnce(&mut Vm<'_>) -> RunResult<R>,
    ) -> Result<R, Exception> {
        let result = {
            let mut vm = Vm::new(&mut self.heap, &self.specials, print, &mut *self.tracer);
            vm.scope_roots.extend([self.builtins, self.globals]);
            f(&mut vm)
        };
        result.map_err(|err| {
            let exc = Exception::from_run_error(err, &self.heap);
            tracing::debug!(error = %exc.type_name(), message = exc.message(), "execution failed");
            exc
        })
    }

    /// Snapshots a runtime value for the host.
    #[must_use]
    pub fn to_object(&self, value: Value) -> Object {
        Object::from_value(value, &self.heap)
    }

    /// Moves a host object into the runtime.
    pub fn alloc(&mut self, object: Object) -> Result<Value, InvalidInputError> {
        object.to_value(&mut self.heap)
    }

    /// Binds `name` in the global scope, shadowing any builtin.
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.heap.scope_define(self.globals, name, value);
    }

    /// Resolves `name` from the global scope outwards.
    #[must_use]
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.heap.scope_get(self.globals, name).ok()
    }

    /// Rebinds an existing variable; `NameError` if it is not defined.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<(), Exception> {
        self.heap
            .scope_set(self.globals, name, value)
            .map_err(|err| Exception::from_run_error(err, &self.heap))
    }

    /// Removes a global binding.
    pub fn delete_global(&mut self, name: &str) -> Result<(), Exception> {
        self.heap
            .scope_delete(self.globals, name)
            .map_err(|err| Exception::from_run_error(err, &self.heap))
    }

    /// Type names of a Type's linearization, or an empty list for non-types.
    #[must_use]
    pub fn mro_names(&self, ty: Value) -> Vec<String> {
        self.heap
            .mro(ty)
            .iter()
            .map(|&t| self.heap.type_name_of_type(t).to_owned())
            .collect()
    }

    /// Name of the Type of any value.
    #[must_use]
    pub fn type_name(&self, value: Value) -> &str {
        self.heap.type_name(value)
    }

    /// Frees everything unreachable from the builtins, the globals and
    /// `extra_roots`. Returns the number of objects freed.
    ///
    /// Values the host still holds must be passed as roots or they become
    /// dangling.
    pub fn collect_garbage(&mut self, extra_roots: &[Value]) -> usize {
        let freed = self
            .heap
            .collect_garbage(extra_roots.to_vec(), vec![self.builtins, self.globals]);
        tracing::debug!(freed, "garbage collected");
        freed
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }
}
