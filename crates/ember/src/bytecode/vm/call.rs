//! Calls, instantiation and the function/class definition instructions.

use smallvec::SmallVec;

use super::{Completion, Frame, Vm};
use crate::{
    bytecode::ParamSpec,
    exception_private::{ExcType, RunError, RunResult},
    function::{Function, FunctionKind},
    signature::{MatchedArgs, Param, Signature},
    types::{BuiltinType, Generator, GeneratorState, allocate_type},
    value::{ObjectData, Value},
};

/// A function call whose arguments have been matched against its signature.
pub(crate) struct PreparedCall {
    function: Function,
    args: MatchedArgs,
}

impl Vm<'_> {
    /// Calls any callable value.
    ///
    /// Functions are called directly; other values are called through the
    /// `op_call` member of their Type, which receives the callee first. The
    /// callee and arguments stay pinned for the duration of the call.
    pub fn call_value(&mut self, callee: Value, args: Vec<Value>) -> RunResult<Value> {
        let mark = self.pin(&[callee]);
        self.roots.extend_from_slice(&args);
        let result = self.call_pinned(callee, args);
        self.unpin(mark);
        result
    }

    fn call_pinned(&mut self, callee: Value, args: Vec<Value>) -> RunResult<Value> {
        if let Some(call) = self.prepare_call(callee, args.clone())? {
            return self.invoke(call);
        }
        let ty = self.heap.type_of(callee);
        let chain = self.heap.mro(ty).to_vec();
        match self.lookup_in_chain(&chain, "op_call") {
            Some(op_call) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(callee);
                full.extend(args);
                self.call_value(op_call, full)
            }
            None => Err(ExcType::TypeError.msg(format!(
                "'{}' object is not callable",
                self.heap.type_name(callee)
            ))),
        }
    }

    /// Matches arguments for a function callee.
    ///
    /// Returns `None` when `callee` is not a function.
    pub fn prepare_call(&mut self, callee: Value, args: Vec<Value>) -> RunResult<Option<PreparedCall>> {
        let ObjectData::Function(function) = self.heap.data(callee) else {
            return Ok(None);
        };
        let function = (**function).clone();
        let mut full: Vec<Value> = function.bound.to_vec();
        full.extend(args);
        let args = function
            .signature
            .match_args(self.heap, &function.name, full, function.bound.len())?;
        Ok(Some(PreparedCall { function, args }))
    }

    /// Runs a prepared call in a new frame.
    ///
    /// Errors leaving the call gain a trace layer naming the function and the
    /// arguments it received.
    pub fn invoke(&mut self, call: PreparedCall) -> RunResult<Value> {
        let PreparedCall { function, args } = call;
        let trace_args: Vec<Value> = args.fixed.iter().chain(args.rest.iter().flatten()).copied().collect();

        self.enter_frame()?;
        self.tracer.on_call(&function.name, self.depth);
        let result = match &function.kind {
            FunctionKind::Native(native) => (native.0)(self, args.into_flat()),
            FunctionKind::Bytecode { .. } => self.run_function(&function, args),
        };
        self.tracer.on_return(self.depth);
        self.leave_frame();
        result.map_err(|err| err.with_layer(&function.name, &trace_args))
    }

    fn run_function(&mut self, function: &Function, args: MatchedArgs) -> RunResult<Value> {
        let FunctionKind::Bytecode { code, scope, generator } = &function.kind else {
            return Err(RunError::internal("run_function called on a native function"));
        };
        let scope = self.heap.create_inner_scope(*scope)?;
        let params = function.signature.params();
        for (param, value) in params.iter().zip(args.fixed) {
            self.heap.scope_define(scope, &param.name, value);
        }
        if let Some(rest) = args.rest
            && let Some(param) = params.last()
        {
            let list = self.heap.list(rest)?;
            self.heap.scope_define(scope, &param.name, list);
        }

        let mut frame = Frame::new(code.clone(), scope);
        if *generator {
            let generator = Generator {
                frame: Some(Box::new(frame)),
                state: GeneratorState::New,
                name: function.name.clone(),
            };
            return self.heap.allocate(ObjectData::Generator(Box::new(generator)));
        }
        match self.run_frame(&mut frame)? {
            Completion::Done(value) => Ok(value.unwrap_or_else(|| self.heap.null())),
            Completion::Yield(_) => Err(ExcType::YieldSignal.msg(format!(
                "'{}' yielded but is not a generator function",
                function.name
            ))),
        }
    }

    /// Creates an instance of `cls`.
    ///
    /// `create` is resolved along the MRO and called with the Type and the
    /// arguments; without one a plain instance is allocated. `init` is then
    /// resolved and called bound to the new instance.
    pub fn instantiate(&mut self, cls: Value, args: Vec<Value>) -> RunResult<Value> {
        let chain = self.heap.mro(cls).to_vec();
        let create = self.lookup_in_chain(&chain, "create");
        let init = self.lookup_in_chain(&chain, "init");

        let instance = match create {
            Some(create) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(cls);
                full.extend(args.iter().copied());
                self.call_value(create, full)?
            }
            None => {
                if init.is_none() && !args.is_empty() {
                    return Err(ExcType::ArgumentCountError.msg(format!(
                        "{}() takes no arguments",
                        self.heap.type_name_of_type(cls)
                    )));
                }
                self.heap.allocate_typed(ObjectData::Plain, cls)?
            }
        };

        if let Some(init) = init {
            let bound = self.bind_value(init, instance)?;
            self.call_value(bound, args)?;
        }
        Ok(instance)
    }

    /// Executes `MakeFunction`: pops the default values and closes over the
    /// current scope.
    pub(super) fn make_function(
        &mut self,
        frame: &mut Frame,
        name: &str,
        body: &str,
        specs: &[ParamSpec],
        generator: bool,
    ) -> RunResult<Value> {
        let defaults_count = specs.iter().filter(|p| p.has_default).count();
        let mut defaults = frame.pop_n(defaults_count)?.into_iter();

        let mut params = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut param = Param::new(&spec.name);
            if let Some(type_name) = &spec.type_name {
                let ty = self.heap.scope_get(frame.scope, type_name)?;
                if self.heap.as_type(ty).is_none() {
                    return Err(ExcType::TypeError.msg(format!(
                        "annotation '{type_name}' of parameter '{}' is not a type",
                        spec.name
                    )));
                }
                param = param.with_type(ty);
            }
            if spec.has_default {
                let default = defaults
                    .next()
                    .ok_or_else(|| RunError::internal("missing default operand"))?;
                param = param.with_default(default);
            }
            if spec.rest {
                param = param.rest();
            }
            params.push(param);
        }
        let signature = Signature::new(params)?;

        let (_, _, code) = frame
            .code
            .body_from(0, body)
            .ok_or_else(|| RunError::internal(format!("function body '{body}' not found")))?;
        self.tracer.on_make_function(name, defaults_count);
        let function = Function::new(
            name,
            signature,
            FunctionKind::Bytecode {
                code,
                scope: frame.scope,
                generator,
            },
        );
        self.heap.allocate(ObjectData::Function(Box::new(function)))
    }

    /// Executes `MakeClass`: pops the parents, runs the body in a new scope and
    /// copies its bindings into the Type's member table.
    pub(super) fn make_class(&mut self, frame: &mut Frame, name: &str, body: &str, parents: usize) -> RunResult<Value> {
        let popped = frame.pop_n(parents)?;
        let mut parents: SmallVec<[Value; 2]> = SmallVec::with_capacity(popped.len());
        for parent in popped {
            if self.heap.as_type(parent).is_none() {
                return Err(ExcType::TypeError.msg(format!(
                    "parents of '{name}' must be types, not '{}'",
                    self.heap.type_name(parent)
                )));
            }
            if parents.contains(&parent) {
                return Err(ExcType::MroError.msg(format!(
                    "duplicate parent '{}' of '{name}'",
                    self.heap.type_name_of_type(parent)
                )));
            }
            parents.push(parent);
        }
        if parents.is_empty() {
            parents.push(self.heap.builtin(BuiltinType::Object));
        }
        let class = allocate_type(self.heap, name, parents, None)?;

        let (_, _, code) = frame
            .code
            .body_from(0, body)
            .ok_or_else(|| RunError::internal(format!("class body '{body}' not found")))?;
        let scope = self.heap.create_inner_scope(frame.scope)?;
        let mut body_frame = Frame::new(code, scope);
        self.enter_frame()?;
        let mark = self.pin(&[class]);
        let result = self.run_frame(&mut body_frame);
        self.unpin(mark);
        self.leave_frame();
        if let Completion::Yield(_) = result? {
            return Err(ExcType::YieldSignal.msg(format!("class body of '{name}' cannot yield")));
        }

        let members: Vec<(String, Value)> = self
            .heap
            .scope(scope)
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (member, value) in members {
            if let ObjectData::Function(function) = self.heap.data(value)
                && function.bound.is_empty()
            {
                self.specials
                    .validate(&member, &function.signature)
                    .map_err(|msg| ExcType::ArgumentError.msg(format!("in class '{name}': {msg}")))?;
            }
            self.heap.get_mut(class).members.insert(member, value);
        }

        self.tracer.on_make_class(name, self.heap.mro(class).len());
        Ok(class)
    }
}
