//! Function objects: bytecode closures, native builtins and bound methods.

use std::{fmt, rc::Rc};

use smallvec::SmallVec;

use crate::{
    builtins::{NativeMethod, NativeParam, native},
    bytecode::{Code, vm::Vm},
    exception_private::{ExcType, RunResult},
    heap::ScopeId,
    signature::{Param, Signature},
    types::BuiltinType,
    value::{ObjectData, Value},
};

/// Signature of every native function: the engine plus the already matched,
/// flattened argument list (bound values first).
pub(crate) type NativeFn = fn(&mut Vm<'_>, Vec<Value>) -> RunResult<Value>;

/// Native function pointer with an opaque `Debug`.
#[derive(Clone, Copy)]
pub(crate) struct NativeFunction(pub NativeFn);

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<native>")
    }
}

#[derive(Debug, Clone)]
pub(crate) enum FunctionKind {
    /// Compiled body executed in a fresh scope nested in the captured `scope`.
    Bytecode {
        code: Code,
        scope: ScopeId,
        /// Calling returns a generator instead of running the body.
        generator: bool,
    },
    Native(NativeFunction),
}

/// A callable function value.
#[derive(Debug, Clone)]
pub(crate) struct Function {
    pub name: String,
    pub signature: Rc<Signature>,
    pub kind: FunctionKind,
    /// Leading arguments pre-filled by [`Function::bind`].
    pub bound: SmallVec<[Value; 1]>,
}

impl Function {
    pub fn new(name: impl Into<String>, signature: Signature, kind: FunctionKind) -> Self {
        Self {
            name: name.into(),
            signature: Rc::new(signature),
            kind,
            bound: SmallVec::new(),
        }
    }

    /// Parameters still visible to callers after binding.
    ///
    /// A rest parameter stays visible because it keeps absorbing arguments.
    pub fn visible_params(&self) -> &[Param] {
        let skip = self.bound.len().min(self.signature.positional_count());
        &self.signature.params()[skip..]
    }

    /// Returns a copy with `this` pre-filled as the next parameter.
    ///
    /// # Errors
    /// `ArgumentError` if no parameter is left to receive `this`.
    pub fn bind(&self, this: Value) -> RunResult<Self> {
        if self.visible_params().is_empty() {
            return Err(ExcType::ArgumentError.msg(format!(
                "cannot bind '{}': it takes no parameters",
                self.name
            )));
        }
        let mut bound = self.bound.clone();
        bound.push(this);
        Ok(Self {
            name: self.name.clone(),
            signature: Rc::clone(&self.signature),
            kind: self.kind.clone(),
            bound,
        })
    }

    pub fn is_generator(&self) -> bool {
        matches!(self.kind, FunctionKind::Bytecode { generator: true, .. })
    }

    pub fn collect_refs(&self, objects: &mut Vec<Value>, scopes: &mut Vec<ScopeId>) {
        objects.extend(self.bound.iter().copied());
        for param in self.signature.params() {
            objects.extend(param.ty);
            objects.extend(param.default);
        }
        if let FunctionKind::Bytecode { scope, .. } = &self.kind {
            scopes.push(*scope);
        }
    }
}

const SELF: NativeParam = NativeParam::typed("self", BuiltinType::Function);

pub(crate) const FUNCTION_METHODS: &[NativeMethod] = &[
    native!("bind", [SELF, NativeParam::new("this")], function_bind),
    native!("op_str", [SELF], function_str),
];

fn function_of<'h>(vm: &'h Vm<'_>, value: Value) -> RunResult<&'h Function> {
    match vm.heap.data(value) {
        ObjectData::Function(function) => Ok(function),
        _ => Err(vm.heap.unexpected("function", value)),
    }
}

/// `f.bind(x)` returns a new function with `x` pre-filled.
fn function_bind(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let bound = function_of(vm, args[0])?.bind(args[1])?;
    vm.heap.allocate(ObjectData::Function(Box::new(bound)))
}

fn function_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let text = format!("<function {}>", function_of(vm, args[0])?.name);
    vm.heap.string(text)
}
