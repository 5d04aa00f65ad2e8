use crate::{
    builtins::{NativeMethod, NativeParam, native},
    bytecode::vm::Vm,
    exception_private::{ErrorKind, RunResult, RuntimeError, TraceLayer},
    types::BuiltinType,
    value::{ObjectData, Value},
};

/// Diagnostics carried by an error object.
///
/// The `message` lives in the object's member table; the trace and causes are
/// kept here so rethrowing a caught error preserves them.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorData {
    pub trace: Vec<TraceLayer>,
    pub causes: Vec<RuntimeError>,
}

impl ErrorData {
    pub fn collect_refs(&self, objects: &mut Vec<Value>) {
        for layer in &self.trace {
            objects.extend(layer.args.iter().copied());
        }
        for cause in &self.causes {
            collect_error_refs(cause, objects);
        }
    }
}

/// Collects every value reachable from an in-flight error.
pub(crate) fn collect_error_refs(error: &RuntimeError, objects: &mut Vec<Value>) {
    if let ErrorKind::Type(ty) = error.kind {
        objects.push(ty);
    }
    objects.extend(error.value);
    objects.extend(error.payload.iter().map(|(_, v)| *v));
    for layer in &error.trace {
        objects.extend(layer.args.iter().copied());
    }
    for cause in &error.causes {
        collect_error_refs(cause, objects);
    }
}

/// Members of the root `Error` Type, inherited by every error Type.
pub(crate) const ERROR_METHODS: &[NativeMethod] = &[
    native!(
        "create",
        [NativeParam::typed("cls", BuiltinType::Type), NativeParam::new("args").rest()],
        error_create
    ),
    native!("op_str", [NativeParam::new("self")], error_str),
];

/// Allocates an error of Type `cls`; the first argument, if any, is the message.
///
/// Remaining arguments are left for a user `init`.
fn error_create(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let cls = args[0];
    let message = match args.get(1) {
        Some(&value) => vm.display(value)?,
        None => String::new(),
    };
    let object = vm.heap.allocate_typed(ObjectData::Error(Box::default()), cls)?;
    let message = vm.heap.string(message)?;
    vm.heap.get_mut(object).members.insert("message".to_owned(), message);
    Ok(object)
}

fn error_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let this = args[0];
    let message = match vm.heap.get(this).members.get("message").copied() {
        Some(message) => vm.display(message)?,
        None => String::new(),
    };
    let name = vm.heap.type_name(this);
    let text = if message.is_empty() { name.to_owned() } else { format!("{name}: {message}") };
    vm.heap.string(text)
}
