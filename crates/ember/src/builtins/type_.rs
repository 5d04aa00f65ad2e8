use crate::{
    bytecode::vm::Vm,
    exception_private::{ExcType, RunResult},
    value::{ObjectData, Value},
};

pub(super) fn builtin_typeof(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    Ok(vm.heap.type_of(args[0]))
}

/// Name of a Type, function or generator.
pub(super) fn builtin_nameof(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let name = match vm.heap.data(args[0]) {
        ObjectData::Type(ty) => ty.name.clone(),
        ObjectData::Function(function) => function.name.clone(),
        ObjectData::Generator(generator) => generator.name.clone(),
        _ => {
            return Err(ExcType::TypeError.msg(format!(
                "'{}' object has no name",
                vm.heap.type_name(args[0])
            )));
        }
    };
    vm.heap.string(name)
}

/// The linearization of a Type as a list of Types.
pub(super) fn builtin_mro(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let mro = vm.heap.mro(args[0]).to_vec();
    vm.heap.list(mro)
}
