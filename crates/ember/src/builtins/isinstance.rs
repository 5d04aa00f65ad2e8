use crate::{bytecode::vm::Vm, exception_private::RunResult, value::Value};

pub(super) fn builtin_isinstance(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = vm.heap.is_instance(args[0], args[1]);
    Ok(vm.heap.bool_value(result))
}
