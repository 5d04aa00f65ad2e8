use crate::{bytecode::vm::Vm, exception_private::RunResult, value::Value};

pub(super) fn builtin_iter(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    vm.get_iterator(args[0])
}

pub(super) fn builtin_next(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    vm.iterate_next(args[0])
}
