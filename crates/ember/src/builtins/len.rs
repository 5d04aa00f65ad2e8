use crate::{
    bytecode::vm::Vm,
    exception_private::{ExcType, RunResult},
    value::Value,
};

/// `len(value)` dispatches to `op_len`, which must return a non-negative int.
pub(super) fn builtin_len(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = vm.call_operator("op_len", args, false)?;
    match vm.heap.as_int(result) {
        Some(len) if len >= 0 => Ok(result),
        _ => Err(ExcType::TypeError.msg(format!(
            "op_len must return a non-negative int, got '{}'",
            vm.heap.type_name(result)
        ))),
    }
}
