//! Member access that bypasses hooks.

use crate::{
    bytecode::vm::{LookupMode, Vm},
    exception_private::{ExcType, RunError, RunResult},
    value::Value,
};

fn member_name(vm: &Vm<'_>, name: Value) -> RunResult<String> {
    vm.heap
        .as_str(name)
        .map(str::to_owned)
        .ok_or_else(|| RunError::internal("member name is not a string"))
}

/// Reads from the object's own member table only.
pub(super) fn builtin_rawget(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (obj, name) = (args[0], member_name(vm, args[1])?);
    if vm.heap.is_null(obj) {
        return Err(ExcType::null_error(&name));
    }
    match vm.heap.get(obj).members.get(&name) {
        Some(&value) => Ok(value),
        None => Err(ExcType::attribute_error(vm.heap.type_name(obj), &name)),
    }
}

/// Writes the object's own member table without consulting setter hooks.
pub(super) fn builtin_rawset(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (obj, name, member) = (args[0], member_name(vm, args[1])?, args[2]);
    vm.check_member_target(obj, &name)?;
    vm.heap.get_mut(obj).members.insert(name, member);
    Ok(vm.heap.null())
}

/// Whether a lookup without hooks resolves the member.
pub(super) fn builtin_hasmember(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (obj, name) = (args[0], member_name(vm, args[1])?);
    let found = !vm.heap.is_null(obj) && vm.lookup_member(obj, &name, LookupMode::NO_HOOKS)?.is_some();
    Ok(vm.heap.bool_value(found))
}
