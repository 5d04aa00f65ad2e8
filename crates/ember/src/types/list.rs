//! Native members of `list`.

use crate::{
    builtins::{NativeDefault, NativeMethod, NativeParam, native},
    bytecode::vm::Vm,
    exception_private::{ExcType, RunError, RunResult},
    types::{BuiltinType, NativeIter},
    value::{ObjectData, Value},
};

const SELF: NativeParam = NativeParam::typed("self", BuiltinType::List);
const INDEX: NativeParam = NativeParam::typed("index", BuiltinType::Int);

pub(crate) const LIST_METHODS: &[NativeMethod] = &[
    native!("append", [SELF, NativeParam::new("item")], list_append),
    native!("pop", [SELF], list_pop),
    native!("op_get_item", [SELF, INDEX], list_get_item),
    native!("op_set_item", [SELF, INDEX, NativeParam::new("value")], list_set_item),
    native!("op_del_item", [SELF, INDEX], list_del_item),
    native!("op_len", [SELF], list_len),
    native!("op_contains", [SELF, NativeParam::new("item")], list_contains),
    native!("op_add", [SELF, NativeParam::typed("other", BuiltinType::List)], list_add),
    native!("op_eq", [SELF, NativeParam::new("other")], list_eq),
    native!("op_iter", [SELF], list_iter),
    native!("op_bool", [SELF], list_bool),
    native!("op_str", [SELF], list_str),
    native!(
        "create",
        [
            NativeParam::typed("cls", BuiltinType::Type),
            NativeParam::new("iterable").default(NativeDefault::Null)
        ],
        list_create
    ),
];

/// Snapshot of a list's items.
fn items(vm: &Vm<'_>, list: Value) -> RunResult<Vec<Value>> {
    match vm.heap.data(list) {
        ObjectData::List(items) => Ok(items.clone()),
        _ => Err(vm.heap.unexpected("list", list)),
    }
}

fn items_mut<'h>(vm: &'h mut Vm<'_>, list: Value) -> RunResult<&'h mut Vec<Value>> {
    if !matches!(vm.heap.data(list), ObjectData::List(_)) {
        return Err(vm.heap.unexpected("list", list));
    }
    match &mut vm.heap.get_mut(list).data {
        ObjectData::List(items) => Ok(items),
        _ => Err(RunError::internal("list changed kind")),
    }
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(index: i64, len: usize) -> RunResult<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    usize::try_from(resolved)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| ExcType::IndexError.msg(format!("list index {index} out of range")))
}

fn list_append(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    items_mut(vm, args[0])?.push(args[1]);
    Ok(vm.heap.null())
}

fn list_pop(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    items_mut(vm, args[0])?
        .pop()
        .ok_or_else(|| ExcType::IndexError.msg("pop from empty list"))
}

fn list_get_item(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let index = vm.heap.as_int(args[1]).unwrap_or(0);
    let items = items(vm, args[0])?;
    Ok(items[resolve_index(index, items.len())?])
}

fn list_set_item(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let index = vm.heap.as_int(args[1]).unwrap_or(0);
    let items = items_mut(vm, args[0])?;
    let i = resolve_index(index, items.len())?;
    items[i] = args[2];
    Ok(vm.heap.null())
}

fn list_del_item(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let index = vm.heap.as_int(args[1]).unwrap_or(0);
    let items = items_mut(vm, args[0])?;
    let i = resolve_index(index, items.len())?;
    items.remove(i);
    Ok(vm.heap.null())
}

fn list_len(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let len = items(vm, args[0])?.len();
    vm.heap.int(len as i64)
}

fn list_contains(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let snapshot = items(vm, args[0])?;
    let found = vm.with_pinned(&snapshot, |vm| -> RunResult<bool> {
        for &item in &snapshot {
            if vm.equals(item, args[1])? {
                return Ok(true);
            }
        }
        Ok(false)
    })?;
    Ok(vm.heap.bool_value(found))
}

fn list_add(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let mut joined = items(vm, args[0])?;
    joined.extend(items(vm, args[1])?);
    vm.heap.list(joined)
}

/// Element-wise equality with another list.
fn list_eq(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    if !matches!(vm.heap.data(args[1]), ObjectData::List(_)) {
        return Ok(vm.heap.bool_value(false));
    }
    let (a, b) = (items(vm, args[0])?, items(vm, args[1])?);
    if a.len() != b.len() {
        return Ok(vm.heap.bool_value(false));
    }
    let pinned: Vec<Value> = a.iter().chain(&b).copied().collect();
    let equal = vm.with_pinned(&pinned, |vm| -> RunResult<bool> {
        for (&x, &y) in a.iter().zip(&b) {
            if !vm.equals(x, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    })?;
    Ok(vm.heap.bool_value(equal))
}

fn list_iter(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    vm.heap.allocate(ObjectData::Iterator(NativeIter::List {
        list: args[0],
        index: 0,
    }))
}

fn list_bool(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let truthy = !items(vm, args[0])?.is_empty();
    Ok(vm.heap.bool_value(truthy))
}

fn list_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let snapshot = items(vm, args[0])?;
    let parts = vm.with_pinned(&snapshot, |vm| -> RunResult<Vec<String>> {
        let mut parts = Vec::with_capacity(snapshot.len());
        for &item in &snapshot {
            if item == args[0] {
                parts.push("[...]".to_owned());
            } else {
                parts.push(vm.repr(item)?);
            }
        }
        Ok(parts)
    })?;
    vm.heap.string(format!("[{}]", parts.join(", ")))
}

/// Builds a list from any iterable, or an empty list.
fn list_create(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (cls, iterable) = (args[0], args[1]);
    let collected = if vm.heap.is_null(iterable) {
        Vec::new()
    } else {
        vm.collect_iterable(iterable)?
    };
    if cls == vm.heap.builtin(BuiltinType::List) {
        vm.heap.list(collected)
    } else {
        vm.heap.allocate_typed(ObjectData::List(collected), cls)
    }
}
