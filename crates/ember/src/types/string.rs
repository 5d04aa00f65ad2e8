//! Native members of `string`.
//!
//! Lengths and indexes count characters, not bytes.

use std::cmp::Ordering;

use crate::{
    builtins::{NativeDefault, NativeMethod, NativeParam, native},
    bytecode::vm::Vm,
    exception_private::{ExcType, RunResult},
    types::{BuiltinType, NativeIter},
    value::{ObjectData, Value},
};

const SELF: NativeParam = NativeParam::typed("self", BuiltinType::String);
const OTHER: NativeParam = NativeParam::typed("other", BuiltinType::String);

pub(crate) const STRING_METHODS: &[NativeMethod] = &[
    native!("op_add", [SELF, OTHER], str_add),
    native!("op_mul", [SELF, NativeParam::typed("count", BuiltinType::Int)], str_mul),
    native!("op_get_item", [SELF, NativeParam::typed("index", BuiltinType::Int)], str_get_item),
    native!("op_len", [SELF], str_len),
    native!("op_contains", [SELF, OTHER], str_contains),
    native!("op_eq", [SELF, NativeParam::new("other")], str_eq),
    native!("op_lt", [SELF, OTHER], str_lt),
    native!("op_le", [SELF, OTHER], str_le),
    native!("op_gt", [SELF, OTHER], str_gt),
    native!("op_ge", [SELF, OTHER], str_ge),
    native!("op_bool", [SELF], str_bool),
    native!("op_str", [SELF], str_str),
    native!("op_iter", [SELF], str_iter),
    native!("upper", [SELF], str_upper),
    native!("lower", [SELF], str_lower),
    native!("split", [SELF, NativeParam::new("sep").default(NativeDefault::Null)], str_split),
    native!("join", [SELF, NativeParam::typed("items", BuiltinType::List)], str_join),
    native!(
        "create",
        [
            NativeParam::typed("cls", BuiltinType::Type),
            NativeParam::new("value").default(NativeDefault::Str(""))
        ],
        str_create
    ),
];

fn text(vm: &Vm<'_>, value: Value) -> RunResult<String> {
    vm.heap
        .as_str(value)
        .map(str::to_owned)
        .ok_or_else(|| vm.heap.unexpected("string", value))
}

fn str_add(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let mut out = text(vm, args[0])?;
    out.push_str(&text(vm, args[1])?);
    vm.heap.string(out)
}

fn str_mul(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let s = text(vm, args[0])?;
    let count = vm.heap.as_int(args[1]).unwrap_or(0);
    let count = usize::try_from(count).unwrap_or(0);
    vm.heap.string(s.repeat(count))
}

fn str_get_item(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let s = text(vm, args[0])?;
    let index = vm.heap.as_int(args[1]).unwrap_or(0);
    let len = s.chars().count() as i64;
    let resolved = if index < 0 { index + len } else { index };
    let ch = usize::try_from(resolved)
        .ok()
        .and_then(|i| s.chars().nth(i))
        .ok_or_else(|| ExcType::IndexError.msg(format!("string index {index} out of range")))?;
    vm.heap.string(ch.to_string())
}

fn str_len(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let len = text(vm, args[0])?.chars().count();
    vm.heap.int(len as i64)
}

fn str_contains(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let found = text(vm, args[0])?.contains(&text(vm, args[1])?);
    Ok(vm.heap.bool_value(found))
}

fn str_eq(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let equal = match (vm.heap.as_str(args[0]), vm.heap.as_str(args[1])) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    Ok(vm.heap.bool_value(equal))
}

fn ordering(vm: &Vm<'_>, args: &[Value]) -> RunResult<Ordering> {
    Ok(text(vm, args[0])?.cmp(&text(vm, args[1])?))
}

fn str_lt(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = ordering(vm, &args)?.is_lt();
    Ok(vm.heap.bool_value(result))
}

fn str_le(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = ordering(vm, &args)?.is_le();
    Ok(vm.heap.bool_value(result))
}

fn str_gt(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = ordering(vm, &args)?.is_gt();
    Ok(vm.heap.bool_value(result))
}

fn str_ge(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = ordering(vm, &args)?.is_ge();
    Ok(vm.heap.bool_value(result))
}

fn str_bool(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let truthy = !text(vm, args[0])?.is_empty();
    Ok(vm.heap.bool_value(truthy))
}

fn str_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    // Subclass instances carry their own Type; the text is copied into a plain string.
    if vm.heap.get(args[0]).type_id.is_none() {
        return Ok(args[0]);
    }
    let s = text(vm, args[0])?;
    vm.heap.string(s)
}

fn str_iter(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    vm.heap.allocate(ObjectData::Iterator(NativeIter::Str {
        string: args[0],
        offset: 0,
    }))
}

fn str_upper(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let s = text(vm, args[0])?.to_uppercase();
    vm.heap.string(s)
}

fn str_lower(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let s = text(vm, args[0])?.to_lowercase();
    vm.heap.string(s)
}

/// Splits on `sep`, or on runs of whitespace when `sep` is null.
fn str_split(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let s = text(vm, args[0])?;
    let parts: Vec<String> = if vm.heap.is_null(args[1]) {
        s.split_whitespace().map(str::to_owned).collect()
    } else {
        let Some(sep) = vm.heap.as_str(args[1]) else {
            return Err(ExcType::TypeError.msg(format!(
                "separator must be a string, not '{}'",
                vm.heap.type_name(args[1])
            )));
        };
        if sep.is_empty() {
            return Err(ExcType::ValueError.msg("empty separator"));
        }
        s.split(sep).map(str::to_owned).collect()
    };
    let mut items = Vec::with_capacity(parts.len());
    for part in parts {
        items.push(vm.heap.string(part)?);
    }
    vm.heap.list(items)
}

fn str_join(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let sep = text(vm, args[0])?;
    let ObjectData::List(items) = vm.heap.data(args[1]) else {
        return Err(vm.heap.unexpected("list", args[1]));
    };
    let mut parts = Vec::with_capacity(items.len());
    for (i, &item) in items.iter().enumerate() {
        match vm.heap.as_str(item) {
            Some(part) => parts.push(part),
            None => {
                return Err(ExcType::TypeError.msg(format!(
                    "join item {i} must be a string, not '{}'",
                    vm.heap.type_name(item)
                )));
            }
        }
    }
    let joined = parts.join(&sep);
    vm.heap.string(joined)
}

fn str_create(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (cls, value) = (args[0], args[1]);
    let s = vm.display(value)?;
    if cls == vm.heap.builtin(BuiltinType::String) {
        vm.heap.string(s)
    } else {
        vm.heap.allocate_typed(ObjectData::Str(s), cls)
    }
}
