use crate::{
    builtins::{NativeMethod, NativeParam, native},
    bytecode::vm::Vm,
    exception_private::RunResult,
    types::BuiltinType,
    value::Value,
};

/// Cursor state of a native iterator over a builtin container.
///
/// Lists and maps are read through their handle on every step, so mutations
/// made during iteration are observed.
#[derive(Debug, Clone)]
pub(crate) enum NativeIter {
    List { list: Value, index: usize },
    /// Byte offset into the string; yields one-character strings.
    Str { string: Value, offset: usize },
    Range { next: i64, stop: i64, step: i64 },
    /// Yields keys in insertion order.
    MapKeys { map: Value, index: usize },
}

impl NativeIter {
    pub fn collect_refs(&self, objects: &mut Vec<Value>) {
        match self {
            Self::List { list: value, .. } | Self::Str { string: value, .. } | Self::MapKeys { map: value, .. } => {
                objects.push(*value);
            }
            Self::Range { .. } => {}
        }
    }
}

const SELF: NativeParam = NativeParam::typed("self", BuiltinType::Iterator);

pub(crate) const ITERATOR_METHODS: &[NativeMethod] = &[
    native!("next", [SELF], iterator_next),
    native!("op_iter", [SELF], iterator_iter),
];

fn iterator_next(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    vm.native_next(args[0])
}

/// Iterators are their own iterators.
pub(crate) fn iterator_iter(_vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    Ok(args[0])
}
