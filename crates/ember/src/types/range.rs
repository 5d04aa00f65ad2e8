use crate::{
    builtins::{NativeDefault, NativeMethod, NativeParam, native},
    bytecode::vm::Vm,
    exception_private::{ExcType, RunResult},
    types::{BuiltinType, NativeIter},
    value::{ObjectData, Value},
};

/// Arithmetic progression produced by `range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    /// Creates a range; `step` must be non-zero.
    pub fn new(start: i64, stop: i64, step: i64) -> Self {
        debug_assert!(step != 0, "range step must be non-zero");
        Self { start, stop, step }
    }

    /// Number of elements in the progression.
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            i128::from(self.stop) - i128::from(self.start)
        } else {
            i128::from(self.start) - i128::from(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = i128::from(self.step).abs();
        ((span + step - 1) / step) as usize
    }

    /// Whether `value` is one of the elements.
    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            value >= self.start && value < self.stop
        } else {
            value <= self.start && value > self.stop
        };
        in_bounds && (i128::from(value) - i128::from(self.start)) % i128::from(self.step) == 0
    }

    /// Element at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<i64> {
        (index < self.len()).then(|| self.start + self.step * index as i64)
    }
}

const SELF: NativeParam = NativeParam::typed("self", BuiltinType::Range);

pub(crate) const RANGE_METHODS: &[NativeMethod] = &[
    native!(
        "create",
        [
            NativeParam::typed("cls", BuiltinType::Type),
            NativeParam::typed("start", BuiltinType::Int),
            NativeParam::new("stop").default(NativeDefault::Null),
            NativeParam::typed("step", BuiltinType::Int).default(NativeDefault::Int(1))
        ],
        range_create
    ),
    native!("op_iter", [SELF], range_iter),
    native!("op_len", [SELF], range_len),
    native!("op_contains", [SELF, NativeParam::new("value")], range_contains),
    native!("op_get_item", [SELF, NativeParam::typed("index", BuiltinType::Int)], range_get_item),
    native!("op_str", [SELF], range_str),
];

fn range_of(vm: &Vm<'_>, value: Value) -> RunResult<Range> {
    match vm.heap.data(value) {
        ObjectData::Range(range) => Ok(*range),
        _ => Err(vm.heap.unexpected("range", value)),
    }
}

/// `range(stop)` counts from zero; `range(start, stop, step)` otherwise.
fn range_create(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let cls = args[0];
    let first = vm.heap.as_int(args[1]).unwrap_or(0);
    let (start, stop) = if vm.heap.is_null(args[2]) {
        (0, first)
    } else {
        let stop = vm.heap.as_int(args[2]).ok_or_else(|| {
            ExcType::TypeError.msg(format!(
                "range stop must be an int, not '{}'",
                vm.heap.type_name(args[2])
            ))
        })?;
        (first, stop)
    };
    let step = vm.heap.as_int(args[3]).unwrap_or(1);
    if step == 0 {
        return Err(ExcType::ValueError.msg("range step must not be zero"));
    }
    let data = ObjectData::Range(Range::new(start, stop, step));
    if cls == vm.heap.builtin(BuiltinType::Range) {
        vm.heap.allocate(data)
    } else {
        vm.heap.allocate_typed(data, cls)
    }
}

fn range_iter(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let range = range_of(vm, args[0])?;
    vm.heap.allocate(ObjectData::Iterator(NativeIter::Range {
        next: range.start,
        stop: range.stop,
        step: range.step,
    }))
}

fn range_len(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let len = range_of(vm, args[0])?.len();
    vm.heap.int(len as i64)
}

fn range_contains(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let range = range_of(vm, args[0])?;
    let found = match vm.heap.data(args[1]) {
        ObjectData::Int(i) => range.contains(*i),
        ObjectData::Num(n) if n.fract() == 0.0 => range.contains(*n as i64),
        _ => false,
    };
    Ok(vm.heap.bool_value(found))
}

fn range_get_item(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let range = range_of(vm, args[0])?;
    let index = vm.heap.as_int(args[1]).unwrap_or(0);
    let len = range.len() as i64;
    let resolved = if index < 0 { index + len } else { index };
    let item = usize::try_from(resolved)
        .ok()
        .and_then(|i| range.get(i))
        .ok_or_else(|| ExcType::IndexError.msg(format!("range index {index} out of range")))?;
    vm.heap.int(item)
}

fn range_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let range = range_of(vm, args[0])?;
    let text = if range.step == 1 {
        format!("range({}, {})", range.start, range.stop)
    } else {
        format!("range({}, {}, {})", range.start, range.stop, range.step)
    };
    vm.heap.string(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths() {
        assert_eq!(Range::new(0, 5, 1).len(), 5);
        assert_eq!(Range::new(0, 5, 2).len(), 3);
        assert_eq!(Range::new(5, 0, -1).len(), 5);
        assert_eq!(Range::new(5, 0, 1).len(), 0);
    }

    #[test]
    fn membership_respects_step() {
        let range = Range::new(1, 10, 3);
        assert!(range.contains(7));
        assert!(!range.contains(8));
        assert!(!range.contains(10));
        assert_eq!(range.get(2), Some(7));
        assert_eq!(range.get(3), None);
    }
}
