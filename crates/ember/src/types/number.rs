//! Native members of `num`, `int`, `bool` and `null`.
//!
//! `int` is a subtype of `num`. Integer arithmetic is checked and promotes to
//! `num` on overflow; any `num` operand makes the result a `num`.

use std::cmp::Ordering;

use crate::{
    builtins::{NativeDefault, NativeMethod, NativeParam, native},
    bytecode::vm::Vm,
    exception_private::{ExcType, RunResult},
    types::BuiltinType,
    value::{ObjectData, Value},
};

const SELF_NUM: NativeParam = NativeParam::typed("self", BuiltinType::Num);
const SELF_INT: NativeParam = NativeParam::typed("self", BuiltinType::Int);
const OTHER_NUM: NativeParam = NativeParam::typed("other", BuiltinType::Num);
const OTHER: NativeParam = NativeParam::new("other");
const CLS: NativeParam = NativeParam::typed("cls", BuiltinType::Type);

pub(crate) const NUM_METHODS: &[NativeMethod] = &[
    native!("op_add", [SELF_NUM, OTHER_NUM], num_add),
    native!("op_sub", [SELF_NUM, OTHER_NUM], num_sub),
    native!("op_mul", [SELF_NUM, OTHER_NUM], num_mul),
    native!("op_div", [SELF_NUM, OTHER_NUM], num_div),
    native!("op_mod", [SELF_NUM, OTHER_NUM], num_mod),
    native!("op_pow", [SELF_NUM, OTHER_NUM], num_pow),
    native!("op_neg", [SELF_NUM], num_neg),
    native!("op_eq", [SELF_NUM, OTHER], num_eq),
    native!("op_lt", [SELF_NUM, OTHER_NUM], num_lt),
    native!("op_le", [SELF_NUM, OTHER_NUM], num_le),
    native!("op_gt", [SELF_NUM, OTHER_NUM], num_gt),
    native!("op_ge", [SELF_NUM, OTHER_NUM], num_ge),
    native!("op_bool", [SELF_NUM], num_bool),
    native!("op_str", [SELF_NUM], num_str),
    native!("create", [CLS, NativeParam::new("value").default(NativeDefault::Int(0))], num_create),
];

pub(crate) const INT_METHODS: &[NativeMethod] = &[
    native!("op_add", [SELF_INT, OTHER_NUM], num_add),
    native!("op_sub", [SELF_INT, OTHER_NUM], num_sub),
    native!("op_mul", [SELF_INT, OTHER_NUM], num_mul),
    native!("op_mod", [SELF_INT, OTHER_NUM], num_mod),
    native!("op_neg", [SELF_INT], num_neg),
    native!("op_eq", [SELF_INT, OTHER], num_eq),
    native!("op_lt", [SELF_INT, OTHER_NUM], num_lt),
    native!("op_le", [SELF_INT, OTHER_NUM], num_le),
    native!("op_gt", [SELF_INT, OTHER_NUM], num_gt),
    native!("op_ge", [SELF_INT, OTHER_NUM], num_ge),
    native!("op_bool", [SELF_INT], num_bool),
    native!("op_str", [SELF_INT], num_str),
    native!("create", [CLS, NativeParam::new("value").default(NativeDefault::Int(0))], int_create),
];

pub(crate) const BOOL_METHODS: &[NativeMethod] = &[
    native!("op_bool", [NativeParam::typed("self", BuiltinType::Bool)], bool_bool),
    native!("op_str", [NativeParam::typed("self", BuiltinType::Bool)], bool_str),
    native!("create", [CLS, NativeParam::new("value").default(NativeDefault::Bool(false))], bool_create),
];

pub(crate) const NULL_METHODS: &[NativeMethod] = &[
    native!("op_bool", [NativeParam::typed("self", BuiltinType::Null)], null_bool),
    native!("op_str", [NativeParam::typed("self", BuiltinType::Null)], null_str),
];

/// Numeric operands, both ints or widened to nums.
enum Operands {
    Ints(i64, i64),
    Nums(f64, f64),
}

fn number(vm: &Vm<'_>, value: Value) -> RunResult<Operand> {
    match vm.heap.data(value) {
        ObjectData::Int(i) => Ok(Operand::Int(*i)),
        ObjectData::Num(n) => Ok(Operand::Num(*n)),
        _ => Err(ExcType::TypeError.msg(format!(
            "'{}' object has no numeric value",
            vm.heap.type_name(value)
        ))),
    }
}

#[derive(Clone, Copy)]
enum Operand {
    Int(i64),
    Num(f64),
}

impl Operand {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Num(n) => n,
        }
    }
}

fn operands(vm: &Vm<'_>, args: &[Value]) -> RunResult<Operands> {
    match (number(vm, args[0])?, number(vm, args[1])?) {
        (Operand::Int(a), Operand::Int(b)) => Ok(Operands::Ints(a, b)),
        (a, b) => Ok(Operands::Nums(a.as_f64(), b.as_f64())),
    }
}

/// Integer result when it fits, otherwise the widened `num` result.
fn int_or_num(vm: &mut Vm<'_>, checked: Option<i64>, widened: f64) -> RunResult<Value> {
    match checked {
        Some(i) => vm.heap.int(i),
        None => vm.heap.num(widened),
    }
}

fn num_add(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    match operands(vm, &args)? {
        Operands::Ints(a, b) => int_or_num(vm, a.checked_add(b), a as f64 + b as f64),
        Operands::Nums(a, b) => vm.heap.num(a + b),
    }
}

fn num_sub(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    match operands(vm, &args)? {
        Operands::Ints(a, b) => int_or_num(vm, a.checked_sub(b), a as f64 - b as f64),
        Operands::Nums(a, b) => vm.heap.num(a - b),
    }
}

fn num_mul(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    match operands(vm, &args)? {
        Operands::Ints(a, b) => int_or_num(vm, a.checked_mul(b), a as f64 * b as f64),
        Operands::Nums(a, b) => vm.heap.num(a * b),
    }
}

fn num_div(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (a, b) = match operands(vm, &args)? {
        Operands::Ints(a, b) => (a as f64, b as f64),
        Operands::Nums(a, b) => (a, b),
    };
    if b == 0.0 {
        return Err(ExcType::ZeroDivisionError.msg("division by zero"));
    }
    vm.heap.num(a / b)
}

/// Floored modulo: the result takes the sign of the divisor.
fn num_mod(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    match operands(vm, &args)? {
        Operands::Ints(a, b) => {
            if b == 0 {
                return Err(ExcType::ZeroDivisionError.msg("modulo by zero"));
            }
            let Some(r) = a.checked_rem(b) else {
                // i64::MIN % -1
                return vm.heap.int(0);
            };
            let r = if r != 0 && (r < 0) != (b < 0) { r + b } else { r };
            vm.heap.int(r)
        }
        Operands::Nums(a, b) => {
            if b == 0.0 {
                return Err(ExcType::ZeroDivisionError.msg("modulo by zero"));
            }
            let r = a % b;
            let r = if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r };
            vm.heap.num(r)
        }
    }
}

fn num_pow(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    match operands(vm, &args)? {
        Operands::Ints(base, exp) if exp >= 0 => {
            let checked = u32::try_from(exp).ok().and_then(|e| base.checked_pow(e));
            int_or_num(vm, checked, (base as f64).powf(exp as f64))
        }
        Operands::Ints(base, exp) => pow_nums(vm, base as f64, exp as f64),
        Operands::Nums(base, exp) => pow_nums(vm, base, exp),
    }
}

fn pow_nums(vm: &mut Vm<'_>, base: f64, exp: f64) -> RunResult<Value> {
    if base == 0.0 && exp < 0.0 {
        return Err(ExcType::ZeroDivisionError.msg("zero cannot be raised to a negative power"));
    }
    vm.heap.num(base.powf(exp))
}

fn num_neg(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    match number(vm, args[0])? {
        Operand::Int(i) => int_or_num(vm, i.checked_neg(), -(i as f64)),
        Operand::Num(n) => vm.heap.num(-n),
    }
}

fn compare(vm: &Vm<'_>, args: &[Value]) -> RunResult<Option<Ordering>> {
    Ok(match operands(vm, args)? {
        Operands::Ints(a, b) => Some(a.cmp(&b)),
        Operands::Nums(a, b) => a.partial_cmp(&b),
    })
}

fn num_eq(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let numeric = matches!(vm.heap.data(args[1]), ObjectData::Int(_) | ObjectData::Num(_));
    let equal = numeric && compare(vm, &args)? == Some(Ordering::Equal);
    Ok(vm.heap.bool_value(equal))
}

fn num_lt(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = compare(vm, &args)?.is_some_and(Ordering::is_lt);
    Ok(vm.heap.bool_value(result))
}

fn num_le(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = compare(vm, &args)?.is_some_and(Ordering::is_le);
    Ok(vm.heap.bool_value(result))
}

fn num_gt(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = compare(vm, &args)?.is_some_and(Ordering::is_gt);
    Ok(vm.heap.bool_value(result))
}

fn num_ge(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let result = compare(vm, &args)?.is_some_and(Ordering::is_ge);
    Ok(vm.heap.bool_value(result))
}

fn num_bool(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let truthy = match number(vm, args[0])? {
        Operand::Int(i) => i != 0,
        Operand::Num(n) => n != 0.0,
    };
    Ok(vm.heap.bool_value(truthy))
}

/// Text form of a num: integral values keep a trailing `.0`.
pub(crate) fn format_num(n: f64) -> String {
    if n.is_nan() {
        "nan".to_owned()
    } else if n.is_infinite() {
        (if n > 0.0 { "inf" } else { "-inf" }).to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{n:.1}")
    } else {
        n.to_string()
    }
}

fn num_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let text = match number(vm, args[0])? {
        Operand::Int(i) => i.to_string(),
        Operand::Num(n) => format_num(n),
    };
    vm.heap.string(text)
}

fn int_create(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (cls, value) = (args[0], args[1]);
    let i = match vm.heap.data(value) {
        ObjectData::Int(i) => *i,
        ObjectData::Bool(b) => i64::from(*b),
        ObjectData::Num(n) if n.is_finite() => n.trunc() as i64,
        ObjectData::Num(n) => {
            return Err(ExcType::ValueError.msg(format!("cannot convert {} to int", format_num(*n))));
        }
        ObjectData::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ExcType::ValueError.msg(format!("invalid literal for int: '{s}'")))?,
        _ => {
            return Err(ExcType::TypeError.msg(format!(
                "cannot convert '{}' to int",
                vm.heap.type_name(value)
            )));
        }
    };
    if cls == vm.heap.builtin(BuiltinType::Int) {
        vm.heap.int(i)
    } else {
        vm.heap.allocate_typed(ObjectData::Int(i), cls)
    }
}

fn num_create(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (cls, value) = (args[0], args[1]);
    let n = match vm.heap.data(value) {
        ObjectData::Int(i) => *i as f64,
        ObjectData::Num(n) => *n,
        ObjectData::Bool(b) => f64::from(u8::from(*b)),
        ObjectData::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ExcType::ValueError.msg(format!("invalid literal for num: '{s}'")))?,
        _ => {
            return Err(ExcType::TypeError.msg(format!(
                "cannot convert '{}' to num",
                vm.heap.type_name(value)
            )));
        }
    };
    if cls == vm.heap.builtin(BuiltinType::Num) {
        vm.heap.num(n)
    } else {
        vm.heap.allocate_typed(ObjectData::Num(n), cls)
    }
}

fn bool_bool(_vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    Ok(args[0])
}

fn bool_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let text = if vm.heap.as_bool(args[0]) == Some(true) { "true" } else { "false" };
    vm.heap.string(text)
}

fn bool_create(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let truthy = vm.truthy(args[1])?;
    Ok(vm.heap.bool_value(truthy))
}

fn null_bool(vm: &mut Vm<'_>, _args: Vec<Value>) -> RunResult<Value> {
    Ok(vm.heap.bool_value(false))
}

fn null_str(vm: &mut Vm<'_>, _args: Vec<Value>) -> RunResult<Value> {
    vm.heap.string("null")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_formatting() {
        assert_eq!(format_num(2.0), "2.0");
        assert_eq!(format_num(5.5), "5.5");
        assert_eq!(format_num(-0.25), "-0.25");
        assert_eq!(format_num(f64::INFINITY), "inf");
        assert_eq!(format_num(f64::NAN), "nan");
    }
}
