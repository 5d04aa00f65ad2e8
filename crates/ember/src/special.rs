//! The special-method table.
//!
//! Special methods are operator and protocol member names (`op_add`,
//! `op_bool`, `hook_get_<name>`, ...) with a fixed arity that counts the
//! receiver. Native bindings are checked against this table when the runtime
//! starts, user classes when they are materialized. Some entries carry a
//! default used by operator dispatch when no Type implements the name.

use regex::Regex;

use crate::{
    bytecode::vm::Vm,
    exception_private::RunResult,
    signature::Signature,
    value::Value,
};

/// Fallback behaviour for an operator no Type implements.
pub(crate) type DefaultFn = fn(&mut Vm<'_>, &[Value]) -> RunResult<Value>;

/// Number of arguments a special method receives, receiver included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Exact(usize),
    /// Any argument count; only used for call- and construction-style hooks.
    Variadic,
}

#[derive(Debug)]
enum NamePattern {
    Exact(&'static str),
    Pattern(Regex),
}

impl NamePattern {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => *exact == name,
            Self::Pattern(re) => re.is_match(name),
        }
    }
}

/// One entry of the table.
#[derive(Debug)]
pub(crate) struct SpecialMethod {
    pattern: NamePattern,
    pub arity: Arity,
    pub default: Option<DefaultFn>,
}

/// The registry of special-method names.
#[derive(Debug)]
pub(crate) struct SpecialMethods {
    methods: Vec<SpecialMethod>,
}

const BINARY: &[&str] = &[
    "op_add", "op_sub", "op_mul", "op_div", "op_mod", "op_pow", "op_eq", "op_ne", "op_lt", "op_le", "op_gt", "op_ge",
    "op_contains", "op_get_item", "op_del_item", "hook_get", "hook_del",
];
const UNARY: &[&str] = &["op_neg", "op_bool", "op_str", "op_len", "op_iter"];
const TERNARY: &[&str] = &["op_set_item", "hook_set"];
const VARIADIC: &[&str] = &["op_call", "init", "create"];

impl SpecialMethods {
    pub fn new() -> Self {
        let mut methods = Vec::new();
        let groups = [(UNARY, 1), (BINARY, 2), (TERNARY, 3)];
        for (names, arity) in groups {
            for &name in names {
                methods.push(SpecialMethod {
                    pattern: NamePattern::Exact(name),
                    arity: Arity::Exact(arity),
                    default: default_for(name),
                });
            }
        }
        for &name in VARIADIC {
            methods.push(SpecialMethod {
                pattern: NamePattern::Exact(name),
                arity: Arity::Variadic,
                default: None,
            });
        }
        for (pattern, arity) in [
            (r"^hook_get_\w+$", 1),
            (r"^hook_set_\w+$", 2),
            (r"^hook_del_\w+$", 1),
        ] {
            methods.push(SpecialMethod {
                pattern: NamePattern::Pattern(Regex::new(pattern).expect("hook patterns are valid regexes")),
                arity: Arity::Exact(arity),
                default: None,
            });
        }
        Self { methods }
    }

    /// Finds the entry governing `name`, exact names first.
    pub fn find(&self, name: &str) -> Option<&SpecialMethod> {
        self.methods.iter().find(|m| m.pattern.matches(name))
    }

    pub fn is_variadic(&self, name: &str) -> bool {
        self.find(name).is_some_and(|m| m.arity == Arity::Variadic)
    }

    pub fn default_for(&self, name: &str) -> Option<DefaultFn> {
        self.find(name).and_then(|m| m.default)
    }

    /// Checks that a member named `name` with this signature fits the table.
    ///
    /// Names outside the table are always accepted.
    pub fn validate(&self, name: &str, signature: &Signature) -> Result<(), String> {
        match self.find(name).map(|m| m.arity) {
            Some(Arity::Exact(arity)) if !signature.accepts(arity) => Err(format!(
                "special method '{name}' must accept {arity} argument{} including the receiver",
                if arity == 1 { "" } else { "s" }
            )),
            _ => Ok(()),
        }
    }

    /// Checks the argument count of an explicit operator invocation.
    pub fn check_argc(&self, name: &str, argc: usize) -> Result<(), String> {
        match self.find(name).map(|m| m.arity) {
            Some(Arity::Exact(arity)) if arity != argc => Err(format!(
                "operator '{name}' takes {arity} operand{} but {argc} were given",
                if arity == 1 { "" } else { "s" }
            )),
            _ => Ok(()),
        }
    }
}

fn default_for(name: &str) -> Option<DefaultFn> {
    match name {
        "op_eq" => Some(default_eq),
        "op_ne" => Some(default_ne),
        "op_bool" => Some(default_bool),
        "op_str" => Some(default_str),
        _ => None,
    }
}

/// Distinct objects are unequal unless a Type says otherwise.
fn default_eq(vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    Ok(vm.heap.bool_value(args[0] == args[1]))
}

fn default_ne(vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    let eq = vm.call_operator("op_eq", args.to_vec(), true)?;
    let truthy = vm.truthy(eq)?;
    Ok(vm.heap.bool_value(!truthy))
}

fn default_bool(vm: &mut Vm<'_>, _args: &[Value]) -> RunResult<Value> {
    Ok(vm.heap.bool_value(true))
}

fn default_str(vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    let text = format!("<{} object>", vm.heap.type_name(args[0]));
    vm.heap.string(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Param;

    fn sig(names: &[&str]) -> Signature {
        Signature::new(names.iter().map(|n| Param::new(*n)).collect()).unwrap()
    }

    #[test]
    fn exact_and_pattern_lookup() {
        let table = SpecialMethods::new();
        assert_eq!(table.find("op_add").map(|m| m.arity), Some(Arity::Exact(2)));
        assert_eq!(table.find("hook_get").map(|m| m.arity), Some(Arity::Exact(2)));
        assert_eq!(table.find("hook_get_size").map(|m| m.arity), Some(Arity::Exact(1)));
        assert_eq!(table.find("hook_set_size").map(|m| m.arity), Some(Arity::Exact(2)));
        assert!(table.is_variadic("op_call"));
        assert!(table.find("add").is_none());
    }

    #[test]
    fn arity_validation() {
        let table = SpecialMethods::new();
        assert!(table.validate("op_add", &sig(&["self", "other"])).is_ok());
        assert!(table.validate("op_add", &sig(&["self"])).is_err());
        assert!(table.validate("op_bool", &sig(&["self", "extra"])).is_err());
        assert!(table.validate("init", &sig(&["self", "a", "b", "c"])).is_ok());
        assert!(table.validate("whatever", &sig(&[])).is_ok());
        assert!(table.check_argc("op_neg", 1).is_ok());
        assert!(table.check_argc("op_neg", 2).is_err());
    }

    #[test]
    fn defaults_registered() {
        let table = SpecialMethods::new();
        assert!(table.default_for("op_eq").is_some());
        assert!(table.default_for("op_bool").is_some());
        assert!(table.default_for("op_add").is_none());
    }
}
