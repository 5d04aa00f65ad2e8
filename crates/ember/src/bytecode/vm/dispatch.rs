//! Operator dispatch through the special-method table.

use smallvec::SmallVec;

use super::Vm;
use crate::{
    exception_private::{ErrorKind, ExcType, RunError, RunResult, RuntimeError},
    value::{ObjectData, Value},
};

impl Vm<'_> {
    /// Invokes the operator or hook `name` on explicit operands.
    ///
    /// The Type of each operand is tried in order (only the first operand for
    /// variadic hooks). The first Type whose implementation accepts the
    /// operands wins; an implementation that rejects them is recorded as a
    /// cause and the search continues. With no match the table default is
    /// used when `allow_default` is set, otherwise an `ArgumentError`
    /// carrying every cause is raised.
    pub fn call_operator(&mut self, name: &str, args: Vec<Value>, allow_default: bool) -> RunResult<Value> {
        let mark = self.pin(&args);
        let result = self.dispatch_operator(name, args, allow_default);
        self.unpin(mark);
        result
    }

    fn dispatch_operator(&mut self, name: &str, args: Vec<Value>, allow_default: bool) -> RunResult<Value> {
        self.specials
            .check_argc(name, args.len())
            .map_err(|msg| ExcType::ArgumentError.msg(msg))?;

        let operands = if self.specials.is_variadic(name) {
            &args[..args.len().min(1)]
        } else {
            &args[..]
        };
        let mut tried: SmallVec<[Value; 3]> = SmallVec::new();
        for &operand in operands {
            let ty = self.heap.type_of(operand);
            if !tried.contains(&ty) {
                tried.push(ty);
            }
        }

        let mut causes = Vec::new();
        for &ty in &tried {
            let chain = self.heap.mro(ty).to_vec();
            let Some(method) = self.lookup_in_chain(&chain, name) else {
                causes.push(RuntimeError::new(
                    ErrorKind::Builtin(ExcType::AttributeError),
                    format!("'{}' has no member '{name}'", self.heap.type_name_of_type(ty)),
                ));
                continue;
            };
            match self.prepare_call(method, args.clone()) {
                Ok(Some(call)) => return self.invoke(call),
                Ok(None) => return self.call_value(method, args),
                Err(RunError::Exc(err)) => causes.push(*err),
                Err(err) => return Err(err),
            }
        }

        if allow_default && let Some(default) = self.specials.default_for(name) {
            return default(self, &args);
        }

        let type_names: Vec<&str> = tried.iter().map(|&t| self.heap.type_name_of_type(t)).collect();
        let error = RuntimeError::new(
            ErrorKind::Builtin(ExcType::ArgumentError),
            format!("no implementation of '{name}' for {}", type_names.join(", ")),
        )
        .with_causes(causes);
        Err(error.into())
    }

    /// Truthiness: builtin kinds are decided directly, everything else
    /// through `op_bool`.
    pub fn truthy(&mut self, value: Value) -> RunResult<bool> {
        let object = self.heap.get(value);
        if object.type_id.is_none() {
            match &object.data {
                ObjectData::Null => return Ok(false),
                ObjectData::Bool(b) => return Ok(*b),
                ObjectData::Int(i) => return Ok(*i != 0),
                ObjectData::Num(n) => return Ok(*n != 0.0),
                ObjectData::Str(s) => return Ok(!s.is_empty()),
                ObjectData::List(items) => return Ok(!items.is_empty()),
                ObjectData::Map(map) => return Ok(map.len() > 0),
                _ => {}
            }
        }
        let result = self.call_operator("op_bool", vec![value], true)?;
        self.heap.as_bool(result).ok_or_else(|| {
            ExcType::TypeError.msg(format!(
                "op_bool must return bool, not '{}'",
                self.heap.type_name(result)
            ))
        })
    }

    /// Text form of a value via `op_str`.
    pub fn display(&mut self, value: Value) -> RunResult<String> {
        let object = self.heap.get(value);
        if object.type_id.is_none()
            && let ObjectData::Str(s) = &object.data
        {
            return Ok(s.clone());
        }
        let result = self.call_operator("op_str", vec![value], true)?;
        match self.heap.as_str(result) {
            Some(s) => Ok(s.to_owned()),
            None => Err(ExcType::TypeError.msg(format!(
                "op_str must return string, not '{}'",
                self.heap.type_name(result)
            ))),
        }
    }

    /// Like [`Vm::display`], but strings are quoted. Used inside containers.
    pub fn repr(&mut self, value: Value) -> RunResult<String> {
        match self.heap.as_str(value) {
            Some(s) => Ok(format!("'{s}'")),
            None => self.display(value),
        }
    }

    /// Equality via `op_eq`; identical objects are always equal.
    pub fn equals(&mut self, a: Value, b: Value) -> RunResult<bool> {
        if a == b {
            return Ok(true);
        }
        let result = self.call_operator("op_eq", vec![a, b], true)?;
        self.truthy(result)
    }
}
