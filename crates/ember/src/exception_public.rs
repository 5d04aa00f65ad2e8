//! Errors as seen by the host.

use std::fmt;

use strum::IntoEnumIterator;

use crate::{
    exception_private::{ErrorKind, ExcType, RunError, RuntimeError},
    heap::Heap,
    object::Object,
    value::Value,
};

/// One call layer an error unwound through.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StackFrame {
    /// Name of the function that was executing.
    pub function: String,
    /// Arguments the function received, converted for the host.
    pub args: Vec<Object>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg.repr())?;
        }
        f.write_str(")")
    }
}

/// An error that escaped execution.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Exception {
    type_name: String,
    exc_type: Option<ExcType>,
    message: String,
    /// Innermost call first.
    traceback: Vec<StackFrame>,
    causes: Vec<Exception>,
}

impl Exception {
    /// Creates an exception of a builtin error type with no traceback.
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            type_name: exc_type.to_string(),
            exc_type: Some(exc_type),
            message: message.into(),
            traceback: Vec::new(),
            causes: Vec::new(),
        }
    }

    /// Name of the error's Type, which may be a user-defined Type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The error's builtin Type, or the nearest builtin ancestor of a
    /// user-defined error Type. `None` for internal errors.
    #[must_use]
    pub fn exc_type(&self) -> Option<ExcType> {
        self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn traceback(&self) -> &[StackFrame] {
        &self.traceback
    }

    /// Errors collected while looking for an operator implementation.
    #[must_use]
    pub fn causes(&self) -> &[Self] {
        &self.causes
    }

    /// Whether the error is `kind` or a subtype of it.
    #[must_use]
    pub fn is(&self, kind: ExcType) -> bool {
        self.exc_type.is_some_and(|own| own.is_subclass_of(kind))
    }

    /// Converts an engine error, reading argument values from the heap.
    pub(crate) fn from_run_error(err: RunError, heap: &Heap) -> Self {
        match err {
            RunError::Internal(msg) => Self {
                type_name: "InternalError".to_owned(),
                exc_type: None,
                message: msg.into_owned(),
                traceback: Vec::new(),
                causes: Vec::new(),
            },
            RunError::Exc(err) | RunError::Uncatchable(err) => Self::from_runtime_error(&err, heap),
        }
    }

    fn from_runtime_error(err: &RuntimeError, heap: &Heap) -> Self {
        let (type_name, exc_type) = match err.kind {
            ErrorKind::Builtin(kind) => (kind.to_string(), Some(kind)),
            ErrorKind::Type(ty) => (heap.type_name_of_type(ty).to_owned(), nearest_builtin(heap, ty)),
        };
        let traceback = err
            .trace
            .iter()
            .map(|layer| StackFrame {
                function: layer.function.clone(),
                args: layer.args.iter().map(|&arg| Object::from_value(arg, heap)).collect(),
            })
            .collect();
        Self {
            type_name,
            exc_type,
            message: err.message.clone(),
            traceback,
            causes: err.causes.iter().map(|cause| Self::from_runtime_error(cause, heap)).collect(),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        if self.message.is_empty() {
            writeln!(f, "{pad}{}", self.type_name)?;
        } else {
            writeln!(f, "{pad}{}: {}", self.type_name, self.message)?;
        }
        for frame in &self.traceback {
            writeln!(f, "{pad}  at {frame}")?;
        }
        if !self.causes.is_empty() {
            writeln!(f, "{pad}caused by:")?;
            for cause in &self.causes {
                cause.fmt_indented(f, indent + 1)?;
            }
        }
        Ok(())
    }
}

fn nearest_builtin(heap: &Heap, ty: Value) -> Option<ExcType> {
    heap.mro(ty)
        .iter()
        .find_map(|&ancestor| ExcType::iter().find(|&kind| heap.exc_type(kind) == ancestor))
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl std::error::Error for Exception {}

/// A native binding that does not fit the special-method table or declares a
/// malformed parameter list. Raised while the runtime starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationError {
    owner: String,
    member: String,
    reason: String,
}

impl RegistrationError {
    pub(crate) fn new(owner: impl Into<String>, member: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
            reason: reason.into(),
        }
    }

    /// Type (or `builtins`) the member was registered on.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot register '{}.{}': {}", self.owner, self.member, self.reason)
    }
}

impl std::error::Error for RegistrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_trace_and_causes() {
        let mut exc = Exception::new(ExcType::ArgumentError, "no implementation of 'op_add' for int, string");
        exc.traceback.push(StackFrame {
            function: "add".to_owned(),
            args: vec![Object::Int(1), Object::Str("2".to_owned())],
        });
        exc.causes.push(Exception::new(ExcType::TypeError, "bad operand"));
        assert_eq!(
            exc.to_string(),
            "ArgumentError: no implementation of 'op_add' for int, string\n  at add(1, '2')\ncaused by:\n  TypeError: bad operand\n"
        );
    }

    #[test]
    fn subclass_check_follows_the_hierarchy() {
        let exc = Exception::new(ExcType::NullError, "x");
        assert!(exc.is(ExcType::AttributeError));
        assert!(exc.is(ExcType::Error));
        assert!(!exc.is(ExcType::TypeError));
    }
}
