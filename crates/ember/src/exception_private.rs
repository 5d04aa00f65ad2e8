use std::{borrow::Cow, fmt};

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::value::Value;

/// Result type alias for operations that can produce a runtime error.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// Builtin error types known to the runtime.
///
/// Every variant is materialized as an ordinary runtime Type when the runtime
/// starts, with [`ExcType::parent`] as its single parent, so user code can
/// subclass them and `catch` blocks can filter them with a type test.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations. The string representation matches the variant name exactly.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum ExcType {
    /// Root of the error hierarchy.
    Error,

    // --- AttributeError hierarchy ---
    /// Missing or invalid member access or deletion.
    AttributeError,
    /// Member access on the null value.
    NullError,

    // --- ArgumentError hierarchy ---
    /// Signature mismatches and malformed operator dispatch.
    ArgumentError,
    /// Too many or too few arguments for a call.
    ArgumentCountError,
    /// No consistent method resolution order exists for a type's parents.
    MroError,

    /// A value's type cannot be assigned to a declared parameter type.
    TypeError,
    /// A scope variable could not be resolved.
    NameError,
    ZeroDivisionError,
    IndexError,
    KeyError,
    ValueError,

    // --- control signals ---
    /// Raised by `next` when an iterator is exhausted.
    IteratorStopped,
    /// Raised when a yield escapes a frame that cannot be suspended.
    YieldSignal,

    // --- resource exhaustion ---
    RecursionError,
    MemoryError,
    TimeoutError,
}

impl ExcType {
    /// Returns the single parent of this error type, or `None` for the root.
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Error => None,
            Self::NullError => Some(Self::AttributeError),
            Self::ArgumentCountError | Self::MroError => Some(Self::ArgumentError),
            _ => Some(Self::Error),
        }
    }

    /// Checks if this error type is `other` or inherits from it.
    #[must_use]
    pub fn is_subclass_of(self, other: Self) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// Creates a catchable error of this type with the given message.
    #[must_use]
    pub(crate) fn msg(self, message: impl Into<String>) -> RunError {
        RunError::Exc(Box::new(RuntimeError::new(ErrorKind::Builtin(self), message)))
    }

    /// NameError for an unresolved variable.
    pub(crate) fn name_error(name: &str) -> RunError {
        Self::NameError.msg(format!("name '{name}' is not defined"))
    }

    /// AttributeError for a member missing on a value of the named type.
    pub(crate) fn attribute_error(type_name: &str, name: &str) -> RunError {
        Self::AttributeError.msg(format!("'{type_name}' object has no member '{name}'"))
    }

    /// NullError for member access on null.
    pub(crate) fn null_error(name: &str) -> RunError {
        Self::NullError.msg(format!("cannot access member '{name}' of null"))
    }

    /// ArgumentCountError for a call with too many positional arguments.
    pub(crate) fn too_many_args(func: &str, expected: usize, actual: usize) -> RunError {
        let plural = if expected == 1 { "" } else { "s" };
        Self::ArgumentCountError.msg(format!(
            "{func}() takes {expected} positional argument{plural} but {actual} were given"
        ))
    }

    /// ArgumentCountError for a call missing a required argument.
    pub(crate) fn missing_arg(func: &str, param: &str) -> RunError {
        Self::ArgumentCountError.msg(format!("{func}() missing required argument '{param}'"))
    }
}

/// Identity of a raised error's Type.
///
/// Builtin errors are created without heap access (so any helper can raise them)
/// and resolved to their materialized Type lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Builtin(ExcType),
    Type(Value),
}

/// One unwound call layer: the function crossed and the arguments it received.
#[derive(Debug, Clone)]
pub(crate) struct TraceLayer {
    pub function: String,
    pub args: Vec<Value>,
}

/// A raised runtime error travelling through the engine.
///
/// `value` holds the thrown error object when user code threw one (or when a
/// builtin error has already been materialized for a `catch` binding), so a
/// rethrow keeps object identity.
#[derive(Debug, Clone)]
pub(crate) struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub value: Option<Value>,
    /// Innermost call layer first.
    pub trace: Vec<TraceLayer>,
    pub causes: Vec<RuntimeError>,
    /// Named values attached to the error, exposed as members of the error object.
    pub payload: Vec<(&'static str, Value)>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            value: None,
            trace: Vec::new(),
            causes: Vec::new(),
            payload: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_causes(mut self, causes: Vec<Self>) -> Self {
        self.causes = causes;
        self
    }

    #[must_use]
    pub fn with_payload(mut self, name: &'static str, value: Value) -> Self {
        self.payload.push((name, value));
        self
    }

    /// Appends the layer for a call frame the error is unwinding through.
    pub fn push_layer(&mut self, function: &str, args: Vec<Value>) {
        self.trace.push(TraceLayer {
            function: function.to_owned(),
            args,
        });
    }

    /// Returns the builtin error type, if this error was raised as one.
    #[must_use]
    pub fn builtin_kind(&self) -> Option<ExcType> {
        match self.kind {
            ErrorKind::Builtin(kind) => Some(kind),
            ErrorKind::Type(_) => None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Builtin(kind) => write!(f, "{kind}: {}", self.message),
            ErrorKind::Type(_) => f.write_str(&self.message),
        }
    }
}

/// Runtime error types that can occur during execution.
///
/// Three variants:
/// - `Internal`: bug in the interpreter or malformed bytecode (never catchable)
/// - `Exc`: runtime error that can be caught by try/catch
/// - `Uncatchable`: runtime error from resource limits that bypasses catch blocks
#[derive(Debug)]
pub(crate) enum RunError {
    Internal(Cow<'static, str>),
    Exc(Box<RuntimeError>),
    Uncatchable(Box<RuntimeError>),
}

impl From<RuntimeError> for RunError {
    fn from(err: RuntimeError) -> Self {
        Self::Exc(Box::new(err))
    }
}

impl RunError {
    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is a catchable error raised as exactly `exc_type`.
    #[must_use]
    pub fn is_exception_type(&self, exc_type: ExcType) -> bool {
        match self {
            Self::Exc(exc) => exc.builtin_kind() == Some(exc_type),
            _ => false,
        }
    }

    /// Adds a call layer to errors carrying a trace; internal errors pass through.
    #[must_use]
    pub fn with_layer(mut self, function: &str, args: &[Value]) -> Self {
        if let Self::Exc(exc) | Self::Uncatchable(exc) = &mut self {
            exc.push_layer(function, args.to_vec());
        }
        self
    }
}
