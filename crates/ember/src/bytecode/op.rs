//! Opcode definitions.
//!
//! Instructions address jump targets by symbolic tag rather than by offset, so
//! any bracketed region (function body, class body, try/catch/finally slice) can
//! be cut out and executed as its own sub-frame with its tags still valid.
//!
//! Stack effects are noted on each variant as `[before] -> [after]`, top of
//! stack on the right.

use serde::{Deserialize, Serialize};

/// One declared parameter of a function definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// The default value is supplied as an operand of `MakeFunction`.
    #[serde(default)]
    pub has_default: bool,
    /// Collects the remaining positional arguments as a list.
    #[serde(default)]
    pub rest: bool,
    /// Name of the declared Type, resolved in the defining scope.
    #[serde(default)]
    pub type_name: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_default: false,
            rest: false,
            type_name: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    #[must_use]
    pub fn rest(mut self) -> Self {
        self.rest = true;
        self
    }

    #[must_use]
    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

/// The closed set of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::IntoStaticStr)]
pub enum Opcode {
    // === Literals ===
    /// `[] -> [int]`
    PushInt(i64),
    /// `[] -> [num]`
    PushNum(f64),
    /// `[] -> [string]`
    PushStr(String),
    /// `[] -> [bool]`
    PushBool(bool),
    /// `[] -> [null]`
    PushNull,

    // === Stack ===
    /// Discards the top `n` values.
    Pop(usize),
    /// `[a] -> [a, a]`
    Dup,
    /// `[a, b] -> [b, a]`
    Swap,
    /// `[item1..itemN] -> [list]`
    BuildList(usize),
    /// `[key1, value1..keyN, valueN] -> [map]`, `N` counts pairs.
    BuildMap(usize),

    // === Variables ===
    /// `[] -> [value]`, resolved outward through the scope chain.
    GetVar(String),
    /// `[value] -> []`, binds in the current scope.
    DefineVar(String),
    /// `[value] -> []`, rebinds the nearest existing binding.
    SetVar(String),
    /// Removes a binding from the current scope.
    DeleteVar(String),

    // === Members ===
    /// `[obj] -> [member]`
    GetMember(String),
    /// `[obj, value] -> []`
    SetMember(String),
    /// `[obj] -> []`
    DeleteMember(String),

    // === Calls ===
    /// `[callee, arg1..argN] -> [result]`
    Call(usize),
    /// `[callee, list] -> [result]`, the list elements become the arguments.
    CallSpread,
    /// `[arg1..argN] -> [result]`, dispatched through the special-method table.
    Operator { name: String, argc: usize },

    // === Scopes ===
    /// Makes a new scope nested in the current one current.
    EnterScope,
    /// Returns to the outer scope of the current one.
    ExitScope,

    // === Control flow ===
    Jump(String),
    /// `[cond] -> []`
    JumpIfTrue(String),
    /// `[cond] -> []`
    JumpIfFalse(String),
    /// `[value, type] -> [value]`, jumps to the tag when `value` is not an instance of `type`.
    TypeTest(String),
    /// `[value] -> [bool]`
    Not,
    /// `[a, b] -> [bool]`, reference equality.
    Is,
    /// `[iterator] -> [iterator, item]`, or `[]` and a jump to the tag once exhausted.
    IterNext(String),

    // === Definitions ===
    /// Opens a bracketed body; execution skips to the instruction after `end`.
    BodyStart { end: String },
    /// Closes a bracketed body; a no-op when reached.
    BodyEnd,
    /// `[default1..defaultN] -> [function]`, `body` is the tag of the body's `BodyStart`.
    MakeFunction {
        name: String,
        body: String,
        params: Vec<ParamSpec>,
        #[serde(default)]
        generator: bool,
    },
    /// `[parent1..parentN] -> [type]`, runs the class body in a new scope.
    MakeClass { name: String, body: String, parents: usize },

    // === Exceptions and generators ===
    /// `[error] -> !`
    Throw,
    /// Runs the `{block}.try`, `{block}.catch` and `{block}.finally` bodies.
    ///
    /// The caught error is bound to `binding` in the catch scope; `None` discards it.
    Try { block: String, binding: Option<String> },
    /// `[value] -> !`, sets the frame's return value.
    Return,
    /// `[value] -> []`, suspends the enclosing generator frame.
    Yield,
    Nop,
}

impl Opcode {
    /// Name of the opcode for tracing.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Whether executing the opcode can run nested frames or host callbacks.
    #[must_use]
    pub fn runs_code(&self) -> bool {
        matches!(
            self,
            Self::GetMember(_)
                | Self::SetMember(_)
                | Self::DeleteMember(_)
                | Self::Call(_)
                | Self::CallSpread
                | Self::Operator { .. }
                | Self::JumpIfTrue(_)
                | Self::JumpIfFalse(_)
                | Self::Not
                | Self::IterNext(_)
                | Self::MakeClass { .. }
                | Self::Try { .. }
        )
    }
}

/// An opcode with an optional symbolic tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Opcode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Instruction {
    pub fn new(op: Opcode) -> Self {
        Self { op, tag: None }
    }

    pub fn tagged(op: Opcode, tag: impl Into<String>) -> Self {
        Self {
            op,
            tag: Some(tag.into()),
        }
    }
}

impl From<Opcode> for Instruction {
    fn from(op: Opcode) -> Self {
        Self::new(op)
    }
}
