//! Native builtins and the registration table that installs them.
//!
//! Every native capability is declared as a [`NativeMethod`]: a member name,
//! a parameter list and a function pointer. At startup [`install`] creates the
//! builtin Types and the materialized error Types, converts each declaration
//! into an ordinary function object, checks special-method arities against
//! the [`SpecialMethods`] table and stores the result in the owning Type's
//! member table. Global functions go into the builtins scope, which is the
//! outermost scope of every program.

mod base;
mod isinstance;
mod iter;
mod len;
mod print;
mod raw;
mod type_;

use smallvec::smallvec;
use strum::IntoEnumIterator;

use crate::{
    exception_private::ExcType,
    exception_public::RegistrationError,
    function::{Function, FunctionKind, NativeFn, NativeFunction},
    heap::{Heap, ScopeId},
    signature::{Param, Signature},
    special::SpecialMethods,
    types::{self, BuiltinType, allocate_type},
    value::{ObjectData, Value},
};

/// Literal default of a native parameter.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NativeDefault {
    Null,
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

/// Declared parameter of a native method.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NativeParam {
    pub name: &'static str,
    pub ty: Option<BuiltinType>,
    pub default: Option<NativeDefault>,
    pub rest: bool,
}

impl NativeParam {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            ty: None,
            default: None,
            rest: false,
        }
    }

    pub const fn typed(name: &'static str, ty: BuiltinType) -> Self {
        Self {
            name,
            ty: Some(ty),
            default: None,
            rest: false,
        }
    }

    pub const fn default(self, default: NativeDefault) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    pub const fn rest(self) -> Self {
        Self { rest: true, ..self }
    }
}

/// A native member or global function.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NativeMethod {
    pub name: &'static str,
    pub params: &'static [NativeParam],
    pub func: NativeFn,
}

/// Declares a [`NativeMethod`] in a const table.
macro_rules! native {
    ($name:literal, [$($param:expr),* $(,)?], $func:expr) => {
        $crate::builtins::NativeMethod {
            name: $name,
            params: &[$($param),*],
            func: $func,
        }
    };
}
pub(crate) use native;

const GLOBALS: &[NativeMethod] = &[
    native!("print", [NativeParam::new("values").rest()], print::builtin_print),
    native!("typeof", [NativeParam::new("value")], type_::builtin_typeof),
    native!("nameof", [NativeParam::new("value")], type_::builtin_nameof),
    native!("mro", [NativeParam::typed("type", BuiltinType::Type)], type_::builtin_mro),
    native!(
        "isinstance",
        [NativeParam::new("value"), NativeParam::typed("type", BuiltinType::Type)],
        isinstance::builtin_isinstance
    ),
    native!("len", [NativeParam::new("value")], len::builtin_len),
    native!("iter", [NativeParam::new("value")], iter::builtin_iter),
    native!("next", [NativeParam::new("iterator")], iter::builtin_next),
    native!(
        "base",
        [NativeParam::typed("type", BuiltinType::Type), NativeParam::new("value")],
        base::builtin_base
    ),
    native!(
        "rawget",
        [NativeParam::new("value"), NativeParam::typed("name", BuiltinType::String)],
        raw::builtin_rawget
    ),
    native!(
        "rawset",
        [
            NativeParam::new("value"),
            NativeParam::typed("name", BuiltinType::String),
            NativeParam::new("member")
        ],
        raw::builtin_rawset
    ),
    native!(
        "hasmember",
        [NativeParam::new("value"), NativeParam::typed("name", BuiltinType::String)],
        raw::builtin_hasmember
    ),
];

/// Native members of each builtin Type.
fn type_methods(kind: BuiltinType) -> &'static [NativeMethod] {
    match kind {
        BuiltinType::Object | BuiltinType::BaseView => &[],
        BuiltinType::Type => types::TYPE_METHODS,
        BuiltinType::Null => types::NULL_METHODS,
        BuiltinType::Bool => types::BOOL_METHODS,
        BuiltinType::Num => types::NUM_METHODS,
        BuiltinType::Int => types::INT_METHODS,
        BuiltinType::String => types::STRING_METHODS,
        BuiltinType::List => types::LIST_METHODS,
        BuiltinType::Map => types::MAP_METHODS,
        BuiltinType::Range => types::RANGE_METHODS,
        BuiltinType::Function => crate::function::FUNCTION_METHODS,
        BuiltinType::Iterator => types::ITERATOR_METHODS,
        BuiltinType::Generator => types::GENERATOR_METHODS,
    }
}

/// Creates the builtin and error Types, registers every native member and
/// returns the builtins scope.
///
/// # Errors
/// A declaration whose parameter list is malformed, or whose arity does not
/// fit the special-method table, is reported as a [`RegistrationError`].
pub(crate) fn install(heap: &mut Heap, specials: &SpecialMethods) -> Result<ScopeId, RegistrationError> {
    let mut builtin_types: Vec<Value> = Vec::new();
    for kind in BuiltinType::iter() {
        let parents = match kind.parent() {
            Some(parent) => smallvec![builtin_types[parent as usize]],
            None => smallvec![],
        };
        let ty = allocate_type(heap, &kind.to_string(), parents, Some(kind)).map_err(alloc_failed)?;
        builtin_types.push(ty);
    }

    let mut exc_types: Vec<Value> = Vec::new();
    for kind in ExcType::iter() {
        let parent = match kind.parent() {
            Some(parent) => exc_types[parent as usize],
            None => builtin_types[BuiltinType::Object as usize],
        };
        let ty = allocate_type(heap, kind.into(), smallvec![parent], None).map_err(alloc_failed)?;
        exc_types.push(ty);
    }
    heap.set_builtin_types(builtin_types.clone(), exc_types.clone());

    for kind in BuiltinType::iter() {
        register(heap, specials, builtin_types[kind as usize], type_methods(kind))?;
    }
    register(heap, specials, exc_types[ExcType::Error as usize], types::ERROR_METHODS)?;

    let scope = heap.allocate_scope(None).map_err(alloc_failed)?;
    for kind in BuiltinType::iter() {
        heap.scope_define(scope, &kind.to_string(), builtin_types[kind as usize]);
    }
    for kind in ExcType::iter() {
        heap.scope_define(scope, kind.into(), exc_types[kind as usize]);
    }
    for method in GLOBALS {
        let function = native_function(heap, specials, "builtins", method)?;
        heap.scope_define(scope, method.name, function);
    }
    Ok(scope)
}

/// Registers native members on a Type.
pub(crate) fn register(
    heap: &mut Heap,
    specials: &SpecialMethods,
    ty: Value,
    methods: &[NativeMethod],
) -> Result<(), RegistrationError> {
    let owner = heap.type_name_of_type(ty).to_owned();
    for method in methods {
        let function = native_function(heap, specials, &owner, method)?;
        heap.get_mut(ty).members.insert(method.name.to_owned(), function);
    }
    Ok(())
}

fn native_function(
    heap: &mut Heap,
    specials: &SpecialMethods,
    owner: &str,
    method: &NativeMethod,
) -> Result<Value, RegistrationError> {
    let mut params = Vec::with_capacity(method.params.len());
    for declared in method.params {
        let mut param = Param::new(declared.name);
        if let Some(ty) = declared.ty {
            param = param.with_type(heap.builtin(ty));
        }
        if let Some(default) = declared.default {
            let value = match default {
                NativeDefault::Null => heap.null(),
                NativeDefault::Bool(b) => heap.bool_value(b),
                NativeDefault::Int(i) => heap.int(i).map_err(alloc_failed)?,
                NativeDefault::Str(s) => heap.string(s).map_err(alloc_failed)?,
            };
            param = param.with_default(value);
        }
        if declared.rest {
            param = param.rest();
        }
        params.push(param);
    }
    let signature =
        Signature::new(params).map_err(|err| RegistrationError::new(owner, method.name, err.to_string()))?;
    specials
        .validate(method.name, &signature)
        .map_err(|reason| RegistrationError::new(owner, method.name, reason))?;

    let function = Function::new(
        method.name,
        signature,
        FunctionKind::Native(NativeFunction(method.func)),
    );
    heap.allocate(ObjectData::Function(Box::new(function)))
        .map_err(alloc_failed)
}

fn alloc_failed(err: crate::exception_private::RunError) -> RegistrationError {
    RegistrationError::new("runtime", "bootstrap", format!("{err:?}"))
}
