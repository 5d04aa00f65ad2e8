//! Native backing state for the builtin object kinds.

mod class;
mod error;
mod generator;
mod iter;
mod list;
mod map;
mod number;
mod range;
mod string;

pub(crate) use class::{BaseView, TYPE_METHODS, TypeData, allocate_type, mro_after};
pub(crate) use error::{ERROR_METHODS, ErrorData, collect_error_refs};
pub(crate) use generator::{GENERATOR_METHODS, Generator, GeneratorState};
pub(crate) use iter::{ITERATOR_METHODS, NativeIter};
pub(crate) use list::LIST_METHODS;
pub(crate) use map::{MAP_METHODS, Map, map_key};
pub(crate) use number::{BOOL_METHODS, INT_METHODS, NULL_METHODS, NUM_METHODS, format_num};
pub(crate) use range::{RANGE_METHODS, Range};
pub(crate) use string::STRING_METHODS;

/// The Types the runtime installs at startup, one per builtin data kind.
///
/// The `Display` form is the name the Type is bound to in the builtins scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum BuiltinType {
    /// Universal root of every MRO.
    Object,
    /// Type of every Type.
    Type,
    Null,
    Bool,
    Num,
    Int,
    String,
    List,
    Map,
    Range,
    Function,
    Iterator,
    Generator,
    /// Type of the views returned by `base(T, obj)`.
    #[strum(serialize = "baseview")]
    BaseView,
}

impl BuiltinType {
    /// The single parent of this builtin Type, `None` for the root.
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Object => None,
            Self::Int => Some(Self::Num),
            _ => Some(Self::Object),
        }
    }
}
