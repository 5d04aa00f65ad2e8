//! Runtime value handles and the per-object data layout.
//!
//! Every runtime value, including primitives, lives on the [`Heap`](crate::heap::Heap)
//! and is referred to through a copyable [`Value`] handle. Each object carries an
//! optional explicit Type, an own member table, and kind-specific [`ObjectData`].

use std::fmt;

use indexmap::IndexMap;

use crate::{
    function::Function,
    heap::{HeapId, ScopeId},
    types::{BaseView, ErrorData, Generator, Map, NativeIter, Range, TypeData},
};

/// Handle to a runtime object.
///
/// Handles are only meaningful for the runtime that produced them. Equality
/// is object identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(pub(crate) HeapId);

impl Value {
    #[inline]
    pub(crate) fn id(self) -> HeapId {
        self.0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.0.index())
    }
}

/// Ordered member table of an object.
pub(crate) type Members = IndexMap<String, Value, ahash::RandomState>;

/// A heap-resident object.
#[derive(Debug)]
pub(crate) struct HeapObject {
    /// Explicit Type of the object. `None` means the static Type of its data kind.
    pub type_id: Option<Value>,
    pub members: Members,
    pub data: ObjectData,
}

impl HeapObject {
    pub fn new(data: ObjectData, type_id: Option<Value>) -> Self {
        Self {
            type_id,
            members: Members::default(),
            data,
        }
    }
}

/// Kind-specific payload of a heap object.
#[derive(Debug, strum::IntoStaticStr)]
pub(crate) enum ObjectData {
    /// Plain instance of a user-defined (or `object`) Type, state lives in members.
    Plain,
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    List(Vec<Value>),
    Map(Map),
    Range(Range),
    Type(Box<TypeData>),
    Function(Box<Function>),
    /// Delegating view produced by `base(T, obj)`.
    BaseView(BaseView),
    Iterator(NativeIter),
    Generator(Box<Generator>),
    Error(Box<ErrorData>),
}

impl ObjectData {
    /// Collects every heap reference held by this payload for garbage collection.
    pub fn collect_refs(&self, objects: &mut Vec<Value>, scopes: &mut Vec<ScopeId>) {
        match self {
            Self::Plain | Self::Null | Self::Bool(_) | Self::Int(_) | Self::Num(_) | Self::Str(_) | Self::Range(_) => {}
            Self::List(items) => objects.extend(items.iter().copied()),
            Self::Map(map) => map.collect_refs(objects),
            Self::Type(ty) => {
                objects.extend(ty.parents.iter().copied());
                objects.extend(ty.mro.iter().copied());
            }
            Self::Function(func) => func.collect_refs(objects, scopes),
            Self::BaseView(view) => {
                objects.push(view.instance);
                objects.push(view.after);
            }
            Self::Iterator(iter) => iter.collect_refs(objects),
            Self::Generator(generator) => {
                if let Some(frame) = &generator.frame {
                    frame.collect_refs(objects, scopes);
                }
            }
            Self::Error(error) => error.collect_refs(objects),
        }
    }
}

