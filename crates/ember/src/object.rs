use std::fmt::{self, Write};

use ahash::AHashSet;

use crate::{
    exception_private::RunError,
    heap::{Heap, HeapId},
    resource::MAX_DATA_RECURSION_DEPTH,
    types::{Map, format_num, map_key},
    value::{ObjectData, Value},
};

/// A runtime value copied out for the host.
///
/// `Object` owns its data and can be cloned, compared and serialized without
/// the heap. Primitives, lists and maps convert both ways; the other variants
/// are snapshots of runtime objects and are output only.
///
/// # JSON
///
/// [`Object::to_json_value`] gives the natural mapping (`null`, booleans,
/// numbers, strings, arrays, objects keyed by the key's text form). Output-only
/// variants use `$`-prefixed tags such as `{"$type": "Point"}`. The derived
/// serde impls use the tagged enum form instead.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Object {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    List(Vec<Self>),
    /// Entries in insertion order.
    Map(Vec<(Self, Self)>),
    Range {
        start: i64,
        stop: i64,
        step: i64,
    },
    Type {
        name: String,
    },
    Function {
        name: String,
    },
    Error {
        type_name: String,
        message: String,
    },
    /// Instance of a user-defined Type and its own members.
    Instance {
        type_name: String,
        members: Vec<(String, Self)>,
    },
    Iterator,
    Generator {
        name: String,
    },
    /// A container already being converted, or one nested deeper than
    /// [`MAX_DATA_RECURSION_DEPTH`].
    Cycle(String),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            _ => self.repr_fmt(f),
        }
    }
}

impl Object {
    /// Snapshots a runtime value.
    pub(crate) fn from_value(value: Value, heap: &Heap) -> Self {
        let mut visiting = AHashSet::new();
        Self::from_value_inner(value, heap, &mut visiting, 0)
    }

    fn from_value_inner(value: Value, heap: &Heap, visiting: &mut AHashSet<HeapId>, depth: u16) -> Self {
        let object = heap.get(value);
        match &object.data {
            ObjectData::Null => return Self::Null,
            ObjectData::Bool(b) => return Self::Bool(*b),
            ObjectData::Int(i) => return Self::Int(*i),
            ObjectData::Num(n) => return Self::Num(*n),
            ObjectData::Str(s) => return Self::Str(s.clone()),
            ObjectData::Range(range) => {
                return Self::Range {
                    start: range.start,
                    stop: range.stop,
                    step: range.step,
                };
            }
            ObjectData::Type(ty) => return Self::Type { name: ty.name.clone() },
            ObjectData::Function(function) => {
                return Self::Function {
                    name: function.name.clone(),
                };
            }
            ObjectData::Iterator(_) => return Self::Iterator,
            ObjectData::Generator(generator) => {
                return Self::Generator {
                    name: generator.name.clone(),
                };
            }
            ObjectData::Error(_) => {
                let message = object
                    .members
                    .get("message")
                    .and_then(|&m| heap.as_str(m))
                    .unwrap_or_default()
                    .to_owned();
                return Self::Error {
                    type_name: heap.type_name(value).to_owned(),
                    message,
                };
            }
            ObjectData::Plain | ObjectData::BaseView(_) | ObjectData::List(_) | ObjectData::Map(_) => {}
        }

        if depth >= MAX_DATA_RECURSION_DEPTH || !visiting.insert(value.id()) {
            return Self::Cycle(cycle_placeholder(&object.data).to_owned());
        }
        let converted = match &object.data {
            ObjectData::List(items) => Self::List(
                items
                    .iter()
                    .map(|&item| Self::from_value_inner(item, heap, visiting, depth + 1))
                    .collect(),
            ),
            ObjectData::Map(map) => Self::Map(
                map.keys()
                    .zip(map.values())
                    .map(|(k, v)| {
                        (
                            Self::from_value_inner(k, heap, visiting, depth + 1),
                            Self::from_value_inner(v, heap, visiting, depth + 1),
                        )
                    })
                    .collect(),
            ),
            ObjectData::BaseView(view) => Self::from_value_inner(view.instance, heap, visiting, depth + 1),
            _ => Self::Instance {
                type_name: heap.type_name(value).to_owned(),
                members: object
                    .members
                    .iter()
                    .map(|(name, &member)| (name.clone(), Self::from_value_inner(member, heap, visiting, depth + 1)))
                    .collect(),
            },
        };
        visiting.remove(&value.id());
        converted
    }

    /// Allocates this object on the heap.
    ///
    /// # Errors
    /// Output-only variants are rejected with [`InvalidInputError::InvalidType`].
    pub(crate) fn to_value(self, heap: &mut Heap) -> Result<Value, InvalidInputError> {
        let value = match self {
            Self::Null => heap.null(),
            Self::Bool(b) => heap.bool_value(b),
            Self::Int(i) => heap.int(i)?,
            Self::Num(n) => heap.num(n)?,
            Self::Str(s) => heap.string(s)?,
            Self::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(item.to_value(heap)?);
                }
                heap.list(values)?
            }
            Self::Map(pairs) => {
                let mut map = Map::default();
                for (key, value) in pairs {
                    let key = key.to_value(heap)?;
                    let value = value.to_value(heap)?;
                    map.insert(map_key(heap, key), key, value);
                }
                heap.allocate(ObjectData::Map(map))?
            }
            other => return Err(InvalidInputError::invalid_type(other.type_name())),
        };
        Ok(value)
    }

    /// Text form with strings quoted, as shown inside containers.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut s = String::new();
        // Writing to a String never fails.
        let _ = self.repr_fmt(&mut s);
        s
    }

    fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Self::Int(i) => write!(f, "{i}"),
            Self::Num(n) => f.write_str(&format_num(*n)),
            Self::Str(s) => write!(f, "'{s}'"),
            Self::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.repr_fmt(f)?;
                }
                f.write_char(']')
            }
            Self::Map(pairs) => {
                f.write_char('{')?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    k.repr_fmt(f)?;
                    f.write_str(": ")?;
                    v.repr_fmt(f)?;
                }
                f.write_char('}')
            }
            Self::Range { start, stop, step } if *step == 1 => write!(f, "range({start}, {stop})"),
            Self::Range { start, stop, step } => write!(f, "range({start}, {stop}, {step})"),
            Self::Type { name } => write!(f, "<type {name}>"),
            Self::Function { name } => write!(f, "<function {name}>"),
            Self::Error { type_name, message } if message.is_empty() => f.write_str(type_name),
            Self::Error { type_name, message } => write!(f, "{type_name}: {message}"),
            Self::Instance { type_name, .. } => write!(f, "<{type_name} object>"),
            Self::Iterator => f.write_str("<iterator>"),
            Self::Generator { name } => write!(f, "<generator {name}>"),
            Self::Cycle(placeholder) => f.write_str(placeholder),
        }
    }

    /// Natural JSON form of the object.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::{Value as JV, json};
        match self {
            Self::Null => JV::Null,
            Self::Bool(b) => JV::Bool(*b),
            Self::Int(i) => json!(i),
            Self::Num(n) if n.is_finite() => json!(n),
            Self::Num(_) => JV::Null,
            Self::Str(s) => JV::String(s.clone()),
            Self::List(items) => JV::Array(items.iter().map(Self::to_json_value).collect()),
            Self::Map(pairs) => {
                let map: serde_json::Map<String, JV> = pairs
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Self::Str(s) => s.clone(),
                            other => other.repr(),
                        };
                        (key, v.to_json_value())
                    })
                    .collect();
                JV::Object(map)
            }
            Self::Range { start, stop, step } => json!({"$range": [start, stop, step]}),
            Self::Type { name } => json!({"$type": name}),
            Self::Function { name } => json!({"$function": name}),
            Self::Error { type_name, message } => json!({"$error": {"type": type_name, "message": message}}),
            Self::Instance { type_name, members } => {
                let fields: serde_json::Map<String, JV> =
                    members.iter().map(|(k, v)| (k.clone(), v.to_json_value())).collect();
                json!({"$instance": {"type": type_name, "members": fields}})
            }
            Self::Iterator => json!({"$iterator": true}),
            Self::Generator { name } => json!({"$generator": name}),
            Self::Cycle(placeholder) => json!({"$cycle": placeholder}),
        }
    }

    /// Truthiness of the builtin kinds; every other object is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Num(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(pairs) => !pairs.is_empty(),
            _ => true,
        }
    }

    /// Kind name of the variant.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Num(_) => "num",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Range { .. } => "range",
            Self::Type { .. } => "type",
            Self::Function { .. } => "function",
            Self::Error { .. } => "Error",
            Self::Instance { .. } => "instance",
            Self::Iterator => "iterator",
            Self::Generator { .. } => "generator",
            Self::Cycle(_) => "cycle",
        }
    }
}

fn cycle_placeholder(data: &ObjectData) -> &'static str {
    match data {
        ObjectData::List(_) => "[...]",
        ObjectData::Map(_) => "{...}",
        _ => "<...>",
    }
}

/// Error returned when an `Object` cannot be extracted as a Rust value.
#[derive(Debug)]
pub struct ConversionError {
    pub expected: &'static str,
    pub actual: &'static str,
}

impl ConversionError {
    #[must_use]
    pub fn new(expected: &'static str, actual: &'static str) -> Self {
        Self { expected, actual }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.actual)
    }
}

impl std::error::Error for ConversionError {}

/// Error returned when an `Object` cannot be moved into the runtime.
#[derive(Debug, Clone)]
pub enum InvalidInputError {
    /// The variant is output only.
    InvalidType(&'static str),
    /// A resource limit was exceeded while allocating.
    Resource(String),
}

impl InvalidInputError {
    #[must_use]
    pub fn invalid_type(type_name: &'static str) -> Self {
        Self::InvalidType(type_name)
    }
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidType(type_name) => write!(f, "'{type_name}' is not a valid input value"),
            Self::Resource(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for InvalidInputError {}

impl From<RunError> for InvalidInputError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Internal(msg) => Self::Resource(msg.into_owned()),
            RunError::Exc(exc) | RunError::Uncatchable(exc) => Self::Resource(exc.to_string()),
        }
    }
}

impl TryFrom<&Object> for i64 {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Int(i) => Ok(*i),
            _ => Err(ConversionError::new("int", value.type_name())),
        }
    }
}

/// Ints widen to `f64`.
impl TryFrom<&Object> for f64 {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Num(n) => Ok(*n),
            Object::Int(i) => Ok(*i as Self),
            _ => Err(ConversionError::new("num", value.type_name())),
        }
    }
}

impl TryFrom<&Object> for String {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Str(s) => Ok(s.clone()),
            _ => Err(ConversionError::new("string", value.type_name())),
        }
    }
}

/// Only `Bool` converts; this is not truthiness.
impl TryFrom<&Object> for bool {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Bool(b) => Ok(*b),
            _ => Err(ConversionError::new("bool", value.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NoLimitTracker;

    #[test]
    fn self_referencing_list_becomes_a_cycle() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let one = heap.int(1).unwrap();
        let list = heap.list(vec![one]).unwrap();
        if let ObjectData::List(items) = &mut heap.get_mut(list).data {
            items.push(list);
        }
        let object = Object::from_value(list, &heap);
        assert_eq!(object, Object::List(vec![Object::Int(1), Object::Cycle("[...]".to_owned())]));
        assert_eq!(object.repr(), "[1, [...]]");
    }

    #[test]
    fn maps_round_trip_through_the_heap() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let input = Object::Map(vec![
            (Object::Str("a".to_owned()), Object::Int(1)),
            (Object::Int(2), Object::List(vec![Object::Null])),
        ]);
        let value = input.clone().to_value(&mut heap).unwrap();
        assert_eq!(Object::from_value(value, &heap), input);
        assert_eq!(input.to_json_value(), serde_json::json!({"a": 1, "2": [null]}));
    }

    #[test]
    fn output_only_variants_are_rejected() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let err = Object::Type { name: "T".to_owned() }.to_value(&mut heap).unwrap_err();
        assert_eq!(err.to_string(), "'type' is not a valid input value");
    }
}
