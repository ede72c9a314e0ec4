use std::fmt;

use crate::{
    heap::{Heap, HeapData, HeapId},
    value::{Value, format_number},
};

/// A language value that can be passed to or returned from the interpreter.
///
/// This is the public-facing type for values at the embedding boundary. It
/// owns all its data and can be freely cloned or stored; unlike the internal
/// `Value` type it does not require the heap for any operation, which also
/// means converting a container copies it deeply and severs aliasing.
///
/// Most variants work both as inputs (arguments to
/// [`Engine::invoke`](crate::Engine::invoke)) and outputs. `Repr` is
/// output-only: it is the fallback rendering for values with no direct
/// `Object` mapping (natives).
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// The "no value" sentinel.
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Ordered sequence, deep-copied.
    Array(Vec<Object>),
    /// Keyed record in insertion order, deep-copied.
    Blob(Vec<(String, Object)>),
    /// User-defined object instance: type name plus members in order.
    Instance {
        type_name: String,
        members: Vec<(String, Object)>,
    },
    /// Fallback for values that cannot be represented as other variants.
    /// Output-only.
    Repr(String),
}

impl Object {
    /// Converts a `Value` into an `Object`, releasing the value's container
    /// reference. Containers are copied deeply; a handle that is reached
    /// again while its own conversion is in progress (a cycle) renders as a
    /// `Repr` placeholder.
    pub(crate) fn from_value(value: Value, heap: &mut Heap) -> Self {
        let mut path = Vec::new();
        let object = Self::convert(&value, heap, &mut path);
        value.drop_with_heap(heap);
        object
    }

    fn convert(value: &Value, heap: &Heap, path: &mut Vec<HeapId>) -> Self {
        match value {
            Value::Empty => Self::Empty,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(*n),
            Value::Text(s) => Self::Text(s.clone()),
            Value::Ref(id) => {
                if path.contains(id) {
                    return Self::Repr(match heap.get(*id) {
                        HeapData::Array(_) => "[...]".to_owned(),
                        _ => "{...}".to_owned(),
                    });
                }
                path.push(*id);
                let object = match heap.get(*id) {
                    HeapData::Blob(map) => Self::Blob(
                        map.iter()
                            .map(|(k, v)| (k.clone(), Self::convert(v, heap, path)))
                            .collect(),
                    ),
                    HeapData::Array(values) => {
                        Self::Array(values.iter().map(|v| Self::convert(v, heap, path)).collect())
                    }
                    HeapData::Instance(instance) => Self::Instance {
                        type_name: instance.type_name.clone(),
                        members: instance
                            .members
                            .iter()
                            .map(|(k, v)| (k.clone(), Self::convert(v, heap, path)))
                            .collect(),
                    },
                    HeapData::Native(native) => Self::Repr(format!("<native {}>", native.type_name())),
                };
                path.pop();
                object
            }
        }
    }

    /// Converts this object into a `Value`, allocating containers on the
    /// heap. The caller owns the returned reference.
    pub(crate) fn into_value(self, heap: &mut Heap) -> Value {
        match self {
            Self::Empty => Value::Empty,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(n),
            Self::Text(s) => Value::Text(s),
            Self::Repr(s) => Value::Text(s),
            Self::Array(items) => {
                let values = items.into_iter().map(|item| item.into_value(heap)).collect();
                Value::Ref(heap.alloc_array(values))
            }
            Self::Blob(fields) => {
                let id = heap.alloc_blob();
                for (name, object) in fields {
                    let value = object.into_value(heap);
                    let old = match heap.get_mut(id) {
                        HeapData::Blob(map) => map.insert(name, value),
                        _ => None,
                    };
                    if let Some(old) = old {
                        old.drop_with_heap(heap);
                    }
                }
                Value::Ref(id)
            }
            Self::Instance { type_name, members } => {
                let id = heap.alloc_instance(type_name);
                for (name, object) in members {
                    let value = object.into_value(heap);
                    let old = match heap.get_mut(id) {
                        HeapData::Instance(instance) => instance.members.insert(name, value),
                        _ => None,
                    };
                    if let Some(old) = old {
                        old.drop_with_heap(heap);
                    }
                }
                Value::Ref(id)
            }
        }
    }
}

impl fmt::Display for Object {
    /// Renders the object the way the language's string coercion does.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("undefined"),
            Self::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) | Self::Repr(s) => f.write_str(s),
            Self::Array(items) => {
                f.write_str("[ ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(" ]")
            }
            Self::Blob(fields) => write_fields(f, None, fields),
            Self::Instance { type_name, members } => write_fields(f, Some(type_name), members),
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, type_name: Option<&str>, fields: &[(String, Object)]) -> fmt::Result {
    if let Some(name) = type_name {
        write!(f, "{name} ")?;
    }
    f.write_str("{ ")?;
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key} : {value}")?;
    }
    f.write_str(" }")
}
