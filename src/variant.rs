//! Dynamically typed values passed to and returned from callables.

use indexmap::IndexMap;

use crate::id::ObjectId;

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// No value.
    #[default]
    Nil,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Reference to an object by id.
    Object(ObjectId),
    /// Ordered list of values.
    Array(Vec<Variant>),
    /// Insertion-ordered string-keyed map.
    Dictionary(IndexMap<String, Variant>),
}

/// Type tag of a [`Variant`], used by argument declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariantType {
    /// Accepts any value.
    #[default]
    Nil,
    /// [`Variant::Bool`].
    Bool,
    /// [`Variant::Int`].
    Int,
    /// [`Variant::Float`].
    Float,
    /// [`Variant::String`].
    String,
    /// [`Variant::Object`].
    Object,
    /// [`Variant::Array`].
    Array,
    /// [`Variant::Dictionary`].
    Dictionary,
}

impl Variant {
    /// Type tag of this value.
    pub fn get_type(&self) -> VariantType {
        match self {
            Variant::Nil => VariantType::Nil,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::Object(_) => VariantType::Object,
            Variant::Array(_) => VariantType::Array,
            Variant::Dictionary(_) => VariantType::Dictionary,
        }
    }

    /// Whether this is [`Variant::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    /// The integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    /// The object id payload, if any.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Variant::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Look up a key of a dictionary value.
    pub fn get(&self, key: &str) -> Option<&Variant> {
        match self {
            Variant::Dictionary(map) => map.get(key),
            _ => None,
        }
    }
}

impl VariantType {
    /// Integer code of the type, as exposed in introspection dictionaries.
    pub fn code(self) -> i64 {
        self as i64
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(i64::from(v))
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::Int(i64::from(v))
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Float(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_owned())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

impl From<ObjectId> for Variant {
    fn from(v: ObjectId) -> Self {
        Variant::Object(v)
    }
}

impl From<Vec<Variant>> for Variant {
    fn from(v: Vec<Variant>) -> Self {
        Variant::Array(v)
    }
}

impl From<IndexMap<String, Variant>> for Variant {
    fn from(v: IndexMap<String, Variant>) -> Self {
        Variant::Dictionary(v)
    }
}
