use super::{compare, Record, Ref, TypeId};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Value is the closed universe of field values a Resource may carry.
/// Signed and unsigned integers are split across NegInt and PosInt as
/// they are in wire encodings: NegInt holds strictly negative values,
/// so every mathematical integer has exactly one canonical representation.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    PosInt(u64),
    NegInt(i64),
    Float(f64),
    String(String),
    Bytes(bytes::Bytes),
    Array(Vec<Value>),
    /// String-keyed mapping. BTreeMap keeps keys in bytewise-ascending
    /// order, which is also the canonical hash order.
    Object(BTreeMap<String, Value>),
    /// A nested resource, in its type-erased form.
    Resource(Box<Record>),
    /// A reference to a registered type.
    TypeRef(TypeId),
    /// A reference into a store.
    Ref(Ref),
}

// Ints in canonical form: Neg is strictly negative.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Int {
    Neg(i64),
    Pos(u64),
}

pub(crate) fn canon_int(value: &Value) -> Option<Int> {
    match value {
        Value::PosInt(n) => Some(Int::Pos(*n)),
        Value::NegInt(n) if *n < 0 => Some(Int::Neg(*n)),
        Value::NegInt(n) => Some(Int::Pos(*n as u64)),
        _ => None,
    }
}

/// Map every NaN to the quiet-NaN bit pattern and -0.0 to +0.0, so that
/// structurally equal floats always hash identically.
pub(crate) fn canon_float(f: f64) -> f64 {
    if f.is_nan() {
        f64::from_bits(0x7ff8_0000_0000_0000)
    } else if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl Value {
    /// Build a canonical integer Value from a signed integer.
    pub fn int(n: i64) -> Self {
        if n < 0 {
            Self::NegInt(n)
        } else {
            Self::PosInt(n as u64)
        }
    }

    /// Build a canonical Float value.
    pub fn float(f: f64) -> Self {
        Self::Float(canon_float(f))
    }

    /// The kind of this value, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::PosInt(_) | Self::NegInt(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Resource(_) => "resource",
            Self::TypeRef(_) => "type-ref",
            Self::Ref(_) => "ref",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match canon_int(self)? {
            Int::Neg(n) => Some(n),
            Int::Pos(n) => i64::try_from(n).ok(),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match canon_int(self)? {
            Int::Neg(_) => None,
            Int::Pos(n) => Some(n),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(canon_float(*f)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&Ref> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Convert a serde_json::Value into a Value. Lossless for all JSON.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Self::PosInt(u)
                } else if let Some(i) = n.as_i64() {
                    Self::NegInt(i)
                } else {
                    Self::float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(a) => Self::Array(a.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(o) => Self::Object(
                o.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into a serde_json::Value, or None if this value contains a
    /// kind JSON cannot express (bytes, refs, type-refs, nested resources,
    /// or a non-finite float).
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::PosInt(n) => serde_json::json!(n),
            Self::NegInt(n) => serde_json::json!(n),
            Self::Float(f) => serde_json::Value::Number(serde_json::Number::from_f64(*f)?),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(a) => {
                serde_json::Value::Array(a.iter().map(Self::to_json).collect::<Option<_>>()?)
            }
            Self::Object(o) => serde_json::Value::Object(
                o.iter()
                    .map(|(k, v)| Some((k.clone(), v.to_json()?)))
                    .collect::<Option<_>>()?,
            ),
            Self::Bytes(_) | Self::Resource(_) | Self::TypeRef(_) | Self::Ref(_) => return None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}
impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(compare(self, other))
    }
}
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::int(n)
    }
}
impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::PosInt(n)
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::float(f)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}
impl From<bytes::Bytes> for Value {
    fn from(b: bytes::Bytes) -> Self {
        Self::Bytes(b)
    }
}
impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Self::Array(a)
    }
}
impl From<BTreeMap<String, Value>> for Value {
    fn from(o: BTreeMap<String, Value>) -> Self {
        Self::Object(o)
    }
}
impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Resource(Box::new(r))
    }
}
impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Self::Ref(r)
    }
}
impl From<TypeId> for Value {
    fn from(t: TypeId) -> Self {
        Self::TypeRef(t)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::PosInt(n) => write!(f, "{n}"),
            Self::NegInt(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "b\"{}\"", hex::encode(b)),
            Self::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::Object(o) => {
                write!(f, "{{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Resource(r) => write!(f, "{r}"),
            Self::TypeRef(t) => write!(f, "type:{}", t.name()),
            Self::Ref(r) => write!(f, "ref:{}", r.digest()),
        }
    }
}
