#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("type {0} is not registered")]
    UnknownType(String),
    #[error("conflicting registration for type {0}")]
    ConflictingRegistration(String),
    #[error("no wrapper is registered for foreign type {0}")]
    NoWrapper(&'static str),
    #[error("{type_id} is missing field {field:?}")]
    MissingField { type_id: String, field: String },
    #[error("field {field:?} of {type_id} is not the expected {expected}")]
    FieldType {
        type_id: String,
        field: String,
        expected: &'static str,
    },
    #[error("packing exceeded the maximum nesting depth of {0}")]
    PackingDepth(usize),
    #[error("packed input is truncated")]
    Truncated,
    #[error("unknown tag {0:#04x} in packed input")]
    BadTag(u8),
    #[error("packed string is not UTF-8")]
    BadString(#[from] std::str::Utf8Error),
    #[error("packed float is not in canonical form")]
    BadFloat,
    #[error("packed negative integer {0} is not negative")]
    BadInt(i64),
    #[error("packed object keys are not in ascending order")]
    UnsortedKeys,
    #[error("packed input has {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("invalid digest {0:?}")]
    BadDigest(String),
    #[error("invalid type-id text: {0}")]
    BadTypeId(String),
}
