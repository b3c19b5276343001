/// A Resource is a typed record with named fields: the atomic unit of
/// persistence. Implementations enumerate their fields in declared order
/// and can be rebuilt from a by-name field mapping, which is everything
/// the canonical packer and the store need from them.
pub trait Resource: Sized + Send + Sync + 'static {
    /// Stable, fully-qualified type name, e.g. "enact.Invocation".
    fn type_name() -> &'static str;

    /// Optional namespace for versioned distributions of this type.
    /// None means the ambient process's definition.
    fn distribution_key() -> Option<&'static str> {
        None
    }

    /// Field names in declared order.
    fn field_names() -> &'static [&'static str];

    /// Field values, aligned with field_names().
    fn field_values(&self) -> Vec<Value>;

    /// Rebuild an instance from a by-name field mapping.
    fn from_fields(fields: FieldMap) -> Result<Self, Error>;

    /// The registered TypeId of this resource type.
    fn type_id() -> TypeId {
        TypeId::new(Self::type_name(), Self::distribution_key())
    }
}

mod value;
pub use value::Value;

// All Values may be deeply compared with one another.
mod compare;
pub use compare::compare;

// Record is the type-erased form of a Resource, and FieldMap is the
// by-name view handed to Resource::from_fields.
mod record;
pub use record::{FieldMap, Record};

// The process-wide registry of resource types and foreign-type wrappers.
pub mod registry;
pub use registry::{Descriptor, JsonValue, Registry, TypeId, Wrapper};

// Canonical packed encoding of resources, used for hashing and persistence.
pub mod pack;
pub use pack::{pack, unpack};

mod digest;
pub use digest::Digest;

mod refs;
pub use refs::Ref;

mod error;
pub use error::Error;

#[cfg(test)]
mod test {
    use super::{registry, FieldMap, Record, Resource, Value};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct MyResource {
        my_field: String,
        my_other_field: i64,
    }

    impl Resource for MyResource {
        fn type_name() -> &'static str {
            "test.MyResource"
        }
        fn field_names() -> &'static [&'static str] {
            &["my_field", "my_other_field"]
        }
        fn field_values(&self) -> Vec<Value> {
            vec![
                Value::from(self.my_field.as_str()),
                Value::from(self.my_other_field),
            ]
        }
        fn from_fields(mut fields: FieldMap) -> Result<Self, super::Error> {
            Ok(Self {
                my_field: fields.take_string("my_field")?,
                my_other_field: fields.take_i64("my_other_field")?,
            })
        }
    }

    #[test]
    fn test_erase_then_decode_round_trip() {
        registry::register::<MyResource>().unwrap();

        let fixture = MyResource {
            my_field: "hello".to_string(),
            my_other_field: 42,
        };

        let record = Record::of(&fixture);
        assert_eq!(record.type_id().to_string(), MyResource::type_id().to_string());
        assert_eq!(record.get("my_field"), Some(&Value::from("hello")));

        let recovered: MyResource = record.decode().unwrap();
        assert_eq!(fixture, recovered);
    }

    #[test]
    fn test_packed_round_trip() {
        registry::register::<MyResource>().unwrap();

        let record = Record::of(&MyResource {
            my_field: "hello".to_string(),
            my_other_field: -7,
        });

        let packed = super::pack(&record).unwrap();
        let recovered = super::unpack(&packed).unwrap();
        assert_eq!(record, recovered);
    }
}
