use super::{Error, Ref, Resource, TypeId, Value};
use std::collections::BTreeMap;

/// Record is the type-erased form of a Resource: its TypeId plus its
/// (name, value) fields in declared order. Nested resources inside a
/// Value are always Records, which keeps the value universe closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_id: TypeId,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_id: TypeId, fields: Vec<(String, Value)>) -> Self {
        Self { type_id, fields }
    }

    /// Erase a typed Resource into its Record form.
    pub fn of<T: Resource>(resource: &T) -> Self {
        let fields = T::field_names()
            .iter()
            .map(|name| name.to_string())
            .zip(resource.field_values())
            .collect();
        Self {
            type_id: T::type_id(),
            fields,
        }
    }

    /// Rebuild the typed Resource this Record erases.
    pub fn decode<T: Resource>(&self) -> Result<T, Error> {
        if self.type_id != T::type_id() {
            return Err(Error::UnknownType(format!(
                "cannot decode {} as {}",
                self.type_id,
                T::type_id(),
            )));
        }
        T::from_fields(FieldMap::new(self))
    }

    pub fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Replace the named field's value, returning false if no such field.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{{", self.type_id.name())?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// FieldMap is the by-name view of a Record's fields handed to
/// Resource::from_fields. Its take_* accessors move values out and
/// produce typed errors on absent or mismatched fields.
pub struct FieldMap {
    type_id: TypeId,
    map: BTreeMap<String, Value>,
}

impl FieldMap {
    fn new(record: &Record) -> Self {
        Self {
            type_id: record.type_id.clone(),
            map: record.fields.iter().cloned().collect(),
        }
    }

    /// Remove and return the named field.
    pub fn take(&mut self, name: &str) -> Result<Value, Error> {
        self.map.remove(name).ok_or_else(|| Error::MissingField {
            type_id: self.type_id.to_string(),
            field: name.to_string(),
        })
    }

    fn mismatch(&self, name: &str, expected: &'static str) -> Error {
        Error::FieldType {
            type_id: self.type_id.to_string(),
            field: name.to_string(),
            expected,
        }
    }

    pub fn take_bool(&mut self, name: &str) -> Result<bool, Error> {
        match self.take(name)? {
            Value::Bool(b) => Ok(b),
            _ => Err(self.mismatch(name, "bool")),
        }
    }

    pub fn take_i64(&mut self, name: &str) -> Result<i64, Error> {
        let value = self.take(name)?;
        value.as_i64().ok_or_else(|| self.mismatch(name, "int"))
    }

    pub fn take_u64(&mut self, name: &str) -> Result<u64, Error> {
        let value = self.take(name)?;
        value.as_u64().ok_or_else(|| self.mismatch(name, "uint"))
    }

    pub fn take_f64(&mut self, name: &str) -> Result<f64, Error> {
        let value = self.take(name)?;
        value.as_f64().ok_or_else(|| self.mismatch(name, "float"))
    }

    pub fn take_string(&mut self, name: &str) -> Result<String, Error> {
        match self.take(name)? {
            Value::String(s) => Ok(s),
            _ => Err(self.mismatch(name, "string")),
        }
    }

    pub fn take_bytes(&mut self, name: &str) -> Result<bytes::Bytes, Error> {
        match self.take(name)? {
            Value::Bytes(b) => Ok(b),
            _ => Err(self.mismatch(name, "bytes")),
        }
    }

    pub fn take_array(&mut self, name: &str) -> Result<Vec<Value>, Error> {
        match self.take(name)? {
            Value::Array(a) => Ok(a),
            _ => Err(self.mismatch(name, "array")),
        }
    }

    pub fn take_object(&mut self, name: &str) -> Result<BTreeMap<String, Value>, Error> {
        match self.take(name)? {
            Value::Object(o) => Ok(o),
            _ => Err(self.mismatch(name, "object")),
        }
    }

    pub fn take_record(&mut self, name: &str) -> Result<Record, Error> {
        match self.take(name)? {
            Value::Resource(r) => Ok(*r),
            _ => Err(self.mismatch(name, "resource")),
        }
    }

    pub fn take_type_ref(&mut self, name: &str) -> Result<TypeId, Error> {
        match self.take(name)? {
            Value::TypeRef(t) => Ok(t),
            _ => Err(self.mismatch(name, "type-ref")),
        }
    }

    pub fn take_ref(&mut self, name: &str) -> Result<Ref, Error> {
        match self.take(name)? {
            Value::Ref(r) => Ok(r),
            _ => Err(self.mismatch(name, "ref")),
        }
    }

    /// A Ref field that may also be null.
    pub fn take_opt_ref(&mut self, name: &str) -> Result<Option<Ref>, Error> {
        match self.take(name)? {
            Value::Null => Ok(None),
            Value::Ref(r) => Ok(Some(r)),
            _ => Err(self.mismatch(name, "ref or null")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> Record {
        Record::new(
            TypeId::new("test.Fixture", None),
            vec![
                ("a".to_string(), Value::from(1i64)),
                ("b".to_string(), Value::from("two")),
                ("c".to_string(), Value::Null),
            ],
        )
    }

    #[test]
    fn test_get_and_set() {
        let mut record = fixture();
        assert_eq!(record.get("b"), Some(&Value::from("two")));
        assert_eq!(record.get("nope"), None);

        assert!(record.set("b", Value::from("三")));
        assert!(!record.set("nope", Value::Null));
        assert_eq!(record.get("b"), Some(&Value::from("三")));
    }

    #[test]
    fn test_field_map_errors() {
        let record = fixture();
        let mut fields = FieldMap::new(&record);

        assert_eq!(fields.take_i64("a").unwrap(), 1);
        // Second take of the same field is a missing-field error.
        assert!(matches!(
            fields.take_i64("a"),
            Err(Error::MissingField { .. })
        ));
        // Kind mismatch.
        assert!(matches!(
            fields.take_u64("b"),
            Err(Error::FieldType { expected: "uint", .. })
        ));
        // Null is allowed where an optional Ref is expected.
        assert_eq!(fields.take_opt_ref("c").unwrap(), None);
    }
}
