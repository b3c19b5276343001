use super::{Error, FieldMap, Record, Resource, Value};
use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

/// TypeId names a registered resource type. Its canonical encoding is the
/// JSON object text {"name": <name>, "distribution_key": <key|null>},
/// with exactly that key order.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct TypeId {
    name: String,
    #[serde(default)]
    distribution_key: Option<String>,
}

impl TypeId {
    pub fn new(name: &str, distribution_key: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            distribution_key: distribution_key.map(str::to_string),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn distribution_key(&self) -> Option<&str> {
        self.distribution_key.as_deref()
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // A TypeId is always JSON-encodable.
        f.write_str(&serde_json::to_string(self).unwrap())
    }
}

impl std::str::FromStr for TypeId {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|err| Error::BadTypeId(format!("{text:?}: {err}")))
    }
}

/// Descriptor is the registered schema of a resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub type_id: TypeId,
    pub field_names: &'static [&'static str],
}

type WrapFn = fn(&dyn std::any::Any) -> Result<Record, Error>;
type UnwrapFn = fn(&Record) -> Result<Box<dyn std::any::Any + Send>, Error>;

#[derive(Clone)]
struct WrapperEntry {
    resource_type: TypeId,
    wrap: WrapFn,
    unwrap: UnwrapFn,
}

/// Registry maps canonical type-id text to type Descriptors, and foreign
/// Rust types to the wrapper resource that carries them.
#[derive(Default)]
pub struct Registry {
    types: HashMap<String, Descriptor>,
    wrappers: HashMap<std::any::TypeId, WrapperEntry>,
    // Resource type-id text of each wrapper, for unwrap-side lookup.
    wrapper_types: HashMap<String, std::any::TypeId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type. Registration is idempotent under an
    /// identical descriptor; a conflicting re-registration fails.
    pub fn register<T: Resource>(&mut self) -> Result<(), Error> {
        let descriptor = Descriptor {
            type_id: T::type_id(),
            field_names: T::field_names(),
        };
        let text = descriptor.type_id.to_string();

        match self.types.get(&text) {
            None => {
                tracing::debug!(type_id = %text, "registered resource type");
                self.types.insert(text, descriptor);
                Ok(())
            }
            Some(existing) if *existing == descriptor => Ok(()),
            Some(_) => Err(Error::ConflictingRegistration(text)),
        }
    }

    pub fn lookup(&self, type_id: &TypeId) -> Option<&Descriptor> {
        self.types.get(&type_id.to_string())
    }

    pub fn lookup_text(&self, text: &str) -> Option<&Descriptor> {
        self.types.get(text)
    }

    /// Register a wrapper for its foreign type.
    pub fn register_wrapper<W: Wrapper>(&mut self) -> Result<(), Error> {
        self.register::<W>()?;

        let foreign = std::any::TypeId::of::<W::Foreign>();
        let entry = WrapperEntry {
            resource_type: W::type_id(),
            wrap: wrap_erased::<W>,
            unwrap: unwrap_erased::<W>,
        };
        match self.wrappers.get(&foreign) {
            None => {
                self.wrapper_types
                    .insert(entry.resource_type.to_string(), foreign);
                self.wrappers.insert(foreign, entry);
                Ok(())
            }
            Some(existing) if existing.resource_type == entry.resource_type => Ok(()),
            Some(_) => Err(Error::ConflictingRegistration(W::type_id().to_string())),
        }
    }

    /// Wrap a foreign value into the Record of its registered wrapper.
    pub fn wrap<F: std::any::Any>(&self, foreign: &F) -> Result<Record, Error> {
        let entry = self
            .wrappers
            .get(&std::any::TypeId::of::<F>())
            .ok_or_else(|| Error::NoWrapper(std::any::type_name::<F>()))?;
        (entry.wrap)(foreign)
    }

    /// Unwrap a wrapper Record back into its foreign value.
    pub fn unwrap<F: std::any::Any>(&self, record: &Record) -> Result<F, Error> {
        let entry = self
            .wrapper_types
            .get(&record.type_id().to_string())
            .and_then(|foreign| self.wrappers.get(foreign))
            .ok_or_else(|| Error::NoWrapper(std::any::type_name::<F>()))?;

        let boxed = (entry.unwrap)(record)?;
        boxed
            .downcast::<F>()
            .map(|f| *f)
            .map_err(|_| Error::NoWrapper(std::any::type_name::<F>()))
    }
}

/// Wrapper converts a foreign Rust value to and from a Resource which
/// carries enough data to reconstruct it.
pub trait Wrapper: Resource {
    type Foreign: std::any::Any + Send + Sync;

    fn wrap(foreign: &Self::Foreign) -> Result<Self, Error>;
    fn unwrap(&self) -> Result<Self::Foreign, Error>;
}

fn wrap_erased<W: Wrapper>(foreign: &dyn std::any::Any) -> Result<Record, Error> {
    let foreign = foreign
        .downcast_ref::<W::Foreign>()
        .ok_or_else(|| Error::NoWrapper(std::any::type_name::<W::Foreign>()))?;
    Ok(Record::of(&W::wrap(foreign)?))
}

fn unwrap_erased<W: Wrapper>(record: &Record) -> Result<Box<dyn std::any::Any + Send>, Error> {
    let wrapper: W = record.decode()?;
    Ok(Box::new(wrapper.unwrap()?))
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::new()));

/// Register a resource type in the process-wide registry.
pub fn register<T: Resource>() -> Result<(), Error> {
    REGISTRY.write().unwrap().register::<T>()
}

/// Register a wrapper in the process-wide registry.
pub fn register_wrapper<W: Wrapper>() -> Result<(), Error> {
    REGISTRY.write().unwrap().register_wrapper::<W>()
}

/// Look up a Descriptor by TypeId in the process-wide registry.
pub fn lookup(type_id: &TypeId) -> Option<Descriptor> {
    REGISTRY.read().unwrap().lookup(type_id).cloned()
}

/// Look up a Descriptor by canonical type-id text.
pub fn lookup_text(text: &str) -> Option<Descriptor> {
    REGISTRY.read().unwrap().lookup_text(text).cloned()
}

/// Wrap a foreign value via the process-wide registry.
pub fn wrap<F: std::any::Any>(foreign: &F) -> Result<Record, Error> {
    REGISTRY.read().unwrap().wrap(foreign)
}

/// Unwrap a wrapper Record via the process-wide registry.
pub fn unwrap<F: std::any::Any>(record: &Record) -> Result<F, Error> {
    REGISTRY.read().unwrap().unwrap(record)
}

/// JsonValue wraps an arbitrary serde_json::Value as a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonValue(pub serde_json::Value);

impl Resource for JsonValue {
    fn type_name() -> &'static str {
        "enact.JsonValue"
    }
    fn field_names() -> &'static [&'static str] {
        &["json"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![Value::String(self.0.to_string())]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, Error> {
        let text = fields.take_string("json")?;
        let json = serde_json::from_str(&text)
            .map_err(|err| Error::BadTypeId(format!("invalid JSON payload: {err}")))?;
        Ok(Self(json))
    }
}

impl Wrapper for JsonValue {
    type Foreign = serde_json::Value;

    fn wrap(foreign: &serde_json::Value) -> Result<Self, Error> {
        Ok(Self(foreign.clone()))
    }
    fn unwrap(&self) -> Result<serde_json::Value, Error> {
        Ok(self.0.clone())
    }
}
