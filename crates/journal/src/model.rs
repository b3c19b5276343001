use super::Error;
use resource::{registry, FieldMap, Record, Ref, Resource, TypeId, Value};
use store::Store;

/// Payload carries an arbitrary Value as a committable resource. Inputs
/// and outputs of invocations are committed in this form.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub value: Value,
}

impl Resource for Payload {
    fn type_name() -> &'static str {
        "enact.Payload"
    }
    fn field_names() -> &'static [&'static str] {
        &["value"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![self.value.clone()]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            value: fields.take("value")?,
        })
    }
}

/// Request identifies one call: which invokable, on which input.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub invokable: Ref,
    pub input: Ref,
}

impl Resource for Request {
    fn type_name() -> &'static str {
        "enact.Request"
    }
    fn field_names() -> &'static [&'static str] {
        &["invokable", "input"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Ref(self.invokable.clone()),
            Value::Ref(self.input.clone()),
        ]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            invokable: fields.take_ref("invokable")?,
            input: fields.take_ref("input")?,
        })
    }
}

/// Response records how a call concluded. Exactly one of output and
/// raised is set once the invocation is complete; both are None only
/// while (or because) the invocation is incomplete. Children are the
/// invocations of nested calls, in the order they were recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub output: Option<Ref>,
    pub raised: Option<Ref>,
    pub raised_here: bool,
    pub children: Vec<Ref>,
}

impl Resource for Response {
    fn type_name() -> &'static str {
        "enact.Response"
    }
    fn field_names() -> &'static [&'static str] {
        &["output", "raised", "raised_here", "children"]
    }
    fn field_values(&self) -> Vec<Value> {
        let opt = |r: &Option<Ref>| match r {
            Some(r) => Value::Ref(r.clone()),
            None => Value::Null,
        };
        vec![
            opt(&self.output),
            opt(&self.raised),
            Value::Bool(self.raised_here),
            Value::Array(self.children.iter().cloned().map(Value::Ref).collect()),
        ]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        let output = fields.take_opt_ref("output")?;
        let raised = fields.take_opt_ref("raised")?;
        let raised_here = fields.take_bool("raised_here")?;
        let children = fields
            .take_array("children")?
            .into_iter()
            .map(|value| match value {
                Value::Ref(r) => Ok(r),
                other => Err(resource::Error::FieldType {
                    type_id: Self::type_id().to_string(),
                    field: format!("children[{}]", other.kind()),
                    expected: "ref",
                }),
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            output,
            raised,
            raised_here,
            children,
        })
    }
}

impl Response {
    pub fn is_complete(&self) -> bool {
        self.output.is_some() || self.raised.is_some()
    }
}

/// Invocation is the journal entry for one call: a Ref to its Request
/// and a Ref to its Response. Invocations are themselves resources, so a
/// whole execution tree commits as one Merkle DAG.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub request: Ref,
    pub response: Ref,
}

impl Resource for Invocation {
    fn type_name() -> &'static str {
        "enact.Invocation"
    }
    fn field_names() -> &'static [&'static str] {
        &["request", "response"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Ref(self.request.clone()),
            Value::Ref(self.response.clone()),
        ]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            request: fields.take_ref("request")?,
            response: fields.take_ref("response")?,
        })
    }
}

impl Invocation {
    pub fn request(&self, store: &Store) -> Result<Request, Error> {
        Ok(store.checkout(&self.request)?)
    }

    pub fn response(&self, store: &Store) -> Result<Response, Error> {
        Ok(store.checkout(&self.response)?)
    }

    /// The output Value of this invocation, or None if it raised or is
    /// incomplete.
    pub fn output_value(&self, store: &Store) -> Result<Option<Value>, Error> {
        match self.response(store)?.output {
            Some(output) => Ok(Some(store.checkout::<Payload>(&output)?.value)),
            None => Ok(None),
        }
    }

    /// The raised condition of this invocation, or None.
    pub fn raised_record(&self, store: &Store) -> Result<Option<Record>, Error> {
        match self.response(store)?.raised {
            Some(raised) => Ok(Some(store.checkout_record(&raised)?)),
            None => Ok(None),
        }
    }

    /// Child invocations, in recorded order.
    pub fn children(&self, store: &Store) -> Result<Vec<Invocation>, Error> {
        self.response(store)?
            .children
            .iter()
            .map(|child| Ok(store.checkout(child)?))
            .collect()
    }

    /// The committed Ref of this invocation.
    pub fn to_ref(&self, store: &Store) -> Result<Ref, Error> {
        Ok(store.commit_resource(self)?)
    }
}

/// InputRequest is the distinguished condition raised to suspend an
/// invocation pending external input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRequest {
    pub requested: TypeId,
    pub for_value: Value,
    pub context: Value,
}

impl Resource for InputRequest {
    fn type_name() -> &'static str {
        "enact.InputRequest"
    }
    fn field_names() -> &'static [&'static str] {
        &["requested", "for_value", "context"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::TypeRef(self.requested.clone()),
            self.for_value.clone(),
            self.context.clone(),
        ]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            requested: fields.take_type_ref("requested")?,
            for_value: fields.take("for_value")?,
            context: fields.take("context")?,
        })
    }
}

/// Condition is a general-purpose user-raised condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub kind: String,
    pub detail: Value,
}

impl Resource for Condition {
    fn type_name() -> &'static str {
        "enact.Condition"
    }
    fn field_names() -> &'static [&'static str] {
        &["kind", "detail"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![Value::from(self.kind.as_str()), self.detail.clone()]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            kind: fields.take_string("kind")?,
            detail: fields.take("detail")?,
        })
    }
}

/// Cancelled finalizes an invocation that was cancelled mid-flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Cancelled {
    pub reason: String,
}

impl Resource for Cancelled {
    fn type_name() -> &'static str {
        "enact.Cancelled"
    }
    fn field_names() -> &'static [&'static str] {
        &["reason"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![Value::from(self.reason.as_str())]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            reason: fields.take_string("reason")?,
        })
    }
}

/// RequestInput is the built-in invokable whose body raises an
/// InputRequest carrying its fields. Suspension is thereby an ordinary
/// leaf invocation, which is what lets replay resolve it by overriding
/// the recorded raise.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInput {
    pub requested: TypeId,
    pub for_value: Value,
    pub context: Value,
}

impl Resource for RequestInput {
    fn type_name() -> &'static str {
        "enact.RequestInput"
    }
    fn field_names() -> &'static [&'static str] {
        &["requested", "for_value", "context"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::TypeRef(self.requested.clone()),
            self.for_value.clone(),
            self.context.clone(),
        ]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            requested: fields.take_type_ref("requested")?,
            for_value: fields.take("for_value")?,
            context: fields.take("context")?,
        })
    }
}

impl RequestInput {
    pub(crate) fn raise(&self) -> Fail {
        Fail::raise(&InputRequest {
            requested: self.requested.clone(),
            for_value: self.for_value.clone(),
            context: self.context.clone(),
        })
    }
}

/// Raised is the in-flight form of a raised condition, carried through
/// `Result<Value, Fail>` as it propagates up the call tree. The builder
/// commits it at the originating frame; ancestor frames observe the
/// committed Ref and record propagation rather than origination.
#[derive(Debug, Clone)]
pub struct Raised {
    record: Record,
    committed: Option<Ref>,
}

impl Raised {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            committed: None,
        }
    }

    pub(crate) fn recorded(record: Record, committed: Ref) -> Self {
        Self {
            record,
            committed: Some(committed),
        }
    }

    /// The condition resource, in erased form.
    pub fn condition(&self) -> &Record {
        &self.record
    }

    /// The committed Ref of the condition, once a frame has recorded it.
    pub fn committed(&self) -> Option<&Ref> {
        self.committed.as_ref()
    }

    pub fn is<T: Resource>(&self) -> bool {
        *self.record.type_id() == T::type_id()
    }

    pub fn decode<T: Resource>(&self) -> Result<T, resource::Error> {
        self.record.decode()
    }

    // Commit the condition if no frame has yet, returning its Ref and
    // whether this frame is the origin.
    pub(crate) fn commit(&mut self, store: &Store) -> Result<(Ref, bool), store::Error> {
        match &self.committed {
            Some(committed) => Ok((committed.clone(), false)),
            None => {
                let committed = store.commit(&self.record)?;
                self.committed = Some(committed.clone());
                Ok((committed, true))
            }
        }
    }
}

/// Fail is what a body returns when it does not return a Value: either a
/// Raised condition (journaled, replayable) or an infrastructure Fault
/// (store I/O, replay divergence), which aborts journaling and leaves
/// the invocation partial.
#[derive(Debug)]
pub enum Fail {
    Raised(Raised),
    Fault(Error),
}

impl Fail {
    /// Raise a condition resource.
    pub fn raise<T: Resource>(condition: &T) -> Self {
        Self::Raised(Raised::new(Record::of(condition)))
    }

    /// Raise a general-purpose Condition.
    pub fn condition(kind: &str, detail: Value) -> Self {
        Self::raise(&Condition {
            kind: kind.to_string(),
            detail,
        })
    }

    /// Raise a cancellation.
    pub fn cancelled(reason: &str) -> Self {
        Self::raise(&Cancelled {
            reason: reason.to_string(),
        })
    }
}

impl From<Raised> for Fail {
    fn from(raised: Raised) -> Self {
        Self::Raised(raised)
    }
}
impl From<Error> for Fail {
    fn from(err: Error) -> Self {
        Self::Fault(err)
    }
}
impl From<store::Error> for Fail {
    fn from(err: store::Error) -> Self {
        Self::Fault(err.into())
    }
}
impl From<resource::Error> for Fail {
    fn from(err: resource::Error) -> Self {
        Self::Fault(err.into())
    }
}

/// Register the journal's built-in resource types. Idempotent; called by
/// every top-level entry point.
pub(crate) fn ensure_builtins() -> Result<(), Error> {
    registry::register::<Payload>()?;
    registry::register::<Request>()?;
    registry::register::<Response>()?;
    registry::register::<Invocation>()?;
    registry::register::<InputRequest>()?;
    registry::register::<Condition>()?;
    registry::register::<Cancelled>()?;
    super::bind::register_invokable::<RequestInput>()?;
    super::bind::register_async_invokable::<RequestInput>()?;
    Ok(())
}
