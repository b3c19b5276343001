//! Enact is a framework for generative software: programs whose value
//! depends on being able to inspect, persist, rewind, and replay every
//! execution. Resources commit into a content-addressed store as a
//! Merkle DAG; registered callables journal each call as an Invocation;
//! and the replay engine re-executes a journaled run, reusing recorded
//! outputs wherever the call sequence is deterministic.

pub use journal::{
    invoke_async as invoke_async_in, invoke as invoke_in, register_async_invokable,
    register_invokable, AsyncCx, AsyncInputRequests, AsyncInvokable, Cancelled, Condition, Cx,
    Error, Fail, InputRequest, InputRequests, Invocation, Invokable, Payload, Raised,
    ReplayOptions, Request, Response,
};
pub use resource::{
    registry, Digest, FieldMap, JsonValue, Record, Ref, Resource, TypeId, Value, Wrapper,
};
pub use store::{Backend, FsBackend, MemBackend, Store, StoreGuard};

mod summary;
pub use summary::summary;

/// One-stop imports for user code.
pub mod prelude {
    pub use journal::{
        register_async_invokable, register_invokable, AsyncCx, AsyncInvokable, Cx, Fail,
        Invocation, Invokable, ReplayOptions,
    };
    pub use resource::{registry::register, FieldMap, Record, Ref, Resource, TypeId, Value};
    pub use store::Store;
}

/// Register a resource type in the process-wide registry.
pub fn register<T: Resource>() -> Result<(), resource::Error> {
    registry::register::<T>()
}

/// Invoke a registered callable in the ambient store, journaling the run.
pub fn invoke<F: Invokable>(f: &F, input: Value) -> Result<Invocation, Error> {
    let store = Store::current().map_err(journal::Error::from)?;
    journal::invoke(&store, f, input)
}

/// The async form of invoke. The ambient store is resolved on the
/// calling thread, before the returned future first suspends.
pub async fn invoke_async<F: AsyncInvokable>(f: &F, input: Value) -> Result<Invocation, Error> {
    let store = Store::current().map_err(journal::Error::from)?;
    journal::invoke_async(&store, f, input).await
}
