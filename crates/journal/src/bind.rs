use super::{AsyncCx, Cx, Error, Fail, RequestInput};
use futures::future::BoxFuture;
use resource::{registry, Record, Resource, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

/// Invokable is a registered callable whose calls the journal records.
/// The invokable is itself a resource: two callables are the same iff
/// their committed Refs are digest-equal, so a data-carrying invokable's
/// identity includes its captured fields.
pub trait Invokable: Resource {
    fn call(&self, cx: &mut Cx, input: Value) -> Result<Value, Fail>;
}

/// AsyncInvokable is the cooperative-async form of Invokable. Bodies may
/// suspend at their own await points and fan out sibling calls through
/// AsyncCx::gather.
#[async_trait::async_trait]
pub trait AsyncInvokable: Resource {
    async fn call(&self, cx: AsyncCx, input: Value) -> Result<Value, Fail>;
}

pub(crate) type SyncRun = Arc<dyn Fn(&Record, &mut Cx, Value) -> Result<Value, Fail> + Send + Sync>;

pub(crate) type AsyncRun =
    Arc<dyn Fn(Record, AsyncCx, Value) -> BoxFuture<'static, Result<Value, Fail>> + Send + Sync>;

#[derive(Default)]
struct Bindings {
    sync_runs: HashMap<String, SyncRun>,
    async_runs: HashMap<String, AsyncRun>,
}

// Type-erased run functions for registered invokables, keyed by canonical
// type-id text. Replay uses these to re-enter bodies given only the
// committed invokable resource.
static BINDINGS: LazyLock<RwLock<Bindings>> = LazyLock::new(|| RwLock::new(Bindings::default()));

pub(crate) fn erase_sync<T: Invokable>() -> SyncRun {
    Arc::new(|record, cx, input| {
        let invokable: T = record.decode()?;
        invokable.call(cx, input)
    })
}

pub(crate) fn erase_async<T: AsyncInvokable>() -> AsyncRun {
    Arc::new(
        |record: Record, cx: AsyncCx, input: Value| -> BoxFuture<'static, Result<Value, Fail>> {
            Box::pin(async move {
                let invokable: T = record.decode()?;
                invokable.call(cx, input).await
            })
        },
    )
}

/// Register an Invokable: its resource type, plus the bound run function
/// replay uses to re-enter its body.
pub fn register_invokable<T: Invokable>() -> Result<(), Error> {
    registry::register::<T>()?;
    BINDINGS
        .write()
        .unwrap()
        .sync_runs
        .insert(T::type_id().to_string(), erase_sync::<T>());
    Ok(())
}

/// Register an AsyncInvokable.
pub fn register_async_invokable<T: AsyncInvokable>() -> Result<(), Error> {
    registry::register::<T>()?;
    BINDINGS
        .write()
        .unwrap()
        .async_runs
        .insert(T::type_id().to_string(), erase_async::<T>());
    Ok(())
}

pub(crate) fn sync_binding(type_text: &str) -> Option<SyncRun> {
    BINDINGS.read().unwrap().sync_runs.get(type_text).cloned()
}

pub(crate) fn async_binding(type_text: &str) -> Option<AsyncRun> {
    BINDINGS.read().unwrap().async_runs.get(type_text).cloned()
}

// The built-in suspension invokable: its entire body is the raise.
impl Invokable for RequestInput {
    fn call(&self, _cx: &mut Cx, _input: Value) -> Result<Value, Fail> {
        Err(self.raise())
    }
}

#[async_trait::async_trait]
impl AsyncInvokable for RequestInput {
    async fn call(&self, _cx: AsyncCx, _input: Value) -> Result<Value, Fail> {
        Err(self.raise())
    }
}
