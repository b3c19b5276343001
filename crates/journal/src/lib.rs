// The journal records every framework-mediated call as an Invocation
// resource: a Request (which invokable, which input) and a Response
// (output or raised condition, plus child invocations in order). Because
// every piece is committed to a store, a journaled run can be inspected,
// persisted, rewound, and replayed.

mod model;
pub use model::{
    Cancelled, Condition, Fail, InputRequest, Invocation, Payload, Raised, Request, RequestInput,
    Response,
};

// Invokable registration and the erased run-function binding table.
mod bind;
pub use bind::{register_async_invokable, register_invokable, AsyncInvokable, Invokable};

// The builder: the interposition layer recording in-progress invocations.
mod builder;
pub use builder::{invoke, Cx};

// Lockstep re-execution of a recorded invocation.
mod replay;
pub use replay::ReplayOptions;

mod rewind;

// Cooperative-async execution: AsyncCx and the gather primitive.
mod gather;
pub use gather::{invoke_async, AsyncCx};

// The input-request protocol and its drivers.
mod input;
pub use input::{AsyncInputRequests, InputRequests};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "replay diverged at child {index}: recorded call was {expected}, live call is {observed}"
    )]
    ReplayDivergence {
        index: usize,
        expected: String,
        observed: String,
    },
    #[error("a child invocation beyond index {index} was never finalized within its parent")]
    IncompleteSubinvocation { index: usize },
    #[error("no invokable is bound for type {0}")]
    UnboundInvokable(String),
    #[error(transparent)]
    Store(#[from] store::Error),
    #[error(transparent)]
    Resource(#[from] resource::Error),
}
