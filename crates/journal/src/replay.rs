use super::builder::{root_frame, Opts};
use super::model::ensure_builtins;
use super::{bind, gather, Cx, Error, Invocation, Payload, Request, Response};
use resource::{Ref, Value};
use store::Store;
use std::sync::Arc;

/// Options of a replay run.
#[derive(Clone, Default)]
pub struct ReplayOptions {
    /// Non-strict replay discards the recorded tail at the first
    /// divergence and continues executing live. Strict replay fails.
    pub non_strict: bool,
    /// Consulted with the Ref of a recorded raise at its originating
    /// frame; Some(value) resolves that call to the value instead of
    /// re-raising. This is how input requests are answered.
    pub exception_override: Option<Arc<dyn Fn(&Ref) -> Option<Value> + Send + Sync>>,
}

impl ReplayOptions {
    pub(crate) fn into_opts(self) -> Arc<Opts> {
        Arc::new(Opts {
            strict: !self.non_strict,
            exception_override: self.exception_override,
        })
    }
}

impl std::fmt::Debug for ReplayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayOptions")
            .field("non_strict", &self.non_strict)
            .field(
                "exception_override",
                &self.exception_override.as_ref().map(|_| ".."),
            )
            .finish()
    }
}

// How a replay of one recorded invocation proceeds, decided from its
// recorded Response alone.
enum Plan {
    // Complete and unaffected by overrides: reuse as-is.
    Reuse,
    // A raise originated here and the override resolves it to a value.
    Resolve(Value, Vec<Ref>),
    // Re-enter the body, replaying against the recorded children.
    ReEnter(Vec<Ref>),
}

fn plan(response: Response, opts: &Opts) -> Plan {
    if response.output.is_some() {
        return Plan::Reuse;
    }
    match (&response.raised, response.raised_here) {
        (Some(raised), true) => match opts.override_for(raised) {
            Some(value) => Plan::Resolve(value, response.children),
            None => Plan::Reuse,
        },
        // Raised through a descendant (an override may now resolve it),
        // or incomplete: either way the body must run again.
        _ => Plan::ReEnter(response.children),
    }
}

impl Invocation {
    /// Strict replay with no overrides.
    pub fn replay(&self, store: &Store) -> Result<Invocation, Error> {
        self.replay_with(store, ReplayOptions::default())
    }

    /// Re-execute this invocation, reusing recorded children wherever the
    /// live call sequence matches the journal (compared by digest), and
    /// re-entering bodies only where an output is missing or an override
    /// applies. Divergence under strict replay is Error::ReplayDivergence.
    #[tracing::instrument(skip_all, fields(invocation = %self.request.digest()))]
    pub fn replay_with(&self, store: &Store, options: ReplayOptions) -> Result<Invocation, Error> {
        ensure_builtins()?;
        let opts = options.into_opts();

        match plan(self.response(store)?, &opts) {
            Plan::Reuse => Ok(self.clone()),
            Plan::Resolve(value, children) => self.resolve_root(store, value, children),
            Plan::ReEnter(children) => {
                let request: Request = store.checkout(&self.request)?;
                let invokable = store.checkout_record(&request.invokable)?;
                let input = store.checkout::<Payload>(&request.input)?.value;

                let run = bind::sync_binding(&invokable.type_id().to_string())
                    .ok_or_else(|| Error::UnboundInvokable(invokable.type_id().to_string()))?;

                let body = invokable.clone();
                let reenter = move |cx: &mut Cx, input: Value| run(&body, cx, input);
                root_frame(store, &invokable, input, Some(children), opts, &reenter)
            }
        }
    }

    /// The cooperative-async form of replay_with, for invocations of
    /// AsyncInvokables.
    pub async fn replay_async_with(
        &self,
        store: &Store,
        options: ReplayOptions,
    ) -> Result<Invocation, Error> {
        ensure_builtins()?;
        let opts = options.into_opts();

        match plan(self.response(store)?, &opts) {
            Plan::Reuse => Ok(self.clone()),
            Plan::Resolve(value, children) => self.resolve_root(store, value, children),
            Plan::ReEnter(children) => {
                let request: Request = store.checkout(&self.request)?;
                let invokable = store.checkout_record(&request.invokable)?;
                let input = store.checkout::<Payload>(&request.input)?.value;

                let run = bind::async_binding(&invokable.type_id().to_string())
                    .ok_or_else(|| Error::UnboundInvokable(invokable.type_id().to_string()))?;

                gather::root_frame_async(store, invokable, input, Some(children), opts, run).await
            }
        }
    }

    // Substitute the overridden value as this invocation's output.
    fn resolve_root(
        &self,
        store: &Store,
        value: Value,
        children: Vec<Ref>,
    ) -> Result<Invocation, Error> {
        let output = store.commit_resource(&Payload { value })?;
        let response = store.commit_resource(&Response {
            output: Some(output),
            raised: None,
            raised_here: false,
            children,
        })?;
        let next = Invocation {
            request: self.request.clone(),
            response,
        };
        store.commit_resource(&next)?;
        Ok(next)
    }
}
