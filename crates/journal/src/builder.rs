use super::model::ensure_builtins;
use super::{
    Error, Fail, Invocation, Invokable, Payload, Raised, Request, RequestInput, Response,
};
use resource::{Record, Ref, Resource, TypeId, Value};
use store::Store;
use std::sync::Arc;

/// Effective options of a run: strictness of replay matching, plus the
/// optional hook which resolves recorded raises into substitute outputs.
pub(crate) struct Opts {
    pub strict: bool,
    pub exception_override: Option<Arc<dyn Fn(&Ref) -> Option<Value> + Send + Sync>>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            strict: true,
            exception_override: None,
        }
    }
}

impl Opts {
    pub(crate) fn override_for(&self, raised: &Ref) -> Option<Value> {
        self.exception_override.as_ref().and_then(|hook| hook(raised))
    }
}

// Cursor over the recorded children of a frame being replayed.
pub(crate) struct ReplayCursor {
    pub recorded: Vec<Ref>,
    pub next: usize,
}

/// Cx is the tracing context of one in-progress invocation frame. Every
/// nested call made through Cx::invoke is journaled as a child of this
/// frame; a plain Rust call bypasses the journal entirely, which is the
/// deliberate escape hatch for non-determinism that must not be recorded.
pub struct Cx {
    store: Store,
    opts: Arc<Opts>,
    children: Vec<Ref>,
    replay: Option<ReplayCursor>,
}

enum Decision {
    // The next recorded child matches the live call.
    Replay(Ref, Invocation),
    // Recorded tail diverged under non-strict replay; discard it.
    Diverge,
    // Record mode, or recorded children are exhausted.
    Live,
}

impl Cx {
    pub(crate) fn new(store: Store, opts: Arc<Opts>, recorded: Option<Vec<Ref>>) -> Self {
        Self {
            store,
            opts,
            children: Vec::new(),
            replay: recorded.map(|recorded| ReplayCursor { recorded, next: 0 }),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Invoke a registered callable, journaling the call as a child of
    /// this frame.
    pub fn invoke<F: Invokable>(&mut self, f: &F, input: Value) -> Result<Value, Fail> {
        let record = Record::of(f);
        self.invoke_inner(&record, input, &|cx, input| f.call(cx, input))
    }

    /// Invoke by erased Record, dispatching through the binding table.
    pub fn invoke_record(&mut self, record: &Record, input: Value) -> Result<Value, Fail> {
        let run = super::bind::sync_binding(&record.type_id().to_string())
            .ok_or_else(|| Error::UnboundInvokable(record.type_id().to_string()))?;
        self.invoke_inner(record, input, &|cx, input| run(record, cx, input))
    }

    /// Raise an InputRequest through the built-in RequestInput invokable,
    /// suspending this run pending external input. Under replay with a
    /// matching override, the request instead resolves to the overridden
    /// value and execution continues.
    pub fn request_input(
        &mut self,
        requested: TypeId,
        for_value: Value,
        context: Value,
    ) -> Result<Value, Fail> {
        self.invoke(
            &RequestInput {
                requested,
                for_value,
                context,
            },
            Value::Null,
        )
    }

    fn invoke_inner(
        &mut self,
        record: &Record,
        input: Value,
        run: &dyn Fn(&mut Cx, Value) -> Result<Value, Fail>,
    ) -> Result<Value, Fail> {
        let invokable_ref = self.store.commit(record)?;
        let input_ref = self.store.commit_resource(&Payload {
            value: input.clone(),
        })?;

        let decision = match &mut self.replay {
            Some(cursor) if cursor.next < cursor.recorded.len() => {
                let rec_ref = cursor.recorded[cursor.next].clone();
                let rec_inv: Invocation = self.store.checkout(&rec_ref)?;
                let rec_req: Request = self.store.checkout(&rec_inv.request)?;

                if rec_req.invokable == invokable_ref && rec_req.input == input_ref {
                    cursor.next += 1;
                    Decision::Replay(rec_ref, rec_inv)
                } else if self.opts.strict {
                    return Err(Fail::Fault(Error::ReplayDivergence {
                        index: self.children.len(),
                        expected: describe_request(&rec_req),
                        observed: describe_refs(&invokable_ref, &input_ref),
                    }));
                } else {
                    Decision::Diverge
                }
            }
            _ => Decision::Live,
        };

        match decision {
            Decision::Replay(rec_ref, rec_inv) => self.replay_child(rec_ref, rec_inv, input, run),
            Decision::Diverge => {
                tracing::debug!(
                    index = self.children.len(),
                    "non-strict replay diverged; discarding recorded tail"
                );
                self.replay = None;
                self.run_live(invokable_ref, input_ref, input, None, run)
            }
            Decision::Live => self.run_live(invokable_ref, input_ref, input, None, run),
        }
    }

    // Reuse a recorded child invocation whose request matched the live
    // call.
    fn replay_child(
        &mut self,
        rec_ref: Ref,
        rec_inv: Invocation,
        input: Value,
        run: &dyn Fn(&mut Cx, Value) -> Result<Value, Fail>,
    ) -> Result<Value, Fail> {
        let response: Response = self.store.checkout(&rec_inv.response)?;

        if let Some(output) = &response.output {
            // Memoized: the recorded child is reused as-is.
            let payload: Payload = self.store.checkout(output)?;
            self.children.push(rec_ref);
            return Ok(payload.value);
        }

        if let (Some(raised_ref), true) = (&response.raised, response.raised_here) {
            if let Some(value) = self.opts.override_for(raised_ref) {
                // The recorded raise is resolved: the child becomes a
                // completed call with the substituted output.
                let output_ref = self.store.commit_resource(&Payload {
                    value: value.clone(),
                })?;
                let response_ref = self.store.commit_resource(&Response {
                    output: Some(output_ref),
                    raised: None,
                    raised_here: false,
                    children: response.children,
                })?;
                let resolved_ref = self.store.commit_resource(&Invocation {
                    request: rec_inv.request.clone(),
                    response: response_ref,
                })?;
                self.children.push(resolved_ref);
                return Ok(value);
            }
            // Re-raise the recorded condition.
            let record = self.store.checkout_record(raised_ref)?;
            self.children.push(rec_ref);
            return Err(Fail::Raised(Raised::recorded(record, raised_ref.clone())));
        }

        // The child is incomplete, or raised through a descendant which
        // an override may now resolve: re-enter its body with the
        // recorded children available for replay.
        let rec_req: Request = self.store.checkout(&rec_inv.request)?;
        self.run_live(
            rec_req.invokable,
            rec_req.input,
            input,
            Some(response.children),
            run,
        )
    }

    // Run the body live in a child frame, finalize, and append the child
    // invocation to this frame.
    fn run_live(
        &mut self,
        invokable_ref: Ref,
        input_ref: Ref,
        input: Value,
        recorded: Option<Vec<Ref>>,
        run: &dyn Fn(&mut Cx, Value) -> Result<Value, Fail>,
    ) -> Result<Value, Fail> {
        let mut child = Cx::new(self.store.clone(), self.opts.clone(), recorded);
        let outcome = run(&mut child, input);

        let (_, child_ref, outcome) =
            finalize(&self.store, invokable_ref, input_ref, child.children, outcome)?;
        self.children.push(child_ref);
        outcome.map_err(Fail::Raised)
    }
}

// Commit the Request, Response, and Invocation of a finished frame.
// A Fault aborts journaling and propagates; the invocation is then left
// partial.
pub(crate) fn finalize(
    store: &Store,
    invokable_ref: Ref,
    input_ref: Ref,
    children: Vec<Ref>,
    outcome: Result<Value, Fail>,
) -> Result<(Invocation, Ref, Result<Value, Raised>), Error> {
    let request = store.commit_resource(&Request {
        invokable: invokable_ref,
        input: input_ref,
    })?;

    let (response, outcome) = match outcome {
        Ok(value) => {
            let output = store.commit_resource(&Payload {
                value: value.clone(),
            })?;
            let response = Response {
                output: Some(output),
                raised: None,
                raised_here: false,
                children,
            };
            (response, Ok(value))
        }
        Err(Fail::Raised(mut raised)) => {
            let (raised_ref, raised_here) = raised.commit(store)?;
            let response = Response {
                output: None,
                raised: Some(raised_ref),
                raised_here,
                children,
            };
            (response, Err(raised))
        }
        Err(Fail::Fault(err)) => return Err(err),
    };

    let response = store.commit_resource(&response)?;
    let invocation = Invocation { request, response };
    let invocation_ref = store.commit_resource(&invocation)?;
    Ok((invocation, invocation_ref, outcome))
}

pub(crate) fn describe_request(request: &Request) -> String {
    describe_refs(&request.invokable, &request.input)
}

fn describe_refs(invokable: &Ref, input: &Ref) -> String {
    format!("invokable {} on input {}", invokable.digest(), input.digest())
}

/// Invoke a registered callable at top level, journaling a root frame in
/// |store|. The returned Invocation is complete even when the body
/// raised: the condition is committed and recorded in its Response.
#[tracing::instrument(skip_all, fields(invokable = F::type_name()))]
pub fn invoke<F: Invokable>(store: &Store, f: &F, input: Value) -> Result<Invocation, Error> {
    ensure_builtins()?;
    let record = Record::of(f);
    let run = |cx: &mut Cx, input: Value| f.call(cx, input);
    root_frame(store, &record, input, None, Arc::new(Opts::default()), &run)
}

pub(crate) fn root_frame(
    store: &Store,
    record: &Record,
    input: Value,
    recorded: Option<Vec<Ref>>,
    opts: Arc<Opts>,
    run: &dyn Fn(&mut Cx, Value) -> Result<Value, Fail>,
) -> Result<Invocation, Error> {
    let invokable_ref = store.commit(record)?;
    let input_ref = store.commit_resource(&Payload {
        value: input.clone(),
    })?;

    let mut cx = Cx::new(store.clone(), opts, recorded);
    let outcome = run(&mut cx, input);

    let (invocation, _, _) = finalize(store, invokable_ref, input_ref, cx.children, outcome)?;
    Ok(invocation)
}
