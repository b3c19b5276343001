use super::bind::{self, AsyncRun};
use super::builder::{describe_request, finalize, Opts, ReplayCursor};
use super::model::ensure_builtins;
use super::{
    AsyncInvokable, Error, Fail, Invocation, Payload, Raised, Request, RequestInput, Response,
};
use futures::StreamExt;
use resource::{Record, Ref, Resource, TypeId, Value};
use store::Store;
use std::sync::{Arc, Mutex};

/// AsyncCx is the tracing context of one in-progress asynchronous
/// invocation frame. It is Clone so that bodies can share it with tasks
/// they spawn; a frame cannot finalize until every call started under it
/// has finished, and a still-open call at finalization time is the
/// IncompleteSubinvocation error.
///
/// Children are appended in the order calls *complete*, which for
/// sequentially awaited calls equals call order, but for gathered or
/// spawned siblings does not. Replay matches that same completion order.
#[derive(Clone)]
pub struct AsyncCx {
    store: Store,
    opts: Arc<Opts>,
    state: Arc<Mutex<AsyncState>>,
}

#[derive(Default)]
struct AsyncState {
    children: Vec<Ref>,
    replay: Option<ReplayCursor>,
    open: usize,
}

enum Decision {
    Replay(Ref, Invocation),
    Diverge,
    Live,
}

impl AsyncCx {
    pub(crate) fn new(store: Store, opts: Arc<Opts>, recorded: Option<Vec<Ref>>) -> Self {
        Self {
            store,
            opts,
            state: Arc::new(Mutex::new(AsyncState {
                children: Vec::new(),
                replay: recorded.map(|recorded| ReplayCursor { recorded, next: 0 }),
                open: 0,
            })),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Invoke an async callable, journaling the call as a child of this
    /// frame and awaiting its completion.
    pub async fn invoke<F: AsyncInvokable>(&self, f: &F, input: Value) -> Result<Value, Fail> {
        self.invoke_run(Record::of(f), input, bind::erase_async::<F>())
            .await
    }

    /// Invoke by erased Record, dispatching through the binding table.
    pub async fn invoke_record(&self, record: Record, input: Value) -> Result<Value, Fail> {
        let run = bind::async_binding(&record.type_id().to_string())
            .ok_or_else(|| Error::UnboundInvokable(record.type_id().to_string()))?;
        self.invoke_run(record, input, run).await
    }

    /// The async form of Cx::request_input.
    pub async fn request_input(
        &self,
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
        .await
    }

    /// Run sibling calls concurrently. Outputs are returned in call
    /// order; the children of this frame record in completion order.
    /// A Raised outcome is returned in its call's slot, while a Fault
    /// aborts the gather.
    pub async fn gather<F: AsyncInvokable>(
        &self,
        calls: Vec<(F, Value)>,
    ) -> Result<Vec<Result<Value, Raised>>, Error> {
        struct Prepared {
            record: Record,
            invokable_ref: Ref,
            input_ref: Ref,
            input: Value,
        }

        let mut prepared = Vec::with_capacity(calls.len());
        for (f, input) in calls {
            let record = Record::of(&f);
            let invokable_ref = self.store.commit(&record)?;
            let input_ref = self.store.commit_resource(&Payload {
                value: input.clone(),
            })?;
            prepared.push(Some(Prepared {
                record,
                invokable_ref,
                input_ref,
                input,
            }));
        }

        let mut results: Vec<Option<Result<Value, Raised>>> =
            prepared.iter().map(|_| None).collect();

        // Replay phase: recorded children are consumed in their recorded
        // (completion) order, each matched against a pending call by
        // request digest.
        loop {
            let next_recorded = {
                let state = self.state.lock().unwrap();
                match &state.replay {
                    Some(cursor) if cursor.next < cursor.recorded.len() => {
                        Some(cursor.recorded[cursor.next].clone())
                    }
                    _ => None,
                }
            };
            let Some(rec_ref) = next_recorded else { break };
            if results.iter().all(Option::is_some) {
                // The recorded suffix belongs to calls made after this
                // gather.
                break;
            }

            let rec_inv: Invocation = self.store.checkout(&rec_ref)?;
            let rec_req: Request = self.store.checkout(&rec_inv.request)?;

            let matched = prepared.iter().position(|p| {
                p.as_ref().is_some_and(|p| {
                    p.invokable_ref == rec_req.invokable && p.input_ref == rec_req.input
                })
            });
            let Some(index) = matched else {
                if self.opts.strict {
                    let pending = results.iter().filter(|r| r.is_none()).count();
                    return Err(Error::ReplayDivergence {
                        index: self.state.lock().unwrap().children.len(),
                        expected: describe_request(&rec_req),
                        observed: format!("{pending} still-pending gathered call(s)"),
                    });
                }
                self.state.lock().unwrap().replay = None;
                break;
            };

            {
                let mut state = self.state.lock().unwrap();
                if let Some(cursor) = &mut state.replay {
                    cursor.next += 1;
                }
            }
            let call = prepared[index].take().unwrap();
            let outcome = self
                .replay_child(rec_ref, rec_inv, call.input, bind::erase_async::<F>())
                .await;
            results[index] = Some(match outcome {
                Ok(value) => Ok(value),
                Err(Fail::Raised(raised)) => Err(raised),
                Err(Fail::Fault(err)) => return Err(err),
            });
        }

        // Live phase: every still-pending call runs concurrently, and
        // each appends itself to this frame as it completes.
        let mut futures = futures::stream::FuturesUnordered::new();
        for (index, slot) in prepared.iter_mut().enumerate() {
            let Some(call) = slot.take() else { continue };
            let cx = self.clone();
            futures.push(async move {
                let outcome = cx
                    .run_live(
                        call.record,
                        call.invokable_ref,
                        call.input_ref,
                        call.input,
                        None,
                        bind::erase_async::<F>(),
                    )
                    .await;
                (index, outcome)
            });
        }
        while let Some((index, outcome)) = futures.next().await {
            results[index] = Some(match outcome {
                Ok(value) => Ok(value),
                Err(Fail::Raised(raised)) => Err(raised),
                Err(Fail::Fault(err)) => return Err(err),
            });
        }

        Ok(results.into_iter().map(Option::unwrap).collect())
    }

    async fn invoke_run(&self, record: Record, input: Value, run: AsyncRun) -> Result<Value, Fail> {
        let invokable_ref = self.store.commit(&record)?;
        let input_ref = self.store.commit_resource(&Payload {
            value: input.clone(),
        })?;

        let decision = {
            let mut state = self.state.lock().unwrap();
            let index = state.children.len();
            match &mut state.replay {
                Some(cursor) if cursor.next < cursor.recorded.len() => {
                    let rec_ref = cursor.recorded[cursor.next].clone();
                    let rec_inv: Invocation = self.store.checkout(&rec_ref)?;
                    let rec_req: Request = self.store.checkout(&rec_inv.request)?;

                    if rec_req.invokable == invokable_ref && rec_req.input == input_ref {
                        cursor.next += 1;
                        Decision::Replay(rec_ref, rec_inv)
                    } else if self.opts.strict {
                        return Err(Fail::Fault(Error::ReplayDivergence {
                            index,
                            expected: describe_request(&rec_req),
                            observed: format!(
                                "invokable {} on input {}",
                                invokable_ref.digest(),
                                input_ref.digest()
                            ),
                        }));
                    } else {
                        Decision::Diverge
                    }
                }
                _ => Decision::Live,
            }
        };

        match decision {
            Decision::Replay(rec_ref, rec_inv) => {
                self.replay_child(rec_ref, rec_inv, input, run).await
            }
            Decision::Diverge => {
                self.state.lock().unwrap().replay = None;
                self.run_live(record, invokable_ref, input_ref, input, None, run)
                    .await
            }
            Decision::Live => {
                self.run_live(record, invokable_ref, input_ref, input, None, run)
                    .await
            }
        }
    }

    async fn replay_child(
        &self,
        rec_ref: Ref,
        rec_inv: Invocation,
        input: Value,
        run: AsyncRun,
    ) -> Result<Value, Fail> {
        let response: Response = self.store.checkout(&rec_inv.response)?;

        if let Some(output) = &response.output {
            let payload: Payload = self.store.checkout(output)?;
            self.state.lock().unwrap().children.push(rec_ref);
            return Ok(payload.value);
        }

        if let (Some(raised_ref), true) = (&response.raised, response.raised_here) {
            if let Some(value) = self.opts.override_for(raised_ref) {
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
                self.state.lock().unwrap().children.push(resolved_ref);
                return Ok(value);
            }
            let record = self.store.checkout_record(raised_ref)?;
            self.state.lock().unwrap().children.push(rec_ref);
            return Err(Fail::Raised(Raised::recorded(record, raised_ref.clone())));
        }

        let rec_req: Request = self.store.checkout(&rec_inv.request)?;
        let record = self.store.checkout_record(&rec_req.invokable)?;
        self.run_live(
            record,
            rec_req.invokable,
            rec_req.input,
            input,
            Some(response.children),
            run,
        )
        .await
    }

    async fn run_live(
        &self,
        record: Record,
        invokable_ref: Ref,
        input_ref: Ref,
        input: Value,
        recorded: Option<Vec<Ref>>,
        run: AsyncRun,
    ) -> Result<Value, Fail> {
        self.state.lock().unwrap().open += 1;

        let child = AsyncCx::new(self.store.clone(), self.opts.clone(), recorded);
        let outcome = run(record, child.clone(), input).await;

        let child_state = std::mem::take(&mut *child.state.lock().unwrap());
        if child_state.open != 0 {
            return Err(Fail::Fault(Error::IncompleteSubinvocation {
                index: child_state.children.len(),
            }));
        }

        let (_, child_ref, outcome) = finalize(
            &self.store,
            invokable_ref,
            input_ref,
            child_state.children,
            outcome,
        )?;

        let mut state = self.state.lock().unwrap();
        state.children.push(child_ref);
        state.open -= 1;
        drop(state);

        outcome.map_err(Fail::Raised)
    }
}

/// Invoke an async callable at top level, journaling a root frame.
#[tracing::instrument(skip_all, fields(invokable = F::type_name()))]
pub async fn invoke_async<F: AsyncInvokable>(
    store: &Store,
    f: &F,
    input: Value,
) -> Result<Invocation, Error> {
    ensure_builtins()?;
    root_frame_async(
        store,
        Record::of(f),
        input,
        None,
        Arc::new(Opts::default()),
        bind::erase_async::<F>(),
    )
    .await
}

pub(crate) async fn root_frame_async(
    store: &Store,
    record: Record,
    input: Value,
    recorded: Option<Vec<Ref>>,
    opts: Arc<Opts>,
    run: AsyncRun,
) -> Result<Invocation, Error> {
    let invokable_ref = store.commit(&record)?;
    let input_ref = store.commit_resource(&Payload {
        value: input.clone(),
    })?;

    let cx = AsyncCx::new(store.clone(), opts, recorded);
    let outcome = run(record, cx.clone(), input).await;

    let state = std::mem::take(&mut *cx.state.lock().unwrap());
    if state.open != 0 {
        return Err(Error::IncompleteSubinvocation {
            index: state.children.len(),
        });
    }

    let (invocation, _, _) = finalize(store, invokable_ref, input_ref, state.children, outcome)?;
    Ok(invocation)
}
