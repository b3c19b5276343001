use super::{Error, InputRequest, Invocation, ReplayOptions, Response};
use resource::{Ref, Resource, Value};
use store::Store;
use std::collections::HashMap;
use std::sync::Arc;

fn override_from(overrides: &HashMap<Ref, Value>) -> ReplayOptions {
    let overrides = overrides.clone();
    ReplayOptions {
        non_strict: false,
        exception_override: Some(Arc::new(move |raised| overrides.get(raised).cloned())),
    }
}

/// InputRequests drives a suspended invocation as a lazy sequence of
/// input requests: next() yields the run's next unresolved InputRequest,
/// set_input() answers the most recently yielded one, and the run
/// advances by replaying with all answers gathered so far.
pub struct InputRequests<'s> {
    store: &'s Store,
    invocation: Invocation,
    overrides: HashMap<Ref, Value>,
    last: Option<Ref>,
}

impl<'s> InputRequests<'s> {
    pub fn new(store: &'s Store, invocation: Invocation) -> Self {
        Self {
            store,
            invocation,
            overrides: HashMap::new(),
            last: None,
        }
    }

    /// Answer the most recently yielded request. The answer takes effect
    /// on the next call to next().
    pub fn set_input(&mut self, value: Value) {
        if let Some(last) = self.last.take() {
            self.overrides.insert(last, value);
        }
    }

    /// Replay with the answers so far and yield the next unresolved
    /// InputRequest, or None once the run completes (or raises a
    /// condition that is not an input request).
    pub fn next(&mut self) -> Result<Option<InputRequest>, Error> {
        self.invocation = self
            .invocation
            .replay_with(self.store, override_from(&self.overrides))?;

        match self.invocation.response(self.store)?.raised {
            Some(raised) => {
                let record = self.store.checkout_record(&raised)?;
                if *record.type_id() != InputRequest::type_id() {
                    return Ok(None);
                }
                self.last = Some(raised);
                Ok(Some(record.decode()?))
            }
            None => Ok(None),
        }
    }

    /// The invocation of the most recent replay round.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn into_invocation(self) -> Invocation {
        self.invocation
    }
}

/// AsyncInputRequests is the cooperative-async driver. Where the
/// generator driver answers one request at a time, async runs may gather
/// several concurrent requests per round, so answers are keyed by each
/// request's own committed Ref and a round resolves every answered
/// request at once.
pub struct AsyncInputRequests<'s> {
    store: &'s Store,
    invocation: Invocation,
    overrides: HashMap<Ref, Value>,
}

impl<'s> AsyncInputRequests<'s> {
    pub fn new(store: &'s Store, invocation: Invocation) -> Self {
        Self {
            store,
            invocation,
            overrides: HashMap::new(),
        }
    }

    /// All unresolved InputRequests recorded anywhere in the current
    /// invocation tree, paired with the Refs that key their answers.
    pub fn pending(&self) -> Result<Vec<(Ref, InputRequest)>, Error> {
        let mut pending = Vec::new();
        self.walk(&self.invocation, &mut pending)?;
        Ok(pending)
    }

    fn walk(
        &self,
        invocation: &Invocation,
        pending: &mut Vec<(Ref, InputRequest)>,
    ) -> Result<(), Error> {
        let response: Response = self.store.checkout(&invocation.response)?;
        for child in &response.children {
            self.walk(&self.store.checkout(child)?, pending)?;
        }
        if let (Some(raised), true) = (response.raised, response.raised_here) {
            if !self.overrides.contains_key(&raised) && !pending.iter().any(|(r, _)| *r == raised)
            {
                let record = self.store.checkout_record(&raised)?;
                if *record.type_id() == InputRequest::type_id() {
                    let request = record.decode()?;
                    pending.push((raised, request));
                }
            }
        }
        Ok(())
    }

    /// Answer the request keyed by |request|.
    pub fn set_input(&mut self, request: &Ref, value: Value) {
        self.overrides.insert(request.clone(), value);
    }

    /// Replay one round with the answers so far. Returns true once the
    /// run is complete.
    pub async fn step(&mut self) -> Result<bool, Error> {
        self.invocation = self
            .invocation
            .replay_async_with(self.store, override_from(&self.overrides))
            .await?;
        Ok(self.invocation.response(self.store)?.output.is_some())
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn into_invocation(self) -> Invocation {
        self.invocation
    }
}
