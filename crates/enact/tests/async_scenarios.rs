// Cooperative-async scenarios: gathered sibling calls, completion-order
// journaling, and concurrent input-request resolution.

use enact::prelude::*;
use enact::{AsyncInputRequests, Payload};
use pretty_assertions::assert_eq;

// Asks for one external integer, identified by its index.
#[derive(Debug, Clone, PartialEq)]
struct AskFor {
    index: i64,
}

impl Resource for AskFor {
    fn type_name() -> &'static str {
        "async_scenarios.AskFor"
    }
    fn field_names() -> &'static [&'static str] {
        &["index"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![Value::int(self.index)]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            index: fields.take_i64("index")?,
        })
    }
}

#[async_trait::async_trait]
impl AsyncInvokable for AskFor {
    async fn call(&self, cx: AsyncCx, _input: Value) -> Result<Value, Fail> {
        cx.request_input(Payload::type_id(), Value::int(self.index), Value::Null)
            .await
    }
}

// Gathers three concurrent requests and sums their answers.
#[derive(Debug, Clone, PartialEq)]
struct SumThreeAnswers;

impl Resource for SumThreeAnswers {
    fn type_name() -> &'static str {
        "async_scenarios.SumThreeAnswers"
    }
    fn field_names() -> &'static [&'static str] {
        &[]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![]
    }
    fn from_fields(_: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self)
    }
}

#[async_trait::async_trait]
impl AsyncInvokable for SumThreeAnswers {
    async fn call(&self, cx: AsyncCx, _input: Value) -> Result<Value, Fail> {
        let answers = cx
            .gather(vec![
                (AskFor { index: 0 }, Value::Null),
                (AskFor { index: 1 }, Value::Null),
                (AskFor { index: 2 }, Value::Null),
            ])
            .await?;

        let mut sum = 0;
        for answer in answers {
            sum += answer.map_err(Fail::Raised)?.as_i64().unwrap_or(0);
        }
        Ok(Value::int(sum))
    }
}

fn register_all() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    register_async_invokable::<AskFor>().unwrap();
    register_async_invokable::<SumThreeAnswers>().unwrap();
}

#[tokio::test]
async fn test_concurrent_input_requests_resolve_by_ref() {
    register_all();
    let store = Store::in_memory();

    let invocation = enact::invoke_async_in(&store, &SumThreeAnswers, Value::Null)
        .await
        .unwrap();

    // All three requests were journaled, even though only one raise
    // propagated to the root.
    let mut driver = AsyncInputRequests::new(&store, invocation);
    let pending = driver.pending().unwrap();
    assert_eq!(pending.len(), 3);

    let mut indices: Vec<i64> = pending
        .iter()
        .map(|(_, request)| request.for_value.as_i64().unwrap())
        .collect();
    indices.sort();
    assert_eq!(indices, vec![0, 1, 2]);

    // Answers are keyed by each request's own Ref, so concurrent
    // requests cannot collide.
    for (reference, request) in pending {
        let index = request.for_value.as_i64().unwrap();
        driver.set_input(&reference, Value::int(10 * (index + 1)));
    }

    assert!(driver.step().await.unwrap());
    let finished = driver.into_invocation();
    assert_eq!(
        finished.output_value(&store).unwrap(),
        Some(Value::int(60))
    );
}

#[tokio::test]
async fn test_async_replay_reuses_resolved_runs() {
    register_all();
    let store = Store::in_memory();

    let invocation = enact::invoke_async_in(&store, &SumThreeAnswers, Value::Null)
        .await
        .unwrap();

    let mut driver = AsyncInputRequests::new(&store, invocation);
    for (reference, request) in driver.pending().unwrap() {
        let index = request.for_value.as_i64().unwrap();
        driver.set_input(&reference, Value::int(index));
    }
    assert!(driver.step().await.unwrap());
    let finished = driver.into_invocation();

    // A further strict replay of the completed run reuses it outright.
    let replayed = finished
        .replay_async_with(&store, ReplayOptions::default())
        .await
        .unwrap();
    assert_eq!(
        replayed.to_ref(&store).unwrap(),
        finished.to_ref(&store).unwrap()
    );
}
