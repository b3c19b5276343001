// End-to-end scenarios: each test drives the full stack (registry,
// packer, store, builder, replay) the way user code does.

use enact::prelude::*;
use enact::{Error, InputRequest, InputRequests, Payload};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::VecDeque;

// ---- Commit/checkout round-trip. ----

#[derive(Debug, Clone, PartialEq)]
struct MyResource {
    my_field: String,
    my_other_field: i64,
}

impl Resource for MyResource {
    fn type_name() -> &'static str {
        "scenarios.MyResource"
    }
    fn field_names() -> &'static [&'static str] {
        &["my_field", "my_other_field"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.my_field.as_str()),
            Value::from(self.my_other_field),
        ]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            my_field: fields.take_string("my_field")?,
            my_other_field: fields.take_i64("my_other_field")?,
        })
    }
}

#[test]
fn test_commit_checkout_round_trip() -> anyhow::Result<()> {
    register::<MyResource>()?;
    let store = Store::in_memory();

    let fixture = MyResource {
        my_field: "hello".to_string(),
        my_other_field: 42,
    };
    let reference = store.commit_resource(&fixture)?;

    assert_eq!(reference.digest().to_hex().len(), 64);
    assert!(reference
        .digest()
        .to_hex()
        .chars()
        .all(|c| c.is_ascii_hexdigit()));
    assert_eq!(store.checkout::<MyResource>(&reference)?, fixture);

    // Committing the same value again returns the equal Ref.
    assert_eq!(store.commit_resource(&fixture)?, reference);
    Ok(())
}

// ---- Linked-list acyclicity. ----

#[derive(Debug, Clone, PartialEq)]
struct LinkedList {
    value: i64,
    next: Option<Ref>,
}

impl Resource for LinkedList {
    fn type_name() -> &'static str {
        "scenarios.LinkedList"
    }
    fn field_names() -> &'static [&'static str] {
        &["value", "next"]
    }
    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::int(self.value),
            match &self.next {
                Some(next) => Value::Ref(next.clone()),
                None => Value::Null,
            },
        ]
    }
    fn from_fields(mut fields: FieldMap) -> Result<Self, resource::Error> {
        Ok(Self {
            value: fields.take_i64("value")?,
            next: fields.take_opt_ref("next")?,
        })
    }
}

#[test]
fn test_linked_list_builds_a_dag() {
    register::<LinkedList>().unwrap();
    let store = Store::in_memory();

    // A Ref must be computed before it can be embedded, so the chain is
    // committed innermost-first and cycles cannot form.
    let three = store
        .commit_resource(&LinkedList {
            value: 3,
            next: None,
        })
        .unwrap();
    let two = store
        .commit_resource(&LinkedList {
            value: 2,
            next: Some(three.clone()),
        })
        .unwrap();
    let one = store
        .commit_resource(&LinkedList {
            value: 1,
            next: Some(two.clone()),
        })
        .unwrap();

    assert_ne!(one, two);
    assert_ne!(two, three);
    assert_ne!(one, three);

    let mut walked = Vec::new();
    let mut cursor = Some(one);
    while let Some(reference) = cursor {
        let node: LinkedList = store.checkout(&reference).unwrap();
        walked.push(node.value);
        cursor = node.next;
    }
    assert_eq!(walked, vec![1, 2, 3]);
}

// ---- Journaled dice rolls: record, rewind, resample, diverge. ----

thread_local! {
    // Stand-in for a seeded RNG: rolls are read (unjournaled) from here.
    static ROLLS: RefCell<VecDeque<i64>> = const { RefCell::new(VecDeque::new()) };
}

fn seed_rolls(rolls: &[i64]) {
    ROLLS.with(|queue| *queue.borrow_mut() = rolls.iter().copied().collect());
}

fn next_roll() -> i64 {
    ROLLS.with(|queue| queue.borrow_mut().pop_front().expect("rolls exhausted"))
}

#[derive(Debug, Clone, PartialEq)]
struct RollDie;

impl Resource for RollDie {
    fn type_name() -> &'static str {
        "scenarios.RollDie"
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

impl Invokable for RollDie {
    fn call(&self, _cx: &mut Cx, _sides: Value) -> Result<Value, Fail> {
        Ok(Value::int(next_roll()))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RollSum;

impl Resource for RollSum {
    fn type_name() -> &'static str {
        "scenarios.RollSum"
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

impl Invokable for RollSum {
    fn call(&self, cx: &mut Cx, input: Value) -> Result<Value, Fail> {
        let n = input.as_u64().unwrap_or(0);
        let mut sum = 0;
        for _ in 0..n {
            sum += cx.invoke(&RollDie, Value::int(6))?.as_i64().unwrap_or(0);
        }
        Ok(Value::int(sum))
    }
}

fn register_dice() {
    register_invokable::<RollDie>().unwrap();
    register_invokable::<RollSum>().unwrap();
}

#[test]
fn test_journaled_dice_roll() {
    register_dice();
    let store = Store::in_memory();
    seed_rolls(&[2, 5]);

    let invocation = journal_invoke(&store, &RollSum, Value::int(2));
    assert_eq!(invocation.output_value(&store).unwrap(), Some(Value::int(7)));

    let children = invocation.children(&store).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].output_value(&store).unwrap(), Some(Value::int(2)));
    assert_eq!(children[1].output_value(&store).unwrap(), Some(Value::int(5)));
}

#[test]
fn test_rewind_and_resample() {
    register_dice();
    let store = Store::in_memory();
    seed_rolls(&[2, 5, 6]);

    let invocation = journal_invoke(&store, &RollSum, Value::int(2));

    // Rewinding one leaf drops the second roll and reopens the root.
    let rewound = invocation.rewind(&store, 1).unwrap();
    let response = rewound.response(&store).unwrap();
    assert!(!response.is_complete());
    assert_eq!(response.children.len(), 1);
    assert_eq!(
        rewound.children(&store).unwrap()[0]
            .output_value(&store)
            .unwrap(),
        Some(Value::int(2))
    );

    // Replay memoizes the first roll and resamples the second.
    let replayed = rewound.replay(&store).unwrap();
    assert_eq!(replayed.output_value(&store).unwrap(), Some(Value::int(8)));

    let children = replayed.children(&store).unwrap();
    assert_eq!(children[0].output_value(&store).unwrap(), Some(Value::int(2)));
    assert_eq!(children[1].output_value(&store).unwrap(), Some(Value::int(6)));

    // The memoized prefix keeps its digests (rewind monotonicity).
    assert_eq!(
        replayed.response(&store).unwrap().children[0],
        invocation.response(&store).unwrap().children[0]
    );
}

// A callable whose journaled subcall input depends on an unjournaled
// (plain) read, so strict replay must flag the divergence.

#[derive(Debug, Clone, PartialEq)]
struct FormatRoll;

impl Resource for FormatRoll {
    fn type_name() -> &'static str {
        "scenarios.FormatRoll"
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

impl Invokable for FormatRoll {
    fn call(&self, _cx: &mut Cx, input: Value) -> Result<Value, Fail> {
        Ok(Value::String(format!("rolled {input}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FormatNextRoll;

impl Resource for FormatNextRoll {
    fn type_name() -> &'static str {
        "scenarios.FormatNextRoll"
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

impl Invokable for FormatNextRoll {
    fn call(&self, cx: &mut Cx, _input: Value) -> Result<Value, Fail> {
        // next_roll() is a plain call: invisible to the journal.
        let roll = next_roll();
        cx.invoke(&FormatRoll, Value::int(roll))
    }
}

#[test]
fn test_divergence_detection() {
    register_invokable::<FormatRoll>().unwrap();
    register_invokable::<FormatNextRoll>().unwrap();
    let store = Store::in_memory();
    seed_rolls(&[4, 5]);

    let invocation = journal_invoke(&store, &FormatNextRoll, Value::Null);
    let rewound = invocation.rewind(&store, 0).unwrap();

    match rewound.replay(&store).unwrap_err() {
        Error::ReplayDivergence {
            index,
            expected,
            observed,
        } => {
            assert_eq!(index, 0);
            // The same invokable was called on a different input digest.
            assert_ne!(expected, observed);
        }
        other => panic!("expected ReplayDivergence, got {other:?}"),
    }
}

// ---- Input-request resolution. ----

#[derive(Debug, Clone, PartialEq)]
struct SumTenInputs;

impl Resource for SumTenInputs {
    fn type_name() -> &'static str {
        "scenarios.SumTenInputs"
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

impl Invokable for SumTenInputs {
    fn call(&self, cx: &mut Cx, _input: Value) -> Result<Value, Fail> {
        let mut sum = 0;
        for i in 0..10 {
            let supplied =
                cx.request_input(Payload::type_id(), Value::int(i), Value::Null)?;
            sum += supplied.as_i64().unwrap_or(0);
        }
        Ok(Value::int(sum))
    }
}

#[test]
fn test_input_request_resolution() {
    register_invokable::<SumTenInputs>().unwrap();
    let store = Store::in_memory();

    let invocation = journal_invoke(&store, &SumTenInputs, Value::Null);

    // The run suspended on its first request.
    let raised = invocation.raised_record(&store).unwrap().unwrap();
    let request: InputRequest = raised.decode().unwrap();
    assert_eq!(request.for_value, Value::int(0));

    // Drive it to completion, answering request i with (i mod 7) + 1.
    let mut requests = InputRequests::new(&store, invocation);
    while let Some(request) = requests.next().unwrap() {
        let i = request.for_value.as_i64().unwrap();
        requests.set_input(Value::int((i % 7) + 1));
    }

    let finished = requests.into_invocation();
    assert_eq!(finished.output_value(&store).unwrap(), Some(Value::int(34)));
}

// ---- Ambient store facade. ----

#[test]
fn test_ambient_invoke() {
    register_dice();
    let store = Store::in_memory();
    seed_rolls(&[3]);

    let _guard = store.enter();
    let invocation = enact::invoke(&RollSum, Value::int(1)).unwrap();
    assert_eq!(invocation.output_value(&store).unwrap(), Some(Value::int(3)));
}

#[test]
fn test_invoke_outside_store_scope_fails() {
    register_dice();
    let err = enact::invoke(&RollSum, Value::int(1)).unwrap_err();
    assert!(matches!(err, Error::Store(store::Error::NoActiveStore)));
}

// invoke via the explicit-store entry point, asserting no fault occurred.
fn journal_invoke<F: Invokable>(store: &Store, f: &F, input: Value) -> enact::Invocation {
    enact::invoke_in(store, f, input).unwrap()
}
