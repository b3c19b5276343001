use journal::{Error, Invocation, Payload, Request, Response};
use store::Store;

/// Render a journaled invocation tree as indented text, one line per
/// call: the invokable's type name, its input, and how it concluded.
/// The rendering is informational only; the journal itself is the
/// committed Invocation tree.
pub fn summary(store: &Store, invocation: &Invocation) -> Result<String, Error> {
    let mut out = String::new();
    render(store, invocation, 0, &mut out)?;
    Ok(out)
}

fn render(
    store: &Store,
    invocation: &Invocation,
    depth: usize,
    out: &mut String,
) -> Result<(), Error> {
    let request: Request = store.checkout(&invocation.request)?;
    let invokable = store.checkout_record(&request.invokable)?;
    let input = store.checkout::<Payload>(&request.input)?.value;
    let response: Response = store.checkout(&invocation.response)?;

    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!("{}({input})", invokable.type_id().name()));

    if let Some(output) = &response.output {
        let output = store.checkout::<Payload>(output)?.value;
        out.push_str(&format!(" -> {output}"));
    } else if let Some(raised) = &response.raised {
        let raised = store.checkout_record(raised)?;
        let origin = if response.raised_here { "raised" } else { "reraised" };
        out.push_str(&format!(" {origin} {raised}"));
    } else {
        out.push_str(" (incomplete)");
    }
    out.push('\n');

    for child in &response.children {
        render(store, &store.checkout(child)?, depth + 1, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::summary;
    use journal::{invoke, register_invokable, Cx, Fail, Invokable};
    use resource::{FieldMap, Resource, Value};
    use store::Store;

    #[derive(Debug, Clone, PartialEq)]
    struct Halve;

    impl Resource for Halve {
        fn type_name() -> &'static str {
            "summary.Halve"
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

    impl Invokable for Halve {
        fn call(&self, _cx: &mut Cx, input: Value) -> Result<Value, Fail> {
            match input.as_i64().unwrap_or(0) {
                n if n % 2 == 0 => Ok(Value::int(n / 2)),
                n => Err(Fail::condition("odd", Value::int(n))),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct HalveAll;

    impl Resource for HalveAll {
        fn type_name() -> &'static str {
            "summary.HalveAll"
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

    impl Invokable for HalveAll {
        fn call(&self, cx: &mut Cx, input: Value) -> Result<Value, Fail> {
            let n = input.as_i64().unwrap_or(0);
            let half = cx.invoke(&Halve, Value::int(n))?.as_i64().unwrap_or(0);
            cx.invoke(&Halve, Value::int(half))
        }
    }

    #[test]
    fn test_summary_of_completed_run() {
        register_invokable::<Halve>().unwrap();
        register_invokable::<HalveAll>().unwrap();
        let store = Store::in_memory();

        let invocation = invoke(&store, &HalveAll, Value::int(8)).unwrap();
        insta::assert_snapshot!(summary(&store, &invocation).unwrap(), @r###"
        summary.HalveAll(8) -> 2
          summary.Halve(8) -> 4
          summary.Halve(4) -> 2
        "###);
    }

    #[test]
    fn test_summary_of_raised_run() {
        register_invokable::<Halve>().unwrap();
        register_invokable::<HalveAll>().unwrap();
        let store = Store::in_memory();

        let invocation = invoke(&store, &HalveAll, Value::int(6)).unwrap();
        insta::assert_snapshot!(summary(&store, &invocation).unwrap(), @r###"
        summary.HalveAll(6) reraised enact.Condition{kind: "odd", detail: 3}
          summary.Halve(6) -> 3
          summary.Halve(3) raised enact.Condition{kind: "odd", detail: 3}
        "###);
    }

    #[test]
    fn test_summary_of_rewound_run() {
        register_invokable::<Halve>().unwrap();
        register_invokable::<HalveAll>().unwrap();
        let store = Store::in_memory();

        let invocation = invoke(&store, &HalveAll, Value::int(8)).unwrap();
        let rewound = invocation.rewind(&store, 1).unwrap();
        insta::assert_snapshot!(summary(&store, &rewound).unwrap(), @r###"
        summary.HalveAll(8) (incomplete)
          summary.Halve(8) -> 4
        "###);
    }
}
