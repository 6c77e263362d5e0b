//! The interpreter and the compiler must agree on every expression.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use eel::{
    compile, compile_expression, evaluate, AllowList, BoxError, CompiledExpression, Context, EelObject, Error,
    EvalError, Function, Value,
};
use proptest::prelude::*;

#[derive(Debug, Default)]
struct Probe {
    calls: AtomicUsize,
}

impl EelObject for Probe {
    fn type_name(&self) -> &str {
        "Probe"
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        (name == "calls").then(|| Value::Int(self.calls.load(Ordering::SeqCst) as i64))
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        (name == "label").then(|| Value::from("probe"))
    }

    fn has_method(&self, method: &str) -> bool {
        matches!(method, "explode" | "echo" | "sum")
    }

    fn call_method(&self, method: &str, arguments: &[Value]) -> Result<Value, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method {
            "echo" => Ok(arguments.first().cloned().unwrap_or_default()),
            "sum" => Ok(Value::Int(arguments.iter().filter_map(Value::as_int).sum())),
            _ => Err("kaboom".into()),
        }
    }

    fn to_eel_string(&self) -> Option<String> {
        Some("<probe>".to_string())
    }
}

fn object_context(probe: Arc<Probe>) -> Context {
    let join = Function::new("join", |args| {
        let separator = args.get(1).and_then(Value::as_str).unwrap_or(",");
        match args.first() {
            Some(Value::List(items)) => Ok(Value::from(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => format!("{:?}", other),
                    })
                    .collect::<Vec<_>>()
                    .join(separator),
            )),
            _ => Err("join expects a list".into()),
        }
    });

    Context::new(Value::map([
        ("a", Value::map([("b", Value::Int(5)), ("c", Value::Null)])),
        ("items", Value::list([1, 2, 3])),
        ("words", Value::list(["x", "y"])),
        ("name", Value::from("eel")),
        ("zero", Value::Int(0)),
        ("half", Value::Float(0.5)),
        ("flag", Value::Bool(true)),
        ("numeric", Value::from("12")),
        ("empty", Value::list(Vec::<Value>::new())),
        ("foo", Value::Object(probe)),
        ("Array", Value::map([("join", Value::from(join))])),
    ]))
}

fn contexts() -> Vec<Context> {
    vec![
        object_context(Arc::new(Probe::default())),
        Context::new(Value::list([Value::from("first"), Value::Int(2)])),
        Context::new(Value::Int(42)),
        Context::new(Value::from("scalar")),
        Context::default(),
    ]
}

const CORPUS: &[&str] = &[
    // literals
    "42",
    "-3",
    "1.25",
    "-.5",
    "'single \\' quoted'",
    r#""double \"quoted\" \\ ""#,
    "true",
    "FALSE",
    // paths
    "a",
    "a.b",
    "a.c",
    "a['b']",
    "a.missing.deeper",
    "items[1]",
    "items['2']",
    "items[zero]",
    "items[-1]",
    "words[items[0]]",
    "foo.calls",
    "foo.label",
    "foo.echo(name)",
    "foo.echo(a).b",
    "foo.sum(1, 2, items[2])",
    "foo.unknown(1)",
    "Array.join(words, '-')",
    "Array.join(words)",
    "name.length",
    "0",
    // collections
    "[]",
    "[1, 2, 3]",
    "[a.b, [name, []], {k: zero}]",
    "{}",
    "{x: 1, y: 2}",
    "{'quoted key': 1, 7: 'seven', [name]: a.b}",
    "{0: 'a', 1: 'b'}",
    "{x: 1, x: 2}",
    // arithmetic
    "1 + 2",
    "1 + '2'",
    "'n=' + a.b",
    "name + foo",
    "numeric * 2",
    "half + 1",
    "7 / 2",
    "8 / 2",
    "7 % 3",
    "2 * 3 + 4 * 5",
    "(2 + 3) * 4",
    "10 - 2 - 3",
    "a.c + 1",
    "flag + flag",
    "items[0] - -1",
    "9223372036854775807 + 1",
    // comparison
    "1 == 1",
    "1 == 1.0",
    "'1' != 1",
    "a.b >= 5",
    "name < 'zzz'",
    "half < items[0]",
    "a.c == a.missing",
    "items == [1, 2, 3]",
    "{x: 1, y: 2} == {y: 2, x: 1}",
    "'a' < 1",
    // logical
    "!flag",
    "!!items",
    "not empty",
    "zero && foo.explode()",
    "false && foo.explode()",
    "name || foo.explode()",
    "zero || name",
    "flag and a.b",
    "empty or 'fallback'",
    "a.b > 1 && a.b < 10 || false",
    // ternary
    "1 > 0 ? 'yes' : 'no'",
    "0 > 1 ? 'yes' : 'no'",
    "a.c ? a.b : items",
    "flag ? zero ? 1 : 2 : 3",
    "foo.calls",
    // failures
    "'abc' - 1",
    "1 / zero",
    "5 % 0",
    "foo.explode()",
    "[1] * 2",
    "{[items]: 1}",
    "flag ? 1 : 1 / 0",
];

fn interpret(expression: &str, context: &Context) -> Result<Value, String> {
    evaluate(expression, context).map_err(|e| e.to_string())
}

fn invoke(compiled: &CompiledExpression, context: &Context) -> Result<Value, String> {
    compiled.invoke(context).map_err(|e| e.to_string())
}

#[test]
fn backends_agree_on_corpus() {
    for expression in CORPUS {
        let compiled = compile_expression(expression)
            .unwrap_or_else(|e| panic!("failed to compile {}: {}", expression, e));

        // Fresh contexts for each backend so that probe call counters line up.
        for (interpreted_context, compiled_context) in contexts().into_iter().zip(contexts()) {
            let interpreted = interpret(expression, &interpreted_context);
            let invoked = invoke(&compiled, &compiled_context);
            assert_eq!(
                interpreted,
                invoked,
                "backends disagree on {} against {:?}\nfragment: {}",
                expression,
                interpreted_context.unwrap(),
                compiled.fragment()
            );
        }
    }
}

#[test]
fn out_of_range_literals_fail_in_both_backends() {
    let huge = format!("1{}", "0".repeat(400));
    let context = Context::default();

    for expression in [huge.clone(), format!("-{}", huge), format!("[1, {}.5]", huge)] {
        assert!(
            matches!(evaluate(&expression, &context), Err(Error::Syntax { .. })),
            "{}",
            expression
        );
        assert!(
            matches!(compile_expression(&expression), Err(Error::Syntax { .. })),
            "{}",
            expression
        );
    }

    // Large but finite literals still agree.
    let large = format!("1{}", "0".repeat(300));
    let compiled = compile_expression(&large).unwrap();
    assert_eq!(evaluate(&large, &context).unwrap(), compiled.invoke(&context).unwrap());
}

#[test]
fn string_coercion() {
    let context = Context::default();
    assert_eq!(evaluate("1 + '2'", &context).unwrap(), Value::from("12"));
    assert_eq!(evaluate("1 + 2", &context).unwrap(), Value::Int(3));
}

#[test]
fn short_circuit_does_not_invoke_right_operand() {
    let probe = Arc::new(Probe::default());
    let context = object_context(Arc::clone(&probe));

    assert_eq!(evaluate("false && foo.explode()", &context).unwrap(), Value::Bool(false));
    let compiled = compile_expression("false && foo.explode()").unwrap();
    assert_eq!(compiled.invoke(&context).unwrap(), Value::Bool(false));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

    let err = evaluate("true && foo.explode()", &context).unwrap_err();
    assert!(matches!(err, Error::Eval { source: EvalError::MethodFailed { .. } }));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn ternary_selects_branch() {
    let context = Context::default();
    assert_eq!(evaluate("1 > 0 ? 'yes' : 'no'", &context).unwrap(), Value::from("yes"));
    assert_eq!(evaluate("0 > 1 ? 'yes' : 'no'", &context).unwrap(), Value::from("no"));
}

#[test]
fn safe_navigation() {
    let context = Context::new(Value::map([("a", Value::map([("b", 5)]))]));
    assert_eq!(evaluate("a.b", &context).unwrap(), Value::Int(5));
    assert_eq!(evaluate("a.missing.deeper", &context).unwrap(), Value::Null);
    assert_eq!(compile_expression("a.missing.deeper").unwrap().invoke(&context).unwrap(), Value::Null);
}

#[test]
fn collection_literals_preserve_order() {
    let context = Context::default();
    assert_eq!(evaluate("[1,2,3]", &context).unwrap(), Value::list([1, 2, 3]));

    let Value::Map(entries) = evaluate("{x:1,y:2}", &context).unwrap() else {
        panic!("expected a map");
    };
    assert_eq!(entries.keys().map(String::as_str).collect::<Vec<_>>(), vec!["x", "y"]);
}

#[test]
fn compilation_is_idempotent_and_invocation_is_stateless() {
    let expression = "items[0] + a.b > 3 ? [name, a.b] : {n: name}";
    assert_eq!(compile(expression).unwrap(), compile(expression).unwrap());

    let compiled = compile_expression(expression).unwrap();
    let rich = object_context(Arc::new(Probe::default()));
    let before = compiled.invoke(&rich).unwrap();
    for context in contexts() {
        let _ = compiled.invoke(&context);
    }
    assert_eq!(compiled.invoke(&rich).unwrap(), before);
}

#[test]
fn compiled_fragments_can_be_stored_and_reloaded() {
    let fragment = compile("{total: foo.sum(items[0], items[2]), tag: 'x' + name}").unwrap();
    let reloaded = CompiledExpression::from_fragment(fragment.clone()).unwrap();
    assert_eq!(reloaded.fragment(), fragment);

    let context = object_context(Arc::new(Probe::default()));
    assert_eq!(
        reloaded.invoke(&context).unwrap(),
        Value::map([("total", Value::Int(4)), ("tag", Value::from("xeel"))])
    );
}

#[test]
fn protected_contexts_agree() {
    let value = object_context(Arc::new(Probe::default())).into_inner();
    let protected = Context::protected(value, AllowList::from_patterns(["Array.*"]));

    for expression in ["Array.join(words, '+')", "foo.echo(1)", "a.b.c(1)", "missing.call()"] {
        let compiled = compile_expression(expression).unwrap();
        assert_eq!(
            interpret(expression, &protected),
            invoke(&compiled, &protected),
            "backends disagree on {}",
            expression
        );
    }

    let err = compile_expression("foo.echo(1)").unwrap().invoke(&protected).unwrap_err();
    assert!(matches!(err, EvalError::CapabilityDenied { ref method } if method == "echo"));
}

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        (-20i64..20).prop_map(|i| i.to_string()),
        (0u32..400).prop_map(|i| format!("{}.{}", i / 100, i % 100)),
        prop::sample::select(vec![
            "'a'", "'3'", "''", "'0'", "true", "false", "a.b", "a.c", "items[1]", "items[zero]", "missing", "name",
            "zero", "half", "numeric", "empty", "[]", "{}",
        ])
        .prop_map(str::to_string),
    ]
}

fn expression() -> impl Strategy<Value = String> {
    leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (
                inner.clone(),
                prop::sample::select(vec![
                    "+", "-", "*", "/", "%", "==", "!=", "<", "<=", ">", ">=", "&&", "||"
                ]),
                inner.clone()
            )
                .prop_map(|(l, op, r)| format!("({} {} {})", l, op, r)),
            inner.clone().prop_map(|e| format!("!({})", e)),
            (inner.clone(), inner.clone(), inner.clone()).prop_map(|(c, t, e)| format!("({} ? {} : {})", c, t, e)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(|items| format!("[{}]", items.join(", "))),
            (inner.clone(), inner).prop_map(|(k, v)| format!("{{[{}]: {}}}", k, v)),
        ]
    })
}

proptest! {
    #[test]
    fn backends_agree_on_generated_expressions(expression in expression()) {
        let compiled = compile_expression(&expression).unwrap();
        let context = object_context(Arc::new(Probe::default()));
        prop_assert_eq!(interpret(&expression, &context), invoke(&compiled, &context), "{}", compiled.fragment());
    }
}
