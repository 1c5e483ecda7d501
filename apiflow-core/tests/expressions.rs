use apiflow_core::expressions::{assert, evaluate, lookup_path, parse_expression, ExprError, Value};
use serde_json::json;

#[test]
fn assertion_on_status_and_body() {
    let root = json!({
        "response": {
            "status": 200,
            "body": {"ok": true},
            "headers": {"content-type": "application/json"},
            "duration": 12
        }
    });
    let ok = assert("response.status == 200 && response.body.ok == true", &root).unwrap();
    assert!(ok);
}

#[test]
fn assertions_are_deterministic_and_pure() {
    let root = json!({
        "response": {"status": 404, "body": {"items": [1, 2, 3]}},
        "env": {"limit": "3"}
    });
    let before = root.clone();
    let exprs = [
        "response.status >= 400",
        "3 in response.body.items",
        "response.body.items[2] == env.limit",
        "response.missing == 1",
        "response.status < \"abc\"",
    ];
    for src in exprs {
        let first = assert(src, &root).unwrap();
        let second = assert(src, &root).unwrap();
        assert_eq!(first, second, "{src}");
    }
    assert_eq!(root, before);
}

#[test]
fn comparison_operators() {
    let root = json!({"x": 3, "name": "beta", "ratio": 0.5});
    let cases = [
        ("x > 2", true),
        ("x >= 3", true),
        ("x < 3", false),
        ("x <= 2.5", false),
        ("x != 4", true),
        ("x == \"3\"", true),
        ("name > \"alpha\"", true),
        ("name == \"Beta\"", false),
        ("ratio < 1", true),
    ];
    for (src, want) in cases {
        assert_eq!(
            evaluate(src, &root).unwrap(),
            Value::Bool(want),
            "{src}"
        );
    }
}

#[test]
fn membership() {
    let root = json!({"tags": ["a", "b"], "codes": [200, 201], "obj": {"k": 1}});
    assert_eq!(evaluate("\"a\" in tags", &root).unwrap(), Value::Bool(true));
    assert_eq!(evaluate("\"c\" notin tags", &root).unwrap(), Value::Bool(true));
    assert_eq!(evaluate("201.0 in codes", &root).unwrap(), Value::Bool(true));
    assert!(matches!(
        evaluate("1 in obj", &root),
        Err(ExprError::Type(_))
    ));
}

#[test]
fn boolean_logic_and_grouping() {
    let root = json!({"a": true, "b": false, "n": 0});
    assert_eq!(evaluate("!(a && b)", &root).unwrap(), Value::Bool(true));
    assert_eq!(evaluate("b || !n", &root).unwrap(), Value::Bool(true));
    // Short circuit: the right side would miss.
    assert_eq!(evaluate("b && nope.x", &root).unwrap(), Value::Bool(false));
    assert_eq!(evaluate("a || nope.x", &root).unwrap(), Value::Bool(true));
}

#[test]
fn literals_and_bare_paths() {
    let root = json!({"node": {"req-1": {"response": {"body": {"id": "x1"}}}}});
    assert_eq!(evaluate("null", &root).unwrap(), Value::Null);
    assert_eq!(evaluate("-4", &root).unwrap(), Value::Int(-4));
    assert_eq!(
        evaluate("node.req-1.response.body.id", &root).unwrap(),
        Value::String("x1".to_string())
    );
}

#[test]
fn failure_modes() {
    let root = json!({"a": {"b": [1]}, "s": "text"});
    assert!(matches!(evaluate("a.c", &root), Err(ExprError::LookupMiss(p)) if p == "a.c"));
    assert!(matches!(evaluate("a.b[5]", &root), Err(ExprError::LookupMiss(_))));
    assert!(matches!(evaluate("s.len", &root), Err(ExprError::Type(_))));
    assert!(matches!(evaluate("s > 1", &root), Err(ExprError::Type(_))));
    assert!(matches!(evaluate("a ==", &root), Err(ExprError::Parse { .. })));

    // Assertions fold evaluation failures to false but keep parse failures.
    assert!(!assert("a.c == 1", &root).unwrap());
    assert!(!assert("s > 1", &root).unwrap());
    assert!(assert("(a", &root).is_err());
}

#[test]
fn parsed_expression_is_reusable() {
    let expr = parse_expression("count < 3").unwrap();
    assert!(expr.eval_bool(&json!({"count": 1})).unwrap());
    assert!(!expr.eval_bool(&json!({"count": 5})).unwrap());
    assert_eq!(expr.source(), "count < 3");
}

#[test]
fn path_lookup_helper() {
    let root = json!({"items": [{"id": 7}]});
    assert_eq!(lookup_path("items[0].id", &root).unwrap(), &json!(7));
    assert_eq!(lookup_path("items.0.id", &root).unwrap(), &json!(7));
    assert!(lookup_path("1 == 1", &root).is_err());
}

#[test]
fn nested_numeric_segments() {
    let root = json!({"matrix": [[1, 2], [3, 4]], "ids": [4, 5]});
    assert_eq!(lookup_path("matrix.1.0", &root).unwrap(), &json!(3));
    assert!(assert("matrix.0.1 == 2 && ids.1 == 5", &root).unwrap());
}
