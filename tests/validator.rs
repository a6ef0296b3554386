use percheron::{Context, ErrorKind, Format, OneOf, SchemaIndex};
use serde_json::{json, Value};

fn compile(schema: Value) -> (Context, SchemaIndex) {
    let mut ctx = Context::new();
    ctx.add_resource("schema.json", schema).unwrap();
    let sch = ctx.compile("schema.json").unwrap();
    (ctx, sch)
}

#[test]
fn test_integer_minimum_valid() {
    let (mut ctx, sch) = compile(json!({"type": "integer", "minimum": 0}));
    let result = ctx.validate(&json!(5), sch);
    assert!(result.valid);
    assert!(result.errors.is_empty());
}

#[test]
fn test_minimum_violation() {
    let (mut ctx, sch) = compile(json!({"type": "integer", "minimum": 0}));
    let result = ctx.validate(&json!(-1), sch);
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].keyword(), Some("minimum"));
}

#[test]
fn test_required_missing_property() {
    let (mut ctx, sch) = compile(json!({
        "type": "object",
        "properties": { "name": { "type": "string" } },
        "required": ["name"]
    }));
    let result = ctx.validate(&json!({}), sch);
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].keyword(), Some("required"));
    assert!(result.errors[0].message().contains("name"));
}

#[test]
fn test_unique_items() {
    let (mut ctx, sch) = compile(json!({
        "type": "array",
        "items": { "type": "integer" },
        "uniqueItems": true
    }));
    let result = ctx.validate(&json!([1, 2, 2]), sch);
    assert!(!result.valid);
    let err = &result.errors[0];
    assert_eq!(err.keyword(), Some("uniqueItems"));
    assert!(matches!(err.kind, ErrorKind::UniqueItems { got: [1, 2] }));
}

#[test]
fn test_all_of_nested_error() {
    let (mut ctx, sch) = compile(json!({
        "allOf": [ { "minimum": 0 }, { "maximum": 10 } ]
    }));
    assert!(ctx.validate(&json!(5), sch).valid);

    let result = ctx.validate(&json!(15), sch);
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    let err = &result.errors[0];
    assert_eq!(err.keyword(), Some("allOf"));
    assert_eq!(err.causes.len(), 1);
    assert_eq!(err.causes[0].keyword(), Some("maximum"));
}

#[test]
fn test_ref_to_defs() {
    let (mut ctx, sch) = compile(json!({
        "$ref": "#/$defs/pos",
        "$defs": {
            "pos": { "type": "integer", "exclusiveMinimum": 0 }
        }
    }));
    assert!(ctx.validate(&json!(1), sch).valid);

    let result = ctx.validate(&json!(0), sch);
    assert!(!result.valid);
    let err = &result.errors[0];
    assert_eq!(err.keyword(), Some("$ref"));
    assert_eq!(err.causes[0].keyword(), Some("exclusiveMinimum"));
}

#[test]
fn test_one_of_multiple_matches() {
    let (mut ctx, sch) = compile(json!({
        "oneOf": [ { "type": "integer" }, { "minimum": 0 } ]
    }));
    let result = ctx.validate(&json!(5), sch);
    assert!(!result.valid);
    let err = &result.errors[0];
    assert_eq!(err.keyword(), Some("oneOf"));
    assert!(matches!(
        err.kind,
        ErrorKind::OneOf(OneOf::MultiMatch(0, 1))
    ));

    // a string matches neither branch
    let (mut ctx, sch) = compile(json!({
        "oneOf": [ { "type": "integer" }, { "type": "boolean" } ]
    }));
    let result = ctx.validate(&json!("x"), sch);
    assert!(!result.valid);
    assert!(matches!(
        result.errors[0].kind,
        ErrorKind::OneOf(OneOf::NoneMatch)
    ));
}

#[test]
fn test_numeric_equality() {
    // 1 and 1.0 are the same value for uniqueItems and const
    let (mut ctx, sch) = compile(json!({"uniqueItems": true}));
    assert!(!ctx.validate(&json!([1, 1.0]), sch).valid);

    let (mut ctx, sch) = compile(json!({"const": 1}));
    assert!(ctx.validate(&json!(1.0), sch).valid);
}

#[test]
fn test_recursive_schema_terminates() {
    let (mut ctx, sch) = compile(json!({
        "$id": "#self",
        "type": "object",
        "properties": {
            "next": { "$ref": "#self" }
        }
    }));
    let instance = json!({ "next": { "next": { "next": {} } } });
    assert!(ctx.validate(&instance, sch).valid);
    assert!(!ctx.validate(&json!({ "next": 1 }), sch).valid);
}

#[test]
fn test_unresolvable_ref_fails_not_hangs() {
    // no $id/$anchor declares "self", so the reference cannot resolve
    let (mut ctx, sch) = compile(json!({
        "properties": {
            "next": { "$ref": "#self" }
        }
    }));
    let result = ctx.validate(&json!({ "next": 1 }), sch);
    assert!(!result.valid);
    let err = &result.errors[0];
    assert_eq!(err.keyword(), Some("properties"));
    assert!(matches!(
        err.causes[0].kind,
        ErrorKind::InvalidReference { .. }
    ));
}

#[test]
fn test_ref_cycle_detected() {
    let (mut ctx, sch) = compile(json!({
        "$id": "#self",
        "$ref": "#self"
    }));
    let result = ctx.validate(&json!(1), sch);
    assert!(!result.valid);
    let err = &result.errors[0];
    assert_eq!(err.keyword(), Some("$ref"));
    assert!(matches!(err.causes[0].kind, ErrorKind::RefCycle { .. }));
}

#[test]
fn test_unevaluated_properties_across_all_of() {
    let (mut ctx, sch) = compile(json!({
        "allOf": [
            { "properties": { "a": { "type": "integer" } } }
        ],
        "unevaluatedProperties": false
    }));
    assert!(ctx.validate(&json!({ "a": 1 }), sch).valid);

    let result = ctx.validate(&json!({ "a": 1, "b": 2 }), sch);
    assert!(!result.valid);
    let err = &result.errors[0];
    assert_eq!(err.keyword(), Some("unevaluatedProperties"));
    assert!(err.message().contains("'b'"));
}

#[test]
fn test_unevaluated_items() {
    let (mut ctx, sch) = compile(json!({
        "prefixItems": [ { "type": "integer" } ],
        "unevaluatedItems": false
    }));
    assert!(ctx.validate(&json!([1]), sch).valid);
    let result = ctx.validate(&json!([1, "x"]), sch);
    assert!(!result.valid);
    assert_eq!(result.errors[0].keyword(), Some("unevaluatedItems"));
}

#[test]
fn test_dynamic_ref_outermost_wins() {
    let list = json!({
        "$id": "http://tmp/list",
        "$defs": {
            "elem": { "$dynamicAnchor": "elem" }
        },
        "type": "array",
        "items": { "$dynamicRef": "#elem" }
    });
    let numlist = json!({
        "$id": "http://tmp/numlist",
        "$ref": "http://tmp/list",
        "$defs": {
            "num": { "$dynamicAnchor": "elem", "type": "integer" }
        }
    });

    let mut ctx = Context::new();
    ctx.add_resource("http://tmp/list", list).unwrap();
    ctx.add_resource("http://tmp/numlist", numlist).unwrap();

    // the plain list constrains nothing
    let list_sch = ctx.compile("http://tmp/list").unwrap();
    assert!(ctx.validate(&json!([1, "x"]), list_sch).valid);

    // referenced through numlist, the outermost dynamic anchor applies
    let num_sch = ctx.compile("http://tmp/numlist").unwrap();
    assert!(ctx.validate(&json!([1, 2]), num_sch).valid);
    assert!(!ctx.validate(&json!([1, "x"]), num_sch).valid);
}

#[test]
fn test_format_annotates_by_default() {
    let (mut ctx, sch) = compile(json!({"format": "ipv4"}));
    let result = ctx.validate(&json!("999.1.1.1"), sch);
    assert!(result.valid);
    assert!(result
        .annotations
        .iter()
        .any(|ann| ann.kind.name() == "format"));
}

#[test]
fn test_format_assertions_opt_in() {
    let mut ctx = Context::new();
    ctx.enable_format_assertions();
    ctx.add_resource("schema.json", json!({"format": "ipv4"}))
        .unwrap();
    let sch = ctx.compile("schema.json").unwrap();

    assert!(ctx.validate(&json!("127.0.0.1"), sch).valid);
    let result = ctx.validate(&json!("999.1.1.1"), sch);
    assert!(!result.valid);
    assert!(matches!(result.errors[0].kind, ErrorKind::Format { .. }));
}

#[test]
fn test_unknown_format_asserted() {
    let mut ctx = Context::new();
    ctx.enable_format_assertions();
    ctx.add_resource("schema.json", json!({"format": "no-such-format"}))
        .unwrap();
    let sch = ctx.compile("schema.json").unwrap();
    let result = ctx.validate(&json!("anything"), sch);
    assert!(!result.valid);
    assert!(matches!(
        result.errors[0].kind,
        ErrorKind::UnknownFormat { .. }
    ));
}

#[test]
fn test_custom_format() {
    fn is_even_length(s: &str) -> bool {
        s.len() % 2 == 0
    }
    let mut ctx = Context::new();
    ctx.enable_format_assertions();
    ctx.register_format(Format {
        name: "even-length",
        func: is_even_length,
    });
    ctx.add_resource("schema.json", json!({"format": "even-length"}))
        .unwrap();
    let sch = ctx.compile("schema.json").unwrap();
    assert!(ctx.validate(&json!("ab"), sch).valid);
    assert!(!ctx.validate(&json!("abc"), sch).valid);
}

#[test]
fn test_contains_bounds() {
    let (mut ctx, sch) = compile(json!({
        "contains": { "type": "integer" },
        "minContains": 2,
        "maxContains": 3
    }));
    assert!(!ctx.validate(&json!([1, "a"]), sch).valid);
    assert!(ctx.validate(&json!([1, 2, "a"]), sch).valid);
    assert!(!ctx.validate(&json!([1, 2, 3, 4]), sch).valid);

    // minContains of zero tolerates an empty match
    let (mut ctx, sch) = compile(json!({
        "contains": { "type": "integer" },
        "minContains": 0
    }));
    assert!(ctx.validate(&json!(["a", "b"]), sch).valid);
}

#[test]
fn test_if_then_else() {
    let (mut ctx, sch) = compile(json!({
        "if": { "type": "integer" },
        "then": { "minimum": 0 },
        "else": { "maxLength": 3 }
    }));
    assert!(ctx.validate(&json!(5), sch).valid);
    assert!(!ctx.validate(&json!(-5), sch).valid);
    assert!(ctx.validate(&json!("abc"), sch).valid);
    let result = ctx.validate(&json!("abcd"), sch);
    assert!(!result.valid);
    assert_eq!(result.errors[0].keyword(), Some("else"));
}

#[test]
fn test_all_errors_collected() {
    let (mut ctx, sch) = compile(json!({
        "type": "integer",
        "minimum": 0,
        "multipleOf": 2
    }));
    let result = ctx.validate(&json!(-3), sch);
    assert!(!result.valid);
    let keywords: Vec<_> = result.errors.iter().filter_map(|e| e.keyword()).collect();
    assert!(keywords.contains(&"minimum"));
    assert!(keywords.contains(&"multipleOf"));
}

#[test]
fn test_result_serialization_shape() {
    let (mut ctx, sch) = compile(json!({"type": "integer", "title": "a number"}));

    let result = ctx.validate(&json!("x"), sch);
    let v = serde_json::to_value(&result).unwrap();
    assert_eq!(v["valid"], json!(false));
    assert_eq!(v["instanceLocation"], json!(""));
    assert_eq!(v["errors"][0]["keyword"], json!("type"));
    assert_eq!(v["errors"][0]["keywordLocation"], json!("/type"));
    assert!(v.get("annotations").is_none());

    let result = ctx.validate(&json!(1), sch);
    let v = serde_json::to_value(&result).unwrap();
    assert_eq!(v["valid"], json!(true));
    assert!(v.get("errors").is_none());
    assert_eq!(v["annotations"][0]["keyword"], json!("title"));
    assert_eq!(v["annotations"][0]["value"], json!("a number"));
}

#[test]
fn test_deterministic_results() {
    let schema = json!({
        "type": "object",
        "properties": {
            "a": { "type": "integer", "title": "a" },
            "b": { "type": "string", "title": "b" }
        },
        "patternProperties": { "^a": { "minimum": 0 } }
    });
    let instance = json!({ "a": 1, "b": "x", "c": true });
    let (mut ctx, sch) = compile(schema);
    let first = serde_json::to_string(&ctx.validate(&instance, sch)).unwrap();
    let second = serde_json::to_string(&ctx.validate(&instance, sch)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_flag_output() {
    let (mut ctx, sch) = compile(json!({"type": "integer"}));
    let result = ctx.validate(&json!(1), sch);
    assert_eq!(result.flag_output().to_string(), r#"{"valid":true}"#);
}
