use super::*;
use crate::error::EngineError;
use serde_json::{json, Value};

fn age_schema() -> SchemaRef {
    json!({
        "type": "object",
        "properties": {
            "age": { "type": "integer", "minimum": 18, "maximum": 120 },
            "nickname": { "type": ["string", "null"], "description": "Optional handle" }
        },
        "required": ["age"]
    })
    .into_schema_ref()
}

fn issues(err: EngineError) -> Vec<ValidationIssue> {
    match err {
        EngineError::Validation { issues, .. } => issues,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn body_within_bounds_passes_unchanged() {
    let adapter = SchemaAdapter::new();
    let body = json!({ "age": 18, "nickname": null });
    let parsed = adapter
        .validate(Some(&age_schema()), &body, InputLocation::Body)
        .unwrap();
    assert_eq!(parsed, body);
}

#[test]
fn each_violated_field_is_reported() {
    let adapter = SchemaAdapter::new();
    let schema = json!({
        "type": "object",
        "properties": {
            "age": { "type": "integer", "minimum": 18 },
            "email": { "type": "string", "minLength": 3 },
            "name": { "type": "string" }
        },
        "required": ["age", "email", "name"]
    })
    .into_schema_ref();

    let err = adapter
        .validate(Some(&schema), &json!({ "age": 17, "email": "a" }), InputLocation::Body)
        .unwrap_err();
    let mut fields: Vec<String> = issues(err).into_iter().map(|i| i.field).collect();
    fields.sort();
    assert_eq!(fields, vec!["age", "email", "name"]);
}

#[test]
fn missing_field_is_reported_as_missing() {
    let adapter = SchemaAdapter::new();
    let err = adapter
        .validate(Some(&age_schema()), &json!({}), InputLocation::Body)
        .unwrap_err();
    let issues = issues(err);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "age");
    assert_eq!(issues[0].kind, "missing");
}

#[test]
fn body_strings_are_not_coerced() {
    let adapter = SchemaAdapter::new();
    let err = adapter
        .validate(Some(&age_schema()), &json!({ "age": "30" }), InputLocation::Body)
        .unwrap_err();
    assert_eq!(issues(err)[0].field, "age");
}

#[test]
fn path_strings_are_coerced_to_declared_types() {
    let adapter = SchemaAdapter::new();
    let schema = json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer" },
            "ratio": { "type": "number" },
            "active": { "type": "boolean" },
            "slug": { "type": "string" }
        }
    })
    .into_schema_ref();
    let raw = json!({ "id": "123", "ratio": "0.5", "active": "true", "slug": " 007 " });
    let parsed = adapter
        .validate(Some(&schema), &raw, InputLocation::Path)
        .unwrap();
    assert_eq!(
        parsed,
        json!({ "id": 123, "ratio": 0.5, "active": true, "slug": " 007 " })
    );
}

#[test]
fn uncoercible_path_value_is_a_field_error() {
    let adapter = SchemaAdapter::new();
    let schema = json!({
        "type": "object",
        "properties": { "id": { "type": "integer" } }
    })
    .into_schema_ref();
    let err = adapter
        .validate(Some(&schema), &json!({ "id": "abc" }), InputLocation::Path)
        .unwrap_err();
    let issues = issues(err);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "id");
}

#[test]
fn repeated_query_values_follow_the_declared_type() {
    let adapter = SchemaAdapter::new();
    let schema = json!({
        "type": "object",
        "properties": {
            "tag": { "type": "array", "items": { "type": "integer" } },
            "limit": { "type": "integer" }
        }
    })
    .into_schema_ref();
    let raw = json!({ "tag": ["1", "2"], "limit": ["10", "20"] });
    let parsed = adapter
        .validate(Some(&schema), &raw, InputLocation::Query)
        .unwrap();
    assert_eq!(parsed, json!({ "tag": [1, 2], "limit": 20 }));

    let single = adapter
        .validate(Some(&schema), &json!({ "tag": "7" }), InputLocation::Query)
        .unwrap();
    assert_eq!(single, json!({ "tag": [7] }));
}

#[test]
fn absent_schema_is_invalid() {
    let adapter = SchemaAdapter::new();
    assert!(matches!(
        adapter.validate(None, &Value::Null, InputLocation::Body),
        Err(EngineError::InvalidSchema { .. })
    ));
    assert!(matches!(
        adapter.is_optional(None),
        Err(EngineError::InvalidSchema { .. })
    ));
    assert!(matches!(
        adapter.is_nullable(None),
        Err(EngineError::InvalidSchema { .. })
    ));
    assert!(matches!(
        adapter.describe(None),
        Err(EngineError::InvalidSchema { .. })
    ));
    assert!(matches!(
        adapter.to_structural_schema(None),
        Err(EngineError::InvalidSchema { .. })
    ));
}

#[test]
fn malformed_schema_is_invalid() {
    let adapter = SchemaAdapter::new();
    let not_an_object = json!("integer").into_schema_ref();
    assert!(matches!(
        adapter.to_structural_schema(Some(&not_an_object)),
        Err(EngineError::InvalidSchema { .. })
    ));
    let bad_keyword = json!({ "type": 12 }).into_schema_ref();
    assert!(matches!(
        adapter.describe(Some(&bad_keyword)),
        Err(EngineError::InvalidSchema { .. })
    ));
    assert!(JsonSchema::try_new(json!({ "minimum": "ten" })).is_err());
}

#[test]
fn introspection_reads_fields() {
    let adapter = SchemaAdapter::new();
    let fields = adapter.fields(Some(&age_schema())).unwrap();
    let (name, age) = &fields[0];
    assert_eq!(name, "age");
    assert!(!adapter.is_optional(Some(age)).unwrap());
    assert!(!adapter.is_nullable(Some(age)).unwrap());

    let (name, nickname) = &fields[1];
    assert_eq!(name, "nickname");
    assert!(adapter.is_optional(Some(nickname)).unwrap());
    assert!(adapter.is_nullable(Some(nickname)).unwrap());
    assert_eq!(
        adapter.describe(Some(nickname)).unwrap().as_deref(),
        Some("Optional handle")
    );
}

#[test]
fn structural_schema_is_verbatim() {
    let raw = json!({ "type": "string", "format": "email", "maxLength": 64 });
    let schema = raw.clone().into_schema_ref();
    assert_eq!(
        SchemaAdapter::new().to_structural_schema(Some(&schema)).unwrap(),
        raw
    );
}

#[test]
fn nested_violations_carry_the_full_field_path() {
    let adapter = SchemaAdapter::new();
    let schema = json!({
        "type": "object",
        "properties": {
            "address": {
                "type": "object",
                "properties": {
                    "zip": { "type": "string" },
                    "city": { "type": "string" }
                },
                "required": ["city"]
            },
            "tags": { "type": "array", "items": { "type": "string" } }
        }
    })
    .into_schema_ref();

    let err = adapter
        .validate(
            Some(&schema),
            &json!({ "address": { "zip": 5 }, "tags": ["a", 2] }),
            InputLocation::Body,
        )
        .unwrap_err();
    let mut fields: Vec<(String, String)> = issues(err)
        .into_iter()
        .map(|i| (i.field, i.kind))
        .collect();
    fields.sort();
    assert_eq!(
        fields,
        vec![
            ("address.city".to_string(), "missing".to_string()),
            ("address.zip".to_string(), "type".to_string()),
            ("tags.1".to_string(), "type".to_string()),
        ]
    );
}

#[test]
fn object_level_violations_are_reported_beside_field_errors() {
    let adapter = SchemaAdapter::new();
    let schema = json!({
        "type": "object",
        "properties": { "age": { "type": "integer", "minimum": 18 } },
        "additionalProperties": false
    })
    .into_schema_ref();

    let err = adapter
        .validate(Some(&schema), &json!({ "age": 5, "extra": 1 }), InputLocation::Body)
        .unwrap_err();
    let mut fields: Vec<(String, String)> = issues(err)
        .into_iter()
        .map(|i| (i.field, i.kind))
        .collect();
    fields.sort();
    assert_eq!(
        fields,
        vec![
            ("age".to_string(), "minimum".to_string()),
            ("extra".to_string(), "additionalProperties".to_string()),
        ]
    );
}

#[test]
fn object_keywords_without_a_field_point_at_the_root() {
    let adapter = SchemaAdapter::new();
    let schema = json!({ "type": "object", "minProperties": 2 }).into_schema_ref();
    let err = adapter
        .validate(Some(&schema), &json!({ "a": 1 }), InputLocation::Body)
        .unwrap_err();
    let issues = issues(err);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "");
    assert_eq!(issues[0].kind, "minProperties");
}
