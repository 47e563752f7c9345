//! Value encoding, property extraction and registry lifetimes.

use chromedebug::inspector::{EncodeOptions, ObjectRegistry};
use chromedebug::{
    Accessor, ArrayValue, FunctionKind, FunctionValue, ObjectValue, TypeDescriptor, Value,
};

#[test]
fn primitive_encodings_are_literal() {
    let registry = ObjectRegistry::new();
    let opts = EncodeOptions::plain();

    let encoded = registry.encode(&Value::Int(5), &opts);
    assert_eq!(encoded.kind, "number");
    assert_eq!(encoded.class_name.as_deref(), Some("int"));
    assert_eq!(encoded.description.as_deref(), Some("5"));
    assert_eq!(encoded.value, Some(serde_json::Value::from(5)));
    assert!(encoded.object_id.is_none());

    let encoded = registry.encode(&Value::Bool(true), &opts);
    assert_eq!(encoded.kind, "boolean");
    assert_eq!(encoded.description.as_deref(), Some("True"));

    let encoded = registry.encode(&Value::Undefined, &opts);
    assert_eq!(encoded.kind, "undefined");
    assert_eq!(encoded.subtype.as_deref(), Some("null"));
    assert_eq!(encoded.class_name.as_deref(), Some("NoneType"));

    let encoded = registry.encode(&Value::Str("hi".into()), &opts);
    assert_eq!(encoded.kind, "string");
    assert_eq!(encoded.value, Some(serde_json::Value::String("hi".into())));
}

#[test]
fn aggregate_encodings_reference_the_registry() {
    let registry = ObjectRegistry::new();
    let opts = EncodeOptions::plain();

    let arr = Value::Array(
        ArrayValue::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)]).share(),
    );
    let encoded = registry.encode(&arr, &opts);
    assert_eq!(encoded.kind, "object");
    assert_eq!(encoded.subtype.as_deref(), Some("array"));
    assert_eq!(encoded.description.as_deref(), Some("list() [3]"));
    let id = encoded.object_id.expect("arrays are registered");

    // Idempotent registration: the same identity yields the same id.
    let again = registry.encode(&arr, &opts);
    assert_eq!(again.object_id.as_deref(), Some(id.as_str()));

    let func = Value::Function(
        FunctionValue::new("make", "shapes", 30)
            .with_params(&["cls"])
            .with_kind(FunctionKind::ClassMethod)
            .share(),
    );
    let encoded = registry.encode(&func, &opts);
    assert_eq!(encoded.kind, "function");
    assert_eq!(encoded.description.as_deref(), Some("@classmethod def make(cls):"));
    assert!(encoded.object_id.is_some());
}

#[test]
fn object_descriptions_are_generated_by_default() {
    let registry = ObjectRegistry::new();
    let obj = Value::Object(
        ObjectValue::new("Point").with_repr("Point(1, 2)").share(),
    );
    let encoded = registry.encode(&obj, &EncodeOptions::plain());
    assert_eq!(encoded.description.as_deref(), Some("Point(1, 2)"));
    assert!(encoded.object_id.is_some());
    assert!(encoded.preview.is_none(), "previews are attached on request only");
}

#[test]
fn long_descriptions_are_truncated() {
    let registry = ObjectRegistry::new();
    let noisy = Value::Object(
        ObjectValue::new("Blob").with_repr("b".repeat(200)).share(),
    );
    let encoded = registry.encode(&noisy, &EncodeOptions::plain());
    let description = encoded.description.unwrap();
    assert_eq!(description.chars().count(), 50);
    assert!(description.ends_with('…'));

    let wide = Value::Array(
        ArrayValue::new(vec![]).with_class_name("W".repeat(60)).share(),
    );
    let encoded = registry.encode(&wide, &EncodeOptions::plain());
    let description = encoded.description.unwrap();
    assert_eq!(description.chars().count(), 50);
    assert!(description.ends_with('…'));
}

#[test]
fn scope_encoding_skips_description_generation() {
    let registry = ObjectRegistry::new();
    let obj = Value::Object(ObjectValue::new("dict").share());
    let encoded =
        registry.encode(&obj, &EncodeOptions::plain().without_description());
    assert!(encoded.description.is_none(), "scope snapshots skip object reprs");
    assert!(encoded.object_id.is_some());
}

#[test]
fn preview_covers_the_first_ten_entries() {
    let registry = ObjectRegistry::new();
    let items: Vec<Value> = (0..12).map(Value::Int).collect();
    let arr = Value::Array(ArrayValue::new(items).share());
    let encoded = registry.encode(&arr, &EncodeOptions::plain().with_preview(true));
    let preview = encoded.preview.expect("preview requested");
    assert!(preview.overflow);
    assert_eq!(preview.properties.len(), 10);
    assert_eq!(preview.properties[0].name, "0");
    assert_eq!(preview.properties[0].value, "0");
}

#[test]
fn property_sources_and_shadowing() {
    let registry = ObjectRegistry::new();
    let getter = FunctionValue::new("size", "shapes", 8).with_params(&["self"]).share();
    let ty = TypeDescriptor::new("Shape")
        .with_data("kind", Value::Str("polygon".into()))
        .with_data("x", Value::Str("shadowed".into()))
        .with_data("_hidden_data", Value::Int(0))
        .with_accessor("size", Accessor { get: Some(getter), set: None })
        .share();
    let obj = Value::Object(
        ObjectValue::new("Shape")
            .with_slot("x", Value::Int(1))
            .with_attr("y", Value::Int(2))
            .with_attr("_internal", Value::Int(3))
            .with_type(ty)
            .share(),
    );

    let props = registry.properties(&obj, false);
    let names: Vec<&str> = props.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y", "kind"], "slot, instance, then type members");
    let x = &props[0];
    assert!(x.is_own);
    assert_eq!(x.value.as_ref().unwrap().value, Some(serde_json::Value::from(1)));
    let kind = props.iter().find(|p| p.name == "kind").unwrap();
    assert!(!kind.is_own, "type members are not own properties");

    let accessors = registry.properties(&obj, true);
    assert_eq!(accessors.len(), 1);
    assert_eq!(accessors[0].name, "size");
    assert!(accessors[0].get.is_some());
    assert!(accessors[0].set.is_none());
    assert!(accessors[0].value.is_none(), "getters are never invoked");
}

#[test]
fn by_value_encoding_nests_literals() {
    let registry = ObjectRegistry::new();
    let obj = Value::Object(
        ObjectValue::new("dict")
            .with_attr("xs", Value::Array(ArrayValue::new(vec![Value::Int(1)]).share()))
            .with_attr("name", Value::Str("n".into()))
            .share(),
    );
    let encoded = registry.encode(&obj, &EncodeOptions::plain().by_value());
    assert!(encoded.object_id.is_none(), "by-value registers nothing");
    let value = encoded.value.unwrap();
    assert_eq!(value["xs"][0], 1);
    assert_eq!(value["name"], "n");
}

#[test]
fn function_details_report_wire_lines() {
    let registry = ObjectRegistry::new();
    let func = Value::Function(
        FunctionValue::new("handler", "app.views", 41).with_params(&["request"]).share(),
    );
    let id = registry.save(&func, None).unwrap();
    let details = registry.function_details(&id).unwrap();
    assert_eq!(details.name, "handler");
    assert_eq!(details.display_name, "handler");
    assert_eq!(details.location.script_id, "app.views");
    assert_eq!(details.location.line_number, 40);

    assert!(registry.function_details("999999").is_none());
}

#[test]
fn group_release_respects_handle_strength() {
    let registry = ObjectRegistry::new();
    let strong = Value::Object(ObjectValue::new("Held").share());
    let strong_id = registry.save(&strong, Some("grp")).unwrap();

    let kept_alive = FunctionValue::new("kept", "m", 1).share();
    let weak_id =
        registry.save(&Value::Function(kept_alive.clone()), Some("grp")).unwrap();

    registry.release_group("grp");
    assert!(registry.get(&strong_id).is_none());
    assert!(registry.get(&weak_id).is_some(), "live weak referents survive release");

    drop(kept_alive);
    assert!(registry.get(&weak_id).is_none(), "dead weak referents disappear");
}
