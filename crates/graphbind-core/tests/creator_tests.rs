use graphbind_core::{
    BindError, CreatorCandidate, CreatorParam, Instance, Mapper, MapperConfig, PropertyMeta,
    TypeDescriptor, TypeMeta, TypeRegistry, Value,
};
use serde_json::json;
use std::sync::Arc;

/// `Range(lo, hi)` with a property-based creator; `label` is set afterwards
fn range_type() -> TypeMeta {
    TypeMeta::bean("Range")
        .property(PropertyMeta::new("lo", TypeDescriptor::int()))
        .property(PropertyMeta::new("hi", TypeDescriptor::int()))
        .property(PropertyMeta::new("label", TypeDescriptor::string()))
        .creator(CreatorCandidate::properties(
            vec![
                CreatorParam::named("lo", TypeDescriptor::int()),
                CreatorParam::named("hi", TypeDescriptor::int()),
            ],
            |mut args| {
                Ok(Instance::new("Range")
                    .with("lo", args.take(0))
                    .with("hi", args.take(1)))
            },
        ))
}

fn mapper_with(config: MapperConfig, types: Vec<TypeMeta>) -> Mapper {
    let mut registry = TypeRegistry::new();
    for meta in types {
        registry.register(meta).unwrap();
    }
    Mapper::with_config(config, Arc::new(registry))
}

// ============================================================================
// Property-based creators
// ============================================================================

#[test]
fn test_creator_arguments_in_any_order() {
    let mapper = mapper_with(MapperConfig::default(), vec![range_type()]);
    let ty = TypeDescriptor::named("Range");

    for input in [
        json!({"lo": 1, "hi": 5, "label": "small"}),
        json!({"label": "small", "hi": 5, "lo": 1}),
        json!({"hi": 5, "label": "small", "lo": 1}),
    ] {
        let doc = mapper.read_json(&ty, &input).unwrap();
        assert_eq!(doc.lookup(&["lo"]), Some(&Value::Int(1)));
        assert_eq!(doc.lookup(&["hi"]), Some(&Value::Int(5)));
        assert_eq!(doc.lookup(&["label"]), Some(&Value::from("small")));
    }
}

#[test]
fn test_missing_creator_argument_uses_default() {
    let mapper = mapper_with(MapperConfig::default(), vec![range_type()]);
    let outcome = mapper
        .read_with_outcome(
            &TypeDescriptor::named("Range"),
            &mut graphbind_core::token::json_to_tokens(&json!({"hi": 9, "label": "open"}))
                .into_reader(),
        )
        .unwrap();

    assert_eq!(outcome.defaulted_arguments, 1);
    assert_eq!(outcome.document.lookup(&["lo"]), Some(&Value::Int(0)));
    assert_eq!(outcome.document.lookup(&["label"]), Some(&Value::from("open")));
}

#[test]
fn test_missing_creator_argument_fails_when_configured() {
    let mut config = MapperConfig::default();
    config.read_options.fail_on_missing_creator_properties = true;
    let mapper = mapper_with(config, vec![range_type()]);

    let err = mapper
        .read_json(&TypeDescriptor::named("Range"), &json!({"hi": 9}))
        .unwrap_err();
    assert!(matches!(err, BindError::Instantiation { .. }));
    assert!(err.to_string().contains("lo"));
}

#[test]
fn test_creator_failure_is_wrapped() {
    let strict = TypeMeta::bean("Percent")
        .property(PropertyMeta::new("value", TypeDescriptor::int()))
        .creator(CreatorCandidate::properties(
            vec![CreatorParam::named("value", TypeDescriptor::int())],
            |args| {
                let value = args.get(0).as_i64().unwrap_or_default();
                anyhow::ensure!((0..=100).contains(&value), "{} is out of range", value);
                Ok(Instance::new("Percent").with("value", value as i32))
            },
        ));
    let mapper = mapper_with(MapperConfig::default(), vec![strict]);
    let ty = TypeDescriptor::named("Percent");

    assert!(mapper.read_json(&ty, &json!({"value": 40})).is_ok());
    let err = mapper.read_json(&ty, &json!({"value": 140})).unwrap_err();
    assert!(matches!(err, BindError::Instantiation { .. }));
    assert!(err.to_string().contains("out of range"));
}

// ============================================================================
// Scalar and delegating creators
// ============================================================================

fn money_type() -> TypeMeta {
    TypeMeta::bean("Money")
        .property(PropertyMeta::new("amount", TypeDescriptor::long()))
        .property(PropertyMeta::new("currency", TypeDescriptor::string()))
        .creator(CreatorCandidate::default_ctor(|_| Ok(Instance::new("Money"))))
        .creator(CreatorCandidate::new(
            vec![CreatorParam::unnamed(TypeDescriptor::string())],
            |args| {
                let text = args.get(0).as_str().unwrap_or_default().to_string();
                let (amount, currency) = text
                    .split_once(' ')
                    .ok_or_else(|| anyhow::anyhow!("expected `<amount> <currency>`"))?;
                Ok(Instance::new("Money")
                    .with("amount", amount.parse::<i64>()?)
                    .with("currency", currency))
            },
        ))
        .creator(CreatorCandidate::new(
            vec![CreatorParam::unnamed(TypeDescriptor::long())],
            |args| {
                Ok(Instance::new("Money")
                    .with("amount", args.get(0).as_i64().unwrap_or_default())
                    .with("currency", "EUR"))
            },
        ))
}

#[test]
fn test_scalar_creators_pick_by_token() {
    let mapper = mapper_with(MapperConfig::default(), vec![money_type()]);
    let ty = TypeDescriptor::named("Money");

    let from_text = mapper.read_json(&ty, &json!("12 USD")).unwrap();
    assert_eq!(from_text.lookup(&["amount"]), Some(&Value::Long(12)));
    assert_eq!(from_text.lookup(&["currency"]), Some(&Value::from("USD")));

    let from_number = mapper.read_json(&ty, &json!(7)).unwrap();
    assert_eq!(from_number.lookup(&["amount"]), Some(&Value::Long(7)));
    assert_eq!(from_number.lookup(&["currency"]), Some(&Value::from("EUR")));

    let from_object = mapper
        .read_json(&ty, &json!({"amount": 3, "currency": "JPY"}))
        .unwrap();
    assert_eq!(from_object.lookup(&["currency"]), Some(&Value::from("JPY")));
}

#[test]
fn test_scalar_without_matching_creator_is_mismatch() {
    let mapper = mapper_with(MapperConfig::default(), vec![money_type()]);
    let err = mapper
        .read_json(&TypeDescriptor::named("Money"), &json!(true))
        .unwrap_err();
    assert!(matches!(err, BindError::Mismatch { .. }));
}

#[test]
fn test_delegating_creator_binds_whole_value() {
    let polygon = TypeMeta::bean("Polygon")
        .property(PropertyMeta::new(
            "points",
            TypeDescriptor::list(TypeDescriptor::int()),
        ))
        .creator(CreatorCandidate::delegating(
            TypeDescriptor::list(TypeDescriptor::int()),
            |mut args| Ok(Instance::new("Polygon").with("points", args.take(0))),
        ));
    let mapper = mapper_with(MapperConfig::default(), vec![polygon]);
    let ty = TypeDescriptor::named("Polygon");

    let doc = mapper.read_json(&ty, &json!([1, 2, 3])).unwrap();
    assert_eq!(
        doc.lookup(&["points"]),
        Some(&Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
    );
    assert_eq!(
        mapper.to_json_value(&ty, &doc).unwrap(),
        json!({"points": [1, 2, 3]})
    );
}

#[test]
fn test_hidden_creators_are_skipped() {
    let counter = TypeMeta::bean("Counter")
        .property(PropertyMeta::new("count", TypeDescriptor::int()))
        .creator(
            CreatorCandidate::new(
                vec![CreatorParam::unnamed(TypeDescriptor::string())],
                |_| Ok(Instance::new("Counter")),
            )
            .hidden(),
        );
    let mapper = mapper_with(MapperConfig::default(), vec![counter]);
    let ty = TypeDescriptor::named("Counter");

    assert!(mapper.read_json(&ty, &json!({"count": 2})).is_ok());
    assert!(mapper.read_json(&ty, &json!("two")).is_err());
}

#[test]
fn test_two_explicit_property_creators_conflict() {
    let creator = || {
        CreatorCandidate::properties(
            vec![CreatorParam::named("a", TypeDescriptor::int())],
            |_| Ok(Instance::new("Twice")),
        )
    };
    let twice = TypeMeta::bean("Twice")
        .property(PropertyMeta::new("a", TypeDescriptor::int()))
        .creator(creator())
        .creator(creator());
    let mapper = mapper_with(MapperConfig::default(), vec![twice]);

    let err = mapper
        .reader_binder(&TypeDescriptor::named("Twice"))
        .unwrap_err();
    assert!(matches!(err, BindError::InvalidDefinition { .. }));
}

// ============================================================================
// Injection
// ============================================================================

#[test]
fn test_injected_property_and_creator_argument() {
    let session = TypeMeta::bean("Session")
        .property(PropertyMeta::new("user", TypeDescriptor::string()))
        .property(PropertyMeta::new("clock", TypeDescriptor::string()).inject("clock"))
        .property(PropertyMeta::new("region", TypeDescriptor::string()).inject("region"))
        .creator(CreatorCandidate::properties(
            vec![
                CreatorParam::named("user", TypeDescriptor::string()),
                CreatorParam::injected("region", TypeDescriptor::string()),
            ],
            |mut args| {
                Ok(Instance::new("Session")
                    .with("user", args.take(0))
                    .with("origin", args.take(1)))
            },
        ));
    let mapper = mapper_with(MapperConfig::default(), vec![session])
        .with_injectable("clock", "utc")
        .with_injectable("region", "eu-west");
    let ty = TypeDescriptor::named("Session");

    let doc = mapper.read_json(&ty, &json!({"user": "ada"})).unwrap();
    assert_eq!(doc.lookup(&["clock"]), Some(&Value::from("utc")));
    assert_eq!(doc.lookup(&["origin"]), Some(&Value::from("eu-west")));
    assert_eq!(
        mapper.to_json_value(&ty, &doc).unwrap(),
        json!({"user": "ada"})
    );
}

#[test]
fn test_missing_injectable_is_an_error() {
    let needs = TypeMeta::bean("Needs")
        .property(PropertyMeta::new("db", TypeDescriptor::string()).inject("db"));
    let mapper = mapper_with(MapperConfig::default(), vec![needs]);

    assert!(mapper
        .read_json(&TypeDescriptor::named("Needs"), &json!({}))
        .is_err());
}
