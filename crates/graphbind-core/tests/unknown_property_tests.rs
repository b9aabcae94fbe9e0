use graphbind_core::{
    BindError, CollectingProblemHandler, Mapper, MapperConfig, NameTransform, PropertyMeta,
    TypeDescriptor, TypeMeta, TypeRegistry, Value,
};
use serde_json::json;
use std::sync::Arc;

fn user_type() -> TypeMeta {
    TypeMeta::bean("User")
        .property(PropertyMeta::new("id", TypeDescriptor::long()))
        .property(PropertyMeta::new("email", TypeDescriptor::string()).alias("mail"))
}

fn mapper_with(config: MapperConfig, types: Vec<TypeMeta>) -> Mapper {
    let mut registry = TypeRegistry::new();
    for meta in types {
        registry.register(meta).unwrap();
    }
    Mapper::with_config(config, Arc::new(registry))
}

// ============================================================================
// Unknown property policy
// ============================================================================

#[test]
fn test_unknown_property_fails_by_default() {
    let mapper = mapper_with(MapperConfig::default(), vec![user_type()]);
    let err = mapper
        .read_json(
            &TypeDescriptor::named("User"),
            &json!({"id": 1, "nickname": "z"}),
        )
        .unwrap_err();

    let BindError::UnrecognizedProperty { name, known, .. } = &err else {
        panic!("expected unrecognized property, got {:?}", err);
    };
    assert_eq!(name, "nickname");
    assert!(known.contains(&"email".to_string()));
}

#[test]
fn test_aliases_are_accepted() {
    let mapper = mapper_with(MapperConfig::default(), vec![user_type()]);
    let doc = mapper
        .read_json(&TypeDescriptor::named("User"), &json!({"mail": "a@b.c"}))
        .unwrap();
    assert_eq!(doc.lookup(&["email"]), Some(&Value::from("a@b.c")));
}

#[test]
fn test_unknown_property_error_carries_path() {
    let registry_types = vec![
        user_type(),
        TypeMeta::bean("Account").property(PropertyMeta::new(
            "users",
            TypeDescriptor::list(TypeDescriptor::named("User")),
        )),
    ];
    let mapper = mapper_with(MapperConfig::default(), registry_types);
    let err = mapper
        .read_json(
            &TypeDescriptor::named("Account"),
            &json!({"users": [{"id": 1}, {"id": 2, "bogus": true}]}),
        )
        .unwrap_err();

    assert_eq!(err.path().map(|p| p.to_string()), Some("$.users[1]".to_string()));
}

#[test]
fn test_type_level_ignore_unknown() {
    let mapper = mapper_with(MapperConfig::default(), vec![user_type().ignore_unknown()]);
    let doc = mapper
        .read_json(
            &TypeDescriptor::named("User"),
            &json!({"id": 4, "extra": {"deep": [1, 2]}}),
        )
        .unwrap();
    assert_eq!(doc.lookup(&["id"]), Some(&Value::Long(4)));
}

#[test]
fn test_ignorable_names_are_skipped() {
    let mapper = mapper_with(
        MapperConfig::default(),
        vec![user_type().ignorable("legacy")],
    );
    let ty = TypeDescriptor::named("User");

    assert!(mapper.read_json(&ty, &json!({"legacy": [1], "id": 2})).is_ok());
    assert!(mapper.read_json(&ty, &json!({"other": 1})).is_err());
}

#[test]
fn test_ignored_property_is_neither_read_nor_written() {
    let mapper = mapper_with(
        MapperConfig::default(),
        vec![user_type().property(PropertyMeta::new("password", TypeDescriptor::string()).ignored())],
    );
    let ty = TypeDescriptor::named("User");
    let doc = mapper
        .read_json(&ty, &json!({"id": 1, "email": "e", "password": "hunter2"}))
        .unwrap();

    assert_eq!(doc.lookup(&["password"]), None);
    assert_eq!(
        mapper.to_json_value(&ty, &doc).unwrap(),
        json!({"id": 1, "email": "e"})
    );
}

#[test]
fn test_lenient_config_skips_everywhere() {
    let mapper = mapper_with(MapperConfig::lenient(), vec![user_type()]);
    let doc = mapper
        .read_json(&TypeDescriptor::named("User"), &json!({"x": 1, "id": 3}))
        .unwrap();
    assert_eq!(doc.lookup(&["id"]), Some(&Value::Long(3)));
}

#[test]
fn test_disabled_failure_skips_silently() {
    let mut config = MapperConfig::default();
    config.read_options.fail_on_unknown_properties = false;
    let mapper = mapper_with(config, vec![user_type()]);

    assert!(mapper
        .read_json(&TypeDescriptor::named("User"), &json!({"x": [null], "id": 3}))
        .is_ok());
}

// ============================================================================
// Problem handlers
// ============================================================================

#[test]
fn test_keeping_handler_stores_trees() {
    let handler = Arc::new(CollectingProblemHandler::keeping());
    let mapper = mapper_with(MapperConfig::default(), vec![user_type()])
        .with_problem_handler(handler.clone());
    let ty = TypeDescriptor::named("User");

    let doc = mapper
        .read_json(&ty, &json!({"id": 1, "prefs": {"dark": true}}))
        .unwrap();
    let user = doc.root_instance().unwrap();
    assert_eq!(user.extra("prefs"), Some(&Value::Tree(json!({"dark": true}))));
    assert_eq!(handler.problems()[0].name, "prefs");
    assert_eq!(handler.problems()[0].ty, "User");

    // Extras without a catch-all are written back naturally
    assert_eq!(
        mapper.to_json_value(&ty, &doc).unwrap(),
        json!({"id": 1, "email": null, "prefs": {"dark": true}})
    );
}

#[test]
fn test_observing_handler_falls_through_to_policy() {
    let handler = Arc::new(CollectingProblemHandler::observing());
    let mapper = mapper_with(MapperConfig::default(), vec![user_type()])
        .with_problem_handler(handler.clone());

    let err = mapper
        .read_json(&TypeDescriptor::named("User"), &json!({"zzz": 1}))
        .unwrap_err();
    assert!(matches!(err, BindError::UnrecognizedProperty { .. }));
    assert_eq!(handler.count(), 1);
}

// ============================================================================
// Catch-all bags
// ============================================================================

#[test]
fn test_catch_all_collects_unknown_fields() {
    let labels = TypeMeta::bean("Labels")
        .property(PropertyMeta::new("name", TypeDescriptor::string()))
        .catch_all(TypeDescriptor::string());
    let mapper = mapper_with(MapperConfig::default(), vec![labels]);
    let ty = TypeDescriptor::named("Labels");
    let input = json!({"name": "pod", "app": "web", "tier": "front"});

    let doc = mapper.read_json(&ty, &input).unwrap();
    let instance = doc.root_instance().unwrap();
    assert_eq!(instance.extra("app"), Some(&Value::from("web")));
    assert_eq!(instance.extras().count(), 2);
    assert_eq!(mapper.to_json_value(&ty, &doc).unwrap(), input);
}

#[test]
fn test_catch_all_values_are_typed() {
    let counters = TypeMeta::bean("Counters").catch_all(TypeDescriptor::int());
    let mapper = mapper_with(MapperConfig::default(), vec![counters]);

    let err = mapper
        .read_json(&TypeDescriptor::named("Counters"), &json!({"hits": [1]}))
        .unwrap_err();
    assert!(matches!(err, BindError::Mismatch { .. }));
}

// ============================================================================
// Unwrapped properties
// ============================================================================

fn person_types() -> Vec<TypeMeta> {
    vec![
        TypeMeta::bean("Address")
            .property(PropertyMeta::new("city", TypeDescriptor::string()))
            .property(PropertyMeta::new("zip", TypeDescriptor::string())),
        TypeMeta::bean("Person")
            .property(PropertyMeta::new("name", TypeDescriptor::string()))
            .property(
                PropertyMeta::new("home", TypeDescriptor::named("Address"))
                    .unwrapped(NameTransform::new("home_", "")),
            ),
    ]
}

#[test]
fn test_unwrapped_child_reads_prefixed_fields() {
    let mapper = mapper_with(MapperConfig::default(), person_types());
    let ty = TypeDescriptor::named("Person");
    let input = json!({"home_city": "Oslo", "name": "Ola", "home_zip": "0150"});

    let doc = mapper.read_json(&ty, &input).unwrap();
    assert_eq!(doc.lookup(&["name"]), Some(&Value::from("Ola")));
    assert_eq!(doc.lookup(&["home", "city"]), Some(&Value::from("Oslo")));
    assert_eq!(doc.lookup(&["home", "zip"]), Some(&Value::from("0150")));

    assert_eq!(
        mapper.to_json_value(&ty, &doc).unwrap(),
        json!({"name": "Ola", "home_city": "Oslo", "home_zip": "0150"})
    );
}

#[test]
fn test_unwrapped_child_absent_from_input_round_trips() {
    let mapper = mapper_with(MapperConfig::default(), person_types());
    let ty = TypeDescriptor::named("Person");
    let input = json!({"name": "Ola"});

    let doc = mapper.read_json(&ty, &input).unwrap();
    assert_eq!(doc.lookup(&["name"]), Some(&Value::from("Ola")));
    assert_eq!(mapper.to_json_value(&ty, &doc).unwrap(), input);
}

#[test]
fn test_unclaimed_field_next_to_unwrapped_child_is_unknown() {
    let mapper = mapper_with(MapperConfig::default(), person_types());
    let err = mapper
        .read_json(
            &TypeDescriptor::named("Person"),
            &json!({"name": "Ola", "shoe": 44}),
        )
        .unwrap_err();
    assert!(matches!(err, BindError::UnrecognizedProperty { ref name, .. } if name == "shoe"));
}
