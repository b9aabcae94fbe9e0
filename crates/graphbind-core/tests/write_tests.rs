use graphbind_core::types::ValueHandler;
use graphbind_core::{
    BindError, CustomReader, CustomWriter, DecodeContext, DefaultInclusion, Document,
    EncodeContext, Inclusion, Instance, Mapper, MapperConfig, ObjectGraph, PropertyMeta,
    SelfReferences, Token, TokenReader, TokenWriter, TypeDescriptor, TypeMeta, TypeRegistry,
    Value,
};
use serde_json::json;
use std::sync::Arc;

fn node_registry() -> TypeRegistry {
    TypeRegistry::new()
        .with(
            TypeMeta::bean("Node")
                .property(PropertyMeta::new("name", TypeDescriptor::string()))
                .property(PropertyMeta::new("next", TypeDescriptor::named("Node"))),
        )
        .unwrap()
}

/// `a -> b -> a`
fn loop_document() -> Document {
    let mut graph = ObjectGraph::new();
    let a = graph.insert(Instance::new("Node").with("name", "a"));
    let b = graph.insert(Instance::new("Node").with("name", "b").with("next", Value::Object(a)));
    graph[a].set("next", Value::Object(b));
    Document::new(graph, Value::Object(a))
}

// ============================================================================
// Self references
// ============================================================================

#[test]
fn test_cycle_fails_by_default() {
    let mapper = Mapper::new(Arc::new(node_registry()));
    let err = mapper
        .to_json_value(&TypeDescriptor::named("Node"), &loop_document())
        .unwrap_err();

    assert!(matches!(err, BindError::Cycle { .. }));
    assert_eq!(err.path().map(|p| p.to_string()), Some("$.next.next".to_string()));
    insta::assert_snapshot!(err.to_string(), @"cannot write `Node` at $.next.next: value refers to itself");
}

#[test]
fn test_cycle_as_null_pretty_output() {
    let mut config = MapperConfig::default();
    config.write_options.self_references = SelfReferences::WriteNull;
    let mapper = Mapper::with_config(config, Arc::new(node_registry()));

    let text = mapper
        .to_json_string(&TypeDescriptor::named("Node"), &loop_document(), true)
        .unwrap();
    insta::assert_snapshot!(text, @r#"
    {
      "name": "a",
      "next": {
        "name": "b",
        "next": null
      }
    }
    "#);
}

#[test]
fn test_cycle_written_as_null() {
    let mut config = MapperConfig::default();
    config.write_options.self_references = SelfReferences::WriteNull;
    let mapper = Mapper::with_config(config, Arc::new(node_registry()));

    let json = mapper
        .to_json_value(&TypeDescriptor::named("Node"), &loop_document())
        .unwrap();
    assert_eq!(
        json,
        json!({"name": "a", "next": {"name": "b", "next": null}})
    );
}

#[test]
fn test_shared_object_is_not_a_cycle() {
    let registry = node_registry()
        .with(
            TypeMeta::bean("Pair")
                .property(PropertyMeta::new("left", TypeDescriptor::named("Node")))
                .property(PropertyMeta::new("right", TypeDescriptor::named("Node"))),
        )
        .unwrap();
    let mapper = Mapper::new(Arc::new(registry));

    let mut graph = ObjectGraph::new();
    let shared = graph.insert(Instance::new("Node").with("name", "s"));
    let pair = graph.insert(
        Instance::new("Pair")
            .with("left", Value::Object(shared))
            .with("right", Value::Object(shared)),
    );
    let doc = Document::new(graph, Value::Object(pair));

    assert_eq!(
        mapper.to_json_value(&TypeDescriptor::named("Pair"), &doc).unwrap(),
        json!({
            "left": {"name": "s", "next": null},
            "right": {"name": "s", "next": null}
        })
    );
}

// ============================================================================
// Inclusion
// ============================================================================

fn profile_registry() -> TypeRegistry {
    TypeRegistry::new()
        .with(
            TypeMeta::bean("Profile")
                .property(PropertyMeta::new("name", TypeDescriptor::string()))
                .property(PropertyMeta::new("bio", TypeDescriptor::string()))
                .property(
                    PropertyMeta::new("tags", TypeDescriptor::list(TypeDescriptor::string()))
                        .include(Inclusion::NonEmpty),
                )
                .property(
                    PropertyMeta::new("level", TypeDescriptor::int())
                        .include(Inclusion::NonDefault(Value::Int(1))),
                )
                .property(
                    PropertyMeta::new("note", TypeDescriptor::string()).include(Inclusion::Always),
                ),
        )
        .unwrap()
}

#[test]
fn test_property_inclusion_rules() {
    let mapper = Mapper::new(Arc::new(profile_registry()));
    let ty = TypeDescriptor::named("Profile");
    let doc = mapper
        .read_json(&ty, &json!({"name": "n", "tags": [], "level": 1}))
        .unwrap();

    assert_eq!(
        mapper.to_json_value(&ty, &doc).unwrap(),
        json!({"name": "n", "bio": null, "note": null})
    );
}

#[test]
fn test_default_inclusion_non_null() {
    let mut config = MapperConfig::default();
    config.write_options.default_inclusion = DefaultInclusion::NonNull;
    let mapper = Mapper::with_config(config, Arc::new(profile_registry()));
    let ty = TypeDescriptor::named("Profile");
    let doc = mapper
        .read_json(&ty, &json!({"name": "n", "tags": ["x"], "level": 3}))
        .unwrap();

    assert_eq!(
        mapper.to_json_value(&ty, &doc).unwrap(),
        json!({"name": "n", "tags": ["x"], "level": 3, "note": null})
    );
}

#[test]
fn test_write_only_property_is_read_but_not_written() {
    let registry = TypeRegistry::new()
        .with(
            TypeMeta::bean("Login")
                .property(PropertyMeta::new("user", TypeDescriptor::string()))
                .property(PropertyMeta::new("secret", TypeDescriptor::string()).write_only()),
        )
        .unwrap();
    let mapper = Mapper::new(Arc::new(registry));
    let ty = TypeDescriptor::named("Login");
    let doc = mapper
        .read_json(&ty, &json!({"user": "u", "secret": "s"}))
        .unwrap();

    assert_eq!(doc.lookup(&["secret"]), Some(&Value::from("s")));
    assert_eq!(mapper.to_json_value(&ty, &doc).unwrap(), json!({"user": "u"}));
}

// ============================================================================
// Custom binders
// ============================================================================

/// Colors travel as `#rrggbb` and live in the graph as a single integer
struct HexColor;

impl CustomReader for HexColor {
    fn read(
        &self,
        _ctx: &mut DecodeContext<'_>,
        reader: &mut dyn TokenReader,
    ) -> graphbind_core::Result<Value> {
        let rgb = match reader.current() {
            Some(Token::String(text)) => text
                .strip_prefix('#')
                .and_then(|hex| i32::from_str_radix(hex, 16).ok())
                .ok_or_else(|| BindError::invalid_value("Color", format!("bad color `{}`", text)))?,
            other => {
                return Err(BindError::mismatch("Color", other.map(Token::kind)));
            }
        };
        reader.advance()?;
        Ok(Value::Int(rgb))
    }
}

impl CustomWriter for HexColor {
    fn write(
        &self,
        _ctx: &mut EncodeContext<'_>,
        writer: &mut dyn TokenWriter,
        value: &Value,
    ) -> graphbind_core::Result<()> {
        match value.as_i64() {
            Some(rgb) => writer.write_string(&format!("#{:06x}", rgb)),
            None => writer.write_null(),
        }
    }
}

#[test]
fn test_type_level_custom_binders() {
    let registry = TypeRegistry::new()
        .with(
            TypeMeta::bean("Color")
                .reader(Arc::new(HexColor))
                .writer(Arc::new(HexColor)),
        )
        .unwrap()
        .with(
            TypeMeta::bean("Theme")
                .property(PropertyMeta::new("background", TypeDescriptor::named("Color"))),
        )
        .unwrap();
    let mapper = Mapper::new(Arc::new(registry));
    let ty = TypeDescriptor::named("Theme");
    let input = json!({"background": "#00ff80"});

    let doc = mapper.read_json(&ty, &input).unwrap();
    assert_eq!(doc.lookup(&["background"]), Some(&Value::Int(0x00ff80)));
    assert_eq!(mapper.to_json_value(&ty, &doc).unwrap(), input);

    let err = mapper
        .read_json(&ty, &json!({"background": "red"}))
        .unwrap_err();
    assert!(matches!(err, BindError::InvalidValue { .. }));
}

#[test]
fn test_use_site_value_handler_is_not_cached() {
    let handler = ValueHandler {
        reader: Some(Arc::new(HexColor)),
        writer: Some(Arc::new(HexColor)),
    };
    let ty = TypeDescriptor::int().with_value_handler(handler);
    let mapper = Mapper::new(Arc::new(TypeRegistry::new()));

    let doc = mapper.read_json(&ty, &json!("#000010")).unwrap();
    assert_eq!(doc.root(), &Value::Int(16));
    assert_eq!(mapper.to_json_value(&ty, &doc).unwrap(), json!("#000010"));
    assert!(!mapper.read_provider().is_published(&TypeDescriptor::int()));
}
