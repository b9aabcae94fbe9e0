use crate::errors::{BindError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the write path does when a value contains itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfReferences {
    #[serde(rename = "fail")]
    Fail,
    #[serde(rename = "writeNull")]
    WriteNull,
}

impl Default for SelfReferences {
    fn default() -> Self {
        SelfReferences::Fail
    }
}

/// Mapper-wide inclusion rule for properties that do not choose their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultInclusion {
    #[serde(rename = "always")]
    Always,
    #[serde(rename = "nonNull")]
    NonNull,
    #[serde(rename = "nonEmpty")]
    NonEmpty,
}

impl Default for DefaultInclusion {
    fn default() -> Self {
        DefaultInclusion::Always
    }
}

/// Options that control the read path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOptions {
    /// Fail on fields no property, handler or catch-all claims (default: true)
    #[serde(default = "default_true")]
    pub fail_on_unknown_properties: bool,

    /// Skip unknown fields for every type (default: false)
    #[serde(default)]
    pub ignore_unknown: bool,

    /// Fail when an object ends before every creator argument was seen (default: false)
    #[serde(default)]
    pub fail_on_missing_creator_properties: bool,

    /// Read a lone value where an array is expected as a one-element list (default: false)
    #[serde(default)]
    pub accept_single_value_as_array: bool,

    /// Accept numbers and booleans written as strings, and the reverse (default: true)
    #[serde(default = "default_true")]
    pub allow_scalar_coercion: bool,

    /// Truncate integral doubles read into int or long (default: true)
    #[serde(default = "default_true")]
    pub accept_float_as_int: bool,

    /// Read unknown enum names as null instead of failing (default: false)
    #[serde(default)]
    pub read_unknown_enum_values_as_null: bool,

    /// Fail when tokens remain after the root value (default: false)
    #[serde(default)]
    pub fail_on_trailing_tokens: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            fail_on_unknown_properties: true,
            ignore_unknown: false,
            fail_on_missing_creator_properties: false,
            accept_single_value_as_array: false,
            allow_scalar_coercion: true,
            accept_float_as_int: true,
            read_unknown_enum_values_as_null: false,
            fail_on_trailing_tokens: false,
        }
    }
}

/// Options that control the write path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOptions {
    /// Handling of values that contain themselves (default: fail)
    #[serde(default)]
    pub self_references: SelfReferences,

    /// Inclusion rule for properties without their own (default: always)
    #[serde(default)]
    pub default_inclusion: DefaultInclusion,
}

/// Main mapper configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapperConfig {
    #[serde(default)]
    pub read_options: ReadOptions,

    #[serde(default)]
    pub write_options: WriteOptions,
}

impl MapperConfig {
    /// Load configuration from a JSON or YAML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| BindError::Config(format!("{}: {}", path.display(), e)))?,
            _ => serde_json::from_str(&content)
                .map_err(|e| BindError::Config(format!("{}: {}", path.display(), e)))?,
        };
        Ok(config)
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<()> {
        let config = MapperConfig::default();
        let text = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yaml::to_string(&config)?,
            _ => serde_json::to_string_pretty(&config)?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Lenient reading: unknown fields are skipped everywhere
    pub fn lenient() -> Self {
        let mut config = MapperConfig::default();
        config.read_options.fail_on_unknown_properties = false;
        config.read_options.ignore_unknown = true;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MapperConfig::default();
        assert!(config.read_options.fail_on_unknown_properties);
        assert!(config.read_options.allow_scalar_coercion);
        assert!(!config.read_options.fail_on_missing_creator_properties);
        assert_eq!(config.write_options.self_references, SelfReferences::Fail);
    }

    #[test]
    fn test_serialize_config() {
        let json = serde_json::to_string(&MapperConfig::default()).unwrap();
        assert!(json.contains("readOptions"));
        assert!(json.contains("failOnUnknownProperties"));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let json = r#"{
            "readOptions": { "ignoreUnknown": true },
            "writeOptions": { "selfReferences": "writeNull", "defaultInclusion": "nonNull" }
        }"#;
        let config: MapperConfig = serde_json::from_str(json).unwrap();
        assert!(config.read_options.ignore_unknown);
        assert!(config.read_options.fail_on_unknown_properties);
        assert_eq!(config.write_options.self_references, SelfReferences::WriteNull);
        assert_eq!(config.write_options.default_inclusion, DefaultInclusion::NonNull);
    }

    #[test]
    fn test_init_and_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graphbind.yaml");
        MapperConfig::init_file(&path).unwrap();

        let loaded = MapperConfig::from_file(&path).unwrap();
        assert!(loaded.read_options.fail_on_unknown_properties);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            MapperConfig::from_file(&path),
            Err(BindError::Config(_))
        ));
    }
}
