use std::collections::HashMap;
use std::path::Path;

use jsonschema::{Draft, Validator};
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read schema {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("schema {name} is not valid JSON: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("schema {name} failed to compile: {message}")]
    Compile { name: String, message: String },
}

/// Compiled JSON Schemas keyed by logical type name.
///
/// Built once at startup and read-only afterwards.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Validator>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every `*.json` file in `dir`, registered under its file stem
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        let mut registry = Self::new();

        let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| RegistryError::Io {
                    path: dir.display().to_string(),
                    source,
                })?
                .path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let raw = std::fs::read_to_string(&path).map_err(|source| RegistryError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let schema: Value = serde_json::from_str(&raw).map_err(|source| RegistryError::Json {
                name: name.clone(),
                source,
            })?;

            registry.register(name, &schema)?;
        }

        tracing::info!("Loaded {} validation schemas from {}", registry.len(), dir.display());
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, schema: &Value) -> Result<(), RegistryError> {
        let name = name.into();
        let compiled = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(schema)
            .map_err(|e| RegistryError::Compile {
                name: name.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("Registered schema '{}'", name);
        self.schemas.insert(name, compiled);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validate `payload` against the schema registered as `type_name`.
    ///
    /// The payload is moved through untouched on success; callers that need
    /// to keep the original must clone before calling. Without a type name
    /// the payload is returned unchecked.
    pub fn validate(&self, payload: Value, type_name: Option<&str>) -> Result<Value, ApiError> {
        let Some(type_name) = type_name else {
            return Ok(payload);
        };

        let validator = self.schemas.get(type_name).ok_or_else(|| {
            ApiError::internal_server_error(format!("schema {type_name} is not registered"))
        })?;

        let errors: Vec<(String, String)> = validator
            .iter_errors(&payload)
            .map(|e| (field_path(&e.instance_path.to_string()), e.to_string()))
            .collect();

        let Some((path, message)) = errors.first() else {
            return Ok(payload);
        };

        let details: Vec<Value> = errors
            .iter()
            .map(|(path, message)| json!({ "path": path, "message": message }))
            .collect();

        Err(ApiError::validation_error(
            format!("{path} {message}"),
            Value::Array(details),
        ))
    }
}

fn field_path(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "CreateNode",
                &json!({
                    "type": "object",
                    "required": ["title"],
                    "properties": {
                        "title": { "type": "string" },
                        "tags": { "type": "array", "items": { "type": "string" } }
                    }
                }),
            )
            .unwrap();
        registry
    }

    #[test]
    fn passes_valid_payload_through() {
        let payload = json!({ "title": "hello", "tags": ["a"] });
        let out = registry().validate(payload.clone(), Some("CreateNode")).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn message_starts_with_field_path() {
        let err = registry()
            .validate(json!({ "title": 42 }), Some("CreateNode"))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().starts_with("/title "), "{}", err.message());
    }

    #[test]
    fn nested_paths_are_reported() {
        let err = registry()
            .validate(json!({ "title": "t", "tags": ["ok", 7] }), Some("CreateNode"))
            .unwrap_err();
        assert!(err.message().starts_with("/tags/1 "), "{}", err.message());
    }

    #[test]
    fn root_errors_use_slash_path() {
        let err = registry().validate(json!({}), Some("CreateNode")).unwrap_err();
        assert!(err.message().starts_with("/ "), "{}", err.message());
    }

    #[test]
    fn keeps_full_error_list_as_metadata() {
        let err = registry()
            .validate(json!({ "tags": [1, 2] }), Some("CreateNode"))
            .unwrap_err();
        let errors = err.metadata().unwrap()["errors"].as_array().unwrap().clone();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn skips_validation_without_type_name() {
        let payload = json!("anything");
        assert_eq!(registry().validate(payload.clone(), None).unwrap(), payload);
    }

    #[test]
    fn unknown_type_name_fails() {
        let err = registry().validate(json!({}), Some("Missing")).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn rejects_invalid_schema() {
        let mut registry = SchemaRegistry::new();
        let result = registry.register("Broken", &json!({ "type": "not-a-type" }));
        assert!(matches!(result, Err(RegistryError::Compile { .. })));
    }
}
