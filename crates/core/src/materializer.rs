//! Built-in materializer for JSON-backed units.
//!
//! Executes a backing file by parsing it as a JSON object whose keys become
//! the unit's exported symbols. The reserved `_requires_` key (an array of
//! symbolic names) declares dependencies through the context instead of
//! being exported.

use modload_api::{BoxError, MaterializeContext, Materializer, Unit};
use serde_json::Value;

const REQUIRES_KEY: &str = "_requires_";

#[derive(Debug, Default)]
pub struct JsonMaterializer;

impl JsonMaterializer {
    pub fn new() -> Self {
        Self
    }
}

impl Materializer for JsonMaterializer {
    fn materialize(&self, ctx: &MaterializeContext<'_>) -> Result<Unit, BoxError> {
        let source = std::fs::read_to_string(ctx.locator())?;
        let value: Value = serde_json::from_str(&source)?;
        let Value::Object(mut members) = value else {
            return Err(format!(
                "unit {} must be a JSON object, got {}",
                ctx.name(),
                json_type(&value)
            )
            .into());
        };

        if let Some(requires) = members.remove(REQUIRES_KEY) {
            let Value::Array(requires) = requires else {
                return Err(format!("{REQUIRES_KEY} in {} must be an array", ctx.name()).into());
            };
            for required in requires {
                let Value::String(dep) = required else {
                    return Err(
                        format!("{REQUIRES_KEY} in {} must hold names", ctx.name()).into(),
                    );
                };
                ctx.declare_dependency(&dep)?;
            }
        }

        Ok(Unit::with_exports(ctx.name(), members.into_iter().collect()))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResolutionRegistry;
    use modload_api::{DependencySink, EntryKind};
    use std::path::PathBuf;

    fn materialize_file(contents: &str, registry: &ResolutionRegistry) -> Result<Unit, BoxError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.unit");
        std::fs::write(&path, contents).unwrap();
        let ctx = MaterializeContext::new("App.User", &path, registry as &dyn DependencySink);
        JsonMaterializer::new().materialize(&ctx)
    }

    #[test]
    fn object_members_become_exports() {
        let registry = ResolutionRegistry::new();
        let unit = materialize_file(r#"{"User": {"table": "users"}}"#, &registry).unwrap();
        assert!(unit.export("User").is_some());
        assert!(unit.export("Missing").is_none());
    }

    #[test]
    fn requires_key_declares_dependencies() {
        let registry = ResolutionRegistry::new();
        registry.register("App.User", Some(PathBuf::from("/u.unit")), EntryKind::Leaf);
        registry.register("App.Base", Some(PathBuf::from("/b.unit")), EntryKind::Leaf);

        let unit =
            materialize_file(r#"{"_requires_": ["App.Base"], "User": 1}"#, &registry).unwrap();
        assert!(unit.export(REQUIRES_KEY).is_none());
        assert!(registry.get("App.User").unwrap().dependencies.contains("App.Base"));
        assert!(registry.get("App.Base").unwrap().dependents.contains("App.User"));
    }

    #[test]
    fn non_object_units_are_rejected() {
        let registry = ResolutionRegistry::new();
        let err = materialize_file("[1, 2]", &registry).unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));
    }
}
