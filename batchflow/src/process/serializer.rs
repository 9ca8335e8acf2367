//! Task payload serializers.

use crate::errors::EngineResult;
use serde_json::Value;
use std::fmt::Debug;

/// Converts task payloads to and from their stored form.
pub trait Serializer: Send + Sync + Debug {
    /// Returns the serializer name.
    fn name(&self) -> &str;

    /// Serializes a payload.
    fn serialize(&self, value: &Value) -> EngineResult<String>;

    /// Deserializes a payload.
    fn deserialize(&self, raw: &str) -> EngineResult<Value>;
}

/// JSON serializer used when a task does not bring its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn serialize(&self, value: &Value) -> EngineResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize(&self, raw: &str) -> EngineResult<Value> {
        Ok(serde_json::from_str(raw)?)
    }
}
