//! Tool Input Schemas
//!
//! Builds JSON Schema objects for tool parameters at registration time, so a
//! tool's declared shape lives next to its implementation.

use serde_json::{Map, Value, json};

#[derive(Debug, Clone)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    /// Array whose items follow the given schema
    Array(Value),
    /// Nested object schema (usually from another `SchemaBuilder`)
    Object(Value),
    /// One of a fixed set of strings
    Enum(Vec<&'static str>),
}

impl ParamType {
    fn to_schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Number => json!({"type": "number"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Array(items) => json!({"type": "array", "items": items}),
            Self::Object(schema) => schema.clone(),
            Self::Enum(values) => json!({"type": "string", "enum": values}),
        }
    }
}

/// Builder for an `object` JSON Schema
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    pub fn object() -> Self {
        Self::default()
    }

    pub fn param(
        mut self,
        name: &str,
        param_type: ParamType,
        description: &str,
        required: bool,
    ) -> Self {
        let mut schema = param_type.to_schema();
        if let Value::Object(map) = &mut schema {
            map.insert("description".to_string(), Value::String(description.into()));
        }
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn required(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.param(name, param_type, description, true)
    }

    pub fn optional(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.param(name, param_type, description, false)
    }

    pub fn build(self) -> Value {
        json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shape() {
        let schema = SchemaBuilder::object()
            .required("path", ParamType::String, "File path")
            .optional("limit", ParamType::Integer, "Max items")
            .required(
                "level",
                ParamType::Enum(vec!["HIGH", "LOW"]),
                "Severity",
            )
            .build();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["path"]["description"], "File path");
        assert_eq!(schema["properties"]["level"]["enum"][1], "LOW");
        assert_eq!(schema["required"], json!(["path", "level"]));
    }

    #[test]
    fn test_nested_array_of_objects() {
        let item = SchemaBuilder::object()
            .required("name", ParamType::String, "Name")
            .build();
        let schema = SchemaBuilder::object()
            .required("items", ParamType::Array(item), "Items")
            .build();
        assert_eq!(schema["properties"]["items"]["items"]["type"], "object");
    }
}
