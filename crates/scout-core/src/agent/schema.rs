//! Tool schema adapter
//!
//! Converts the server's tool descriptions into the chat model's
//! function-calling schema. The conversion is deliberately lossy: per
//! parameter only `type` and `description` survive, and everything else in
//! the input schema (enums, formats, nested objects) is dropped. The model
//! gets a flat view; the server still validates real arguments.

use crate::llm::schema::{FunctionDecl, FunctionParameters, ParameterSpec};
use crate::mcp::types::RemoteTool;
use serde_json::Value;

/// Adapter between server tool schemas and model function schemas
pub struct SchemaAdapter;

impl SchemaAdapter {
    /// Convert every server tool to a function declaration
    pub fn to_function_decls(tools: &[RemoteTool]) -> Vec<FunctionDecl> {
        tools.iter().map(Self::to_function_decl).collect()
    }

    /// Convert one tool, copying name and description verbatim
    pub fn to_function_decl(tool: &RemoteTool) -> FunctionDecl {
        let mut parameters = FunctionParameters::default();

        if let Some(properties) = tool.input_schema.get("properties").and_then(Value::as_object) {
            for (name, spec) in properties {
                parameters
                    .properties
                    .insert(name.clone(), Self::to_parameter_spec(spec));
            }
        }

        // Required list is copied verbatim; absent means empty
        if let Some(required) = tool.input_schema.get("required").and_then(Value::as_array) {
            parameters.required = required
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        FunctionDecl {
            name: tool.name.clone(),
            description: tool.description.clone().unwrap_or_default(),
            parameters,
        }
    }

    fn to_parameter_spec(spec: &Value) -> ParameterSpec {
        ParameterSpec {
            kind: spec
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string")
                .to_string(),
            description: spec
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}
