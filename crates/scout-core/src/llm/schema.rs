//! Function-calling schema types sent to the chat model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A callable function as advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Function name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Parameter schema
    pub parameters: FunctionParameters,
}

/// Parameter object schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameters {
    /// Always "object"
    #[serde(rename = "type")]
    pub kind: String,
    /// Parameter name to its spec
    pub properties: BTreeMap<String, ParameterSpec>,
    /// Names of required parameters
    pub required: Vec<String>,
}

impl Default for FunctionParameters {
    fn default() -> Self {
        Self {
            kind: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

/// A single parameter: only its type and description survive translation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Semantic type ("string", "number", ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
