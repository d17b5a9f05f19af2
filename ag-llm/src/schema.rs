use crate::tool::{Tool, ToolInput};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON Schema has no `any` primitive; such parameters are sent as strings.
const ANY_TYPE: &str = "any";
const ANY_REPLACEMENT: &str = "string";
/// Keywords owned by [`ToolInput`] fields; extra keywords cannot override them.
const RESERVED_KEYWORDS: [&str; 3] = ["type", "description", "nullable"];

/// Function descriptor in the chat-completions `tools` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ParametersSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl ParametersSchema {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.kind,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// Builds the descriptor a tool-calling backend expects for `tool`.
pub fn json_schema(tool: &dyn Tool) -> ToolDescriptor {
    let spec = tool.spec();
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, input) in spec.inputs.iter() {
        properties.insert(name.to_string(), property_schema(input));
        if !input.is_nullable() {
            required.push(name.to_string());
        }
    }

    ToolDescriptor {
        kind: "function".to_string(),
        function: FunctionDescriptor {
            name: spec.name,
            description: spec.description,
            parameters: ParametersSchema {
                kind: "object".to_string(),
                properties,
                required,
            },
        },
    }
}

fn property_schema(input: &ToolInput) -> Value {
    let kind = if input.kind == ANY_TYPE {
        ANY_REPLACEMENT
    } else {
        input.kind.as_str()
    };
    let mut out = Map::new();
    out.insert("type".to_string(), Value::String(kind.to_string()));
    out.insert(
        "description".to_string(),
        Value::String(input.description.clone()),
    );
    if let Some(nullable) = input.nullable {
        out.insert("nullable".to_string(), Value::Bool(nullable));
    }
    for (k, v) in &input.extra {
        if !RESERVED_KEYWORDS.contains(&k.as_str()) {
            out.insert(k.clone(), v.clone());
        }
    }
    Value::Object(out)
}
