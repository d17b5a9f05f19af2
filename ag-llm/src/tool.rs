use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Description of one tool parameter.
///
/// Keywords other than `type`, `description` and `nullable` (`enum`, `items`,
/// ...) are kept in `extra` and emitted unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolInput {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            nullable: None,
            extra: Map::new(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    pub fn with_keyword(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable == Some(true)
    }
}

/// Parameters of a tool, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Map<String, Value>", try_from = "Map<String, Value>")]
pub struct ToolInputs(Vec<(String, ToolInput)>);

impl ToolInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter; a replaced parameter keeps its position.
    pub fn with(mut self, name: impl Into<String>, input: ToolInput) -> Self {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = input,
            None => self.0.push((name, input)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolInput> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, i)| i)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ToolInput)> {
        self.0.iter().map(|(n, i)| (n.as_str(), i))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ToolInputs> for Map<String, Value> {
    fn from(inputs: ToolInputs) -> Self {
        inputs
            .0
            .into_iter()
            .map(|(name, input)| {
                let v = serde_json::to_value(input).unwrap_or(Value::Null);
                (name, v)
            })
            .collect()
    }
}

impl TryFrom<Map<String, Value>> for ToolInputs {
    type Error = serde_json::Error;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut out = Vec::with_capacity(map.len());
        for (name, v) in map {
            out.push((name, serde_json::from_value(v)?));
        }
        Ok(Self(out))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub inputs: ToolInputs,
}

/// Anything an agent can offer to a model as a callable tool.
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;
}

impl Tool for ToolSpec {
    fn spec(&self) -> ToolSpec {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inputs_deserialize_in_declaration_order() {
        let spec: ToolSpec = serde_json::from_value(json!({
            "name": "search",
            "description": "web search",
            "inputs": {
                "query": { "type": "string", "description": "what to look for" },
                "limit": { "type": "integer", "description": "max hits", "nullable": true },
                "lang": { "type": "string", "description": "language", "enum": ["en", "fr"] }
            }
        }))
        .unwrap();

        let names: Vec<&str> = spec.inputs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["query", "limit", "lang"]);
        assert!(spec.inputs.get("limit").unwrap().is_nullable());
        assert_eq!(
            spec.inputs.get("lang").unwrap().extra.get("enum"),
            Some(&json!(["en", "fr"]))
        );
    }

    #[test]
    fn input_without_type_is_rejected() {
        let err = serde_json::from_value::<ToolSpec>(json!({
            "name": "broken",
            "description": "no type",
            "inputs": { "x": { "description": "missing type" } }
        }));
        assert!(err.is_err());
    }

    #[test]
    fn with_replaces_in_place() {
        let inputs = ToolInputs::new()
            .with("a", ToolInput::new("string", "first"))
            .with("b", ToolInput::new("string", "second"))
            .with("a", ToolInput::new("integer", "replaced"));
        let names: Vec<&str> = inputs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(inputs.get("a").unwrap().kind, "integer");
    }
}
