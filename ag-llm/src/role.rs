use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Conversational role of a message.
///
/// `ToolCall` and `ToolResponse` are framework-level roles; most backends only
/// understand the first three, see [`tool_role_conversions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    ToolCall,
    ToolResponse,
}

const ALL_ROLES: [Role; 5] = [
    Role::User,
    Role::Assistant,
    Role::System,
    Role::ToolCall,
    Role::ToolResponse,
];

impl Role {
    /// Wire spellings of every role, in definition order.
    pub fn roles() -> [&'static str; 5] {
        ALL_ROLES.map(Role::as_str)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::ToolCall => "tool-call",
            Role::ToolResponse => "tool-response",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_ROLES
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| LlmError::InvalidRole {
                role: s.to_string(),
                allowed: Role::roles().to_vec(),
            })
    }
}

impl TryFrom<&str> for Role {
    type Error = LlmError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<String> for Role {
    type Error = LlmError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Role remapping applied before messages are sent to a backend.
///
/// An empty table leaves every role untouched.
pub type RoleConversions = BTreeMap<Role, Role>;

/// Maps the tool roles onto the roles every chat backend accepts.
pub fn tool_role_conversions() -> RoleConversions {
    BTreeMap::from([
        (Role::ToolCall, Role::Assistant),
        (Role::ToolResponse, Role::User),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_listed_in_definition_order() {
        assert_eq!(
            Role::roles(),
            ["user", "assistant", "system", "tool-call", "tool-response"]
        );
        assert_eq!(Role::roles(), Role::roles());
    }

    #[test]
    fn role_text_round_trips_through_from_str() {
        for name in Role::roles() {
            let role: Role = name.parse().expect("known role parses");
            assert_eq!(role.as_str(), name);
            assert_eq!(role.to_string(), name);
        }
    }

    #[test]
    fn unknown_role_names_the_role_and_allowed_set() {
        let err = "bot".parse::<Role>().expect_err("bot is not a role");
        match &err {
            LlmError::InvalidRole { role, allowed } => {
                assert_eq!(role, "bot");
                assert_eq!(allowed.len(), 5);
                assert!(allowed.contains(&"tool-response"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("\"bot\""));
    }

    #[test]
    fn serde_uses_wire_spellings_and_rejects_unknown_roles() {
        assert_eq!(
            serde_json::to_string(&Role::ToolCall).unwrap(),
            "\"tool-call\""
        );
        let parsed: Role = serde_json::from_str("\"tool-response\"").unwrap();
        assert_eq!(parsed, Role::ToolResponse);
        assert!(serde_json::from_str::<Role>("\"tool\"").is_err());
    }

    #[test]
    fn default_conversions_map_tool_roles_only() {
        let table = tool_role_conversions();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&Role::ToolCall), Some(&Role::Assistant));
        assert_eq!(table.get(&Role::ToolResponse), Some(&Role::User));
        assert!(!table.contains_key(&Role::System));
    }
}
