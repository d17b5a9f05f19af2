use crate::error::Result;
use crate::role::{Role, RoleConversions};
use serde::{Deserialize, Serialize};

/// Inserted between the contents of two merged same-role messages.
pub const MERGE_SEPARATOR: &str = "\n=======\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Builds messages from `(role, content)` text pairs.
///
/// Fails on the first role outside [`Role::roles`].
pub fn parse_messages<R, C>(pairs: impl IntoIterator<Item = (R, C)>) -> Result<Vec<Message>>
where
    R: AsRef<str>,
    C: Into<String>,
{
    pairs
        .into_iter()
        .map(|(role, content)| -> Result<Message> {
            Ok(Message::new(role.as_ref().parse()?, content))
        })
        .collect()
}

/// Applies `conversions` and merges consecutive messages that share a role.
///
/// The input is left untouched. No two adjacent entries of the result share a
/// role, and every original content survives in order, joined by
/// [`MERGE_SEPARATOR`] where a merge happened.
pub fn clean_message_list(messages: &[Message], conversions: &RoleConversions) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for m in messages {
        let mut m = m.clone();
        if let Some(mapped) = conversions.get(&m.role) {
            m.role = *mapped;
        }
        match out.last_mut() {
            Some(last) if last.role == m.role => {
                last.content.push_str(MERGE_SEPARATOR);
                last.content.push_str(&m.content);
            }
            _ => out.push(m),
        }
    }
    out
}
