//! Message author roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Roles supported in a chat conversation.
///
/// Decoding is lenient: labels are matched case-insensitively and anything
/// unrecognised (for example the `"error"` rows a chat store may keep) is read
/// as [`Role::User`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Role {
    /// System messages steer the assistant behaviour.
    System,
    /// User-authored content.
    #[default]
    User,
    /// Assistant (model) responses.
    Assistant,
    /// Code output emitted while the model was in code mode.
    CodeBlock,
}

impl Role {
    /// Returns the canonical label used on the wire.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::CodeBlock => "codeBlock",
        }
    }

    /// Resolves a label, falling back to [`Role::User`] for unknown input.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("system") {
            Self::System
        } else if label.eq_ignore_ascii_case("assistant") {
            Self::Assistant
        } else if label.eq_ignore_ascii_case("codeblock") || label.eq_ignore_ascii_case("code_block")
        {
            Self::CodeBlock
        } else {
            Self::User
        }
    }

    /// Returns `true` for [`Role::System`].
    #[must_use]
    pub const fn is_system(self) -> bool {
        matches!(self, Self::System)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.map_or(Self::User, |label| Self::from_label(&label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_case_insensitively() {
        assert_eq!(Role::from_label("SYSTEM"), Role::System);
        assert_eq!(Role::from_label("Assistant"), Role::Assistant);
        assert_eq!(Role::from_label("codeBlock"), Role::CodeBlock);
        assert_eq!(Role::from_label(" user "), Role::User);
    }

    #[test]
    fn unknown_labels_read_as_user() {
        assert_eq!(Role::from_label("error"), Role::User);
        assert_eq!(Role::from_label(""), Role::User);
    }

    #[test]
    fn null_label_reads_as_user() {
        let role: Role = serde_json::from_str("null").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn serialises_canonical_label() {
        let json = serde_json::to_string(&Role::CodeBlock).unwrap();
        assert_eq!(json, "\"codeBlock\"");
    }
}
