//! Entity classification enums
//!
//! Stored as lowercase text in both record stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a stored enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $label,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// How a user is attached to an issue or document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentKind {
    #[default]
    Assignee,
    Reviewer,
}

text_enum!(AssignmentKind, "assignment kind", {
    Assignee => "assignee",
    Reviewer => "reviewer",
});

/// Access granted by a permission
///
/// `All` implies every other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    #[default]
    Read,
    Write,
    Create,
    Delete,
    All,
}

text_enum!(PermissionKind, "permission kind", {
    Read => "read",
    Write => "write",
    Create => "create",
    Delete => "delete",
    All => "all",
});

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    #[default]
    Active,
    Archived,
}

text_enum!(ProjectStatus, "project status", {
    Pending => "pending",
    Active => "active",
    Archived => "archived",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip() {
        for kind in [
            PermissionKind::Read,
            PermissionKind::Write,
            PermissionKind::Create,
            PermissionKind::Delete,
            PermissionKind::All,
        ] {
            assert_eq!(kind.as_str().parse::<PermissionKind>().unwrap(), kind);
        }
        assert_eq!("reviewer".parse::<AssignmentKind>().unwrap(), AssignmentKind::Reviewer);
        assert_eq!(ProjectStatus::Archived.to_string(), "archived");
    }

    #[test]
    fn test_unknown_value() {
        let err = "paused".parse::<ProjectStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid project status value 'paused'");
    }

    #[test]
    fn test_serde_matches_storage_text() {
        assert_eq!(
            serde_json::to_string(&AssignmentKind::Assignee).unwrap(),
            "\"assignee\""
        );
    }
}
