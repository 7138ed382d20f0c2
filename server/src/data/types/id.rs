//! Typed resource identifiers
//!
//! Every entity is addressed by an [`Id`]: a resource-type tag plus an opaque
//! value. The canonical string form is `Type:value`, e.g. `Issue:k2x9...`.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Separator between the type tag and the value in the canonical form.
/// Shared with the cache key grammar, so values may never contain it.
pub const ID_SEPARATOR: char = ':';

/// Resource types known to the data layer
///
/// Declaration order is alphabetical and defines the ordering of [`Id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Assignment,
    Attachment,
    Comment,
    Document,
    Issue,
    Label,
    Namespace,
    Notification,
    Organization,
    Permission,
    Project,
    Role,
    Todo,
    User,
    UserToken,
}

impl ResourceType {
    pub const ALL: [ResourceType; 15] = [
        Self::Assignment,
        Self::Attachment,
        Self::Comment,
        Self::Document,
        Self::Issue,
        Self::Label,
        Self::Namespace,
        Self::Notification,
        Self::Organization,
        Self::Permission,
        Self::Project,
        Self::Role,
        Self::Todo,
        Self::User,
        Self::UserToken,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Assignment => "Assignment",
            Self::Attachment => "Attachment",
            Self::Comment => "Comment",
            Self::Document => "Document",
            Self::Issue => "Issue",
            Self::Label => "Label",
            Self::Namespace => "Namespace",
            Self::Notification => "Notification",
            Self::Organization => "Organization",
            Self::Permission => "Permission",
            Self::Project => "Project",
            Self::Role => "Role",
            Self::Todo => "Todo",
            Self::User => "User",
            Self::UserToken => "UserToken",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IdError::UnknownType(s.to_string()))
    }
}

/// Identifier validation and parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("{0} identifier is empty")]
    Empty(ResourceType),

    #[error("{kind} identifier '{value}' contains a reserved character")]
    ReservedCharacter { kind: ResourceType, value: String },

    #[error("expected {expected} identifier, got {actual}")]
    UnexpectedType { expected: String, actual: ResourceType },

    #[error("unknown resource type '{0}'")]
    UnknownType(String),

    #[error("malformed identifier '{0}': expected Type:value")]
    Malformed(String),
}

/// Resource identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    kind: ResourceType,
    value: String,
}

impl Id {
    pub fn new(kind: ResourceType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Create a fresh identifier with a CUID2 value
    pub fn generate(kind: ResourceType) -> Self {
        Self::new(kind, cuid2::create_id())
    }

    pub fn kind(&self) -> ResourceType {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The zero identifier has no value
    pub fn is_zero(&self) -> bool {
        self.value.is_empty()
    }

    /// Non-empty and free of the key separator and wildcard
    pub fn validate(&self) -> Result<(), IdError> {
        if self.is_zero() {
            return Err(IdError::Empty(self.kind));
        }
        if self.value.contains([ID_SEPARATOR, '*']) {
            return Err(IdError::ReservedCharacter {
                kind: self.kind,
                value: self.value.clone(),
            });
        }
        Ok(())
    }

    /// Validate and require the type tag to be one of `allowed`
    pub fn validate_kind(&self, allowed: &[ResourceType]) -> Result<(), IdError> {
        self.validate()?;
        if allowed.contains(&self.kind) {
            return Ok(());
        }
        let expected = allowed
            .iter()
            .map(ResourceType::as_str)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(IdError::UnexpectedType {
            expected,
            actual: self.kind,
        })
    }
}

/// Encode an identifier list as a JSON array of canonical strings
pub fn ids_to_json(ids: &[Id]) -> String {
    serde_json::Value::from(ids.iter().map(Id::to_string).collect::<Vec<_>>()).to_string()
}

/// Decode a JSON array written by [`ids_to_json`]
pub fn ids_from_json(raw: &str) -> Result<Vec<Id>, IdError> {
    let values: Vec<String> =
        serde_json::from_str(raw).map_err(|_| IdError::Malformed(raw.to_string()))?;
    values.iter().map(|v| v.parse()).collect()
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, ID_SEPARATOR, self.value)
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(ID_SEPARATOR)
            .ok_or_else(|| IdError::Malformed(s.to_string()))?;
        Ok(Self::new(kind.parse()?, value))
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
