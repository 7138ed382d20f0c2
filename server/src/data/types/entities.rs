//! Domain entities shared by the record stores and the cache
//!
//! Field rules are declared with `validator` and checked by the record
//! repositories before any statement reaches the database.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::enums::{AssignmentKind, PermissionKind, ProjectStatus};
use super::id::{Id, ResourceType};

/// Resource types an assignment or comment may be attached to
pub const ATTACHABLE_TYPES: &[ResourceType] = &[ResourceType::Issue, ResourceType::Document];

/// Resource types a role may belong to
pub const ROLE_OWNER_TYPES: &[ResourceType] = &[ResourceType::Organization, ResourceType::Project];

pub const PROJECT_KEY_MIN_LEN: usize = 2;
pub const PROJECT_KEY_MAX_LEN: usize = 10;

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============================================================================
// Field validators
// ============================================================================

fn id_of(id: &Id, allowed: &[ResourceType]) -> Result<(), ValidationError> {
    id.validate_kind(allowed).map_err(|e| {
        ValidationError::new("identifier").with_message(e.to_string().into())
    })
}

fn any_id(id: &Id) -> Result<(), ValidationError> {
    id.validate()
        .map_err(|e| ValidationError::new("identifier").with_message(e.to_string().into()))
}

fn assignment_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::Assignment])
}

fn comment_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::Comment])
}

fn namespace_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::Namespace])
}

fn notification_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::Notification])
}

fn organization_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::Organization])
}

fn permission_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::Permission])
}

fn project_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::Project])
}

fn role_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::Role])
}

fn user_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, &[ResourceType::User])
}

fn attachable_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, ATTACHABLE_TYPES)
}

fn role_owner_id(id: &Id) -> Result<(), ValidationError> {
    id_of(id, ROLE_OWNER_TYPES)
}

fn document_ids<T: AsRef<[Id]>>(ids: T) -> Result<(), ValidationError> {
    ids.as_ref()
        .iter()
        .try_for_each(|id| id_of(id, &[ResourceType::Document]))
}

fn issue_ids<T: AsRef<[Id]>>(ids: T) -> Result<(), ValidationError> {
    ids.as_ref()
        .iter()
        .try_for_each(|id| id_of(id, &[ResourceType::Issue]))
}

fn project_key(key: &str) -> Result<(), ValidationError> {
    let len = key.len();
    if !(PROJECT_KEY_MIN_LEN..=PROJECT_KEY_MAX_LEN).contains(&len) {
        return Err(ValidationError::new("project_key_length").with_message(
            format!(
                "Key must be {}-{} characters",
                PROJECT_KEY_MIN_LEN, PROJECT_KEY_MAX_LEN
            )
            .into(),
        ));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(ValidationError::new("project_key_charset")
            .with_message("Key must contain only A-Z and 0-9".into()));
    }
    Ok(())
}

// ============================================================================
// Assignment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Assignment {
    #[validate(custom(function = "assignment_id"))]
    pub id: Id,
    pub kind: AssignmentKind,
    #[validate(custom(function = "user_id"))]
    pub user: Id,
    #[validate(custom(function = "attachable_id"))]
    pub resource: Id,
    pub created_at: i64,
}

impl Assignment {
    pub fn new(kind: AssignmentKind, user: Id, resource: Id) -> Self {
        Self {
            id: Id::generate(ResourceType::Assignment),
            kind,
            user,
            resource,
            created_at: unix_now(),
        }
    }
}

// ============================================================================
// Comment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Comment {
    #[validate(custom(function = "comment_id"))]
    pub id: Id,
    #[validate(length(min = 1, max = 10000, message = "Content must be 1-10000 characters"))]
    pub content: String,
    #[validate(custom(function = "user_id"))]
    pub created_by: Id,
    #[validate(custom(function = "attachable_id"))]
    pub belongs_to: Id,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl Comment {
    pub fn new(content: impl Into<String>, created_by: Id, belongs_to: Id) -> Self {
        Self {
            id: Id::generate(ResourceType::Comment),
            content: content.into(),
            created_by,
            belongs_to,
            created_at: unix_now(),
            updated_at: None,
        }
    }
}

// ============================================================================
// Namespace
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Namespace {
    #[validate(custom(function = "namespace_id"))]
    pub id: Id,
    #[validate(custom(function = "organization_id"))]
    pub organization: Id,
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
    /// Projects whose namespace is this one; derived on read
    pub projects: Vec<Id>,
    #[validate(custom(function = "document_ids"))]
    pub documents: Vec<Id>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl Namespace {
    pub fn new(organization: Id, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Id::generate(ResourceType::Namespace),
            organization,
            name: name.into(),
            description: description.into(),
            projects: Vec::new(),
            documents: Vec::new(),
            created_at: unix_now(),
            updated_at: None,
        }
    }
}

/// Partial namespace update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NamespacePatch {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    #[validate(custom(function = "document_ids"))]
    pub documents: Option<Vec<Id>>,
}

// ============================================================================
// Notification
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Notification {
    #[validate(custom(function = "notification_id"))]
    pub id: Id,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: String,
    #[validate(custom(function = "user_id"))]
    pub recipient: Id,
    pub read: bool,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, recipient: Id) -> Self {
        Self {
            id: Id::generate(ResourceType::Notification),
            title: title.into(),
            description: description.into(),
            recipient,
            read: false,
            created_at: unix_now(),
            updated_at: None,
        }
    }
}

// ============================================================================
// Permission
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Permission {
    #[validate(custom(function = "permission_id"))]
    pub id: Id,
    pub kind: PermissionKind,
    /// Usually a User or Role
    #[validate(custom(function = "any_id"))]
    pub subject: Id,
    #[validate(custom(function = "any_id"))]
    pub target: Id,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl Permission {
    pub fn new(kind: PermissionKind, subject: Id, target: Id) -> Self {
        Self {
            id: Id::generate(ResourceType::Permission),
            kind,
            subject,
            target,
            created_at: unix_now(),
            updated_at: None,
        }
    }
}

// ============================================================================
// Project
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Project {
    #[validate(custom(function = "project_id"))]
    pub id: Id,
    #[validate(custom(function = "namespace_id"))]
    pub namespace: Id,
    #[validate(custom(function = "project_key"))]
    pub key: String,
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
    pub status: ProjectStatus,
    /// Roles that belong to this project; derived on read
    pub teams: Vec<Id>,
    #[validate(custom(function = "document_ids"))]
    pub documents: Vec<Id>,
    #[validate(custom(function = "issue_ids"))]
    pub issues: Vec<Id>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl Project {
    pub fn new(namespace: Id, key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Id::generate(ResourceType::Project),
            namespace,
            key: key.into(),
            name: name.into(),
            description: String::new(),
            status: ProjectStatus::default(),
            teams: Vec::new(),
            documents: Vec::new(),
            issues: Vec::new(),
            created_at: unix_now(),
            updated_at: None,
        }
    }
}

/// Partial project update; the key is immutable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProjectPatch {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    #[validate(custom(function = "document_ids"))]
    pub documents: Option<Vec<Id>>,
    #[validate(custom(function = "issue_ids"))]
    pub issues: Option<Vec<Id>>,
}

// ============================================================================
// Role
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Role {
    #[validate(custom(function = "role_id"))]
    pub id: Id,
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
    #[validate(custom(function = "role_owner_id"))]
    pub belongs_to: Id,
    /// Member users, from the role_members table
    pub members: Vec<Id>,
    /// Permissions whose subject is this role; derived on read
    pub permissions: Vec<Id>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl Role {
    pub fn new(name: impl Into<String>, description: impl Into<String>, belongs_to: Id) -> Self {
        Self {
            id: Id::generate(ResourceType::Role),
            name: name.into(),
            description: description.into(),
            belongs_to,
            members: Vec::new(),
            permissions: Vec::new(),
            created_at: unix_now(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RolePatch {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Id {
        Id::new(ResourceType::User, "u1")
    }

    #[test]
    fn test_assignment_on_issue_is_valid() {
        let a = Assignment::new(
            AssignmentKind::Assignee,
            user(),
            Id::new(ResourceType::Issue, "i1"),
        );
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_assignment_on_project_is_invalid() {
        let a = Assignment::new(
            AssignmentKind::Reviewer,
            user(),
            Id::new(ResourceType::Project, "p1"),
        );
        let errors = a.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("resource"));
    }

    #[test]
    fn test_comment_requires_content() {
        let c = Comment::new("", user(), Id::new(ResourceType::Document, "d1"));
        let errors = c.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("content"));
    }

    #[test]
    fn test_notification_requires_user_recipient() {
        let n = Notification::new("Hello", "", Id::new(ResourceType::Role, "r1"));
        let errors = n.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("recipient"));

        let ok = Notification::new("Hello", "", user());
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_zero_identifier_is_invalid() {
        let n = Notification::new("Hello", "", Id::new(ResourceType::User, ""));
        assert!(n.validate().is_err());
    }

    #[test]
    fn test_project_key_rules() {
        let ns = Id::new(ResourceType::Namespace, "n1");
        assert!(Project::new(ns.clone(), "CORE", "Core").validate().is_ok());
        assert!(Project::new(ns.clone(), "core", "Core").validate().is_err());
        assert!(Project::new(ns.clone(), "C", "Core").validate().is_err());
        assert!(Project::new(ns, "CORE1234567", "Core").validate().is_err());
    }

    #[test]
    fn test_project_documents_must_be_documents() {
        let mut p = Project::new(Id::new(ResourceType::Namespace, "n1"), "WEB", "Web");
        p.documents = vec![Id::new(ResourceType::Issue, "i1")];
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_role_owner_types() {
        let org_role = Role::new("Admins", "", Id::new(ResourceType::Organization, "o1"));
        assert!(org_role.validate().is_ok());
        let bad = Role::new("Admins", "", user());
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_patch_validation() {
        let patch = ProjectPatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
        assert!(ProjectPatch::default().validate().is_ok());
    }

    #[test]
    fn test_entities_round_trip_through_messagepack() {
        let role = Role::new("Team", "core team", Id::new(ResourceType::Project, "p1"));
        let bytes = rmp_serde::to_vec(&role).unwrap();
        let back: Role = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, role);
    }
}
