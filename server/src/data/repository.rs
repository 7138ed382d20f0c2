//! Repository traits
//!
//! One trait per entity. The SQLite and PostgreSQL services implement them
//! against the record store; the types in [`crate::data::cached`] implement
//! them again on top of an inner repository and a [`BaseCache`].
//!
//! Pagination uses `offset`/`limit` row counts. A `limit` of zero yields an
//! empty page.
//!
//! [`BaseCache`]: crate::data::cache::BaseCache

use async_trait::async_trait;
use validator::Validate;

use crate::data::error::{DataError, RecordOp, RepositoryError};
use crate::data::types::{
    Assignment, Comment, Id, Namespace, NamespacePatch, Notification, Permission, PermissionKind,
    Project, ProjectPatch, ResourceType, Role, RolePatch,
};

const COMMENT_MAX_LEN: usize = 10000;

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn create(&self, assignment: &Assignment) -> Result<Assignment, RepositoryError>;

    async fn get(&self, id: &Id) -> Result<Assignment, RepositoryError>;

    async fn get_by_user(
        &self,
        user: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Assignment>, RepositoryError>;

    async fn get_by_resource(
        &self,
        resource: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Assignment>, RepositoryError>;

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Store `comment` under `parent`, which overrides `comment.belongs_to`
    async fn create(&self, parent: &Id, comment: &Comment) -> Result<Comment, RepositoryError>;

    async fn get(&self, id: &Id) -> Result<Comment, RepositoryError>;

    async fn get_all_belongs_to(
        &self,
        parent: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Comment>, RepositoryError>;

    async fn update(&self, id: &Id, content: &str) -> Result<Comment, RepositoryError>;

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NamespaceRepository: Send + Sync {
    async fn create(
        &self,
        organization: &Id,
        namespace: &Namespace,
    ) -> Result<Namespace, RepositoryError>;

    async fn get(&self, id: &Id) -> Result<Namespace, RepositoryError>;

    async fn get_all(
        &self,
        organization: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Namespace>, RepositoryError>;

    async fn update(&self, id: &Id, patch: &NamespacePatch) -> Result<Namespace, RepositoryError>;

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError>;
}

/// Notifications are always scoped to their recipient
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<Notification, RepositoryError>;

    async fn get(&self, id: &Id, recipient: &Id) -> Result<Notification, RepositoryError>;

    /// Newest first
    async fn get_all_by_recipient(
        &self,
        recipient: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Notification>, RepositoryError>;

    async fn update(
        &self,
        id: &Id,
        recipient: &Id,
        read: bool,
    ) -> Result<Notification, RepositoryError>;

    async fn delete(&self, id: &Id, recipient: &Id) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(&self, permission: &Permission) -> Result<Permission, RepositoryError>;

    async fn get(&self, id: &Id) -> Result<Permission, RepositoryError>;

    async fn get_by_subject(&self, subject: &Id) -> Result<Vec<Permission>, RepositoryError>;

    async fn get_by_target(&self, target: &Id) -> Result<Vec<Permission>, RepositoryError>;

    async fn get_by_subject_and_target(
        &self,
        subject: &Id,
        target: &Id,
    ) -> Result<Vec<Permission>, RepositoryError>;

    /// True when `subject` holds `kind` (or `All`) on `target`
    async fn has_permission(
        &self,
        subject: &Id,
        target: &Id,
        kind: PermissionKind,
    ) -> Result<bool, RepositoryError>;

    /// True when any permission links `subject` to `target`
    async fn has_any_relation(&self, subject: &Id, target: &Id) -> Result<bool, RepositoryError>;

    async fn update(&self, id: &Id, kind: PermissionKind) -> Result<Permission, RepositoryError>;

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, namespace: &Id, project: &Project) -> Result<Project, RepositoryError>;

    async fn get(&self, id: &Id) -> Result<Project, RepositoryError>;

    async fn get_by_key(&self, key: &str) -> Result<Project, RepositoryError>;

    async fn get_all(
        &self,
        namespace: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Project>, RepositoryError>;

    async fn update(&self, id: &Id, patch: &ProjectPatch) -> Result<Project, RepositoryError>;

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Store the role and make `created_by` its first member
    async fn create(
        &self,
        created_by: &Id,
        belongs_to: &Id,
        role: &Role,
    ) -> Result<Role, RepositoryError>;

    async fn get(&self, id: &Id) -> Result<Role, RepositoryError>;

    async fn get_all_belongs_to(
        &self,
        belongs_to: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Role>, RepositoryError>;

    async fn update(&self, id: &Id, patch: &RolePatch) -> Result<Role, RepositoryError>;

    async fn add_member(
        &self,
        role: &Id,
        member: &Id,
        belongs_to: &Id,
    ) -> Result<(), RepositoryError>;

    async fn remove_member(
        &self,
        role: &Id,
        member: &Id,
        belongs_to: &Id,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError>;
}

// ============================================================================
// Input checks shared by the record stores
// ============================================================================

/// Reject an identifier that is empty, malformed or of the wrong type
pub(crate) fn check_id(
    resource: ResourceType,
    op: RecordOp,
    id: &Id,
    allowed: &[ResourceType],
) -> Result<(), RepositoryError> {
    id.validate_kind(allowed)
        .map_err(|e| RepositoryError::record(resource, op, e))
}

/// Comment bodies follow the same length rule on create and update
pub(crate) fn check_comment_content(op: RecordOp, content: &str) -> Result<(), RepositoryError> {
    let len = content.chars().count();
    if (1..=COMMENT_MAX_LEN).contains(&len) {
        return Ok(());
    }
    Err(RepositoryError::record(
        ResourceType::Comment,
        op,
        DataError::Validation(format!("content: Content must be 1-{} characters", COMMENT_MAX_LEN)),
    ))
}

/// Run the entity's `validator` rules
pub(crate) fn check_fields<T: Validate>(
    resource: ResourceType,
    op: RecordOp,
    value: &T,
) -> Result<(), RepositoryError> {
    value
        .validate()
        .map_err(|e| RepositoryError::record(resource, op, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::error::ErrorKind;

    #[test]
    fn test_check_id_reports_operation() {
        let err = check_id(
            ResourceType::Comment,
            RecordOp::Read,
            &Id::new(ResourceType::User, "u1"),
            &[ResourceType::Comment],
        )
        .unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Comment, RecordOp::Read)
        );
    }

    #[test]
    fn test_comment_content_bounds() {
        assert!(check_comment_content(RecordOp::Update, "ok").is_ok());
        assert!(check_comment_content(RecordOp::Update, "").is_err());
        let long = "x".repeat(COMMENT_MAX_LEN + 1);
        let err = check_comment_content(RecordOp::Create, &long).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Comment, RecordOp::Create)
        );
    }

    #[test]
    fn test_check_fields_reports_operation() {
        let n = Notification::new("", "", Id::new(ResourceType::User, "u1"));
        let err = check_fields(ResourceType::Notification, RecordOp::Create, &n).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Notification, RecordOp::Create)
        );
    }
}
