//! Repository trait implementations for SQLite
//!
//! Each method checks its inputs, calls the matching function in
//! [`super::repositories`] and maps the outcome: a missing row becomes
//! [`RepositoryError::NotFound`], anything else is reported against the
//! resource and operation that failed.

use async_trait::async_trait;

use crate::data::error::{RecordOp, RepositoryError};
use crate::data::repository::{
    AssignmentRepository, CommentRepository, NamespaceRepository, NotificationRepository,
    PermissionRepository, ProjectRepository, RoleRepository, check_comment_content, check_fields,
    check_id,
};
use crate::data::types::{
    ATTACHABLE_TYPES, Assignment, Comment, Id, Namespace, NamespacePatch, Notification,
    Permission, PermissionKind, Project, ProjectPatch, ROLE_OWNER_TYPES, ResourceType, Role,
    RolePatch, unix_now,
};

use super::SqliteService;
use super::error::SqliteError;
use super::repositories::{assignment, comment, namespace, notification, permission, project, role};

fn record(resource: ResourceType, op: RecordOp) -> impl FnOnce(SqliteError) -> RepositoryError {
    move |e| RepositoryError::record(resource, op, e)
}

fn found<T>(row: Option<T>) -> Result<T, RepositoryError> {
    row.ok_or(RepositoryError::NotFound)
}

fn affected(deleted: bool) -> Result<(), RepositoryError> {
    if deleted {
        Ok(())
    } else {
        Err(RepositoryError::NotFound)
    }
}

// ==================== Assignments ====================

#[async_trait]
impl AssignmentRepository for SqliteService {
    async fn create(&self, assignment: &Assignment) -> Result<Assignment, RepositoryError> {
        const R: ResourceType = ResourceType::Assignment;
        check_fields(R, RecordOp::Create, assignment)?;
        assignment::create_assignment(self.pool(), assignment)
            .await
            .map_err(record(R, RecordOp::Create))?;
        Ok(assignment.clone())
    }

    async fn get(&self, id: &Id) -> Result<Assignment, RepositoryError> {
        const R: ResourceType = ResourceType::Assignment;
        check_id(R, RecordOp::Read, id, &[R])?;
        found(
            assignment::get_assignment(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Read))?,
        )
    }

    async fn get_by_user(
        &self,
        user: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        const R: ResourceType = ResourceType::Assignment;
        check_id(R, RecordOp::Read, user, &[ResourceType::User])?;
        assignment::list_by_user(self.pool(), user, offset, limit)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn get_by_resource(
        &self,
        resource: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        const R: ResourceType = ResourceType::Assignment;
        check_id(R, RecordOp::Read, resource, ATTACHABLE_TYPES)?;
        assignment::list_by_resource(self.pool(), resource, offset, limit)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Assignment;
        check_id(R, RecordOp::Delete, id, &[R])?;
        affected(
            assignment::delete_assignment(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Delete))?,
        )
    }
}

// ==================== Comments ====================

#[async_trait]
impl CommentRepository for SqliteService {
    async fn create(&self, parent: &Id, comment: &Comment) -> Result<Comment, RepositoryError> {
        const R: ResourceType = ResourceType::Comment;
        check_id(R, RecordOp::Create, parent, ATTACHABLE_TYPES)?;
        let comment = Comment {
            belongs_to: parent.clone(),
            ..comment.clone()
        };
        check_fields(R, RecordOp::Create, &comment)?;
        comment::create_comment(self.pool(), &comment)
            .await
            .map_err(record(R, RecordOp::Create))?;
        Ok(comment)
    }

    async fn get(&self, id: &Id) -> Result<Comment, RepositoryError> {
        const R: ResourceType = ResourceType::Comment;
        check_id(R, RecordOp::Read, id, &[R])?;
        found(
            comment::get_comment(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Read))?,
        )
    }

    async fn get_all_belongs_to(
        &self,
        parent: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Comment>, RepositoryError> {
        const R: ResourceType = ResourceType::Comment;
        check_id(R, RecordOp::Read, parent, ATTACHABLE_TYPES)?;
        comment::list_by_parent(self.pool(), parent, offset, limit)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn update(&self, id: &Id, content: &str) -> Result<Comment, RepositoryError> {
        const R: ResourceType = ResourceType::Comment;
        check_id(R, RecordOp::Update, id, &[R])?;
        check_comment_content(RecordOp::Update, content)?;
        found(
            comment::update_content(self.pool(), id, content, unix_now())
                .await
                .map_err(record(R, RecordOp::Update))?,
        )
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Comment;
        check_id(R, RecordOp::Delete, id, &[R])?;
        affected(
            comment::delete_comment(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Delete))?,
        )
    }
}

// ==================== Namespaces ====================

#[async_trait]
impl NamespaceRepository for SqliteService {
    async fn create(
        &self,
        organization: &Id,
        namespace: &Namespace,
    ) -> Result<Namespace, RepositoryError> {
        const R: ResourceType = ResourceType::Namespace;
        check_id(R, RecordOp::Create, organization, &[ResourceType::Organization])?;
        let namespace = Namespace {
            organization: organization.clone(),
            projects: Vec::new(),
            ..namespace.clone()
        };
        check_fields(R, RecordOp::Create, &namespace)?;
        namespace::create_namespace(self.pool(), &namespace)
            .await
            .map_err(record(R, RecordOp::Create))?;
        Ok(namespace)
    }

    async fn get(&self, id: &Id) -> Result<Namespace, RepositoryError> {
        const R: ResourceType = ResourceType::Namespace;
        check_id(R, RecordOp::Read, id, &[R])?;
        found(
            namespace::get_namespace(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Read))?,
        )
    }

    async fn get_all(
        &self,
        organization: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Namespace>, RepositoryError> {
        const R: ResourceType = ResourceType::Namespace;
        check_id(R, RecordOp::Read, organization, &[ResourceType::Organization])?;
        namespace::list_by_organization(self.pool(), organization, offset, limit)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn update(&self, id: &Id, patch: &NamespacePatch) -> Result<Namespace, RepositoryError> {
        const R: ResourceType = ResourceType::Namespace;
        check_id(R, RecordOp::Update, id, &[R])?;
        check_fields(R, RecordOp::Update, patch)?;
        found(
            namespace::update_namespace(self.pool(), id, patch, unix_now())
                .await
                .map_err(record(R, RecordOp::Update))?,
        )
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Namespace;
        check_id(R, RecordOp::Delete, id, &[R])?;
        affected(
            namespace::delete_namespace(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Delete))?,
        )
    }
}

// ==================== Notifications ====================

#[async_trait]
impl NotificationRepository for SqliteService {
    async fn create(&self, notification: &Notification) -> Result<Notification, RepositoryError> {
        const R: ResourceType = ResourceType::Notification;
        check_fields(R, RecordOp::Create, notification)?;
        notification::create_notification(self.pool(), notification)
            .await
            .map_err(record(R, RecordOp::Create))?;
        Ok(notification.clone())
    }

    async fn get(&self, id: &Id, recipient: &Id) -> Result<Notification, RepositoryError> {
        const R: ResourceType = ResourceType::Notification;
        check_id(R, RecordOp::Read, id, &[R])?;
        check_id(R, RecordOp::Read, recipient, &[ResourceType::User])?;
        found(
            notification::get_notification(self.pool(), id, recipient)
                .await
                .map_err(record(R, RecordOp::Read))?,
        )
    }

    async fn get_all_by_recipient(
        &self,
        recipient: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Notification>, RepositoryError> {
        const R: ResourceType = ResourceType::Notification;
        check_id(R, RecordOp::Read, recipient, &[ResourceType::User])?;
        notification::list_by_recipient(self.pool(), recipient, offset, limit)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn update(
        &self,
        id: &Id,
        recipient: &Id,
        read: bool,
    ) -> Result<Notification, RepositoryError> {
        const R: ResourceType = ResourceType::Notification;
        check_id(R, RecordOp::Update, id, &[R])?;
        check_id(R, RecordOp::Update, recipient, &[ResourceType::User])?;
        found(
            notification::set_read(self.pool(), id, recipient, read)
                .await
                .map_err(record(R, RecordOp::Update))?,
        )
    }

    async fn delete(&self, id: &Id, recipient: &Id) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Notification;
        check_id(R, RecordOp::Delete, id, &[R])?;
        check_id(R, RecordOp::Delete, recipient, &[ResourceType::User])?;
        affected(
            notification::delete_notification(self.pool(), id, recipient)
                .await
                .map_err(record(R, RecordOp::Delete))?,
        )
    }
}

// ==================== Permissions ====================

#[async_trait]
impl PermissionRepository for SqliteService {
    async fn create(&self, permission: &Permission) -> Result<Permission, RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_fields(R, RecordOp::Create, permission)?;
        permission::create_permission(self.pool(), permission)
            .await
            .map_err(record(R, RecordOp::Create))?;
        Ok(permission.clone())
    }

    async fn get(&self, id: &Id) -> Result<Permission, RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_id(R, RecordOp::Read, id, &[R])?;
        found(
            permission::get_permission(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Read))?,
        )
    }

    async fn get_by_subject(&self, subject: &Id) -> Result<Vec<Permission>, RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_id(R, RecordOp::Read, subject, &ResourceType::ALL)?;
        permission::list_by_subject(self.pool(), subject)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn get_by_target(&self, target: &Id) -> Result<Vec<Permission>, RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_id(R, RecordOp::Read, target, &ResourceType::ALL)?;
        permission::list_by_target(self.pool(), target)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn get_by_subject_and_target(
        &self,
        subject: &Id,
        target: &Id,
    ) -> Result<Vec<Permission>, RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_id(R, RecordOp::Read, subject, &ResourceType::ALL)?;
        check_id(R, RecordOp::Read, target, &ResourceType::ALL)?;
        permission::list_by_subject_and_target(self.pool(), subject, target)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn has_permission(
        &self,
        subject: &Id,
        target: &Id,
        kind: PermissionKind,
    ) -> Result<bool, RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_id(R, RecordOp::Read, subject, &ResourceType::ALL)?;
        check_id(R, RecordOp::Read, target, &ResourceType::ALL)?;
        permission::has_permission(self.pool(), subject, target, kind)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn has_any_relation(&self, subject: &Id, target: &Id) -> Result<bool, RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_id(R, RecordOp::Read, subject, &ResourceType::ALL)?;
        check_id(R, RecordOp::Read, target, &ResourceType::ALL)?;
        permission::has_any_relation(self.pool(), subject, target)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn update(&self, id: &Id, kind: PermissionKind) -> Result<Permission, RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_id(R, RecordOp::Update, id, &[R])?;
        found(
            permission::update_kind(self.pool(), id, kind, unix_now())
                .await
                .map_err(record(R, RecordOp::Update))?,
        )
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Permission;
        check_id(R, RecordOp::Delete, id, &[R])?;
        affected(
            permission::delete_permission(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Delete))?,
        )
    }
}

// ==================== Projects ====================

#[async_trait]
impl ProjectRepository for SqliteService {
    async fn create(&self, namespace: &Id, project: &Project) -> Result<Project, RepositoryError> {
        const R: ResourceType = ResourceType::Project;
        check_id(R, RecordOp::Create, namespace, &[ResourceType::Namespace])?;
        let project = Project {
            namespace: namespace.clone(),
            teams: Vec::new(),
            ..project.clone()
        };
        check_fields(R, RecordOp::Create, &project)?;
        project::create_project(self.pool(), &project)
            .await
            .map_err(record(R, RecordOp::Create))?;
        Ok(project)
    }

    async fn get(&self, id: &Id) -> Result<Project, RepositoryError> {
        const R: ResourceType = ResourceType::Project;
        check_id(R, RecordOp::Read, id, &[R])?;
        found(
            project::get_project(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Read))?,
        )
    }

    async fn get_by_key(&self, key: &str) -> Result<Project, RepositoryError> {
        const R: ResourceType = ResourceType::Project;
        found(
            project::get_project_by_key(self.pool(), key)
                .await
                .map_err(record(R, RecordOp::Read))?,
        )
    }

    async fn get_all(
        &self,
        namespace: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Project>, RepositoryError> {
        const R: ResourceType = ResourceType::Project;
        check_id(R, RecordOp::Read, namespace, &[ResourceType::Namespace])?;
        project::list_by_namespace(self.pool(), namespace, offset, limit)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn update(&self, id: &Id, patch: &ProjectPatch) -> Result<Project, RepositoryError> {
        const R: ResourceType = ResourceType::Project;
        check_id(R, RecordOp::Update, id, &[R])?;
        check_fields(R, RecordOp::Update, patch)?;
        found(
            project::update_project(self.pool(), id, patch, unix_now())
                .await
                .map_err(record(R, RecordOp::Update))?,
        )
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Project;
        check_id(R, RecordOp::Delete, id, &[R])?;
        affected(
            project::delete_project(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Delete))?,
        )
    }
}

// ==================== Roles ====================

#[async_trait]
impl RoleRepository for SqliteService {
    async fn create(
        &self,
        created_by: &Id,
        belongs_to: &Id,
        role: &Role,
    ) -> Result<Role, RepositoryError> {
        const R: ResourceType = ResourceType::Role;
        check_id(R, RecordOp::Create, created_by, &[ResourceType::User])?;
        check_id(R, RecordOp::Create, belongs_to, ROLE_OWNER_TYPES)?;
        let role = Role {
            belongs_to: belongs_to.clone(),
            members: vec![created_by.clone()],
            permissions: Vec::new(),
            ..role.clone()
        };
        check_fields(R, RecordOp::Create, &role)?;
        role::create_role(self.pool(), &role, created_by)
            .await
            .map_err(record(R, RecordOp::Create))?;
        Ok(role)
    }

    async fn get(&self, id: &Id) -> Result<Role, RepositoryError> {
        const R: ResourceType = ResourceType::Role;
        check_id(R, RecordOp::Read, id, &[R])?;
        found(
            role::get_role(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Read))?,
        )
    }

    async fn get_all_belongs_to(
        &self,
        belongs_to: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Role>, RepositoryError> {
        const R: ResourceType = ResourceType::Role;
        check_id(R, RecordOp::Read, belongs_to, ROLE_OWNER_TYPES)?;
        role::list_by_owner(self.pool(), belongs_to, offset, limit)
            .await
            .map_err(record(R, RecordOp::Read))
    }

    async fn update(&self, id: &Id, patch: &RolePatch) -> Result<Role, RepositoryError> {
        const R: ResourceType = ResourceType::Role;
        check_id(R, RecordOp::Update, id, &[R])?;
        check_fields(R, RecordOp::Update, patch)?;
        found(
            role::update_role(self.pool(), id, patch, unix_now())
                .await
                .map_err(record(R, RecordOp::Update))?,
        )
    }

    async fn add_member(
        &self,
        role: &Id,
        member: &Id,
        belongs_to: &Id,
    ) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Role;
        check_id(R, RecordOp::Update, role, &[R])?;
        check_id(R, RecordOp::Update, member, &[ResourceType::User])?;
        check_id(R, RecordOp::Update, belongs_to, ROLE_OWNER_TYPES)?;
        affected(
            role::add_member(self.pool(), role, member, belongs_to, unix_now())
                .await
                .map_err(record(R, RecordOp::Update))?,
        )
    }

    async fn remove_member(
        &self,
        role: &Id,
        member: &Id,
        belongs_to: &Id,
    ) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Role;
        check_id(R, RecordOp::Update, role, &[R])?;
        check_id(R, RecordOp::Update, member, &[ResourceType::User])?;
        check_id(R, RecordOp::Update, belongs_to, ROLE_OWNER_TYPES)?;
        affected(
            role::remove_member(self.pool(), role, member, belongs_to)
                .await
                .map_err(record(R, RecordOp::Update))?,
        )
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        const R: ResourceType = ResourceType::Role;
        check_id(R, RecordOp::Delete, id, &[R])?;
        affected(
            role::delete_role(self.pool(), id)
                .await
                .map_err(record(R, RecordOp::Delete))?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::error::ErrorKind;
    use crate::data::types::AssignmentKind;

    async fn service() -> SqliteService {
        SqliteService::in_memory().await.unwrap()
    }

    fn user(v: &str) -> Id {
        Id::new(ResourceType::User, v)
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let svc = service().await;
        let id = Id::new(ResourceType::Assignment, "missing");
        let err = AssignmentRepository::get(&svc, &id).await.unwrap_err();
        assert!(err.is_not_found());
        let err = AssignmentRepository::delete(&svc, &id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_wrong_identifier_type_is_rejected() {
        let svc = service().await;
        let err = CommentRepository::get(&svc, &user("u1")).await.unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Comment, RecordOp::Read)
        );
    }

    #[tokio::test]
    async fn test_invalid_entity_is_rejected_before_insert() {
        let svc = service().await;
        let a = Assignment::new(
            AssignmentKind::Assignee,
            user("u1"),
            Id::new(ResourceType::Project, "p1"),
        );
        let err = AssignmentRepository::create(&svc, &a).await.unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Assignment, RecordOp::Create)
        );
        assert!(
            AssignmentRepository::get_by_user(&svc, &user("u1"), 0, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_comment_parent_overrides_belongs_to() {
        let svc = service().await;
        let parent = Id::new(ResourceType::Issue, "i1");
        let draft = Comment::new("hello", user("u1"), Id::new(ResourceType::Document, "d1"));

        let stored = CommentRepository::create(&svc, &parent, &draft).await.unwrap();
        assert_eq!(stored.belongs_to, parent);

        let err = CommentRepository::update(&svc, &stored.id, "").await.unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Comment, RecordOp::Update)
        );
        let updated = CommentRepository::update(&svc, &stored.id, "edited").await.unwrap();
        assert_eq!(updated.content, "edited");
    }

    #[tokio::test]
    async fn test_duplicate_project_key_fails_create() {
        let svc = service().await;
        let ns = Id::new(ResourceType::Namespace, "n1");
        ProjectRepository::create(&svc, &ns, &Project::new(ns.clone(), "CORE", "Core"))
            .await
            .unwrap();
        let err = ProjectRepository::create(&svc, &ns, &Project::new(ns.clone(), "CORE", "Dup"))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Project, RecordOp::Create)
        );
        assert_eq!(
            ProjectRepository::get_by_key(&svc, "CORE").await.unwrap().name,
            "Core"
        );
    }

    #[tokio::test]
    async fn test_role_membership_lifecycle() {
        let svc = service().await;
        let org = Id::new(ResourceType::Organization, "o1");
        let role = RoleRepository::create(&svc, &user("u1"), &org, &Role::new("Admins", "", org.clone()))
            .await
            .unwrap();
        assert_eq!(role.members, vec![user("u1")]);

        RoleRepository::add_member(&svc, &role.id, &user("u2"), &org)
            .await
            .unwrap();
        let other = Id::new(ResourceType::Organization, "o2");
        let err = RoleRepository::add_member(&svc, &role.id, &user("u3"), &other)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        RoleRepository::remove_member(&svc, &role.id, &user("u2"), &org)
            .await
            .unwrap();
        let err = RoleRepository::remove_member(&svc, &role.id, &user("u2"), &org)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_notification_read_flag() {
        let svc = service().await;
        let n = NotificationRepository::create(&svc, &Notification::new("hi", "", user("u1")))
            .await
            .unwrap();
        let updated = NotificationRepository::update(&svc, &n.id, &user("u1"), true)
            .await
            .unwrap();
        assert!(updated.read);

        let err = NotificationRepository::get(&svc, &n.id, &user("u2"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    async fn notify(svc: &SqliteService, title: &str, recipient: &str, at: i64) -> Notification {
        let mut n = Notification::new(title, "", user(recipient));
        n.created_at = at;
        NotificationRepository::create(svc, &n).await.unwrap()
    }

    #[tokio::test]
    async fn test_notifications_listed_newest_first() {
        let svc = service().await;
        let oldest = notify(&svc, "one", "u1", 100).await;
        let middle = notify(&svc, "two", "u1", 200).await;
        let newest = notify(&svc, "three", "u1", 300).await;
        notify(&svc, "other", "u2", 400).await;

        let all = NotificationRepository::get_all_by_recipient(&svc, &user("u1"), 0, 10)
            .await
            .unwrap();
        let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["three", "two", "one"]);

        let page = NotificationRepository::get_all_by_recipient(&svc, &user("u1"), 1, 1)
            .await
            .unwrap();
        assert_eq!(page, vec![middle]);

        let tail = NotificationRepository::get_all_by_recipient(&svc, &user("u1"), 2, 10)
            .await
            .unwrap();
        assert_eq!(tail, vec![oldest]);

        let first = NotificationRepository::get_all_by_recipient(&svc, &user("u1"), 0, 1)
            .await
            .unwrap();
        assert_eq!(first, vec![newest]);
    }

    #[tokio::test]
    async fn test_notifications_zero_limit_and_past_end() {
        let svc = service().await;
        notify(&svc, "one", "u1", 100).await;

        assert!(
            NotificationRepository::get_all_by_recipient(&svc, &user("u1"), 0, 0)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            NotificationRepository::get_all_by_recipient(&svc, &user("u1"), 5, 10)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            NotificationRepository::get_all_by_recipient(&svc, &user("nobody"), 0, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_notification_empty_title_rejected() {
        let svc = service().await;
        let err = NotificationRepository::create(&svc, &Notification::new("", "", user("u1")))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Notification, RecordOp::Create)
        );
        assert!(
            NotificationRepository::get_all_by_recipient(&svc, &user("u1"), 0, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_notification_recipient_must_be_user() {
        let svc = service().await;
        let project = Id::new(ResourceType::Project, "p1");

        let err = NotificationRepository::create(&svc, &Notification::new("hi", "", project.clone()))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Notification, RecordOp::Create)
        );

        let err = NotificationRepository::get_all_by_recipient(&svc, &project, 0, 10)
            .await
            .unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::Record(ResourceType::Notification, RecordOp::Read)
        );
    }

    #[tokio::test]
    async fn test_notification_update_and_delete_missing() {
        let svc = service().await;
        let missing = Id::new(ResourceType::Notification, "missing");

        let err = NotificationRepository::update(&svc, &missing, &user("u1"), true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = NotificationRepository::delete(&svc, &missing, &user("u1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_notification_delete_scoped_to_recipient() {
        let svc = service().await;
        let n = notify(&svc, "hi", "u1", 100).await;

        let err = NotificationRepository::delete(&svc, &n.id, &user("u2"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        NotificationRepository::delete(&svc, &n.id, &user("u1"))
            .await
            .unwrap();
        let err = NotificationRepository::delete(&svc, &n.id, &user("u1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_has_permission_through_trait() {
        let svc = service().await;
        let role = Id::new(ResourceType::Role, "r1");
        let target = Id::new(ResourceType::Project, "p1");
        PermissionRepository::create(
            &svc,
            &Permission::new(PermissionKind::All, role.clone(), target.clone()),
        )
        .await
        .unwrap();

        assert!(
            PermissionRepository::has_permission(&svc, &role, &target, PermissionKind::Write)
                .await
                .unwrap()
        );
        assert!(
            !PermissionRepository::has_any_relation(&svc, &role, &user("u1"))
                .await
                .unwrap()
        );
    }
}
