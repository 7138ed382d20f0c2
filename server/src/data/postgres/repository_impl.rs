//! Repository trait implementations for PostgreSQL
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

use super::PostgresService;
use super::error::PostgresError;
use super::repositories::{assignment, comment, namespace, notification, permission, project, role};

fn record(resource: ResourceType, op: RecordOp) -> impl FnOnce(PostgresError) -> RepositoryError {
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
impl AssignmentRepository for PostgresService {
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
impl CommentRepository for PostgresService {
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
impl NamespaceRepository for PostgresService {
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
impl NotificationRepository for PostgresService {
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
impl PermissionRepository for PostgresService {
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
impl ProjectRepository for PostgresService {
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
impl RoleRepository for PostgresService {
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
