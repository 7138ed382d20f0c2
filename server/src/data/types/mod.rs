//! Shared data types for every record store and the cache
//!
//! Entities are serialised with MessagePack when cached and mapped to rows
//! by the SQLite and PostgreSQL repositories.

mod entities;
mod enums;
mod id;

pub use entities::{
    ATTACHABLE_TYPES, Assignment, Comment, Namespace, NamespacePatch, Notification, Permission,
    PROJECT_KEY_MAX_LEN, PROJECT_KEY_MIN_LEN, Project, ProjectPatch, ROLE_OWNER_TYPES, Role,
    RolePatch,
};
pub(crate) use entities::unix_now;
pub use enums::{AssignmentKind, ParseEnumError, PermissionKind, ProjectStatus};
pub use id::{ID_SEPARATOR, Id, IdError, ResourceType, ids_from_json, ids_to_json};
