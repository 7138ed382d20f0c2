//! SQLite schema definitions
//!
//! Identifiers are stored in their canonical `Type:value` form and lists of
//! identifiers as JSON arrays. Entity tables carry no foreign keys between
//! each other; only role membership cascades with its role.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL for fresh databases (includes every migration)
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- Assignments
-- =============================================================================
CREATE TABLE IF NOT EXISTS assignments (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK(kind IN ('assignee', 'reviewer')),
    user_id TEXT NOT NULL,
    resource TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assignments_user ON assignments(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_assignments_resource ON assignments(resource, created_at);

-- =============================================================================
-- Comments
-- =============================================================================
CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL CHECK(length(content) >= 1),
    created_by TEXT NOT NULL,
    belongs_to TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_comments_belongs_to ON comments(belongs_to, created_at);

-- =============================================================================
-- Namespaces
-- =============================================================================
CREATE TABLE IF NOT EXISTS namespaces (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    name TEXT NOT NULL CHECK(length(name) >= 1),
    description TEXT NOT NULL DEFAULT '',
    documents TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_namespaces_org ON namespaces(organization_id, created_at);

-- =============================================================================
-- Notifications
-- =============================================================================
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL CHECK(length(title) >= 1),
    description TEXT NOT NULL DEFAULT '',
    recipient TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications(recipient, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_notifications_unread ON notifications(recipient, read);

-- =============================================================================
-- Permissions
-- =============================================================================
CREATE TABLE IF NOT EXISTS permissions (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK(kind IN ('read', 'write', 'create', 'delete', 'all')),
    subject TEXT NOT NULL,
    target TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_permissions_subject ON permissions(subject, target);
CREATE INDEX IF NOT EXISTS idx_permissions_target ON permissions(target);

-- =============================================================================
-- Projects
-- =============================================================================
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    namespace_id TEXT NOT NULL,
    key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL CHECK(length(name) >= 1),
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL CHECK(status IN ('pending', 'active', 'archived')),
    documents TEXT NOT NULL DEFAULT '[]',
    issues TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_projects_namespace ON projects(namespace_id, created_at);

-- =============================================================================
-- Roles and membership
-- =============================================================================
CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK(length(name) >= 1),
    description TEXT NOT NULL DEFAULT '',
    belongs_to TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_roles_belongs_to ON roles(belongs_to, created_at);

CREATE TABLE IF NOT EXISTS role_members (
    role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (role_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_role_members_user ON role_members(user_id);
"#;

/// v2: unread lookups per recipient
pub const MIGRATION_V2: &str =
    "CREATE INDEX IF NOT EXISTS idx_notifications_unread ON notifications(recipient, read)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_schema_is_not_empty() {
        assert!(!SCHEMA.is_empty());
    }

    #[test]
    fn test_schema_contains_required_tables() {
        let required_tables = [
            "schema_version",
            "schema_migrations",
            "assignments",
            "comments",
            "namespaces",
            "notifications",
            "permissions",
            "projects",
            "roles",
            "role_members",
        ];

        for table in required_tables {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)),
                "Schema missing table: {}",
                table
            );
        }
    }

    #[test]
    fn test_schema_includes_latest_migration() {
        assert!(SCHEMA.contains(MIGRATION_V2));
    }
}
