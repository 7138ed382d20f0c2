//! Cache-aside repositories
//!
//! Each type wraps an inner repository and a shared [`BaseCache`] and
//! implements the same trait:
//! - Reads look the key up first and populate it on a miss
//! - Writes run their invalidation steps around the inner call
//!
//! Steps marked "before" run ahead of the inner write and abort it on
//! failure. Steps marked "after" only run once the inner write succeeded.
//! Either way the first failing step ends the operation.
//!
//! [`BaseCache`]: crate::data::cache::BaseCache

mod assignment;
mod comment;
mod namespace;
mod permission;
mod project;
mod role;

pub use assignment::CachedAssignmentRepository;
pub use comment::CachedCommentRepository;
pub use namespace::CachedNamespaceRepository;
pub use permission::CachedPermissionRepository;
pub use project::CachedProjectRepository;
pub use role::CachedRoleRepository;

// Operation names used as the second key part of non-identity lookups
pub const GET_ALL: &str = "GetAll";
pub const GET_ALL_BELONGS_TO: &str = "GetAllBelongsTo";
pub const GET_BY_KEY: &str = "GetByKey";
pub const GET_BY_RESOURCE: &str = "GetByResource";
pub const GET_BY_SUBJECT: &str = "GetBySubject";
pub const GET_BY_SUBJECT_AND_TARGET: &str = "GetBySubjectAndTarget";
pub const GET_BY_TARGET: &str = "GetByTarget";
pub const GET_BY_USER: &str = "GetByUser";

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::data::cache::testing::{RecordingCache, base_cache};
    use crate::data::cache::{BaseCache, ReadPolicy};
    use crate::data::sqlite::SqliteService;

    /// Real SQLite store plus a recording cache over moka
    pub struct Fixture {
        pub store: Arc<SqliteService>,
        pub recorder: Arc<RecordingCache>,
        pub cache: Arc<BaseCache>,
    }

    impl Fixture {
        pub async fn new() -> Self {
            Self::with_policy(ReadPolicy::Strict).await
        }

        pub async fn with_policy(policy: ReadPolicy) -> Self {
            let store = Arc::new(SqliteService::in_memory().await.unwrap());
            let recorder = RecordingCache::new();
            let cache = base_cache(recorder.clone(), policy);
            Self {
                store,
                recorder,
                cache,
            }
        }
    }
}
