use std::sync::Arc;

use async_trait::async_trait;

use super::{GET_BY_SUBJECT, GET_BY_SUBJECT_AND_TARGET, GET_BY_TARGET};
use crate::cache_key;
use crate::data::cache::{BaseCache, Invalidation, Wildcard};
use crate::data::error::RepositoryError;
use crate::data::repository::PermissionRepository;
use crate::data::types::{Id, Permission, PermissionKind, ResourceType};

const R: ResourceType = ResourceType::Permission;

/// Every permission write flushes cached roles, users and permissions
fn write_invalidations() -> [Invalidation; 3] {
    [
        Invalidation::Pattern(cache_key!(ResourceType::Role, Wildcard)),
        Invalidation::Pattern(cache_key!(ResourceType::User, Wildcard)),
        Invalidation::Pattern(cache_key!(R, Wildcard)),
    ]
}

pub struct CachedPermissionRepository {
    inner: Arc<dyn PermissionRepository>,
    cache: Arc<BaseCache>,
}

impl CachedPermissionRepository {
    pub fn new(inner: Arc<dyn PermissionRepository>, cache: Arc<BaseCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl PermissionRepository for CachedPermissionRepository {
    async fn create(&self, permission: &Permission) -> Result<Permission, RepositoryError> {
        self.cache.invalidate(&write_invalidations()).await?;
        self.inner.create(permission).await
    }

    async fn get(&self, id: &Id) -> Result<Permission, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, id), || self.inner.get(id))
            .await
    }

    async fn get_by_subject(&self, subject: &Id) -> Result<Vec<Permission>, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, GET_BY_SUBJECT, subject), || {
                self.inner.get_by_subject(subject)
            })
            .await
    }

    async fn get_by_target(&self, target: &Id) -> Result<Vec<Permission>, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, GET_BY_TARGET, target), || {
                self.inner.get_by_target(target)
            })
            .await
    }

    async fn get_by_subject_and_target(
        &self,
        subject: &Id,
        target: &Id,
    ) -> Result<Vec<Permission>, RepositoryError> {
        let key = cache_key!(R, GET_BY_SUBJECT_AND_TARGET, subject, target);
        self.cache
            .read_through(&key, || self.inner.get_by_subject_and_target(subject, target))
            .await
    }

    async fn has_permission(
        &self,
        subject: &Id,
        target: &Id,
        kind: PermissionKind,
    ) -> Result<bool, RepositoryError> {
        self.inner.has_permission(subject, target, kind).await
    }

    async fn has_any_relation(&self, subject: &Id, target: &Id) -> Result<bool, RepositoryError> {
        self.inner.has_any_relation(subject, target).await
    }

    async fn update(&self, id: &Id, kind: PermissionKind) -> Result<Permission, RepositoryError> {
        self.cache.invalidate(&write_invalidations()).await?;
        self.inner.update(id, kind).await
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        self.cache.invalidate(&write_invalidations()).await?;
        self.inner.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::data::cache::testing::Call;
    use crate::data::cached::testing::Fixture;
    use crate::data::error::ErrorKind;

    fn role() -> Id {
        Id::new(ResourceType::Role, "r1")
    }

    fn project() -> Id {
        Id::new(ResourceType::Project, "p1")
    }

    #[tokio::test]
    async fn test_writes_flush_before_inner_call() {
        let fx = Fixture::new().await;
        let repo = CachedPermissionRepository::new(fx.store.clone(), fx.cache.clone());

        let p = repo
            .create(&Permission::new(PermissionKind::Read, role(), project()))
            .await
            .unwrap();
        assert_eq!(
            fx.recorder.invalidations(),
            vec![
                Call::Scan("Role:*".to_string()),
                Call::Scan("User:*".to_string()),
                Call::Scan("Permission:*".to_string()),
            ]
        );

        assert_eq!(repo.get_by_subject(&role()).await.unwrap(), vec![p.clone()]);
        let updated = repo.update(&p.id, PermissionKind::Write).await.unwrap();
        assert_eq!(repo.get_by_subject(&role()).await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn test_scan_failure_blocks_write() {
        let fx = Fixture::new().await;
        let repo = CachedPermissionRepository::new(fx.store.clone(), fx.cache.clone());
        fx.recorder.fail_scan.store(true, Ordering::SeqCst);

        let p = Permission::new(PermissionKind::Read, role(), project());
        let err = repo.create(&p).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheDelete);

        fx.recorder.fail_scan.store(false, Ordering::SeqCst);
        assert!(repo.get_by_target(&project()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checks_bypass_cache() {
        let fx = Fixture::new().await;
        let repo = CachedPermissionRepository::new(fx.store.clone(), fx.cache.clone());
        repo.create(&Permission::new(PermissionKind::All, role(), project()))
            .await
            .unwrap();
        fx.recorder.clear_calls();

        assert!(
            repo.has_permission(&role(), &project(), PermissionKind::Delete)
                .await
                .unwrap()
        );
        assert!(repo.has_any_relation(&role(), &project()).await.unwrap());
        assert_eq!(
            repo.get_by_subject_and_target(&role(), &project())
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            fx.recorder.gets(),
            vec!["Permission:GetBySubjectAndTarget:r1:p1"]
        );
    }
}
