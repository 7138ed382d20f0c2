use std::sync::Arc;

use async_trait::async_trait;

use super::{GET_BY_RESOURCE, GET_BY_USER};
use crate::cache_key;
use crate::data::cache::{BaseCache, Invalidation, Wildcard};
use crate::data::error::RepositoryError;
use crate::data::repository::AssignmentRepository;
use crate::data::types::{Assignment, Id, ResourceType};

const R: ResourceType = ResourceType::Assignment;

pub struct CachedAssignmentRepository {
    inner: Arc<dyn AssignmentRepository>,
    cache: Arc<BaseCache>,
    cached_resource_types: Vec<ResourceType>,
}

impl CachedAssignmentRepository {
    /// `cached_resource_types` lists the resource types whose cached reads
    /// embed assignments and are flushed when one is created
    pub fn new(
        inner: Arc<dyn AssignmentRepository>,
        cache: Arc<BaseCache>,
        cached_resource_types: Vec<ResourceType>,
    ) -> Self {
        Self {
            inner,
            cache,
            cached_resource_types,
        }
    }
}

#[async_trait]
impl AssignmentRepository for CachedAssignmentRepository {
    async fn create(&self, assignment: &Assignment) -> Result<Assignment, RepositoryError> {
        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_BY_RESOURCE, assignment.resource, Wildcard)),
                Invalidation::Pattern(cache_key!(R, GET_BY_USER, assignment.user, Wildcard)),
            ])
            .await?;

        let resource_type = assignment.resource.kind();
        if !self.cached_resource_types.contains(&resource_type) {
            return Err(RepositoryError::UnexpectedCachedResource(resource_type));
        }
        self.cache
            .delete_pattern(&cache_key!(resource_type, Wildcard))
            .await?;

        self.inner.create(assignment).await
    }

    async fn get(&self, id: &Id) -> Result<Assignment, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, id), || self.inner.get(id))
            .await
    }

    async fn get_by_user(
        &self,
        user: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let key = cache_key!(R, GET_BY_USER, user, offset, limit);
        self.cache
            .read_through(&key, || self.inner.get_by_user(user, offset, limit))
            .await
    }

    async fn get_by_resource(
        &self,
        resource: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let key = cache_key!(R, GET_BY_RESOURCE, resource, offset, limit);
        self.cache
            .read_through(&key, || self.inner.get_by_resource(resource, offset, limit))
            .await
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        self.cache.delete(&cache_key!(R, id)).await?;

        self.inner.delete(id).await?;

        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_BY_RESOURCE, Wildcard)),
                Invalidation::Pattern(cache_key!(R, GET_BY_USER, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Issue, Wildcard)),
            ])
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::data::cache::ReadPolicy;
    use crate::data::cache::testing::Call;
    use crate::data::cached::testing::Fixture;
    use crate::data::error::ErrorKind;
    use crate::data::types::AssignmentKind;

    fn repo(fx: &Fixture) -> CachedAssignmentRepository {
        CachedAssignmentRepository::new(
            fx.store.clone(),
            fx.cache.clone(),
            vec![ResourceType::Issue],
        )
    }

    fn on_issue() -> Assignment {
        Assignment::new(
            AssignmentKind::Assignee,
            Id::new(ResourceType::User, "u1"),
            Id::new(ResourceType::Issue, "i1"),
        )
    }

    #[tokio::test]
    async fn test_get_populates_then_serves_from_cache() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let mut a = on_issue();
        a.id = Id::new(ResourceType::Assignment, "a1");
        AssignmentRepository::create(fx.store.as_ref(), &a).await.unwrap();
        fx.recorder.clear_calls();

        assert_eq!(repo.get(&a.id).await.unwrap(), a);
        assert_eq!(fx.recorder.sets(), vec!["Assignment:a1"]);

        // drop the row so a second hit can only come from the cache
        AssignmentRepository::delete(fx.store.as_ref(), &a.id).await.unwrap();
        assert_eq!(repo.get(&a.id).await.unwrap(), a);
        assert_eq!(fx.recorder.sets().len(), 1);
        assert_eq!(fx.recorder.gets(), vec!["Assignment:a1", "Assignment:a1"]);
    }

    #[tokio::test]
    async fn test_create_flushes_lists_and_resource_reads() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let a = on_issue();

        repo.create(&a).await.unwrap();

        assert_eq!(
            fx.recorder.invalidations(),
            vec![
                Call::Scan("Assignment:GetByResource:i1:*".to_string()),
                Call::Scan("Assignment:GetByUser:u1:*".to_string()),
                Call::Scan("Issue:*".to_string()),
            ]
        );
        assert_eq!(repo.get(&a.id).await.unwrap(), a);
    }

    #[tokio::test]
    async fn test_create_on_uncached_resource_type() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let a = Assignment::new(
            AssignmentKind::Reviewer,
            Id::new(ResourceType::User, "u1"),
            Id::new(ResourceType::Project, "p1"),
        );

        let err = repo.create(&a).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedCachedResource);
        assert_eq!(
            fx.recorder.invalidations(),
            vec![
                Call::Scan("Assignment:GetByResource:p1:*".to_string()),
                Call::Scan("Assignment:GetByUser:u1:*".to_string()),
            ]
        );
        let err = AssignmentRepository::get(fx.store.as_ref(), &a.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cached_entries_are_flushed_on_create() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let user = Id::new(ResourceType::User, "u1");

        assert!(repo.get_by_user(&user, 0, 10).await.unwrap().is_empty());
        let a = on_issue();
        repo.create(&a).await.unwrap();

        assert_eq!(repo.get_by_user(&user, 0, 10).await.unwrap(), vec![a]);
        assert!(
            fx.recorder
                .calls()
                .contains(&Call::Delete("Assignment:GetByUser:u1:0:10".to_string()))
        );
    }

    #[tokio::test]
    async fn test_failed_exact_delete_keeps_record() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let a = on_issue();
        repo.create(&a).await.unwrap();
        fx.recorder.fail_delete_of(&format!("Assignment:{}", a.id.value()));

        let err = repo.delete(&a.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheDelete);
        assert_eq!(
            AssignmentRepository::get(fx.store.as_ref(), &a.id).await.unwrap(),
            a
        );
    }

    #[tokio::test]
    async fn test_delete_flushes_after_record_delete() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let a = on_issue();
        repo.create(&a).await.unwrap();
        fx.recorder.clear_calls();

        repo.delete(&a.id).await.unwrap();

        let invalidations = fx.recorder.invalidations();
        assert_eq!(invalidations[0], Call::Delete(format!("Assignment:{}", a.id.value())));
        assert_eq!(
            invalidations[1..].to_vec(),
            vec![
                Call::Scan("Assignment:GetByResource:*".to_string()),
                Call::Scan("Assignment:GetByUser:*".to_string()),
                Call::Scan("Issue:*".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_skips_patterns() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let missing = Id::new(ResourceType::Assignment, "missing");

        assert!(repo.delete(&missing).await.unwrap_err().is_not_found());
        assert_eq!(
            fx.recorder.invalidations(),
            vec![Call::Delete("Assignment:missing".to_string())]
        );
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let missing = Id::new(ResourceType::Assignment, "missing");

        assert!(repo.get(&missing).await.unwrap_err().is_not_found());
        assert!(fx.recorder.sets().is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_page_is_cached() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let user = Id::new(ResourceType::User, "u1");

        assert!(repo.get_by_user(&user, 0, 0).await.unwrap().is_empty());
        assert!(repo.get_by_user(&user, 0, 0).await.unwrap().is_empty());
        assert_eq!(fx.recorder.sets(), vec!["Assignment:GetByUser:u1:0:0"]);
    }

    #[tokio::test]
    async fn test_cache_read_failure_strict_and_bypass() {
        let fx = Fixture::new().await;
        let strict = repo(&fx);
        let a = on_issue();
        strict.create(&a).await.unwrap();
        fx.recorder.fail_get.store(true, Ordering::SeqCst);

        let err = strict.get(&a.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheRead);

        let bypass_fx = Fixture::with_policy(ReadPolicy::BypassOnCacheError).await;
        let bypass = repo(&bypass_fx);
        bypass.create(&a).await.unwrap();
        bypass_fx
            .recorder
            .fail_get
            .store(true, Ordering::SeqCst);
        assert_eq!(bypass.get(&a.id).await.unwrap(), a);
    }
}
