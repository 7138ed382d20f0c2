use std::sync::Arc;

use async_trait::async_trait;

use super::GET_ALL_BELONGS_TO;
use crate::cache_key;
use crate::data::cache::{BaseCache, Invalidation, Wildcard};
use crate::data::error::RepositoryError;
use crate::data::repository::CommentRepository;
use crate::data::types::{Comment, Id, ResourceType};

const R: ResourceType = ResourceType::Comment;

pub struct CachedCommentRepository {
    inner: Arc<dyn CommentRepository>,
    cache: Arc<BaseCache>,
}

impl CachedCommentRepository {
    pub fn new(inner: Arc<dyn CommentRepository>, cache: Arc<BaseCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl CommentRepository for CachedCommentRepository {
    async fn create(&self, parent: &Id, comment: &Comment) -> Result<Comment, RepositoryError> {
        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_ALL_BELONGS_TO, parent, Wildcard)),
                Invalidation::Pattern(cache_key!(parent.kind(), Wildcard)),
            ])
            .await?;

        self.inner.create(parent, comment).await
    }

    async fn get(&self, id: &Id) -> Result<Comment, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, id), || self.inner.get(id))
            .await
    }

    async fn get_all_belongs_to(
        &self,
        parent: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let key = cache_key!(R, GET_ALL_BELONGS_TO, parent, offset, limit);
        self.cache
            .read_through(&key, || self.inner.get_all_belongs_to(parent, offset, limit))
            .await
    }

    async fn update(&self, id: &Id, content: &str) -> Result<Comment, RepositoryError> {
        let updated = self.inner.update(id, content).await?;

        self.cache.set(&cache_key!(R, id), &updated).await?;
        self.cache
            .delete_pattern(&cache_key!(R, GET_ALL_BELONGS_TO, Wildcard))
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        self.cache.delete(&cache_key!(R, id)).await?;

        self.inner.delete(id).await?;

        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_ALL_BELONGS_TO, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Document, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Issue, Wildcard)),
            ])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::testing::Call;
    use crate::data::cached::testing::Fixture;
    use crate::data::error::ErrorKind;

    fn repo(fx: &Fixture) -> CachedCommentRepository {
        CachedCommentRepository::new(fx.store.clone(), fx.cache.clone())
    }

    fn draft() -> Comment {
        Comment::new(
            "looks good",
            Id::new(ResourceType::User, "u1"),
            Id::new(ResourceType::Document, "d1"),
        )
    }

    #[tokio::test]
    async fn test_create_flushes_parent_reads() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let parent = Id::new(ResourceType::Issue, "i7");

        let stored = repo.create(&parent, &draft()).await.unwrap();
        assert_eq!(stored.belongs_to, parent);
        assert_eq!(
            fx.recorder.invalidations(),
            vec![
                Call::Scan("Comment:GetAllBelongsTo:i7:*".to_string()),
                Call::Scan("Issue:*".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_writes_through() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let parent = Id::new(ResourceType::Document, "d1");
        let stored = repo.create(&parent, &draft()).await.unwrap();
        repo.get(&stored.id).await.unwrap();
        fx.recorder.clear_calls();

        let updated = repo.update(&stored.id, "ship it").await.unwrap();
        assert_eq!(
            fx.recorder.calls(),
            vec![
                Call::Set(format!("Comment:{}", stored.id.value())),
                Call::Scan("Comment:GetAllBelongsTo:*".to_string()),
            ]
        );

        fx.recorder.clear_calls();
        assert_eq!(repo.get(&stored.id).await.unwrap(), updated);
        assert!(fx.recorder.sets().is_empty());

        // applying the same update again leaves the cached copy unchanged
        let again = repo.update(&stored.id, "ship it").await.unwrap();
        assert_eq!(again.content, updated.content);
        assert_eq!(repo.get(&stored.id).await.unwrap().content, "ship it");
    }

    #[tokio::test]
    async fn test_update_not_found_touches_nothing() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let missing = Id::new(ResourceType::Comment, "missing");

        assert!(repo.update(&missing, "x").await.unwrap_err().is_not_found());
        assert!(fx.recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_write_through_failure() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let stored = repo
            .create(&Id::new(ResourceType::Document, "d1"), &draft())
            .await
            .unwrap();
        fx.recorder
            .fail_set
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let err = repo.update(&stored.id, "edited").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheWrite);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let stored = repo
            .create(&Id::new(ResourceType::Document, "d1"), &draft())
            .await
            .unwrap();
        repo.get(&stored.id).await.unwrap();

        repo.delete(&stored.id).await.unwrap();
        assert!(repo.get(&stored.id).await.unwrap_err().is_not_found());
    }
}
