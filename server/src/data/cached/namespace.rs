use std::sync::Arc;

use async_trait::async_trait;

use super::GET_ALL;
use crate::cache_key;
use crate::data::cache::{BaseCache, Invalidation, Wildcard};
use crate::data::error::RepositoryError;
use crate::data::repository::NamespaceRepository;
use crate::data::types::{Id, Namespace, NamespacePatch, ResourceType};

const R: ResourceType = ResourceType::Namespace;

pub struct CachedNamespaceRepository {
    inner: Arc<dyn NamespaceRepository>,
    cache: Arc<BaseCache>,
}

impl CachedNamespaceRepository {
    pub fn new(inner: Arc<dyn NamespaceRepository>, cache: Arc<BaseCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl NamespaceRepository for CachedNamespaceRepository {
    async fn create(
        &self,
        organization: &Id,
        namespace: &Namespace,
    ) -> Result<Namespace, RepositoryError> {
        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_ALL, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Organization, Wildcard)),
            ])
            .await?;

        self.inner.create(organization, namespace).await
    }

    async fn get(&self, id: &Id) -> Result<Namespace, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, id), || self.inner.get(id))
            .await
    }

    async fn get_all(
        &self,
        organization: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Namespace>, RepositoryError> {
        let key = cache_key!(R, GET_ALL, organization, offset, limit);
        self.cache
            .read_through(&key, || self.inner.get_all(organization, offset, limit))
            .await
    }

    async fn update(&self, id: &Id, patch: &NamespacePatch) -> Result<Namespace, RepositoryError> {
        let updated = self.inner.update(id, patch).await?;

        self.cache.set(&cache_key!(R, id), &updated).await?;
        self.cache
            .delete_pattern(&cache_key!(R, GET_ALL, Wildcard))
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        self.cache.delete(&cache_key!(R, id)).await?;

        self.inner.delete(id).await?;

        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_ALL, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Organization, Wildcard)),
            ])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::testing::Call;
    use crate::data::cached::testing::Fixture;

    fn org() -> Id {
        Id::new(ResourceType::Organization, "o1")
    }

    #[tokio::test]
    async fn test_list_is_refreshed_after_create() {
        let fx = Fixture::new().await;
        let repo = CachedNamespaceRepository::new(fx.store.clone(), fx.cache.clone());

        assert!(repo.get_all(&org(), 0, 20).await.unwrap().is_empty());
        let ns = repo
            .create(&org(), &Namespace::new(org(), "Platform", ""))
            .await
            .unwrap();

        assert!(
            fx.recorder
                .invalidations()
                .contains(&Call::Delete("Namespace:GetAll:o1:0:20".to_string()))
        );
        assert_eq!(repo.get_all(&org(), 0, 20).await.unwrap(), vec![ns]);
    }

    #[tokio::test]
    async fn test_update_and_delete_ordering() {
        let fx = Fixture::new().await;
        let repo = CachedNamespaceRepository::new(fx.store.clone(), fx.cache.clone());
        let ns = repo
            .create(&org(), &Namespace::new(org(), "Platform", ""))
            .await
            .unwrap();
        let key = format!("Namespace:{}", ns.id.value());
        fx.recorder.clear_calls();

        let patch = NamespacePatch {
            description: Some("shared".to_string()),
            ..Default::default()
        };
        let updated = repo.update(&ns.id, &patch).await.unwrap();
        assert_eq!(updated.description, "shared");
        assert_eq!(
            fx.recorder.calls(),
            vec![
                Call::Set(key.clone()),
                Call::Scan("Namespace:GetAll:*".to_string()),
            ]
        );

        fx.recorder.clear_calls();
        repo.delete(&ns.id).await.unwrap();
        assert_eq!(
            fx.recorder.invalidations(),
            vec![
                Call::Delete(key),
                Call::Scan("Namespace:GetAll:*".to_string()),
                Call::Scan("Organization:*".to_string()),
            ]
        );
        assert!(repo.get(&ns.id).await.unwrap_err().is_not_found());
    }
}
