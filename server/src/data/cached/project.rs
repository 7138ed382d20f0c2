use std::sync::Arc;

use async_trait::async_trait;

use super::{GET_ALL, GET_BY_KEY};
use crate::cache_key;
use crate::data::cache::{BaseCache, Invalidation, Wildcard};
use crate::data::error::RepositoryError;
use crate::data::repository::ProjectRepository;
use crate::data::types::{Id, Project, ProjectPatch, ResourceType};

const R: ResourceType = ResourceType::Project;

pub struct CachedProjectRepository {
    inner: Arc<dyn ProjectRepository>,
    cache: Arc<BaseCache>,
}

impl CachedProjectRepository {
    pub fn new(inner: Arc<dyn ProjectRepository>, cache: Arc<BaseCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl ProjectRepository for CachedProjectRepository {
    async fn create(&self, namespace: &Id, project: &Project) -> Result<Project, RepositoryError> {
        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_ALL, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Namespace, Wildcard)),
            ])
            .await?;

        self.inner.create(namespace, project).await
    }

    async fn get(&self, id: &Id) -> Result<Project, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, id), || self.inner.get(id))
            .await
    }

    async fn get_by_key(&self, key: &str) -> Result<Project, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, GET_BY_KEY, key), || self.inner.get_by_key(key))
            .await
    }

    async fn get_all(
        &self,
        namespace: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Project>, RepositoryError> {
        let key = cache_key!(R, GET_ALL, namespace, offset, limit);
        self.cache
            .read_through(&key, || self.inner.get_all(namespace, offset, limit))
            .await
    }

    async fn update(&self, id: &Id, patch: &ProjectPatch) -> Result<Project, RepositoryError> {
        let updated = self.inner.update(id, patch).await?;

        self.cache.set(&cache_key!(R, id), &updated).await?;
        // by-key reads hold the full project, so the key lookup goes too
        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_BY_KEY, id, Wildcard)),
                Invalidation::Pattern(cache_key!(R, GET_ALL, Wildcard)),
                Invalidation::Key(cache_key!(R, GET_BY_KEY, updated.key)),
            ])
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        self.cache.delete(&cache_key!(R, id)).await?;

        self.inner.delete(id).await?;

        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_ALL, Wildcard)),
                Invalidation::Pattern(cache_key!(R, GET_BY_KEY, id, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Namespace, Wildcard)),
                Invalidation::Pattern(cache_key!(R, GET_BY_KEY, Wildcard)),
            ])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::testing::Call;
    use crate::data::cached::testing::Fixture;
    use crate::data::types::ProjectStatus;

    fn namespace() -> Id {
        Id::new(ResourceType::Namespace, "n1")
    }

    fn repo(fx: &Fixture) -> CachedProjectRepository {
        CachedProjectRepository::new(fx.store.clone(), fx.cache.clone())
    }

    #[tokio::test]
    async fn test_create_flushes_lists_and_namespaces() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);

        repo.create(&namespace(), &Project::new(namespace(), "TRL", "Trellis"))
            .await
            .unwrap();
        assert_eq!(
            fx.recorder.invalidations(),
            vec![
                Call::Scan("Project:GetAll:*".to_string()),
                Call::Scan("Namespace:*".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_writes_through_and_flushes_lookups() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let p = repo
            .create(&namespace(), &Project::new(namespace(), "TRL", "Trellis"))
            .await
            .unwrap();
        assert_eq!(repo.get_by_key("TRL").await.unwrap(), p);
        fx.recorder.clear_calls();

        let patch = ProjectPatch {
            status: Some(ProjectStatus::Archived),
            ..Default::default()
        };
        let updated = repo.update(&p.id, &patch).await.unwrap();

        let id = p.id.value();
        assert_eq!(
            fx.recorder.calls(),
            vec![
                Call::Set(format!("Project:{id}")),
                Call::Scan(format!("Project:GetByKey:{id}:*")),
                Call::Scan("Project:GetAll:*".to_string()),
                Call::Delete("Project:GetByKey:TRL".to_string()),
            ]
        );

        fx.recorder.clear_calls();
        assert_eq!(repo.get(&p.id).await.unwrap(), updated);
        assert_eq!(repo.get_by_key("TRL").await.unwrap().status, ProjectStatus::Archived);
        assert_eq!(fx.recorder.sets(), vec!["Project:GetByKey:TRL"]);
    }

    #[tokio::test]
    async fn test_delete_clears_every_lookup() {
        let fx = Fixture::new().await;
        let repo = repo(&fx);
        let p = repo
            .create(&namespace(), &Project::new(namespace(), "TRL", "Trellis"))
            .await
            .unwrap();
        repo.get_by_key("TRL").await.unwrap();
        assert_eq!(repo.get_all(&namespace(), 0, 10).await.unwrap().len(), 1);
        fx.recorder.clear_calls();

        repo.delete(&p.id).await.unwrap();

        let deleted: Vec<String> = fx
            .recorder
            .invalidations()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(key) => Some(key),
                _ => None,
            })
            .collect();
        assert!(deleted.contains(&"Project:GetAll:n1:0:10".to_string()));
        assert!(deleted.contains(&"Project:GetByKey:TRL".to_string()));
        assert!(repo.get_by_key("TRL").await.unwrap_err().is_not_found());
    }
}
