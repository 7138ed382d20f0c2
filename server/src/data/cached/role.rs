use std::sync::Arc;

use async_trait::async_trait;

use super::GET_ALL_BELONGS_TO;
use crate::cache_key;
use crate::data::cache::{BaseCache, Invalidation, Wildcard};
use crate::data::error::RepositoryError;
use crate::data::repository::RoleRepository;
use crate::data::types::{Id, ResourceType, Role, RolePatch};

const R: ResourceType = ResourceType::Role;

pub struct CachedRoleRepository {
    inner: Arc<dyn RoleRepository>,
    cache: Arc<BaseCache>,
}

impl CachedRoleRepository {
    pub fn new(inner: Arc<dyn RoleRepository>, cache: Arc<BaseCache>) -> Self {
        Self { inner, cache }
    }

    /// Steps run after a membership change went through
    fn membership_invalidations(belongs_to: &Id) -> [Invalidation; 2] {
        [
            Invalidation::Pattern(cache_key!(R, GET_ALL_BELONGS_TO, Wildcard)),
            Invalidation::Key(cache_key!(ResourceType::Organization, belongs_to)),
        ]
    }
}

#[async_trait]
impl RoleRepository for CachedRoleRepository {
    async fn create(
        &self,
        created_by: &Id,
        belongs_to: &Id,
        role: &Role,
    ) -> Result<Role, RepositoryError> {
        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_ALL_BELONGS_TO, belongs_to, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Organization, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Project, Wildcard)),
            ])
            .await?;

        self.inner.create(created_by, belongs_to, role).await
    }

    async fn get(&self, id: &Id) -> Result<Role, RepositoryError> {
        self.cache
            .read_through(&cache_key!(R, id), || self.inner.get(id))
            .await
    }

    async fn get_all_belongs_to(
        &self,
        belongs_to: &Id,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Role>, RepositoryError> {
        let key = cache_key!(R, GET_ALL_BELONGS_TO, belongs_to, offset, limit);
        self.cache
            .read_through(&key, || {
                self.inner.get_all_belongs_to(belongs_to, offset, limit)
            })
            .await
    }

    async fn update(&self, id: &Id, patch: &RolePatch) -> Result<Role, RepositoryError> {
        let updated = self.inner.update(id, patch).await?;

        self.cache.set(&cache_key!(R, id), &updated).await?;
        self.cache
            .delete_pattern(&cache_key!(R, GET_ALL_BELONGS_TO, Wildcard))
            .await?;
        Ok(updated)
    }

    async fn add_member(
        &self,
        role: &Id,
        member: &Id,
        belongs_to: &Id,
    ) -> Result<(), RepositoryError> {
        self.cache.delete(&cache_key!(R, role)).await?;

        self.inner.add_member(role, member, belongs_to).await?;

        self.cache
            .invalidate(&Self::membership_invalidations(belongs_to))
            .await
    }

    async fn remove_member(
        &self,
        role: &Id,
        member: &Id,
        belongs_to: &Id,
    ) -> Result<(), RepositoryError> {
        self.cache.delete(&cache_key!(R, role)).await?;

        self.inner.remove_member(role, member, belongs_to).await?;

        self.cache
            .invalidate(&Self::membership_invalidations(belongs_to))
            .await
    }

    async fn delete(&self, id: &Id) -> Result<(), RepositoryError> {
        self.cache.delete(&cache_key!(R, id)).await?;

        self.inner.delete(id).await?;

        self.cache
            .invalidate(&[
                Invalidation::Pattern(cache_key!(R, GET_ALL_BELONGS_TO, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Organization, Wildcard)),
                Invalidation::Pattern(cache_key!(ResourceType::Project, Wildcard)),
            ])
            .await
    }
}
