//! Repository orchestrating the record store and the relationship index.
//!
//! # Responsibility
//! - Expose the domain operations used by boundary collaborators.
//! - Keep the relationship index consistent with the record store.
//!
//! # Invariants
//! - Mutations write the record store first (durability commit point), then
//!   the index. An index failure after a store write is reported so the
//!   caller retries; every mutation is safe to retry.
//! - Every tag named by a stored resource exists as a tag record.
//! - The index is rebuilt from the store on construction and never trusted
//!   across restarts.
//!
//! # Concurrency
//! - Operations take `&self` and may run concurrently from many threads.
//! - Mutations run one at a time behind `write_lock`, so a read-modify-write
//!   of a resource's tag list never loses a concurrent update. Reads never
//!   take it.
//! - Single-entity writes are atomic; there is no cross-entity atomicity.
//!   A concurrent reader may observe a resource's tags created before the
//!   resource itself, or a store write whose index write is still pending.

use super::error::{RepoError, RepoResult};
use crate::index::RelationshipIndex;
use crate::model::color::random_color;
use crate::model::resource::{NewResource, Resource, ResourceParams};
use crate::model::tag::{NewTag, Tag, TagParams};
use crate::store::RecordStore;
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Single entry point over one record store and one relationship index.
pub struct Repository<S, I> {
    store: S,
    index: I,
    write_lock: Mutex<()>,
}

impl<S, I> Repository<S, I>
where
    S: RecordStore,
    I: RelationshipIndex,
{
    /// Takes ownership of both handles and rebuilds the index from the store.
    ///
    /// # Errors
    /// - `RepoError::Rebuild` when any tag or resource cannot be replayed.
    pub fn new(store: S, index: I) -> RepoResult<Self> {
        let repo = Self {
            store,
            index,
            write_lock: Mutex::new(()),
        };
        repo.rebuild_index()
            .map_err(|err| RepoError::Rebuild(Box::new(err)))?;
        Ok(repo)
    }

    fn rebuild_index(&self) -> RepoResult<()> {
        let started_at = Instant::now();
        info!("event=index_rebuild module=repo status=start");

        let result = self.replay_store();
        match &result {
            Ok((tags, resources)) => info!(
                "event=index_rebuild module=repo status=ok tags={} resources={} duration_ms={}",
                tags,
                resources,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=index_rebuild module=repo status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result.map(|_| ())
    }

    fn serialize_writes(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn replay_store(&self) -> RepoResult<(usize, usize)> {
        self.index.reset()?;

        let tags = self.store.get_all_tags()?;
        for tag in &tags {
            self.index.create_tag(tag)?;
        }

        let resources = self.store.get_all_resources()?;
        for resource in &resources {
            self.index.create_resource(resource)?;
        }

        Ok((tags.len(), resources.len()))
    }

    /// Creates a resource, materializing every referenced tag first.
    ///
    /// # Errors
    /// - `Invalid` when `id`, `name`, `type` or a tag name is empty. No write
    ///   happens in that case.
    /// - `Conflict` when a resource with the same id exists; the stored
    ///   record is left untouched but its index edges are re-applied, so a
    ///   retry after an index-stage failure still heals the index.
    pub fn create_resource(&self, resource: &NewResource) -> RepoResult<Resource> {
        resource.validate()?;
        let _guard = self.serialize_writes();

        if let Some(existing) = self.store.get_resource(&resource.id)? {
            self.index.create_resource(&existing).map_err(|err| {
                error!(
                    "event=resource_create module=repo status=error stage=index_repair id={} error={}",
                    existing.id, err
                );
                RepoError::from(err)
            })?;
            warn!(
                "event=resource_create module=repo status=error error_code=conflict id={}",
                resource.id
            );
            return Err(RepoError::Conflict(resource.id.clone()));
        }

        let mut seen = HashSet::new();
        let mut tags = Vec::with_capacity(resource.tags.len());
        for requested in &resource.tags {
            if !seen.insert(requested.name.as_str()) {
                continue;
            }
            tags.push(self.create_tag_serialized(requested)?);
        }

        let created = Resource {
            id: resource.id.clone(),
            name: resource.name.clone(),
            kind: resource.kind.clone(),
            tags,
        };

        self.store.put_resource(&created).map_err(|err| {
            error!(
                "event=resource_create module=repo status=error stage=store id={} error={}",
                created.id, err
            );
            RepoError::from(err)
        })?;
        self.index.create_resource(&created).map_err(|err| {
            error!(
                "event=resource_create module=repo status=error stage=index id={} error={}",
                created.id, err
            );
            RepoError::from(err)
        })?;

        info!(
            "event=resource_create module=repo status=ok id={} tags={}",
            created.id,
            created.tags.len()
        );
        Ok(created)
    }

    /// Direct record store lookup.
    pub fn find_resource_by_id(&self, id: &str) -> RepoResult<Resource> {
        self.store
            .get_resource(id)?
            .ok_or_else(|| RepoError::resource_not_found(id))
    }

    /// Lists resources, filtered when `params` carries at least one filter.
    ///
    /// Without filters this is a plain store scan and never touches the index.
    /// With filters, ids come from the index and are hydrated from the store;
    /// the first id the store no longer has ends the listing early and the
    /// partial result is returned.
    pub fn find_all_resources(
        &self,
        params: Option<&ResourceParams>,
    ) -> RepoResult<Vec<Resource>> {
        let Some(params) = params.filter(|params| !params.is_empty()) else {
            return Ok(self.store.get_all_resources()?);
        };

        let ids = self.index.find_all_resources(params).map_err(|err| {
            error!(
                "event=resource_find module=repo status=error stage=index error={}",
                err
            );
            RepoError::from(err)
        })?;

        let mut resources = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.store.get_resource(id)? {
                Some(resource) => resources.push(resource),
                None => {
                    warn!(
                        "event=hydration_miss module=repo entity=resource id={} returned={} expected={}",
                        id,
                        resources.len(),
                        ids.len()
                    );
                    break;
                }
            }
        }
        Ok(resources)
    }

    /// Shorthand for a tag-only resource filter.
    pub fn find_resources_by_tag(&self, tag_name: &str) -> RepoResult<Vec<Resource>> {
        self.find_all_resources(Some(&ResourceParams::by_tag(tag_name)))
    }

    /// Idempotent tag creation.
    ///
    /// Returns the stored tag unchanged when the name already exists, even if
    /// a different color is requested. A new tag keeps the requested color or
    /// gets a random palette color.
    pub fn create_tag(&self, tag: &NewTag) -> RepoResult<Tag> {
        let _guard = self.serialize_writes();
        self.create_tag_serialized(tag)
    }

    /// Body of [`Self::create_tag`]; the caller holds `write_lock`.
    fn create_tag_serialized(&self, tag: &NewTag) -> RepoResult<Tag> {
        tag.validate()?;

        if let Some(existing) = self.store.get_tag(&tag.name)? {
            // Re-applying the edges heals an earlier index-stage failure.
            self.index.create_tag(&existing).map_err(|err| {
                error!(
                    "event=tag_create module=repo status=error stage=index_repair name={} error={}",
                    existing.name, err
                );
                RepoError::from(err)
            })?;
            return Ok(existing);
        }

        let created = Tag {
            name: tag.name.clone(),
            color: tag.color.clone().unwrap_or_else(random_color),
        };

        self.store.put_tag(&created).map_err(|err| {
            error!(
                "event=tag_create module=repo status=error stage=store name={} error={}",
                created.name, err
            );
            RepoError::from(err)
        })?;
        self.index.create_tag(&created).map_err(|err| {
            error!(
                "event=tag_create module=repo status=error stage=index name={} error={}",
                created.name, err
            );
            RepoError::from(err)
        })?;

        info!(
            "event=tag_create module=repo status=ok name={} color={}",
            created.name, created.color
        );
        Ok(created)
    }

    /// Direct record store lookup.
    pub fn find_tag_by_name(&self, name: &str) -> RepoResult<Tag> {
        self.store
            .get_tag(name)?
            .ok_or_else(|| RepoError::tag_not_found(name))
    }

    /// Lists tags, filtered when `params` carries at least one filter.
    ///
    /// Same hydration policy as [`Self::find_all_resources`].
    pub fn find_all_tags(&self, params: Option<&TagParams>) -> RepoResult<Vec<Tag>> {
        let Some(params) = params.filter(|params| !params.is_empty()) else {
            return Ok(self.store.get_all_tags()?);
        };

        let names = self.index.find_all_tags(params).map_err(|err| {
            error!(
                "event=tag_find module=repo status=error stage=index error={}",
                err
            );
            RepoError::from(err)
        })?;

        let mut tags = Vec::with_capacity(names.len());
        for name in &names {
            match self.store.get_tag(name)? {
                Some(tag) => tags.push(tag),
                None => {
                    warn!(
                        "event=hydration_miss module=repo entity=tag name={} returned={} expected={}",
                        name,
                        tags.len(),
                        names.len()
                    );
                    break;
                }
            }
        }
        Ok(tags)
    }

    /// Attaches `tag_name` to the stored resource, creating the tag if needed.
    ///
    /// The new tag is placed first and any earlier occurrence is dropped, so
    /// repeating the call leaves exactly one occurrence.
    pub fn add_tag_to_resource(&self, resource_id: &str, tag_name: &str) -> RepoResult<Resource> {
        let _guard = self.serialize_writes();
        let tag = self.create_tag_serialized(&NewTag::named(tag_name))?;
        let mut resource = self.find_resource_by_id(resource_id)?;

        let mut tags = Vec::with_capacity(resource.tags.len() + 1);
        tags.push(tag);
        tags.extend(
            resource
                .tags
                .into_iter()
                .filter(|existing| existing.name != tag_name),
        );
        resource.tags = tags;

        self.store.put_resource(&resource).map_err(|err| {
            error!(
                "event=resource_tag_add module=repo status=error stage=store id={} tag={} error={}",
                resource.id, tag_name, err
            );
            RepoError::from(err)
        })?;
        self.index
            .add_resource_tag(&resource, tag_name)
            .map_err(|err| {
                error!(
                    "event=resource_tag_add module=repo status=error stage=index id={} tag={} error={}",
                    resource.id, tag_name, err
                );
                RepoError::from(err)
            })?;

        info!(
            "event=resource_tag_add module=repo status=ok id={} tag={}",
            resource.id, tag_name
        );
        Ok(resource)
    }

    /// Detaches `tag_name` from the stored resource. Detaching an absent tag
    /// is a no-op rewrite. The tag record itself is kept.
    pub fn delete_tag_from_resource(
        &self,
        resource_id: &str,
        tag_name: &str,
    ) -> RepoResult<Resource> {
        let _guard = self.serialize_writes();
        let mut resource = self.find_resource_by_id(resource_id)?;
        resource.tags.retain(|existing| existing.name != tag_name);

        self.store.put_resource(&resource).map_err(|err| {
            error!(
                "event=resource_tag_delete module=repo status=error stage=store id={} tag={} error={}",
                resource.id, tag_name, err
            );
            RepoError::from(err)
        })?;
        self.index
            .delete_resource_tag(&resource, tag_name)
            .map_err(|err| {
                error!(
                    "event=resource_tag_delete module=repo status=error stage=index id={} tag={} error={}",
                    resource.id, tag_name, err
                );
                RepoError::from(err)
            })?;

        info!(
            "event=resource_tag_delete module=repo status=ok id={} tag={}",
            resource.id, tag_name
        );
        Ok(resource)
    }
}
