//! Transient in-process relationship index.
//!
//! Edges live in an adjacency map keyed by `(subject, predicate)`. Readers
//! share an `RwLock`; each mutation takes the write lock once, so an edge
//! pair is never half-applied.

use super::{
    intersect_filters, resource_edges, resource_tag_edges, tag_edges, Edge, IndexError,
    IndexResult, Node, Predicate, RelationshipIndex, RESOURCE_FILTERS, TAG_FILTERS,
};
use crate::model::resource::{Resource, ResourceParams};
use crate::model::tag::{Tag, TagParams};
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Adjacency = HashMap<(Node, Predicate), BTreeSet<Node>>;

#[derive(Default)]
pub struct MemoryIndex {
    edges: RwLock<Adjacency>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> IndexResult<RwLockReadGuard<'_, Adjacency>> {
        self.edges.read().map_err(|_| IndexError::LockPoisoned)
    }

    fn write(&self) -> IndexResult<RwLockWriteGuard<'_, Adjacency>> {
        self.edges.write().map_err(|_| IndexError::LockPoisoned)
    }

    fn insert_all(&self, edges: impl IntoIterator<Item = Edge>) -> IndexResult<()> {
        let mut adjacency = self.write()?;
        for edge in edges {
            adjacency
                .entry((edge.subject, edge.predicate))
                .or_default()
                .insert(edge.object);
        }
        Ok(())
    }

    fn remove_all(&self, edges: impl IntoIterator<Item = Edge>) -> IndexResult<()> {
        let mut adjacency = self.write()?;
        for edge in edges {
            let key = (edge.subject, edge.predicate);
            if let Some(objects) = adjacency.get_mut(&key) {
                objects.remove(&edge.object);
                if objects.is_empty() {
                    adjacency.remove(&key);
                }
            }
        }
        Ok(())
    }
}

fn objects_of(adjacency: &Adjacency, subject: &Node, predicate: Predicate) -> BTreeSet<String> {
    adjacency
        .get(&(subject.clone(), predicate))
        .map(|objects| objects.iter().map(|node| node.value.clone()).collect())
        .unwrap_or_default()
}

impl RelationshipIndex for MemoryIndex {
    fn reset(&self) -> IndexResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn create_resource(&self, resource: &Resource) -> IndexResult<()> {
        self.insert_all(resource_edges(resource))
    }

    fn create_tag(&self, tag: &Tag) -> IndexResult<()> {
        self.insert_all(tag_edges(tag))
    }

    fn add_resource_tag(&self, resource: &Resource, tag_name: &str) -> IndexResult<()> {
        self.insert_all(resource_tag_edges(&resource.id, tag_name))
    }

    fn delete_resource_tag(&self, resource: &Resource, tag_name: &str) -> IndexResult<()> {
        self.remove_all(resource_tag_edges(&resource.id, tag_name))
    }

    fn find_all_resources(&self, params: &ResourceParams) -> IndexResult<Vec<String>> {
        let adjacency = self.read()?;
        intersect_filters(RESOURCE_FILTERS, params, Predicate::Resource, |node, target| {
            Ok(objects_of(&adjacency, node, target))
        })
    }

    fn find_all_tags(&self, params: &TagParams) -> IndexResult<Vec<String>> {
        let adjacency = self.read()?;
        intersect_filters(TAG_FILTERS, params, Predicate::Tag, |node, target| {
            Ok(objects_of(&adjacency, node, target))
        })
    }

    fn edge_count(&self) -> IndexResult<usize> {
        Ok(self.read()?.values().map(BTreeSet::len).sum())
    }
}
