//! Relationship index: derived edges for multi-attribute search.
//!
//! # Responsibility
//! - Record typed edges between resources, tags and their attributes.
//! - Answer filtered lookups as the intersection of per-field candidate sets.
//!
//! # Invariants
//! - The edge set is a set: replaying a write never duplicates an edge.
//! - Every edge is derivable from record store contents; the index holds no
//!   fact of its own and can always be rebuilt.
//! - A resource↔tag edge pair is written or removed as one unit.

use crate::db::DbError;
use crate::model::resource::{Resource, ResourceParams};
use crate::model::tag::{Tag, TagParams};
use log::debug;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub mod memory;
pub mod sqlite_index;

pub use memory::MemoryIndex;
pub use sqlite_index::SqliteIndex;

pub type IndexResult<T> = Result<T, IndexError>;

/// Index-layer error for edge writes and traversals.
#[derive(Debug)]
pub enum IndexError {
    Db(DbError),
    /// A find was issued without any active filter.
    EmptyQuery,
    /// Persisted edge cannot be decoded.
    InvalidData(String),
    /// A writer panicked while holding the index lock.
    LockPoisoned,
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::EmptyQuery => write!(f, "index query requires at least one filter"),
            Self::InvalidData(message) => write!(f, "invalid index edge: {message}"),
            Self::LockPoisoned => write!(f, "relationship index lock poisoned"),
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::EmptyQuery | Self::InvalidData(_) | Self::LockPoisoned => None,
        }
    }
}

impl From<DbError> for IndexError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Namespace of an index node value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Resource,
    Tag,
    Type,
    Name,
    Color,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Tag => "tag",
            Self::Type => "type",
            Self::Name => "name",
            Self::Color => "color",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "resource" => Some(Self::Resource),
            "tag" => Some(Self::Tag),
            "type" => Some(Self::Type),
            "name" => Some(Self::Name),
            "color" => Some(Self::Color),
            _ => None,
        }
    }
}

/// Edge label. Names the kind of node the edge points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predicate {
    Resource,
    Tag,
    Type,
    Name,
    Color,
}

impl Predicate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Tag => "tag",
            Self::Type => "type",
            Self::Name => "name",
            Self::Color => "color",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Node {
    pub kind: NodeKind,
    pub value: String,
}

impl Node {
    pub fn new(kind: NodeKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Directed fact `subject --predicate--> object`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub subject: Node,
    pub predicate: Predicate,
    pub object: Node,
}

impl Edge {
    fn new(subject: Node, predicate: Predicate, object: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// One queryable field: its filter value names a start node whose outgoing
/// edges lead to candidate results.
pub struct FilterField<P> {
    pub field: &'static str,
    pub start: NodeKind,
    pub accessor: fn(&P) -> Option<&str>,
}

/// Resource filters, evaluated in declaration order.
pub const RESOURCE_FILTERS: &[FilterField<ResourceParams>] = &[
    FilterField {
        field: "type",
        start: NodeKind::Type,
        accessor: resource_kind,
    },
    FilterField {
        field: "name",
        start: NodeKind::Name,
        accessor: resource_name,
    },
    FilterField {
        field: "tag",
        start: NodeKind::Tag,
        accessor: resource_tag,
    },
];

/// Tag filters, evaluated in declaration order.
pub const TAG_FILTERS: &[FilterField<TagParams>] = &[
    FilterField {
        field: "name",
        start: NodeKind::Name,
        accessor: tag_name,
    },
    FilterField {
        field: "color",
        start: NodeKind::Color,
        accessor: tag_color,
    },
];

fn resource_kind(params: &ResourceParams) -> Option<&str> {
    params.kind.as_deref()
}

fn resource_name(params: &ResourceParams) -> Option<&str> {
    params.name.as_deref()
}

fn resource_tag(params: &ResourceParams) -> Option<&str> {
    params.tag.as_deref()
}

fn tag_name(params: &TagParams) -> Option<&str> {
    params.name.as_deref()
}

fn tag_color(params: &TagParams) -> Option<&str> {
    params.color.as_deref()
}

/// Edges materialized for one resource.
pub fn resource_edges(resource: &Resource) -> Vec<Edge> {
    let id = Node::new(NodeKind::Resource, resource.id.as_str());
    let kind = Node::new(NodeKind::Type, resource.kind.as_str());
    let name = Node::new(NodeKind::Name, resource.name.as_str());

    let mut edges = vec![
        Edge::new(id.clone(), Predicate::Type, kind.clone()),
        Edge::new(kind, Predicate::Resource, id.clone()),
        Edge::new(id.clone(), Predicate::Name, name.clone()),
        Edge::new(name, Predicate::Resource, id),
    ];
    for tag in &resource.tags {
        edges.extend(resource_tag_edges(&resource.id, &tag.name));
    }
    edges
}

/// Edges materialized for one tag.
pub fn tag_edges(tag: &Tag) -> Vec<Edge> {
    let node = Node::new(NodeKind::Tag, tag.name.as_str());
    let color = Node::new(NodeKind::Color, tag.color.as_str());
    vec![
        Edge::new(node.clone(), Predicate::Color, color.clone()),
        Edge::new(color, Predicate::Tag, node.clone()),
        Edge::new(
            Node::new(NodeKind::Name, tag.name.as_str()),
            Predicate::Tag,
            node,
        ),
    ]
}

/// The resource↔tag edge pair.
pub fn resource_tag_edges(resource_id: &str, tag_name: &str) -> [Edge; 2] {
    let resource = Node::new(NodeKind::Resource, resource_id);
    let tag = Node::new(NodeKind::Tag, tag_name);
    [
        Edge::new(resource.clone(), Predicate::Tag, tag.clone()),
        Edge::new(tag, Predicate::Resource, resource),
    ]
}

/// Intersects the candidate sets of every active filter.
///
/// `objects` returns the values of the nodes reachable from a start node
/// along `target`. Stops at the first empty intermediate set.
pub fn intersect_filters<P, F>(
    filters: &[FilterField<P>],
    params: &P,
    target: Predicate,
    mut objects: F,
) -> IndexResult<Vec<String>>
where
    F: FnMut(&Node, Predicate) -> IndexResult<BTreeSet<String>>,
{
    let mut result: Option<BTreeSet<String>> = None;

    for filter in filters {
        let Some(value) = (filter.accessor)(params) else {
            continue;
        };
        let candidates = objects(&Node::new(filter.start, value), target)?;
        debug!(
            "event=index_filter module=index field={} target={} candidates={}",
            filter.field,
            target.as_str(),
            candidates.len()
        );
        let narrowed = match result {
            Some(current) => current.intersection(&candidates).cloned().collect(),
            None => candidates,
        };
        if narrowed.is_empty() {
            return Ok(Vec::new());
        }
        result = Some(narrowed);
    }

    result
        .map(|ids| ids.into_iter().collect())
        .ok_or(IndexError::EmptyQuery)
}

/// Secondary index over resource and tag relationships.
///
/// Implementations synchronize internally; all methods take `&self`.
pub trait RelationshipIndex: Send + Sync {
    /// Drops every edge.
    fn reset(&self) -> IndexResult<()>;
    /// Adds type, name and tag edges for `resource`.
    fn create_resource(&self, resource: &Resource) -> IndexResult<()>;
    /// Records tag color and name edges.
    fn create_tag(&self, tag: &Tag) -> IndexResult<()>;
    /// Adds both directions of the resource↔tag pair, or neither.
    fn add_resource_tag(&self, resource: &Resource, tag_name: &str) -> IndexResult<()>;
    /// Removes both directions of the resource↔tag pair, or neither.
    fn delete_resource_tag(&self, resource: &Resource, tag_name: &str) -> IndexResult<()>;
    /// Sorted resource ids matching every active filter.
    fn find_all_resources(&self, params: &ResourceParams) -> IndexResult<Vec<String>>;
    /// Sorted tag names matching every active filter.
    fn find_all_tags(&self, params: &TagParams) -> IndexResult<Vec<String>>;
    fn edge_count(&self) -> IndexResult<usize>;
}

impl<T: RelationshipIndex + ?Sized> RelationshipIndex for Box<T> {
    fn reset(&self) -> IndexResult<()> {
        (**self).reset()
    }

    fn create_resource(&self, resource: &Resource) -> IndexResult<()> {
        (**self).create_resource(resource)
    }

    fn create_tag(&self, tag: &Tag) -> IndexResult<()> {
        (**self).create_tag(tag)
    }

    fn add_resource_tag(&self, resource: &Resource, tag_name: &str) -> IndexResult<()> {
        (**self).add_resource_tag(resource, tag_name)
    }

    fn delete_resource_tag(&self, resource: &Resource, tag_name: &str) -> IndexResult<()> {
        (**self).delete_resource_tag(resource, tag_name)
    }

    fn find_all_resources(&self, params: &ResourceParams) -> IndexResult<Vec<String>> {
        (**self).find_all_resources(params)
    }

    fn find_all_tags(&self, params: &TagParams) -> IndexResult<Vec<String>> {
        (**self).find_all_tags(params)
    }

    fn edge_count(&self) -> IndexResult<usize> {
        (**self).edge_count()
    }
}

/// Opens a file-backed index, or an in-memory one when `path` is `None`.
pub fn open_index(path: Option<&Path>) -> IndexResult<Box<dyn RelationshipIndex>> {
    match path {
        Some(path) => Ok(Box::new(SqliteIndex::open(Some(path))?)),
        None => Ok(Box::new(MemoryIndex::new())),
    }
}
