//! Repository trait definition
//!
//! This trait defines the repository operations the resolver and facade rely on.
//! It allows the path logic to be decoupled from the XNAT REST implementation.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::path::{PathSegment, XnatPath};
use crate::schema::{relative_name, EntityType};

/// Handle for an existing repository object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteObject {
    /// Object type
    pub entity: EntityType,

    /// Repository identifier (opaque for subjects, experiments and resources)
    pub id: String,

    /// Stored XNAT label
    pub label: String,

    /// Path name, i.e. the label without its parent prefix
    pub name: String,

    /// REST URI, unique across the repository
    pub uri: String,

    /// Fully resolved literal path of this object
    pub path: XnatPath,

    /// XNAT data type, e.g. `xnat:mrSessionData`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xsi_type: Option<String>,

    /// Size in bytes (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl RemoteObject {
    /// Build the handle for a child reported by the repository
    ///
    /// The path name is derived from the label, stripping the parent label
    /// prefix for hierarchically labeled types.
    pub fn child_of(
        parent: Option<&RemoteObject>,
        entity: EntityType,
        id: impl Into<String>,
        label: impl Into<String>,
        uri: impl Into<String>,
    ) -> Result<Self> {
        let label = label.into();
        let name = match parent {
            Some(p) if entity.has_hierarchical_label() => relative_name(&p.label, &label),
            _ => label.as_str(),
        }
        .to_string();
        let segment = PathSegment::literal(entity, name.clone());
        let path = match parent {
            Some(p) => p.path.join(segment)?,
            None => XnatPath::from_segments(vec![segment])?,
        };
        Ok(Self {
            entity,
            id: id.into(),
            label,
            name,
            uri: uri.into(),
            path,
            xsi_type: None,
            size_bytes: None,
        })
    }

    pub fn with_xsi_type(mut self, xsi_type: Option<String>) -> Self {
        self.xsi_type = xsi_type;
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size_bytes = size;
        self
    }
}

/// Set of resolved objects, in first-seen order, without duplicates
///
/// Two handles denote the same object when their URIs are equal.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    objects: Vec<RemoteObject>,
    seen: HashSet<String>,
}

impl ResolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, returning false if it was already present
    pub fn insert(&mut self, object: RemoteObject) -> bool {
        if !self.seen.insert(object.uri.clone()) {
            return false;
        }
        self.objects.push(object);
        true
    }

    /// Merge another set into this one
    pub fn union(mut self, other: ResolvedSet) -> Self {
        self.extend(other.objects);
        self
    }

    /// Order by full resolved path
    pub fn sorted(mut self) -> Self {
        self.objects.sort_by_cached_key(|object| object.path.to_string());
        self
    }

    /// Drop every object that lies below another object of the set
    pub fn without_descendants(self) -> Self {
        let roots: Vec<RemoteObject> = self
            .objects
            .iter()
            .filter(|object| {
                !self
                    .objects
                    .iter()
                    .any(|other| other.path.is_ancestor_of(&object.path))
            })
            .cloned()
            .collect();
        roots.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RemoteObject> {
        self.objects.iter()
    }

    pub fn first(&self) -> Option<&RemoteObject> {
        self.objects.first()
    }

    pub fn into_vec(self) -> Vec<RemoteObject> {
        self.objects
    }
}

impl Extend<RemoteObject> for ResolvedSet {
    fn extend<I: IntoIterator<Item = RemoteObject>>(&mut self, iter: I) {
        for object in iter {
            self.insert(object);
        }
    }
}

impl FromIterator<RemoteObject> for ResolvedSet {
    fn from_iter<I: IntoIterator<Item = RemoteObject>>(iter: I) -> Self {
        let mut set = ResolvedSet::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for ResolvedSet {
    type Item = RemoteObject;
    type IntoIter = std::vec::IntoIter<RemoteObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResolvedSet {
    type Item = &'a RemoteObject;
    type IntoIter = std::slice::Iter<'a, RemoteObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

/// Attributes applied when creating an object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    /// XNAT data type, e.g. `xnat:mrSessionData`
    pub xsi_type: Option<String>,

    /// Session acquisition date
    pub date: Option<jiff::civil::Date>,
}

/// Trait for XNAT repository operations
///
/// A `None` parent addresses the repository root, whose children are projects.
/// Labels passed in are the stored XNAT labels, already qualified with their
/// parent prefix where the schema requires it.
#[async_trait]
pub trait Repository: Send + Sync {
    /// List the children of one type under a parent, in repository order
    async fn list_children(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
    ) -> Result<Vec<RemoteObject>>;

    /// Look up a single child by label or identifier
    async fn get_child(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
        label: &str,
    ) -> Result<Option<RemoteObject>>;

    /// Create a child object
    async fn create(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
        label: &str,
        attributes: &Attributes,
    ) -> Result<RemoteObject>;

    /// Delete an object and its content
    async fn delete(&self, object: &RemoteObject) -> Result<()>;

    /// Write a file object's content to a local path, returning the byte count
    async fn download_file(&self, file: &RemoteObject, target: &Path) -> Result<u64>;

    /// Store a local file in a resource under the given name
    async fn upload_file(
        &self,
        resource: &RemoteObject,
        name: &str,
        source: &Path,
        overwrite: bool,
    ) -> Result<RemoteObject>;

    /// Release the repository session
    async fn close(&self) -> Result<()>;
}
