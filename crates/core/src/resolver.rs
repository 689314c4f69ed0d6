//! Path resolution
//!
//! Walks a path level by level from the repository root, narrowing the
//! frontier of matching objects at each step.

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{Error, Result};
use crate::path::{PathSegment, XnatPath};
use crate::schema::{hierarchical_label, EntityType};
use crate::traits::{RemoteObject, Repository, ResolvedSet};

/// Frontier lookups in flight at once during one level
const MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Resolves paths against a repository
pub struct Resolver<'a, R: ?Sized> {
    repo: &'a R,
}

impl<'a, R: Repository + ?Sized> Resolver<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Resolve a path to every matching object
    ///
    /// An empty set means nothing matched; it is not an error.
    pub async fn resolve(&self, path: &XnatPath) -> Result<ResolvedSet> {
        let mut frontier: Vec<Option<RemoteObject>> = vec![None];
        for segment in path.segments() {
            let matched: Vec<Vec<RemoteObject>> = stream::iter(&frontier)
                .map(|parent| self.children(parent.as_ref(), segment))
                .buffered(MAX_CONCURRENT_LOOKUPS)
                .try_collect()
                .await?;
            frontier = matched.into_iter().flatten().map(Some).collect();
            tracing::debug!(
                segment = %segment,
                matches = frontier.len(),
                "Resolved path level"
            );
            if frontier.is_empty() {
                break;
            }
        }
        Ok(frontier.into_iter().flatten().collect())
    }

    /// Resolve a path that must match at least one object
    pub async fn resolve_required(&self, path: &XnatPath) -> Result<ResolvedSet> {
        let resolved = self.resolve(path).await?;
        if resolved.is_empty() {
            return Err(Error::ChildNotFound(path.to_string()));
        }
        Ok(resolved)
    }

    /// Children of one parent matching a segment
    async fn children(
        &self,
        parent: Option<&RemoteObject>,
        segment: &PathSegment,
    ) -> Result<Vec<RemoteObject>> {
        let mut found = Vec::new();
        for entity in lookup_types(parent, segment.entity) {
            match segment.matcher.literal() {
                Some(name) => {
                    let label = qualified_label(parent, entity, name);
                    if let Some(child) = self.repo.get_child(parent, entity, &label).await? {
                        found.push(child);
                    }
                }
                None => {
                    let children = self.repo.list_children(parent, entity).await?;
                    found.extend(
                        children
                            .into_iter()
                            .filter(|child| segment.matcher.matches(&child.name)),
                    );
                }
            }
        }
        Ok(found)
    }
}

/// The collections to consult for a segment type under a parent
///
/// A plain resource under an assessor lives in either its input or its
/// output collection.
fn lookup_types(parent: Option<&RemoteObject>, entity: EntityType) -> Vec<EntityType> {
    match parent.map(|p| p.entity) {
        Some(EntityType::Assessor) if entity == EntityType::Resource => {
            vec![EntityType::InResource, EntityType::OutResource]
        }
        _ => vec![entity],
    }
}

/// The stored label for a child name
pub(crate) fn qualified_label(
    parent: Option<&RemoteObject>,
    entity: EntityType,
    name: &str,
) -> String {
    match parent {
        Some(p) if entity.has_hierarchical_label() => hierarchical_label(&p.label, name),
        _ => name.to_string(),
    }
}
