//! In-memory repository for tests

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::path::tokenize;
use crate::schema::{hierarchical_label, EntityType};
use crate::traits::{Attributes, RemoteObject, Repository};

#[derive(Debug, Clone)]
struct Node {
    entity: EntityType,
    id: String,
    label: String,
    uri: String,
    parent_uri: Option<String>,
    xsi_type: Option<String>,
    content: Vec<u8>,
}

/// A repository held in memory, recording every call it receives
#[derive(Debug, Default)]
pub struct MemoryRepository {
    nodes: Mutex<Vec<Node>>,
    next_id: AtomicUsize,
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<(EntityType, String, Attributes)>>,
}

fn collection(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Project => "projects",
        EntityType::Subject => "subjects",
        EntityType::Experiment => "experiments",
        EntityType::Scan => "scans",
        EntityType::Assessor => "assessors",
        EntityType::Resource => "resources",
        EntityType::InResource => "in/resources",
        EntityType::OutResource => "out/resources",
        EntityType::File => "files",
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create every object along a literal path, without recording calls
    ///
    /// Experiments are seeded as MR sessions. Files hold their own name as
    /// content.
    pub fn seed(&self, path: &str) {
        let tokenized = tokenize(path).unwrap();
        let mut parent: Option<Node> = None;
        for segment in tokenized.path.segments() {
            let name = segment.matcher.literal().unwrap();
            let label = match &parent {
                Some(p) if segment.entity.has_hierarchical_label() => {
                    hierarchical_label(&p.label, name)
                }
                _ => name.to_string(),
            };
            let parent_uri = parent.as_ref().map(|p| p.uri.as_str());
            let node = match self.find_node(parent_uri, segment.entity, &label) {
                Some(node) => node,
                None => {
                    let xsi_type = (segment.entity == EntityType::Experiment)
                        .then(|| "xnat:mrSessionData".to_string());
                    let content = name.as_bytes().to_vec();
                    self.insert_node(parent.as_ref(), segment.entity, &label, xsi_type, content)
                }
            };
            parent = Some(node);
        }
    }

    /// Calls received so far, e.g. `get subject Breast003`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Objects created through the trait, in order
    pub fn created(&self) -> Vec<(EntityType, String, Attributes)> {
        self.created.lock().unwrap().clone()
    }

    /// Stored content of the object at a URI
    pub fn content(&self, uri: &str) -> Option<Vec<u8>> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.uri == uri)
            .map(|n| n.content.clone())
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn find_node(&self, parent_uri: Option<&str>, entity: EntityType, label: &str) -> Option<Node> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| {
                n.parent_uri.as_deref() == parent_uri
                    && n.entity == entity
                    && (n.label == label || n.id == label)
            })
            .cloned()
    }

    fn insert_node(
        &self,
        parent: Option<&Node>,
        entity: EntityType,
        label: &str,
        xsi_type: Option<String>,
        content: Vec<u8>,
    ) -> Node {
        let base = parent.map(|p| p.uri.as_str()).unwrap_or("/data");
        let id = match entity {
            EntityType::Subject | EntityType::Experiment | EntityType::Assessor => {
                format!("XNAT_{:05}", self.next_id.fetch_add(1, Ordering::SeqCst))
            }
            _ => label.to_string(),
        };
        let node = Node {
            entity,
            id,
            label: label.to_string(),
            uri: format!("{base}/{}/{label}", collection(entity)),
            parent_uri: parent.map(|p| p.uri.clone()),
            xsi_type,
            content,
        };
        self.nodes.lock().unwrap().push(node.clone());
        node
    }

    fn to_object(parent: Option<&RemoteObject>, node: &Node) -> Result<RemoteObject> {
        let size = (node.entity == EntityType::File).then_some(node.content.len() as u64);
        Ok(
            RemoteObject::child_of(parent, node.entity, &node.id, &node.label, &node.uri)?
                .with_xsi_type(node.xsi_type.clone())
                .with_size(size),
        )
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_children(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
    ) -> Result<Vec<RemoteObject>> {
        self.record(format!("list {entity}"));
        let parent_uri = parent.map(|p| p.uri.as_str());
        let nodes: Vec<Node> = self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.parent_uri.as_deref() == parent_uri && n.entity == entity)
            .cloned()
            .collect();
        nodes.iter().map(|n| Self::to_object(parent, n)).collect()
    }

    async fn get_child(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
        label: &str,
    ) -> Result<Option<RemoteObject>> {
        self.record(format!("get {entity} {label}"));
        self.find_node(parent.map(|p| p.uri.as_str()), entity, label)
            .map(|n| Self::to_object(parent, &n))
            .transpose()
    }

    async fn create(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
        label: &str,
        attributes: &Attributes,
    ) -> Result<RemoteObject> {
        self.record(format!("create {entity} {label}"));
        let parent_uri = parent.map(|p| p.uri.as_str());
        if self.find_node(parent_uri, entity, label).is_some() {
            return Err(Error::Conflict(label.to_string()));
        }
        let parent_node = match parent_uri {
            Some(uri) => self.nodes.lock().unwrap().iter().find(|n| n.uri == uri).cloned(),
            None => None,
        };
        let node = self.insert_node(
            parent_node.as_ref(),
            entity,
            label,
            attributes.xsi_type.clone(),
            Vec::new(),
        );
        self.created
            .lock()
            .unwrap()
            .push((entity, label.to_string(), attributes.clone()));
        Self::to_object(parent, &node)
    }

    async fn delete(&self, object: &RemoteObject) -> Result<()> {
        self.record(format!("delete {}", object.uri));
        let prefix = format!("{}/", object.uri);
        let mut nodes = self.nodes.lock().unwrap();
        if !nodes.iter().any(|n| n.uri == object.uri) {
            return Err(Error::NotFound(object.uri.clone()));
        }
        nodes.retain(|n| n.uri != object.uri && !n.uri.starts_with(&prefix));
        Ok(())
    }

    async fn download_file(&self, file: &RemoteObject, target: &Path) -> Result<u64> {
        self.record(format!("download {}", file.uri));
        let content = self
            .content(&file.uri)
            .ok_or_else(|| Error::NotFound(file.uri.clone()))?;
        tokio::fs::write(target, &content).await?;
        Ok(content.len() as u64)
    }

    async fn upload_file(
        &self,
        resource: &RemoteObject,
        name: &str,
        source: &Path,
        overwrite: bool,
    ) -> Result<RemoteObject> {
        self.record(format!("upload {name}"));
        let content = tokio::fs::read(source).await?;
        if let Some(existing) = self.find_node(Some(&resource.uri), EntityType::File, name) {
            if !overwrite {
                return Err(Error::Conflict(existing.uri));
            }
            self.nodes.lock().unwrap().retain(|n| n.uri != existing.uri);
        }
        let parent_node = self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.uri == resource.uri)
            .cloned();
        let node = self.insert_node(parent_node.as_ref(), EntityType::File, name, None, content);
        Self::to_object(Some(resource), &node)
    }

    async fn close(&self) -> Result<()> {
        self.record("close".to_string());
        Ok(())
    }
}
