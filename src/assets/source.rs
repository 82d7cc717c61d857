//! Asset sources
//!
//! An `AssetSource` is the host capability that turns an `AssetName` into a
//! loaded `Container`. Fetches are futures driven by the stage's local
//! executor; a source never touches the scene itself.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::assets::AssetName;
use crate::ecs::Transform;
use crate::error::FetchError;

/// Result of one fetch
pub type FetchResult = Result<Container, FetchError>;

/// One node of a loaded model
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Node name inside the model
    pub name: String,
    /// Local transform
    pub transform: Transform,
    /// Mesh drawn by this node, if any
    pub mesh: Option<String>,
    /// Index of the parent node; parents always come before their children
    pub parent: Option<usize>,
}

impl NodeData {
    /// Create a root node with a mesh
    pub fn mesh(name: impl Into<String>, mesh: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            mesh: Some(mesh.into()),
            parent: None,
        }
    }
}

/// A loaded, parsed asset waiting to be placed in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    asset: AssetName,
    nodes: Vec<NodeData>,
}

impl Container {
    /// Create an empty container for `asset`
    pub fn new(asset: impl Into<AssetName>) -> Self {
        Self {
            asset: asset.into(),
            nodes: Vec::new(),
        }
    }

    /// Create a container with a single mesh node named after the asset
    pub fn single(asset: impl Into<AssetName>, mesh: impl Into<String>) -> Self {
        let asset = asset.into();
        let mut container = Self::new(asset.clone());
        container.push(NodeData::mesh(asset.as_str(), mesh));
        container
    }

    /// Append a node and return its index.
    ///
    /// A parent index that does not point at an earlier node is dropped and
    /// the node becomes a root.
    pub fn push(&mut self, mut node: NodeData) -> usize {
        let index = self.nodes.len();
        if node.parent.is_some_and(|parent| parent >= index) {
            log::warn!(
                "{}: node `{}` has a forward parent reference, treating it as a root",
                self.asset,
                node.name
            );
            node.parent = None;
        }
        self.nodes.push(node);
        index
    }

    /// Asset this container was loaded from
    pub fn asset(&self) -> &AssetName {
        &self.asset
    }

    /// All nodes, parents before children
    pub fn nodes(&self) -> &[NodeData] {
        &self.nodes
    }

    /// Indices of nodes without a parent
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(index, _)| index)
    }

    /// Check if the container holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Host capability that retrieves and parses external assets
pub trait AssetSource {
    /// Start fetching `asset`. The future may fail; it is polled on the
    /// stage's thread only.
    fn fetch(&self, asset: &AssetName) -> LocalBoxFuture<'static, FetchResult>;
}

// ============================================================================
// glTF files on disk
// ============================================================================

/// Loads `.gltf` / `.glb` files relative to a root directory
#[derive(Debug, Clone)]
pub struct GltfSource {
    root: PathBuf,
}

impl GltfSource {
    /// Create a source reading from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory assets are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an asset name resolves to
    pub fn path_for(&self, asset: &AssetName) -> PathBuf {
        self.root.join(asset.as_str())
    }

    /// Parse a glTF document into a container.
    ///
    /// Only the node hierarchy of the default scene (or the first scene) is
    /// kept: names, TRS transforms, and mesh names.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Parse` if the bytes are not valid glTF or the
    /// document has no scene.
    pub fn parse(asset: &AssetName, bytes: &[u8]) -> FetchResult {
        let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| FetchError::Parse {
            asset: asset.clone(),
            message: e.to_string(),
        })?;

        let scene = gltf
            .default_scene()
            .or_else(|| gltf.scenes().next())
            .ok_or_else(|| FetchError::Parse {
                asset: asset.clone(),
                message: "document has no scene".to_string(),
            })?;

        let mut container = Container::new(asset.clone());
        for node in scene.nodes() {
            push_gltf_node(&mut container, &node, None);
        }
        Ok(container)
    }
}

fn push_gltf_node(container: &mut Container, node: &gltf::Node<'_>, parent: Option<usize>) {
    let (translation, rotation, scale) = node.transform().decomposed();
    let name = node
        .name()
        .map_or_else(|| format!("node{}", node.index()), str::to_string);
    let mesh = node.mesh().map(|mesh| {
        mesh.name()
            .map_or_else(|| format!("mesh{}", mesh.index()), str::to_string)
    });

    let index = container.push(NodeData {
        name,
        transform: Transform {
            position: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from_array(scale),
        },
        mesh,
        parent,
    });

    for child in node.children() {
        push_gltf_node(container, &child, Some(index));
    }
}

impl AssetSource for GltfSource {
    fn fetch(&self, asset: &AssetName) -> LocalBoxFuture<'static, FetchResult> {
        let path = self.path_for(asset);
        let asset = asset.clone();

        async move {
            log::debug!("Reading {}", path.display());
            let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => FetchError::NotFound(asset.clone()),
                _ => FetchError::Io {
                    asset: asset.clone(),
                    message: e.to_string(),
                },
            })?;
            Self::parse(&asset, &bytes)
        }
        .boxed_local()
    }
}

// ============================================================================
// In-memory containers
// ============================================================================

/// Serves containers registered up front. Fetches complete on first poll.
#[derive(Debug, Default)]
pub struct MemorySource {
    containers: RefCell<FxHashMap<AssetName, Container>>,
    fetches: RefCell<FxHashMap<AssetName, usize>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container under its asset name
    pub fn insert(&self, container: Container) {
        self.containers
            .borrow_mut()
            .insert(container.asset().clone(), container);
    }

    /// Builder-style `insert`
    pub fn with(self, container: Container) -> Self {
        self.insert(container);
        self
    }

    /// How many times `asset` has been fetched
    pub fn fetch_count(&self, asset: &str) -> usize {
        self.fetches
            .borrow()
            .get(&AssetName::from(asset))
            .copied()
            .unwrap_or(0)
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, asset: &AssetName) -> LocalBoxFuture<'static, FetchResult> {
        *self.fetches.borrow_mut().entry(asset.clone()).or_insert(0) += 1;

        let result = self
            .containers
            .borrow()
            .get(asset)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(asset.clone()));
        future::ready(result).boxed_local()
    }
}

// ============================================================================
// Test double
// ============================================================================

/// Source whose fetches stay pending until the test completes them
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ManualSource {
    pending: RefCell<FxHashMap<AssetName, Vec<futures::channel::oneshot::Sender<FetchResult>>>>,
    fetches: RefCell<Vec<AssetName>>,
}

#[cfg(test)]
impl ManualSource {
    pub(crate) fn fetch_count(&self, asset: &str) -> usize {
        self.fetches
            .borrow()
            .iter()
            .filter(|name| name.as_str() == asset)
            .count()
    }

    pub(crate) fn is_pending(&self, asset: &str) -> bool {
        self.pending
            .borrow()
            .get(&AssetName::from(asset))
            .is_some_and(|senders| !senders.is_empty())
    }

    /// Complete every outstanding fetch of `asset`. Returns how many there were.
    pub(crate) fn complete(&self, asset: &str, result: FetchResult) -> usize {
        let senders = self
            .pending
            .borrow_mut()
            .remove(&AssetName::from(asset))
            .unwrap_or_default();
        let count = senders.len();
        for sender in senders {
            let _ = sender.send(result.clone());
        }
        count
    }
}

#[cfg(test)]
impl AssetSource for ManualSource {
    fn fetch(&self, asset: &AssetName) -> LocalBoxFuture<'static, FetchResult> {
        let (tx, rx) = futures::channel::oneshot::channel();
        self.fetches.borrow_mut().push(asset.clone());
        self.pending
            .borrow_mut()
            .entry(asset.clone())
            .or_default()
            .push(tx);

        let asset = asset.clone();
        async move { rx.await.unwrap_or(Err(FetchError::Aborted(asset))) }.boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_container_forward_parent_becomes_root() {
        let mut container = Container::new("crate.glb");
        let lid = container.push(NodeData {
            parent: Some(3),
            ..NodeData::mesh("lid", "lid_mesh")
        });
        assert_eq!(container.nodes()[lid].parent, None);
        assert_eq!(container.roots().count(), 1);
    }

    #[test]
    fn test_memory_source_fetch() {
        let source = MemorySource::new().with(Container::single("tree.glb", "trunk"));

        let loaded = block_on(source.fetch(&AssetName::from("tree.glb"))).unwrap();
        assert_eq!(loaded.nodes().len(), 1);
        assert_eq!(loaded.nodes()[0].mesh.as_deref(), Some("trunk"));

        let missing = block_on(source.fetch(&AssetName::from("rock.glb")));
        assert_eq!(
            missing,
            Err(FetchError::NotFound(AssetName::from("rock.glb")))
        );
        assert_eq!(source.fetch_count("tree.glb"), 1);
        assert_eq!(source.fetch_count("rock.glb"), 1);
    }

    #[test]
    fn test_gltf_parse_hierarchy() {
        let json = r#"{
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [ { "nodes": [0] } ],
            "nodes": [
                { "name": "Cart", "children": [1], "translation": [1.0, 0.0, 0.0] },
                { "name": "Wheel", "scale": [2.0, 2.0, 2.0] }
            ]
        }"#;

        let container = GltfSource::parse(&AssetName::from("cart.gltf"), json.as_bytes()).unwrap();
        let nodes = container.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "Cart");
        assert_eq!(nodes[0].transform.position, Vec3::X);
        assert_eq!(nodes[1].parent, Some(0));
        assert_eq!(nodes[1].transform.scale, Vec3::splat(2.0));
    }

    #[test]
    fn test_gltf_parse_rejects_garbage() {
        let result = GltfSource::parse(&AssetName::from("junk.glb"), b"not gltf");
        assert!(matches!(result, Err(FetchError::Parse { .. })));
    }

    #[test]
    fn test_gltf_missing_file() {
        let source = GltfSource::new("/nonexistent-asset-root");
        let result = block_on(source.fetch(&AssetName::from("tree.glb")));
        assert_eq!(result, Err(FetchError::NotFound(AssetName::from("tree.glb"))));
    }
}
