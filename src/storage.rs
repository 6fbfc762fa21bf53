use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::{Buf, Bytes};
use zarrs::{
    array::Array,
    filesystem::FilesystemStore,
    storage::{
        ListableStorageTraits, ReadableStorageTraits, StoreKey, StorePrefix,
        WritableStorageTraits,
    },
};

/// Zarr V2 group metadata key.
const ZGROUP: &str = ".zgroup";
/// Zarr V2 array metadata key.
const ZARRAY: &str = ".zarray";
/// Zarr V2 attributes key.
const ZATTRS: &str = ".zattrs";
/// Zarr V3 node metadata key.
const ZARR_JSON: &str = "zarr.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Array,
}

/// What the hierarchy knows about a node, read straight from its metadata documents.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub kind: NodeKind,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// A Zarr hierarchy on the local filesystem.
///
/// Reads go through the `zarrs` storage API;
/// the node-level operations needed to replace an array in place
/// (erase, durable sync, rename) go through the filesystem.
#[derive(Debug)]
pub struct NgffStore {
    root: PathBuf,
    inner: Arc<FilesystemStore>,
}

impl NgffStore {
    pub fn open(root: impl AsRef<Path>) -> crate::Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(crate::Error::malformed(
                root.display().to_string(),
                "not a directory",
            ));
        }
        let inner = FilesystemStore::new(&root).map_err(crate::Error::wrap)?;
        Ok(Self {
            root,
            inner: Arc::new(inner),
        })
    }

    /// Root directory of the hierarchy.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The underlying store, for opening `zarrs` arrays.
    pub fn storage(&self) -> Arc<FilesystemStore> {
        self.inner.clone()
    }

    /// Filesystem location of a node, e.g. `/image/0` -> `<root>/image/0`.
    pub fn node_fspath(&self, node_path: &str) -> PathBuf {
        let relative = node_path.trim_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    pub fn get(&self, key: &str) -> crate::Result<Option<Bytes>> {
        let key = StoreKey::new(key).map_err(crate::Error::wrap)?;
        Ok(self.inner.get(&key)?)
    }

    fn get_json(&self, key: &str) -> crate::Result<Option<serde_json::Value>> {
        let Some(b) = self.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_reader(b.reader())
            .map_err(|e| crate::Error::malformed(key, format!("could not parse JSON: {e}")))?;
        Ok(Some(value))
    }

    /// Read the metadata of the node at `node_path`.
    ///
    /// Returns None if there is no group or array there.
    pub fn node_metadata(&self, node_path: &str) -> crate::Result<Option<NodeMetadata>> {
        if let Some(zarr_json) = self.get_json(&node_key(node_path, ZARR_JSON))? {
            let kind = match zarr_json.get("node_type").and_then(|t| t.as_str()) {
                Some("group") => NodeKind::Group,
                Some("array") => NodeKind::Array,
                other => {
                    return Err(crate::Error::malformed(
                        node_path,
                        format!("unknown node type {other:?}"),
                    ));
                }
            };
            let attributes = match zarr_json.get("attributes") {
                Some(serde_json::Value::Object(map)) => map.clone(),
                _ => Default::default(),
            };
            return Ok(Some(NodeMetadata {
                kind,
                attributes,
            }));
        }

        let kind = if self.get(&node_key(node_path, ZARRAY))?.is_some() {
            NodeKind::Array
        } else if self.get(&node_key(node_path, ZGROUP))?.is_some() {
            NodeKind::Group
        } else {
            return Ok(None);
        };
        let attributes = match self.get_json(&node_key(node_path, ZATTRS))? {
            Some(serde_json::Value::Object(map)) => map,
            Some(_) => {
                return Err(crate::Error::malformed(node_path, "attributes are not an object"));
            }
            None => Default::default(),
        };
        Ok(Some(NodeMetadata {
            kind,
            attributes,
        }))
    }

    /// Attributes of the group at `node_path`, or None if it is not a group.
    pub fn group_attributes(
        &self,
        node_path: &str,
    ) -> crate::Result<Option<serde_json::Map<String, serde_json::Value>>> {
        Ok(self
            .node_metadata(node_path)?
            .filter(|m| m.kind == NodeKind::Group)
            .map(|m| m.attributes))
    }

    /// Names of the child groups of `node_path`, in storage listing order.
    pub fn child_groups(&self, node_path: &str) -> crate::Result<Vec<String>> {
        let relative = node_path.trim_matches('/');
        let prefix = if relative.is_empty() {
            StorePrefix::root()
        } else {
            StorePrefix::new(format!("{relative}/")).map_err(crate::Error::wrap)?
        };
        let listing = self.inner.list_dir(&prefix)?;
        let mut out = Vec::new();
        for child in listing.prefixes() {
            let child_path = format!("/{}", child.as_str().trim_end_matches('/'));
            let name = child_path.rsplit('/').next().unwrap_or_default().to_string();
            match self.node_metadata(&child_path)? {
                Some(m) if m.kind == NodeKind::Group => out.push(name),
                _ => log::debug!("Skipping non-group node \"{child_path}\""),
            }
        }
        Ok(out)
    }

    pub fn node_exists(&self, node_path: &str) -> crate::Result<bool> {
        Ok(self.node_metadata(node_path)?.is_some())
    }

    pub fn open_array(&self, node_path: &str) -> crate::Result<Array<FilesystemStore>> {
        match self.node_metadata(node_path)? {
            Some(m) if m.kind == NodeKind::Array => {}
            Some(_) => return Err(crate::Error::malformed(node_path, "node is not an array")),
            None => return Err(crate::Error::malformed(node_path, "array does not exist")),
        }
        Ok(Array::open(self.inner.clone(), node_path)?)
    }

    /// Remove a node and everything beneath it.
    pub fn erase_node(&self, node_path: &str) -> crate::Result<()> {
        let relative = node_path.trim_matches('/');
        if relative.is_empty() {
            return Err(crate::Error::general("refusing to erase the hierarchy root"));
        }
        let prefix = StorePrefix::new(format!("{relative}/")).map_err(crate::Error::wrap)?;
        self.inner.erase_prefix(&prefix)?;
        Ok(())
    }

    /// Flush every file and directory of a node to stable storage.
    pub fn sync_node(&self, node_path: &str) -> crate::Result<()> {
        for entry in walkdir::WalkDir::new(self.node_fspath(node_path)).contents_first(true) {
            let entry = entry.map_err(crate::Error::wrap)?;
            File::open(entry.path())?.sync_all()?;
        }
        Ok(())
    }

    /// Atomically move node `from` to `to`, which must not exist or be an empty directory.
    pub fn rename_node(&self, from: &str, to: &str) -> crate::Result<()> {
        let to_fspath = self.node_fspath(to);
        if to_fspath.exists() {
            if to_fspath.is_dir() && std::fs::read_dir(&to_fspath)?.next().is_none() {
                std::fs::remove_dir(&to_fspath)?;
            } else {
                return Err(crate::Error::consistency(
                    to,
                    "rename target already exists",
                ));
            }
        }
        std::fs::rename(self.node_fspath(from), &to_fspath)?;
        if let Some(parent) = to_fspath.parent() {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }
}

/// Store key of a metadata document belonging to a node.
fn node_key(node_path: &str, name: &str) -> String {
    let relative = node_path.trim_matches('/');
    if relative.is_empty() {
        name.to_string()
    } else {
        format!("{relative}/{name}")
    }
}

/// Join a child name onto a node path.
pub fn join_node_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_matches('/');
    format!("{parent}/{child}")
}
