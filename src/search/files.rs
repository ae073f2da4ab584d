//! Directory Listing
//!
//! Result of a `files` call: the listed directory, its entries and
//! optional per-host placement of each entry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

/// Placement of one entry on one host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Entry kind: "file", "dir" or "catalog"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub offset: u64,
}

/// Listing of one directory, possibly merged from several hosts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirInfo {
    #[serde(rename = "dir")]
    pub dir_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: BTreeSet<String>,

    #[serde(default, rename = "folders", deserialize_with = "null_as_empty")]
    pub dirs: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty", deserialize_with = "null_as_empty")]
    pub catalogs: BTreeSet<String>,

    /// host -> entry name -> placement
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, BTreeMap<String, NodeInfo>>,
}

impl DirInfo {
    /// Create an empty listing of `path`; an empty path lists the root
    pub fn new(path: &str) -> Self {
        let dir_path = if path.is_empty() {
            "/".to_string()
        } else {
            clean_path(Path::new(path)).to_string_lossy().into_owned()
        };

        Self {
            dir_path,
            ..Default::default()
        }
    }

    pub fn add_file(&mut self, name: impl Into<String>) {
        self.files.insert(name.into());
    }

    pub fn add_dir(&mut self, name: impl Into<String>) {
        self.dirs.insert(name.into());
    }

    pub fn add_catalog(&mut self, name: impl Into<String>) {
        self.catalogs.insert(name.into());
    }

    /// Record where `name` lives on `host`
    pub fn add_details(&mut self, host: &str, name: &str, info: NodeInfo) {
        self.details
            .entry(host.to_string())
            .or_default()
            .insert(name.to_string(), info);
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lexically normalise a path: drop `.`, resolve `..`, collapse separators.
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}
