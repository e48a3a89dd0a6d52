//! Message anchors: which channel message shows which host
//!
//! Persisted as a flat JSON object `{"<host>": "<message id>"}` so that a
//! restart edits the existing messages instead of posting duplicates.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::presenter::ArtifactHandle;

#[derive(Debug)]
pub struct AnchorStore {
    path: PathBuf,
    anchors: RwLock<BTreeMap<String, ArtifactHandle>>,
}

/// Parse an anchors document, keeping only `known_hosts`.
///
/// Ids may be strings or (in older files) plain numbers.
pub fn parse_anchors(
    content: &str,
    known_hosts: &HashSet<&str>,
) -> anyhow::Result<BTreeMap<String, ArtifactHandle>> {
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(content).context("anchors file is not a JSON object")?;

    let mut anchors = BTreeMap::new();
    for (host, id) in raw {
        if !known_hosts.contains(host.as_str()) {
            debug!("dropping anchor of unconfigured host '{host}'");
            continue;
        }

        let id = match id {
            serde_json::Value::String(id) if !id.is_empty() => id,
            serde_json::Value::Number(id) => id.to_string(),
            other => {
                warn!("ignoring invalid message id for '{host}': {other}");
                continue;
            }
        };
        anchors.insert(host, ArtifactHandle(id));
    }

    Ok(anchors)
}

impl AnchorStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            anchors: RwLock::new(BTreeMap::new()),
        }
    }

    /// Load the anchors file. A missing or unreadable file starts empty.
    pub fn load<'a>(
        path: impl Into<PathBuf>,
        known_hosts: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let path = path.into();
        let known_hosts: HashSet<&str> = known_hosts.into_iter().collect();

        let anchors = match std::fs::read_to_string(&path) {
            Ok(content) => parse_anchors(&content, &known_hosts).unwrap_or_else(|e| {
                warn!("failed to load {}: {e:#}", path.display());
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("failed to read {}: {e}", path.display());
                BTreeMap::new()
            }
        };

        info!("loaded {} message anchors", anchors.len());
        Self {
            path,
            anchors: RwLock::new(anchors),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, host: &str) -> Option<ArtifactHandle> {
        self.anchors.read().await.get(host).cloned()
    }

    pub async fn set(&self, host: &str, handle: ArtifactHandle) {
        self.anchors.write().await.insert(host.to_string(), handle);
    }

    pub async fn snapshot(&self) -> BTreeMap<String, ArtifactHandle> {
        self.anchors.read().await.clone()
    }

    /// Write all anchors, replacing the file atomically.
    pub async fn save(&self) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(&*self.anchors.read().await)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
        file.write_all(content.as_bytes())?;
        file.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        debug!("saved message anchors to {}", self.path.display());
        Ok(())
    }
}
