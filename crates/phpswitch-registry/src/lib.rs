use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use phpswitch_core::{compare_version_ids, parse_version_suffix, InstallLayout, LinkKind, NotFoundError};
use serde::Serialize;
use tracing::debug;

/// An installed interpreter/server pair sharing one version id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub id: String,
    pub interpreter_dir: PathBuf,
    pub server_dir: PathBuf,
}

impl VersionEntry {
    pub fn dir(&self, kind: LinkKind) -> &PathBuf {
        match kind {
            LinkKind::Interpreter => &self.interpreter_dir,
            LinkKind::Server => &self.server_dir,
        }
    }
}

/// Snapshot of one scan. Never refreshed in place; scan again instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRegistry {
    entries: BTreeMap<String, VersionEntry>,
}

impl VersionRegistry {
    pub fn get(&self, id: &str) -> Option<&VersionEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Version ids in numeric order (`8.1` before `10.0`).
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_by(|a, b| compare_version_ids(a, b));
        ids
    }

    /// Entries in the same order as [`VersionRegistry::ids`].
    pub fn entries(&self) -> Vec<&VersionEntry> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }
}

/// Lists the version pairs installed directly under the layout root.
pub fn scan(layout: &InstallLayout) -> Result<VersionRegistry, NotFoundError> {
    let root = layout.root();
    let read_dir = match fs::read_dir(root) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(NotFoundError::InstallRoot(root.to_path_buf()));
        }
        Err(err) => {
            return Err(NotFoundError::UnreadableRoot {
                path: root.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    let mut entries = BTreeMap::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(root = %root.display(), error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(version) = parse_version_suffix(name, layout.interpreter_prefix()) else {
            continue;
        };

        let interpreter_dir = entry.path();
        if !interpreter_dir.is_dir() {
            continue;
        }
        let server_dir = layout.version_dir(LinkKind::Server, version);
        if !server_dir.is_dir() {
            debug!(
                version,
                missing = %server_dir.display(),
                "skipping interpreter without matching server directory"
            );
            continue;
        }

        entries.insert(
            version.to_string(),
            VersionEntry {
                id: version.to_string(),
                interpreter_dir,
                server_dir,
            },
        );
    }

    debug!(root = %root.display(), count = entries.len(), "scanned installed versions");
    Ok(VersionRegistry { entries })
}
