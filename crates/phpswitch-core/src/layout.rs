use std::path::{Path, PathBuf};

use crate::LinkKind;

/// Paths derived from the installation root and the two directory prefixes.
///
/// The root is made absolute on construction; link targets are built from it
/// and a relative target would resolve against the link's own directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    interpreter_prefix: String,
    server_prefix: String,
}

impl InstallLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        interpreter_prefix: impl Into<String>,
        server_prefix: impl Into<String>,
    ) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root,
            interpreter_prefix: interpreter_prefix.into(),
            server_prefix: server_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix(&self, kind: LinkKind) -> &str {
        match kind {
            LinkKind::Interpreter => &self.interpreter_prefix,
            LinkKind::Server => &self.server_prefix,
        }
    }

    pub fn interpreter_prefix(&self) -> &str {
        &self.interpreter_prefix
    }

    pub fn server_prefix(&self) -> &str {
        &self.server_prefix
    }

    /// `root/<prefix>`: the path consumers rely on.
    pub fn stable_path(&self, kind: LinkKind) -> PathBuf {
        self.root.join(self.prefix(kind))
    }

    /// `root/<prefix>_backup`: where a legacy real directory is parked.
    pub fn backup_path(&self, kind: LinkKind) -> PathBuf {
        self.root.join(format!("{}_backup", self.prefix(kind)))
    }

    /// `root/<prefix><version>`
    pub fn version_dir(&self, kind: LinkKind, version: &str) -> PathBuf {
        self.root.join(format!("{}{version}", self.prefix(kind)))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".phpswitch.lock")
    }

    pub fn ensure_root_exists(&self) -> Result<(), crate::NotFoundError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(crate::NotFoundError::InstallRoot(self.root.clone()))
        }
    }
}
