use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::LinkKind;

/// A required directory is missing. Always raised before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("installation root not found: {}", .0.display())]
    InstallRoot(PathBuf),

    #[error("installation root is not readable: {}: {message}", path.display())]
    UnreadableRoot { path: PathBuf, message: String },

    #[error("version '{0}' is not installed")]
    Version(String),

    #[error("{kind} directory for version '{version}' not found: {}", path.display())]
    VersionDir {
        version: String,
        kind: LinkKind,
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStep {
    Inspect,
    RemoveLink,
    Backup,
    CreateLink,
}

impl LinkStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inspect => "inspect stable path",
            Self::RemoveLink => "remove existing link",
            Self::Backup => "back up existing directory",
            Self::CreateLink => "create link",
        }
    }
}

impl fmt::Display for LinkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem failure while repointing one stable path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to {step} for {kind} path {}: {message}", path.display())]
pub struct LinkMutationError {
    pub kind: LinkKind,
    pub path: PathBuf,
    pub step: LinkStep,
    pub message: String,
}

impl LinkMutationError {
    pub fn new(kind: LinkKind, path: impl Into<PathBuf>, step: LinkStep, err: &io::Error) -> Self {
        Self {
            kind,
            path: path.into(),
            step,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Stop,
    Start,
}

impl ServiceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Start => "start",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stop/start action failed. Recorded in the progress stream, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("service {action} failed: {detail}")]
pub struct ServiceControlWarning {
    pub action: ServiceAction,
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    LinkMutation(#[from] LinkMutationError),

    #[error("a version switch is already in progress{detail}")]
    Busy { detail: String },

    #[error("failed to manage switch lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("switch worker panicked")]
    WorkerPanicked,

    #[error("failed to spawn switch worker: {0}")]
    Spawn(#[source] io::Error),
}
