use std::path::{Path, PathBuf};

use phpswitch_core::LinkKind;
use serde::Serialize;

/// What a stable path currently points at, one hop deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "target", rename_all = "snake_case")]
pub enum ResolvedTarget {
    RedirectsTo(PathBuf),
    /// Not a redirect, missing, or not inspectable.
    Unknown,
}

impl ResolvedTarget {
    pub fn target(&self) -> Option<&Path> {
        match self {
            Self::RedirectsTo(target) => Some(target),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkState {
    pub kind: LinkKind,
    pub stable_path: PathBuf,
    pub target: ResolvedTarget,
    pub version: Option<String>,
}

impl LinkState {
    pub fn version_label(&self) -> &str {
        self.version.as_deref().unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentState {
    pub interpreter: LinkState,
    pub server: LinkState,
}

impl CurrentState {
    pub fn get(&self, kind: LinkKind) -> &LinkState {
        match kind {
            LinkKind::Interpreter => &self.interpreter,
            LinkKind::Server => &self.server,
        }
    }

    /// The version both links agree on, if any.
    pub fn active_version(&self) -> Option<&str> {
        match (&self.interpreter.version, &self.server.version) {
            (Some(interpreter), Some(server)) if interpreter == server => Some(interpreter.as_str()),
            _ => None,
        }
    }
}
