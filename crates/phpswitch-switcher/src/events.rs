use std::fmt;
use std::path::PathBuf;

use phpswitch_core::{LinkKind, LinkMutationError, ServiceControlWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    StoppingService,
    Relinking,
    StartingService,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoppingService => "stopping service",
            Self::Relinking => "relinking",
            Self::StartingService => "starting service",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the progress stream. Every run ends with exactly one
/// terminal event: [`ProgressEvent::Completed`] or [`ProgressEvent::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        version: String,
    },
    StageStarted(Stage),
    /// The stage ran to its end; warnings may precede it. Not sent for a
    /// relink stage that aborted, which ends with `RelinkFailed` instead.
    StageFinished(Stage),
    ServiceWarning(ServiceControlWarning),
    LinkSkipped {
        kind: LinkKind,
        path: PathBuf,
    },
    LinkRemoved {
        kind: LinkKind,
        path: PathBuf,
    },
    BackupCreated {
        kind: LinkKind,
        from: PathBuf,
        to: PathBuf,
    },
    LinkCreated {
        kind: LinkKind,
        path: PathBuf,
        target: PathBuf,
    },
    RelinkFailed(LinkMutationError),
    Completed,
    Failed(LinkMutationError),
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ServiceWarning(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::RelinkFailed(_) | Self::Failed(_))
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { version } => write!(f, "switching to version {version}"),
            Self::StageStarted(stage) => write!(f, "{stage}"),
            Self::StageFinished(stage) => write!(f, "{stage} done"),
            Self::ServiceWarning(warning) => write!(f, "{warning}"),
            Self::LinkSkipped { kind, path } => {
                write!(f, "{kind} link left untouched: {}", path.display())
            }
            Self::LinkRemoved { kind, path } => {
                write!(f, "removed {kind} link {}", path.display())
            }
            Self::BackupCreated { kind, from, to } => write!(
                f,
                "moved {kind} directory {} to {}",
                from.display(),
                to.display()
            ),
            Self::LinkCreated { kind, path, target } => write!(
                f,
                "linked {kind} {} -> {}",
                path.display(),
                target.display()
            ),
            Self::RelinkFailed(err) => write!(f, "relink aborted: {err}"),
            Self::Completed => f.write_str("completed"),
            Self::Failed(err) => write!(f, "switch failed: {err}"),
        }
    }
}
