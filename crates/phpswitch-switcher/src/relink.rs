use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use phpswitch_core::{InstallLayout, LinkKind, LinkMutationError, LinkStep};
use tracing::{debug, info};

use crate::ProgressEvent;

/// Creates a directory redirect at `link` pointing to `target`.
pub(crate) type LinkCreator = Arc<dyn Fn(&Path, &Path) -> io::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RelinkOutcome {
    Skipped,
    Linked { backup: Option<PathBuf> },
}

pub(crate) fn default_link_creator() -> LinkCreator {
    Arc::new(create_dir_redirect)
}

pub(crate) fn create_dir_redirect(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_dir(target, link)
    }
}

/// Removes the redirect itself, never what it points at.
pub(crate) fn remove_redirect(link: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        // Directory symlinks are directories to the Win32 API.
        fs::remove_dir(link).or_else(|_| fs::remove_file(link))
    }

    #[cfg(not(windows))]
    {
        fs::remove_file(link)
    }
}

/// Repoints one stable path at `target`.
///
/// An existing redirect is removed; an existing ordinary directory is moved
/// to the backup path, and an already present backup is never overwritten.
pub(crate) fn relink_stable_path(
    layout: &InstallLayout,
    kind: LinkKind,
    target: Option<&Path>,
    create_link: &LinkCreator,
    emit: &mut dyn FnMut(ProgressEvent),
) -> Result<RelinkOutcome, LinkMutationError> {
    let stable = layout.stable_path(kind);
    let Some(target) = target else {
        debug!(kind = %kind, path = %stable.display(), "no target for link, skipping");
        emit(ProgressEvent::LinkSkipped { kind, path: stable });
        return Ok(RelinkOutcome::Skipped);
    };

    let mut backup = None;
    match fs::symlink_metadata(&stable) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            remove_redirect(&stable)
                .map_err(|err| LinkMutationError::new(kind, &stable, LinkStep::RemoveLink, &err))?;
            info!(kind = %kind, path = %stable.display(), "removed existing link");
            emit(ProgressEvent::LinkRemoved {
                kind,
                path: stable.clone(),
            });
        }
        Ok(_) => {
            let backup_path = layout.backup_path(kind);
            if fs::symlink_metadata(&backup_path).is_ok() {
                let err = io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!(
                        "backup path already exists, refusing to overwrite: {}",
                        backup_path.display()
                    ),
                );
                return Err(LinkMutationError::new(kind, &stable, LinkStep::Backup, &err));
            }
            fs::rename(&stable, &backup_path)
                .map_err(|err| LinkMutationError::new(kind, &stable, LinkStep::Backup, &err))?;
            info!(
                kind = %kind,
                from = %stable.display(),
                to = %backup_path.display(),
                "moved unmigrated directory aside"
            );
            emit(ProgressEvent::BackupCreated {
                kind,
                from: stable.clone(),
                to: backup_path.clone(),
            });
            backup = Some(backup_path);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(LinkMutationError::new(kind, &stable, LinkStep::Inspect, &err));
        }
    }

    create_link(target, &stable)
        .map_err(|err| LinkMutationError::new(kind, &stable, LinkStep::CreateLink, &err))?;
    info!(kind = %kind, path = %stable.display(), target = %target.display(), "created link");
    emit(ProgressEvent::LinkCreated {
        kind,
        path: stable,
        target: target.to_path_buf(),
    });

    Ok(RelinkOutcome::Linked { backup })
}
