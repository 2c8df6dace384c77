use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use phpswitch_core::{InstallLayout, SwitchError};
use tracing::{debug, warn};

/// Single-flight guard for the stable paths.
///
/// Holds both the in-process flag and the on-disk marker; both are released
/// on drop.
#[derive(Debug)]
pub(crate) struct SwitchLock {
    path: PathBuf,
    in_flight: Arc<AtomicBool>,
}

impl SwitchLock {
    pub(crate) fn claim(
        layout: &InstallLayout,
        in_flight: &Arc<AtomicBool>,
        version: &str,
    ) -> Result<Self, SwitchError> {
        if in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SwitchError::Busy {
                detail: " in this process".to_string(),
            });
        }

        let path = layout.lock_path();
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                in_flight.store(false, Ordering::Release);
                let detail = read_lock_marker(layout)
                    .ok()
                    .flatten()
                    .map(|owner| format!(" ({owner}); run `phpswitch unlock` if it is stale"))
                    .unwrap_or_default();
                return Err(SwitchError::Busy { detail });
            }
            Err(source) => {
                in_flight.store(false, Ordering::Release);
                return Err(SwitchError::Lock { path, source });
            }
        };

        let marker = format!("pid={} version={version}\n", std::process::id());
        if let Err(source) = file.write_all(marker.as_bytes()).and_then(|()| file.flush()) {
            let _ = fs::remove_file(&path);
            in_flight.store(false, Ordering::Release);
            return Err(SwitchError::Lock { path, source });
        }

        debug!(path = %path.display(), version, "claimed switch lock");
        Ok(Self {
            path,
            in_flight: Arc::clone(in_flight),
        })
    }
}

impl Drop for SwitchLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove switch lock");
            }
        }
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Contents of the lock marker, if a switch holds it.
pub fn read_lock_marker(layout: &InstallLayout) -> io::Result<Option<String>> {
    let path = layout.lock_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let owner = raw.trim();
    if owner.is_empty() {
        return Ok(Some("unknown owner".to_string()));
    }
    Ok(Some(owner.to_string()))
}

/// Removes a marker left behind by an interrupted run. Returns whether one
/// was present.
pub fn clear_stale_lock(layout: &InstallLayout) -> io::Result<bool> {
    match fs::remove_file(layout.lock_path()) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
