use std::fs;
use std::path::Path;

use phpswitch_core::{parse_version_suffix, InstallLayout, LinkKind};
use tracing::debug;

mod types;

pub use types::{CurrentState, LinkState, ResolvedTarget};

/// Reads the immediate redirect target of `stable_path`.
///
/// Inspection failures degrade to [`ResolvedTarget::Unknown`] so that state
/// display never blocks on a broken path.
pub fn current_target(stable_path: &Path) -> ResolvedTarget {
    let metadata = match fs::symlink_metadata(stable_path) {
        Ok(metadata) => metadata,
        Err(err) => {
            debug!(path = %stable_path.display(), error = %err, "stable path not inspectable");
            return ResolvedTarget::Unknown;
        }
    };
    if !metadata.file_type().is_symlink() {
        return ResolvedTarget::Unknown;
    }

    match fs::read_link(stable_path) {
        Ok(target) => ResolvedTarget::RedirectsTo(target),
        Err(err) => {
            debug!(path = %stable_path.display(), error = %err, "failed to read link");
            ResolvedTarget::Unknown
        }
    }
}

/// Version id encoded in the last component of `target`, e.g. `8.1` for
/// `.../php8.1` with prefix `php`.
pub fn infer_version(target: &Path, prefix: &str) -> Option<String> {
    let name = target.file_name()?.to_str()?;
    parse_version_suffix(name, prefix).map(str::to_string)
}

pub fn link_state(layout: &InstallLayout, kind: LinkKind) -> LinkState {
    let stable_path = layout.stable_path(kind);
    let target = current_target(&stable_path);
    let version = target
        .target()
        .and_then(|target| infer_version(target, layout.prefix(kind)));
    LinkState {
        kind,
        stable_path,
        target,
        version,
    }
}

pub fn current_state(layout: &InstallLayout) -> CurrentState {
    CurrentState {
        interpreter: link_state(layout, LinkKind::Interpreter),
        server: link_state(layout, LinkKind::Server),
    }
}
