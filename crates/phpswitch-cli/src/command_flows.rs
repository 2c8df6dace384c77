use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use phpswitch_core::{default_config_path, InstallLayout, LinkKind, LinkSelection, SwitchConfig};
use phpswitch_registry::VersionEntry;
use phpswitch_resolver::{CurrentState, LinkState, ResolvedTarget};
use phpswitch_switcher::{
    clear_stale_lock, read_lock_marker, NoopServiceControl, Session, SwitchReport,
};
use serde::Serialize;
use tracing::debug;

use crate::render::{active_marker, format_elapsed, OutputStyle, TerminalRenderer};

/// Loads the config file and applies command-line overrides.
///
/// An explicitly named file must exist; the default location may be absent.
pub(crate) fn load_config(config_path: Option<&Path>, root: Option<&Path>) -> Result<SwitchConfig> {
    let config = match config_path {
        Some(path) => SwitchConfig::load(path)?,
        None => {
            let path = default_config_path()?;
            debug!(path = %path.display(), "loading default config");
            SwitchConfig::load_or_default(&path)?
        }
    };
    let config = match root {
        Some(root) => config.with_install_root(root),
        None => config,
    };
    config.validate()?;
    Ok(config)
}

pub(crate) fn open_session(config: SwitchConfig, skip_service: bool) -> Result<Session> {
    let root = config.install_root.clone();
    let session = if skip_service {
        Session::with_service(config, Arc::new(NoopServiceControl))
    } else {
        Session::open(config)
    };
    session.with_context(|| format!("failed to open installation: {}", root.display()))
}

pub(crate) fn format_version_lines(
    layout: &InstallLayout,
    versions: &[&VersionEntry],
    state: &CurrentState,
    style: OutputStyle,
) -> Vec<String> {
    if versions.is_empty() {
        return vec![format!(
            "no versions installed under {}",
            layout.root().display()
        )];
    }

    let active = state.active_version();
    versions
        .iter()
        .map(|entry| {
            if active == Some(entry.id.as_str()) {
                format!("{} {} (active)", active_marker(style), entry.id)
            } else {
                format!("  {}", entry.id)
            }
        })
        .collect()
}

#[derive(Serialize)]
struct VersionJson<'a> {
    id: &'a str,
    interpreter_dir: &'a Path,
    server_dir: &'a Path,
    active: bool,
}

#[derive(Serialize)]
struct VersionListJson<'a> {
    install_root: &'a Path,
    active_version: Option<&'a str>,
    versions: Vec<VersionJson<'a>>,
}

pub(crate) fn render_version_list_json(
    layout: &InstallLayout,
    versions: &[&VersionEntry],
    state: &CurrentState,
) -> Result<String> {
    let active_version = state.active_version();
    let payload = VersionListJson {
        install_root: layout.root(),
        active_version,
        versions: versions
            .iter()
            .map(|entry| VersionJson {
                id: &entry.id,
                interpreter_dir: &entry.interpreter_dir,
                server_dir: &entry.server_dir,
                active: active_version == Some(entry.id.as_str()),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&payload).context("failed to serialize version list")
}

pub(crate) fn format_current_lines(state: &CurrentState) -> Vec<String> {
    let mut lines: Vec<String> = LinkKind::ALL
        .into_iter()
        .map(|kind| format_link_state_line(state.get(kind)))
        .collect();
    lines.push(match state.active_version() {
        Some(version) => format!("active: {version}"),
        None => "active: none (links disagree or are not set)".to_string(),
    });
    lines
}

fn format_link_state_line(link: &LinkState) -> String {
    match &link.target {
        ResolvedTarget::RedirectsTo(target) => format!(
            "{}: {} ({} -> {})",
            link.kind,
            link.version_label(),
            link.stable_path.display(),
            target.display()
        ),
        ResolvedTarget::Unknown => format!(
            "{}: {} ({} is not a link)",
            link.kind,
            link.version_label(),
            link.stable_path.display()
        ),
    }
}

#[derive(Serialize)]
struct CurrentStateJson<'a> {
    active_version: Option<&'a str>,
    interpreter: &'a LinkState,
    server: &'a LinkState,
}

pub(crate) fn render_current_state_json(state: &CurrentState) -> Result<String> {
    let payload = CurrentStateJson {
        active_version: state.active_version(),
        interpreter: &state.interpreter,
        server: &state.server,
    };
    serde_json::to_string_pretty(&payload).context("failed to serialize current state")
}

/// Runs one switch to completion, streaming every event to the terminal.
pub(crate) fn run_switch_command(
    session: &Session,
    version: &str,
    selection: LinkSelection,
    renderer: TerminalRenderer,
) -> Result<SwitchReport> {
    let handle = session.switch_with(version, selection)?;
    let progress = renderer.start_switch_progress(version);
    let report = handle.wait_with(|event| progress.observe(event))?;
    let elapsed = progress.finish();

    if let Some(err) = &report.error {
        return Err(anyhow::Error::new(err.clone()).context(format!("switch to {version} failed")));
    }
    renderer.print_status(
        "ok",
        &format_switch_summary_line(&report, &format_elapsed(elapsed)),
    );
    Ok(report)
}

pub(crate) fn format_switch_summary_line(report: &SwitchReport, elapsed: &str) -> String {
    let mut line = format!(
        "switched to {} (links={} backups={} warnings={}) in {elapsed}",
        report.version,
        report.relinked.len(),
        report.backups.len(),
        report.warnings.len()
    );
    if !report.warnings.is_empty() {
        line.push_str("; check the service manually");
    }
    line
}

pub(crate) fn run_unlock_command(layout: &InstallLayout) -> Result<String> {
    let lock_path = layout.lock_path();
    let owner = read_lock_marker(layout)
        .with_context(|| format!("failed to read lock marker: {}", lock_path.display()))?;
    let removed = clear_stale_lock(layout)
        .with_context(|| format!("failed to remove lock marker: {}", lock_path.display()))?;
    Ok(match (removed, owner) {
        (true, Some(owner)) => format!("removed stale lock ({owner})"),
        (true, None) => "removed stale lock".to_string(),
        (false, _) => format!("no lock present at {}", lock_path.display()),
    })
}

pub(crate) fn run_config_command(config: &SwitchConfig) -> Result<String> {
    config.to_toml_string()
}
