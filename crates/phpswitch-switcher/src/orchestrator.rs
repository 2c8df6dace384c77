use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use phpswitch_core::{
    InstallLayout, LinkKind, LinkMutationError, LinkSelection, NotFoundError,
    ServiceControlWarning, SwitchError,
};
use phpswitch_registry::VersionEntry;
use tracing::{info, warn};

use crate::lock::SwitchLock;
use crate::relink::{default_link_creator, relink_stable_path, LinkCreator, RelinkOutcome};
use crate::{ProgressEvent, ServiceControl, Stage};

/// Target directories for one switch. An unset target leaves that stable
/// path untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchPlan {
    pub version: String,
    pub interpreter: Option<PathBuf>,
    pub server: Option<PathBuf>,
}

impl SwitchPlan {
    pub fn from_entry(entry: &VersionEntry, selection: LinkSelection) -> Self {
        let pick = |kind: LinkKind| selection.includes(kind).then(|| entry.dir(kind).clone());
        Self {
            version: entry.id.clone(),
            interpreter: pick(LinkKind::Interpreter),
            server: pick(LinkKind::Server),
        }
    }

    pub fn target(&self, kind: LinkKind) -> Option<&Path> {
        match kind {
            LinkKind::Interpreter => self.interpreter.as_deref(),
            LinkKind::Server => self.server.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    pub version: String,
    pub relinked: Vec<LinkKind>,
    pub backups: Vec<PathBuf>,
    pub warnings: Vec<ServiceControlWarning>,
    pub error: Option<LinkMutationError>,
}

impl SwitchReport {
    fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            relinked: Vec::new(),
            backups: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A switch running in the background.
#[derive(Debug)]
pub struct SwitchHandle {
    events: Receiver<ProgressEvent>,
    worker: JoinHandle<SwitchReport>,
}

impl SwitchHandle {
    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    /// Waits for the run to finish, discarding any unread events.
    pub fn join(self) -> Result<SwitchReport, SwitchError> {
        drop(self.events);
        self.worker.join().map_err(|_| SwitchError::WorkerPanicked)
    }

    /// Feeds every event to `on_event` in order, then waits for the run.
    pub fn wait_with<F>(self, mut on_event: F) -> Result<SwitchReport, SwitchError>
    where
        F: FnMut(&ProgressEvent),
    {
        for event in self.events.iter() {
            on_event(&event);
        }
        self.worker.join().map_err(|_| SwitchError::WorkerPanicked)
    }
}

/// Fan-out to every attached listener. Sends never block; listeners that
/// went away are dropped.
struct ProgressEmitter {
    senders: Vec<Sender<ProgressEvent>>,
}

impl ProgressEmitter {
    fn emit(&mut self, event: ProgressEvent) {
        if event.is_error() {
            warn!(event = %event, "switch progress");
        } else {
            info!(event = %event, "switch progress");
        }
        self.senders.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

/// Stops the service, repoints the stable paths and starts the service again.
///
/// Clones share the single-flight flag, so at most one run is active per
/// orchestrator family; the on-disk lock extends that across processes.
#[derive(Clone)]
pub struct SwitchOrchestrator {
    layout: InstallLayout,
    service: Arc<dyn ServiceControl>,
    link_creator: LinkCreator,
    in_flight: Arc<AtomicBool>,
    pending_listeners: Arc<Mutex<Vec<Sender<ProgressEvent>>>>,
}

impl SwitchOrchestrator {
    pub fn new(layout: InstallLayout, service: Arc<dyn ServiceControl>) -> Self {
        Self {
            layout,
            service,
            link_creator: default_link_creator(),
            in_flight: Arc::new(AtomicBool::new(false)),
            pending_listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_link_creator<F>(mut self, creator: F) -> Self
    where
        F: Fn(&Path, &Path) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.link_creator = Arc::new(creator);
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Attaches an extra listener to the next run.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (sender, receiver) = mpsc::channel();
        self.pending_listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sender);
        receiver
    }

    /// Validates `plan` and starts the run on a background thread.
    ///
    /// Missing directories and a held lock are reported here, before the
    /// service or any link is touched.
    pub fn switch(&self, plan: SwitchPlan) -> Result<SwitchHandle, SwitchError> {
        self.layout.ensure_root_exists()?;
        for kind in LinkKind::ALL {
            if let Some(target) = plan.target(kind) {
                if !target.is_dir() {
                    return Err(NotFoundError::VersionDir {
                        version: plan.version.clone(),
                        kind,
                        path: target.to_path_buf(),
                    }
                    .into());
                }
            }
        }

        let lock = SwitchLock::claim(&self.layout, &self.in_flight, &plan.version)?;

        let (sender, events) = mpsc::channel();
        let mut senders = std::mem::take(
            &mut *self
                .pending_listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        senders.push(sender);
        let emitter = ProgressEmitter { senders };

        let layout = self.layout.clone();
        let service = Arc::clone(&self.service);
        let link_creator = Arc::clone(&self.link_creator);
        let worker = thread::Builder::new()
            .name("phpswitch-switch".to_string())
            .spawn(move || {
                run_switch(
                    &layout,
                    service.as_ref(),
                    &link_creator,
                    &plan,
                    lock,
                    emitter,
                )
            })
            .map_err(SwitchError::Spawn)?;

        Ok(SwitchHandle { events, worker })
    }
}

fn run_switch(
    layout: &InstallLayout,
    service: &dyn ServiceControl,
    link_creator: &LinkCreator,
    plan: &SwitchPlan,
    lock: SwitchLock,
    mut emitter: ProgressEmitter,
) -> SwitchReport {
    let mut report = SwitchReport::new(&plan.version);
    emitter.emit(ProgressEvent::Started {
        version: plan.version.clone(),
    });

    emitter.emit(ProgressEvent::StageStarted(Stage::StoppingService));
    if let Err(warning) = service.stop() {
        report.warnings.push(warning.clone());
        emitter.emit(ProgressEvent::ServiceWarning(warning));
    }
    emitter.emit(ProgressEvent::StageFinished(Stage::StoppingService));

    emitter.emit(ProgressEvent::StageStarted(Stage::Relinking));
    for kind in LinkKind::ALL {
        let outcome = relink_stable_path(
            layout,
            kind,
            plan.target(kind),
            link_creator,
            &mut |event: ProgressEvent| emitter.emit(event),
        );
        match outcome {
            Ok(RelinkOutcome::Skipped) => {}
            Ok(RelinkOutcome::Linked { backup }) => {
                report.relinked.push(kind);
                report.backups.extend(backup);
            }
            Err(err) => {
                emitter.emit(ProgressEvent::RelinkFailed(err.clone()));
                report.error = Some(err);
                break;
            }
        }
    }
    if report.error.is_none() {
        emitter.emit(ProgressEvent::StageFinished(Stage::Relinking));
    }

    // Runs even after a relink failure so the service is not left down.
    emitter.emit(ProgressEvent::StageStarted(Stage::StartingService));
    if let Err(warning) = service.start() {
        report.warnings.push(warning.clone());
        emitter.emit(ProgressEvent::ServiceWarning(warning));
    }
    emitter.emit(ProgressEvent::StageFinished(Stage::StartingService));

    drop(lock);
    match &report.error {
        None => emitter.emit(ProgressEvent::Completed),
        Some(err) => emitter.emit(ProgressEvent::Failed(err.clone())),
    }
    report
}
