use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use phpswitch_core::{
    InstallLayout, LinkKind, LinkSelection, LinkStep, NotFoundError, ServiceAction,
    ServiceControlWarning, SwitchConfig, SwitchError,
};
use phpswitch_registry::scan;
use tempfile::TempDir;

use super::*;

#[derive(Default)]
struct RecordingService {
    calls: Mutex<Vec<ServiceAction>>,
    fail_stop: bool,
    fail_start: bool,
    stop_gate: Option<Mutex<mpsc::Receiver<()>>>,
}

impl RecordingService {
    fn calls(&self) -> Vec<ServiceAction> {
        self.calls.lock().expect("calls lock must not be poisoned").clone()
    }

    fn record(&self, action: ServiceAction, fail: bool) -> Result<(), ServiceControlWarning> {
        self.calls
            .lock()
            .expect("calls lock must not be poisoned")
            .push(action);
        if fail {
            return Err(ServiceControlWarning {
                action,
                detail: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

impl ServiceControl for RecordingService {
    fn stop(&self) -> Result<(), ServiceControlWarning> {
        if let Some(gate) = &self.stop_gate {
            let _ = gate.lock().expect("gate lock must not be poisoned").recv();
        }
        self.record(ServiceAction::Stop, self.fail_stop)
    }

    fn start(&self) -> Result<(), ServiceControlWarning> {
        self.record(ServiceAction::Start, self.fail_start)
    }
}

fn install_root(dirs: &[&str]) -> (TempDir, SwitchConfig) {
    let root = tempfile::tempdir().expect("must create temp root");
    for dir in dirs {
        fs::create_dir_all(root.path().join(dir)).expect("must create dir");
    }
    let config = SwitchConfig::default().with_install_root(root.path());
    (root, config)
}

fn standard_root() -> (TempDir, SwitchConfig) {
    install_root(&["php7.4", "apache7.4", "php8.1", "apache8.1"])
}

fn plan_for(layout: &InstallLayout, version: &str, selection: LinkSelection) -> SwitchPlan {
    let registry = scan(layout).expect("scan must succeed");
    let entry = registry.get(version).expect("version must be installed");
    SwitchPlan::from_entry(entry, selection)
}

// Stands in for a directory redirect so runs are portable.
fn create_placeholder_dir(_target: &Path, link: &Path) -> io::Result<()> {
    fs::create_dir(link)
}

fn collect(handle: SwitchHandle) -> (Vec<ProgressEvent>, SwitchReport) {
    let mut events = Vec::new();
    let report = handle
        .wait_with(|event| events.push(event.clone()))
        .expect("worker must not panic");
    (events, report)
}

fn stage_positions(events: &[ProgressEvent]) -> Vec<usize> {
    [Stage::StoppingService, Stage::Relinking, Stage::StartingService]
        .into_iter()
        .map(|stage| {
            events
                .iter()
                .position(|event| event == &ProgressEvent::StageStarted(stage))
                .expect("every stage must be announced")
        })
        .collect()
}

#[cfg(unix)]
#[test]
fn switch_moves_unmigrated_directory_aside_and_links_version() {
    let (root, config) = standard_root();
    fs::create_dir(root.path().join("php")).expect("must create legacy php dir");
    fs::write(root.path().join("php").join("marker.txt"), b"legacy").expect("must write marker");
    fs::create_dir(root.path().join("apache")).expect("must create legacy apache dir");

    let service = Arc::new(RecordingService::default());
    let session = Session::with_service(config, service.clone()).expect("session must open");
    let (events, report) = collect(session.switch("8.1").expect("switch must start"));

    assert_eq!(events.last(), Some(&ProgressEvent::Completed));
    assert!(report.is_success());
    assert_eq!(report.relinked, vec![LinkKind::Interpreter, LinkKind::Server]);
    assert_eq!(
        report.backups,
        vec![root.path().join("php_backup"), root.path().join("apache_backup")]
    );

    let marker = fs::read_to_string(root.path().join("php_backup").join("marker.txt"))
        .expect("marker must survive in backup");
    assert_eq!(marker, "legacy");
    assert_eq!(
        fs::read_link(root.path().join("php")).expect("php must be a link"),
        root.path().join("php8.1")
    );
    assert_eq!(
        fs::read_link(root.path().join("apache")).expect("apache must be a link"),
        root.path().join("apache8.1")
    );
    assert!(events.contains(&ProgressEvent::BackupCreated {
        kind: LinkKind::Interpreter,
        from: root.path().join("php"),
        to: root.path().join("php_backup"),
    }));
    assert_eq!(service.calls(), vec![ServiceAction::Stop, ServiceAction::Start]);
}

#[cfg(unix)]
#[test]
fn switch_with_relative_root_creates_resolvable_links() {
    let cwd = std::env::current_dir().expect("must read cwd");
    let root = tempfile::Builder::new()
        .prefix("phpswitch-relative-root")
        .tempdir_in(&cwd)
        .expect("must create root under cwd");
    for dir in ["php8.1", "apache8.1"] {
        fs::create_dir(root.path().join(dir)).expect("must create version dir");
    }
    let relative = root
        .path()
        .strip_prefix(&cwd)
        .expect("root must live under cwd")
        .to_path_buf();
    assert!(relative.is_relative());

    let config = SwitchConfig::default().with_install_root(&relative);
    let session = Session::with_service(config, Arc::new(NoopServiceControl))
        .expect("session must open");
    let entry = session.registry().get("8.1").expect("8.1 must be installed");
    assert!(entry.interpreter_dir.is_absolute());

    let (events, report) = collect(session.switch("8.1").expect("switch must start"));
    assert_eq!(events.last(), Some(&ProgressEvent::Completed));
    assert!(report.is_success());

    for (stable, version_dir) in [("php", "php8.1"), ("apache", "apache8.1")] {
        let link = relative.join(stable);
        let target = fs::read_link(&link).expect("stable path must be a link");
        assert!(target.is_absolute(), "link target must be absolute: {}", target.display());
        assert!(link.is_dir(), "link must resolve to a directory");
        assert_eq!(target, cwd.join(&relative).join(version_dir));
    }
}

#[cfg(unix)]
#[test]
fn switch_replaces_existing_link_without_touching_old_target() {
    let (root, config) = standard_root();
    fs::write(root.path().join("php7.4").join("php.ini"), b"old").expect("must write ini");
    std::os::unix::fs::symlink(root.path().join("php7.4"), root.path().join("php"))
        .expect("must create php link");
    std::os::unix::fs::symlink(root.path().join("apache7.4"), root.path().join("apache"))
        .expect("must create apache link");

    let mut session = Session::with_service(config, Arc::new(NoopServiceControl))
        .expect("session must open");
    assert_eq!(session.current_state().active_version(), Some("7.4"));

    let (events, report) = collect(session.switch("8.1").expect("switch must start"));
    assert!(report.is_success());
    assert!(report.backups.is_empty());
    assert!(events.contains(&ProgressEvent::LinkRemoved {
        kind: LinkKind::Interpreter,
        path: root.path().join("php"),
    }));
    assert_eq!(
        fs::read_to_string(root.path().join("php7.4").join("php.ini"))
            .expect("old target must be intact"),
        "old"
    );

    session.reload().expect("reload must succeed");
    assert_eq!(session.current_state().active_version(), Some("8.1"));
    assert_eq!(session.current_state().interpreter.version_label(), "8.1");
}

#[test]
fn unknown_version_is_rejected_before_any_action() {
    let (root, config) = standard_root();
    let service = Arc::new(RecordingService::default());
    let session = Session::with_service(config, service.clone()).expect("session must open");

    let err = session
        .switch("9.9")
        .expect_err("unknown version must be rejected");
    assert!(matches!(
        err,
        SwitchError::NotFound(NotFoundError::Version(ref id)) if id == "9.9"
    ));
    assert!(service.calls().is_empty());
    assert!(!root.path().join("php").exists());
    assert!(!root.path().join(".phpswitch.lock").exists());
}

#[test]
fn missing_target_directory_fails_preflight() {
    let (root, config) = standard_root();
    let service = Arc::new(RecordingService::default());
    let orchestrator = SwitchOrchestrator::new(config.layout(), service.clone());

    let plan = SwitchPlan {
        version: "9.0".to_string(),
        interpreter: Some(root.path().join("php9.0")),
        server: Some(root.path().join("apache9.0")),
    };
    let err = orchestrator
        .switch(plan)
        .expect_err("missing directory must be rejected");
    assert!(matches!(
        err,
        SwitchError::NotFound(NotFoundError::VersionDir {
            kind: LinkKind::Interpreter,
            ..
        })
    ));
    assert!(service.calls().is_empty());
}

#[test]
fn missing_root_fails_preflight() {
    let (root, config) = standard_root();
    let layout = config.layout();
    let plan = plan_for(&layout, "8.1", LinkSelection::Both);
    drop(root);

    let orchestrator = SwitchOrchestrator::new(layout, Arc::new(NoopServiceControl));
    let err = orchestrator
        .switch(plan)
        .expect_err("missing root must be rejected");
    assert!(matches!(
        err,
        SwitchError::NotFound(NotFoundError::InstallRoot(_))
    ));
}

#[test]
fn stop_failure_is_a_warning_and_run_completes() {
    let (root, config) = standard_root();
    let service = Arc::new(RecordingService {
        fail_stop: true,
        ..RecordingService::default()
    });
    let layout = config.layout();
    let orchestrator = SwitchOrchestrator::new(layout.clone(), service.clone())
        .with_link_creator(create_placeholder_dir);

    let handle = orchestrator
        .switch(plan_for(&layout, "8.1", LinkSelection::Both))
        .expect("switch must start");
    let (events, report) = collect(handle);

    assert_eq!(
        events.first(),
        Some(&ProgressEvent::Started {
            version: "8.1".to_string()
        })
    );
    assert_eq!(events.last(), Some(&ProgressEvent::Completed));
    assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
    assert_eq!(events.iter().filter(|event| event.is_warning()).count(), 1);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].action, ServiceAction::Stop);
    assert!(report.is_success());
    assert!(root.path().join("php").is_dir());
    assert!(root.path().join("apache").is_dir());
    assert_eq!(service.calls(), vec![ServiceAction::Stop, ServiceAction::Start]);
}

#[test]
fn stages_are_announced_in_order() {
    let (_root, config) = standard_root();
    let layout = config.layout();
    let orchestrator = SwitchOrchestrator::new(layout.clone(), Arc::new(NoopServiceControl))
        .with_link_creator(create_placeholder_dir);

    let (events, _report) = collect(
        orchestrator
            .switch(plan_for(&layout, "7.4", LinkSelection::Both))
            .expect("switch must start"),
    );

    let positions = stage_positions(&events);
    assert!(positions[0] < positions[1] && positions[1] < positions[2]);
    let finished: Vec<usize> = [Stage::StoppingService, Stage::Relinking, Stage::StartingService]
        .into_iter()
        .map(|stage| {
            events
                .iter()
                .position(|event| event == &ProgressEvent::StageFinished(stage))
                .expect("every stage must report completion")
        })
        .collect();
    assert!(positions[0] < finished[0] && finished[0] < positions[1]);
    assert!(positions[1] < finished[1] && finished[1] < positions[2]);
    assert!(positions[2] < finished[2]);
    assert_eq!(
        events[events.len() - 2],
        ProgressEvent::StageFinished(Stage::StartingService)
    );
    let created: Vec<LinkKind> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::LinkCreated { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(created, vec![LinkKind::Interpreter, LinkKind::Server]);
}

#[test]
fn server_link_failure_still_starts_service_and_fails_run() {
    let (root, config) = standard_root();
    let service = Arc::new(RecordingService::default());
    let layout = config.layout();
    let orchestrator = SwitchOrchestrator::new(layout.clone(), service.clone())
        .with_link_creator(|target: &Path, link: &Path| {
            if link.ends_with("apache") {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            create_placeholder_dir(target, link)
        });

    let (events, report) = collect(
        orchestrator
            .switch(plan_for(&layout, "8.1", LinkSelection::Both))
            .expect("switch must start"),
    );

    let failure = events
        .iter()
        .find_map(|event| match event {
            ProgressEvent::RelinkFailed(err) => Some(err.clone()),
            _ => None,
        })
        .expect("relink failure must be reported");
    assert_eq!(failure.kind, LinkKind::Server);
    assert_eq!(failure.path, root.path().join("apache"));
    assert_eq!(failure.step, LinkStep::CreateLink);
    assert!(failure.to_string().contains("apache"));

    let failed_at = events
        .iter()
        .position(|event| matches!(event, ProgressEvent::RelinkFailed(_)))
        .expect("relink failure must be present");
    assert!(failed_at < stage_positions(&events)[2]);
    assert!(!events.contains(&ProgressEvent::StageFinished(Stage::Relinking)));
    assert!(events.contains(&ProgressEvent::StageFinished(Stage::StartingService)));
    assert_eq!(events.last(), Some(&ProgressEvent::Failed(failure.clone())));
    assert_eq!(service.calls(), vec![ServiceAction::Stop, ServiceAction::Start]);

    assert_eq!(report.relinked, vec![LinkKind::Interpreter]);
    assert_eq!(report.error, Some(failure));
    assert!(root.path().join("php").is_dir(), "interpreter relink is not rolled back");
}

#[test]
fn existing_backup_is_never_overwritten() {
    let (root, config) = standard_root();
    fs::create_dir(root.path().join("php")).expect("must create legacy php dir");
    fs::write(root.path().join("php").join("marker.txt"), b"current").expect("must write marker");
    fs::create_dir(root.path().join("php_backup")).expect("must create old backup");
    fs::write(root.path().join("php_backup").join("marker.txt"), b"older")
        .expect("must write old marker");

    let service = Arc::new(RecordingService::default());
    let layout = config.layout();
    let orchestrator = SwitchOrchestrator::new(layout.clone(), service.clone())
        .with_link_creator(create_placeholder_dir);
    let (events, report) = collect(
        orchestrator
            .switch(plan_for(&layout, "8.1", LinkSelection::Both))
            .expect("switch must start"),
    );

    let err = report.error.expect("run must fail");
    assert_eq!(err.kind, LinkKind::Interpreter);
    assert_eq!(err.step, LinkStep::Backup);
    assert!(matches!(events.last(), Some(ProgressEvent::Failed(_))));
    assert!(report.relinked.is_empty());

    assert_eq!(
        fs::read_to_string(root.path().join("php").join("marker.txt"))
            .expect("stable dir must be intact"),
        "current"
    );
    assert_eq!(
        fs::read_to_string(root.path().join("php_backup").join("marker.txt"))
            .expect("old backup must be intact"),
        "older"
    );
    assert!(!root.path().join("apache").exists(), "server relink must be aborted");
    assert_eq!(service.calls(), vec![ServiceAction::Stop, ServiceAction::Start]);
}

#[test]
fn second_switch_while_running_is_busy() {
    let (root, config) = standard_root();
    let (release, gate) = mpsc::channel();
    let service = Arc::new(RecordingService {
        stop_gate: Some(Mutex::new(gate)),
        ..RecordingService::default()
    });
    let layout = config.layout();
    let orchestrator = SwitchOrchestrator::new(layout.clone(), service)
        .with_link_creator(create_placeholder_dir);
    let plan = plan_for(&layout, "8.1", LinkSelection::Both);

    let running = orchestrator.switch(plan.clone()).expect("first switch must start");
    assert!(root.path().join(".phpswitch.lock").exists());

    let err = orchestrator
        .clone()
        .switch(plan)
        .expect_err("second switch must be rejected");
    assert!(matches!(err, SwitchError::Busy { .. }));

    release.send(()).expect("gate must be open");
    let report = running.join().expect("worker must not panic");
    assert!(report.is_success());
    assert!(!root.path().join(".phpswitch.lock").exists());
    assert_eq!(read_lock_marker(&layout).expect("lock must be readable"), None);
}

#[test]
fn foreign_lock_marker_is_busy_until_cleared() {
    let (root, config) = standard_root();
    let layout = config.layout();
    fs::write(layout.lock_path(), "pid=42 version=7.4\n").expect("must write marker");

    let service = Arc::new(RecordingService::default());
    let orchestrator = SwitchOrchestrator::new(layout.clone(), service.clone())
        .with_link_creator(create_placeholder_dir);
    let plan = plan_for(&layout, "8.1", LinkSelection::Both);

    let err = orchestrator
        .switch(plan.clone())
        .expect_err("held lock must be rejected");
    assert!(err.to_string().contains("pid=42 version=7.4"));
    assert!(service.calls().is_empty());
    assert_eq!(
        read_lock_marker(&layout).expect("lock must be readable"),
        Some("pid=42 version=7.4".to_string())
    );

    assert!(clear_stale_lock(&layout).expect("clear must succeed"));
    assert!(!clear_stale_lock(&layout).expect("second clear must succeed"));

    let report = orchestrator
        .switch(plan)
        .expect("switch must start after unlock")
        .join()
        .expect("worker must not panic");
    assert!(report.is_success());
    assert!(root.path().join("php").is_dir());
}

#[test]
fn selection_leaves_unselected_link_untouched() {
    let (root, config) = standard_root();
    let layout = config.layout();
    let orchestrator = SwitchOrchestrator::new(layout.clone(), Arc::new(NoopServiceControl))
        .with_link_creator(create_placeholder_dir);

    let plan = plan_for(&layout, "8.1", LinkSelection::InterpreterOnly);
    assert_eq!(plan.target(LinkKind::Server), None);
    let (events, report) = collect(orchestrator.switch(plan).expect("switch must start"));

    assert!(report.is_success());
    assert_eq!(report.relinked, vec![LinkKind::Interpreter]);
    assert!(events.contains(&ProgressEvent::LinkSkipped {
        kind: LinkKind::Server,
        path: root.path().join("apache"),
    }));
    assert!(root.path().join("php").is_dir());
    assert!(!root.path().join("apache").exists());
}

#[test]
fn subscribers_receive_the_same_stream() {
    let (_root, config) = standard_root();
    let layout = config.layout();
    let orchestrator = SwitchOrchestrator::new(layout.clone(), Arc::new(NoopServiceControl))
        .with_link_creator(create_placeholder_dir);

    let listener = orchestrator.subscribe();
    let dropped = orchestrator.subscribe();
    drop(dropped);

    let (events, _report) = collect(
        orchestrator
            .switch(plan_for(&layout, "7.4", LinkSelection::Both))
            .expect("switch must start"),
    );
    let observed: Vec<ProgressEvent> = listener.iter().collect();
    assert_eq!(observed, events);
}

#[test]
fn session_lists_versions_and_picks_up_new_ones_on_reload() {
    let (root, config) = install_root(&["php8.1", "apache8.1", "php7.4", "apache7.4"]);
    let mut session =
        Session::with_service(config, Arc::new(NoopServiceControl)).expect("session must open");

    let ids: Vec<&str> = session
        .list_versions()
        .iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(ids, vec!["7.4", "8.1"]);
    assert_eq!(session.current_state().active_version(), None);

    fs::create_dir(root.path().join("php8.2")).expect("must create php8.2");
    fs::create_dir(root.path().join("apache8.2")).expect("must create apache8.2");
    assert!(session.switch("8.2").is_err(), "snapshot is not refreshed implicitly");

    session.reload().expect("reload must succeed");
    assert_eq!(session.registry().ids(), vec!["7.4", "8.1", "8.2"]);
}

#[test]
fn session_open_fails_for_missing_root() {
    let config = SwitchConfig::default().with_install_root(PathBuf::from("/definitely/not/here"));
    let err = Session::with_service(config, Arc::new(NoopServiceControl))
        .err()
        .expect("missing root must fail");
    assert!(matches!(
        err,
        SwitchError::NotFound(NotFoundError::InstallRoot(_))
    ));
}

#[test]
fn command_service_control_reports_spawn_failure_as_warning() {
    let control = CommandServiceControl::new(
        phpswitch_core::ServiceCommand::new("/definitely/not/here/xampp_stop", &[]),
        phpswitch_core::ServiceCommand::new("/definitely/not/here/xampp_start", &[]),
    );

    let warning = control.stop().expect_err("missing program must warn");
    assert_eq!(warning.action, ServiceAction::Stop);
    assert!(warning.detail.contains("xampp_stop"));
}

#[cfg(unix)]
#[test]
fn command_service_control_reports_nonzero_exit() {
    let control = CommandServiceControl::new(
        phpswitch_core::ServiceCommand::new("sh", &["-c", "echo stopping; echo nope >&2; exit 3"]),
        phpswitch_core::ServiceCommand::new("true", &[]),
    );

    let warning = control.stop().expect_err("non-zero exit must warn");
    assert!(warning.detail.contains("stdout='stopping'"));
    assert!(warning.detail.contains("stderr='nope'"));
    control.start().expect("true must succeed");
}

#[test]
fn event_messages_are_human_readable() {
    let event = ProgressEvent::LinkCreated {
        kind: LinkKind::Interpreter,
        path: PathBuf::from("/opt/lampp/php"),
        target: PathBuf::from("/opt/lampp/php8.1"),
    };
    assert_eq!(
        event.to_string(),
        "linked interpreter /opt/lampp/php -> /opt/lampp/php8.1"
    );
    assert_eq!(
        ProgressEvent::StageStarted(Stage::StoppingService).to_string(),
        "stopping service"
    );
    assert_eq!(
        ProgressEvent::StageFinished(Stage::StoppingService).to_string(),
        "stopping service done"
    );
    assert!(ProgressEvent::Completed.is_terminal());
    assert!(!ProgressEvent::StageStarted(Stage::Relinking).is_terminal());
}
