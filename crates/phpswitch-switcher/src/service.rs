use std::ffi::OsStr;
use std::process::Command;

use phpswitch_core::{ServiceAction, ServiceCommand, ServiceControlWarning, SwitchConfig};
use tracing::debug;

/// Stop/start actions for the service that holds the stable paths open.
pub trait ServiceControl: Send + Sync {
    fn stop(&self) -> Result<(), ServiceControlWarning>;
    fn start(&self) -> Result<(), ServiceControlWarning>;
}

/// Runs external stop/start commands and waits for them to exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandServiceControl {
    stop: ServiceCommand,
    start: ServiceCommand,
}

impl CommandServiceControl {
    pub fn new(stop: ServiceCommand, start: ServiceCommand) -> Self {
        Self { stop, start }
    }

    pub fn from_config(config: &SwitchConfig) -> Self {
        Self::new(config.stop_command(), config.start_command())
    }

    pub fn stop_command(&self) -> &ServiceCommand {
        &self.stop
    }

    pub fn start_command(&self) -> &ServiceCommand {
        &self.start
    }
}

impl ServiceControl for CommandServiceControl {
    fn stop(&self) -> Result<(), ServiceControlWarning> {
        run_service_command(ServiceAction::Stop, &self.stop)
    }

    fn start(&self) -> Result<(), ServiceControlWarning> {
        run_service_command(ServiceAction::Start, &self.start)
    }
}

/// Leaves the service alone; used when the operator manages it separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopServiceControl;

impl ServiceControl for NoopServiceControl {
    fn stop(&self) -> Result<(), ServiceControlWarning> {
        Ok(())
    }

    fn start(&self) -> Result<(), ServiceControlWarning> {
        Ok(())
    }
}

/// Creates a Command that runs without a visible console window on Windows.
pub(crate) fn hidden_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

fn run_service_command(
    action: ServiceAction,
    command: &ServiceCommand,
) -> Result<(), ServiceControlWarning> {
    let line = command.display_line();
    let mut process = hidden_command(&command.program);
    process.args(&command.args);
    if let Some(parent) = command.program.parent().filter(|parent| parent.is_dir()) {
        process.current_dir(parent);
    }

    debug!(action = %action, command = %line, "running service command");
    let output = process.output().map_err(|err| ServiceControlWarning {
        action,
        detail: format!("{line}: command failed to start: {err}"),
    })?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(ServiceControlWarning {
        action,
        detail: format!(
            "{line}: status={} stdout='{}' stderr='{}'",
            output.status,
            stdout.trim(),
            stderr.trim()
        ),
    })
}
