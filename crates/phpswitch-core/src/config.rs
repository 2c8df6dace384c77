use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::InstallLayout;

const DEFAULT_INTERPRETER_PREFIX: &str = "php";
const DEFAULT_SERVER_PREFIX: &str = "apache";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,
    #[serde(default = "default_interpreter_prefix")]
    pub interpreter_prefix: String,
    #[serde(default = "default_server_prefix")]
    pub server_prefix: String,
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Stop/start commands. Unset entries fall back to the XAMPP control scripts
/// under the installation root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<ServiceCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<ServiceCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ServiceCommand {
    pub fn new(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            interpreter_prefix: default_interpreter_prefix(),
            server_prefix: default_server_prefix(),
            service: ServiceConfig::default(),
        }
    }
}

impl SwitchConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse phpswitch config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Like [`SwitchConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to inspect config: {}", path.display()))
            }
        }
    }

    pub fn with_install_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.install_root = root.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (label, prefix) in [
            ("interpreter_prefix", &self.interpreter_prefix),
            ("server_prefix", &self.server_prefix),
        ] {
            if prefix.trim().is_empty() {
                return Err(anyhow!("{label} must not be empty"));
            }
            if prefix.contains(|ch: char| ch == '/' || ch == '\\') {
                return Err(anyhow!("{label} must not contain path separators: {prefix}"));
            }
        }
        if self.interpreter_prefix == self.server_prefix {
            return Err(anyhow!(
                "interpreter_prefix and server_prefix must differ (both '{}')",
                self.interpreter_prefix
            ));
        }
        for (label, command) in [("stop", &self.service.stop), ("start", &self.service.start)] {
            if let Some(command) = command {
                if command.program.as_os_str().is_empty() {
                    return Err(anyhow!("service.{label}.program must not be empty"));
                }
            }
        }
        Ok(())
    }

    pub fn layout(&self) -> InstallLayout {
        InstallLayout::new(
            self.install_root.clone(),
            self.interpreter_prefix.clone(),
            self.server_prefix.clone(),
        )
    }

    pub fn stop_command(&self) -> ServiceCommand {
        self.service
            .stop
            .clone()
            .unwrap_or_else(|| default_service_command(&self.install_root, "stop"))
    }

    pub fn start_command(&self) -> ServiceCommand {
        self.service
            .start
            .clone()
            .unwrap_or_else(|| default_service_command(&self.install_root, "start"))
    }

    /// Effective configuration, with service defaults spelled out.
    pub fn to_toml_string(&self) -> Result<String> {
        let mut effective = self.clone();
        effective.service.stop = Some(self.stop_command());
        effective.service.start = Some(self.start_command());
        toml::to_string_pretty(&effective).context("failed to serialize phpswitch config")
    }
}

fn default_service_command(root: &Path, action: &str) -> ServiceCommand {
    if cfg!(windows) {
        ServiceCommand::new(root.join(format!("xampp_{action}.exe")), &[])
    } else {
        ServiceCommand::new(root.join("lampp"), &[&format!("{action}apache")])
    }
}

pub fn default_install_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\xampp")
    } else {
        PathBuf::from("/opt/lampp")
    }
}

fn default_interpreter_prefix() -> String {
    DEFAULT_INTERPRETER_PREFIX.to_string()
}

fn default_server_prefix() -> String {
    DEFAULT_SERVER_PREFIX.to_string()
}

pub fn default_config_path() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("APPDATA")
            .context("APPDATA is not set; cannot resolve Windows config path")?;
        return Ok(PathBuf::from(app_data).join("phpswitch").join("config.toml"));
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !config_home.trim().is_empty() {
            return Ok(PathBuf::from(config_home).join("phpswitch").join("config.toml"));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set; cannot resolve config path")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("phpswitch")
        .join("config.toml"))
}
