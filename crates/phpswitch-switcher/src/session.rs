use std::sync::Arc;

use phpswitch_core::{InstallLayout, LinkSelection, NotFoundError, SwitchConfig, SwitchError};
use phpswitch_registry::{scan, VersionEntry, VersionRegistry};
use phpswitch_resolver::{current_state, CurrentState};
use tracing::debug;

use crate::{
    CommandServiceControl, ServiceControl, SwitchHandle, SwitchOrchestrator, SwitchPlan,
};

/// Registry and current-state snapshots plus the orchestrator that acts on
/// them. Snapshots only change on [`Session::reload`].
pub struct Session {
    registry: VersionRegistry,
    state: CurrentState,
    orchestrator: SwitchOrchestrator,
}

impl Session {
    /// Opens a session that runs the configured service commands.
    pub fn open(config: SwitchConfig) -> Result<Self, SwitchError> {
        let service = Arc::new(CommandServiceControl::from_config(&config));
        Self::with_service(config, service)
    }

    pub fn with_service(
        config: SwitchConfig,
        service: Arc<dyn ServiceControl>,
    ) -> Result<Self, SwitchError> {
        let layout = config.layout();
        let registry = scan(&layout)?;
        let state = current_state(&layout);
        let orchestrator = SwitchOrchestrator::new(layout, service);
        Ok(Self {
            registry,
            state,
            orchestrator,
        })
    }

    pub fn layout(&self) -> &InstallLayout {
        self.orchestrator.layout()
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    /// Installed versions in numeric order.
    pub fn list_versions(&self) -> Vec<&VersionEntry> {
        self.registry.entries()
    }

    pub fn current_state(&self) -> &CurrentState {
        &self.state
    }

    /// Rescans the root and re-reads both stable paths.
    pub fn reload(&mut self) -> Result<(), SwitchError> {
        let layout = self.orchestrator.layout();
        self.registry = scan(layout)?;
        self.state = current_state(layout);
        debug!(versions = self.registry.len(), "session reloaded");
        Ok(())
    }

    pub fn switch(&self, version: &str) -> Result<SwitchHandle, SwitchError> {
        self.switch_with(version, LinkSelection::Both)
    }

    /// Starts a switch to `version`, which must be in the current snapshot.
    pub fn switch_with(
        &self,
        version: &str,
        selection: LinkSelection,
    ) -> Result<SwitchHandle, SwitchError> {
        let entry = self
            .registry
            .get(version)
            .ok_or_else(|| NotFoundError::Version(version.to_string()))?;
        self.orchestrator
            .switch(SwitchPlan::from_entry(entry, selection))
    }
}
