mod events;
mod lock;
mod orchestrator;
mod relink;
mod service;
mod session;

pub use events::{ProgressEvent, Stage};
pub use lock::{clear_stale_lock, read_lock_marker};
pub use orchestrator::{SwitchHandle, SwitchOrchestrator, SwitchPlan, SwitchReport};
pub use service::{CommandServiceControl, NoopServiceControl, ServiceControl};
pub use session::Session;

#[cfg(test)]
mod tests;
