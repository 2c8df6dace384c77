mod config;
mod error;
mod layout;
mod link;
mod version;

pub use config::{default_config_path, default_install_root, ServiceCommand, ServiceConfig, SwitchConfig};
pub use error::{
    LinkMutationError, LinkStep, NotFoundError, ServiceAction, ServiceControlWarning, SwitchError,
};
pub use layout::InstallLayout;
pub use link::{LinkKind, LinkSelection};
pub use version::{compare_version_ids, parse_version_suffix};
