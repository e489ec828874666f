//! kbindex core types: the resource change-event protocol, index specs and configuration.

#![forbid(unsafe_code)]

pub mod config;
pub mod event;

pub use config::{Config, ConfigError};
pub use event::{ChangeType, IndexSpec, ResourceChangeEvent, ResourceChangeResult, SpecError, Status};

pub mod prelude {
    pub use super::{ChangeType, Config, IndexSpec, ResourceChangeEvent, ResourceChangeResult, Status};
}

/// Default name of the full-text field when the provisioning side does not pick one.
pub const DEFAULT_TEXT_FIELD: &str = "TEXT_CHUNK";
/// Default name of the stored-only metadata field.
pub const DEFAULT_METADATA_FIELD: &str = "METADATA";
