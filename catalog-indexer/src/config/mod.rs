//! Configuration and dependency initialization.

mod dependencies;
mod kafka;
mod settings;

pub use dependencies::{Dependencies, PollerDependencies};
pub use kafka::apply_credentials;
pub use settings::{ClientTimeouts, ConnectionMode, IndexerConfig};
