/*!
 * Prelude module for FleetLink Core.
 *
 * Re-exports commonly used types and functions from the FleetLink Core crate.
 */

pub use crate::error::{Error, Result};

pub use crate::types::Id;

pub use crate::event::{subscribe, Signal, Subscription};

pub use crate::config::{Config, ConfigBuilder, DevicesConfig, SharedConfig};

pub use crate::utils::spawn_and_log;

pub use tracing::{debug, error, info, trace, warn};

pub use crate::init;
