/*!
 * FleetLink Core
 *
 * This crate provides the ambient pieces shared by every FleetLink crate:
 * errors, configuration, logging, identity tokens and signal wiring.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod prelude;
pub mod types;
pub mod utils;

/// Re-export of dependencies that are part of the public API
pub mod deps {
    pub use tokio;
    pub use tracing;
    pub use uuid;
}

/// FleetLink core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization
pub fn init() -> Result<(), error::Error> {
    logging::init()?;
    tracing::info!("FleetLink Core {} initialized", VERSION);
    Ok(())
}
