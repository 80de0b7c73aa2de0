//! Flotte Core - parallel job queue for external quantum-chemistry programs.
//!
//! This crate contains all queue logic with zero CLI dependencies.
//! It can be used by the `flotte` binary or embedded in other tools.

pub mod config;
pub mod jobs;
pub mod logging;
pub mod orchestrator;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
