//! Job descriptors, discovery, and output audit.
//!
//! This module provides:
//! - `JobDescriptor`: one input file and the job name derived from it
//! - `discover_in_directory` / `discover_from_glob`: build the pending set,
//!   skipping inputs whose result already exists
//! - `audit_outputs`: check finished `.out` files for success markers

mod audit;
mod discovery;
mod types;

pub use audit::{audit_file, audit_outputs, AuditCounts, AuditStatus, OutputAudit};
pub use discovery::{
    discover_from_glob, discover_in_directory, Discovered, DiscoveryError, DiscoveryResult,
};
pub use types::JobDescriptor;
