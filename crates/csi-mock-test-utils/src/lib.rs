#![deny(unsafe_code)]

//! Shared test utilities for the CSI mock driver workspace.
//!
//! Provides reusable fixtures, config builders, and log capture so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! csi-mock-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod driver;
pub mod tracing_setup;
