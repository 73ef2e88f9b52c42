//! Endpoint selection from the environment.
//!
//! `CSI_ENDPOINT` is the primary endpoint. `CSI_CONTROLLER_ENDPOINT` is the
//! secondary one; when it is unset or empty it falls back to the primary.
//! Equal strings mean one server carries every role. Distinct strings split
//! the roles: identity + controller on the primary, identity + node on the
//! secondary. `CSI_ENABLE_CREDS=true` turns on default credentials for every
//! server.

/// Primary endpoint variable.
pub const ENDPOINT_VAR: &str = "CSI_ENDPOINT";
/// Secondary endpoint variable.
pub const CONTROLLER_ENDPOINT_VAR: &str = "CSI_CONTROLLER_ENDPOINT";
/// Default-credentials toggle variable.
pub const ENABLE_CREDS_VAR: &str = "CSI_ENABLE_CREDS";

/// Endpoint strings and credential mode, resolved but not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSettings {
    /// Primary endpoint, from `CSI_ENDPOINT`.
    pub endpoint: String,
    /// Secondary endpoint, from `CSI_CONTROLLER_ENDPOINT`.
    pub controller_endpoint: String,
    /// Inject the default credential set into every server.
    pub enable_creds: bool,
}

impl EndpointSettings {
    /// Read the settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENDPOINT_VAR).unwrap_or_default();
        let controller_endpoint = lookup(CONTROLLER_ENDPOINT_VAR)
            .filter(|ep| !ep.is_empty())
            .unwrap_or_else(|| endpoint.clone());
        let enable_creds = lookup(ENABLE_CREDS_VAR).as_deref() == Some("true");

        Self {
            endpoint,
            controller_endpoint,
            enable_creds,
        }
    }
}
