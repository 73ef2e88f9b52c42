//! Combined-versus-split topology and the group of servers it produces.
//!
//! The decision compares the raw primary and secondary endpoint strings,
//! before any parsing: equal strings give one server with every role,
//! distinct strings give a controller server on the primary and a node
//! server on the secondary.

use std::sync::Arc;

use tracing::{debug, warn};

use csi_mock_config::EndpointSettings;

use crate::server::{MemberState, RoleHandlers, ServerError, ServerMember};
use crate::service::MockService;

/// How many servers run and where each listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    /// One server, all roles.
    Combined { endpoint: String },
    /// Identity + controller on the primary, identity + node on the secondary.
    Split {
        controller_endpoint: String,
        node_endpoint: String,
    },
}

impl Topology {
    pub fn decide(primary: &str, secondary: &str) -> Self {
        if primary == secondary {
            Topology::Combined {
                endpoint: primary.to_string(),
            }
        } else {
            Topology::Split {
                controller_endpoint: primary.to_string(),
                node_endpoint: secondary.to_string(),
            }
        }
    }

    pub fn from_settings(settings: &EndpointSettings) -> Self {
        Self::decide(&settings.endpoint, &settings.controller_endpoint)
    }

    pub fn is_combined(&self) -> bool {
        matches!(self, Topology::Combined { .. })
    }
}

/// The servers of one process, started and stopped together.
#[derive(Debug)]
pub struct ServerGroup {
    members: Vec<ServerMember>,
}

impl ServerGroup {
    /// Build the members for `topology`, all sharing `service`. In the split
    /// topology the controller member comes first.
    pub fn build(topology: &Topology, service: &Arc<MockService>, enable_creds: bool) -> Self {
        let mut members = match topology {
            Topology::Combined { endpoint } => vec![ServerMember::new(
                "mock",
                endpoint.as_str(),
                RoleHandlers::combined(service),
            )],
            Topology::Split {
                controller_endpoint,
                node_endpoint,
            } => vec![
                ServerMember::new(
                    "controller",
                    controller_endpoint.as_str(),
                    RoleHandlers::controller_only(service),
                ),
                ServerMember::new(
                    "node",
                    node_endpoint.as_str(),
                    RoleHandlers::node_only(service),
                ),
            ],
        };
        if enable_creds {
            for member in &mut members {
                member.set_default_creds();
            }
        }
        debug!(topology = ?topology, creds = enable_creds, "Server group built");
        Self { members }
    }

    pub fn members(&self) -> &[ServerMember] {
        &self.members
    }

    /// Bind and start each member in order. The first failure aborts the
    /// rest; members already started keep running.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        for member in &mut self.members {
            member.listen().await?;
            member.start().await?;
        }
        Ok(())
    }

    /// Stop every serving member. A failure is logged and returned but does
    /// not keep the remaining members from being stopped.
    pub async fn stop(&mut self) -> Vec<ServerError> {
        let mut errors = Vec::new();
        for member in &mut self.members {
            if member.state() != MemberState::Serving {
                continue;
            }
            if let Err(e) = member.stop().await {
                warn!(member = %member.name(), error = %e, "Failed to stop server cleanly");
                errors.push(e);
            }
        }
        errors
    }
}
