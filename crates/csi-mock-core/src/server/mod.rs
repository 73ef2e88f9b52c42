//! Protocol servers.
//!
//! A [`ServerMember`] binds one listener and serves a subset of the roles of
//! the shared [`MockService`]. One member carries every role in the combined
//! topology; in the split topology one member carries identity + controller
//! and another carries identity + node.
//!
//! ```text
//!                    ┌──────────────────────┐
//!   unix/tcp  ──────▶│  ServerMember        │──┐
//!                    │  identity+controller │  │   ┌──────────────┐
//!                    └──────────────────────┘  ├──▶│ MockService  │
//!                    ┌──────────────────────┐  │   │ (Arc, shared)│
//!   unix/tcp  ──────▶│  ServerMember        │──┘   └──────────────┘
//!                    │  identity+node       │
//!                    └──────────────────────┘
//! ```

pub mod credentials;
pub mod member;
pub mod routes;

use std::fmt;
use std::sync::Arc;

use crate::listener::ListenError;
use crate::service::{Controller, Identity, MockService, Node};

pub use credentials::Credentials;
pub use member::{MemberState, ServerMember};

/// A subset of RPC methods a member can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Identity,
    Controller,
    Node,
}

/// Role implementations a member serves. Identity is always present.
#[derive(Clone)]
pub struct RoleHandlers {
    pub identity: Arc<dyn Identity>,
    pub controller: Option<Arc<dyn Controller>>,
    pub node: Option<Arc<dyn Node>>,
}

impl RoleHandlers {
    /// Every role, backed by `service`.
    pub fn combined(service: &Arc<MockService>) -> Self {
        Self {
            identity: service.clone(),
            controller: Some(service.clone()),
            node: Some(service.clone()),
        }
    }

    /// Identity and controller, backed by `service`.
    pub fn controller_only(service: &Arc<MockService>) -> Self {
        Self {
            identity: service.clone(),
            controller: Some(service.clone()),
            node: None,
        }
    }

    /// Identity and node, backed by `service`.
    pub fn node_only(service: &Arc<MockService>) -> Self {
        Self {
            identity: service.clone(),
            controller: None,
            node: Some(service.clone()),
        }
    }

    /// The roles present, in a fixed order.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = vec![Role::Identity];
        if self.controller.is_some() {
            roles.push(Role::Controller);
        }
        if self.node.is_some() {
            roles.push(Role::Node);
        }
        roles
    }
}

impl fmt::Debug for RoleHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleHandlers")
            .field("roles", &self.roles())
            .finish()
    }
}

/// Errors from driving a member through its lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("unable to listen on {endpoint}: {source}")]
    Listen {
        endpoint: String,
        source: ListenError,
    },

    #[error("unable to start {member} server: {reason}")]
    Start { member: String, reason: String },

    #[error("error stopping {member} server: {reason}")]
    Stop { member: String, reason: String },

    #[error("{member} server cannot {action} while {state:?}")]
    InvalidTransition {
        member: String,
        action: &'static str,
        state: MemberState,
    },
}
