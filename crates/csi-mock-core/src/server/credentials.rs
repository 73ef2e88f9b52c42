//! Default credentials.
//!
//! When enabled, calls that carry secrets must present the expected value
//! for their operation under [`SECRET_KEY`]. Values are zeroized on drop and
//! never appear in `Debug` output.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::service::types::Secrets;
use crate::service::{Code, RpcError};

/// Key looked up in a request's secrets map.
pub const SECRET_KEY: &str = "secretKey";

/// Operations that require a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOp {
    CreateVolume,
    DeleteVolume,
    ControllerPublishVolume,
    ControllerUnpublishVolume,
    NodePublishVolume,
    ControllerExpandVolume,
}

/// Expected secret value per operation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    create_volume: String,
    delete_volume: String,
    controller_publish_volume: String,
    controller_unpublish_volume: String,
    node_publish_volume: String,
    controller_expand_volume: String,
}

impl Credentials {
    /// The well-known default credential set.
    pub fn defaults() -> Self {
        Self {
            create_volume: "secretval1".to_string(),
            delete_volume: "secretval2".to_string(),
            controller_publish_volume: "secretval3".to_string(),
            controller_unpublish_volume: "secretval4".to_string(),
            node_publish_volume: "secretval6".to_string(),
            controller_expand_volume: "secretval11".to_string(),
        }
    }

    /// The value expected for `op`.
    pub fn expected(&self, op: SecretOp) -> &str {
        match op {
            SecretOp::CreateVolume => &self.create_volume,
            SecretOp::DeleteVolume => &self.delete_volume,
            SecretOp::ControllerPublishVolume => &self.controller_publish_volume,
            SecretOp::ControllerUnpublishVolume => &self.controller_unpublish_volume,
            SecretOp::NodePublishVolume => &self.node_publish_volume,
            SecretOp::ControllerExpandVolume => &self.controller_expand_volume,
        }
    }

    /// Check the secrets carried by a request.
    pub fn authorize(&self, op: SecretOp, secrets: &Secrets) -> Result<(), RpcError> {
        if secrets.is_empty() {
            return Err(RpcError::invalid_argument(format!(
                "{op:?} requires secrets, got none"
            )));
        }
        match secrets.get(SECRET_KEY) {
            Some(value) if value == self.expected(op) => Ok(()),
            _ => Err(RpcError::new(
                Code::Unauthenticated,
                format!("invalid secret for {op:?}"),
            )),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("values", &"[REDACTED]")
            .finish()
    }
}
