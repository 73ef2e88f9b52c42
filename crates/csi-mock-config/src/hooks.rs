//! Hooks document.
//!
//! Operators can attach a script to the start or end of individual RPCs. The
//! driver only carries the scripts; running them is the protocol layer's job.
//! The document is YAML with camelCase keys and is parsed strictly: an
//! unknown key rejects the whole document.
//!
//! ```yaml
//! createVolumeStart: |
//!   echo "creating"
//! nodePublishVolumeEnd: "exit 0"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors from reading or parsing a hooks document.
#[derive(Debug, thiserror::Error)]
pub enum HooksError {
    #[error("failed to read hooks file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse hooks document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Scripts keyed by the RPC lifecycle point they run at.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Hooks {
    /// Skip every hook without removing it from the document.
    pub disabled: bool,

    pub create_volume_start: Option<String>,
    pub create_volume_end: Option<String>,
    pub delete_volume_start: Option<String>,
    pub delete_volume_end: Option<String>,
    pub controller_publish_volume_start: Option<String>,
    pub controller_publish_volume_end: Option<String>,
    pub controller_unpublish_volume_start: Option<String>,
    pub controller_unpublish_volume_end: Option<String>,
    pub list_volumes_start: Option<String>,
    pub list_volumes_end: Option<String>,
    pub controller_get_capabilities_start: Option<String>,
    pub controller_get_capabilities_end: Option<String>,
    pub controller_expand_volume_start: Option<String>,
    pub controller_expand_volume_end: Option<String>,
    pub node_publish_volume_start: Option<String>,
    pub node_publish_volume_end: Option<String>,
    pub node_unpublish_volume_start: Option<String>,
    pub node_unpublish_volume_end: Option<String>,
    pub node_get_capabilities: Option<String>,
    pub node_get_info: Option<String>,
}

/// A point in an RPC's lifecycle at which a hook may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    CreateVolumeStart,
    CreateVolumeEnd,
    DeleteVolumeStart,
    DeleteVolumeEnd,
    ControllerPublishVolumeStart,
    ControllerPublishVolumeEnd,
    ControllerUnpublishVolumeStart,
    ControllerUnpublishVolumeEnd,
    ListVolumesStart,
    ListVolumesEnd,
    ControllerGetCapabilitiesStart,
    ControllerGetCapabilitiesEnd,
    ControllerExpandVolumeStart,
    ControllerExpandVolumeEnd,
    NodePublishVolumeStart,
    NodePublishVolumeEnd,
    NodeUnpublishVolumeStart,
    NodeUnpublishVolumeEnd,
    NodeGetCapabilities,
    NodeGetInfo,
}

impl Hooks {
    /// Read and strictly parse a hooks document from disk.
    pub async fn load(path: &Path) -> Result<Self, HooksError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| HooksError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content)
    }

    /// Strictly parse a hooks document.
    pub fn parse(s: &str) -> Result<Self, HooksError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// The script registered for `point`, unless hooks are disabled.
    pub fn script(&self, point: HookPoint) -> Option<&str> {
        if self.disabled {
            return None;
        }
        let slot = match point {
            HookPoint::CreateVolumeStart => &self.create_volume_start,
            HookPoint::CreateVolumeEnd => &self.create_volume_end,
            HookPoint::DeleteVolumeStart => &self.delete_volume_start,
            HookPoint::DeleteVolumeEnd => &self.delete_volume_end,
            HookPoint::ControllerPublishVolumeStart => &self.controller_publish_volume_start,
            HookPoint::ControllerPublishVolumeEnd => &self.controller_publish_volume_end,
            HookPoint::ControllerUnpublishVolumeStart => &self.controller_unpublish_volume_start,
            HookPoint::ControllerUnpublishVolumeEnd => &self.controller_unpublish_volume_end,
            HookPoint::ListVolumesStart => &self.list_volumes_start,
            HookPoint::ListVolumesEnd => &self.list_volumes_end,
            HookPoint::ControllerGetCapabilitiesStart => &self.controller_get_capabilities_start,
            HookPoint::ControllerGetCapabilitiesEnd => &self.controller_get_capabilities_end,
            HookPoint::ControllerExpandVolumeStart => &self.controller_expand_volume_start,
            HookPoint::ControllerExpandVolumeEnd => &self.controller_expand_volume_end,
            HookPoint::NodePublishVolumeStart => &self.node_publish_volume_start,
            HookPoint::NodePublishVolumeEnd => &self.node_publish_volume_end,
            HookPoint::NodeUnpublishVolumeStart => &self.node_unpublish_volume_start,
            HookPoint::NodeUnpublishVolumeEnd => &self.node_unpublish_volume_end,
            HookPoint::NodeGetCapabilities => &self.node_get_capabilities,
            HookPoint::NodeGetInfo => &self.node_get_info,
        };
        slot.as_deref()
    }
}
