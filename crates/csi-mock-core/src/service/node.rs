use std::path::{Path, PathBuf};

use csi_mock_config::HookPoint;
use tracing::info;

use super::types::*;
use super::{MockService, Node, RpcError, require, topology_for};

impl MockService {
    /// Without `permissive_target_path` the caller must create the parent
    /// of the target path and must leave the target itself to the plugin.
    fn check_target_path(&self, target: &Path) -> Result<(), RpcError> {
        if self.config.permissive_target_path {
            return Ok(());
        }
        let parent_is_dir = target.parent().is_some_and(Path::is_dir);
        if !parent_is_dir {
            return Err(RpcError::failed_precondition(format!(
                "parent of target path {} does not exist",
                target.display()
            )));
        }
        if target.exists() {
            return Err(RpcError::failed_precondition(format!(
                "target path {} must not be created by the caller",
                target.display()
            )));
        }
        Ok(())
    }
}

impl Node for MockService {
    fn node_get_capabilities(&self) -> Result<NodeGetCapabilitiesResponse, RpcError> {
        self.hook(HookPoint::NodeGetCapabilities);
        let mut capabilities = Vec::new();
        if self.config.node_expansion_required {
            capabilities.push(NodeCapability::ExpandVolume);
        }
        Ok(NodeGetCapabilitiesResponse { capabilities })
    }

    fn node_get_info(&self) -> Result<NodeGetInfoResponse, RpcError> {
        self.hook(HookPoint::NodeGetInfo);
        Ok(NodeGetInfoResponse {
            node_id: self.node_id().to_string(),
            max_volumes_per_node: self.config.attach_limit,
            accessible_topology: topology_for(&self.config),
        })
    }

    fn node_publish_volume(
        &self,
        req: NodePublishVolumeRequest,
    ) -> Result<NodePublishVolumeResponse, RpcError> {
        self.hook(HookPoint::NodePublishVolumeStart);
        require("volume_id", &req.volume_id)?;
        require("target_path", &req.target_path)?;
        let target = PathBuf::from(&req.target_path);

        let mut inventory = self.inventory()?;
        let record = inventory.get_mut(&req.volume_id)?;
        if record.targets.contains(&target) {
            return Ok(NodePublishVolumeResponse {});
        }
        if !self.config.disable_attach && !record.attached_to.contains(self.node_id()) {
            return Err(RpcError::failed_precondition(format!(
                "volume {} is not attached to node {}",
                req.volume_id,
                self.node_id()
            )));
        }
        self.check_target_path(&target)?;

        record.targets.insert(target);
        info!(volume_id = %req.volume_id, target = %req.target_path, "Volume published");
        self.hook(HookPoint::NodePublishVolumeEnd);
        Ok(NodePublishVolumeResponse {})
    }

    fn node_unpublish_volume(
        &self,
        req: NodeUnpublishVolumeRequest,
    ) -> Result<NodeUnpublishVolumeResponse, RpcError> {
        self.hook(HookPoint::NodeUnpublishVolumeStart);
        require("volume_id", &req.volume_id)?;
        require("target_path", &req.target_path)?;

        let mut inventory = self.inventory()?;
        let record = inventory.get_mut(&req.volume_id)?;
        if record.targets.remove(Path::new(&req.target_path)) {
            info!(volume_id = %req.volume_id, target = %req.target_path, "Volume unpublished");
        }
        self.hook(HookPoint::NodeUnpublishVolumeEnd);
        Ok(NodeUnpublishVolumeResponse {})
    }
}
