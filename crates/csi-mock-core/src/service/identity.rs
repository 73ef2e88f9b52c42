use super::types::*;
use super::{Identity, MockService, RpcError};
use crate::build_info;

impl Identity for MockService {
    fn get_plugin_info(&self) -> Result<GetPluginInfoResponse, RpcError> {
        Ok(GetPluginInfoResponse {
            name: self.config.name.clone(),
            vendor_version: build_info::VERSION.to_string(),
            manifest: build_info::manifest(),
        })
    }

    fn get_plugin_capabilities(&self) -> Result<GetPluginCapabilitiesResponse, RpcError> {
        let mut capabilities = vec![PluginCapability::ControllerService];
        if self.config.enable_topology {
            capabilities.push(PluginCapability::VolumeAccessibilityConstraints);
        }
        capabilities.push(if self.config.disable_online_expansion {
            PluginCapability::OfflineVolumeExpansion
        } else {
            PluginCapability::OnlineVolumeExpansion
        });
        Ok(GetPluginCapabilitiesResponse { capabilities })
    }

    fn probe(&self) -> Result<ProbeResponse, RpcError> {
        Ok(ProbeResponse { ready: true })
    }
}
