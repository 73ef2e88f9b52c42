use std::collections::BTreeMap;

use csi_mock_config::HookPoint;
use tracing::info;

use super::types::*;
use super::{Code, Controller, DEFAULT_VOLUME_CAPACITY, MockService, RpcError, require, topology_for};

impl Controller for MockService {
    fn controller_get_capabilities(&self) -> Result<ControllerGetCapabilitiesResponse, RpcError> {
        self.hook(HookPoint::ControllerGetCapabilitiesStart);
        let mut capabilities = vec![
            ControllerCapability::CreateDeleteVolume,
            ControllerCapability::ListVolumes,
        ];
        if !self.config.disable_attach {
            capabilities.push(ControllerCapability::PublishUnpublishVolume);
        }
        if !self.config.disable_controller_expansion {
            capabilities.push(ControllerCapability::ExpandVolume);
        }
        self.hook(HookPoint::ControllerGetCapabilitiesEnd);
        Ok(ControllerGetCapabilitiesResponse { capabilities })
    }

    fn create_volume(&self, req: CreateVolumeRequest) -> Result<CreateVolumeResponse, RpcError> {
        self.hook(HookPoint::CreateVolumeStart);
        require("name", &req.name)?;
        if req.capacity_bytes < 0 {
            return Err(RpcError::invalid_argument("capacity_bytes must not be negative"));
        }
        let capacity = if req.capacity_bytes == 0 {
            DEFAULT_VOLUME_CAPACITY
        } else {
            req.capacity_bytes
        };

        let mut inventory = self.inventory()?;
        if let Some(existing) = inventory.by_name(&req.name) {
            if req.capacity_bytes != 0 && existing.volume.capacity_bytes != capacity {
                return Err(RpcError::new(
                    Code::AlreadyExists,
                    format!("volume {:?} exists with a different capacity", req.name),
                ));
            }
            return Ok(CreateVolumeResponse {
                volume: existing.volume.clone(),
            });
        }

        let topology = topology_for(&self.config).into_iter().collect();
        let volume = inventory.insert(&req.name, capacity, topology);
        info!(volume_id = %volume.volume_id, name = %req.name, "Volume created");
        self.hook(HookPoint::CreateVolumeEnd);
        Ok(CreateVolumeResponse { volume })
    }

    fn delete_volume(&self, req: DeleteVolumeRequest) -> Result<DeleteVolumeResponse, RpcError> {
        self.hook(HookPoint::DeleteVolumeStart);
        require("volume_id", &req.volume_id)?;
        if self.inventory()?.volumes.remove(&req.volume_id).is_some() {
            info!(volume_id = %req.volume_id, "Volume deleted");
        }
        self.hook(HookPoint::DeleteVolumeEnd);
        Ok(DeleteVolumeResponse {})
    }

    fn list_volumes(&self) -> Result<ListVolumesResponse, RpcError> {
        self.hook(HookPoint::ListVolumesStart);
        let entries = self
            .inventory()?
            .volumes
            .values()
            .map(|r| r.volume.clone())
            .collect();
        self.hook(HookPoint::ListVolumesEnd);
        Ok(ListVolumesResponse { entries })
    }

    fn controller_publish_volume(
        &self,
        req: ControllerPublishVolumeRequest,
    ) -> Result<ControllerPublishVolumeResponse, RpcError> {
        self.hook(HookPoint::ControllerPublishVolumeStart);
        if self.config.disable_attach {
            return Err(RpcError::unimplemented("attach is disabled"));
        }
        require("volume_id", &req.volume_id)?;
        require("node_id", &req.node_id)?;
        if req.node_id != self.node_id() {
            return Err(RpcError::not_found(format!("node {} not found", req.node_id)));
        }

        let publish_context = BTreeMap::from([
            ("device".to_string(), "/dev/mock".to_string()),
            ("readonly".to_string(), req.readonly.to_string()),
        ]);

        let mut inventory = self.inventory()?;
        let attached = inventory.attached_count(&req.node_id);
        let record = inventory.get_mut(&req.volume_id)?;
        if record.attached_to.contains(&req.node_id) {
            return Ok(ControllerPublishVolumeResponse { publish_context });
        }
        let limit = self.config.attach_limit;
        if limit > 0 && attached >= limit {
            return Err(RpcError::new(
                Code::ResourceExhausted,
                format!("node {} reached its attach limit of {limit}", req.node_id),
            ));
        }
        record.attached_to.insert(req.node_id.clone());
        info!(volume_id = %req.volume_id, node_id = %req.node_id, "Volume attached");
        self.hook(HookPoint::ControllerPublishVolumeEnd);
        Ok(ControllerPublishVolumeResponse { publish_context })
    }

    fn controller_unpublish_volume(
        &self,
        req: ControllerUnpublishVolumeRequest,
    ) -> Result<ControllerUnpublishVolumeResponse, RpcError> {
        self.hook(HookPoint::ControllerUnpublishVolumeStart);
        if self.config.disable_attach {
            return Err(RpcError::unimplemented("attach is disabled"));
        }
        require("volume_id", &req.volume_id)?;
        let mut inventory = self.inventory()?;
        let record = inventory.get_mut(&req.volume_id)?;
        if req.node_id.is_empty() {
            record.attached_to.clear();
        } else {
            record.attached_to.remove(&req.node_id);
        }
        self.hook(HookPoint::ControllerUnpublishVolumeEnd);
        Ok(ControllerUnpublishVolumeResponse {})
    }

    fn controller_expand_volume(
        &self,
        req: ControllerExpandVolumeRequest,
    ) -> Result<ControllerExpandVolumeResponse, RpcError> {
        self.hook(HookPoint::ControllerExpandVolumeStart);
        if self.config.disable_controller_expansion {
            return Err(RpcError::unimplemented("controller expansion is disabled"));
        }
        require("volume_id", &req.volume_id)?;
        if req.capacity_bytes <= 0 {
            return Err(RpcError::invalid_argument("capacity_bytes must be positive"));
        }

        let mut inventory = self.inventory()?;
        let record = inventory.get_mut(&req.volume_id)?;
        if self.config.disable_online_expansion && !record.attached_to.is_empty() {
            return Err(RpcError::failed_precondition(format!(
                "volume {} is attached and online expansion is disabled",
                req.volume_id
            )));
        }
        if req.capacity_bytes > record.volume.capacity_bytes {
            record.volume.capacity_bytes = req.capacity_bytes;
        }
        let capacity_bytes = record.volume.capacity_bytes;
        self.hook(HookPoint::ControllerExpandVolumeEnd);
        Ok(ControllerExpandVolumeResponse {
            capacity_bytes,
            node_expansion_required: self.config.node_expansion_required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::PRESET_VOLUME_CAPACITY;
    use csi_mock_config::DriverConfig;
    use pretty_assertions::assert_eq;

    fn service() -> MockService {
        MockService::new(DriverConfig::default())
    }

    fn publish(service: &MockService, volume_id: &str) -> Result<ControllerPublishVolumeResponse, RpcError> {
        service.controller_publish_volume(ControllerPublishVolumeRequest {
            volume_id: volume_id.to_string(),
            node_id: service.node_id().to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_default_capabilities() {
        let caps = service().controller_get_capabilities().unwrap().capabilities;
        assert_eq!(
            caps,
            vec![
                ControllerCapability::CreateDeleteVolume,
                ControllerCapability::ListVolumes,
                ControllerCapability::PublishUnpublishVolume,
                ControllerCapability::ExpandVolume,
            ]
        );
    }

    #[test]
    fn test_disabled_capabilities_are_omitted() {
        let service = MockService::new(DriverConfig {
            disable_attach: true,
            disable_controller_expansion: true,
            ..DriverConfig::default()
        });
        let caps = service.controller_get_capabilities().unwrap().capabilities;
        assert!(!caps.contains(&ControllerCapability::PublishUnpublishVolume));
        assert!(!caps.contains(&ControllerCapability::ExpandVolume));
    }

    #[test]
    fn test_create_volume_is_idempotent_by_name() {
        let service = service();
        let req = CreateVolumeRequest {
            name: "pvc-1".to_string(),
            capacity_bytes: 4096,
            ..Default::default()
        };
        let first = service.create_volume(req.clone()).unwrap().volume;
        let second = service.create_volume(req).unwrap().volume;
        assert_eq!(first, second);
        assert_eq!(first.volume_id, "4");
    }

    #[test]
    fn test_create_volume_conflicting_capacity() {
        let service = service();
        service
            .create_volume(CreateVolumeRequest {
                name: "pvc-1".to_string(),
                capacity_bytes: 4096,
                ..Default::default()
            })
            .unwrap();
        let err = service
            .create_volume(CreateVolumeRequest {
                name: "pvc-1".to_string(),
                capacity_bytes: 8192,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code, Code::AlreadyExists);
    }

    #[test]
    fn test_create_volume_requires_name() {
        let err = service().create_volume(CreateVolumeRequest::default()).unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);
    }

    #[test]
    fn test_create_volume_default_capacity() {
        let volume = service()
            .create_volume(CreateVolumeRequest {
                name: "pvc-default".to_string(),
                ..Default::default()
            })
            .unwrap()
            .volume;
        assert_eq!(volume.capacity_bytes, DEFAULT_VOLUME_CAPACITY);
    }

    #[test]
    fn test_delete_volume_is_idempotent() {
        let service = service();
        let req = DeleteVolumeRequest {
            volume_id: "1".to_string(),
            ..Default::default()
        };
        service.delete_volume(req.clone()).unwrap();
        service.delete_volume(req).unwrap();
        assert_eq!(service.list_volumes().unwrap().entries.len(), 2);
    }

    #[test]
    fn test_publish_respects_attach_limit() {
        let service = service();
        publish(&service, "1").unwrap();
        publish(&service, "2").unwrap();
        // Re-publishing an attached volume does not count against the limit.
        publish(&service, "1").unwrap();

        let err = publish(&service, "3").unwrap_err();
        assert_eq!(err.code, Code::ResourceExhausted);

        service
            .controller_unpublish_volume(ControllerUnpublishVolumeRequest {
                volume_id: "1".to_string(),
                node_id: service.node_id().to_string(),
                ..Default::default()
            })
            .unwrap();
        publish(&service, "3").unwrap();
    }

    #[test]
    fn test_publish_context() {
        let ctx = publish(&service(), "1").unwrap().publish_context;
        assert_eq!(ctx.get("device").map(String::as_str), Some("/dev/mock"));
        assert_eq!(ctx.get("readonly").map(String::as_str), Some("false"));
    }

    #[test]
    fn test_publish_unknown_node_or_volume() {
        let service = service();
        let err = service
            .controller_publish_volume(ControllerPublishVolumeRequest {
                volume_id: "1".to_string(),
                node_id: "elsewhere".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code, Code::NotFound);

        assert_eq!(publish(&service, "99").unwrap_err().code, Code::NotFound);
    }

    #[test]
    fn test_publish_when_attach_disabled() {
        let service = MockService::new(DriverConfig {
            disable_attach: true,
            ..DriverConfig::default()
        });
        assert_eq!(publish(&service, "1").unwrap_err().code, Code::Unimplemented);
    }

    #[test]
    fn test_expand_volume_grows_only() {
        let service = service();
        let grown = service
            .controller_expand_volume(ControllerExpandVolumeRequest {
                volume_id: "1".to_string(),
                capacity_bytes: PRESET_VOLUME_CAPACITY * 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(grown.capacity_bytes, PRESET_VOLUME_CAPACITY * 2);
        assert!(!grown.node_expansion_required);

        let same = service
            .controller_expand_volume(ControllerExpandVolumeRequest {
                volume_id: "1".to_string(),
                capacity_bytes: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(same.capacity_bytes, grown.capacity_bytes);
    }

    #[test]
    fn test_expand_attached_volume_offline_only() {
        let service = MockService::new(DriverConfig {
            disable_online_expansion: true,
            node_expansion_required: true,
            ..DriverConfig::default()
        });
        let req = ControllerExpandVolumeRequest {
            volume_id: "2".to_string(),
            capacity_bytes: i64::MAX,
            ..Default::default()
        };
        assert!(service.controller_expand_volume(req.clone()).unwrap().node_expansion_required);

        publish(&service, "2").unwrap();
        let err = service.controller_expand_volume(req).unwrap_err();
        assert_eq!(err.code, Code::FailedPrecondition);
    }

    #[test]
    fn test_expand_when_disabled() {
        let service = MockService::new(DriverConfig {
            disable_controller_expansion: true,
            ..DriverConfig::default()
        });
        let err = service
            .controller_expand_volume(ControllerExpandVolumeRequest {
                volume_id: "1".to_string(),
                capacity_bytes: 1,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code, Code::Unimplemented);
    }
}
