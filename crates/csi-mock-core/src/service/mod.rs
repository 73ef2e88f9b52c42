//! The mock protocol service.
//!
//! A single [`MockService`] implements all three roles ([`Identity`],
//! [`Controller`], [`Node`]). It is built once from a [`DriverConfig`] and
//! shared through an `Arc` by every server the process runs, so its
//! bookkeeping sits behind a mutex and every role method takes `&self`.

mod controller;
pub mod error;
mod identity;
mod node;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use csi_mock_config::{DriverConfig, HookPoint, Hooks};

pub use error::{Code, RpcError};
use types::*;

/// Capacity of the volumes present at startup.
pub const PRESET_VOLUME_CAPACITY: i64 = 100 * GIB;
/// Capacity used when a create request does not ask for one.
pub const DEFAULT_VOLUME_CAPACITY: i64 = GIB;
/// Value of the topology segment advertised when topology is enabled.
pub const TOPOLOGY_VALUE: &str = "some-mock-node";

const GIB: i64 = 1024 * 1024 * 1024;

/// Plugin identity and health.
pub trait Identity: Send + Sync {
    fn get_plugin_info(&self) -> Result<GetPluginInfoResponse, RpcError>;
    fn get_plugin_capabilities(&self) -> Result<GetPluginCapabilitiesResponse, RpcError>;
    fn probe(&self) -> Result<ProbeResponse, RpcError>;
}

/// Volume lifecycle on the controller side.
pub trait Controller: Send + Sync {
    fn controller_get_capabilities(&self) -> Result<ControllerGetCapabilitiesResponse, RpcError>;
    fn create_volume(&self, req: CreateVolumeRequest) -> Result<CreateVolumeResponse, RpcError>;
    fn delete_volume(&self, req: DeleteVolumeRequest) -> Result<DeleteVolumeResponse, RpcError>;
    fn list_volumes(&self) -> Result<ListVolumesResponse, RpcError>;
    fn controller_publish_volume(
        &self,
        req: ControllerPublishVolumeRequest,
    ) -> Result<ControllerPublishVolumeResponse, RpcError>;
    fn controller_unpublish_volume(
        &self,
        req: ControllerUnpublishVolumeRequest,
    ) -> Result<ControllerUnpublishVolumeResponse, RpcError>;
    fn controller_expand_volume(
        &self,
        req: ControllerExpandVolumeRequest,
    ) -> Result<ControllerExpandVolumeResponse, RpcError>;
}

/// Volume lifecycle on the node side.
pub trait Node: Send + Sync {
    fn node_get_capabilities(&self) -> Result<NodeGetCapabilitiesResponse, RpcError>;
    fn node_get_info(&self) -> Result<NodeGetInfoResponse, RpcError>;
    fn node_publish_volume(
        &self,
        req: NodePublishVolumeRequest,
    ) -> Result<NodePublishVolumeResponse, RpcError>;
    fn node_unpublish_volume(
        &self,
        req: NodeUnpublishVolumeRequest,
    ) -> Result<NodeUnpublishVolumeResponse, RpcError>;
}

#[derive(Debug)]
struct VolumeRecord {
    name: String,
    volume: Volume,
    /// Nodes the volume is controller-published to.
    attached_to: BTreeSet<String>,
    /// Node target paths the volume is published at.
    targets: BTreeSet<PathBuf>,
}

#[derive(Debug, Default)]
struct Inventory {
    volumes: BTreeMap<String, VolumeRecord>,
    next_id: u64,
}

impl Inventory {
    fn insert(&mut self, name: &str, capacity_bytes: i64, topology: Vec<Topology>) -> Volume {
        self.next_id += 1;
        let volume = Volume {
            volume_id: self.next_id.to_string(),
            capacity_bytes,
            accessible_topology: topology,
        };
        self.volumes.insert(
            volume.volume_id.clone(),
            VolumeRecord {
                name: name.to_string(),
                volume: volume.clone(),
                attached_to: BTreeSet::new(),
                targets: BTreeSet::new(),
            },
        );
        volume
    }

    fn by_name(&self, name: &str) -> Option<&VolumeRecord> {
        self.volumes.values().find(|r| r.name == name)
    }

    fn get_mut(&mut self, volume_id: &str) -> Result<&mut VolumeRecord, RpcError> {
        self.volumes
            .get_mut(volume_id)
            .ok_or_else(|| RpcError::not_found(format!("volume {volume_id} not found")))
    }

    fn attached_count(&self, node_id: &str) -> i64 {
        self.volumes
            .values()
            .filter(|r| r.attached_to.contains(node_id))
            .count() as i64
    }
}

/// In-memory implementation of every role.
#[derive(Debug)]
pub struct MockService {
    config: DriverConfig,
    inventory: Mutex<Inventory>,
}

impl MockService {
    /// Build the service from configuration. Three volumes exist from the start.
    pub fn new(config: DriverConfig) -> Self {
        let mut inventory = Inventory::default();
        let topology = topology_for(&config).into_iter().collect::<Vec<_>>();
        for i in 1..=3 {
            inventory.insert(
                &format!("Mock Volume {i}"),
                PRESET_VOLUME_CAPACITY,
                topology.clone(),
            );
        }
        debug!(
            name = %config.name,
            hooks = config.hooks.is_some(),
            "Mock service created"
        );
        Self {
            config,
            inventory: Mutex::new(inventory),
        }
    }

    /// Build the service and wrap it for sharing across servers.
    pub fn shared(config: DriverConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn hooks(&self) -> Option<&Hooks> {
        self.config.hooks.as_ref()
    }

    /// Node id this service answers for; the driver name.
    pub fn node_id(&self) -> &str {
        &self.config.name
    }

    fn inventory(&self) -> Result<MutexGuard<'_, Inventory>, RpcError> {
        self.inventory
            .lock()
            .map_err(|_| RpcError::new(Code::Internal, "volume inventory lock poisoned"))
    }

    /// Note that an RPC reached a hook point. Scripts are run by the
    /// protocol layer; here the point is only traced.
    fn hook(&self, point: HookPoint) {
        if let Some(script) = self.hooks().and_then(|h| h.script(point)) {
            debug!(hook = ?point, script_len = script.len(), "Hook point reached");
        }
    }
}

fn topology_for(config: &DriverConfig) -> Option<Topology> {
    config.enable_topology.then(|| Topology {
        segments: BTreeMap::from([(
            format!("{}/node", config.name),
            TOPOLOGY_VALUE.to_string(),
        )]),
    })
}

fn require(field: &str, value: &str) -> Result<(), RpcError> {
    if value.is_empty() {
        return Err(RpcError::invalid_argument(format!("{field} must be provided")));
    }
    Ok(())
}
