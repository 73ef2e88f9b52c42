//! Driver test helpers.
//!
//! [`TestSockets`] hands out Unix socket endpoints inside a temp directory;
//! [`TestDriver`] runs a started [`Coordinator`] around a fresh
//! [`MockService`].

use std::path::PathBuf;

use csi_mock_config::{DriverConfig, EndpointSettings};
use csi_mock_core::{Coordinator, MockService, RpcClient};
use tempfile::TempDir;

/// A temp directory for socket files, deleted on drop.
pub struct TestSockets {
    dir: TempDir,
}

impl TestSockets {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A `unix://` endpoint for `name` inside the temp directory.
    pub fn endpoint(&self, name: &str) -> String {
        format!("unix://{}", self.path(name).display())
    }
}

impl Default for TestSockets {
    fn default() -> Self {
        Self::new()
    }
}

/// A running driver. Call [`TestDriver::stop`] to shut it down.
pub struct TestDriver {
    pub coordinator: Coordinator,
}

impl TestDriver {
    /// Build and start a driver for `settings`.
    pub async fn start(settings: &EndpointSettings, config: DriverConfig) -> Self {
        let mut coordinator = Coordinator::new(settings, MockService::shared(config));
        coordinator
            .start()
            .await
            .expect("failed to start test driver");
        Self { coordinator }
    }

    /// A combined driver on an ephemeral TCP port.
    pub async fn combined_tcp(config: DriverConfig) -> Self {
        let settings = EndpointSettings {
            endpoint: "tcp://127.0.0.1:0".to_string(),
            controller_endpoint: "tcp://127.0.0.1:0".to_string(),
            enable_creds: false,
        };
        Self::start(&settings, config).await
    }

    /// A client for the member at `index`, dialing its bound address.
    pub fn client(&self, index: usize) -> RpcClient {
        let member = &self.coordinator.members()[index];
        let addr = member.local_addr().expect("member is not listening");
        RpcClient::new(&addr.to_string()).expect("bound address is a valid endpoint")
    }

    pub async fn stop(mut self) {
        let errors = self.coordinator.stop().await;
        assert!(errors.is_empty(), "stop failed: {errors:?}");
    }
}
