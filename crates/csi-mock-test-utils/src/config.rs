//! Driver configuration builders for tests.

use csi_mock_config::DriverConfig;

/// Fluent builder for [`DriverConfig`] in tests.
///
/// ```ignore
/// let config = TestDriverConfigBuilder::new()
///     .attach_limit(1)
///     .permissive_target_path(true)
///     .build();
/// ```
pub struct TestDriverConfigBuilder {
    config: DriverConfig,
}

impl TestDriverConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DriverConfig::default(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    pub fn disable_attach(mut self, disabled: bool) -> Self {
        self.config.disable_attach = disabled;
        self
    }

    pub fn attach_limit(mut self, limit: i64) -> Self {
        self.config.attach_limit = limit;
        self
    }

    pub fn node_expansion_required(mut self, required: bool) -> Self {
        self.config.node_expansion_required = required;
        self
    }

    pub fn enable_topology(mut self, enabled: bool) -> Self {
        self.config.enable_topology = enabled;
        self
    }

    pub fn disable_controller_expansion(mut self, disabled: bool) -> Self {
        self.config.disable_controller_expansion = disabled;
        self
    }

    pub fn disable_online_expansion(mut self, disabled: bool) -> Self {
        self.config.disable_online_expansion = disabled;
        self
    }

    pub fn permissive_target_path(mut self, permissive: bool) -> Self {
        self.config.permissive_target_path = permissive;
        self
    }

    pub fn build(self) -> DriverConfig {
        self.config
    }
}

impl Default for TestDriverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
