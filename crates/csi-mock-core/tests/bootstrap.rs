//! End-to-end bootstrap scenarios: real listeners, real clients.

use std::collections::BTreeMap;

use csi_mock_config::{DriverConfig, EndpointSettings};
use csi_mock_core::server::credentials::SECRET_KEY;
use csi_mock_core::service::TOPOLOGY_VALUE;
use csi_mock_core::service::types::*;
use csi_mock_core::{Code, Coordinator, MemberState, MockService, RpcClient, RpcClientError, ShutdownCause};
use csi_mock_test_utils::config::TestDriverConfigBuilder;
use csi_mock_test_utils::driver::{TestDriver, TestSockets};
use csi_mock_test_utils::tracing_setup::capture_logs;
use pretty_assertions::assert_eq;

fn settings(primary: &str, secondary: &str, creds: bool) -> EndpointSettings {
    EndpointSettings {
        endpoint: primary.to_string(),
        controller_endpoint: secondary.to_string(),
        enable_creds: creds,
    }
}

fn status_code(err: RpcClientError) -> Code {
    match err {
        RpcClientError::Status(e) => e.code,
        other => panic!("expected a status error, got {other}"),
    }
}

#[test_log::test(tokio::test)]
async fn combined_unix_serves_every_role() {
    let sockets = TestSockets::new();
    let ep = sockets.endpoint("csi.sock");
    let driver = TestDriver::start(&settings(&ep, &ep, false), DriverConfig::default()).await;

    assert_eq!(driver.coordinator.members().len(), 1);
    assert!(sockets.path("csi.sock").exists());

    let client = RpcClient::new(&ep).unwrap();
    assert!(client.probe().await.unwrap().ready);
    assert_eq!(client.list_volumes().await.unwrap().entries.len(), 3);
    let info = client.node_get_info().await.unwrap();
    assert_eq!(info.node_id, csi_mock_config::DEFAULT_DRIVER_NAME);

    driver.stop().await;
    assert!(!sockets.path("csi.sock").exists());
}

#[test_log::test(tokio::test)]
async fn split_tcp_exposes_roles_per_member() {
    let driver = TestDriver::start(
        &settings("tcp://127.0.0.1:0", "tcp://localhost:0", false),
        DriverConfig::default(),
    )
    .await;
    let controller = driver.client(0);
    let node = driver.client(1);

    // Identity on both.
    assert!(controller.probe().await.unwrap().ready);
    assert!(node.probe().await.unwrap().ready);

    controller.list_volumes().await.unwrap();
    assert!(matches!(
        node.list_volumes().await,
        Err(RpcClientError::Request(_))
    ));
    node.node_get_capabilities().await.unwrap();
    assert!(matches!(
        controller.node_get_capabilities().await,
        Err(RpcClientError::Request(_))
    ));

    driver.stop().await;
}

#[tokio::test]
async fn split_members_share_one_service() {
    let driver = TestDriver::start(
        &settings("tcp://127.0.0.1:0", "tcp://localhost:0", false),
        TestDriverConfigBuilder::new().permissive_target_path(true).build(),
    )
    .await;
    let controller = driver.client(0);
    let node = driver.client(1);

    let created = controller
        .create_volume(&CreateVolumeRequest {
            name: "shared".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let node_id = node.node_get_info().await.unwrap().node_id;
    controller
        .controller_publish_volume(&ControllerPublishVolumeRequest {
            volume_id: created.volume.volume_id.clone(),
            node_id,
            ..Default::default()
        })
        .await
        .unwrap();

    // The node member sees the attach made through the controller member.
    node.node_publish_volume(&NodePublishVolumeRequest {
        volume_id: created.volume.volume_id,
        target_path: "/tmp/csi-mock-shared-target".to_string(),
        ..Default::default()
    })
    .await
    .unwrap();

    driver.stop().await;
}

#[tokio::test]
async fn start_replaces_stale_socket_file() {
    let sockets = TestSockets::new();
    std::fs::write(sockets.path("stale.sock"), b"leftover").unwrap();
    let ep = sockets.endpoint("stale.sock");

    let driver = TestDriver::start(&settings(&ep, &ep, false), DriverConfig::default()).await;
    RpcClient::new(&ep).unwrap().probe().await.unwrap();
    driver.stop().await;
    assert!(!sockets.path("stale.sock").exists());
}

#[tokio::test]
async fn split_unix_removes_both_sockets() {
    let sockets = TestSockets::new();
    let driver = TestDriver::start(
        &settings(&sockets.endpoint("ctrl.sock"), &sockets.endpoint("node.sock"), false),
        DriverConfig::default(),
    )
    .await;
    assert!(sockets.path("ctrl.sock").exists());
    assert!(sockets.path("node.sock").exists());

    driver.stop().await;
    assert!(!sockets.path("ctrl.sock").exists());
    assert!(!sockets.path("node.sock").exists());
}

#[test_log::test(tokio::test)]
async fn run_returns_after_shutdown_handle() {
    let sockets = TestSockets::new();
    let ep = sockets.endpoint("run.sock");
    let mut coordinator = Coordinator::new(
        &settings(&ep, &ep, false),
        MockService::shared(DriverConfig::default()),
    );
    let handle = coordinator.shutdown_handle();
    let task = tokio::spawn(async move {
        let cause = coordinator.run().await;
        (cause, coordinator)
    });

    let client = RpcClient::new(&ep).unwrap();
    let mut ready = false;
    for _ in 0..50 {
        if client.probe().await.is_ok() {
            ready = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(ready, "driver never became reachable");

    handle.trigger();
    let (cause, coordinator) = task.await.unwrap();
    assert_eq!(cause.unwrap(), ShutdownCause::Requested);
    assert_eq!(coordinator.members()[0].state(), MemberState::Stopped);
    assert!(!sockets.path("run.sock").exists());
}

#[tokio::test]
async fn malformed_hooks_file_still_starts() {
    let sockets = TestSockets::new();
    let hooks_path = sockets.path("hooks.yaml");
    std::fs::write(&hooks_path, "notAHook: [unterminated").unwrap();

    let mut config = DriverConfig {
        hooks_file: Some(hooks_path),
        ..Default::default()
    };
    let logs = capture_logs("error");
    config.resolve_hooks().await;
    assert!(config.hooks.is_none());
    let logged = logs.contents();
    assert!(logged.contains("ERROR"), "no error logged: {logged}");
    assert!(logged.contains("Failed to load hooks file"), "{logged}");
    assert!(logged.contains("hooks.yaml"), "{logged}");
    drop(logs);

    let driver = TestDriver::combined_tcp(config).await;
    assert!(driver.client(0).probe().await.unwrap().ready);
    driver.stop().await;
}

#[tokio::test]
async fn credentials_enforced_on_both_members() {
    let driver = TestDriver::start(
        &settings("tcp://127.0.0.1:0", "tcp://localhost:0", true),
        DriverConfig::default(),
    )
    .await;
    let controller = driver.client(0);
    let node = driver.client(1);

    let err = controller
        .create_volume(&CreateVolumeRequest {
            name: "v".to_string(),
            secrets: BTreeMap::from([(SECRET_KEY.to_string(), "wrong".to_string())]),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(status_code(err), Code::Unauthenticated);

    controller
        .create_volume(&CreateVolumeRequest {
            name: "v".to_string(),
            secrets: BTreeMap::from([(SECRET_KEY.to_string(), "secretval1".to_string())]),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = node
        .node_publish_volume(&NodePublishVolumeRequest {
            volume_id: "1".to_string(),
            target_path: "/tmp/csi-mock-creds-target".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(status_code(err), Code::InvalidArgument);

    driver.stop().await;
}

#[tokio::test]
async fn second_member_failure_leaves_no_socket_behind() {
    let sockets = TestSockets::new();
    let mut coordinator = Coordinator::new(
        &settings(&sockets.endpoint("ctrl.sock"), "tcp://", false),
        MockService::shared(DriverConfig::default()),
    );
    assert!(coordinator.run().await.is_err());
    assert!(!sockets.path("ctrl.sock").exists());
}

fn publish_to(volume_id: &str, node_id: &str) -> ControllerPublishVolumeRequest {
    ControllerPublishVolumeRequest {
        volume_id: volume_id.to_string(),
        node_id: node_id.to_string(),
        ..Default::default()
    }
}

fn expand(volume_id: &str, capacity_bytes: i64) -> ControllerExpandVolumeRequest {
    ControllerExpandVolumeRequest {
        volume_id: volume_id.to_string(),
        capacity_bytes,
        ..Default::default()
    }
}

#[tokio::test]
async fn attach_limit_counts_across_split_members() {
    let driver = TestDriver::start(
        &settings("tcp://127.0.0.1:0", "tcp://localhost:0", false),
        TestDriverConfigBuilder::new().attach_limit(1).build(),
    )
    .await;
    let controller = driver.client(0);
    let node = driver.client(1);

    let info = node.node_get_info().await.unwrap();
    assert_eq!(info.max_volumes_per_node, 1);

    controller
        .controller_publish_volume(&publish_to("1", &info.node_id))
        .await
        .unwrap();
    let err = controller
        .controller_publish_volume(&publish_to("2", &info.node_id))
        .await
        .unwrap_err();
    assert_eq!(status_code(err), Code::ResourceExhausted);

    driver.stop().await;
}

#[tokio::test]
async fn driver_name_and_topology_reach_both_members() {
    let driver = TestDriver::start(
        &settings("tcp://127.0.0.1:0", "tcp://localhost:0", false),
        TestDriverConfigBuilder::new()
            .name("topo.csi.example")
            .enable_topology(true)
            .build(),
    )
    .await;
    let controller = driver.client(0);
    let node = driver.client(1);
    let segment = BTreeMap::from([(
        "topo.csi.example/node".to_string(),
        TOPOLOGY_VALUE.to_string(),
    )]);

    assert_eq!(node.get_plugin_info().await.unwrap().name, "topo.csi.example");
    let caps = controller.get_plugin_capabilities().await.unwrap().capabilities;
    assert!(caps.contains(&PluginCapability::VolumeAccessibilityConstraints));

    let info = node.node_get_info().await.unwrap();
    assert_eq!(info.node_id, "topo.csi.example");
    assert_eq!(info.accessible_topology.unwrap().segments, segment);

    let created = controller
        .create_volume(&CreateVolumeRequest {
            name: "zoned".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.volume.accessible_topology[0].segments, segment);

    driver.stop().await;
}

#[tokio::test]
async fn disabled_attach_lets_node_publish_directly() {
    let sockets = TestSockets::new();
    let driver =
        TestDriver::combined_tcp(TestDriverConfigBuilder::new().disable_attach(true).build()).await;
    let client = driver.client(0);

    let caps = client.controller_get_capabilities().await.unwrap().capabilities;
    assert!(!caps.contains(&ControllerCapability::PublishUnpublishVolume));
    let node_id = client.node_get_info().await.unwrap().node_id;
    let err = client
        .controller_publish_volume(&publish_to("1", &node_id))
        .await
        .unwrap_err();
    assert_eq!(status_code(err), Code::Unimplemented);

    client
        .node_publish_volume(&NodePublishVolumeRequest {
            volume_id: "1".to_string(),
            target_path: sockets.path("target").display().to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    driver.stop().await;
}

#[tokio::test]
async fn node_only_expansion() {
    let driver = TestDriver::combined_tcp(
        TestDriverConfigBuilder::new()
            .disable_controller_expansion(true)
            .node_expansion_required(true)
            .build(),
    )
    .await;
    let client = driver.client(0);

    let caps = client.controller_get_capabilities().await.unwrap().capabilities;
    assert!(!caps.contains(&ControllerCapability::ExpandVolume));
    let err = client.controller_expand_volume(&expand("1", i64::MAX)).await.unwrap_err();
    assert_eq!(status_code(err), Code::Unimplemented);
    let node_caps = client.node_get_capabilities().await.unwrap().capabilities;
    assert_eq!(node_caps, vec![NodeCapability::ExpandVolume]);

    driver.stop().await;
}

#[tokio::test]
async fn offline_expansion_rejects_attached_volume() {
    let driver = TestDriver::combined_tcp(
        TestDriverConfigBuilder::new()
            .disable_online_expansion(true)
            .node_expansion_required(true)
            .build(),
    )
    .await;
    let client = driver.client(0);

    let caps = client.get_plugin_capabilities().await.unwrap().capabilities;
    assert!(caps.contains(&PluginCapability::OfflineVolumeExpansion));
    assert!(!caps.contains(&PluginCapability::OnlineVolumeExpansion));

    let grown = client.controller_expand_volume(&expand("2", i64::MAX)).await.unwrap();
    assert_eq!(grown.capacity_bytes, i64::MAX);
    assert!(grown.node_expansion_required);

    let node_id = client.node_get_info().await.unwrap().node_id;
    client
        .controller_publish_volume(&publish_to("1", &node_id))
        .await
        .unwrap();
    let err = client.controller_expand_volume(&expand("1", i64::MAX)).await.unwrap_err();
    assert_eq!(status_code(err), Code::FailedPrecondition);

    driver.stop().await;
}
