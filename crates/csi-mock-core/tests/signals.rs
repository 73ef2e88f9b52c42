//! Termination by OS signal. Kept in its own test binary: the signal goes to
//! the whole process, and handlers installed here would otherwise swallow it
//! for every other test.

use std::process::Command;
use std::time::Duration;

use csi_mock_config::{DriverConfig, EndpointSettings};
use csi_mock_core::{Coordinator, MemberState, MockService, RpcClient, ShutdownCause};
use csi_mock_test_utils::driver::TestSockets;
use pretty_assertions::assert_eq;

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn sighup_stops_members_and_removes_socket() {
    let sockets = TestSockets::new();
    let ep = sockets.endpoint("csi.sock");
    let settings = EndpointSettings {
        endpoint: ep.clone(),
        controller_endpoint: ep.clone(),
        enable_creds: false,
    };
    let mut coordinator = Coordinator::new(&settings, MockService::shared(DriverConfig::default()));
    let run = tokio::spawn(async move {
        let cause = coordinator.run().await;
        (cause, coordinator)
    });

    // Handlers are in place before the socket is bound, so a successful
    // call means the signal will be seen.
    let client = RpcClient::new(&ep).unwrap();
    let mut ready = false;
    for _ in 0..100 {
        if let Ok(resp) = client.probe().await {
            ready = resp.ready;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(ready, "driver never became ready");

    let status = Command::new("kill")
        .args(["-HUP", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let (cause, coordinator) = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("driver did not stop after SIGHUP")
        .unwrap();
    assert_eq!(cause.unwrap(), ShutdownCause::Signal("SIGHUP"));
    assert!(
        coordinator
            .members()
            .iter()
            .all(|m| m.state() == MemberState::Stopped)
    );
    assert!(!sockets.path("csi.sock").exists());
}
