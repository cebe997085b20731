use tether_core::{CloudMode, EngineEvent, RunningMode};
use tether_server::ElectionState;

use crate::integration::init_tracing;
use crate::utils::{TestEngine, free_port, test_config};

#[tokio::test]
async fn test_race_elects_one_server() {
    init_tracing();

    let port = free_port().await.expect("No free port");
    let mut a = TestEngine::spawn(test_config(port));
    let mut b = TestEngine::spawn(test_config(port));

    // Both ask for the same port at once
    let (open_a, open_b) = tokio::join!(a.handle.open(None), b.handle.open(None));
    open_a.expect("open a");
    open_b.expect("open b");

    let settled = |s: &tether_server::EngineStatus| {
        matches!(
            s.state,
            ElectionState::RunningAsServer | ElectionState::RunningAsClient
        )
    };
    let status_a = a.wait_for_status(settled).await.expect("a never settled");
    let status_b = b.wait_for_status(settled).await.expect("b never settled");

    let servers = [&status_a, &status_b]
        .iter()
        .filter(|s| s.state == ElectionState::RunningAsServer)
        .count();
    assert_eq!(servers, 1, "exactly one instance must own the port");

    let (server, client) = if status_a.state == ElectionState::RunningAsServer {
        (&mut a, &mut b)
    } else {
        (&mut b, &mut a)
    };

    client
        .events
        .wait_for_event(EngineEvent::RunningModeChanged(RunningMode::Client))
        .await
        .expect("client mode not reported");
    client
        .events
        .wait_for_event(EngineEvent::Connection)
        .await
        .expect("client never reached the host");

    // The client joined the host as a hardware participant
    server
        .events
        .wait_for_event(EngineEvent::CloudModeChanged(CloudMode::Cloud))
        .await
        .expect("host did not switch to cloud mode");
    let host = server.status().await.unwrap().host.expect("no host snapshot");
    assert_eq!(host.hardware.len(), 1);
    assert_eq!(client.status().await.unwrap().cloud_mode, CloudMode::Cloud);

    client.handle.close().await.unwrap();
    server.handle.close().await.unwrap();
}
