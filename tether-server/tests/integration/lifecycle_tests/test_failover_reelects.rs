use tether_core::{EngineEvent, RunningMode};
use tether_server::ElectionState;

use crate::integration::{init_tracing, start_server};
use crate::utils::{TestEngine, test_config};

#[tokio::test]
async fn test_failover_reelects() {
    init_tracing();

    let (host, port) = start_server().await.expect("Failed to start host");

    let mut follower = TestEngine::spawn(test_config(port));
    follower.handle.register_room("room-9").await.unwrap();
    follower.handle.open(None).await.unwrap();
    follower
        .events
        .wait_for_event(EngineEvent::Connection)
        .await
        .expect("follower never connected");

    // Losing the host promotes the follower
    host.handle.close().await.unwrap();

    let status = follower
        .wait_for_state(ElectionState::RunningAsServer)
        .await
        .expect("follower was not promoted");
    assert_eq!(status.running_mode, RunningMode::Server);
    assert_eq!(status.client_room_id.as_deref(), Some("room-9"));
    assert_eq!(status.master_room_ids, vec!["room-9"]);
    assert_eq!(
        status.local_addr.map(|addr| addr.port()),
        Some(port),
        "re-election reuses the opened port"
    );

    follower
        .events
        .wait_for_event(EngineEvent::RunningModeChanged(RunningMode::Server))
        .await
        .expect("promotion not reported");

    follower.handle.close().await.unwrap();
}
