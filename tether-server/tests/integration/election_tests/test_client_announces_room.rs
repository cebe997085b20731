use serde_json::json;
use tether_core::{EngineEvent, RelayFrame};
use tether_server::ElectionState;

use crate::integration::{init_tracing, start_server};
use crate::utils::{TestClient, TestEngine, test_config};

#[tokio::test]
async fn test_client_announces_room() {
    init_tracing();

    let (host, port) = start_server().await.expect("Failed to start host");

    // Room registered before the election is announced on connect
    let mut hardware = TestEngine::spawn(test_config(port));
    hardware.handle.register_room("room-9").await.unwrap();
    hardware.handle.open(None).await.unwrap();
    hardware
        .wait_for_state(ElectionState::RunningAsClient)
        .await
        .expect("second instance should run as client");
    hardware
        .events
        .wait_for_event(EngineEvent::Connection)
        .await
        .expect("client never connected");

    let host_status = host
        .wait_for_status(|s| {
            s.host
                .as_ref()
                .is_some_and(|h| h.bindings.contains_key("room-9"))
        })
        .await
        .expect("room-9 was never bound on the host");
    let snapshot = host_status.host.unwrap();
    assert_eq!(snapshot.hardware.len(), 1);
    assert_eq!(snapshot.bindings["room-9"], snapshot.hardware[0].id);

    let mut browser = TestClient::browser(port, "room-9")
        .await
        .expect("browser connect");
    host.wait_for_status(|s| s.host.as_ref().is_some_and(|h| h.browsers.len() == 1))
        .await
        .expect("browser never registered");

    // Browser -> remote hardware owner
    browser.send_data(json!("hi")).await.unwrap();
    let data = hardware
        .events
        .wait_for(|e| matches!(e, EngineEvent::Data(_)))
        .await
        .expect("hardware owner got nothing");
    assert_eq!(data, EngineEvent::Data(json!({ "data": "hi" })));

    // Remote hardware owner -> browsers of its room
    hardware.handle.send(json!("LED_ON")).await.unwrap();
    let frame = browser.recv().await.expect("browser got nothing");
    assert_eq!(frame, RelayFrame::message(json!({ "data": "LED_ON" })));

    browser.close().await.ok();
    hardware.handle.close().await.unwrap();
    host.handle.close().await.unwrap();
}
