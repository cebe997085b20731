use serde_json::json;
use tether_core::{CloudMode, EngineEvent, RelayFrame};

use crate::integration::{init_tracing, start_server};
use crate::utils::TestClient;

#[tokio::test]
async fn test_room_scenario() {
    init_tracing();

    let (mut engine, port) = start_server().await.expect("Failed to start host");
    assert_eq!(engine.status().await.unwrap().cloud_mode, CloudMode::Single);

    let mut b1 = TestClient::browser(port, "room-9").await.expect("B1 connect");
    engine
        .events
        .wait_for_event(EngineEvent::Connection)
        .await
        .expect("B1 not accepted");

    let mut h1 = TestClient::hardware(port).await.expect("H1 connect");
    engine
        .events
        .wait_for_event(EngineEvent::CloudModeChanged(CloudMode::Cloud))
        .await
        .expect("host did not enter cloud mode");

    h1.send(&RelayFrame::match_target("room-9")).await.unwrap();
    h1.send_data(json!("LED_ON")).await.unwrap();

    let frame = b1.recv().await.expect("B1 got nothing");
    assert_eq!(frame, RelayFrame::message(json!({ "data": "LED_ON" })));

    b1.send_data(json!("ack")).await.unwrap();
    let frame = h1.recv().await.expect("H1 got nothing");
    assert_eq!(frame, RelayFrame::message(json!({ "data": "ack" })));

    let host = engine.status().await.unwrap().host.expect("no host snapshot");
    assert_eq!(host.cloud_mode, CloudMode::Cloud);
    assert_eq!(host.hardware.len(), 1);
    assert_eq!(host.bindings["room-9"], host.hardware[0].id);
    assert_eq!(host.hardware[0].room_id.as_deref(), Some("room-9"));

    // Last hardware leaving drops back to single mode
    h1.close().await.ok();
    engine
        .events
        .wait_for_event(EngineEvent::CloudModeChanged(CloudMode::Single))
        .await
        .expect("host did not leave cloud mode");

    // Single mode hands browser traffic to the local owner; the binding is kept
    b1.send_data(json!("anyone?")).await.unwrap();
    engine
        .events
        .wait_for_event(EngineEvent::Data(json!({ "data": "anyone?" })))
        .await
        .expect("single mode must deliver upstream");
    let status = engine.status().await.unwrap();
    assert!(status.host.unwrap().bindings.contains_key("room-9"));

    b1.close().await.ok();
    engine.handle.close().await.unwrap();
}

#[tokio::test]
async fn test_rebinding_moves_room_to_latest_hardware() {
    init_tracing();

    let (engine, port) = start_server().await.expect("Failed to start host");

    let mut b1 = TestClient::browser(port, "room-9").await.unwrap();
    let mut h1 = TestClient::hardware(port).await.unwrap();
    let mut h2 = TestClient::hardware(port).await.unwrap();
    engine
        .wait_for_status(|s| {
            s.host
                .as_ref()
                .is_some_and(|h| h.hardware.len() == 2 && h.browsers.len() == 1)
        })
        .await
        .expect("participants not registered");

    h1.send(&RelayFrame::match_target("room-9")).await.unwrap();
    let h1_id = engine
        .wait_for_status(|s| s.host.as_ref().is_some_and(|h| h.bindings.contains_key("room-9")))
        .await
        .unwrap()
        .host
        .unwrap()
        .bindings["room-9"];

    b1.send_data(json!(1)).await.unwrap();
    assert_eq!(
        h1.recv().await.unwrap(),
        RelayFrame::message(json!({ "data": 1 }))
    );

    h2.send(&RelayFrame::match_target("room-9")).await.unwrap();
    engine
        .wait_for_status(|s| {
            s.host
                .as_ref()
                .is_some_and(|h| h.bindings.get("room-9") != Some(&h1_id))
        })
        .await
        .expect("room-9 never moved");

    b1.send_data(json!(2)).await.unwrap();
    assert_eq!(
        h2.recv().await.unwrap(),
        RelayFrame::message(json!({ "data": 2 }))
    );
    h1.expect_silence(300)
        .await
        .expect("H1 must not receive after rebinding");

    engine.handle.close().await.unwrap();
}
