use serde_json::json;
use tether_core::{CloudMode, EngineEvent};

use crate::integration::{init_tracing, start_server};
use crate::utils::TestClient;

#[tokio::test]
async fn test_unbound_hardware_is_opaque() {
    init_tracing();

    let (mut engine, port) = start_server().await.expect("Failed to start host");

    let mut browser = TestClient::browser(port, "room-3").await.unwrap();
    let mut hardware = TestClient::hardware(port).await.unwrap();
    engine
        .events
        .wait_for_event(EngineEvent::CloudModeChanged(CloudMode::Cloud))
        .await
        .expect("host did not enter cloud mode");
    engine
        .wait_for_status(|s| s.host.as_ref().is_some_and(|h| h.browsers.len() == 1))
        .await
        .unwrap();

    hardware.send_data(json!("from hardware")).await.unwrap();
    browser.send_data(json!("from browser")).await.unwrap();

    browser
        .expect_silence(300)
        .await
        .expect("browser must not hear unbound hardware");
    hardware
        .expect_silence(300)
        .await
        .expect("unbound hardware must not receive browser traffic");

    // Neither message reached the local owner either
    let data = engine
        .output
        .events()
        .await
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::Data(_)))
        .count();
    assert_eq!(data, 0);

    engine.handle.close().await.unwrap();
}
