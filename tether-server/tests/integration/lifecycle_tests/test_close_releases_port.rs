use std::net::Ipv4Addr;
use tether_core::EngineEvent;
use tether_server::ElectionState;
use tokio::net::TcpListener;

use crate::integration::{init_tracing, start_server};
use crate::utils::TestClient;

#[tokio::test]
async fn test_close_releases_port() {
    init_tracing();

    let (mut engine, port) = start_server().await.expect("Failed to start host");

    let mut browser = TestClient::browser(port, "room-1").await.unwrap();
    let mut hardware = TestClient::hardware(port).await.unwrap();
    engine
        .wait_for_status(|s| {
            s.host
                .as_ref()
                .is_some_and(|h| h.browsers.len() == 1 && h.hardware.len() == 1)
        })
        .await
        .unwrap();

    engine.handle.close().await.expect("first close");
    engine.handle.close().await.expect("second close");

    browser.expect_closed().await.expect("browser left open");
    hardware.expect_closed().await.expect("hardware left open");

    let status = engine.status().await.unwrap();
    assert_eq!(status.state, ElectionState::Closed);
    assert!(status.host.is_none());
    assert!(status.local_addr.is_none());

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await;
    assert!(listener.is_ok(), "port {port} still held after close");
    drop(listener);

    engine
        .events
        .wait_for_event(EngineEvent::Close)
        .await
        .expect("no close event");
    assert_eq!(engine.output.count(&EngineEvent::Close).await, 1);
}

#[tokio::test]
async fn test_reopen_after_close() {
    init_tracing();

    let (engine, _port) = start_server().await.expect("Failed to start host");

    engine.handle.close().await.unwrap();
    engine.handle.open(None).await.unwrap();
    engine
        .wait_for_state(ElectionState::RunningAsServer)
        .await
        .expect("engine did not reopen");

    engine.handle.close().await.unwrap();
}
