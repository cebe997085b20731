use futures::StreamExt;
use serde_json::json;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::integration::{init_tracing, start_server};

#[tokio::test]
async fn test_close_ends_sessions_of_stalled_readers() {
    init_tracing();

    let (engine, port) = start_server().await.expect("Failed to start host");

    // Completes the upgrade, then never reads
    let url = format!("ws://127.0.0.1:{port}/relay?roomId=r");
    let (mut stalled, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .expect("connect");
    engine
        .wait_for_status(|s| s.host.as_ref().is_some_and(|h| h.browsers.len() == 1))
        .await
        .unwrap();

    // Far more than the socket buffers hold
    let chunk = "x".repeat(64 * 1024);
    for _ in 0..200 {
        engine.handle.send(json!(chunk)).await.unwrap();
    }

    let started = Instant::now();
    tokio::time::timeout(Duration::from_secs(5), engine.handle.close())
        .await
        .expect("close hung on a stalled socket")
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));

    let status = engine.status().await.unwrap();
    assert!(status.host.is_none());
    assert!(
        TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.is_ok(),
        "port {port} still held after close"
    );

    // Whatever was buffered drains, then the host side is gone
    let ended = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(_)) = stalled.next().await {}
    })
    .await;
    assert!(ended.is_ok(), "socket stayed open after close");
}
