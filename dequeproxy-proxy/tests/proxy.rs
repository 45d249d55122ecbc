//! End-to-end tests for the dequeproxy server
//!
//! These tests run the full proxy on loopback:
//! - client bytes reach the upstream and come back
//! - the admin endpoints report queue state
//! - shutdown stops every task and drains the queue

use std::time::Duration;

use dequeproxy_core::QueueConfig;
use dequeproxy_proxy::{ProxyConfig, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

async fn echo_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

fn test_config(upstream: String, admin_port: Option<u16>) -> ProxyConfig {
    ProxyConfig {
        listen: "127.0.0.1:0".to_string(),
        upstream,
        workers: 2,
        admin_port,
        connect_timeout: Duration::from_secs(2),
        queue: QueueConfig::default(),
    }
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

/// Test that a client is relayed to the upstream through the queue
#[tokio::test]
async fn test_proxy_relays_to_upstream() {
    let upstream = echo_upstream().await;
    let server = Server::bind(test_config(upstream, None)).await.unwrap();
    let addr = server.local_addr().unwrap();
    let queue = server.queue();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(server.run(shutdown.clone()));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"hello through the queue").await.unwrap();
    let mut buf = vec![0u8; 23];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut buf))
        .await
        .expect("echo never arrived")
        .unwrap();
    assert_eq!(&buf, b"hello through the queue");
    drop(client);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    let stats = queue.stats();
    assert_eq!(stats.enqueued_total, 1);
    assert_eq!(stats.delivered_fifo, 1);
    assert!(stats.is_conserved());
}

/// Test the admin endpoints while the proxy is running
#[tokio::test]
async fn test_admin_endpoints() {
    let upstream = echo_upstream().await;
    let server = Server::bind(test_config(upstream, Some(0))).await.unwrap();
    let admin = server.admin_addr().expect("admin should be enabled");
    let admin = std::net::SocketAddr::from(([127, 0, 0, 1], admin.port()));
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(server.run(shutdown.clone()));

    let health = http_get(admin, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"), "unexpected response: {health}");
    assert!(health.contains("\"status\":\"healthy\""));

    let metrics = http_get(admin, "/metrics").await;
    assert!(metrics.contains("\"threshold\":10"));

    let prometheus = http_get(admin, "/metrics/prometheus").await;
    assert!(prometheus.contains("dequeproxy_queue_size"));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

/// Test that invalid queue limits fail at startup
#[tokio::test]
async fn test_invalid_queue_config_fails_bind() {
    let mut config = test_config("127.0.0.1:1".to_string(), None);
    config.queue = QueueConfig { timeout: Duration::ZERO, threshold: 10 };

    let err = Server::bind(config).await.err().expect("bind should fail");
    assert!(err.to_string().contains("Invalid admission queue configuration"));
}
