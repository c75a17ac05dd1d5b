//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use dashboard_sharing::config::ServerConfig;
use dashboard_sharing::lifecycle::{build_service, Shutdown};
use dashboard_sharing::HttpServer;

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub url: String,
    pub shutdown: Arc<Shutdown>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

/// Start the sharing server with `config` on 127.0.0.1:0.
pub async fn spawn_server(config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = Arc::new(build_service(&config).unwrap());
    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config, service);
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, None, rx).await });

    TestServer {
        url: format!("http://{}", addr),
        shutdown,
        handle,
    }
}

/// Start a backend that answers every request with `status` and `body`.
#[allow(dead_code)]
pub async fn start_fixed_backend(status_line: &'static str, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}
