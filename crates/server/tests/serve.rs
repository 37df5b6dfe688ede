//! End-to-end startup and shutdown over a real socket.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use clap::Parser;
use medibills_api::ServicePhase;
use medibills_server::{bootstrap, config::Cli, seed, server};
use medibills_test_utils::TestDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

fn config(dir: &TestDir) -> medibills_server::config::Config {
    let url = dir.sqlite_url("serve.sqlite");
    Cli::try_parse_from([
        "medibills",
        "--database-url",
        url.as_str(),
        "--environment",
        "test",
        "--listen",
        "127.0.0.1:0",
    ])
    .unwrap()
    .config
}

async fn raw_request(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    response
}

#[tokio::test]
async fn test_serves_until_signalled_then_closes_pool() {
    let dir = TestDir::new();
    let config = config(&dir);
    let state = bootstrap::bootstrap(&config).await.unwrap();

    let listener = TcpListener::bind(config.listen_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server::run(listener, state.clone(), async move {
        let _ = stopped.await;
    }));

    let health = raw_request(
        addr,
        "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(health.starts_with("HTTP/1.1 200"), "{health}");
    assert!(health.contains("Medical Bills API is running"));
    assert_eq!(state.health.phase(), ServicePhase::Ready);

    let login = raw_request(
        addr,
        "POST /auth/login HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
         Content-Type: application/json\r\nContent-Length: 2\r\n\r\n{}",
    )
    .await;
    assert!(login.starts_with("HTTP/1.1 400"), "{login}");

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
    assert_eq!(state.health.phase(), ServicePhase::ShuttingDown);
    assert!(state.db.pool().is_closed());
}

#[tokio::test]
async fn test_seeded_demo_user_can_log_in() {
    let dir = TestDir::new();
    let state = bootstrap::bootstrap(&config(&dir)).await.unwrap();

    seed::seed_demo_user(&state).await.unwrap();
    let user = state.auth.login(seed::DEMO_USERNAME, seed::DEMO_PASSWORD.to_string()).await.unwrap();
    assert_eq!(user.email, seed::DEMO_EMAIL);
}
