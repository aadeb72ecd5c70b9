#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use lcp_core::license::License;
use lcp_core::protocol::{
    license_server_dispatcher, AuthAndContentPayload, AuthAndLicense, Command, Connection,
    ContentPayload, Endpoint, ReplyError,
};
use lcp_core::service::ServerContext;
use lcp_core::utils::crypto::random_key;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

async fn start(ctx: Arc<ServerContext>) -> (SocketAddr, mpsc::Sender<()>) {
    let endpoint = Endpoint::bind(
        "127.0.0.1:0",
        license_server_dispatcher(ctx.clone()),
        ctx.metrics.clone(),
    )
    .await
    .unwrap();
    let addr = endpoint.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(endpoint.run_with_shutdown(rx));
    (addr, tx)
}

async fn send<T: serde::Serialize>(addr: SocketAddr, command: Command, payload: Option<&T>) -> ReplyError {
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut conn = Connection::client(stream);
    conn.write_command(command).await.unwrap();
    if let Some(payload) = payload {
        conn.write_value(payload).await.unwrap();
    }
    conn.finish_writes().await.unwrap();
    conn.read_payload().await.unwrap()
}

fn content_payload(password: &str, data: Vec<u8>) -> AuthAndContentPayload {
    AuthAndContentPayload::new(
        "peer",
        password,
        ContentPayload {
            content_id: "book".into(),
            content_key: random_key().to_vec(),
            name: "book.epub".into(),
            data,
            path: None,
            size: None,
            sha256: None,
        },
    )
}

#[tokio::test]
async fn missing_payload_gets_a_reply() {
    let ctx = common::context_with(common::config());
    let (addr, _shutdown) = start(ctx).await;

    let reply = send::<AuthAndLicense>(addr, Command::UpdateLicense, None).await;
    assert_eq!(reply.message, "Missing mandatory payload.");
}

#[tokio::test]
async fn bad_password_creates_nothing() {
    let ctx = common::context_with(common::config());
    let (addr, _shutdown) = start(ctx.clone()).await;

    let payload = content_payload("not-the-password", common::build_epub(true, &[]));
    let reply = send(addr, Command::CreateContent, Some(&payload)).await;

    assert!(reply.message.starts_with("Error : bad username / password"));
    assert!(ctx.contents.get("book").is_err());
    assert!(ctx.contents.list().unwrap().is_empty());
}

#[tokio::test]
async fn create_content_over_tcp() {
    let ctx = common::context_with(common::config());
    let (addr, _shutdown) = start(ctx.clone()).await;

    let epub = common::build_epub(true, &[]);
    let payload = content_payload("secret", epub.clone());
    let reply = send(addr, Command::CreateContent, Some(&payload)).await;

    assert!(reply.is_ok(), "unexpected reply: {}", reply.message);
    let content = ctx.contents.get("book").unwrap();
    assert_eq!(content.length, epub.len() as u64);
    assert_eq!(ctx.storage.get("book").unwrap(), epub);
}

#[tokio::test]
async fn unknown_token_rejected_before_payload() {
    let ctx = common::context_with(common::config());
    let (addr, _shutdown) = start(ctx.clone()).await;

    // the connection stays open for writing: the reply must not wait for a payload
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"DELETEALL\n").await.unwrap();

    let mut reply_bytes = Vec::new();
    stream.read_to_end(&mut reply_bytes).await.unwrap();
    let reply: ReplyError = rmp_serde::from_slice(&reply_bytes).unwrap();
    assert!(reply.message.contains("Unknown command"));
    assert_eq!(ctx.metrics.snapshot().protocol_errors, 1);
}

#[tokio::test]
async fn update_license_over_tcp() {
    let ctx = common::context_with(common::config());
    ctx.licenses
        .add(License {
            id: "lic-1".into(),
            content_id: "book".into(),
            provider: "http://old.test".into(),
            ..Default::default()
        })
        .unwrap();
    let (addr, _shutdown) = start(ctx.clone()).await;

    let incoming = License {
        id: "lic-1".into(),
        provider: "http://new.test".into(),
        ..Default::default()
    };
    let reply = send(
        addr,
        Command::UpdateLicense,
        Some(&AuthAndLicense::new("peer", "secret", incoming)),
    )
    .await;

    assert!(reply.is_ok());
    let stored = ctx.licenses.get("lic-1").unwrap();
    assert_eq!(stored.provider, "http://new.test");
    assert_eq!(stored.content_id, "book");
}

#[tokio::test]
async fn update_of_unknown_license() {
    let ctx = common::context_with(common::config());
    let (addr, _shutdown) = start(ctx).await;

    let incoming = License {
        id: "nope".into(),
        ..Default::default()
    };
    let reply = send(
        addr,
        Command::UpdateLicense,
        Some(&AuthAndLicense::new("peer", "secret", incoming)),
    )
    .await;
    assert!(reply.message.contains("Record not found"));
}

/// Updates of one license are not serialized against each other: each
/// replaces the stored fields, so the one applied last silently discards
/// the other's changes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_last_write_wins() {
    let ctx = common::context_with(common::config());
    ctx.licenses
        .add(License {
            id: "lic-1".into(),
            content_id: "book".into(),
            ..Default::default()
        })
        .unwrap();
    let (addr, _shutdown) = start(ctx.clone()).await;

    let mut print_update = License {
        id: "lic-1".into(),
        ..Default::default()
    };
    print_update.rights.print = Some(10);
    let mut copy_update = License {
        id: "lic-1".into(),
        ..Default::default()
    };
    copy_update.rights.copy = Some(500);

    let first = AuthAndLicense::new("peer", "secret", print_update);
    let second = AuthAndLicense::new("peer", "secret", copy_update);
    let (a, b) = tokio::join!(
        send(addr, Command::UpdateLicense, Some(&first)),
        send(addr, Command::UpdateLicense, Some(&second)),
    );
    assert!(a.is_ok() && b.is_ok());

    let rights = ctx.licenses.get("lic-1").unwrap().rights;
    // exactly one of the two updates survives
    assert!(rights.print.is_some() ^ rights.copy.is_some());
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let ctx = common::context_with(common::config());
    let endpoint = Endpoint::bind(
        "127.0.0.1:0",
        license_server_dispatcher(ctx.clone()),
        ctx.metrics.clone(),
    )
    .await
    .unwrap();
    let (tx, rx) = mpsc::channel(1);
    let server = tokio::spawn(endpoint.run_with_shutdown(rx));

    tx.send(()).await.unwrap();
    server.await.unwrap().unwrap();
}
