//! End-to-end poll scenarios against the assembled service and a live server

use chrono::NaiveDate;
use livepoll::domain::Poll;
use livepoll::io::{
    start_http_server, AppState, FileSystemInitializer, LocalResourceEncoder, PackStore, PngQrCodec,
    StaticAddress,
};
use livepoll::services::{AccessGuard, DateAndTopicIdGenerator, PollRegistry, PollService, VotingPipeline};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;

fn build_service(root: &Path, port: u16) -> PollService {
    let generator = DateAndTopicIdGenerator::with_clock(|| {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(12, 30, 0).unwrap()
    });
    let encoder = Arc::new(LocalResourceEncoder::new(
        StaticAddress(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
        port,
    ));
    let pipeline = VotingPipeline::new(encoder, Arc::new(PngQrCodec::new(2, 2)), root.join("qr"));
    let store = PackStore::new(root.join("base"));
    FileSystemInitializer::new(&store, root.join("qr"), false).ensure_base_dir_ready().unwrap();
    PollService::new(Arc::new(PollRegistry::new(generator)), pipeline, store)
}

#[test]
fn test_lunch_scenario() {
    let dir = tempdir().unwrap();
    let service = build_service(dir.path(), 8080);

    let created = service.create_poll(Poll::new("Lunch", ["Pizza", "Sushi"]).unwrap()).unwrap();
    let id = created.poll_id.to_string();
    assert_eq!(id, "2026-10-16-12-30-00-lunch");

    let resources: Vec<&str> = created.targets.iter().map(|t| t.resource.as_str()).collect();
    assert_eq!(
        resources,
        [
            "http://192.168.1.20:8080/polls/2026-10-16-12-30-00-lunch/pizza",
            "http://192.168.1.20:8080/polls/2026-10-16-12-30-00-lunch/sushi",
        ]
    );
    assert!(dir.path().join("qr").join(format!("{id}-pizza.png")).is_file());
    assert!(dir.path().join("qr").join(format!("{id}-sushi.png")).is_file());

    let path = service.persist_poll(&id).unwrap();
    assert!(path.starts_with(dir.path().join("base").join("packs")));

    let metas = service.store().load_all_pack_metas().unwrap();
    assert_eq!(metas.len(), 1);
    assert_eq!(metas.values().next().unwrap().title, "Lunch");

    let file_name = path.file_name().unwrap().to_str().unwrap();
    let pack = service.store().load_pack_from_disk(file_name).unwrap();
    assert_eq!(pack.options(), ["Pizza", "Sushi"]);
}

#[test]
fn test_delete_gate_protects_other_files() {
    let dir = tempdir().unwrap();
    let service = build_service(dir.path(), 8080);

    let stray = dir.path().join("base").join("notes.json");
    std::fs::write(&stray, "{}").unwrap();
    assert!(service.store().delete_pack(&stray).is_err());
    assert!(service.store().delete_pack("/etc/passwd").is_err());
    assert!(stray.exists());
}

async fn http_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn connect_with_retry(addr: SocketAddr) {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server did not start on {addr}");
}

#[tokio::test]
async fn test_server_round_trip() {
    let dir = tempdir().unwrap();

    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let state = Arc::new(AppState::new(build_service(dir.path(), port), AccessGuard));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(start_http_server(addr, state, shutdown_rx));
    connect_with_retry(addr).await;

    let health = http_request(addr, "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.ends_with("ok"));

    let body = r#"{"topic":"Lunch","options":["Pizza","Sushi"]}"#;
    let create = format!(
        "POST /polls HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let created = http_request(addr, &create).await;
    assert!(created.starts_with("HTTP/1.1 201"), "{created}");
    assert!(created.ends_with("2026-10-16-12-30-00-lunch"));

    let vote = http_request(
        addr,
        "GET /polls/2026-10-16-12-30-00-lunch/sushi HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(vote.starts_with("HTTP/1.1 200"));
    assert!(vote.contains("I registered your vote \"sushi\"."));

    shutdown_tx.send(true).unwrap();
    server.await.unwrap().unwrap();
}

#[test]
fn test_build_revision_stamped() {
    let revision = env!("GIT_HASH");
    assert!(!revision.is_empty());
    assert!(!revision.contains(char::is_whitespace));
}
