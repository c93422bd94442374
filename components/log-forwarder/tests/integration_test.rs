//! End-to-end tests of the delivery pipeline against a local mock endpoint.

use log_forwarder::{
    parser::{parser::RawLineParser, record::Record},
    runtime::orchestrator::{DeliveryConfig, DeliveryOrchestrator, DeliveryState},
    shipper::shipper::{BatchSender, RecordSink, ShipperError},
};
use serde_json::{Value, json};
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection and return everything received until EOF.
fn spawn_collector(listener: TcpListener) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        socket.read_to_end(&mut received).await.unwrap();
        received
    })
}

async fn bind_local() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn decode_lines(received: &[u8]) -> Vec<Value> {
    assert!(
        received.is_empty() || received.ends_with(b"\n"),
        "stream must end with a newline delimiter"
    );
    received
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).unwrap())
        .collect()
}

fn numbered_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| Record::from_line(&format!("  event number {i}  ")).unwrap())
        .collect()
}

#[tokio::test]
async fn sends_all_records_in_order_across_batches() {
    let (listener, addr) = bind_local().await;
    let collector = spawn_collector(listener);
    let sender = BatchSender::new("127.0.0.1", addr.port());
    let records = numbered_records(250);

    let summary = sender.send_all(&records).await.unwrap();
    let received = collector.await.unwrap();

    assert_eq!(summary.batches_written, 3);
    assert_eq!(summary.records_written, 250);
    assert_eq!(summary.records_skipped, 0);
    assert_eq!(summary.bytes_written, received.len());
    assert_eq!(sender.connection_attempts(), 1);

    let expected: Vec<Value> = (0..250)
        .map(|i| json!({"raw_content": format!("event number {i}")}))
        .collect();
    assert_eq!(decode_lines(&received), expected);
}

#[tokio::test]
async fn batch_size_controls_the_number_of_writes() {
    let (listener, addr) = bind_local().await;
    let collector = spawn_collector(listener);
    let sender = BatchSender::new("127.0.0.1", addr.port()).with_batch_size(7);

    let summary = sender.send_all(&numbered_records(50)).await.unwrap();
    let received = collector.await.unwrap();

    assert_eq!(summary.batches_written, 8);
    assert_eq!(decode_lines(&received).len(), 50);
}

#[tokio::test]
async fn every_attempt_opens_a_fresh_connection() {
    let (listener, addr) = bind_local().await;
    let sender = BatchSender::new("127.0.0.1", addr.port());
    let records = numbered_records(3);

    let collector = tokio::spawn(async move {
        let mut payloads = Vec::new();
        for _ in 0..2 {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            payloads.push(received);
        }
        payloads
    });

    sender.send_all(&records).await.unwrap();
    sender.send_all(&records).await.unwrap();
    let payloads = collector.await.unwrap();

    assert_eq!(sender.connection_attempts(), 2);
    assert_eq!(payloads[0], payloads[1]);
    assert_eq!(decode_lines(&payloads[0]).len(), 3);
}

#[tokio::test]
async fn peer_closing_mid_stream_fails_the_attempt() {
    let (listener, addr) = bind_local().await;
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
        drop(listener);
    });

    let padding = "x".repeat(1024);
    let records: Vec<Record> = (0..20_000)
        .map(|i| Record::from_line(&format!("{i} {padding}")).unwrap())
        .collect();
    let sender = BatchSender::new("127.0.0.1", addr.port());

    let err = sender.send_all(&records).await.unwrap_err();

    assert!(
        matches!(
            err,
            ShipperError::WriteFailed { .. } | ShipperError::WriteTimeout { .. }
        ),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn unreachable_endpoint_fails_without_panicking() {
    let (listener, addr) = bind_local().await;
    drop(listener);

    let sender = BatchSender::new("127.0.0.1", addr.port())
        .with_connect_timeout(Duration::from_secs(2));
    let err = sender.send_all(&numbered_records(1)).await.unwrap_err();

    assert!(matches!(err, ShipperError::ConnectionFailed { .. }));
    assert!(err.to_string().contains(&addr.port().to_string()));
}

#[tokio::test]
async fn forwards_a_directory_tree_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "foo\n\n  bar  \n").unwrap();
    fs::write(dir.path().join("b.txt"), "baz\n").unwrap();

    let (listener, addr) = bind_local().await;
    let collector = spawn_collector(listener);

    let mut orchestrator = DeliveryOrchestrator::new(
        DeliveryConfig::new(dir.path()),
        RawLineParser::new(),
        BatchSender::new("127.0.0.1", addr.port()),
    );
    let report = orchestrator.run().await;
    let received = collector.await.unwrap();

    assert_eq!(orchestrator.state(), DeliveryState::Done);
    assert_eq!(report.files_found, 2);
    assert_eq!(report.records_prepared, 3);
    assert_eq!(report.attempts, 1);
    assert_eq!(
        decode_lines(&received),
        vec![
            json!({"raw_content": "foo"}),
            json!({"raw_content": "bar"}),
            json!({"raw_content": "baz"}),
        ]
    );
}

#[tokio::test]
async fn retries_until_the_endpoint_comes_up() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.log"), "first\nsecond\nthird\n").unwrap();

    // Reserve a port, then leave it closed so the first attempt is refused.
    let (listener, addr) = bind_local().await;
    drop(listener);

    let retry_delay = Duration::from_millis(600);
    let late_collector = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let listener = TcpListener::bind(addr).await.unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        socket.read_to_end(&mut received).await.unwrap();
        received
    });

    let mut orchestrator = DeliveryOrchestrator::new(
        DeliveryConfig::new(dir.path()).with_retry_delay(retry_delay),
        RawLineParser::new(),
        BatchSender::new("127.0.0.1", addr.port()),
    );

    let started = std::time::Instant::now();
    let report = orchestrator.run().await;
    let elapsed = started.elapsed();
    let received = late_collector.await.unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(orchestrator.sink().connection_attempts(), 2);
    assert!(elapsed >= retry_delay, "elapsed {elapsed:?}");
    assert_eq!(
        decode_lines(&received),
        vec![
            json!({"raw_content": "first"}),
            json!({"raw_content": "second"}),
            json!({"raw_content": "third"}),
        ]
    );
}

#[tokio::test]
async fn static_fields_are_added_to_every_line() {
    use log_forwarder::helpers::load_config::Config;

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("svc.log"), "ready\n").unwrap();

    let cfg = Config::from_toml("[parser.static_fields]\nservice = \"billing\"\n").unwrap();
    let (listener, addr) = bind_local().await;
    let collector = spawn_collector(listener);

    let mut orchestrator = DeliveryOrchestrator::new(
        DeliveryConfig::from_config(dir.path(), &cfg),
        RawLineParser::from_config(&cfg.parser),
        BatchSender::new("127.0.0.1", addr.port()),
    );
    orchestrator.run().await;

    assert_eq!(
        decode_lines(&collector.await.unwrap()),
        vec![json!({"raw_content": "ready", "service": "billing"})]
    );
}
