mod common;

use common::{FakeTrapper, ack_frame, agent, closed_port, spawn_silent_trapper, success_ack};
use std::time::{Duration, Instant};
use trapper_sender::sender::{AckBody, SendPhase, TransportConfig};
use trapper_sender::{AckCode, SendOptions, TrapperSender};

fn bulk() -> SendOptions {
    SendOptions::default()
}

fn each() -> SendOptions {
    SendOptions {
        print_only: false,
        iterate_each: true,
    }
}

#[tokio::test]
async fn test_bulk_send_success() {
    let server = FakeTrapper::spawn(vec![success_ack(2)]).await;
    let mut sender = TrapperSender::new(agent(server.port));
    sender.add_item("load1", "0.42").unwrap();
    sender.add_item("load5", "0.40").unwrap();

    let outcomes = sender.send(bulk()).await.unwrap();
    let requests = server.finish().await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].code, AckCode::Success);
    assert_eq!(outcomes[0].failed, Some(0));
    assert_eq!(outcomes[0].entry, None);
    assert_eq!(sender.phase(), SendPhase::Done);

    assert_eq!(requests.len(), 1);
    let sent: serde_json::Value = serde_json::from_str(&requests[0]).unwrap();
    assert_eq!(sent["request"], "sender data");
    assert_eq!(sent["clock"], 499_162_920);
    assert_eq!(sent["data"].as_array().unwrap().len(), 2);
    assert_eq!(sent["data"][1]["key"], "load5");

    // Sending never clears the batch.
    assert_eq!(sender.item_count(), 2);
}

#[tokio::test]
async fn test_partial_failure_reports_code_one() {
    let server = FakeTrapper::spawn(vec![ack_frame(
        r#"{"response":"success","info":"processed: 1; failed: 2; total: 3; seconds spent: 0.000055"}"#,
    )])
    .await;
    let mut sender = TrapperSender::new(agent(server.port));
    for key in ["a", "b", "c"] {
        sender.add_item(key, "1").unwrap();
    }

    let outcomes = sender.send(bulk()).await.unwrap();
    server.finish().await;

    assert_eq!(outcomes[0].code, AckCode::Failed);
    assert_eq!(outcomes[0].exit_code(), 1);
    assert_eq!(outcomes[0].failed, Some(2));
    assert_eq!(
        outcomes[0].body.info(),
        Some("processed: 1; failed: 2; total: 3; seconds spent: 0.000055")
    );
}

#[tokio::test]
async fn test_ack_without_failure_count_is_unparseable() {
    let server = FakeTrapper::spawn(vec![ack_frame(
        r#"{"response":"failed","info":"failed: none"}"#,
    )])
    .await;
    let mut sender = TrapperSender::new(agent(server.port));
    sender.add_item("k", "v").unwrap();

    let outcomes = sender.send(bulk()).await.unwrap();
    server.finish().await;

    assert_eq!(outcomes[0].code, AckCode::Unparseable);
    assert_eq!(outcomes[0].exit_code(), 2);
    assert!(matches!(outcomes[0].body, AckBody::Response(_)));
}

#[tokio::test]
async fn test_bad_magic_echoes_sent_payload() {
    let server = FakeTrapper::spawn(vec![b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec()]).await;
    let mut sender = TrapperSender::new(agent(server.port));
    sender.add_item("k", "v").unwrap();

    let outcomes = sender.send(bulk()).await.unwrap();
    server.finish().await;

    assert_eq!(outcomes[0].code, AckCode::InvalidProtocol);
    assert_eq!(outcomes[0].exit_code(), 253);
    assert!(outcomes[0].body.to_string().contains(r#""key":"k""#));
}

#[tokio::test]
async fn test_truncated_ack_is_read_error() {
    let mut truncated = common::HEADER.to_vec();
    truncated.extend_from_slice(&100u32.to_le_bytes());
    truncated.extend_from_slice(&[0, 0, 0, 0]);
    truncated.extend_from_slice(br#"{"response":"succ"#);

    let server = FakeTrapper::spawn(vec![truncated]).await;
    let mut sender = TrapperSender::new(agent(server.port));
    sender.add_item("k", "v").unwrap();

    let outcomes = sender.send(bulk()).await.unwrap();
    server.finish().await;

    assert_eq!(outcomes[0].code, AckCode::ReadFailed);
    assert_eq!(outcomes[0].exit_code(), 254);
    assert_eq!(sender.phase(), SendPhase::Failed);
    assert_eq!(sender.item_count(), 1);
}

#[tokio::test]
async fn test_unreachable_server_is_connect_error() {
    let mut sender = TrapperSender::new(agent(closed_port()));
    sender.add_item("k", "v").unwrap();

    let outcomes = sender.send(bulk()).await.unwrap();

    assert_eq!(outcomes[0].code, AckCode::ConnectFailed);
    assert_eq!(outcomes[0].exit_code(), 255);
    assert!(
        outcomes[0]
            .body
            .to_string()
            .starts_with("Error talking to server")
    );
    assert_eq!(sender.phase(), SendPhase::Failed);
    assert_eq!(sender.stats().transport_faults, 1);
}

#[tokio::test]
async fn test_silent_server_times_out_with_read_error() {
    let (port, server) = spawn_silent_trapper(Duration::from_secs(3)).await;
    let transport = TransportConfig {
        timeout: Duration::from_millis(300),
        ..TransportConfig::new("127.0.0.1", port)
    };
    let mut sender = TrapperSender::with_transport(agent(port), transport);
    sender.add_item("k", "v").unwrap();

    let started = Instant::now();
    let outcomes = sender.send(bulk()).await.unwrap();
    let elapsed = started.elapsed();
    server.abort();

    assert_eq!(outcomes[0].code, AckCode::ReadFailed);
    assert_eq!(outcomes[0].exit_code(), 254);
    assert!(outcomes[0].body.to_string().contains("timed out"));
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(2));
    assert_eq!(sender.phase(), SendPhase::Failed);
    assert_eq!(sender.item_count(), 1);
}

#[tokio::test]
async fn test_silent_server_bounds_every_iterate_cycle() {
    let (port, server) = spawn_silent_trapper(Duration::from_secs(3)).await;
    let transport = TransportConfig {
        timeout: Duration::from_millis(200),
        ..TransportConfig::new("127.0.0.1", port)
    };
    let mut sender = TrapperSender::with_transport(agent(port), transport);
    sender.add_item("k1", "v1").unwrap();
    sender.add_item("k2", "v2").unwrap();

    let started = Instant::now();
    let outcomes = sender.send(each()).await.unwrap();
    let elapsed = started.elapsed();
    server.abort();

    // The second connect lands in the backlog and is never answered either.
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].code, AckCode::ReadFailed);
    assert!(!outcomes[1].code.is_success());
    assert!(elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn test_iterate_each_sends_one_item_per_cycle() {
    let server = FakeTrapper::spawn(vec![success_ack(1), success_ack(1), success_ack(1)]).await;
    let mut sender = TrapperSender::new(agent(server.port));
    sender.add_item("k1", "1").unwrap();
    sender.add_item("k2", "2").unwrap();
    sender
        .add_item_with("k3", "3", Some("h2"), Some(1_700_000_000))
        .unwrap();

    let outcomes = sender.send(each()).await.unwrap();
    let requests = server.finish().await;

    assert_eq!(outcomes.len(), 3);
    let labels: Vec<_> = outcomes.iter().map(|o| o.entry.clone().unwrap()).collect();
    assert_eq!(labels, vec!["h1,k1", "h1,k2", "h2,k3"]);

    assert_eq!(requests.len(), 3);
    let last: serde_json::Value = serde_json::from_str(&requests[2]).unwrap();
    assert_eq!(last["data"].as_array().unwrap().len(), 1);
    assert_eq!(last["data"][0]["clock"], 1_700_000_000);
    assert_eq!(last["clock"], 499_162_920);
    assert_eq!(sender.stats().attempts, 3);
}

#[tokio::test]
async fn test_send_discovery_merged_entry() {
    let server = FakeTrapper::spawn(vec![success_ack(1)]).await;
    let mut sender = TrapperSender::new(agent(server.port));
    sender
        .add_discovery("tires[front]", [("{$LOCATION}", "LEFT")])
        .unwrap();
    sender
        .add_discovery("tires[front]", [("{$LOCATION}", "RIGHT")])
        .unwrap();

    let outcomes = sender.send_discovery(bulk()).await.unwrap();
    let requests = server.finish().await;

    assert_eq!(outcomes[0].code, AckCode::Success);
    let sent: serde_json::Value = serde_json::from_str(&requests[0]).unwrap();
    assert_eq!(
        sent["data"]["h1,tires[front]"],
        serde_json::json!([{"{$LOCATION}": "LEFT"}, {"{$LOCATION}": "RIGHT"}])
    );
}

#[tokio::test]
async fn test_send_discovery_iterate_labels_entries() {
    let server = FakeTrapper::spawn(vec![success_ack(1), success_ack(1)]).await;
    let mut sender = TrapperSender::new(agent(server.port));
    sender
        .add_discovery("vfs.fs.discovery", [("{#FSNAME}", "/")])
        .unwrap();
    sender
        .add_discovery_for(Some("h2"), "net.if.discovery", [("{#IFNAME}", "eth0")])
        .unwrap();

    let outcomes = sender.send_discovery(each()).await.unwrap();
    let requests = server.finish().await;

    assert_eq!(outcomes[0].entry.as_deref(), Some("h1,vfs.fs.discovery"));
    assert_eq!(outcomes[1].entry.as_deref(), Some("h2,net.if.discovery"));
    let second: serde_json::Value = serde_json::from_str(&requests[1]).unwrap();
    assert_eq!(second["data"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_batch_sends_empty_object() {
    let server = FakeTrapper::spawn(vec![success_ack(0)]).await;
    let mut sender = TrapperSender::new(agent(server.port));

    let outcomes = sender.send(bulk()).await.unwrap();
    let requests = server.finish().await;

    assert_eq!(outcomes[0].code, AckCode::Success);
    assert_eq!(requests[0], r#"{"request":"sender data","data":{}}"#);
}

#[tokio::test]
async fn test_source_address_binding() {
    let server = FakeTrapper::spawn(vec![success_ack(1)]).await;
    let transport = TransportConfig {
        source_address: Some("127.0.0.1".parse().unwrap()),
        ..TransportConfig::new("127.0.0.1", server.port)
    };
    let mut sender = TrapperSender::with_transport(agent(server.port), transport);
    sender.add_item("k", "v").unwrap();

    let outcomes = sender.send(bulk()).await.unwrap();
    server.finish().await;
    assert_eq!(outcomes[0].code, AckCode::Success);
}
