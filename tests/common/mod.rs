#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use trapper_sender::AgentConfig;

pub const HEADER: &[u8; 5] = b"ZBXD\x01";

/// Local stand-in for a trapper server. Answers each accepted connection
/// with the next canned response and records the request payloads.
pub struct FakeTrapper {
    pub port: u16,
    requests: mpsc::UnboundedReceiver<String>,
    handle: JoinHandle<()>,
}

impl FakeTrapper {
    pub async fn spawn(responses: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, requests) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();

                let mut prefix = [0u8; 13];
                socket.read_exact(&mut prefix).await.unwrap();
                assert_eq!(&prefix[..5], HEADER);
                assert_eq!(&prefix[9..], &[0, 0, 0, 0]);
                let len = u32::from_le_bytes([prefix[5], prefix[6], prefix[7], prefix[8]]);

                let mut payload = vec![0u8; len as usize];
                socket.read_exact(&mut payload).await.unwrap();
                tx.send(String::from_utf8(payload).unwrap()).unwrap();

                socket.write_all(&response).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        Self {
            port,
            requests,
            handle,
        }
    }

    /// Request payloads received so far, waiting for the server to finish.
    pub async fn finish(mut self) -> Vec<String> {
        self.handle.await.unwrap();
        let mut payloads = Vec::new();
        while let Ok(payload) = self.requests.try_recv() {
            payloads.push(payload);
        }
        payloads
    }
}

/// Accepts one connection, reads whatever arrives, and never answers. The
/// socket is held open for `hold`.
pub async fn spawn_silent_trapper(hold: Duration) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut sink = vec![0u8; 4096];
        let _ = tokio::time::timeout(hold, async {
            while let Ok(n) = socket.read(&mut sink).await {
                if n == 0 {
                    break;
                }
            }
            tokio::time::sleep(hold).await;
        })
        .await;
    });

    (port, handle)
}

/// A well-formed ack frame around `json`.
pub fn ack_frame(json: &str) -> Vec<u8> {
    let mut frame = HEADER.to_vec();
    frame.extend_from_slice(&(json.len() as u32).to_le_bytes());
    frame.extend_from_slice(&[0, 0, 0, 0]);
    frame.extend_from_slice(json.as_bytes());
    frame
}

pub fn success_ack(processed: usize) -> Vec<u8> {
    ack_frame(&format!(
        r#"{{"response":"success","info":"processed: {processed}; failed: 0; total: {processed}; seconds spent: 0.000100"}}"#
    ))
}

pub fn agent(port: u16) -> AgentConfig {
    AgentConfig {
        host: "h1".to_string(),
        server: "127.0.0.1".to_string(),
        port,
        time: 499_162_920,
        raw: HashMap::new(),
    }
}

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
