// BSD 3-Clause License
// Copyright (c) 2026, Virtual Cable S.L.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice,
//    this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice,
//    this list of conditions and the following disclaimer in the documentation
//    and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors
//    may be used to endorse or promote products derived from this software
//    without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
// AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE
// FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
// CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY,
// OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

// Authors: Adolfo Gómez, dkmaster at dkmon dot com
//! Helpers shared by the crate's tests: a server with a test clock, fake
//! peers driven over channels, and an event-stream cursor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::broadcast;

use shared::action::{Action, Meta};
use shared::protocol::{Frame, PeerWire, peer_pair};

use crate::client::ServerClient;
use crate::events::ServerEvent;
use crate::server::{Env, Server, ServerOptions};

pub fn test_options() -> ServerOptions {
    ServerOptions {
        subprotocol: Some("1.0.0".to_string()),
        supports: Some("^1.0.0".to_string()),
        time: Some(0),
        id: Some("uuid".to_string()),
        env: Some(Env::Development),
        ..ServerOptions::default()
    }
}

/// Server with a deterministic clock and node id `server:uuid`.
pub fn test_server() -> Server {
    shared::log::setup_logging("debug", shared::log::LogType::Test);
    Server::new(test_options()).unwrap()
}

/// One fake connection: the wire side of a peer pair plus the attached
/// server client.
pub struct TestClient {
    pub wire: PeerWire,
    pub client: Arc<ServerClient>,
    pub node_id: String,
}

impl TestClient {
    pub async fn connect(server: &Server, node_id: &str, ip: &str) -> TestClient {
        let (channels, wire) = peer_pair(64);
        let addr: SocketAddr = format!("{}:2000", ip).parse().unwrap();
        let client = server.attach_peer(channels, addr);
        TestClient {
            wire,
            client,
            node_id: node_id.to_string(),
        }
    }

    /// Handshakes with the given credentials and waits for the verdict
    /// frame. Returns true on `connected`.
    pub async fn authenticate(&self, credentials: Value) -> bool {
        self.wire
            .emit_connect(&self.node_id, "1.0.0", credentials)
            .await
            .unwrap();
        match self.next_frame().await {
            Some(Frame::Connected { .. }) => true,
            _ => false,
        }
    }

    /// Connects and authenticates with the default test credentials.
    pub async fn authenticated(server: &Server, node_id: &str) -> TestClient {
        let client = TestClient::connect(server, node_id, "127.0.0.1").await;
        assert!(client.authenticate(json!("token")).await);
        client
    }

    pub async fn send_action(&self, action: Action, id: &str) {
        let meta = Meta {
            id: id.to_string(),
            time: 1,
            ..Meta::default()
        };
        self.wire.emit_action(action, meta).await.unwrap();
    }

    /// Next outbound frame within a second, `None` on silence.
    pub async fn next_frame(&self) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(1), self.wire.outbound.recv_async())
            .await
            .ok()
            .and_then(|frame| frame.ok())
    }

    /// Next outbound `sync` frame, skipping pings.
    pub async fn next_action(&self) -> Option<(Action, Meta)> {
        loop {
            match self.next_frame().await? {
                Frame::Sync { action, meta } => return Some((action, meta)),
                Frame::Ping | Frame::Pong => continue,
                _ => return None,
            }
        }
    }
}

/// Cursor over the server's report stream.
pub struct Events {
    rx: broadcast::Receiver<ServerEvent>,
}

impl Events {
    pub fn subscribe(server: &Server) -> Events {
        Events {
            rx: server.events(),
        }
    }

    /// Next report within a second.
    pub async fn next(&mut self) -> Option<ServerEvent> {
        tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
            .await
            .ok()
            .and_then(|event| event.ok())
    }

    pub async fn next_kind(&mut self) -> Option<&'static str> {
        self.next().await.map(|event| event.kind())
    }

    /// Skips reports until one of this kind arrives.
    pub async fn wait_for(&mut self, kind: &str) -> ServerEvent {
        loop {
            match self.next().await {
                Some(event) if event.kind() == kind => return event,
                Some(_) => continue,
                None => panic!("no {} report within timeout", kind),
            }
        }
    }

    /// Collects report kinds until the stream stays quiet for 200 ms.
    pub async fn drain_kinds(&mut self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_millis(200), self.rx.recv()).await
        {
            kinds.push(event.kind());
        }
        kinds
    }
}

/// Waits until the log settles on `expected` actions or a second passes.
pub async fn wait_for_log_len(server: &Server, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        if server.log().entries().await.len() >= expected {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "log stuck at {} entries, wanted {}",
                server.log().entries().await.len(),
                expected
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
