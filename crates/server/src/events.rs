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
use std::net::SocketAddr;

use tokio::sync::broadcast;

use shared::log;

/// Everything the node reports, as one enumerated stream. Operators see it
/// through the logs; tests and the `process` helper subscribe to the bus.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Connect { client_key: String, ip: SocketAddr },
    Authenticated { node_id: String, latency_ms: u64 },
    Unauthenticated { node_id: String, ip: SocketAddr },
    Disconnect { node_id: String },
    Zombie { node_id: String },
    Add { id: String, kind: String },
    Clean { id: String },
    Processed { id: String, latency_ms: u64 },
    Subscribing { channel: String, node_id: String },
    Subscribed { channel: String, node_id: String, latency_ms: u64 },
    Unsubscribed { channel: String, node_id: String },
    SubscriptionCancelled { channel: String },
    Denied { id: String },
    UnknownType { id: String, kind: String },
    WrongChannel { id: String, channel: Option<String> },
    Useless { id: String },
    WrongControlIp { ip: SocketAddr },
    WrongControlSecret { ip: SocketAddr },
    Error { action_id: Option<String>, message: String },
    ClientError { message: String },
    Fatal { message: String },
}

impl ServerEvent {
    /// Stable report name, used in tests and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connect { .. } => "connect",
            ServerEvent::Authenticated { .. } => "authenticated",
            ServerEvent::Unauthenticated { .. } => "unauthenticated",
            ServerEvent::Disconnect { .. } => "disconnect",
            ServerEvent::Zombie { .. } => "zombie",
            ServerEvent::Add { .. } => "add",
            ServerEvent::Clean { .. } => "clean",
            ServerEvent::Processed { .. } => "processed",
            ServerEvent::Subscribing { .. } => "subscribing",
            ServerEvent::Subscribed { .. } => "subscribed",
            ServerEvent::Unsubscribed { .. } => "unsubscribed",
            ServerEvent::SubscriptionCancelled { .. } => "subscriptionCancelled",
            ServerEvent::Denied { .. } => "denied",
            ServerEvent::UnknownType { .. } => "unknownType",
            ServerEvent::WrongChannel { .. } => "wrongChannel",
            ServerEvent::Useless { .. } => "useless",
            ServerEvent::WrongControlIp { .. } => "wrongControlIp",
            ServerEvent::WrongControlSecret { .. } => "wrongControlSecret",
            ServerEvent::Error { .. } => "error",
            ServerEvent::ClientError { .. } => "clientError",
            ServerEvent::Fatal { .. } => "fatal",
        }
    }
}

/// Broadcast bus carrying [`ServerEvent`]s to any number of subscribers.
///
/// Emitting never blocks and never fails; subscribers that lag simply miss
/// events (the log line is always written).
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ServerEvent) {
        match &event {
            ServerEvent::Error { action_id, message } => {
                log::error!("error {:?}: {}", action_id, message)
            }
            ServerEvent::Fatal { message } => log::error!("fatal: {}", message),
            ServerEvent::ClientError { message } => log::warn!("client error: {}", message),
            ServerEvent::Denied { id } => log::warn!("action {} denied", id),
            ServerEvent::UnknownType { id, kind } => {
                log::warn!("action {} has unknown type {}", id, kind)
            }
            ServerEvent::WrongChannel { id, channel } => {
                log::warn!("action {} subscribes to wrong channel {:?}", id, channel)
            }
            ServerEvent::Unauthenticated { node_id, ip } => {
                log::warn!("wrong credentials from {} ({})", node_id, ip)
            }
            ServerEvent::WrongControlIp { ip } => log::warn!("control request from bad ip {}", ip),
            ServerEvent::WrongControlSecret { ip } => {
                log::warn!("control request with bad secret from {}", ip)
            }
            ServerEvent::Zombie { node_id } => log::info!("zombie connection for {}", node_id),
            other => log::debug!("{}: {:?}", other.kind(), other),
        }
        // No receivers is fine, the log line above is the durable trace
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.emit(ServerEvent::Add {
            id: "1 server:x 0".to_string(),
            kind: "users/rename".to_string(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), "add");
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.emit(ServerEvent::Clean {
            id: "1 server:x 0".to_string(),
        });
    }
}
