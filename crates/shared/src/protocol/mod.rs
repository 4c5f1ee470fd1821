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
//! Contract between the server core and a sync peer.
//!
//! A peer owns the wire: it frames, times out, pings, and turns whatever
//! arrives into [`PeerEvent`]s. The core only ever sees the event stream
//! and pushes [`Frame`]s back through the [`PeerSender`]. Tests drive the
//! same pair of channels without any socket.

use anyhow::Result;
use flume::{Receiver, Sender, bounded};
use serde_json::{Map, Value, json};

use crate::{
    action::{Action, Meta},
    errors::ProtocolErrorKind,
};

mod frame;

pub use frame::Frame;

/// What a peer reports to the server client driving it.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// Wire handshake finished; credentials are opaque to the peer.
    Connect {
        node_id: String,
        subprotocol: String,
        credentials: Value,
        headers: Map<String, Value>,
    },
    /// An incoming synchronized action.
    Action { action: Action, meta: Meta },
    /// Wire-level violation; the peer closes after reporting it.
    Error {
        kind: ProtocolErrorKind,
        message: String,
    },
    /// Transport is gone.
    Disconnect,
}

/// Outbound half handed to the server client.
#[derive(Debug, Clone)]
pub struct PeerSender {
    tx: Sender<Frame>,
}

impl PeerSender {
    pub async fn send_action(&self, action: Action, meta: Meta) -> Result<()> {
        self.send(Frame::Sync { action, meta }).await
    }

    pub async fn send_connected(&self, node_id: &str, subprotocol: &str) -> Result<()> {
        self.send(Frame::Connected {
            node_id: node_id.to_string(),
            subprotocol: subprotocol.to_string(),
        })
        .await
    }

    /// Debug frames `["debug", "error", <text>]`, development mode only.
    pub async fn send_debug_error(&self, message: &str) -> Result<()> {
        self.send(Frame::Debug {
            message: message.to_string(),
        })
        .await
    }

    pub async fn send_error(&self, kind: ProtocolErrorKind, message: &str) -> Result<()> {
        self.send(Frame::Error {
            kind,
            message: message.to_string(),
        })
        .await
    }

    pub async fn send_bye(&self) -> Result<()> {
        self.send(Frame::Bye).await
    }

    /// Raw escape hatch.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        self.tx
            .send_async(frame)
            .await
            .map_err(|_| anyhow::anyhow!("peer outbound channel closed"))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_disconnected()
    }
}

/// The core-facing side of a peer.
pub struct PeerChannels {
    pub events: Receiver<PeerEvent>,
    pub sender: PeerSender,
}

/// The wire-facing side of a peer.
pub struct PeerWire {
    pub events: Sender<PeerEvent>,
    pub outbound: Receiver<Frame>,
}

/// Builds the channel pair connecting a wire task with a server client.
pub fn peer_pair(buffer: usize) -> (PeerChannels, PeerWire) {
    let (event_tx, event_rx) = bounded(buffer);
    let (frame_tx, frame_rx) = bounded(buffer);
    (
        PeerChannels {
            events: event_rx,
            sender: PeerSender { tx: frame_tx },
        },
        PeerWire {
            events: event_tx,
            outbound: frame_rx,
        },
    )
}

impl PeerWire {
    /// Convenience for wire tasks and tests: emit a finished handshake.
    pub async fn emit_connect(
        &self,
        node_id: &str,
        subprotocol: &str,
        credentials: Value,
    ) -> Result<()> {
        self.events
            .send_async(PeerEvent::Connect {
                node_id: node_id.to_string(),
                subprotocol: subprotocol.to_string(),
                credentials,
                headers: Map::new(),
            })
            .await
            .map_err(|_| anyhow::anyhow!("peer event channel closed"))
    }

    pub async fn emit_action(&self, action: Action, meta: Meta) -> Result<()> {
        self.events
            .send_async(PeerEvent::Action { action, meta })
            .await
            .map_err(|_| anyhow::anyhow!("peer event channel closed"))
    }
}

/// Builds the JSON body of a connect frame, shared by client
/// implementations and tests.
pub fn connect_payload(node_id: &str, subprotocol: &str, credentials: &Value) -> Value {
    json!({
        "nodeId": node_id,
        "subprotocol": subprotocol,
        "credentials": credentials,
    })
}
