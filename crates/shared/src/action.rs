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
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Reserved control action types.
pub const SUBSCRIBE_TYPE: &str = "logux/subscribe";
pub const UNSUBSCRIBE_TYPE: &str = "logux/unsubscribe";
pub const UNDO_TYPE: &str = "logux/undo";
pub const PROCESSED_TYPE: &str = "logux/processed";

/// Prefix of every reserved control type.
pub const CONTROL_PREFIX: &str = "logux/";

/// Application action: a `type` discriminator plus opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Action {
    pub fn new(kind: &str) -> Self {
        Action {
            kind: kind.to_string(),
            payload: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn subscribe(channel: &str) -> Self {
        Action::new(SUBSCRIBE_TYPE).with("channel", json!(channel))
    }

    pub fn unsubscribe(channel: &str) -> Self {
        Action::new(UNSUBSCRIBE_TYPE).with("channel", json!(channel))
    }

    pub fn undo(id: &str, reason: &str, extra: Map<String, Value>) -> Self {
        let mut action = Action::new(UNDO_TYPE)
            .with("id", json!(id))
            .with("reason", json!(reason));
        for (key, value) in extra {
            action.payload.entry(key).or_insert(value);
        }
        action
    }

    pub fn processed(id: &str) -> Self {
        Action::new(PROCESSED_TYPE).with("id", json!(id))
    }

    /// True for every reserved `logux/*` control type.
    pub fn is_control(&self) -> bool {
        self.kind.starts_with(CONTROL_PREFIX)
    }

    /// The `channel` payload field, if it is a string.
    pub fn channel(&self) -> Option<&str> {
        self.payload.get("channel").and_then(Value::as_str)
    }

    /// The `id` payload field (undo/processed references), if a string.
    pub fn id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }

    pub fn reason(&self) -> Option<&str> {
        self.payload.get("reason").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Waiting,
    Processed,
    Error,
}

/// Server-maintained envelope around an action.
///
/// The concrete fields carry everything the node core relies on; anything
/// else a peer or a backend sets travels in `custom` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub added: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprotocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Meta {
    pub fn with_id(id: &str) -> Self {
        Meta {
            id: id.to_string(),
            ..Meta::default()
        }
    }

    /// Moves singular `node`/`client`/`user`/`channel` custom keys into the
    /// plural arrays. Runs on preadd so the rest of the pipeline only ever
    /// sees the plural form.
    pub fn normalize_addressing(&mut self) {
        for (singular, plural) in [
            ("node", Addressing::Nodes),
            ("client", Addressing::Clients),
            ("user", Addressing::Users),
            ("channel", Addressing::Channels),
        ] {
            if let Some(value) = self.custom.remove(singular)
                && let Some(value) = value.as_str()
            {
                let target = match plural {
                    Addressing::Nodes => &mut self.nodes,
                    Addressing::Clients => &mut self.clients,
                    Addressing::Users => &mut self.users,
                    Addressing::Channels => &mut self.channels,
                };
                if !target.iter().any(|existing| existing == value) {
                    target.push(value.to_string());
                }
            }
        }
    }

    /// True when no address set names a single target.
    pub fn has_no_addressing(&self) -> bool {
        self.nodes.is_empty()
            && self.clients.is_empty()
            && self.users.is_empty()
            && self.channels.is_empty()
    }

    pub fn add_reason(&mut self, reason: &str) {
        if !self.reasons.iter().any(|existing| existing == reason) {
            self.reasons.push(reason.to_string());
        }
    }
}

enum Addressing {
    Nodes,
    Clients,
    Users,
    Channels,
}

/// Extra addressing a `resend` callback contributes, merged into meta
/// before fan-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resend {
    pub nodes: Vec<String>,
    pub clients: Vec<String>,
    pub users: Vec<String>,
    pub channels: Vec<String>,
}

impl Resend {
    pub fn channel(channel: &str) -> Self {
        Resend {
            channels: vec![channel.to_string()],
            ..Resend::default()
        }
    }

    pub fn channels(channels: &[&str]) -> Self {
        Resend {
            channels: channels.iter().map(|c| c.to_string()).collect(),
            ..Resend::default()
        }
    }

    pub fn user(user: &str) -> Self {
        Resend {
            users: vec![user.to_string()],
            ..Resend::default()
        }
    }

    pub fn client(client: &str) -> Self {
        Resend {
            clients: vec![client.to_string()],
            ..Resend::default()
        }
    }

    pub fn node(node: &str) -> Self {
        Resend {
            nodes: vec![node.to_string()],
            ..Resend::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.clients.is_empty()
            && self.users.is_empty()
            && self.channels.is_empty()
    }
}
