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
use anyhow::Result;
use serde_json::{Map, Value, json};

use crate::{
    action::{Action, Meta},
    errors::ProtocolErrorKind,
};

/// Wire frame, encoded as a JSON array tagged by its first element.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Connect {
        node_id: String,
        subprotocol: String,
        credentials: Value,
        headers: Map<String, Value>,
    },
    Connected {
        node_id: String,
        subprotocol: String,
    },
    Sync {
        action: Action,
        meta: Meta,
    },
    Ping,
    Pong,
    Debug {
        message: String,
    },
    Error {
        kind: ProtocolErrorKind,
        message: String,
    },
    Bye,
}

impl Frame {
    pub fn to_value(&self) -> Value {
        match self {
            Frame::Connect {
                node_id,
                subprotocol,
                credentials,
                headers,
            } => json!([
                "connect",
                {
                    "nodeId": node_id,
                    "subprotocol": subprotocol,
                    "credentials": credentials,
                    "headers": headers,
                }
            ]),
            Frame::Connected {
                node_id,
                subprotocol,
            } => json!(["connected", { "nodeId": node_id, "subprotocol": subprotocol }]),
            Frame::Sync { action, meta } => json!(["sync", action, meta]),
            Frame::Ping => json!(["ping"]),
            Frame::Pong => json!(["pong"]),
            Frame::Debug { message } => json!(["debug", "error", message]),
            Frame::Error { kind, message } => json!(["error", kind.as_str(), message]),
            Frame::Bye => json!(["bye"]),
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            anyhow::bail!("frame is not an array");
        };
        let mut items = items.into_iter();
        let tag = items
            .next()
            .and_then(|tag| tag.as_str().map(str::to_string))
            .ok_or_else(|| anyhow::anyhow!("frame has no tag"))?;
        match tag.as_str() {
            "connect" => {
                let body = items
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("connect frame has no body"))?;
                let node_id = body
                    .get("nodeId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("connect frame has no nodeId"))?
                    .to_string();
                let subprotocol = body
                    .get("subprotocol")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("connect frame has no subprotocol"))?
                    .to_string();
                let credentials = body.get("credentials").cloned().unwrap_or(Value::Null);
                let headers = body
                    .get("headers")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                Ok(Frame::Connect {
                    node_id,
                    subprotocol,
                    credentials,
                    headers,
                })
            }
            "connected" => {
                let body = items
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("connected frame has no body"))?;
                Ok(Frame::Connected {
                    node_id: body
                        .get("nodeId")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    subprotocol: body
                        .get("subprotocol")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            }
            "sync" => {
                let action = items
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("sync frame has no action"))?;
                let meta = items
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("sync frame has no meta"))?;
                Ok(Frame::Sync {
                    action: serde_json::from_value(action)?,
                    meta: serde_json::from_value(meta)?,
                })
            }
            "ping" => Ok(Frame::Ping),
            "pong" => Ok(Frame::Pong),
            "debug" => {
                // ["debug", "error", <text>]
                let _level = items.next();
                let message = items
                    .next()
                    .and_then(|message| message.as_str().map(str::to_string))
                    .unwrap_or_default();
                Ok(Frame::Debug { message })
            }
            "error" => {
                let kind = items
                    .next()
                    .and_then(|kind| {
                        kind.as_str().and_then(ProtocolErrorKind::from_str)
                    })
                    .ok_or_else(|| anyhow::anyhow!("error frame has unknown kind"))?;
                let message = items
                    .next()
                    .and_then(|message| message.as_str().map(str::to_string))
                    .unwrap_or_default();
                Ok(Frame::Error { kind, message })
            }
            "bye" => Ok(Frame::Bye),
            other => anyhow::bail!("unknown frame tag: {}", other),
        }
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Frame::from_value(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: Frame) {
        let value = frame.to_value();
        let decoded = Frame::from_value(value).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_frame_roundtrips() {
        roundtrip(Frame::Connect {
            node_id: "10:uuid".to_string(),
            subprotocol: "1.0.0".to_string(),
            credentials: json!("token"),
            headers: Map::new(),
        });
        roundtrip(Frame::Connected {
            node_id: "server:x".to_string(),
            subprotocol: "1.0.0".to_string(),
        });
        roundtrip(Frame::Sync {
            action: Action::new("users/rename"),
            meta: Meta::with_id("1 10:uuid 0"),
        });
        roundtrip(Frame::Ping);
        roundtrip(Frame::Pong);
        roundtrip(Frame::Debug {
            message: "boom".to_string(),
        });
        roundtrip(Frame::Error {
            kind: ProtocolErrorKind::Timeout,
            message: "silence".to_string(),
        });
        roundtrip(Frame::Bye);
    }

    #[test]
    fn test_debug_frame_shape() {
        let value = Frame::Debug {
            message: "Action with unknown type UNKNOWN".to_string(),
        }
        .to_value();
        assert_eq!(
            value,
            json!(["debug", "error", "Action with unknown type UNKNOWN"])
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Frame::from_slice(b"{}").is_err());
        assert!(Frame::from_slice(b"[]").is_err());
        assert!(Frame::from_slice(b"[\"nope\"]").is_err());
        assert!(Frame::from_slice(b"not json").is_err());
    }
}
