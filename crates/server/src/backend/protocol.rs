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
use serde_json::{Value, json};

use shared::action::{Action, Meta};

use crate::consts::BACKEND_PROTOCOL_VERSION;

/// Request body for one backend call. Exactly one command per request, so
/// the answer stream needs no correlation ids.
#[derive(serde::Serialize)]
pub(super) struct RequestBody {
    version: u32,
    secret: String,
    commands: Vec<Value>,
}

impl RequestBody {
    pub fn auth(secret: &str, user_id: Option<&str>, credentials: &Value, auth_id: &str) -> Self {
        RequestBody {
            version: BACKEND_PROTOCOL_VERSION,
            secret: secret.to_string(),
            commands: vec![json!(["auth", user_id, credentials, auth_id])],
        }
    }

    pub fn action(secret: &str, action: &Action, meta: &Meta) -> Self {
        RequestBody {
            version: BACKEND_PROTOCOL_VERSION,
            secret: secret.to_string(),
            commands: vec![json!(["action", action, meta])],
        }
    }
}

/// One backend answer. Verdicts gate the access phase; `Processed` and
/// `Error` close the process phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Authenticated,
    Denied,
    Approved,
    Forbidden,
    UnknownAction,
    UnknownChannel,
    Processed,
    Error { details: String },
}

impl Answer {
    fn from_value(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            anyhow::bail!("Backend wrong answer");
        };
        let mut items = items.into_iter();
        let tag = items
            .next()
            .and_then(|tag| tag.as_str().map(str::to_string))
            .ok_or_else(|| anyhow::anyhow!("Backend wrong answer"))?;
        match tag.as_str() {
            "authenticated" => Ok(Answer::Authenticated),
            "denied" => Ok(Answer::Denied),
            "approved" => Ok(Answer::Approved),
            "forbidden" => Ok(Answer::Forbidden),
            "unknownAction" => Ok(Answer::UnknownAction),
            "unknownChannel" => Ok(Answer::UnknownChannel),
            "processed" => Ok(Answer::Processed),
            "error" => {
                let details = items
                    .next()
                    .map(|details| match details {
                        Value::String(text) => text,
                        other => other.to_string(),
                    })
                    .unwrap_or_default();
                Ok(Answer::Error { details })
            }
            _ => anyhow::bail!("Backend wrong answer"),
        }
    }
}

/// Incremental decoder for the backend's chunked response body: a JSON
/// array of answers, parsed answer by answer as bytes arrive so verdicts
/// are acted on before the process phase finishes.
#[derive(Default)]
pub struct AnswerStream {
    buf: Vec<u8>,
    pos: usize,
    started: bool,
    finished: bool,
}

impl AnswerStream {
    pub fn new() -> Self {
        AnswerStream::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn skip_separators(&mut self) {
        while let Some(byte) = self.buf.get(self.pos) {
            if byte.is_ascii_whitespace() || *byte == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Next complete answer, `None` when more bytes are needed or the
    /// stream closed cleanly.
    pub fn next_answer(&mut self) -> Result<Option<Answer>> {
        if self.finished {
            return Ok(None);
        }
        self.skip_separators();
        if !self.started {
            match self.buf.get(self.pos) {
                Some(b'[') => {
                    self.started = true;
                    self.pos += 1;
                    self.skip_separators();
                }
                Some(_) => anyhow::bail!("Backend wrong answer"),
                None => return Ok(None),
            }
        }
        match self.buf.get(self.pos) {
            Some(b']') => {
                self.finished = true;
                return Ok(None);
            }
            None => return Ok(None),
            Some(_) => {}
        }
        let mut iter =
            serde_json::Deserializer::from_slice(&self.buf[self.pos..]).into_iter::<Value>();
        match iter.next() {
            Some(Ok(value)) => {
                self.pos += iter.byte_offset();
                Answer::from_value(value).map(Some)
            }
            Some(Err(error)) if error.is_eof() => Ok(None),
            Some(Err(_)) | None => anyhow::bail!("Backend wrong answer"),
        }
    }
}
