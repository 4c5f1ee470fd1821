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
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;

use shared::action::{Action, Meta};
use shared::log;

use crate::consts::USER_AGENT;

mod protocol;

pub(crate) use protocol::Answer;
use protocol::{AnswerStream, RequestBody};

/// Access-phase verdict for an action forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendVerdict {
    Approved,
    Forbidden,
    UnknownAction,
    UnknownChannel,
}

type ProcessResult = Result<(), String>;

/// HTTP proxy delegating auth, access and processing to a backend.
///
/// Every call POSTs `{version, secret, commands: [command]}` and reads the
/// chunked answer array incrementally: the first verdict answer resolves
/// the access phase while the body keeps streaming until the process
/// phase closes with `processed` or `error`.
pub struct HttpBackend {
    client: Client,
    url: String,
    secret: String,
    auth_counter: AtomicU64,
    pending: Mutex<HashMap<String, flume::Receiver<ProcessResult>>>,
}

impl HttpBackend {
    pub fn new(url: &str, secret: &str) -> Self {
        log::info!("Proxying auth and unknown actions to {}", url);
        HttpBackend {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .default_headers({
                    let mut headers = reqwest::header::HeaderMap::new();
                    headers.insert(
                        reqwest::header::ACCEPT,
                        reqwest::header::HeaderValue::from_static("application/json"),
                    );
                    headers.insert(
                        reqwest::header::CONTENT_TYPE,
                        reqwest::header::HeaderValue::from_static("application/json"),
                    );
                    headers
                })
                .build()
                .unwrap(), // If not built, panic intentionally
            url: url.to_string(),
            secret: secret.to_string(),
            auth_counter: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// POSTs one command and hands back the live answer stream.
    async fn post(&self, body: RequestBody) -> Result<flume::Receiver<Result<Answer>>> {
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let (tx, rx) = flume::unbounded();
        tokio::spawn(async move {
            let mut chunks = response.bytes_stream();
            let mut answers = AnswerStream::new();
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) => answers.feed(&chunk),
                    Err(error) => {
                        let _ = tx.send_async(Err(error.into())).await;
                        return;
                    }
                }
                loop {
                    match answers.next_answer() {
                        Ok(Some(answer)) => {
                            if tx.send_async(Ok(answer)).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(error) => {
                            let _ = tx.send_async(Err(error)).await;
                            return;
                        }
                    }
                }
            }
            if !answers.is_finished() {
                let _ = tx
                    .send_async(Err(anyhow::anyhow!("Backend wrong answer")))
                    .await;
            }
        });
        Ok(rx)
    }

    /// `["auth", userId, credentials, authId]`; the first verdict wins.
    pub async fn authenticate(&self, user_id: Option<&str>, credentials: &Value) -> Result<bool> {
        let auth_id = self.auth_counter.fetch_add(1, Ordering::SeqCst).to_string();
        let answers = self
            .post(RequestBody::auth(&self.secret, user_id, credentials, &auth_id))
            .await?;
        loop {
            match answers.recv_async().await {
                Ok(Ok(Answer::Authenticated)) => return Ok(true),
                Ok(Ok(Answer::Denied)) => return Ok(false),
                Ok(Ok(Answer::Error { details })) => {
                    anyhow::bail!("Backend error during auth: {}", details)
                }
                Ok(Ok(_)) => continue,
                Ok(Err(error)) => return Err(error),
                Err(_) => anyhow::bail!("Backend wrong answer"),
            }
        }
    }

    /// `["action", action, meta]`; resolves with the access verdict and,
    /// when approved, leaves a pending process-phase entry for
    /// [`HttpBackend::wait_processed`].
    pub async fn action_access(&self, action: &Action, meta: &Meta) -> Result<BackendVerdict> {
        let answers = self
            .post(RequestBody::action(&self.secret, action, meta))
            .await?;

        let verdict = loop {
            match answers.recv_async().await {
                Ok(Ok(Answer::Approved)) => break BackendVerdict::Approved,
                Ok(Ok(Answer::Forbidden)) => break BackendVerdict::Forbidden,
                Ok(Ok(Answer::UnknownAction)) => break BackendVerdict::UnknownAction,
                Ok(Ok(Answer::UnknownChannel)) => break BackendVerdict::UnknownChannel,
                Ok(Ok(Answer::Error { details })) => {
                    anyhow::bail!("Backend error: {}", details)
                }
                Ok(Ok(other)) => {
                    anyhow::bail!("Backend wrong answer: {:?}", other)
                }
                Ok(Err(error)) => return Err(error),
                Err(_) => anyhow::bail!("Backend wrong answer"),
            }
        };

        if verdict == BackendVerdict::Approved {
            // Keep draining until the process phase closes
            let (tx, rx) = flume::bounded(1);
            self.pending.lock().unwrap().insert(meta.id.clone(), rx);
            let id = meta.id.clone();
            tokio::spawn(async move {
                loop {
                    match answers.recv_async().await {
                        Ok(Ok(Answer::Processed)) => {
                            let _ = tx.send_async(Ok(())).await;
                            return;
                        }
                        Ok(Ok(Answer::Error { details })) => {
                            let _ = tx.send_async(Err(details)).await;
                            return;
                        }
                        Ok(Ok(_)) => continue,
                        Ok(Err(error)) => {
                            let _ = tx.send_async(Err(error.to_string())).await;
                            return;
                        }
                        Err(_) => {
                            log::warn!("Backend closed stream for {} without verdict", id);
                            let _ = tx.send_async(Err("Backend wrong answer".to_string())).await;
                            return;
                        }
                    }
                }
            });
        }
        Ok(verdict)
    }

    /// Blocks until the backend reports the process phase for this action.
    pub async fn wait_processed(&self, id: &str) -> Result<()> {
        let pending = self.pending.lock().unwrap().remove(id);
        let Some(pending) = pending else {
            anyhow::bail!("No pending backend process for {}", id);
        };
        match pending.recv_async().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(details)) => anyhow::bail!("Backend error: {}", details),
            Err(_) => anyhow::bail!("Backend wrong answer"),
        }
    }
}

#[cfg(test)]
mod tests;
