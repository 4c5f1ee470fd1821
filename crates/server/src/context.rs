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
use std::sync::Arc;

use anyhow::Result;

use shared::action::{Action, Meta};
use shared::node_id::NodeInfo;

use crate::consts::SERVER_USER_ID;
use crate::log::Log;

/// Per-action view handed to every callback. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    pub node_id: String,
    pub client_id: String,
    /// Empty string when the node id carries no user segment.
    pub user_id: String,
    pub subprotocol: Option<String>,
    /// Named parameters captured by the channel matcher.
    pub params: HashMap<String, String>,
    log: Arc<Log>,
}

impl Context {
    pub(crate) fn new(origin: &NodeInfo, subprotocol: Option<String>, log: Arc<Log>) -> Self {
        Context {
            node_id: origin.node_id.clone(),
            client_id: origin.client_id.clone(),
            user_id: origin.user_id.clone().unwrap_or_default(),
            subprotocol,
            params: HashMap::new(),
            log,
        }
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// True when the action originated on this server.
    pub fn is_server(&self) -> bool {
        self.user_id == SERVER_USER_ID
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Appends an action addressed back to the originating client only.
    pub async fn send_back(&self, action: Action) -> Result<Option<Meta>> {
        self.send_back_with(action, Meta::default()).await
    }

    pub async fn send_back_with(&self, action: Action, mut meta: Meta) -> Result<Option<Meta>> {
        if !meta.clients.iter().any(|client| client == &self.client_id) {
            meta.clients.push(self.client_id.clone());
        }
        self.log.add(action, meta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use shared::log;
    use shared::node_id::parse_node_id;

    use crate::events::EventBus;
    use crate::log::Clock;
    use crate::store::MemoryStore;

    fn new_log() -> (Arc<Log>, flume::Receiver<crate::log::Entry>) {
        let (tx, rx) = flume::unbounded();
        (
            Arc::new(Log::new(
                Arc::new(MemoryStore::new()),
                Clock::test(0),
                "server:x",
                tx,
                EventBus::new(16),
            )),
            rx,
        )
    }

    #[test]
    fn test_identity_derivation() {
        let (log, _rx) = new_log();
        let ctx = Context::new(&parse_node_id("10:uuid:1"), Some("1.0.0".to_string()), log);
        assert_eq!(ctx.node_id, "10:uuid:1");
        assert_eq!(ctx.client_id, "10:uuid");
        assert_eq!(ctx.user_id, "10");
        assert!(!ctx.is_server());
    }

    #[test]
    fn test_server_context() {
        let (log, _rx) = new_log();
        let ctx = Context::new(&parse_node_id("server:rand"), None, log);
        assert!(ctx.is_server());
    }

    #[tokio::test]
    async fn test_send_back_addresses_origin_client() {
        log::setup_logging("debug", log::LogType::Test);

        let (log, rx) = new_log();
        let ctx = Context::new(&parse_node_id("10:uuid:1"), None, log);
        ctx.send_back(Action::new("users/loaded")).await.unwrap();
        let entry = rx.recv_async().await.unwrap();
        assert_eq!(entry.meta.clients, vec!["10:uuid"]);
    }
}
