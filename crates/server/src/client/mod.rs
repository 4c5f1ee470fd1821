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
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use semver::Version;

use shared::action::{Action, Meta, SUBSCRIBE_TYPE, UNSUBSCRIBE_TYPE};
use shared::errors::ProtocolErrorKind;
use shared::log;
use shared::node_id::parse_action_id;
use shared::protocol::{PeerChannels, PeerEvent, PeerSender};
use shared::system::trigger::Trigger;

use crate::consts::SERVER_USER_ID;
use crate::events::ServerEvent;
use crate::server::{AuthRequest, ServerCore};
use crate::types::TypeAccess;

/// One connection: wraps a sync peer, carries identity once authenticated,
/// and enforces the inbound filter on every action.
///
/// Lifecycle: connected → authenticated → destroyed. Destroy is
/// idempotent; the `zombie` flag suppresses the disconnect report when a
/// newer connection took over this node id.
pub struct ServerClient {
    pub key: String,
    pub ip: SocketAddr,
    core: Arc<ServerCore>,
    sender: PeerSender,
    stop: Trigger,
    connected_at: Instant,
    node_id: RwLock<Option<String>>,
    client_id: RwLock<Option<String>>,
    user_id: RwLock<Option<String>>,
    subprotocol: RwLock<Option<String>>,
    zombie: AtomicBool,
    destroyed: AtomicBool,
}

impl ServerClient {
    pub(crate) fn new(core: Arc<ServerCore>, sender: PeerSender, ip: SocketAddr) -> Self {
        let key = core.next_client_key();
        ServerClient {
            key,
            ip,
            core,
            sender,
            stop: Trigger::new(),
            connected_at: Instant::now(),
            node_id: RwLock::new(None),
            client_id: RwLock::new(None),
            user_id: RwLock::new(None),
            subprotocol: RwLock::new(None),
            zombie: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Registers the connection and starts consuming peer events.
    pub fn spawn(
        core: Arc<ServerCore>,
        channels: PeerChannels,
        ip: SocketAddr,
    ) -> Arc<ServerClient> {
        let PeerChannels { events, sender } = channels;
        let client = Arc::new(ServerClient::new(core.clone(), sender, ip));
        core.registry.insert_connection(client.clone());
        core.bus.emit(ServerEvent::Connect {
            client_key: client.key.clone(),
            ip,
        });
        tokio::spawn({
            let client = client.clone();
            async move {
                client.run(events).await;
            }
        });
        client
    }

    async fn run(self: Arc<Self>, events: flume::Receiver<PeerEvent>) {
        loop {
            tokio::select! {
                _ = self.stop.wait_async() => {
                    break;
                }
                event = events.recv_async() => {
                    match event {
                        Ok(PeerEvent::Connect { node_id, subprotocol, credentials, headers }) => {
                            if !self.on_connect(node_id, subprotocol, credentials, headers).await {
                                break;
                            }
                        }
                        Ok(PeerEvent::Action { action, meta }) => {
                            self.on_action(action, meta).await;
                        }
                        Ok(PeerEvent::Error { kind, message }) => {
                            self.core.bus.emit(ServerEvent::ClientError {
                                message: format!("{} from {}: {}", kind, self.ip, message),
                            });
                            break;
                        }
                        Ok(PeerEvent::Disconnect) | Err(_) => {
                            break;
                        }
                    }
                }
            }
        }
        self.destroy().await;
    }

    /// Handshake and authentication. Returns false when the connection
    /// must close.
    async fn on_connect(
        &self,
        node_id: String,
        subprotocol: String,
        credentials: serde_json::Value,
        headers: serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        if let Some(supports) = &self.core.supports {
            let compatible = Version::parse(&subprotocol)
                .map(|version| supports.matches(&version))
                .unwrap_or(false);
            if !compatible {
                self.core.bus.emit(ServerEvent::ClientError {
                    message: format!(
                        "wrong-subprotocol: {} from {} is out of {}",
                        subprotocol, node_id, supports
                    ),
                });
                let _ = self
                    .sender
                    .send_error(
                        ProtocolErrorKind::WrongSubprotocol,
                        &format!("Only {} application subprotocols are supported", supports),
                    )
                    .await;
                return false;
            }
        }

        if self.core.auth_guard.is_blocked(self.ip.ip()) {
            self.core.bus.emit(ServerEvent::ClientError {
                message: format!("bruteforce from {}", self.ip),
            });
            let _ = self
                .sender
                .send_error(ProtocolErrorKind::Bruteforce, "Too many wrong credentials")
                .await;
            return false;
        }

        let info = shared::node_id::parse_node_id(&node_id);
        if info.user_id.as_deref() == Some(SERVER_USER_ID) {
            self.core.auth_guard.register_failure(self.ip.ip());
            self.core.bus.emit(ServerEvent::Unauthenticated {
                node_id: node_id.clone(),
                ip: self.ip,
            });
            let _ = self
                .sender
                .send_error(ProtocolErrorKind::WrongCredentials, "Wrong credentials")
                .await;
            return false;
        }

        let Some(authenticator) = self.core.authenticator() else {
            log::error!("No authentication callback configured, rejecting {}", node_id);
            let _ = self
                .sender
                .send_error(ProtocolErrorKind::WrongCredentials, "Wrong credentials")
                .await;
            return false;
        };

        let request = AuthRequest {
            user_id: info.user_id.clone(),
            credentials,
            headers,
            node_id: node_id.clone(),
            ip: self.ip.ip(),
        };
        let authenticated = match authenticator(request).await {
            Ok(authenticated) => authenticated,
            Err(error) => {
                self.core.bus.emit(ServerEvent::Error {
                    action_id: None,
                    message: format!("authenticator failed: {}", error),
                });
                let _ = self
                    .sender
                    .send_error(ProtocolErrorKind::WrongCredentials, "Wrong credentials")
                    .await;
                return false;
            }
        };
        if !authenticated {
            self.core.auth_guard.register_failure(self.ip.ip());
            self.core.bus.emit(ServerEvent::Unauthenticated {
                node_id: node_id.clone(),
                ip: self.ip,
            });
            let _ = self
                .sender
                .send_error(ProtocolErrorKind::WrongCredentials, "Wrong credentials")
                .await;
            return false;
        }

        let Some(this) = self.core.registry.connection(&self.key) else {
            // Destroyed while authenticating
            return false;
        };

        // A reconnect may race its own older connection: evict the holder
        // of this node id before taking its place
        let user_key = info.user_id.clone().unwrap_or_default();
        if let Some(prior) =
            self.core
                .registry
                .register_identity(&node_id, &info.client_id, &user_key, this)
            && prior.key != self.key
        {
            prior.mark_zombie();
            self.core.bus.emit(ServerEvent::Zombie {
                node_id: node_id.clone(),
            });
            prior.destroy().await;
        }

        *self.node_id.write().unwrap() = Some(node_id.clone());
        *self.client_id.write().unwrap() = Some(info.client_id.clone());
        *self.user_id.write().unwrap() = info.user_id.clone();
        *self.subprotocol.write().unwrap() = Some(subprotocol.clone());

        self.core.bus.emit(ServerEvent::Authenticated {
            node_id: node_id.clone(),
            latency_ms: self.connected_at.elapsed().as_millis() as u64,
        });

        let own_subprotocol = self
            .core
            .subprotocol
            .clone()
            .unwrap_or(subprotocol);
        let _ = self
            .sender
            .send_connected(&self.core.node_id, &own_subprotocol)
            .await;
        true
    }

    /// Inbound filter and admission for one synchronized action.
    async fn on_action(&self, action: Action, meta: Meta) {
        let (Some(my_node), Some(my_client)) = (self.node_id(), self.client_id()) else {
            self.core.bus.emit(ServerEvent::ClientError {
                message: format!("action from {} before authentication", self.ip),
            });
            self.destroy().await;
            return;
        };

        // Clients may only set id, time and subprotocol
        let whitelisted = Meta {
            id: meta.id.clone(),
            time: meta.time,
            subprotocol: meta
                .subprotocol
                .clone()
                .or_else(|| self.subprotocol()),
            ..Meta::default()
        };
        let tampered = meta.added != 0
            || !meta.reasons.is_empty()
            || meta.server.is_some()
            || meta.status.is_some()
            || !meta.nodes.is_empty()
            || !meta.clients.is_empty()
            || !meta.users.is_empty()
            || !meta.channels.is_empty()
            || !meta.custom.is_empty();
        if tampered {
            self.core.deny(&action, &whitelisted).await;
            return;
        }

        // The id must belong to this client: same node, or another node
        // of the same user-agent
        let Some(origin) = parse_action_id(&whitelisted.id) else {
            self.core.deny(&action, &whitelisted).await;
            return;
        };
        if origin.node.node_id != my_node && origin.node.client_id != my_client {
            self.core.deny(&action, &whitelisted).await;
            return;
        }

        if action.kind == SUBSCRIBE_TYPE || action.kind == UNSUBSCRIBE_TYPE {
            // Channel access runs in the channel engine after add
            self.add_admitted(action, whitelisted).await;
            return;
        }

        match self.core.types.lookup(&action.kind) {
            Some(handler) => {
                let ctx = self.core.context_for(&origin.node, &whitelisted);
                match (handler.access)(ctx, action.clone(), whitelisted.clone()).await {
                    Ok(TypeAccess::Granted) => self.add_admitted(action, whitelisted).await,
                    Ok(TypeAccess::Denied) => self.core.deny(&action, &whitelisted).await,
                    Ok(TypeAccess::Unknown) => {
                        self.core.unknown_type_denial(&action, &whitelisted).await
                    }
                    Err(error) => {
                        self.core.bus.emit(ServerEvent::Error {
                            action_id: Some(whitelisted.id.clone()),
                            message: error.to_string(),
                        });
                        self.core.undo(&whitelisted, "error").await;
                        self.core
                            .debug_to_origin(&whitelisted, &error.to_string())
                            .await;
                    }
                }
            }
            // Unknown types are logged anyway; the dispatcher flags them
            None => self.add_admitted(action, whitelisted).await,
        }
    }

    async fn add_admitted(&self, action: Action, meta: Meta) {
        match self.core.log.add(action, meta).await {
            Ok(Some(_)) => {}
            // Duplicate ids are dropped silently
            Ok(None) => {}
            Err(error) => {
                self.core.bus.emit(ServerEvent::Error {
                    action_id: None,
                    message: error.to_string(),
                });
            }
        }
    }

    pub fn node_id(&self) -> Option<String> {
        self.node_id.read().unwrap().clone()
    }

    pub fn client_id(&self) -> Option<String> {
        self.client_id.read().unwrap().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.read().unwrap().clone()
    }

    pub fn subprotocol(&self) -> Option<String> {
        self.subprotocol.read().unwrap().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_zombie(&self) {
        self.zombie.store(true, Ordering::SeqCst);
    }

    pub async fn send_action(&self, action: &Action, meta: &Meta) {
        if let Err(error) = self.sender.send_action(action.clone(), meta.clone()).await {
            log::warn!("Failed to send action to {}: {}", self.key, error);
        }
    }

    pub async fn send_debug(&self, message: &str) {
        let _ = self.sender.send_debug_error(message).await;
    }

    /// Removes the client from every index and closes the wire. Safe to
    /// call any number of times, from any state.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop.trigger();
        self.core.registry.remove_connection(&self.key);
        if let Some(node_id) = self.node_id() {
            let client_id = self.client_id().unwrap_or_default();
            let user_key = self.user_id().unwrap_or_default();
            self.core
                .registry
                .unregister_identity(&node_id, &client_id, &user_key, &self.key);
            self.core.registry.prune_subscriber(&node_id);
        }
        if !self.zombie.load(Ordering::SeqCst) && !self.core.is_destroying() {
            self.core.bus.emit(ServerEvent::Disconnect {
                node_id: self.node_id().unwrap_or_else(|| self.key.clone()),
            });
        }
        let _ = self.sender.send_bye().await;
    }
}
