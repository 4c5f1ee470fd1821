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
use std::sync::{Arc, RwLock};

use crate::channels::ChannelFilter;
use crate::client::ServerClient;

/// In-memory indexes over connected clients and channel subscribers.
///
/// Every operation takes one lock for one map and never holds it across an
/// await point, so concurrent connection units stay linearizable. Identity
/// maps only ever drop an entry that still points at the removing client,
/// which keeps zombie takeovers safe in either destruction order.
#[derive(Default)]
pub struct Registry {
    connected: RwLock<HashMap<String, Arc<ServerClient>>>,
    node_ids: RwLock<HashMap<String, Arc<ServerClient>>>,
    client_ids: RwLock<HashMap<String, Arc<ServerClient>>>,
    user_ids: RwLock<HashMap<String, Vec<Arc<ServerClient>>>>,
    subscribers: RwLock<HashMap<String, HashMap<String, ChannelFilter>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn insert_connection(&self, client: Arc<ServerClient>) {
        self.connected
            .write()
            .unwrap()
            .insert(client.key.clone(), client);
    }

    pub fn remove_connection(&self, key: &str) -> Option<Arc<ServerClient>> {
        self.connected.write().unwrap().remove(key)
    }

    pub fn connection(&self, key: &str) -> Option<Arc<ServerClient>> {
        self.connected.read().unwrap().get(key).cloned()
    }

    pub fn connected_clients(&self) -> Vec<Arc<ServerClient>> {
        self.connected.read().unwrap().values().cloned().collect()
    }

    pub fn connected_count(&self) -> usize {
        self.connected.read().unwrap().len()
    }

    /// Registers an authenticated identity. Returns the client that held
    /// this node id before, if any (the zombie to evict).
    pub fn register_identity(
        &self,
        node_id: &str,
        client_id: &str,
        user_id: &str,
        client: Arc<ServerClient>,
    ) -> Option<Arc<ServerClient>> {
        let prior = self
            .node_ids
            .write()
            .unwrap()
            .insert(node_id.to_string(), client.clone());
        self.client_ids
            .write()
            .unwrap()
            .insert(client_id.to_string(), client.clone());
        self.user_ids
            .write()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(client);
        prior
    }

    /// Removes identity entries that still point at this client.
    pub fn unregister_identity(
        &self,
        node_id: &str,
        client_id: &str,
        user_id: &str,
        key: &str,
    ) {
        {
            let mut node_ids = self.node_ids.write().unwrap();
            if node_ids.get(node_id).is_some_and(|held| held.key == key) {
                node_ids.remove(node_id);
            }
        }
        {
            let mut client_ids = self.client_ids.write().unwrap();
            if client_ids.get(client_id).is_some_and(|held| held.key == key) {
                client_ids.remove(client_id);
            }
        }
        {
            let mut user_ids = self.user_ids.write().unwrap();
            if let Some(clients) = user_ids.get_mut(user_id) {
                clients.retain(|held| held.key != key);
                if clients.is_empty() {
                    user_ids.remove(user_id);
                }
            }
        }
    }

    pub fn client_by_node(&self, node_id: &str) -> Option<Arc<ServerClient>> {
        self.node_ids.read().unwrap().get(node_id).cloned()
    }

    pub fn client_by_client_id(&self, client_id: &str) -> Option<Arc<ServerClient>> {
        self.client_ids.read().unwrap().get(client_id).cloned()
    }

    pub fn clients_by_user(&self, user_id: &str) -> Vec<Arc<ServerClient>> {
        self.user_ids
            .read()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Records a subscriber. Returns true when the channel key is new.
    pub fn subscribe(&self, channel: &str, node_id: &str, filter: ChannelFilter) -> bool {
        let mut subscribers = self.subscribers.write().unwrap();
        let new_channel = !subscribers.contains_key(channel);
        subscribers
            .entry(channel.to_string())
            .or_default()
            .insert(node_id.to_string(), filter);
        new_channel
    }

    /// Removes a subscriber; drops the channel key with its last entry.
    /// Returns true when the subscriber was present.
    pub fn unsubscribe(&self, channel: &str, node_id: &str) -> bool {
        let mut subscribers = self.subscribers.write().unwrap();
        let Some(channel_subscribers) = subscribers.get_mut(channel) else {
            return false;
        };
        let removed = channel_subscribers.remove(node_id).is_some();
        if channel_subscribers.is_empty() {
            subscribers.remove(channel);
        }
        removed
    }

    /// Drops this node from every channel (client destroy).
    pub fn prune_subscriber(&self, node_id: &str) {
        let mut subscribers = self.subscribers.write().unwrap();
        subscribers.retain(|_, channel_subscribers| {
            channel_subscribers.remove(node_id);
            !channel_subscribers.is_empty()
        });
    }

    pub fn channel_subscribers(&self, channel: &str) -> Vec<(String, ChannelFilter)> {
        self.subscribers
            .read()
            .unwrap()
            .get(channel)
            .map(|channel_subscribers| {
                channel_subscribers
                    .iter()
                    .map(|(node_id, filter)| (node_id.clone(), filter.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot for tests and the status surface.
    pub fn subscribers_snapshot(&self) -> HashMap<String, HashMap<String, ChannelFilter>> {
        self.subscribers.read().unwrap().clone()
    }

    pub fn has_subscribers(&self, channel: &str) -> bool {
        self.subscribers.read().unwrap().contains_key(channel)
    }
}

#[cfg(test)]
mod tests;
