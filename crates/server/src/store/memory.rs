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
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use shared::action::{Action, Meta};

use super::{MetaPatch, Store};

#[derive(Default)]
struct Inner {
    // added index -> entry, keeps insertion order for iteration
    entries: BTreeMap<u64, (Action, Meta)>,
    ids: HashMap<String, u64>,
    counter: u64,
    last_sent: u64,
    last_received: u64,
}

/// Default in-memory store. Lock scope never spans an await point.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn add(&self, action: Action, mut meta: Meta) -> Option<Meta> {
        let mut inner = self.inner.write().unwrap();
        if inner.ids.contains_key(&meta.id) {
            return None;
        }
        inner.counter += 1;
        let added = inner.counter;
        meta.added = added;
        inner.ids.insert(meta.id.clone(), added);
        inner.entries.insert(added, (action, meta.clone()));
        Some(meta)
    }

    async fn change_meta(&self, id: &str, patch: MetaPatch) -> bool {
        let mut inner = self.inner.write().unwrap();
        let Some(added) = inner.ids.get(id).copied() else {
            return false;
        };
        if let Some((_, meta)) = inner.entries.get_mut(&added) {
            patch.apply(meta);
            true
        } else {
            false
        }
    }

    async fn remove(&self, id: &str) -> Option<(Action, Meta)> {
        let mut inner = self.inner.write().unwrap();
        let added = inner.ids.remove(id)?;
        inner.entries.remove(&added)
    }

    async fn remove_reason(&self, reason: &str) -> Vec<(Action, Meta)> {
        let mut inner = self.inner.write().unwrap();
        let mut removed = Vec::new();
        let mut keep = BTreeMap::new();
        for (added, (action, mut meta)) in std::mem::take(&mut inner.entries) {
            if meta.reasons.iter().any(|existing| existing == reason) {
                meta.reasons.retain(|existing| existing != reason);
                if meta.reasons.is_empty() {
                    inner.ids.remove(&meta.id);
                    removed.push((action, meta));
                    continue;
                }
            }
            keep.insert(added, (action, meta));
        }
        inner.entries = keep;
        removed
    }

    async fn by_id(&self, id: &str) -> Option<(Action, Meta)> {
        let inner = self.inner.read().unwrap();
        let added = inner.ids.get(id)?;
        inner.entries.get(added).cloned()
    }

    async fn entries(&self) -> Vec<(Action, Meta)> {
        let inner = self.inner.read().unwrap();
        inner.entries.values().cloned().collect()
    }

    async fn last_added(&self) -> u64 {
        self.inner.read().unwrap().counter
    }

    async fn last_synced(&self) -> (u64, u64) {
        let inner = self.inner.read().unwrap();
        (inner.last_sent, inner.last_received)
    }

    async fn set_last_synced(&self, sent: Option<u64>, received: Option<u64>) {
        let mut inner = self.inner.write().unwrap();
        if let Some(sent) = sent {
            inner.last_sent = sent;
        }
        if let Some(received) = received {
            inner.last_received = received;
        }
    }

    async fn has(&self, id: &str) -> bool {
        self.inner.read().unwrap().ids.contains_key(id)
    }
}
