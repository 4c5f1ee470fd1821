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
use async_trait::async_trait;

use shared::action::{Action, ActionStatus, Meta, Resend};

mod memory;

pub use memory::MemoryStore;

/// Partial meta update applied through [`Store::change_meta`].
///
/// Addressing entries are appended (deduplicated), never replaced, so a
/// resend result can only widen delivery.
#[derive(Debug, Clone, Default)]
pub struct MetaPatch {
    pub status: Option<ActionStatus>,
    pub nodes: Vec<String>,
    pub clients: Vec<String>,
    pub users: Vec<String>,
    pub channels: Vec<String>,
}

impl MetaPatch {
    pub fn status(status: ActionStatus) -> Self {
        MetaPatch {
            status: Some(status),
            ..MetaPatch::default()
        }
    }

    pub fn apply(&self, meta: &mut Meta) {
        if let Some(status) = self.status {
            meta.status = Some(status);
        }
        for (source, target) in [
            (&self.nodes, &mut meta.nodes),
            (&self.clients, &mut meta.clients),
            (&self.users, &mut meta.users),
            (&self.channels, &mut meta.channels),
        ] {
            for entry in source {
                if !target.iter().any(|existing| existing == entry) {
                    target.push(entry.clone());
                }
            }
        }
    }
}

impl From<Resend> for MetaPatch {
    fn from(resend: Resend) -> Self {
        MetaPatch {
            status: None,
            nodes: resend.nodes,
            clients: resend.clients,
            users: resend.users,
            channels: resend.channels,
        }
    }
}

/// Contract the node core relies on for log persistence. The default is
/// [`MemoryStore`]; persistent stores implement the same surface.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts an entry, assigning its `added` index. Returns `None` when
    /// the id is already present (duplicate inserts are rejected).
    async fn add(&self, action: Action, meta: Meta) -> Option<Meta>;

    /// Applies a patch to the entry with this id. False when absent.
    async fn change_meta(&self, id: &str, patch: MetaPatch) -> bool;

    async fn remove(&self, id: &str) -> Option<(Action, Meta)>;

    /// Drops `reason` from every entry carrying it and removes entries left
    /// with no reasons. Returns what was removed, in added order.
    async fn remove_reason(&self, reason: &str) -> Vec<(Action, Meta)>;

    async fn by_id(&self, id: &str) -> Option<(Action, Meta)>;

    /// Snapshot of all entries in added order.
    async fn entries(&self) -> Vec<(Action, Meta)>;

    async fn last_added(&self) -> u64;

    /// `(sent, received)` synchronization watermarks kept for sync peers.
    async fn last_synced(&self) -> (u64, u64);

    async fn set_last_synced(&self, sent: Option<u64>, received: Option<u64>);

    async fn has(&self, id: &str) -> bool;
}
