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
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use shared::action::{Action, Meta};
use shared::log;

use crate::events::{EventBus, ServerEvent};
use crate::store::{MetaPatch, Store};

/// Logical timestamp source for ids and `meta.time`. The test clock ticks
/// by one on every use so ids come out as `1 server:x 0`, `2 server:x 0`…
pub enum Clock {
    Real,
    Test(AtomicI64),
}

impl Clock {
    pub fn test(start: i64) -> Self {
        Clock::Test(AtomicI64::new(start))
    }

    fn now(&self) -> i64 {
        match self {
            Clock::Real => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis() as i64)
                .unwrap_or(0),
            Clock::Test(counter) => counter.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}

/// One log entry travelling from `add` to the dispatcher.
#[derive(Debug, Clone)]
pub struct Entry {
    pub action: Action,
    pub meta: Meta,
}

/// Synchronous hook run before an entry is stored. May mutate meta.
pub type PreaddFn = Box<dyn Fn(&Action, &mut Meta) + Send + Sync>;

/// Append-only action log: wraps the store, stamps ids and times, runs the
/// preadd hook, and feeds accepted entries to the dispatcher in order.
pub struct Log {
    store: Arc<dyn Store>,
    clock: Clock,
    node_id: String,
    // (last issued counter, seq within that counter)
    seq: Mutex<(i64, i64)>,
    dispatch_tx: flume::Sender<Entry>,
    bus: EventBus,
    preadd: OnceLock<PreaddFn>,
}

impl Log {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Clock,
        node_id: &str,
        dispatch_tx: flume::Sender<Entry>,
        bus: EventBus,
    ) -> Self {
        Log {
            store,
            clock,
            node_id: node_id.to_string(),
            seq: Mutex::new((0, 0)),
            dispatch_tx,
            bus,
            preadd: OnceLock::new(),
        }
    }

    /// Installs the preadd hook. Set once by the server during assembly.
    pub fn set_preadd(&self, hook: PreaddFn) {
        if self.preadd.set(hook).is_err() {
            panic!("preadd hook installed twice");
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    fn next_id(&self) -> (i64, String) {
        let counter = self.clock.now();
        let mut seq = self.seq.lock().unwrap();
        if counter > seq.0 {
            *seq = (counter, 0);
        } else {
            seq.1 += 1;
        }
        (seq.0, format!("{} {} {}", seq.0, self.node_id, seq.1))
    }

    /// Appends an entry. Returns the stored meta, or `None` when the id is
    /// already known (duplicate inserts are rejected).
    pub async fn add(&self, action: Action, mut meta: Meta) -> Result<Option<Meta>> {
        if meta.id.is_empty() {
            let (counter, id) = self.next_id();
            meta.id = id;
            if meta.time == 0 {
                meta.time = counter;
            }
        } else if meta.time == 0 {
            meta.time = shared::node_id::parse_action_id(&meta.id)
                .map(|parsed| parsed.counter)
                .unwrap_or_else(|| self.clock.now());
        }

        if let Some(preadd) = self.preadd.get() {
            preadd(&action, &mut meta);
        }

        let Some(stored) = self.store.add(action.clone(), meta).await else {
            return Ok(None);
        };

        // A stopped dispatcher only means shutdown: the entry is stored,
        // it just will not be dispatched anymore
        if self
            .dispatch_tx
            .send_async(Entry {
                action,
                meta: stored.clone(),
            })
            .await
            .is_err()
        {
            log::debug!("Dispatcher is gone, {} stored without dispatch", stored.id);
        }
        Ok(Some(stored))
    }

    pub async fn change_meta(&self, id: &str, patch: MetaPatch) -> bool {
        self.store.change_meta(id, patch).await
    }

    /// Removes `reason` everywhere; entries left with no reasons are
    /// dropped and reported as cleaned.
    pub async fn remove_reason(&self, reason: &str) -> usize {
        let removed = self.store.remove_reason(reason).await;
        for (_, meta) in &removed {
            self.bus.emit(ServerEvent::Clean {
                id: meta.id.clone(),
            });
        }
        removed.len()
    }

    pub async fn by_id(&self, id: &str) -> Option<(Action, Meta)> {
        self.store.by_id(id).await
    }

    pub async fn entries(&self) -> Vec<(Action, Meta)> {
        self.store.entries().await
    }

    pub async fn actions(&self) -> Vec<Action> {
        self.entries()
            .await
            .into_iter()
            .map(|(action, _)| action)
            .collect()
    }

    pub async fn has(&self, id: &str) -> bool {
        self.store.has(id).await
    }
}

#[cfg(test)]
mod tests;
