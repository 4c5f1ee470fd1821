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
use super::*;

use shared::action::ActionStatus;
use shared::log;

use crate::store::MemoryStore;

fn new_log() -> (Log, flume::Receiver<Entry>) {
    let (tx, rx) = flume::unbounded();
    let log = Log::new(
        Arc::new(MemoryStore::new()),
        Clock::test(0),
        "server:x",
        tx,
        EventBus::new(16),
    );
    (log, rx)
}

#[tokio::test]
async fn test_ids_are_sequential() {
    log::setup_logging("debug", log::LogType::Test);

    let (log, rx) = new_log();
    let first = log
        .add(Action::new("a"), Meta::default())
        .await
        .unwrap()
        .unwrap();
    let second = log
        .add(Action::new("b"), Meta::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, "1 server:x 0");
    assert_eq!(second.id, "2 server:x 0");
    assert_eq!(first.time, 1);
    assert_eq!(second.time, 2);
    // Both entries reached the dispatcher, in order
    assert_eq!(rx.recv_async().await.unwrap().meta.id, "1 server:x 0");
    assert_eq!(rx.recv_async().await.unwrap().meta.id, "2 server:x 0");
}

#[tokio::test]
async fn test_existing_id_keeps_time_from_counter() {
    log::setup_logging("debug", log::LogType::Test);

    let (log, _rx) = new_log();
    let meta = log
        .add(Action::new("a"), Meta::with_id("5 10:uuid 0"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.time, 5);
}

#[tokio::test]
async fn test_duplicate_add_is_rejected_silently() {
    log::setup_logging("debug", log::LogType::Test);

    let (log, rx) = new_log();
    let meta = Meta::with_id("1 10:uuid 0");
    assert!(log.add(Action::new("a"), meta.clone()).await.unwrap().is_some());
    assert!(log.add(Action::new("b"), meta).await.unwrap().is_none());
    // Only one entry dispatched
    assert_eq!(rx.len(), 1);
    assert_eq!(log.entries().await.len(), 1);
}

#[tokio::test]
async fn test_preadd_hook_mutates_meta() {
    log::setup_logging("debug", log::LogType::Test);

    let (log, _rx) = new_log();
    log.set_preadd(Box::new(|action, meta| {
        if !action.is_control() {
            meta.status = Some(ActionStatus::Waiting);
        }
        meta.server = Some("server:x".to_string());
    }));
    let meta = log
        .add(Action::new("a"), Meta::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.status, Some(ActionStatus::Waiting));
    assert_eq!(meta.server.as_deref(), Some("server:x"));
}

#[tokio::test]
async fn test_remove_reason_reports_clean() {
    log::setup_logging("debug", log::LogType::Test);

    let (tx, _rx) = flume::unbounded();
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let log = Log::new(
        Arc::new(MemoryStore::new()),
        Clock::test(0),
        "server:x",
        tx,
        bus,
    );
    let mut meta = Meta::default();
    meta.reasons = vec!["tmp".to_string()];
    log.add(Action::new("a"), meta).await.unwrap().unwrap();
    assert_eq!(log.remove_reason("tmp").await, 1);
    assert_eq!(events.recv().await.unwrap().kind(), "clean");
    assert!(log.entries().await.is_empty());
}
