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
use std::time::Instant;

use shared::action::{Action, ActionStatus, Meta, SUBSCRIBE_TYPE, UNSUBSCRIBE_TYPE};
use shared::node_id::parse_action_id;

use crate::channels::{self, ChannelFilter};
use crate::client::ServerClient;
use crate::context::Context;
use crate::events::ServerEvent;
use crate::log::Entry;
use crate::server::ServerCore;
use crate::store::MetaPatch;
use crate::types::TypeHandler;

/// Dispatcher actor: owns the ordered stream of `add` events and drives
/// each entry through resend → fan-out → process. The loop itself never
/// awaits user callbacks; every entry continues on its own task so one
/// slow processor cannot stall the log.
pub(crate) fn spawn_dispatcher(
    core: Arc<ServerCore>,
    entries: flume::Receiver<Entry>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = core.stop.wait_async() => {
                    break;
                }
                entry = entries.recv_async() => {
                    match entry {
                        Ok(Entry { action, meta }) => dispatch(&core, action, meta),
                        Err(_) => break,
                    }
                }
            }
        }
    })
}

fn dispatch(core: &Arc<ServerCore>, action: Action, meta: Meta) {
    let start = Instant::now();
    core.bus.emit(ServerEvent::Add {
        id: meta.id.clone(),
        kind: action.kind.clone(),
    });
    if core.is_destroying() {
        return;
    }

    let own = meta.server.as_deref() == Some(core.node_id.as_str());
    let core = core.clone();
    match action.kind.as_str() {
        SUBSCRIBE_TYPE if own => {
            tokio::spawn(async move {
                channels::handle_subscribe(&core, action, meta, start).await;
            });
        }
        UNSUBSCRIBE_TYPE if own => {
            tokio::spawn(async move {
                channels::handle_unsubscribe(&core, action, meta).await;
            });
        }
        SUBSCRIBE_TYPE | UNSUBSCRIBE_TYPE => {}
        _ => {
            tokio::spawn(async move {
                handle_entry(&core, action, meta, start).await;
            });
        }
    }
}

async fn handle_entry(core: &Arc<ServerCore>, action: Action, mut meta: Meta, start: Instant) {
    // Control actions never match processors
    let processor = if action.is_control() {
        None
    } else {
        core.types.lookup(&action.kind)
    };
    let origin = parse_action_id(&meta.id);

    if let Some(handler) = &processor
        && let Some(resend) = &handler.resend
        && meta.status == Some(ActionStatus::Waiting)
        && let Some(origin) = &origin
    {
        let ctx = core.context_for(&origin.node, &meta);
        match resend(ctx, action.clone(), meta.clone()).await {
            Ok(extra) if !extra.is_empty() => {
                let patch = MetaPatch::from(extra);
                core.log.change_meta(&meta.id, patch.clone()).await;
                patch.apply(&mut meta);
            }
            Ok(_) => {}
            Err(error) => {
                core.bus.emit(ServerEvent::Error {
                    action_id: Some(meta.id.clone()),
                    message: error.to_string(),
                });
                core.undo(&meta, "error").await;
                core.debug_to_origin(&meta, &error.to_string()).await;
                return;
            }
        }
    }

    // Processed, unmatched and unaddressed: nobody will ever see it
    if meta.status == Some(ActionStatus::Processed)
        && processor.is_none()
        && meta.has_no_addressing()
    {
        core.bus.emit(ServerEvent::Useless {
            id: meta.id.clone(),
        });
    }

    send_action(core, &action, &meta).await;

    if meta.status == Some(ActionStatus::Waiting) {
        match processor {
            None => unknown_type(core, &action, &meta).await,
            Some(handler) => {
                if handler.process.is_some() {
                    process_action(core, &handler, action, meta, start).await;
                } else {
                    core.bus.emit(ServerEvent::Processed {
                        id: meta.id.clone(),
                        latency_ms: 0,
                    });
                    core.mark_as_processed(&meta).await;
                    run_finally(core, &handler, &action, &meta).await;
                }
            }
        }
    } else if meta.status.is_some() {
        core.bus.emit(ServerEvent::Processed {
            id: meta.id.clone(),
            latency_ms: 0,
        });
    }
}

/// An added action with `waiting` status and no processor anywhere.
async fn unknown_type(core: &Arc<ServerCore>, action: &Action, meta: &Meta) {
    core.log
        .change_meta(&meta.id, MetaPatch::status(ActionStatus::Error))
        .await;
    core.bus.emit(ServerEvent::UnknownType {
        id: meta.id.clone(),
        kind: action.kind.clone(),
    });
    let from_server = parse_action_id(&meta.id)
        .and_then(|parsed| parsed.node.user_id)
        .is_some_and(|user| user == crate::consts::SERVER_USER_ID);
    if !from_server {
        core.undo(meta, "unknownType").await;
    }
    core.debug_to_origin(meta, &format!("Action with unknown type {}", action.kind))
        .await;
}

async fn process_action(
    core: &Arc<ServerCore>,
    handler: &Arc<TypeHandler>,
    action: Action,
    meta: Meta,
    start: Instant,
) {
    core.enter_process();
    let ctx = match parse_action_id(&meta.id) {
        Some(origin) => core.context_for(&origin.node, &meta),
        None => {
            core.exit_process();
            return;
        }
    };

    let process = handler.process.as_ref().expect("checked by caller");
    match process(ctx, action.clone(), meta.clone()).await {
        Ok(()) => {
            core.bus.emit(ServerEvent::Processed {
                id: meta.id.clone(),
                latency_ms: start.elapsed().as_millis() as u64,
            });
            core.mark_as_processed(&meta).await;
        }
        Err(error) => {
            core.log
                .change_meta(&meta.id, MetaPatch::status(ActionStatus::Error))
                .await;
            core.bus.emit(ServerEvent::Error {
                action_id: Some(meta.id.clone()),
                message: error.to_string(),
            });
            core.undo(&meta, "error").await;
            core.debug_to_origin(&meta, &error.to_string()).await;
        }
    }

    run_finally(core, handler, &action, &meta).await;
    core.exit_process();
}

/// `finally` runs whatever happened before; its failures are reported but
/// never override the primary outcome.
async fn run_finally(
    core: &Arc<ServerCore>,
    handler: &Arc<TypeHandler>,
    action: &Action,
    meta: &Meta,
) {
    let Some(finally) = &handler.finally else {
        return;
    };
    let Some(origin) = parse_action_id(&meta.id) else {
        return;
    };
    let ctx = core.context_for(&origin.node, meta);
    if let Err(error) = finally(ctx, action.clone(), meta.clone()).await {
        core.bus.emit(ServerEvent::Error {
            action_id: Some(meta.id.clone()),
            message: error.to_string(),
        });
    }
}

/// Fans an action out to every interested peer: direct node/client/user
/// addressing plus channel subscribers whose filter accepts it. Each peer
/// receives at most one copy; the originating client never gets one back.
pub(crate) async fn send_action(core: &Arc<ServerCore>, action: &Action, meta: &Meta) {
    let origin_client = parse_action_id(&meta.id).map(|parsed| parsed.node.client_id);
    let is_origin = |client: &Arc<ServerClient>| {
        origin_client.is_some() && client.client_id() == origin_client
    };

    let mut targets: HashMap<String, Arc<ServerClient>> = HashMap::new();
    let mut insert = |client: Arc<ServerClient>| {
        if !is_origin(&client) {
            targets.entry(client.key.clone()).or_insert(client);
        }
    };

    for node_id in &meta.nodes {
        if let Some(client) = core.registry.client_by_node(node_id) {
            insert(client);
        }
    }
    for client_id in &meta.clients {
        if let Some(client) = core.registry.client_by_client_id(client_id) {
            insert(client);
        }
    }
    for user_id in &meta.users {
        if user_id.is_empty() {
            continue;
        }
        for client in core.registry.clients_by_user(user_id) {
            insert(client);
        }
    }

    // Filters run at most once per subscriber per fan-out, whatever the
    // number of matching channels
    let mut filter_results: HashMap<String, bool> = HashMap::new();
    for channel in &meta.channels {
        for (node_id, filter) in core.registry.channel_subscribers(channel) {
            let Some(client) = core.registry.client_by_node(&node_id) else {
                continue;
            };
            if targets.contains_key(&client.key) || is_origin(&client) {
                continue;
            }
            let accepted = match filter {
                ChannelFilter::All => true,
                ChannelFilter::Fn(filter) => {
                    if let Some(cached) = filter_results.get(&node_id) {
                        *cached
                    } else {
                        let ctx = Context::new(
                            &shared::node_id::parse_node_id(&node_id),
                            client.subprotocol(),
                            core.log.clone(),
                        );
                        let accepted = match filter(ctx, action.clone(), meta.clone()).await {
                            Ok(accepted) => accepted,
                            Err(error) => {
                                core.bus.emit(ServerEvent::Error {
                                    action_id: Some(meta.id.clone()),
                                    message: error.to_string(),
                                });
                                false
                            }
                        };
                        filter_results.insert(node_id.clone(), accepted);
                        accepted
                    }
                }
            };
            if accepted {
                targets.entry(client.key.clone()).or_insert(client);
            }
        }
    }

    for client in targets.into_values() {
        client.send_action(action, meta).await;
    }
}
