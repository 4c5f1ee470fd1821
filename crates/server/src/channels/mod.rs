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
use std::time::Instant;

use anyhow::Result;
use futures::future::BoxFuture;
use regex::Regex;

use shared::action::{Action, Meta};
use shared::log;
use shared::node_id::parse_action_id;

use crate::context::Context;
use crate::events::ServerEvent;
use crate::server::ServerCore;
use crate::types::FinallyFn;

pub mod pattern;

pub use pattern::{ChannelPattern, Matcher};

/// Outcome of a channel access check. `WrongChannel` lets a callback
/// reject the channel name itself instead of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAccess {
    Granted,
    Denied,
    WrongChannel,
}

impl From<bool> for ChannelAccess {
    fn from(granted: bool) -> Self {
        if granted {
            ChannelAccess::Granted
        } else {
            ChannelAccess::Denied
        }
    }
}

pub type ChannelAccessFn =
    Arc<dyn Fn(Context, Action, Meta) -> BoxFuture<'static, Result<ChannelAccess>> + Send + Sync>;
/// Per-subscriber predicate deciding which channel actions they receive.
pub type FilterFn =
    Arc<dyn Fn(Context, Action, Meta) -> BoxFuture<'static, Result<bool>> + Send + Sync>;
pub type FilterInitFn =
    Arc<dyn Fn(Context, Action, Meta) -> BoxFuture<'static, Result<FilterFn>> + Send + Sync>;
pub type LoadFn =
    Arc<dyn Fn(Context, Action, Meta) -> BoxFuture<'static, Result<Vec<Action>>> + Send + Sync>;

/// Builds a [`FilterFn`] from a plain async closure.
pub fn filter_fn<F, Fut>(filter: F) -> FilterFn
where
    F: Fn(Context, Action, Meta) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Arc::new(move |ctx, action, meta| Box::pin(filter(ctx, action, meta)))
}

/// What a subscriber entry stores: everything, or a dynamic predicate.
#[derive(Clone)]
pub enum ChannelFilter {
    All,
    Fn(FilterFn),
}

impl ChannelFilter {
    pub fn accepts_everything(&self) -> bool {
        matches!(self, ChannelFilter::All)
    }
}

impl std::fmt::Debug for ChannelFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelFilter::All => f.write_str("ChannelFilter::All"),
            ChannelFilter::Fn(_) => f.write_str("ChannelFilter::Fn"),
        }
    }
}

/// Callbacks bound to one channel pattern. `access` is mandatory.
#[derive(Clone)]
pub struct ChannelCallbacks {
    pub access: ChannelAccessFn,
    pub filter: Option<FilterInitFn>,
    pub load: Option<LoadFn>,
    pub finally: Option<FinallyFn>,
}

impl ChannelCallbacks {
    pub fn new<F, Fut>(access: F) -> Self
    where
        F: Fn(Context, Action, Meta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        let access: ChannelAccessFn = Arc::new(move |ctx, action, meta| {
            let fut = access(ctx, action, meta);
            Box::pin(async move { fut.await.map(ChannelAccess::from) })
        });
        ChannelCallbacks {
            access,
            filter: None,
            load: None,
            finally: None,
        }
    }

    /// Raw constructor for callbacks that need the three-way verdict.
    pub fn with_access(access: ChannelAccessFn) -> Self {
        ChannelCallbacks {
            access,
            filter: None,
            load: None,
            finally: None,
        }
    }

    pub fn with_filter<F, Fut>(mut self, filter: F) -> Self
    where
        F: Fn(Context, Action, Meta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FilterFn>> + Send + 'static,
    {
        self.filter = Some(Arc::new(move |ctx, action, meta| {
            Box::pin(filter(ctx, action, meta))
        }));
        self
    }

    pub fn with_load<F, Fut>(mut self, load: F) -> Self
    where
        F: Fn(Context, Action, Meta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Action>>> + Send + 'static,
    {
        self.load = Some(Arc::new(move |ctx, action, meta| {
            Box::pin(load(ctx, action, meta))
        }));
        self
    }

    pub fn with_finally<F, Fut>(mut self, finally: F) -> Self
    where
        F: Fn(Context, Action, Meta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.finally = Some(Arc::new(move |ctx, action, meta| {
            Box::pin(finally(ctx, action, meta))
        }));
        self
    }
}

/// Ordered list of channel definitions plus the terminal catch-all.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: RwLock<Vec<(Matcher, Arc<ChannelCallbacks>)>>,
    other: RwLock<Option<Arc<ChannelCallbacks>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        ChannelRegistry::default()
    }

    pub fn add(&self, pattern: &str, callbacks: ChannelCallbacks) {
        self.channels
            .write()
            .unwrap()
            .push((Matcher::pattern(pattern), Arc::new(callbacks)));
    }

    pub fn add_regex(&self, pattern: Regex, callbacks: ChannelCallbacks) {
        self.channels
            .write()
            .unwrap()
            .push((Matcher::Regex(pattern), Arc::new(callbacks)));
    }

    pub fn set_other(&self, callbacks: ChannelCallbacks) {
        *self.other.write().unwrap() = Some(Arc::new(callbacks));
    }

    /// First matching definition wins; the catch-all matches with no params.
    pub fn find(&self, channel: &str) -> Option<(Arc<ChannelCallbacks>, HashMap<String, String>)> {
        for (matcher, callbacks) in self.channels.read().unwrap().iter() {
            if let Some(params) = matcher.matches(channel) {
                return Some((callbacks.clone(), params));
            }
        }
        self.other
            .read()
            .unwrap()
            .clone()
            .map(|callbacks| (callbacks, HashMap::new()))
    }
}

/// `logux/subscribe` flow. Runs on the dispatcher after the action was
/// added; the subscribe action itself was already admitted by the client.
pub(crate) async fn handle_subscribe(
    core: &Arc<ServerCore>,
    action: Action,
    meta: Meta,
    start: Instant,
) {
    let Some(channel) = action.channel().map(str::to_string) else {
        core.wrong_channel(&action, &meta).await;
        return;
    };
    let Some(origin) = parse_action_id(&meta.id) else {
        core.wrong_channel(&action, &meta).await;
        return;
    };
    let Some((callbacks, params)) = core.channels.find(&channel) else {
        core.wrong_channel(&action, &meta).await;
        return;
    };

    let ctx = core
        .context_for(&origin.node, &meta)
        .with_params(params);

    let mut registered = false;
    let outcome: Result<()> = async {
        match (callbacks.access)(ctx.clone(), action.clone(), meta.clone()).await? {
            ChannelAccess::WrongChannel => {
                core.wrong_channel(&action, &meta).await;
                return Ok(());
            }
            ChannelAccess::Denied => {
                core.deny(&action, &meta).await;
                return Ok(());
            }
            ChannelAccess::Granted => {}
        }

        // The authorizing client may have disconnected while access ran
        if !ctx.is_server() && core.registry.client_by_node(&origin.node.node_id).is_none() {
            core.bus.emit(ServerEvent::SubscriptionCancelled {
                channel: channel.clone(),
            });
            return Ok(());
        }

        let filter = match &callbacks.filter {
            Some(init) => {
                ChannelFilter::Fn(init(ctx.clone(), action.clone(), meta.clone()).await?)
            }
            None => ChannelFilter::All,
        };

        let new_channel = core
            .registry
            .subscribe(&channel, &origin.node.node_id, filter);
        registered = true;
        if new_channel {
            core.bus.emit(ServerEvent::Subscribing {
                channel: channel.clone(),
                node_id: origin.node.node_id.clone(),
            });
        }

        if let Some(load) = &callbacks.load {
            let initial = load(ctx.clone(), action.clone(), meta.clone()).await?;
            for initial_action in initial {
                ctx.send_back(initial_action).await?;
            }
        }

        core.bus.emit(ServerEvent::Subscribed {
            channel: channel.clone(),
            node_id: origin.node.node_id.clone(),
            latency_ms: start.elapsed().as_millis() as u64,
        });
        core.mark_as_processed(&meta).await;
        Ok(())
    }
    .await;

    if let Err(error) = outcome {
        core.bus.emit(ServerEvent::Error {
            action_id: Some(meta.id.clone()),
            message: error.to_string(),
        });
        core.undo(&meta, "error").await;
        core.debug_to_origin(&meta, &error.to_string()).await;
        if registered && core.registry.unsubscribe(&channel, &origin.node.node_id) {
            core.bus.emit(ServerEvent::Unsubscribed {
                channel: channel.clone(),
                node_id: origin.node.node_id.clone(),
            });
        }
    }

    if let Some(finally) = &callbacks.finally
        && let Err(error) = finally(ctx, action, meta).await
    {
        core.bus.emit(ServerEvent::Error {
            action_id: None,
            message: error.to_string(),
        });
    }
}

/// `logux/unsubscribe` flow: symmetric removal, always acknowledged.
pub(crate) async fn handle_unsubscribe(core: &Arc<ServerCore>, action: Action, meta: Meta) {
    let Some(channel) = action.channel().map(str::to_string) else {
        core.wrong_channel(&action, &meta).await;
        return;
    };
    let Some(origin) = parse_action_id(&meta.id) else {
        core.wrong_channel(&action, &meta).await;
        return;
    };

    if core.registry.unsubscribe(&channel, &origin.node.node_id) {
        log::debug!("{} unsubscribed from {}", origin.node.node_id, channel);
    }
    core.bus.emit(ServerEvent::Unsubscribed {
        channel,
        node_id: origin.node.node_id.clone(),
    });
    core.mark_as_processed(&meta).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_in_registration_order() {
        let registry = ChannelRegistry::new();
        registry.add("user/:id", ChannelCallbacks::new(|_, _, _| async { Ok(true) }));
        registry.add_regex(
            Regex::new("^user/admin$").unwrap(),
            ChannelCallbacks::new(|_, _, _| async { Ok(false) }),
        );

        // First registration wins even though the regex also matches
        let (_, params) = registry.find("user/admin").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("admin"));
    }

    #[test]
    fn test_find_falls_back_to_other() {
        let registry = ChannelRegistry::new();
        registry.add("user/:id", ChannelCallbacks::new(|_, _, _| async { Ok(true) }));
        assert!(registry.find("rooms/1").is_none());
        registry.set_other(ChannelCallbacks::new(|_, _, _| async { Ok(true) }));
        let (_, params) = registry.find("rooms/1").unwrap();
        assert!(params.is_empty());
    }
}
