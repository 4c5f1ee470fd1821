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
use std::sync::{Arc, RwLock};

use anyhow::Result;
use futures::future::BoxFuture;
use regex::Regex;

use shared::action::{Action, Meta, Resend};

use crate::context::Context;

/// Outcome of a type access check. User callbacks usually answer with a
/// plain bool; the backend proxy also needs `Unknown` to route an action
/// into the unknown-type path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAccess {
    Granted,
    Denied,
    Unknown,
}

impl From<bool> for TypeAccess {
    fn from(granted: bool) -> Self {
        if granted {
            TypeAccess::Granted
        } else {
            TypeAccess::Denied
        }
    }
}

pub type AccessFn =
    Arc<dyn Fn(Context, Action, Meta) -> BoxFuture<'static, Result<TypeAccess>> + Send + Sync>;
pub type ProcessFn =
    Arc<dyn Fn(Context, Action, Meta) -> BoxFuture<'static, Result<()>> + Send + Sync>;
pub type ResendFn =
    Arc<dyn Fn(Context, Action, Meta) -> BoxFuture<'static, Result<Resend>> + Send + Sync>;
pub type FinallyFn =
    Arc<dyn Fn(Context, Action, Meta) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Callbacks bound to one action type. `access` is mandatory, the rest
/// optional.
#[derive(Clone)]
pub struct TypeHandler {
    pub access: AccessFn,
    pub process: Option<ProcessFn>,
    pub resend: Option<ResendFn>,
    pub finally: Option<FinallyFn>,
}

impl TypeHandler {
    pub fn new<F, Fut>(access: F) -> Self
    where
        F: Fn(Context, Action, Meta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        let access: AccessFn = Arc::new(move |ctx, action, meta| {
            let fut = access(ctx, action, meta);
            Box::pin(async move { fut.await.map(TypeAccess::from) })
        });
        TypeHandler {
            access,
            process: None,
            resend: None,
            finally: None,
        }
    }

    /// Raw constructor for handlers that need the three-way access verdict.
    pub fn with_access(access: AccessFn) -> Self {
        TypeHandler {
            access,
            process: None,
            resend: None,
            finally: None,
        }
    }

    pub fn with_process<F, Fut>(mut self, process: F) -> Self
    where
        F: Fn(Context, Action, Meta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.process = Some(Arc::new(move |ctx, action, meta| {
            Box::pin(process(ctx, action, meta))
        }));
        self
    }

    pub fn with_resend<F, Fut>(mut self, resend: F) -> Self
    where
        F: Fn(Context, Action, Meta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resend>> + Send + 'static,
    {
        self.resend = Some(Arc::new(move |ctx, action, meta| {
            Box::pin(resend(ctx, action, meta))
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

/// Registered action processors: exact names first, then regular
/// expressions in registration order, then the fallback.
#[derive(Default)]
pub struct TypeRegistry {
    types: RwLock<std::collections::HashMap<String, Arc<TypeHandler>>>,
    regex_types: RwLock<Vec<(Regex, Arc<TypeHandler>)>>,
    other: RwLock<Option<Arc<TypeHandler>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// Registering the same exact type twice is a programming error.
    pub fn add(&self, kind: &str, handler: TypeHandler) {
        let mut types = self.types.write().unwrap();
        if types.contains_key(kind) {
            panic!("action type {} was already defined", kind);
        }
        types.insert(kind.to_string(), Arc::new(handler));
    }

    pub fn add_regex(&self, pattern: Regex, handler: TypeHandler) {
        self.regex_types
            .write()
            .unwrap()
            .push((pattern, Arc::new(handler)));
    }

    pub fn set_other(&self, handler: TypeHandler) {
        *self.other.write().unwrap() = Some(Arc::new(handler));
    }

    /// Resolution order: exact table, first matching regex, fallback.
    pub fn lookup(&self, kind: &str) -> Option<Arc<TypeHandler>> {
        if let Some(handler) = self.types.read().unwrap().get(kind) {
            return Some(handler.clone());
        }
        for (pattern, handler) in self.regex_types.read().unwrap().iter() {
            if pattern.is_match(kind) {
                return Some(handler.clone());
            }
        }
        self.other.read().unwrap().clone()
    }

    /// True when an exact or regex processor matches (the fallback does
    /// not count; used by preadd short-circuit and the control endpoint).
    pub fn is_known(&self, kind: &str) -> bool {
        if self.types.read().unwrap().contains_key(kind) {
            return true;
        }
        self.regex_types
            .read()
            .unwrap()
            .iter()
            .any(|(pattern, _)| pattern.is_match(kind))
    }

    pub fn has_other(&self) -> bool {
        self.other.read().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_all() -> TypeHandler {
        TypeHandler::new(|_, _, _| async { Ok(true) })
    }

    #[test]
    fn test_lookup_order() {
        let registry = TypeRegistry::new();
        registry.add("users/rename", allow_all());
        registry.add_regex(Regex::new("^users/").unwrap(), allow_all());
        registry.set_other(allow_all());

        assert!(registry.lookup("users/rename").is_some());
        assert!(registry.lookup("users/delete").is_some());
        assert!(registry.lookup("posts/create").is_some()); // fallback
        assert!(registry.is_known("users/delete"));
        assert!(!registry.is_known("posts/create"));
    }

    #[test]
    fn test_lookup_without_fallback() {
        let registry = TypeRegistry::new();
        registry.add("users/rename", allow_all());
        assert!(registry.lookup("posts/create").is_none());
        assert!(!registry.has_other());
    }

    #[test]
    #[should_panic(expected = "already defined")]
    fn test_duplicate_type_panics() {
        let registry = TypeRegistry::new();
        registry.add("users/rename", allow_all());
        registry.add("users/rename", allow_all());
    }

    #[tokio::test]
    async fn test_bool_access_maps_to_verdict() {
        let handler = TypeHandler::new(|_, _, _| async { Ok(false) });
        let (log_tx, _log_rx) = flume::unbounded();
        let log = std::sync::Arc::new(crate::log::Log::new(
            std::sync::Arc::new(crate::store::MemoryStore::new()),
            crate::log::Clock::test(0),
            "server:x",
            log_tx,
            crate::events::EventBus::new(4),
        ));
        let ctx = crate::context::Context::new(
            &shared::node_id::parse_node_id("10:uuid"),
            None,
            log,
        );
        let verdict = (handler.access)(ctx, Action::new("a"), Meta::default())
            .await
            .unwrap();
        assert_eq!(verdict, TypeAccess::Denied);
    }
}
