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
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use rand::Rng;
use rand::distr::Alphanumeric;
use semver::{Version, VersionReq};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use shared::action::{Action, ActionStatus, Meta};
use shared::log;
use shared::node_id::{NodeInfo, parse_action_id};
use shared::protocol::PeerChannels;
use shared::system::trigger::Trigger;

use crate::backend::{BackendVerdict, HttpBackend};
use crate::bruteforce::AuthGuard;
use crate::channels::{
    ChannelAccess, ChannelAccessFn, ChannelCallbacks, ChannelFilter, ChannelRegistry,
};
use crate::client::ServerClient;
use crate::consts::{
    CHANNEL_SIZE, DEFAULT_CONTROL_HOST, DEFAULT_CONTROL_MASK, DEFAULT_CONTROL_PORT, DEFAULT_HOST,
    DEFAULT_PING_MS, DEFAULT_PORT, DEFAULT_TIMEOUT_MS, SERVER_USER_ID,
};
use crate::context::Context;
use crate::control::{self, CidrMask};
use crate::errors::{FatalError, FatalKind};
use crate::events::{EventBus, ServerEvent};
use crate::log::{Clock, Log};
use crate::registry::Registry;
use crate::store::{MemoryStore, MetaPatch, Store};
use crate::types::{AccessFn, TypeAccess, TypeHandler, TypeRegistry};

mod tls;

/// Rendering mode for debug frames and error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Env {
    Production,
    Development,
}

impl Env {
    fn from_environment() -> Env {
        let value = std::env::var("LOGUX_ENV").or_else(|_| std::env::var("NODE_ENV"));
        match value.as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Development,
        }
    }
}

/// Everything a deployment can configure. `Default` matches the documented
/// defaults; the config file maps onto this in `config`.
pub struct ServerOptions {
    /// SemVer of the application protocol this node speaks.
    pub subprotocol: Option<String>,
    /// SemVer range of client subprotocols this node accepts.
    pub supports: Option<String>,
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub ping: Duration,
    /// HTTP(S) backend receiving auth and unknown actions.
    pub backend: Option<String>,
    pub control_secret: Option<String>,
    pub control_mask: String,
    pub control_host: String,
    pub control_port: u16,
    pub env: Option<Env>,
    /// Test clock start; real time when absent.
    pub time: Option<i64>,
    /// Overrides the random node id suffix.
    pub id: Option<String>,
    /// Base path for certificate files.
    pub root: PathBuf,
    pub key: Option<String>,
    pub cert: Option<String>,
    pub store: Option<Arc<dyn Store>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            subprotocol: None,
            supports: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            ping: Duration::from_millis(DEFAULT_PING_MS),
            backend: None,
            control_secret: None,
            control_mask: DEFAULT_CONTROL_MASK.to_string(),
            control_host: DEFAULT_CONTROL_HOST.to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            env: None,
            time: None,
            id: None,
            root: PathBuf::from("."),
            key: None,
            cert: None,
            store: None,
        }
    }
}

/// What the authenticator callback sees for one handshake.
pub struct AuthRequest {
    pub user_id: Option<String>,
    pub credentials: Value,
    pub headers: Map<String, Value>,
    pub node_id: String,
    pub ip: IpAddr,
}

pub type Authenticator =
    Arc<dyn Fn(AuthRequest) -> BoxFuture<'static, Result<bool>> + Send + Sync>;

/// Shared state of one server node. Server clients, the dispatcher and the
/// control endpoint all hold an `Arc` of this; it exposes the narrow
/// surface they need (log append, indexes, reports).
pub struct ServerCore {
    pub node_id: String,
    pub env: Env,
    pub subprotocol: Option<String>,
    pub supports: Option<VersionReq>,
    pub timeout: Duration,
    pub ping: Duration,
    pub control_secret: Option<String>,
    pub control_mask: CidrMask,
    pub log: Arc<Log>,
    pub registry: Registry,
    pub types: TypeRegistry,
    pub channels: ChannelRegistry,
    pub bus: EventBus,
    pub auth_guard: AuthGuard,
    pub stop: Trigger,
    authenticator: RwLock<Option<Authenticator>>,
    destroying: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
    client_counter: AtomicU64,
}

impl ServerCore {
    pub(crate) fn next_client_key(&self) -> String {
        (self.client_counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    pub fn is_development(&self) -> bool {
        self.env == Env::Development
    }

    pub fn is_destroying(&self) -> bool {
        self.destroying.load(Ordering::SeqCst)
    }

    pub(crate) fn authenticator(&self) -> Option<Authenticator> {
        self.authenticator.read().unwrap().clone()
    }

    pub(crate) fn context_for(&self, origin: &NodeInfo, meta: &Meta) -> Context {
        Context::new(origin, meta.subprotocol.clone(), self.log.clone())
    }

    pub(crate) fn enter_process(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn exit_process(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
    }

    /// Appends a `logux/undo` for this action, delivered wherever the
    /// original went plus its originating client.
    pub(crate) async fn undo(&self, original: &Meta, reason: &str) {
        let mut meta = Meta {
            status: Some(ActionStatus::Processed),
            nodes: original.nodes.clone(),
            clients: original.clients.clone(),
            users: original.users.clone(),
            channels: original.channels.clone(),
            ..Meta::default()
        };
        if let Some(parsed) = parse_action_id(&original.id)
            && parsed.node.user_id.as_deref() != Some(SERVER_USER_ID)
            && !meta.clients.contains(&parsed.node.client_id)
        {
            meta.clients.push(parsed.node.client_id);
        }
        let action = Action::undo(&original.id, reason, Map::new());
        if let Err(error) = self.log.add(action, meta).await {
            self.bus.emit(ServerEvent::Error {
                action_id: Some(original.id.clone()),
                message: format!("failed to append undo: {}", error),
            });
        }
    }

    /// Authorizer said no: report, undo, tell the client in development.
    pub(crate) async fn deny(&self, _action: &Action, meta: &Meta) {
        self.bus.emit(ServerEvent::Denied {
            id: meta.id.clone(),
        });
        self.undo(meta, "denied").await;
        self.debug_to_origin(meta, "Action was denied").await;
    }

    pub(crate) async fn wrong_channel(&self, action: &Action, meta: &Meta) {
        self.bus.emit(ServerEvent::WrongChannel {
            id: meta.id.clone(),
            channel: action.channel().map(str::to_string),
        });
        self.undo(meta, "wrongChannel").await;
        self.debug_to_origin(
            meta,
            &format!("Wrong channel name {}", action.channel().unwrap_or_default()),
        )
        .await;
    }

    /// Unknown-type denial for actions rejected before reaching the log.
    pub(crate) async fn unknown_type_denial(&self, action: &Action, meta: &Meta) {
        self.bus.emit(ServerEvent::UnknownType {
            id: meta.id.clone(),
            kind: action.kind.clone(),
        });
        self.undo(meta, "unknownType").await;
        self.debug_to_origin(meta, &format!("Action with unknown type {}", action.kind))
            .await;
    }

    /// Development-only debug frame to the client that sent this action.
    pub(crate) async fn debug_to_origin(&self, meta: &Meta, message: &str) {
        if !self.is_development() {
            return;
        }
        let Some(parsed) = parse_action_id(&meta.id) else {
            return;
        };
        if let Some(client) = self.registry.client_by_client_id(&parsed.node.client_id) {
            client.send_debug(message).await;
        }
    }

    /// Flags the entry processed and acknowledges it to the originating
    /// client with a `logux/processed`.
    pub(crate) async fn mark_as_processed(&self, meta: &Meta) {
        self.log
            .change_meta(&meta.id, MetaPatch::status(ActionStatus::Processed))
            .await;
        let Some(parsed) = parse_action_id(&meta.id) else {
            return;
        };
        if parsed.node.user_id.as_deref() == Some(SERVER_USER_ID) {
            return;
        }
        let ack = Action::processed(&meta.id);
        let ack_meta = Meta {
            status: Some(ActionStatus::Processed),
            clients: vec![parsed.node.client_id],
            ..Meta::default()
        };
        if let Err(error) = self.log.add(ack, ack_meta).await {
            self.bus.emit(ServerEvent::Error {
                action_id: Some(meta.id.clone()),
                message: format!("failed to append processed: {}", error),
            });
        }
    }
}

struct ListenOptions {
    host: String,
    port: u16,
    control_host: String,
    control_port: u16,
    root: PathBuf,
    key: Option<String>,
    cert: Option<String>,
}

/// A server node: owns the log, the registries and every connection.
pub struct Server {
    core: Arc<ServerCore>,
    listen: ListenOptions,
    _dispatcher: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").finish_non_exhaustive()
    }
}

impl Server {
    pub fn new(mut options: ServerOptions) -> Result<Server, FatalError> {
        let supports = match &options.supports {
            Some(range) => Some(VersionReq::parse(range).map_err(|error| {
                FatalError::option(&format!("invalid supports range {}: {}", range, error))
            })?),
            None => None,
        };
        if let Some(subprotocol) = &options.subprotocol {
            Version::parse(subprotocol).map_err(|error| {
                FatalError::option(&format!(
                    "invalid subprotocol {}: {}",
                    subprotocol, error
                ))
            })?;
        }
        if options.backend.is_none() {
            if options.subprotocol.is_none() {
                return Err(FatalError::option("subprotocol option is required"));
            }
            if supports.is_none() {
                return Err(FatalError::option("supports option is required"));
            }
        } else if options.control_secret.is_none() {
            return Err(FatalError::new(
                FatalKind::NoControlSecret,
                "backend requires control_secret option",
            ));
        }
        let control_mask = CidrMask::parse(&options.control_mask).map_err(|error| {
            FatalError::option(&format!(
                "invalid control_mask {}: {}",
                options.control_mask, error
            ))
        })?;

        let suffix = options.id.clone().unwrap_or_else(|| {
            rand::rng()
                .sample_iter(Alphanumeric)
                .take(8)
                .map(char::from)
                .collect()
        });
        let node_id = format!("{}:{}", SERVER_USER_ID, suffix);

        let clock = match options.time {
            Some(start) => Clock::test(start),
            None => Clock::Real,
        };
        let store: Arc<dyn Store> = options
            .store
            .take()
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let bus = EventBus::new(CHANNEL_SIZE);
        let (dispatch_tx, dispatch_rx) = flume::bounded(CHANNEL_SIZE);
        let log = Arc::new(Log::new(store, clock, &node_id, dispatch_tx, bus.clone()));

        let backend = options
            .backend
            .as_ref()
            .map(|url| Arc::new(HttpBackend::new(url, options.control_secret.as_deref().unwrap_or_default())));

        let core = Arc::new(ServerCore {
            node_id,
            env: options.env.unwrap_or_else(Env::from_environment),
            subprotocol: options.subprotocol.clone(),
            supports,
            timeout: options.timeout,
            ping: options.ping,
            control_secret: options.control_secret.clone(),
            control_mask,
            log,
            registry: Registry::new(),
            types: TypeRegistry::new(),
            channels: ChannelRegistry::new(),
            bus,
            auth_guard: AuthGuard::new(),
            stop: Trigger::new(),
            authenticator: RwLock::new(None),
            destroying: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            client_counter: AtomicU64::new(0),
        });

        // The preadd hook closes over the core weakly: the log lives
        // inside the core and must not keep it alive
        let weak = Arc::downgrade(&core);
        core.log.set_preadd(Box::new(move |action, meta| {
            if let Some(core) = weak.upgrade() {
                preadd(&core, action, meta);
            }
        }));

        if let Some(backend) = backend {
            wire_backend(&core, backend);
        }

        let dispatcher = crate::pipeline::spawn_dispatcher(core.clone(), dispatch_rx);
        log::info!("Server node {} created", core.node_id);
        Ok(Server {
            core,
            listen: ListenOptions {
                host: options.host,
                port: options.port,
                control_host: options.control_host,
                control_port: options.control_port,
                root: options.root,
                key: options.key,
                cert: options.cert,
            },
            _dispatcher: dispatcher,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.core.node_id
    }

    pub fn log(&self) -> &Arc<Log> {
        &self.core.log
    }

    pub fn events(&self) -> tokio::sync::broadcast::Receiver<ServerEvent> {
        self.core.bus.subscribe()
    }

    pub(crate) fn core(&self) -> &Arc<ServerCore> {
        &self.core
    }

    /// Installs the authentication callback. Required before `listen`
    /// unless a backend is configured.
    pub fn auth<F, Fut>(&self, authenticator: F)
    where
        F: Fn(AuthRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        *self.core.authenticator.write().unwrap() = Some(Arc::new(move |request| {
            Box::pin(authenticator(request))
        }));
    }

    pub fn add_type(&self, kind: &str, handler: TypeHandler) {
        self.core.types.add(kind, handler);
    }

    pub fn add_regex_type(&self, pattern: regex::Regex, handler: TypeHandler) {
        self.core.types.add_regex(pattern, handler);
    }

    pub fn other_type(&self, handler: TypeHandler) {
        self.core.types.set_other(handler);
    }

    pub fn channel(&self, pattern: &str, callbacks: ChannelCallbacks) {
        self.core.channels.add(pattern, callbacks);
    }

    pub fn channel_regex(&self, pattern: regex::Regex, callbacks: ChannelCallbacks) {
        self.core.channels.add_regex(pattern, callbacks);
    }

    pub fn other_channel(&self, callbacks: ChannelCallbacks) {
        self.core.channels.set_other(callbacks);
    }

    /// Appends an action to the log (server origin unless the meta says
    /// otherwise).
    pub async fn add(&self, action: Action, meta: Meta) -> Result<Option<Meta>> {
        self.core.log.add(action, meta).await
    }

    /// Appends an action and resolves once its terminal `processed` event
    /// fires, or fails on a matching `error`.
    pub async fn process(&self, action: Action, meta: Meta) -> Result<Meta> {
        let mut events = self.core.bus.subscribe();
        let Some(stored) = self.core.log.add(action, meta).await? else {
            anyhow::bail!("action id is already in the log");
        };
        let id = stored.id.clone();
        loop {
            match events.recv().await {
                Ok(ServerEvent::Processed { id: done, .. }) if done == id => return Ok(stored),
                Ok(ServerEvent::Error {
                    action_id: Some(failed),
                    message,
                }) if failed == id => anyhow::bail!(message),
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => anyhow::bail!("event bus closed"),
            }
        }
    }

    pub async fn undo(&self, meta: &Meta, reason: &str) {
        self.core.undo(meta, reason).await;
    }

    /// Channel subscription snapshot, `channel -> node id -> filter`.
    pub fn subscribers(&self) -> HashMap<String, HashMap<String, ChannelFilter>> {
        self.core.registry.subscribers_snapshot()
    }

    /// Attaches an already-established peer as a client connection.
    pub fn attach_peer(&self, channels: PeerChannels, addr: SocketAddr) -> Arc<ServerClient> {
        ServerClient::spawn(self.core.clone(), channels, addr)
    }

    /// Binds the sync listener and the control endpoint, then accepts
    /// until `destroy` fires the stop trigger.
    pub async fn listen(&self) -> Result<(), FatalError> {
        if self.core.authenticator().is_none() {
            return Err(FatalError::option(
                "authentication callback is required (set auth or configure a backend)",
            ));
        }

        let listener = TcpListener::bind((self.listen.host.as_str(), self.listen.port))
            .await
            .map_err(|error| FatalError::from_io(&error, "sync listener"))?;
        log::info!("Listening on {}", listener.local_addr().unwrap());

        let tls = match (&self.listen.key, &self.listen.cert) {
            (Some(key), Some(cert)) => Some(
                tls::acceptor(&self.listen.root, key, cert)
                    .map_err(|error| FatalError::option(&format!("TLS setup failed: {}", error)))?,
            ),
            (None, None) => None,
            _ => {
                return Err(FatalError::option(
                    "key and cert options must be set together",
                ));
            }
        };

        self.serve_control().await?;

        loop {
            tokio::select! {
                _ = self.core.stop.wait_async() => {
                    log::info!("Shutdown signal received, stopping listener");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, addr)) => {
                            log::debug!("Accepted connection from {}", addr);
                            let core = self.core.clone();
                            let tls = tls.clone();
                            tokio::spawn(async move {
                                if let Err(error) = accept_connection(core, socket, addr, tls).await {
                                    log::error!("Error handling connection from {}: {:?}", addr, error);
                                }
                            });
                        }
                        Err(error) => {
                            log::error!("Failed to accept connection: {:?}", error);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Binds the control endpoint on its own listener.
    pub async fn serve_control(&self) -> Result<SocketAddr, FatalError> {
        let listener = TcpListener::bind((
            self.listen.control_host.as_str(),
            self.listen.control_port,
        ))
        .await
        .map_err(|error| FatalError::from_io(&error, "control listener"))?;
        let addr = listener.local_addr().unwrap();
        log::info!("Control endpoint on {}", addr);

        let router = control::router(self.core.clone());
        let stop = self.core.stop.clone();
        tokio::spawn(async move {
            let service =
                router.into_make_service_with_connect_info::<SocketAddr>();
            let result = axum::serve(listener, service)
                .with_graceful_shutdown(async move { stop.wait_async().await })
                .await;
            if let Err(error) = result {
                log::error!("Control endpoint failed: {:?}", error);
            }
        });
        Ok(addr)
    }

    /// Disconnects everybody, stops the loops and resolves once every
    /// in-flight `process` has settled.
    pub async fn destroy(&self) {
        self.core.destroying.store(true, Ordering::SeqCst);
        self.core.stop.trigger();
        for client in self.core.registry.connected_clients() {
            client.destroy().await;
        }
        self.core.wait_idle().await;
        log::info!("Server node {} destroyed", self.core.node_id);
    }
}

/// Preadd hook: normalizes addressing, stamps origin fields and decides
/// the initial status.
fn preadd(core: &Arc<ServerCore>, action: &Action, meta: &mut Meta) {
    meta.normalize_addressing();
    if meta.server.is_none() {
        meta.server = Some(core.node_id.clone());
    }
    let status_absent = meta.status.is_none();
    let local = parse_action_id(&meta.id)
        .map(|parsed| parsed.node.node_id == core.node_id)
        .unwrap_or(false);
    if local && meta.subprotocol.is_none() {
        meta.subprotocol = core.subprotocol.clone();
    }
    if !action.is_control() && status_absent {
        // A local action nothing will ever process is born processed
        let unprocessable =
            local && !core.types.is_known(&action.kind) && !core.types.has_other();
        meta.status = Some(if unprocessable {
            ActionStatus::Processed
        } else {
            ActionStatus::Waiting
        });
    }
}

/// Registers the backend proxy as authenticator, fallback type and
/// fallback channel.
fn wire_backend(core: &Arc<ServerCore>, backend: Arc<HttpBackend>) {
    {
        let backend = backend.clone();
        *core.authenticator.write().unwrap() = Some(Arc::new(move |request: AuthRequest| {
            let backend = backend.clone();
            Box::pin(async move {
                backend
                    .authenticate(request.user_id.as_deref(), &request.credentials)
                    .await
            })
        }));
    }

    {
        let access_backend = backend.clone();
        let access: AccessFn = Arc::new(move |_ctx, action, meta| {
            let backend = access_backend.clone();
            Box::pin(async move {
                match backend.action_access(&action, &meta).await? {
                    BackendVerdict::Approved => Ok(TypeAccess::Granted),
                    BackendVerdict::Forbidden => Ok(TypeAccess::Denied),
                    BackendVerdict::UnknownAction | BackendVerdict::UnknownChannel => {
                        Ok(TypeAccess::Unknown)
                    }
                }
            })
        });
        let process_backend = backend.clone();
        let handler = TypeHandler::with_access(access).with_process(move |_ctx, _action, meta| {
            let backend = process_backend.clone();
            async move { backend.wait_processed(&meta.id).await }
        });
        core.types.set_other(handler);
    }

    {
        let access_backend = backend.clone();
        let access: ChannelAccessFn = Arc::new(move |_ctx, action, meta| {
            let backend = access_backend.clone();
            Box::pin(async move {
                match backend.action_access(&action, &meta).await? {
                    BackendVerdict::Approved => Ok(ChannelAccess::Granted),
                    BackendVerdict::Forbidden => Ok(ChannelAccess::Denied),
                    BackendVerdict::UnknownChannel | BackendVerdict::UnknownAction => {
                        Ok(ChannelAccess::WrongChannel)
                    }
                }
            })
        });
        let load_backend = backend;
        let callbacks =
            ChannelCallbacks::with_access(access).with_load(move |_ctx, _action, meta| {
                let backend = load_backend.clone();
                async move {
                    backend.wait_processed(&meta.id).await?;
                    Ok(Vec::new())
                }
            });
        core.channels.set_other(callbacks);
    }
}

async fn accept_connection(
    core: Arc<ServerCore>,
    socket: tokio::net::TcpStream,
    addr: SocketAddr,
    tls: Option<tokio_rustls::TlsAcceptor>,
) -> Result<()> {
    let options = crate::peer::WirePeerOptions {
        timeout: core.timeout,
        ping: core.ping,
    };
    let channels = match tls {
        Some(acceptor) => {
            let stream = acceptor.accept(socket).await?;
            let (reader, writer) = tokio::io::split(stream);
            crate::peer::spawn_wire_peer(reader, writer, options)
        }
        None => {
            let (reader, writer) = socket.into_split();
            crate::peer::spawn_wire_peer(reader, writer, options)
        }
    };
    ServerClient::spawn(core, channels, addr);
    Ok(())
}
