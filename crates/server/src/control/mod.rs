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
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use http::StatusCode;
use serde_json::{Value, json};

use shared::action::{Action, ActionStatus, Meta};
use shared::log;

use crate::events::ServerEvent;
use crate::server::ServerCore;

mod cidr;

pub use cidr::CidrMask;

/// Bounded HTTP surface: an always-open health route plus secret- and
/// mask-gated command routes used by the backend.
pub fn router(core: Arc<ServerCore>) -> axum::Router {
    axum::Router::new()
        .route("/status", get(status))
        .route("/", post(command))
        .with_state(core)
}

async fn status() -> &'static str {
    "OK"
}

async fn command(
    State(core): State<Arc<ServerCore>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Json<Value>,
) -> impl IntoResponse {
    // Gate before touching the body; failures leak nothing
    if !core.control_mask.contains(addr.ip()) {
        core.bus.emit(ServerEvent::WrongControlIp { ip: addr });
        return (StatusCode::FORBIDDEN, "Forbidden");
    }
    let secret = body.get("secret").and_then(Value::as_str);
    if core.control_secret.is_none() || secret != core.control_secret.as_deref() {
        core.bus.emit(ServerEvent::WrongControlSecret { ip: addr });
        return (StatusCode::FORBIDDEN, "Forbidden");
    }

    let Some(commands) = body.get("commands").and_then(Value::as_array) else {
        return (StatusCode::BAD_REQUEST, "Wrong body");
    };
    for entry in commands {
        if let Err(error) = apply_command(&core, entry, addr.ip()).await {
            log::warn!("Bad control command from {}: {}", addr, error);
            return (StatusCode::BAD_REQUEST, "Wrong body");
        }
    }
    (StatusCode::OK, "OK")
}

/// `["action", action, meta]`: shape-checked, stamped with the sender's
/// address, and appended to the log.
async fn apply_command(core: &Arc<ServerCore>, entry: &Value, from: IpAddr) -> Result<()> {
    let Some(items) = entry.as_array() else {
        anyhow::bail!("command is not an array");
    };
    match items.first().and_then(Value::as_str) {
        Some("action") => {
            let action: Action = serde_json::from_value(
                items
                    .get(1)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("action command has no action"))?,
            )?;
            let mut meta: Meta = match items.get(2) {
                Some(meta) => serde_json::from_value(meta.clone())?,
                None => Meta::default(),
            };
            meta.custom
                .insert("backend".to_string(), json!(from.to_string()));
            // The backend already processed what the server cannot
            if !action.is_control() && !core.types.is_known(&action.kind) {
                meta.status = Some(ActionStatus::Processed);
            }
            core.log.add(action, meta).await?;
            Ok(())
        }
        Some(other) => anyhow::bail!("unknown control command {}", other),
        None => anyhow::bail!("command has no name"),
    }
}

#[cfg(test)]
mod tests;
