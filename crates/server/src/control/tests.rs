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

use serde_json::json;

use shared::action::ActionStatus;

use crate::server::Server;
use crate::testing::{Events, test_options, wait_for_log_len};
use crate::types::TypeHandler;

async fn control_server(configure: impl FnOnce(&mut crate::server::ServerOptions)) -> (Server, String) {
    shared::log::setup_logging("debug", shared::log::LogType::Test);
    let mut options = test_options();
    options.control_secret = Some("secret".to_string());
    options.control_port = 0; // ephemeral, tests run in parallel
    configure(&mut options);
    let server = Server::new(options).unwrap();
    let addr = server.serve_control().await.unwrap();
    (server, format!("http://{}", addr))
}

#[tokio::test]
async fn test_status_needs_no_auth() {
    let (_server, url) = control_server(|_| {}).await;
    let response = reqwest::get(format!("{}/status", url)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_backend_action_is_added() {
    let (server, url) = control_server(|_| {}).await;
    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({
            "version": 4,
            "secret": "secret",
            "commands": [["action", {"type": "users/renamed", "userId": "10"}, {"id": "1 10:uuid 0", "time": 1}]]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    wait_for_log_len(&server, 1).await;
    let (action, meta) = server.log().by_id("1 10:uuid 0").await.unwrap();
    assert_eq!(action.kind, "users/renamed");
    // Unknown to this node, so the pipeline must not process it again
    assert_eq!(meta.status, Some(ActionStatus::Processed));
    assert_eq!(meta.custom.get("backend"), Some(&json!("127.0.0.1")));
}

#[tokio::test]
async fn test_known_type_keeps_waiting_status() {
    let (server, url) = control_server(|_| {}).await;
    server.add_type(
        "users/renamed",
        TypeHandler::new(|_, _, _| async { Ok(true) }).with_process(|_, _, _| async { Ok(()) }),
    );
    reqwest::Client::new()
        .post(&url)
        .json(&json!({
            "version": 4,
            "secret": "secret",
            "commands": [["action", {"type": "users/renamed"}, {"id": "1 10:uuid 0", "time": 1}]]
        }))
        .send()
        .await
        .unwrap();

    wait_for_log_len(&server, 2).await; // action + its logux/processed ack
    assert!(server.log().has("1 10:uuid 0").await);
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let (server, url) = control_server(|_| {}).await;
    let mut events = Events::subscribe(&server);
    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({"version": 4, "secret": "nope", "commands": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    assert!(!response.text().await.unwrap().contains("secret"));
    events.wait_for("wrongControlSecret").await;
    assert!(server.log().entries().await.is_empty());
}

#[tokio::test]
async fn test_wrong_source_ip_is_rejected() {
    let (server, url) = control_server(|options| {
        options.control_mask = "10.0.0.0/8".to_string();
    })
    .await;
    let mut events = Events::subscribe(&server);
    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({"version": 4, "secret": "secret", "commands": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    events.wait_for("wrongControlIp").await;
}

#[tokio::test]
async fn test_malformed_command_is_bad_request() {
    let (_server, url) = control_server(|_| {}).await;
    let response = reqwest::Client::new()
        .post(&url)
        .json(&json!({"version": 4, "secret": "secret", "commands": [["action"]]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
