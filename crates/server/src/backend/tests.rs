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

use mockito::Server;
use serde_json::json;

use shared::log;

async fn setup(body: &str) -> (mockito::ServerGuard, HttpBackend) {
    log::setup_logging("debug", log::LogType::Test);

    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;
    let backend = HttpBackend::new(&(server.url() + "/"), "secret");
    (server, backend)
}

#[tokio::test]
async fn test_auth_authenticated() {
    let (_server, backend) = setup(r#"[["authenticated"]]"#).await;
    assert!(
        backend
            .authenticate(Some("10"), &json!("token"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_auth_denied() {
    let (_server, backend) = setup(r#"[["denied"]]"#).await;
    assert!(
        !backend
            .authenticate(Some("10"), &json!("bad"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_auth_error_carries_stack() {
    let (_server, backend) = setup(r#"[["error", "Error: boom\n  at auth"]]"#).await;
    let error = backend
        .authenticate(Some("10"), &json!("token"))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("boom"));
}

#[tokio::test]
async fn test_action_approved_then_processed() {
    let (_server, backend) = setup(r#"[["approved"],["processed"]]"#).await;
    let action = shared::action::Action::new("users/rename");
    let meta = shared::action::Meta::with_id("1 10:uuid 0");
    let verdict = backend.action_access(&action, &meta).await.unwrap();
    assert_eq!(verdict, BackendVerdict::Approved);
    backend.wait_processed("1 10:uuid 0").await.unwrap();
}

#[tokio::test]
async fn test_action_approved_then_error() {
    let (_server, backend) = setup(r#"[["approved"],["error", "boom"]]"#).await;
    let action = shared::action::Action::new("users/rename");
    let meta = shared::action::Meta::with_id("1 10:uuid 0");
    backend.action_access(&action, &meta).await.unwrap();
    let error = backend.wait_processed("1 10:uuid 0").await.unwrap_err();
    assert!(error.to_string().contains("boom"));
}

#[tokio::test]
async fn test_action_forbidden_has_no_pending() {
    let (_server, backend) = setup(r#"[["forbidden"]]"#).await;
    let action = shared::action::Action::new("users/rename");
    let meta = shared::action::Meta::with_id("1 10:uuid 0");
    let verdict = backend.action_access(&action, &meta).await.unwrap();
    assert_eq!(verdict, BackendVerdict::Forbidden);
    assert!(backend.wait_processed("1 10:uuid 0").await.is_err());
}

#[tokio::test]
async fn test_unknown_verdicts() {
    let (_server, backend) = setup(r#"[["unknownAction"]]"#).await;
    let action = shared::action::Action::new("mystery");
    let meta = shared::action::Meta::with_id("1 10:uuid 0");
    assert_eq!(
        backend.action_access(&action, &meta).await.unwrap(),
        BackendVerdict::UnknownAction
    );

    let (_server, backend) = setup(r#"[["unknownChannel"]]"#).await;
    let action = shared::action::Action::subscribe("secret/1");
    assert_eq!(
        backend.action_access(&action, &meta).await.unwrap(),
        BackendVerdict::UnknownChannel
    );
}

#[tokio::test]
async fn test_non_2xx_fails_call() {
    log::setup_logging("debug", log::LogType::Test);

    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(500)
        .create_async()
        .await;
    let backend = HttpBackend::new(&(server.url() + "/"), "secret");
    assert!(backend.authenticate(Some("10"), &json!("t")).await.is_err());
}

#[tokio::test]
async fn test_malformed_body_rejects() {
    let (_server, backend) = setup(r#"{"not": "an array"}"#).await;
    let error = backend
        .authenticate(Some("10"), &json!("t"))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("Backend wrong answer"));
}
