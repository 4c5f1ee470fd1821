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

use shared::protocol::peer_pair;

use crate::channels::ChannelFilter;
use crate::testing::test_server;

fn stub_client(server: &crate::server::Server) -> Arc<ServerClient> {
    let (channels, _wire) = peer_pair(8);
    Arc::new(ServerClient::new(
        server.core().clone(),
        channels.sender,
        "127.0.0.1:2000".parse().unwrap(),
    ))
}

#[tokio::test]
async fn test_identity_indexes() {
    let server = test_server();
    let registry = &server.core().registry;
    let client = stub_client(&server);

    assert!(
        registry
            .register_identity("10:a:1", "10:a", "10", client.clone())
            .is_none()
    );
    assert!(registry.client_by_node("10:a:1").is_some());
    assert!(registry.client_by_client_id("10:a").is_some());
    assert_eq!(registry.clients_by_user("10").len(), 1);

    registry.unregister_identity("10:a:1", "10:a", "10", &client.key);
    assert!(registry.client_by_node("10:a:1").is_none());
    assert!(registry.client_by_client_id("10:a").is_none());
    assert!(registry.clients_by_user("10").is_empty());
}

#[tokio::test]
async fn test_register_returns_prior_holder() {
    let server = test_server();
    let registry = &server.core().registry;
    let first = stub_client(&server);
    let second = stub_client(&server);

    registry.register_identity("10:a:1", "10:a", "10", first.clone());
    let prior = registry
        .register_identity("10:a:1", "10:a", "10", second.clone())
        .unwrap();
    assert_eq!(prior.key, first.key);

    // The evicted client's cleanup must not drop the new holder
    registry.unregister_identity("10:a:1", "10:a", "10", &first.key);
    assert_eq!(
        registry.client_by_node("10:a:1").unwrap().key,
        second.key
    );
    assert_eq!(registry.clients_by_user("10").len(), 1);
}

#[tokio::test]
async fn test_one_user_many_clients() {
    let server = test_server();
    let registry = &server.core().registry;
    let laptop = stub_client(&server);
    let phone = stub_client(&server);

    registry.register_identity("10:a:1", "10:a", "10", laptop);
    registry.register_identity("10:b:1", "10:b", "10", phone);
    assert_eq!(registry.clients_by_user("10").len(), 2);
}

#[tokio::test]
async fn test_subscribers_lifecycle() {
    let server = test_server();
    let registry = &server.core().registry;

    assert!(registry.subscribe("user/10", "10:a:1", ChannelFilter::All));
    assert!(!registry.subscribe("user/10", "10:b:1", ChannelFilter::All));
    assert_eq!(registry.channel_subscribers("user/10").len(), 2);

    assert!(registry.unsubscribe("user/10", "10:a:1"));
    assert!(registry.has_subscribers("user/10"));
    assert!(registry.unsubscribe("user/10", "10:b:1"));
    // Last subscriber removed the channel key
    assert!(!registry.has_subscribers("user/10"));
    assert!(!registry.unsubscribe("user/10", "10:b:1"));
}

#[tokio::test]
async fn test_prune_subscriber_drops_node_everywhere() {
    let server = test_server();
    let registry = &server.core().registry;

    registry.subscribe("user/10", "10:a:1", ChannelFilter::All);
    registry.subscribe("room/1", "10:a:1", ChannelFilter::All);
    registry.subscribe("room/1", "10:b:1", ChannelFilter::All);

    registry.prune_subscriber("10:a:1");
    assert!(!registry.has_subscribers("user/10"));
    assert_eq!(registry.channel_subscribers("room/1").len(), 1);
}
