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

use tokio::io::AsyncReadExt;

use shared::log;

fn options() -> WirePeerOptions {
    WirePeerOptions {
        timeout: Duration::from_secs(5),
        ping: Duration::from_secs(60),
    }
}

#[tokio::test]
async fn test_connect_line_becomes_event() {
    log::setup_logging("debug", log::LogType::Test);

    let (client, server) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server);
    let channels = spawn_wire_peer(server_read, server_write, options());

    let (mut client_read, mut client_write) = tokio::io::split(client);
    client_write
        .write_all(
            b"[\"connect\", {\"nodeId\": \"10:uuid\", \"subprotocol\": \"1.0.0\", \"credentials\": \"token\"}]\n",
        )
        .await
        .unwrap();

    match channels.events.recv_async().await.unwrap() {
        PeerEvent::Connect {
            node_id,
            subprotocol,
            credentials,
            ..
        } => {
            assert_eq!(node_id, "10:uuid");
            assert_eq!(subprotocol, "1.0.0");
            assert_eq!(credentials, serde_json::json!("token"));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // Outbound frames are written as JSON lines
    channels
        .sender
        .send_connected("server:x", "1.0.0")
        .await
        .unwrap();
    let mut buffer = vec![0u8; 256];
    let read = client_read.read(&mut buffer).await.unwrap();
    let line = String::from_utf8_lossy(&buffer[..read]);
    assert!(line.starts_with("[\"connected\""));
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    log::setup_logging("debug", log::LogType::Test);

    let (client, server) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server);
    let _channels = spawn_wire_peer(server_read, server_write, options());

    let (mut client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(b"[\"ping\"]\n").await.unwrap();
    let mut buffer = vec![0u8; 64];
    let read = client_read.read(&mut buffer).await.unwrap();
    assert_eq!(&buffer[..read], b"[\"pong\"]\n");
}

#[tokio::test]
async fn test_malformed_frame_reports_wrong_format() {
    log::setup_logging("debug", log::LogType::Test);

    let (client, server) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server);
    let channels = spawn_wire_peer(server_read, server_write, options());

    let (_client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(b"not json at all\n").await.unwrap();

    match channels.events.recv_async().await.unwrap() {
        PeerEvent::Error { kind, .. } => assert_eq!(kind, ProtocolErrorKind::WrongFormat),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_silence_times_out() {
    log::setup_logging("debug", log::LogType::Test);

    let (client, server) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server);
    let channels = spawn_wire_peer(
        server_read,
        server_write,
        WirePeerOptions {
            timeout: Duration::from_millis(50),
            ping: Duration::from_secs(60),
        },
    );
    // Keep the client half open but silent
    let (_client_read, _client_write) = tokio::io::split(client);

    match channels.events.recv_async().await.unwrap() {
        PeerEvent::Error { kind, .. } => assert_eq!(kind, ProtocolErrorKind::Timeout),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_eof_reports_disconnect() {
    log::setup_logging("debug", log::LogType::Test);

    let (client, server) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server);
    let channels = spawn_wire_peer(server_read, server_write, options());
    drop(client);

    match channels.events.recv_async().await.unwrap() {
        PeerEvent::Disconnect => {}
        other => panic!("unexpected event: {:?}", other),
    }
}
