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
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use shared::errors::ProtocolErrorKind;
use shared::log;
use shared::protocol::{Frame, PeerChannels, PeerEvent, peer_pair};
use shared::system::trigger::Trigger;

use crate::consts::CHANNEL_SIZE;

#[derive(Debug, Clone, Copy)]
pub struct WirePeerOptions {
    /// Close the connection after this much inbound silence.
    pub timeout: Duration,
    /// Outbound ping cadence keeping idle connections alive.
    pub ping: Duration,
}

/// Turns a byte stream into a sync peer: newline-delimited JSON frames in,
/// [`PeerEvent`]s out. One task per direction, joined by a stop trigger,
/// so a dead socket tears both down.
pub fn spawn_wire_peer<R, W>(reader: R, writer: W, options: WirePeerOptions) -> PeerChannels
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (channels, wire) = peer_pair(CHANNEL_SIZE);
    let stop = Trigger::new();
    // Pong replies bypass the server client
    let (reply_tx, reply_rx) = flume::bounded::<Frame>(4);

    tokio::spawn({
        let stop = stop.clone();
        let events = wire.events;
        async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                tokio::select! {
                    _ = stop.wait_async() => {
                        break;
                    }
                    line = tokio::time::timeout(options.timeout, lines.next_line()) => {
                        match line {
                            Err(_) => {
                                let _ = events
                                    .send_async(PeerEvent::Error {
                                        kind: ProtocolErrorKind::Timeout,
                                        message: format!(
                                            "no frames for {} ms",
                                            options.timeout.as_millis()
                                        ),
                                    })
                                    .await;
                                break;
                            }
                            Ok(Ok(Some(line))) => {
                                if !handle_line(&line, &events, &reply_tx).await {
                                    break;
                                }
                            }
                            Ok(Ok(None)) | Ok(Err(_)) => {
                                let _ = events.send_async(PeerEvent::Disconnect).await;
                                break;
                            }
                        }
                    }
                }
            }
            stop.trigger();
        }
    });

    tokio::spawn({
        let stop = stop.clone();
        let outbound = wire.outbound;
        let mut writer = writer;
        async move {
            let start = tokio::time::Instant::now() + options.ping;
            let mut ping = tokio::time::interval_at(start, options.ping);
            loop {
                tokio::select! {
                    _ = stop.wait_async() => {
                        break;
                    }
                    frame = reply_rx.recv_async() => {
                        let Ok(frame) = frame else { break };
                        if write_frame(&mut writer, &frame).await.is_err() {
                            break;
                        }
                    }
                    frame = outbound.recv_async() => {
                        let Ok(frame) = frame else { break };
                        let bye = matches!(frame, Frame::Bye);
                        if write_frame(&mut writer, &frame).await.is_err() || bye {
                            break;
                        }
                    }
                    _ = ping.tick() => {
                        if write_frame(&mut writer, &Frame::Ping).await.is_err() {
                            break;
                        }
                    }
                }
            }
            stop.trigger();
        }
    });

    channels
}

/// Returns false when the connection must close.
async fn handle_line(
    line: &str,
    events: &flume::Sender<PeerEvent>,
    replies: &flume::Sender<Frame>,
) -> bool {
    match Frame::from_slice(line.as_bytes()) {
        Ok(Frame::Connect {
            node_id,
            subprotocol,
            credentials,
            headers,
        }) => events
            .send_async(PeerEvent::Connect {
                node_id,
                subprotocol,
                credentials,
                headers,
            })
            .await
            .is_ok(),
        Ok(Frame::Sync { action, meta }) => events
            .send_async(PeerEvent::Action { action, meta })
            .await
            .is_ok(),
        Ok(Frame::Ping) => replies.send_async(Frame::Pong).await.is_ok(),
        Ok(Frame::Pong) => true,
        Ok(Frame::Bye) => {
            let _ = events.send_async(PeerEvent::Disconnect).await;
            false
        }
        Ok(Frame::Error { kind, message }) => {
            let _ = events.send_async(PeerEvent::Error { kind, message }).await;
            false
        }
        Ok(Frame::Connected { .. }) | Ok(Frame::Debug { .. }) => {
            // Server-to-client frames have no business arriving here
            let _ = events
                .send_async(PeerEvent::Error {
                    kind: ProtocolErrorKind::UnknownMessage,
                    message: "unexpected frame direction".to_string(),
                })
                .await;
            false
        }
        Err(error) => {
            log::debug!("Dropping malformed frame: {}", error);
            let _ = events
                .send_async(PeerEvent::Error {
                    kind: ProtocolErrorKind::WrongFormat,
                    message: error.to_string(),
                })
                .await;
            false
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(&frame.to_value())?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests;
