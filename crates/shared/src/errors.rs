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
use std::{fmt, net::SocketAddr};

/// Wire-level violation kinds a sync peer can raise or receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    WrongFormat,
    WrongSubprotocol,
    WrongCredentials,
    Timeout,
    Bruteforce,
    UnknownMessage,
}

impl ProtocolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolErrorKind::WrongFormat => "wrong-format",
            ProtocolErrorKind::WrongSubprotocol => "wrong-subprotocol",
            ProtocolErrorKind::WrongCredentials => "wrong-credentials",
            ProtocolErrorKind::Timeout => "timeout",
            ProtocolErrorKind::Bruteforce => "bruteforce",
            ProtocolErrorKind::UnknownMessage => "unknown-message",
        }
    }

    pub fn from_str(kind: &str) -> Option<Self> {
        match kind {
            "wrong-format" => Some(ProtocolErrorKind::WrongFormat),
            "wrong-subprotocol" => Some(ProtocolErrorKind::WrongSubprotocol),
            "wrong-credentials" => Some(ProtocolErrorKind::WrongCredentials),
            "timeout" => Some(ProtocolErrorKind::Timeout),
            "bruteforce" => Some(ProtocolErrorKind::Bruteforce),
            "unknown-message" => Some(ProtocolErrorKind::UnknownMessage),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol error annotated with the peer it came from.
#[derive(Debug)]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub src_ip: Option<SocketAddr>,
    pub message: String,
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    pub fn new(kind: ProtocolErrorKind, src_ip: Option<SocketAddr>, message: &str) -> Self {
        ProtocolError {
            kind,
            src_ip,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {:?}", self.kind, self.message, self.src_ip)
    }
}
