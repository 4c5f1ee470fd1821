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
/// Identity parts derived from a node id.
///
/// Node ids look like `[user:]clientRand[:nodeRand]`. With two or more
/// colon-separated segments the first one is the user id and the client id
/// joins the first two segments. A bare single segment has no user id and
/// is its own client id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_id: String,
    pub client_id: String,
    pub user_id: Option<String>,
}

pub fn parse_node_id(node_id: &str) -> NodeInfo {
    let mut segments = node_id.splitn(3, ':');
    let first = segments.next().unwrap_or_default();
    match segments.next() {
        Some(second) => NodeInfo {
            node_id: node_id.to_string(),
            client_id: format!("{}:{}", first, second),
            user_id: Some(first.to_string()),
        },
        None => NodeInfo {
            node_id: node_id.to_string(),
            client_id: node_id.to_string(),
            user_id: None,
        },
    }
}

/// A parsed action id `"<counter> <nodeId> <seq>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionId {
    pub counter: i64,
    pub seq: i64,
    pub node: NodeInfo,
}

pub fn parse_action_id(id: &str) -> Option<ActionId> {
    let mut parts = id.split(' ');
    let counter = parts.next()?.parse::<i64>().ok()?;
    let node_id = parts.next()?;
    let seq = parts.next()?.parse::<i64>().ok()?;
    if node_id.is_empty() || parts.next().is_some() {
        return None;
    }
    Some(ActionId {
        counter,
        seq,
        node: parse_node_id(node_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_node_id() {
        let info = parse_node_id("10:client:node");
        assert_eq!(info.user_id.as_deref(), Some("10"));
        assert_eq!(info.client_id, "10:client");
        assert_eq!(info.node_id, "10:client:node");
    }

    #[test]
    fn test_parse_two_segment_node_id() {
        let info = parse_node_id("10:client");
        assert_eq!(info.user_id.as_deref(), Some("10"));
        assert_eq!(info.client_id, "10:client");
    }

    #[test]
    fn test_parse_bare_node_id() {
        let info = parse_node_id("random");
        assert_eq!(info.user_id, None);
        assert_eq!(info.client_id, "random");
        assert_eq!(info.node_id, "random");
    }

    #[test]
    fn test_parse_server_node_id() {
        let info = parse_node_id("server:rand");
        assert_eq!(info.user_id.as_deref(), Some("server"));
        assert_eq!(info.client_id, "server:rand");
    }

    #[test]
    fn test_parse_action_id() {
        let id = parse_action_id("1 10:client:node 0").unwrap();
        assert_eq!(id.counter, 1);
        assert_eq!(id.seq, 0);
        assert_eq!(id.node.client_id, "10:client");
        assert_eq!(id.node.user_id.as_deref(), Some("10"));
    }

    #[test]
    fn test_parse_action_id_rejects_garbage() {
        assert!(parse_action_id("").is_none());
        assert!(parse_action_id("1").is_none());
        assert!(parse_action_id("1 10:a").is_none());
        assert!(parse_action_id("x 10:a 0").is_none());
        assert!(parse_action_id("1 10:a 0 tail").is_none());
    }
}
