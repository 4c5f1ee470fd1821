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

use regex::Regex;

/// Named-parameter channel pattern, e.g. `user/:id` or `posts/:category/:id`.
///
/// Segments starting with `:` capture the corresponding channel segment
/// under that name; every other segment must match literally.
#[derive(Debug, Clone)]
pub struct ChannelPattern {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param(String),
}

impl ChannelPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|segment| {
                if let Some(name) = segment.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();
        ChannelPattern { segments }
    }

    pub fn matches(&self, channel: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = channel.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

/// A channel matcher: URL-style pattern or regular expression.
#[derive(Debug, Clone)]
pub enum Matcher {
    Pattern(ChannelPattern),
    Regex(Regex),
}

impl Matcher {
    pub fn pattern(pattern: &str) -> Self {
        Matcher::Pattern(ChannelPattern::parse(pattern))
    }

    /// On a regex match, named captures become params; unnamed groups are
    /// exposed under their index.
    pub fn matches(&self, channel: &str) -> Option<HashMap<String, String>> {
        match self {
            Matcher::Pattern(pattern) => pattern.matches(channel),
            Matcher::Regex(regex) => {
                let captures = regex.captures(channel)?;
                let mut params = HashMap::new();
                for (index, name) in regex.capture_names().enumerate() {
                    if index == 0 {
                        continue;
                    }
                    if let Some(capture) = captures.get(index) {
                        let key = name
                            .map(str::to_string)
                            .unwrap_or_else(|| index.to_string());
                        params.insert(key, capture.as_str().to_string());
                    }
                }
                Some(params)
            }
        }
    }
}
