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
use std::net::IpAddr;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use crate::consts::{AUTH_ATTEMPTS_LIMIT, AUTH_ATTEMPT_DECAY_MS};

/// Failed-auth counter per source IP. A failure counts against the IP for
/// three seconds; three live failures block further attempts.
pub struct AuthGuard {
    attempts: RwLock<HashMap<IpAddr, Vec<Instant>>>,
    decay: Duration,
}

impl AuthGuard {
    pub fn new() -> Self {
        AuthGuard {
            attempts: RwLock::new(HashMap::new()),
            decay: Duration::from_millis(AUTH_ATTEMPT_DECAY_MS),
        }
    }

    pub fn register_failure(&self, ip: IpAddr) {
        let mut attempts = self.attempts.write().unwrap();
        let now = Instant::now();
        let entry = attempts.entry(ip).or_default();
        entry.retain(|failed_at| now.duration_since(*failed_at) < self.decay);
        entry.push(now);
    }

    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        {
            let attempts = self.attempts.read().unwrap();
            let Some(entry) = attempts.get(&ip) else {
                return false;
            };
            let live = entry
                .iter()
                .filter(|failed_at| now.duration_since(**failed_at) < self.decay)
                .count();
            if live > 0 {
                return live >= AUTH_ATTEMPTS_LIMIT;
            }
        }
        // All entries decayed, drop the key
        self.attempts.write().unwrap().remove(&ip);
        false
    }
}

impl Default for AuthGuard {
    fn default() -> Self {
        AuthGuard::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_after_three_failures() {
        let guard = AuthGuard::new();
        assert!(!guard.is_blocked(ip(1)));
        guard.register_failure(ip(1));
        guard.register_failure(ip(1));
        assert!(!guard.is_blocked(ip(1)));
        guard.register_failure(ip(1));
        assert!(guard.is_blocked(ip(1)));
        // Other sources are unaffected
        assert!(!guard.is_blocked(ip(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_decay() {
        let guard = AuthGuard::new();
        for _ in 0..3 {
            guard.register_failure(ip(1));
        }
        assert!(guard.is_blocked(ip(1)));
        tokio::time::advance(Duration::from_millis(AUTH_ATTEMPT_DECAY_MS + 100)).await;
        assert!(!guard.is_blocked(ip(1)));
        // And the counter starts fresh afterwards
        guard.register_failure(ip(1));
        assert!(!guard.is_blocked(ip(1)));
    }
}
