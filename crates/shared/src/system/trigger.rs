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

use tokio::sync::watch;

/// One-shot stop signal shared between tasks. Cloning is cheap, any clone
/// can fire the trigger and every clone observes it.
#[derive(Debug, Clone)]
pub struct Trigger {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Trigger {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Trigger { tx, rx }
    }

    pub fn trigger(&self) {
        // Send only fails if all receivers are gone, nothing to notify then
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn wait_async(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Waits up to `timeout` for the trigger. Returns true if it fired.
    pub async fn wait_timeout_async(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_async()).await.is_ok()
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Trigger::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_fires_once() {
        let trigger = Trigger::new();
        assert!(!trigger.is_triggered());
        trigger.trigger();
        assert!(trigger.is_triggered());
        // Already triggered, wait returns immediately
        trigger.wait_async().await;
    }

    #[tokio::test]
    async fn test_trigger_clone_observes() {
        let trigger = Trigger::new();
        let clone = trigger.clone();
        let waiter = tokio::spawn(async move { clone.wait_async().await });
        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_wait_timeout() {
        let trigger = Trigger::new();
        assert!(!trigger.wait_timeout_async(Duration::from_millis(50)).await);
        trigger.trigger();
        assert!(trigger.wait_timeout_async(Duration::from_millis(50)).await);
    }
}
