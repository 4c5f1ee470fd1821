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
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio::signal;

use shared::log::{error, info};

pub mod backend;
pub mod bruteforce;
pub mod channels;
pub mod client;
pub mod config;
pub mod consts;
pub mod context;
pub mod control;
pub mod errors;
pub mod events;
pub mod log;
pub mod peer;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod store;
#[cfg(test)]
pub mod testing;
pub mod types;

use std::sync::Arc;

// Catch SIGTERM and SIGINT to perform a graceful shutdown
#[tokio::main(flavor = "multi_thread")]
async fn main() {
    shared::log::setup_logging(consts::DEFAULT_LOG_LEVEL, shared::log::LogType::Server);

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| consts::CONFIGFILE_PATH.to_string());
    let options = match config::load(&config_path) {
        Ok(options) => options,
        Err(error) => {
            error!("{}", error);
            std::process::exit(1);
        }
    };

    if options.backend.is_none() {
        // Standalone mode has nowhere to send credentials; business logic
        // embeds the server as a library and sets its own auth callback
        error!("LOGUX_WRONG_OPTIONS backend option is required to run the server binary");
        std::process::exit(1);
    }

    let server = match server::Server::new(options) {
        Ok(server) => Arc::new(server),
        Err(error) => {
            error!("{}", error);
            std::process::exit(1);
        }
    };

    // Spawn the signal handler
    {
        let server = server.clone();
        tokio::spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let mut terminate =
                unix_signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

            #[cfg(unix)]
            tokio::select! {
                _ = ctrl_c => {
                    info!("Received Ctrl-C, shutting down");
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
            }
            #[cfg(not(unix))]
            {
                ctrl_c.await.expect("Failed to listen for Ctrl-C");
                info!("Received Ctrl-C, shutting down");
            }
            server.destroy().await;
        });
    }

    if let Err(error) = server.listen().await {
        error!("{}", error);
        server.destroy().await;
        std::process::exit(1);
    }
}
