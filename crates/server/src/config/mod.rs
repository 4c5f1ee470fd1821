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
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{FatalError, FatalKind};
use crate::server::{Env, ServerOptions};

/// On-disk configuration. Unknown keys are a fatal startup error so a
/// typo cannot silently disable an option.
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub subprotocol: Option<String>, // SemVer of the application protocol
    pub supports: Option<String>,    // SemVer range of accepted client subprotocols
    pub host: Option<String>,        // Sync listener address, default: 127.0.0.1
    pub port: Option<u16>,           // Sync listener port, default: 31337
    pub timeout: Option<u64>,        // Inbound silence limit in ms, default: 20000
    pub ping: Option<u64>,           // Ping interval in ms, default: 10000
    pub backend: Option<String>,     // URL of the backend receiving auth/actions
    pub control_secret: Option<String>, // Shared secret for control commands
    pub control_mask: Option<String>, // CIDR allowed to call control, default: 127.0.0.1/8
    pub control_host: Option<String>, // Control listener address, default: 127.0.0.1
    pub control_port: Option<u16>,   // Control listener port, default: 31338
    pub env: Option<String>,         // production | development
    pub root: Option<String>,        // Base path for certificate files
    pub key: Option<String>,         // TLS key, PEM literal or path
    pub cert: Option<String>,        // TLS certificate, PEM literal or path
}

impl ServerConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, FatalError> {
        toml::from_str(toml_str).map_err(|error| {
            FatalError::new(FatalKind::UnknownOption, &error.to_string())
        })
    }

    pub fn into_options(self) -> Result<ServerOptions, FatalError> {
        let defaults = ServerOptions::default();
        let env = match self.env.as_deref() {
            None => None,
            Some("production") => Some(Env::Production),
            Some("development") => Some(Env::Development),
            Some(other) => {
                return Err(FatalError::option(&format!("unknown env {}", other)));
            }
        };
        Ok(ServerOptions {
            subprotocol: self.subprotocol,
            supports: self.supports,
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            timeout: self.timeout.map(Duration::from_millis).unwrap_or(defaults.timeout),
            ping: self.ping.map(Duration::from_millis).unwrap_or(defaults.ping),
            backend: self.backend,
            control_secret: self.control_secret,
            control_mask: self.control_mask.unwrap_or(defaults.control_mask),
            control_host: self.control_host.unwrap_or(defaults.control_host),
            control_port: self.control_port.unwrap_or(defaults.control_port),
            env,
            time: None,
            id: None,
            root: self.root.map(PathBuf::from).unwrap_or(defaults.root),
            key: self.key,
            cert: self.cert,
            store: None,
        })
    }
}

/// Reads the config file at `path` into ready-to-use options.
pub fn load(path: &str) -> Result<ServerOptions, FatalError> {
    let raw = std::fs::read_to_string(path).map_err(|error| {
        FatalError::option(&format!("cannot read config file {}: {}", path, error))
    })?;
    ServerConfig::from_toml_str(&raw)?.into_options()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            subprotocol = "1.0.0"
            supports = "^1.0.0"
            host = "0.0.0.0"
            port = 31337
            timeout = 15000
            backend = "https://backend.example.com/logux"
            control_secret = "secret"
            control_mask = "10.0.0.0/8"
            env = "production"
        "#;
        let config = ServerConfig::from_toml_str(toml_str).unwrap();
        let options = config.into_options().unwrap();
        assert_eq!(options.subprotocol.as_deref(), Some("1.0.0"));
        assert_eq!(options.supports.as_deref(), Some("^1.0.0"));
        assert_eq!(options.host, "0.0.0.0");
        assert_eq!(options.timeout, Duration::from_millis(15000));
        assert_eq!(options.ping, Duration::from_millis(10000));
        assert_eq!(
            options.backend.as_deref(),
            Some("https://backend.example.com/logux")
        );
        assert_eq!(options.control_mask, "10.0.0.0/8");
        assert_eq!(options.env, Some(Env::Production));
    }

    #[test]
    fn test_unknown_option_is_fatal() {
        let error = ServerConfig::from_toml_str("subprotocl = \"1.0.0\"").unwrap_err();
        assert_eq!(error.kind, FatalKind::UnknownOption);
    }

    #[test]
    fn test_unknown_env_rejected() {
        let config = ServerConfig::from_toml_str("env = \"staging\"").unwrap();
        assert!(config.into_options().is_err());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let options = ServerConfig::from_toml_str("")
            .unwrap()
            .into_options()
            .unwrap();
        assert_eq!(options.port, 31337);
        assert_eq!(options.control_port, 31338);
        assert_eq!(options.control_mask, "127.0.0.1/8");
        assert_eq!(options.host, "127.0.0.1");
    }
}
