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
use std::fmt;

/// Startup failures that must abort the process with exit code 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// Listener port already taken.
    AddrInUse,
    /// Listener port requires privileges we do not have.
    AccessDenied,
    /// A backend URL was configured without a control secret.
    NoControlSecret,
    /// Configuration carries an option the server does not know.
    UnknownOption,
    /// Configuration is structurally valid but unusable.
    Option,
}

impl FatalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatalKind::AddrInUse => "EADDRINUSE",
            FatalKind::AccessDenied => "EACCES",
            FatalKind::NoControlSecret => "LOGUX_NO_CONTROL_SECRET",
            FatalKind::UnknownOption => "LOGUX_UNKNOWN_OPTION",
            FatalKind::Option => "LOGUX_WRONG_OPTIONS",
        }
    }
}

#[derive(Debug)]
pub struct FatalError {
    pub kind: FatalKind,
    pub message: String,
}

impl FatalError {
    pub fn new(kind: FatalKind, message: &str) -> Self {
        FatalError {
            kind,
            message: message.to_string(),
        }
    }

    pub fn option(message: &str) -> Self {
        FatalError::new(FatalKind::Option, message)
    }

    pub fn from_io(err: &std::io::Error, what: &str) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::AddrInUse => FatalKind::AddrInUse,
            std::io::ErrorKind::PermissionDenied => FatalKind::AccessDenied,
            _ => FatalKind::Option,
        };
        FatalError::new(kind, &format!("{}: {}", what, err))
    }
}

impl std::error::Error for FatalError {}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kind_strings() {
        assert_eq!(FatalKind::AddrInUse.as_str(), "EADDRINUSE");
        assert_eq!(FatalKind::AccessDenied.as_str(), "EACCES");
        assert_eq!(FatalKind::NoControlSecret.as_str(), "LOGUX_NO_CONTROL_SECRET");
        assert_eq!(FatalKind::UnknownOption.as_str(), "LOGUX_UNKNOWN_OPTION");
    }

    #[test]
    fn test_from_io_maps_bind_errors() {
        let err = std::io::Error::from(std::io::ErrorKind::AddrInUse);
        assert_eq!(FatalError::from_io(&err, "port 31337").kind, FatalKind::AddrInUse);
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(FatalError::from_io(&err, "port 443").kind, FatalKind::AccessDenied);
    }
}
