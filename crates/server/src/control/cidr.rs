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
use std::net::IpAddr;

use anyhow::Result;

/// CIDR source filter for control requests, e.g. `127.0.0.1/8`.
#[derive(Debug, Clone)]
pub struct CidrMask {
    network: IpAddr,
    prefix: u8,
}

impl CidrMask {
    pub fn parse(mask: &str) -> Result<Self> {
        let (network, prefix) = match mask.split_once('/') {
            Some((network, prefix)) => (
                network.parse::<IpAddr>()?,
                prefix
                    .parse::<u8>()
                    .map_err(|_| anyhow::anyhow!("invalid prefix length in {}", mask))?,
            ),
            None => {
                let addr = mask.parse::<IpAddr>()?;
                let full = if addr.is_ipv4() { 32 } else { 128 };
                (addr, full)
            }
        };
        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            anyhow::bail!("prefix length {} too long for {}", prefix, mask);
        }
        Ok(CidrMask { network, prefix })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(network), IpAddr::V4(ip)) => {
                prefix_matches(&network.octets(), &ip.octets(), self.prefix)
            }
            (IpAddr::V6(network), IpAddr::V6(ip)) => {
                prefix_matches(&network.octets(), &ip.octets(), self.prefix)
            }
            // Loopback over the other family still maps into the mask
            (IpAddr::V4(network), IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(ip) => prefix_matches(&network.octets(), &ip.octets(), self.prefix),
                None => false,
            },
            (IpAddr::V6(_), IpAddr::V4(_)) => false,
        }
    }
}

fn prefix_matches(network: &[u8], ip: &[u8], prefix: u8) -> bool {
    let full_bytes = (prefix / 8) as usize;
    if network[..full_bytes] != ip[..full_bytes] {
        return false;
    }
    let rest = prefix % 8;
    if rest == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - rest);
    (network[full_bytes] & mask) == (ip[full_bytes] & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_mask() {
        let mask = CidrMask::parse("127.0.0.1/8").unwrap();
        assert!(mask.contains("127.0.0.1".parse().unwrap()));
        assert!(mask.contains("127.42.0.7".parse().unwrap()));
        assert!(!mask.contains("128.0.0.1".parse().unwrap()));
        assert!(!mask.contains("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_exact_host() {
        let mask = CidrMask::parse("10.1.2.3").unwrap();
        assert!(mask.contains("10.1.2.3".parse().unwrap()));
        assert!(!mask.contains("10.1.2.4".parse().unwrap()));
    }

    #[test]
    fn test_uneven_prefix() {
        let mask = CidrMask::parse("192.168.0.0/20").unwrap();
        assert!(mask.contains("192.168.15.255".parse().unwrap()));
        assert!(!mask.contains("192.168.16.0".parse().unwrap()));
    }

    #[test]
    fn test_mapped_ipv6_loopback() {
        let mask = CidrMask::parse("127.0.0.1/8").unwrap();
        assert!(mask.contains("::ffff:127.0.0.1".parse().unwrap()));
        assert!(!mask.contains("::1".parse().unwrap()));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(CidrMask::parse("not-an-ip/8").is_err());
        assert!(CidrMask::parse("127.0.0.1/33").is_err());
        assert!(CidrMask::parse("127.0.0.1/x").is_err());
    }
}
