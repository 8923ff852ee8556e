//! Strict loopback validation for wallet-control endpoints
//!
//! The coordinator only ever talks to wallet endpoints the parties run on
//! their own machines. Accepting anything but a loopback literal would let
//! a tampered registration point the engine at an attacker-controlled or
//! public wallet, so the check parses the real host instead of substring
//! matching, and never resolves names.
//!
//! Accepts only:
//! - `http://127.0.0.1:PORT`
//! - `http://localhost:PORT`
//! - `http://[::1]:PORT`
//! (and their `https` variants)

use monero_escrow_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::Url;

/// A wallet-control endpoint that has passed the loopback-only check.
///
/// The only way to obtain one is [`validate_endpoint`]; holding a value is
/// proof the URL parsed and its host was a loopback literal at validation
/// time. Dispatch sites re-run the check anyway (defense in depth against
/// a tampered persisted record).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatedEndpoint(String);

impl ValidatedEndpoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full URL of the JSON-RPC entry point for this endpoint.
    pub fn json_rpc_url(&self) -> String {
        let base = self.0.trim_end_matches('/');
        if base.ends_with("/json_rpc") {
            base.to_string()
        } else {
            format!("{}/json_rpc", base)
        }
    }
}

impl fmt::Display for ValidatedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate that a claimed wallet-control endpoint is loopback-only and
/// well-formed.
///
/// Pure and synchronous: no I/O, and symbolic hostnames other than the
/// literal `localhost` are rejected outright rather than resolved, so no
/// DNS query can ever leak the endpoint.
pub fn validate_endpoint(raw: &str) -> Result<ValidatedEndpoint> {
    let url =
        Url::parse(raw).map_err(|e| Error::InvalidRpcUrl(format!("malformed URL: {}", e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidRpcUrl(format!(
                "scheme '{}' not allowed, use http or https",
                other
            )))
        }
    }

    match url.host() {
        Some(url::Host::Domain(domain)) => {
            // No DNS lookup: only the literal name is acceptable. This also
            // kills `localhost.attacker.com` / `evil-127.0.0.1.com` bypasses
            // since the parsed host is compared whole.
            if !domain.eq_ignore_ascii_case("localhost") {
                return Err(Error::InvalidRpcUrl(format!(
                    "host '{}' is not a loopback literal (use localhost or 127.0.0.1)",
                    domain
                )));
            }
        }
        Some(url::Host::Ipv4(ipv4)) => {
            if ipv4 != Ipv4Addr::LOCALHOST {
                return Err(Error::InvalidRpcUrl(format!(
                    "IPv4 host {} is not 127.0.0.1",
                    ipv4
                )));
            }
        }
        Some(url::Host::Ipv6(ipv6)) => {
            if ipv6 != Ipv6Addr::LOCALHOST {
                return Err(Error::InvalidRpcUrl(format!(
                    "IPv6 host {} is not ::1",
                    ipv6
                )));
            }
        }
        None => return Err(Error::InvalidRpcUrl("URL has no host".to_string())),
    }

    Ok(ValidatedEndpoint(url.to_string()))
}

/// Re-run the loopback check on an already validated endpoint.
///
/// Called immediately before every outbound dispatch, independent of the
/// validation performed at registration time.
pub fn ensure_loopback(endpoint: &ValidatedEndpoint) -> Result<()> {
    validate_endpoint(endpoint.as_str()).map(|_| ())
}
