//! Same-host access check for operator-only endpoints

use std::net::IpAddr;
use tracing::debug;

/// Loopback address accepted as "local"
pub const LOOPBACK: &str = "127.0.0.1";

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
}

/// Classifies request origins as local or remote.
///
/// Pure address equality: nothing else is authenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGuard;

impl AccessGuard {
    /// True iff `source` is textually the loopback address
    pub fn is_local_origin(&self, source: &str) -> bool {
        source == LOOPBACK
    }

    pub fn check(&self, peer: IpAddr) -> Access {
        let source = peer.to_string();
        if self.is_local_origin(&source) {
            Access::Granted
        } else {
            debug!(peer = %source, "access_denied");
            Access::Denied
        }
    }
}
