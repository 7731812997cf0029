use std::time::Duration;

use crate::verifier::Status;

/// Expiry and sizing for [`VerificationCache`](super::VerificationCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Lifetime of conclusive outcomes (`Valid`, `MailboxNotFound`, `InvalidSyntax`).
    pub ttl: Duration,
    /// Lifetime of probe failures (`NoMailExchange`, `SmtpError`, `UnknownCode`).
    /// Never longer than `ttl`.
    pub error_ttl: Duration,
    /// Maximum number of entries kept before eviction kicks in.
    pub capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            error_ttl: Duration::from_secs(5 * 60),
            capacity: 100_000,
        }
    }
}

impl CacheOptions {
    pub fn ttl_for(&self, status: &Status) -> Duration {
        if status.is_conclusive() {
            self.ttl
        } else {
            self.error_ttl.min(self.ttl)
        }
    }
}
