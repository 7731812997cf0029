use std::time::Duration;

use crate::cache::CacheOptions;
use crate::mx::DEFAULT_DNS_TIMEOUT;
use crate::smtp::ProbeOptions;

/// Production wiring for [`Verifier::from_system_conf`](super::Verifier::from_system_conf).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierOptions {
    /// Bound for the single MX query made per verification.
    pub dns_timeout: Duration,
    pub probe: ProbeOptions,
    pub cache: CacheOptions,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            dns_timeout: DEFAULT_DNS_TIMEOUT,
            probe: ProbeOptions::default(),
            cache: CacheOptions::default(),
        }
    }
}
