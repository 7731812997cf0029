//! Single-address verification.
//!
//! [`Verifier::verify_one`] runs the whole pipeline for one address:
//! cache → syntax → MX → SMTP `RCPT TO` → classification → cache. Every
//! failure is folded into a [`Status`]; nothing escapes as an error.

mod flight;
mod options;
mod types;

pub use options::VerifierOptions;
pub use types::{Status, VerificationResult};

use std::sync::Arc;
use std::time::Duration;

use trust_dns_resolver::Resolver;

use crate::cache::{CacheOptions, Clock, SystemClock, VerificationCache};
use crate::mx::{DEFAULT_DNS_TIMEOUT, DnsMxResolver, MxError, MxResolver, system_resolver};
use crate::smtp::{DnsHostResolver, ProbeOptions, RecipientProber, SmtpProber};
use crate::syntax::{is_valid_syntax, normalize_address, split_address};

use flight::{FlightTable, Ticket};

/// Verification engine shared by single and batch lookups.
pub struct Verifier {
    resolver: Arc<dyn MxResolver>,
    prober: Arc<dyn RecipientProber>,
    clock: Arc<dyn Clock>,
    cache: VerificationCache,
    flights: FlightTable,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    /// System DNS resolver plus a TCP SMTP prober, configured from `options`.
    pub fn from_system_conf(options: VerifierOptions) -> Result<Self, MxError> {
        Self::builder()
            .dns_timeout(options.dns_timeout)
            .probe_options(options.probe)
            .cache_options(options.cache)
            .build()
    }

    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    pub fn verify_one(&self, raw: &str) -> VerificationResult {
        self.verify(raw, true)
    }

    /// Like [`verify_one`](Self::verify_one) but ignores any cached status.
    /// The fresh outcome still replaces the cache entry.
    pub fn verify_one_fresh(&self, raw: &str) -> VerificationResult {
        self.verify(raw, false)
    }

    fn verify(&self, raw: &str, use_cache: bool) -> VerificationResult {
        let address = normalize_address(raw);

        if use_cache {
            if let Some(status) = self.cached(&address) {
                return VerificationResult::new(address, status);
            }
        }

        let status = match self.flights.join(&address) {
            Ticket::Leader(guard) => {
                // Another leader may have finished between the lookup above
                // and joining the table.
                let status = use_cache
                    .then(|| self.cached(&address))
                    .flatten()
                    .unwrap_or_else(|| self.classify_and_store(&address));
                guard.complete(&status);
                status
            }
            Ticket::Follower(flight) => {
                tracing::debug!(address = %address, "waiting on in-flight probe");
                flight
                    .wait()
                    .unwrap_or_else(|| self.classify_and_store(&address))
            }
        };

        VerificationResult::new(address, status)
    }

    fn cached(&self, address: &str) -> Option<Status> {
        let status = self.cache.lookup(address, self.clock.now())?;
        tracing::debug!(address, status = %status, "cache hit");
        Some(status)
    }

    fn classify_and_store(&self, address: &str) -> Status {
        let status = self.classify(address);
        tracing::info!(address, status = %status, "verified");
        self.cache.store(address, status.clone(), self.clock.now());
        status
    }

    fn classify(&self, address: &str) -> Status {
        if !is_valid_syntax(address) {
            return Status::InvalidSyntax;
        }
        let Some((_, domain)) = split_address(address) else {
            return Status::InvalidSyntax;
        };

        let exchange = match self.resolver.lowest_exchange(domain) {
            Ok(exchange) => exchange,
            Err(err) => {
                tracing::warn!(address, domain, error = %err, "MX resolution failed");
                return Status::NoMailExchange;
            }
        };

        match self.prober.probe(&exchange, address) {
            Ok(code) => {
                tracing::debug!(address, exchange = %exchange, code, "RCPT TO answered");
                Status::from_rcpt_code(code)
            }
            Err(err) => {
                tracing::warn!(address, exchange = %exchange, error = %err, "SMTP probe failed");
                Status::SmtpError(err.to_string())
            }
        }
    }
}

/// Assembles a [`Verifier`] from its collaborators.
pub struct VerifierBuilder {
    resolver: Option<Arc<dyn MxResolver>>,
    prober: Option<Arc<dyn RecipientProber>>,
    clock: Option<Arc<dyn Clock>>,
    cache: CacheOptions,
    dns_timeout: Duration,
    probe: ProbeOptions,
}

impl Default for VerifierBuilder {
    fn default() -> Self {
        Self {
            resolver: None,
            prober: None,
            clock: None,
            cache: CacheOptions::default(),
            dns_timeout: DEFAULT_DNS_TIMEOUT,
            probe: ProbeOptions::default(),
        }
    }
}

impl VerifierBuilder {
    pub fn resolver(mut self, resolver: Arc<dyn MxResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn prober(mut self, prober: Arc<dyn RecipientProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache_options(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }

    /// Per-query bound of the system resolver built for missing collaborators.
    pub fn dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    /// Settings of the default [`SmtpProber`]; ignored when a prober is supplied.
    pub fn probe_options(mut self, probe: ProbeOptions) -> Self {
        self.probe = probe;
        self
    }

    /// Fill missing collaborators with the production ones, all sharing one
    /// system resolver. Building that resolver can fail.
    pub fn build(self) -> Result<Verifier, MxError> {
        let mut shared: Option<Arc<Resolver>> = None;
        let mut system = || -> Result<Arc<Resolver>, MxError> {
            if let Some(resolver) = &shared {
                return Ok(Arc::clone(resolver));
            }
            let resolver = Arc::new(system_resolver(self.dns_timeout)?);
            shared = Some(Arc::clone(&resolver));
            Ok(resolver)
        };

        let resolver: Arc<dyn MxResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(DnsMxResolver::from_resolver(system()?)),
        };
        let prober: Arc<dyn RecipientProber> = match self.prober {
            Some(prober) => prober,
            None => Arc::new(SmtpProber::new(
                self.probe,
                Arc::new(DnsHostResolver::new(system()?)),
            )),
        };

        Ok(Verifier {
            resolver,
            prober,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cache: VerificationCache::new(self.cache),
            flights: FlightTable::default(),
        })
    }
}
