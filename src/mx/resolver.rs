use std::sync::Arc;
use std::time::Duration;

use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
    system_conf,
};

use super::{MxError, MxRecord};

/// Upper bound for a single MX query.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(8);

/// Finds the mail exchange to probe for a domain.
pub trait MxResolver: Send + Sync {
    /// Hostname of the lowest-preference MX record for `domain`.
    fn lowest_exchange(&self, domain: &str) -> Result<String, MxError>;
}

/// System resolver configured for one bounded attempt per query.
pub fn system_resolver(timeout: Duration) -> Result<Resolver, MxError> {
    let (config, mut opts) = system_conf::read_system_conf().map_err(MxError::resolver_init)?;
    opts.timeout = timeout;
    opts.attempts = 1;
    Resolver::new(config, opts).map_err(MxError::resolver_init)
}

/// [`MxResolver`] backed by the system DNS configuration.
pub struct DnsMxResolver {
    resolver: Arc<Resolver>,
}

impl std::fmt::Debug for DnsMxResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsMxResolver").finish_non_exhaustive()
    }
}

impl DnsMxResolver {
    /// Build from `/etc/resolv.conf` (or the platform equivalent) with a single
    /// attempt bounded by `timeout`.
    pub fn from_system_conf(timeout: Duration) -> Result<Self, MxError> {
        Ok(Self::from_resolver(Arc::new(system_resolver(timeout)?)))
    }

    /// Share an existing resolver, e.g. with a
    /// [`DnsHostResolver`](crate::smtp::DnsHostResolver).
    pub fn from_resolver(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }
}

impl MxResolver for DnsMxResolver {
    fn lowest_exchange(&self, domain: &str) -> Result<String, MxError> {
        let ascii = normalize_domain(domain)?;
        lowest_exchange_with(self.resolver.as_ref(), &ascii)
    }
}

pub(crate) fn lowest_exchange_with<R>(resolver: &R, ascii_domain: &str) -> Result<String, MxError>
where
    R: LookupMx,
{
    let records = resolve_with(resolver, ascii_domain)?;
    records
        .into_iter()
        .next()
        .map(|record| record.exchange)
        .ok_or_else(|| MxError::no_records(ascii_domain))
}

/// Sorted, deduplicated records with null MX entries (`.`) removed.
pub(crate) fn resolve_with<R>(resolver: &R, ascii_domain: &str) -> Result<Vec<MxRecord>, MxError>
where
    R: LookupMx,
{
    let mut records = match resolver.lookup_mx(ascii_domain) {
        Ok(records) => records,
        Err(err) if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
            return Err(MxError::no_records(ascii_domain));
        }
        Err(err) => return Err(MxError::lookup(ascii_domain, err)),
    };

    records.retain(|record| !record.exchange.is_empty());
    records.sort();
    records.dedup();
    Ok(records)
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, MxError> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(MxError::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(MxError::idna)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

pub(crate) trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let lookup = Resolver::mx_lookup(self, domain)?;
        let mut records = Vec::new();
        for mx in lookup.iter() {
            let exchange = normalize_exchange(mx.exchange().to_utf8());
            records.push(MxRecord::new(mx.preference(), exchange));
        }
        Ok(records)
    }
}

#[cfg(test)]
impl LookupMx for crate::mx::tests::StubResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        (self.on_lookup)(domain)
    }
}
