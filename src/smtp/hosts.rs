use std::net::IpAddr;
use std::sync::Arc;

use trust_dns_resolver::Resolver;
use trust_dns_resolver::error::ResolveError;

/// Turns a mail exchange hostname into the addresses to connect to.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// [`HostResolver`] issuing A/AAAA queries through a shared resolver, so the
/// lookup obeys the resolver's own timeout and attempt count.
#[derive(Clone)]
pub struct DnsHostResolver {
    resolver: Arc<Resolver>,
}

impl std::fmt::Debug for DnsHostResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsHostResolver").finish_non_exhaustive()
    }
}

impl DnsHostResolver {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }
}

impl HostResolver for DnsHostResolver {
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        let lookup = self.resolver.lookup_ip(host)?;
        Ok(lookup.iter().collect())
    }
}
