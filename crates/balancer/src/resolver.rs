//! Host name resolution.
//!
//! Every connection attempt first re-resolves the endpoint's host so that a
//! stale DNS answer never sends a client to a decommissioned member.
//!
//! The resolver also canonicalizes the local host name, which hostname-based
//! selection compares against endpoint names.

use std::{fmt, net::IpAddr};

use async_trait::async_trait;
use hickory_resolver::{
    ResolveError, Resolver, config::ResolverConfig, lookup_ip::LookupIp,
    name_server::TokioConnectionProvider, proto::rr::RecordType,
};
use parking_lot::RwLock;

use crate::{
    error::{BalancerError, HostUnresolvableSnafu, Result, ResolverUnavailableSnafu},
    priority::{fqdn_or_host_name, host_part, local_host_name},
};

/// Resolves endpoint addresses, bypassing any answer cache.
#[async_trait]
pub trait HostResolver: Send + Sync + fmt::Debug {
    /// Resolves `address` (`host`, `host:port` or `[v6]:port`) to IP addresses.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::HostUnresolvable`] if the name does not exist,
    /// or [`BalancerError::ResolverUnavailable`] if the lookup itself failed.
    async fn force_resolve(&self, address: &str) -> Result<Vec<IpAddr>>;

    /// Returns the fully qualified name `host` resolves under, or `None` if
    /// it cannot be determined.
    async fn canonical_name(&self, _host: &str) -> Option<String> {
        None
    }
}

/// Returns the local host's fully qualified name, lower-cased.
///
/// Falls back to the plain host name when `resolver` cannot canonicalize it.
pub async fn local_fqdn(resolver: &dyn HostResolver) -> String {
    let host_name = local_host_name();
    let canonical = resolver.canonical_name(&host_name).await;
    fqdn_or_host_name(&host_name, canonical.as_deref())
}

/// [`HostResolver`] backed by hickory with its answer cache disabled.
///
/// Uses the system resolver configuration, falling back to hickory's default
/// upstreams when it cannot be read.
#[derive(Default)]
pub struct DnsResolver {
    /// DNS resolver (lazily initialized).
    inner: RwLock<Option<Resolver<TokioConnectionProvider>>>,
}

impl fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsResolver").field("initialized", &self.inner.read().is_some()).finish()
    }
}

impl DnsResolver {
    /// Creates a resolver. The underlying client is built on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self) -> Resolver<TokioConnectionProvider> {
        if let Some(resolver) = self.inner.read().as_ref() {
            return resolver.clone();
        }

        let mut builder = match Resolver::builder_tokio() {
            Ok(builder) => builder,
            Err(error) => {
                tracing::warn!(error = %error, "system resolver config unavailable, using defaults");
                Resolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
            },
        };
        builder.options_mut().cache_size = 0;
        let resolver = builder.build();

        let mut guard = self.inner.write();
        guard.get_or_insert(resolver).clone()
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn force_resolve(&self, address: &str) -> Result<Vec<IpAddr>> {
        let host = host_part(address);
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let resolver = self.get_or_create();
        match resolver.lookup_ip(host).await {
            Ok(lookup) => {
                let ips: Vec<IpAddr> = lookup.iter().collect();
                tracing::debug!(address, ?ips, "resolved host");
                Ok(ips)
            },
            Err(error) => Err(classify(address, &error)),
        }
    }

    async fn canonical_name(&self, host: &str) -> Option<String> {
        if host.parse::<IpAddr>().is_ok() {
            return None;
        }

        let resolver = self.get_or_create();
        match resolver.lookup_ip(host).await {
            Ok(lookup) => Some(owner_name(&lookup)),
            Err(error) => {
                tracing::debug!(host, error = %error, "cannot canonicalize host name");
                None
            },
        }
    }
}

/// Name owning the first address record, past any CNAME chain.
fn owner_name(lookup: &LookupIp) -> String {
    lookup
        .as_lookup()
        .record_iter()
        .find(|record| matches!(record.record_type(), RecordType::A | RecordType::AAAA))
        .map_or_else(|| lookup.query().name().to_utf8(), |record| record.name().to_utf8())
}

/// Missing names are a property of the host; anything else is a DNS failure.
fn classify(address: &str, error: &ResolveError) -> BalancerError {
    if error.is_nx_domain() || error.is_no_records_found() {
        HostUnresolvableSnafu { address, message: error.to_string() }.build()
    } else {
        ResolverUnavailableSnafu { address, message: error.to_string() }.build()
    }
}
