//! Controllable test doubles for the balancer's collaborators.
//!
//! # Features
//!
//! - **Scripted connects**: per-address success, permanent failure, or failure
//!   for the next N attempts
//! - **Scripted resolution**: per-address resolved, not-found, or resolver
//!   outage outcomes, plus canonical names for the local host lookup
//! - **Call logs**: every connect request and resolve call is recorded
//! - **Latency injection**: an optional delay before each connect completes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keeper_balancer::mock::{MockConnector, MockResolver};
//! use keeper_balancer::{BalancerConfig, ConnectionBalancer, LoadBalancing};
//!
//! #[tokio::test]
//! async fn test_failover() {
//!     let connector = Arc::new(MockConnector::new());
//!     connector.fail("zk1:2181");
//!
//!     let balancer =
//!         ConnectionBalancer::new("zookeeper", Arc::clone(&connector), Arc::new(MockResolver::new()));
//!     balancer
//!         .init(
//!             BalancerConfig::builder()
//!                 .hosts(vec!["zk1:2181".to_owned(), "zk2:2181".to_owned()])
//!                 .load_balancing(LoadBalancing::InOrder)
//!                 .build()
//!                 .unwrap(),
//!         )
//!         .await
//!         .unwrap();
//!
//!     let client = balancer.create_client().await.unwrap();
//!     assert_eq!(client.address, "zk2:2181");
//! }
//! ```

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::{
    config::SessionLifetime,
    connector::{ConnectRequest, Connector},
    endpoint::EndpointId,
    error::{ConnectionFailedSnafu, HostUnresolvableSnafu, Result, ResolverUnavailableSnafu},
    resolver::HostResolver,
};

// =============================================================================
// Connector
// =============================================================================

/// Scripted outcome of connect attempts against one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectBehavior {
    Succeed,
    Fail,
    FailTimes,
}

/// Client handle returned by [`MockConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockClient {
    /// Address the session was opened against.
    pub address: String,
    /// Endpoint id chosen by the policy.
    pub endpoint_id: EndpointId,
    /// Whether the session uses TLS.
    pub secure: bool,
    /// Lifetime bounds passed with the request.
    pub session_lifetime: Option<SessionLifetime>,
    /// Deadline passed with the request.
    pub session_deadline: Option<Duration>,
    /// Whether the policy handed out a temporary stand-in.
    pub temporary: bool,
}

/// [`Connector`] whose outcome is scripted per address.
///
/// Unscripted addresses connect successfully.
#[derive(Debug, Default)]
pub struct MockConnector {
    behaviors: RwLock<HashMap<String, ConnectBehavior>>,
    remaining_failures: Mutex<HashMap<String, usize>>,
    attempts: RwLock<Vec<ConnectRequest>>,
    connect_count: AtomicUsize,
    delay: RwLock<Option<Duration>>,
}

impl MockConnector {
    /// Creates a connector that accepts every address.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every attempt against `address` fail.
    pub fn fail(&self, address: impl Into<String>) {
        self.behaviors.write().insert(address.into(), ConnectBehavior::Fail);
    }

    /// Makes attempts against `address` succeed.
    pub fn succeed(&self, address: impl Into<String>) {
        let address = address.into();
        self.remaining_failures.lock().remove(&address);
        self.behaviors.write().insert(address, ConnectBehavior::Succeed);
    }

    /// Makes the next `times` attempts against `address` fail.
    pub fn fail_times(&self, address: impl Into<String>, times: usize) {
        let address = address.into();
        self.remaining_failures.lock().insert(address.clone(), times);
        self.behaviors.write().insert(address, ConnectBehavior::FailTimes);
    }

    /// Delays every connect by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = Some(delay);
    }

    /// Returns every request received, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<ConnectRequest> {
        self.attempts.read().clone()
    }

    /// Returns the addresses of every request received, in order.
    #[must_use]
    pub fn attempted_addresses(&self) -> Vec<String> {
        self.attempts.read().iter().map(|request| request.endpoint.address.clone()).collect()
    }

    /// Returns the number of connect calls.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    fn should_fail(&self, address: &str) -> bool {
        let behavior = self.behaviors.read().get(address).copied();
        match behavior {
            None | Some(ConnectBehavior::Succeed) => false,
            Some(ConnectBehavior::Fail) => true,
            Some(ConnectBehavior::FailTimes) => {
                let mut remaining = self.remaining_failures.lock();
                match remaining.get_mut(address) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        true
                    },
                    _ => false,
                }
            },
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Client = MockClient;

    async fn connect(&self, request: ConnectRequest) -> Result<MockClient> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.attempts.write().push(request.clone());

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail(request.address()) {
            return ConnectionFailedSnafu {
                address: request.address(),
                message: "connection refused",
            }
            .fail();
        }

        Ok(MockClient {
            temporary: !request.endpoint.is_optimal(),
            secure: request.secure(),
            address: request.endpoint.address,
            endpoint_id: request.endpoint.id,
            session_lifetime: request.session_lifetime,
            session_deadline: request.session_deadline,
        })
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Scripted outcome of resolving one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The address resolves to these IPs.
    Resolved(Vec<IpAddr>),
    /// The name does not exist.
    NotFound,
    /// The resolver itself is failing.
    Unavailable,
}

/// [`HostResolver`] whose outcome is scripted per address.
///
/// Unscripted addresses resolve to `127.0.0.1`. Unscripted host names have no
/// canonical name.
#[derive(Debug, Default)]
pub struct MockResolver {
    outcomes: RwLock<HashMap<String, ResolveOutcome>>,
    canonical_names: RwLock<HashMap<String, String>>,
    calls: RwLock<Vec<String>>,
}

impl MockResolver {
    /// Creates a resolver that resolves every address.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome for `address`.
    pub fn set_outcome(&self, address: impl Into<String>, outcome: ResolveOutcome) {
        self.outcomes.write().insert(address.into(), outcome);
    }

    /// Makes `address` a non-existent name.
    pub fn not_found(&self, address: impl Into<String>) {
        self.set_outcome(address, ResolveOutcome::NotFound);
    }

    /// Makes lookups of `address` hit a resolver outage.
    pub fn unavailable(&self, address: impl Into<String>) {
        self.set_outcome(address, ResolveOutcome::Unavailable);
    }

    /// Scripts the canonical name returned for `host`.
    pub fn set_canonical_name(&self, host: impl Into<String>, canonical: impl Into<String>) {
        self.canonical_names.write().insert(host.into(), canonical.into());
    }

    /// Returns every address resolved, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().clone()
    }
}

#[async_trait]
impl HostResolver for MockResolver {
    async fn force_resolve(&self, address: &str) -> Result<Vec<IpAddr>> {
        self.calls.write().push(address.to_owned());

        let outcome = self.outcomes.read().get(address).cloned();
        match outcome {
            None => Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]),
            Some(ResolveOutcome::Resolved(ips)) => Ok(ips),
            Some(ResolveOutcome::NotFound) => {
                HostUnresolvableSnafu { address, message: "no such host" }.fail()
            },
            Some(ResolveOutcome::Unavailable) => {
                ResolverUnavailableSnafu { address, message: "resolver timed out" }.fail()
            },
        }
    }

    async fn canonical_name(&self, host: &str) -> Option<String> {
        self.canonical_names.read().get(host).cloned()
    }
}
