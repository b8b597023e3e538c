//! Connection orchestration across an ensemble.
//!
//! [`ConnectionBalancer::create_client`] makes one exhaustive sweep over the
//! ensemble:
//!
//! ```text
//!         ┌──────────────┐ exhausted  ┌──────────────────────────────┐
//!   ┌────►│ select host  ├───────────►│ best so far, DnsOutage or    │
//!   │     └──────┬───────┘            │ EnsembleUnreachable          │
//!   │            ▼                    └──────────────────────────────┘
//!   │     ┌──────────────┐ failure
//!   ├─────┤ force resolve├────────────► mark offline
//!   │     └──────┬───────┘
//!   │            ▼
//!   │     ┌──────────────┐ failure
//!   ├─────┤   connect    ├────────────► mark offline
//!   │     └──────┬───────┘
//!   │            ▼ mark online
//!   │     ┌──────────────┐    no
//!   └─────┤ better host? ├────────────► return client
//!    yes  └──────────────┘
//! ```
//!
//! The policy lock is held only while reading or updating endpoint status.
//! Name resolution and connect attempts run outside it, so concurrent callers
//! on one balancer never wait on each other's network I/O.

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use parking_lot::Mutex;
use snafu::{OptionExt, ensure};

use crate::{
    config::{BalancerConfig, LoadBalancing},
    connector::{ConnectRequest, Connector},
    endpoint::{Endpoint, EndpointId, EndpointInfo, EndpointRegistry},
    error::{
        AlreadyInitializedSnafu, BalancerError, DnsOutageSnafu, EnsembleUnreachableSnafu,
        InvalidConfigurationSnafu, NotInitializedSnafu, Result,
    },
    policy::{SelectionPolicy, build_policy},
    priority::local_host_name,
    resolver::{HostResolver, local_fqdn},
};

/// State fixed by `init`.
struct BalancerState {
    config: BalancerConfig,
    policy: Mutex<Box<dyn SelectionPolicy>>,
}

/// Hands out sessions to the most suitable reachable ensemble member.
///
/// A balancer is created uninitialized and configured exactly once with
/// [`init`](Self::init). It is safe to share across tasks; concurrent
/// [`create_client`](Self::create_client) calls serialize only their status
/// decisions.
pub struct ConnectionBalancer<C: Connector> {
    name: String,
    connector: Arc<C>,
    resolver: Arc<dyn HostResolver>,
    state: OnceLock<BalancerState>,
}

impl<C: Connector> fmt::Debug for ConnectionBalancer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBalancer")
            .field("name", &self.name)
            .field("resolver", &self.resolver)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionBalancer<C> {
    /// Creates an uninitialized balancer.
    pub fn new(
        name: impl Into<String>,
        connector: Arc<C>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        Self { name: name.into(), connector, resolver, state: OnceLock::new() }
    }

    /// Configures the balancer with the policy matching
    /// `config.load_balancing`.
    ///
    /// Hostname-based modes compare endpoints against the local host's fully
    /// qualified name unless `config.local_host_name` overrides it.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::InvalidConfiguration`] if the configuration
    /// does not validate, or [`BalancerError::AlreadyInitialized`] on a second
    /// call.
    pub async fn init(&self, config: BalancerConfig) -> Result<()> {
        config.validate()?;
        let local_host = match config.local_host_override() {
            Some(name) => name,
            None if config.load_balancing.uses_local_host() => {
                local_fqdn(self.resolver.as_ref()).await
            },
            None => local_host_name(),
        };
        let registry = EndpointRegistry::from_hosts(&config.hosts);
        let policy = build_policy(config.load_balancing, registry, &local_host);
        self.install(config, policy)
    }

    /// Configures the balancer with a caller-supplied policy.
    ///
    /// The policy must have been built over `config.hosts`, in order.
    ///
    /// # Errors
    ///
    /// Same as [`init`](Self::init); additionally fails if the policy's
    /// endpoint count differs from the configured host count.
    pub fn init_with_policy(
        &self,
        config: BalancerConfig,
        policy: Box<dyn SelectionPolicy>,
    ) -> Result<()> {
        config.validate()?;
        ensure!(
            policy.host_count() == config.hosts.len(),
            InvalidConfigurationSnafu {
                message: format!(
                    "policy has {} endpoints but {} hosts are configured",
                    policy.host_count(),
                    config.hosts.len()
                ),
            }
        );
        self.install(config, policy)
    }

    fn install(&self, config: BalancerConfig, policy: Box<dyn SelectionPolicy>) -> Result<()> {
        let load_balancing = policy.kind();
        let host_count = policy.host_count();
        self.state
            .set(BalancerState { config, policy: Mutex::new(policy) })
            .map_err(|_| AlreadyInitializedSnafu { name: &self.name }.build())?;
        tracing::info!(
            balancer = %self.name,
            %load_balancing,
            host_count,
            "connection balancer initialized"
        );
        Ok(())
    }

    fn state(&self) -> Result<&BalancerState> {
        self.state.get().context(NotInitializedSnafu { name: &self.name })
    }

    /// Establishes a session with the best reachable endpoint.
    ///
    /// Endpoints that fail to resolve or connect are marked offline and the
    /// next candidate is tried. Only resolved hosts reach the connector. A successful connection to a stand-in is kept
    /// while a better endpoint is tried; it is returned if the upgrade does
    /// not work out.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NotInitialized`] before `init`, or, once every
    /// endpoint has failed, [`BalancerError::DnsOutage`] if any lookup hit a
    /// resolver failure and [`BalancerError::EnsembleUnreachable`] otherwise.
    pub async fn create_client(&self) -> Result<C::Client> {
        let state = self.state()?;
        let host_count = state.config.hosts.len();
        let mut dns_error = false;
        let mut attempt = 0usize;
        let mut best: Option<(EndpointInfo, C::Client)> = None;

        loop {
            let selected = {
                let mut policy = state.policy.lock();
                policy.registry().log_endpoints();
                policy.select_host()
            };

            let endpoint = match selected {
                Ok(endpoint) => endpoint,
                Err(BalancerError::NoAvailableEndpoints { endpoint_count }) => {
                    if let Some((held, client)) = best {
                        tracing::info!(
                            balancer = %self.name,
                            address = %held.address,
                            endpoint_id = %held.id,
                            "no better host reachable, keeping established connection"
                        );
                        return Ok(client);
                    }
                    tracing::error!(
                        balancer = %self.name,
                        endpoint_count,
                        dns_error,
                        "cannot connect to any host"
                    );
                    return if dns_error {
                        DnsOutageSnafu { endpoint_count }.fail()
                    } else {
                        EnsembleUnreachableSnafu { endpoint_count }.fail()
                    };
                },
                Err(error) => return Err(error),
            };

            match best.take() {
                Some((held, client)) if held.id == endpoint.id => {
                    tracing::info!(
                        balancer = %self.name,
                        address = %held.address,
                        endpoint_id = %held.id,
                        "selected host is already connected"
                    );
                    return Ok(client);
                },
                other => best = other,
            }

            if let Err(error) = self.resolver.force_resolve(&endpoint.address).await {
                if matches!(error, BalancerError::ResolverUnavailable { .. }) {
                    dns_error = true;
                    tracing::error!(
                        balancer = %self.name,
                        address = %endpoint.address,
                        error = %error,
                        "DNS error while resolving host"
                    );
                } else {
                    tracing::warn!(
                        balancer = %self.name,
                        address = %endpoint.address,
                        error = %error,
                        "cannot resolve host"
                    );
                }
                state.policy.lock().mark_offline(endpoint.id);
                continue;
            }

            attempt += 1;
            tracing::info!(
                balancer = %self.name,
                address = %endpoint.address,
                endpoint_id = %endpoint.id,
                attempt,
                host_count,
                optimal = endpoint.is_optimal(),
                "connecting to host"
            );

            let request = self.connect_request(&state.config, &endpoint);
            match self.connector.connect(request).await {
                Ok(client) => {
                    let better = {
                        let mut policy = state.policy.lock();
                        policy.mark_online(endpoint.id);
                        policy.has_better_host(endpoint.id)
                    };
                    if !better {
                        tracing::info!(
                            balancer = %self.name,
                            address = %endpoint.address,
                            endpoint_id = %endpoint.id,
                            "connected to host"
                        );
                        return Ok(client);
                    }
                    tracing::info!(
                        balancer = %self.name,
                        address = %endpoint.address,
                        endpoint_id = %endpoint.id,
                        "connected to host, but a better host exists, continuing"
                    );
                    best = Some((endpoint, client));
                },
                Err(error) => {
                    tracing::error!(
                        balancer = %self.name,
                        address = %endpoint.address,
                        endpoint_id = %endpoint.id,
                        error = %error,
                        "failed to connect to host"
                    );
                    state.policy.lock().mark_offline(endpoint.id);
                },
            }
        }
    }

    /// Picks the lifetime bounds for an attempt and draws its deadline.
    fn connect_request(&self, config: &BalancerConfig, endpoint: &EndpointInfo) -> ConnectRequest {
        let session_lifetime = if endpoint.is_optimal() {
            config.session_lifetime
        } else {
            Some(config.fallback_session_lifetime)
        };
        let session_deadline = session_lifetime.map(|lifetime| lifetime.sample());

        if let (false, Some(deadline)) = (endpoint.is_optimal(), session_deadline) {
            tracing::info!(
                balancer = %self.name,
                address = %endpoint.address,
                deadline = %humantime::format_duration(deadline),
                "using fallback session deadline for temporary connection"
            );
        }

        ConnectRequest { endpoint: endpoint.clone(), session_lifetime, session_deadline }
    }

    /// Returns the balancer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once `init` has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    /// Returns the configuration passed to `init`.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NotInitialized`] before `init`.
    pub fn config(&self) -> Result<&BalancerConfig> {
        Ok(&self.state()?.config)
    }

    /// Returns the active selection strategy.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NotInitialized`] before `init`.
    pub fn load_balancing(&self) -> Result<LoadBalancing> {
        Ok(self.state()?.policy.lock().kind())
    }

    /// Returns the number of configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NotInitialized`] before `init`.
    pub fn host_count(&self) -> Result<usize> {
        Ok(self.state()?.policy.lock().host_count())
    }

    /// Returns the number of endpoints not currently known to be offline.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NotInitialized`] before `init`.
    pub fn available_host_count(&self) -> Result<usize> {
        Ok(self.state()?.policy.lock().available_host_count())
    }

    /// Returns a snapshot of every endpoint with its current status.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NotInitialized`] before `init`.
    pub fn endpoint_statuses(&self) -> Result<Vec<Endpoint>> {
        Ok(self.state()?.policy.lock().registry().iter().cloned().collect())
    }

    /// Returns endpoints worth probing for a better connection than the one
    /// held on `current`.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NotInitialized`] before `init`.
    pub fn endpoints_worth_probing(&self, current: Option<EndpointId>) -> Result<Vec<EndpointInfo>> {
        Ok(self.state()?.policy.lock().candidates_worth_probing(current))
    }

    /// Returns true if a preferred endpoint other than `current` is online.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NotInitialized`] before `init`.
    pub fn has_better_host(&self, current: EndpointId) -> Result<bool> {
        Ok(self.state()?.policy.lock().has_better_host(current))
    }
}
