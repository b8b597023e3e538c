//! Endpoint selection policies.
//!
//! Every policy owns an [`EndpointRegistry`] and decides, from the registry's
//! current status snapshot, which endpoint to try next.
//!
//! # Variants
//!
//! - [`RandomPolicy`]: uniform pick among online, then undefined endpoints
//! - [`RoundRobinPolicy`]: rotating cursor over non-offline endpoints
//! - [`FirstOrRandomPolicy`]: the first endpoint, or a temporary random stand-in
//! - [`PriorityPolicy`]: lowest cost from a [`PriorityCalculator`](crate::priority::PriorityCalculator)
//!
//! # Exhaustion
//!
//! When neither an online nor an undefined endpoint exists, `select_host`
//! resets every offline endpoint to undefined and then fails with
//! [`BalancerError::NoAvailableEndpoints`]. Both effects belong to the same
//! call, so the next call has candidates again.

mod first_or_random;
mod priority;
mod random;
mod round_robin;

use std::fmt;

pub use first_or_random::FirstOrRandomPolicy;
pub use priority::PriorityPolicy;
pub use random::RandomPolicy;
pub use round_robin::RoundRobinPolicy;

use crate::{
    config::LoadBalancing,
    endpoint::{EndpointId, EndpointInfo, EndpointRegistry, EndpointStatus},
    error::{BalancerError, Result},
    priority as calculators,
};

/// Capability set shared by all selection policies.
pub trait SelectionPolicy: Send + Sync + fmt::Debug {
    /// Returns the registry this policy reads.
    fn registry(&self) -> &EndpointRegistry;

    /// Returns the registry for status updates.
    fn registry_mut(&mut self) -> &mut EndpointRegistry;

    /// Returns the load balancing mode this policy implements.
    fn kind(&self) -> LoadBalancing;

    /// Chooses the endpoint to try next.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::NoAvailableEndpoints`] when every endpoint is
    /// offline, after resetting them all to undefined.
    fn select_host(&mut self) -> Result<EndpointInfo>;

    /// Returns endpoints that might be strictly better than `current` and are
    /// worth probing in the background.
    fn candidates_worth_probing(&self, current: Option<EndpointId>) -> Vec<EndpointInfo>;

    /// Returns true if a strictly preferred endpoint other than `current` is
    /// selectable right now.
    fn has_better_host(&self, current: EndpointId) -> bool;

    /// Returns the total number of endpoints.
    fn host_count(&self) -> usize {
        self.registry().count()
    }

    /// Returns the number of endpoints not known to be bad.
    fn available_host_count(&self) -> usize {
        let registry = self.registry();
        registry.count_with_status(EndpointStatus::Online)
            + registry.count_with_status(EndpointStatus::Undefined)
    }

    /// Marks an endpoint offline.
    fn mark_offline(&mut self, id: EndpointId) {
        self.registry_mut().mark_offline(id);
    }

    /// Marks an endpoint online.
    fn mark_online(&mut self, id: EndpointId) {
        self.registry_mut().mark_online(id);
    }

    /// Moves every offline endpoint back to undefined.
    fn reset_offline_statuses(&mut self) {
        self.registry_mut().reset_offline_to_undefined();
    }
}

/// Resets offline endpoints and builds the exhaustion error.
fn exhausted(registry: &mut EndpointRegistry) -> BalancerError {
    debug_assert_eq!(
        registry.count_with_status(EndpointStatus::Online)
            + registry.count_with_status(EndpointStatus::Undefined),
        0
    );
    registry.reset_offline_to_undefined();
    tracing::warn!(
        endpoint_count = registry.count(),
        "no available endpoints left, offline endpoints reset to undefined"
    );
    BalancerError::NoAvailableEndpoints { endpoint_count: registry.count() }
}

/// Builds the policy for a load balancing mode.
///
/// `local_host` feeds the hostname-based priority calculators.
#[must_use]
pub fn build_policy(
    load_balancing: LoadBalancing,
    registry: EndpointRegistry,
    local_host: &str,
) -> Box<dyn SelectionPolicy> {
    match load_balancing {
        LoadBalancing::Random => Box::new(RandomPolicy::new(registry)),
        LoadBalancing::RoundRobin => Box::new(RoundRobinPolicy::new(registry)),
        LoadBalancing::FirstOrRandom => Box::new(FirstOrRandomPolicy::new(registry)),
        LoadBalancing::InOrder => Box::new(PriorityPolicy::new(
            registry,
            LoadBalancing::InOrder,
            local_host,
            &calculators::in_order,
        )),
        LoadBalancing::NearestHostname => Box::new(PriorityPolicy::new(
            registry,
            LoadBalancing::NearestHostname,
            local_host,
            &calculators::nearest_hostname,
        )),
        LoadBalancing::HostnameLevenshteinDistance => Box::new(PriorityPolicy::new(
            registry,
            LoadBalancing::HostnameLevenshteinDistance,
            local_host,
            &calculators::hostname_levenshtein,
        )),
    }
}
