//! Uniform random selection.

use rand::seq::IndexedRandom;

use super::{SelectionPolicy, exhausted};
use crate::{
    config::LoadBalancing,
    endpoint::{EndpointId, EndpointInfo, EndpointRegistry, EndpointStatus},
    error::Result,
};

/// Picks uniformly among online endpoints, else among undefined ones.
///
/// Random has no preference ordering, so nothing is ever "better" and every
/// pick is optimal.
#[derive(Debug)]
pub struct RandomPolicy {
    registry: EndpointRegistry,
}

impl RandomPolicy {
    /// Creates a random policy over the given endpoints.
    #[must_use]
    pub fn new(registry: EndpointRegistry) -> Self {
        Self { registry }
    }
}

impl SelectionPolicy for RandomPolicy {
    fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut EndpointRegistry {
        &mut self.registry
    }

    fn kind(&self) -> LoadBalancing {
        LoadBalancing::Random
    }

    fn select_host(&mut self) -> Result<EndpointInfo> {
        let mut rng = rand::rng();
        for status in [EndpointStatus::Online, EndpointStatus::Undefined] {
            let ids = self.registry.ids_with_status(status);
            if let Some(&id) = ids.choose(&mut rng) {
                return Ok(self.registry.as_optimal(id));
            }
        }
        Err(exhausted(&mut self.registry))
    }

    fn candidates_worth_probing(&self, _current: Option<EndpointId>) -> Vec<EndpointInfo> {
        Vec::new()
    }

    fn has_better_host(&self, _current: EndpointId) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn policy(n: usize) -> RandomPolicy {
        RandomPolicy::new(EndpointRegistry::from_hosts((0..n).map(|i| format!("zk{i}:2181"))))
    }

    #[test]
    fn test_prefers_online_endpoints() {
        let mut policy = policy(5);
        policy.mark_online(EndpointId::new(3));

        for _ in 0..50 {
            let picked = policy.select_host().unwrap();
            assert_eq!(picked.id, EndpointId::new(3));
            assert!(picked.is_optimal());
        }
    }

    #[test]
    fn test_falls_back_to_undefined() {
        let mut policy = policy(4);
        policy.mark_offline(EndpointId::new(0));
        policy.mark_offline(EndpointId::new(2));

        for _ in 0..50 {
            let picked = policy.select_host().unwrap();
            assert!(picked.id == EndpointId::new(1) || picked.id == EndpointId::new(3));
            assert!(picked.is_optimal());
        }
    }

    #[test]
    fn test_eventually_picks_every_undefined_endpoint() {
        let mut policy = policy(3);
        let mut seen = [false; 3];
        for _ in 0..500 {
            seen[policy.select_host().unwrap().id.index()] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_no_better_host_concept() {
        let mut policy = policy(3);
        policy.mark_online(EndpointId::new(1));
        assert!(!policy.has_better_host(EndpointId::new(2)));
        assert!(policy.candidates_worth_probing(None).is_empty());
        assert!(policy.candidates_worth_probing(Some(EndpointId::new(2))).is_empty());
    }
}
