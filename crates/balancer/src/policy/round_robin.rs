//! Rotating selection over non-offline endpoints.

use super::{SelectionPolicy, exhausted};
use crate::{
    config::LoadBalancing,
    endpoint::{Endpoint, EndpointId, EndpointInfo, EndpointRegistry, EndpointStatus},
    error::Result,
};

/// Hands out endpoints in registration order, skipping offline ones.
///
/// The cursor points at the next endpoint to consider. When the cursor sits
/// on an offline endpoint, the first online endpoint in registration order is
/// taken, then the first undefined one. The cursor then moves just past the
/// returned endpoint.
#[derive(Debug)]
pub struct RoundRobinPolicy {
    registry: EndpointRegistry,
    cursor: usize,
}

impl RoundRobinPolicy {
    /// Creates a round robin policy starting at the first endpoint.
    #[must_use]
    pub fn new(registry: EndpointRegistry) -> Self {
        Self { registry, cursor: 0 }
    }

    /// Index of the next endpoint the policy will look at.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn first_with_status(&self, status: EndpointStatus) -> Option<EndpointId> {
        self.registry.iter().find(|endpoint| endpoint.status() == status).map(Endpoint::id)
    }

    fn take(&mut self, id: EndpointId) -> EndpointInfo {
        self.cursor = (id.index() + 1) % self.registry.count();
        self.registry.as_optimal(id)
    }
}

impl SelectionPolicy for RoundRobinPolicy {
    fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut EndpointRegistry {
        &mut self.registry
    }

    fn kind(&self) -> LoadBalancing {
        LoadBalancing::RoundRobin
    }

    fn select_host(&mut self) -> Result<EndpointInfo> {
        if self.registry.is_empty() {
            return Err(exhausted(&mut self.registry));
        }

        let at_cursor = EndpointId::new(self.cursor);
        if self.registry.get(at_cursor).status() != EndpointStatus::Offline {
            return Ok(self.take(at_cursor));
        }

        let next = self
            .first_with_status(EndpointStatus::Online)
            .or_else(|| self.first_with_status(EndpointStatus::Undefined));
        match next {
            Some(id) => Ok(self.take(id)),
            None => Err(exhausted(&mut self.registry)),
        }
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

    fn policy(n: usize) -> RoundRobinPolicy {
        RoundRobinPolicy::new(EndpointRegistry::from_hosts((0..n).map(|i| format!("zk{i}:2181"))))
    }

    fn next_index(policy: &mut RoundRobinPolicy) -> usize {
        policy.select_host().unwrap().id.index()
    }

    #[test]
    fn test_cycles_through_healthy_endpoints() {
        let mut policy = policy(3);
        for i in 0..3 {
            policy.mark_online(EndpointId::new(i));
        }

        let picks: Vec<usize> = (0..4).map(|_| next_index(&mut policy)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_cycles_through_undefined_endpoints() {
        let mut policy = policy(3);
        let picks: Vec<usize> = (0..6).map(|_| next_index(&mut policy)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_skips_offline_endpoints() {
        let mut policy = policy(3);
        policy.mark_offline(EndpointId::new(1));

        // Leaving endpoint 0 parks the cursor on the offline endpoint, so the
        // scan restarts at the first endpoint every time.
        let picks: Vec<usize> = (0..4).map(|_| next_index(&mut policy)).collect();
        assert_eq!(picks, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_offline_cursor_falls_back_in_registration_order() {
        let mut policy = policy(4);
        assert_eq!(next_index(&mut policy), 0);
        assert_eq!(next_index(&mut policy), 1);
        assert_eq!(policy.cursor(), 2);

        policy.mark_offline(EndpointId::new(2));
        policy.mark_online(EndpointId::new(0));
        policy.mark_online(EndpointId::new(3));

        // Endpoint 3 follows the cursor, but endpoint 0 was registered first.
        assert_eq!(next_index(&mut policy), 0);
        assert_eq!(policy.cursor(), 1);
    }

    #[test]
    fn test_cycles_while_caller_marks_picks_online() {
        let mut policy = policy(3);
        let picks: Vec<usize> = (0..4)
            .map(|_| {
                let index = next_index(&mut policy);
                policy.mark_online(EndpointId::new(index));
                index
            })
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_prefers_online_when_cursor_is_offline() {
        let mut policy = policy(4);
        policy.mark_offline(EndpointId::new(0));
        policy.mark_online(EndpointId::new(3));

        // Cursor sits on an offline endpoint: the online one wins over the
        // undefined endpoints in between.
        assert_eq!(next_index(&mut policy), 3);
        assert_eq!(policy.cursor(), 0);
        assert_eq!(next_index(&mut policy), 3);
    }

    #[test]
    fn test_every_pick_is_optimal() {
        let mut policy = policy(3);
        policy.mark_offline(EndpointId::new(0));
        for _ in 0..5 {
            assert!(policy.select_host().unwrap().is_optimal());
        }
        assert!(!policy.has_better_host(EndpointId::new(2)));
        assert!(policy.candidates_worth_probing(Some(EndpointId::new(2))).is_empty());
    }

    #[test]
    fn test_cursor_survives_exhaustion() {
        let mut policy = policy(2);
        assert_eq!(next_index(&mut policy), 0);
        policy.mark_offline(EndpointId::new(0));
        policy.mark_offline(EndpointId::new(1));

        assert!(policy.select_host().is_err());
        assert_eq!(next_index(&mut policy), 1);
    }
}
