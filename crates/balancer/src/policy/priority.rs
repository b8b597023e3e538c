//! Cost-ranked selection.

use super::{SelectionPolicy, exhausted};
use crate::{
    config::LoadBalancing,
    endpoint::{EndpointId, EndpointInfo, EndpointRegistry, EndpointStatus},
    error::Result,
    priority::PriorityCalculator,
};

/// Picks the reachable endpoint with the lowest cost.
///
/// Costs come from a [`PriorityCalculator`] and are fixed at construction.
/// A pick is optimal when no endpoint that is not offline has a lower cost;
/// anything else is a temporary stand-in.
#[derive(Debug)]
pub struct PriorityPolicy {
    registry: EndpointRegistry,
    kind: LoadBalancing,
    priorities: Vec<usize>,
}

impl PriorityPolicy {
    /// Creates a priority policy, computing every endpoint's cost once.
    #[must_use]
    pub fn new(
        registry: EndpointRegistry,
        kind: LoadBalancing,
        local_host: &str,
        calculator: &dyn PriorityCalculator,
    ) -> Self {
        let priorities: Vec<usize> =
            registry.iter().map(|endpoint| calculator.priority(endpoint, local_host)).collect();
        tracing::debug!(%kind, local_host, ?priorities, "computed endpoint priorities");
        Self { registry, kind, priorities }
    }

    /// Per-endpoint costs, indexed by endpoint id.
    #[must_use]
    pub fn priorities(&self) -> &[usize] {
        &self.priorities
    }

    fn priority(&self, id: EndpointId) -> usize {
        self.priorities[id.index()]
    }

    /// Lowest-cost endpoint with the given status; ties go to the earliest id.
    fn best_with_status(&self, status: EndpointStatus) -> Option<EndpointId> {
        self.registry
            .ids_with_status(status)
            .into_iter()
            .min_by_key(|id| (self.priority(*id), id.index()))
    }

    /// Lowest cost among endpoints that are not offline.
    fn min_reachable_priority(&self) -> Option<usize> {
        self.registry
            .iter()
            .filter(|endpoint| endpoint.status() != EndpointStatus::Offline)
            .map(|endpoint| self.priority(endpoint.id()))
            .min()
    }

    fn info(&self, id: EndpointId, min_reachable: Option<usize>) -> EndpointInfo {
        match min_reachable {
            Some(min) if self.priority(id) > min => self.registry.as_temporary(id),
            _ => self.registry.as_optimal(id),
        }
    }
}

impl SelectionPolicy for PriorityPolicy {
    fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut EndpointRegistry {
        &mut self.registry
    }

    fn kind(&self) -> LoadBalancing {
        self.kind
    }

    fn select_host(&mut self) -> Result<EndpointInfo> {
        let picked = self
            .best_with_status(EndpointStatus::Online)
            .or_else(|| self.best_with_status(EndpointStatus::Undefined));
        match picked {
            Some(id) => Ok(self.info(id, self.min_reachable_priority())),
            None => Err(exhausted(&mut self.registry)),
        }
    }

    fn candidates_worth_probing(&self, current: Option<EndpointId>) -> Vec<EndpointInfo> {
        let ceiling = current.map(|id| self.priority(id));
        let min_reachable = self.min_reachable_priority();

        [EndpointStatus::Undefined, EndpointStatus::Offline]
            .into_iter()
            .flat_map(|status| self.registry.ids_with_status(status))
            .filter(|id| ceiling.is_none_or(|ceiling| self.priority(*id) < ceiling))
            .map(|id| self.info(id, min_reachable))
            .collect()
    }

    fn has_better_host(&self, current: EndpointId) -> bool {
        self.best_with_status(EndpointStatus::Online).is_some_and(|best| best != current)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::priority::{in_order, nearest_hostname};

    fn sequential(hosts: &[&str]) -> PriorityPolicy {
        PriorityPolicy::new(
            EndpointRegistry::from_hosts(hosts),
            LoadBalancing::InOrder,
            "local",
            &in_order,
        )
    }

    fn id(index: usize) -> EndpointId {
        EndpointId::new(index)
    }

    // ============================================
    // Selection
    // ============================================

    #[test]
    fn test_priorities_computed_from_calculator() {
        let policy = PriorityPolicy::new(
            EndpointRegistry::from_hosts(["app1.dc2:2181", "app1.dc1:2181"]),
            LoadBalancing::NearestHostname,
            "app1.dc1",
            &nearest_hostname,
        );
        assert_eq!(policy.priorities(), &[1, 0]);
        assert_eq!(policy.kind(), LoadBalancing::NearestHostname);
    }

    #[test]
    fn test_sequential_picks_first_then_next_after_offline() {
        let mut policy = sequential(&["a", "b", "c"]);

        let first = policy.select_host().unwrap();
        assert_eq!(first.id, id(0));
        assert!(first.is_optimal());

        policy.mark_offline(id(0));
        let second = policy.select_host().unwrap();
        assert_eq!(second.id, id(1));
        assert!(second.is_optimal());
    }

    #[test]
    fn test_online_beats_lower_cost_undefined() {
        let mut policy = sequential(&["a", "b", "c"]);
        policy.mark_online(id(2));

        let picked = policy.select_host().unwrap();
        assert_eq!(picked.id, id(2));
        // a and b are still reachable candidates with lower cost.
        assert!(!picked.is_optimal());
    }

    #[test]
    fn test_ties_go_to_registration_order() {
        let flat = |_: &crate::endpoint::Endpoint, _: &str| 7_usize;
        let mut policy = PriorityPolicy::new(
            EndpointRegistry::from_hosts(["x", "y", "z"]),
            LoadBalancing::InOrder,
            "local",
            &flat,
        );
        policy.mark_online(id(1));
        policy.mark_online(id(2));

        let picked = policy.select_host().unwrap();
        assert_eq!(picked.id, id(1));
        assert!(picked.is_optimal());
    }

    // ============================================
    // Better hosts
    // ============================================

    #[test]
    fn test_has_better_host_sequence() {
        let mut policy = sequential(&["a", "b", "c"]);

        policy.mark_online(id(0));
        assert!(!policy.has_better_host(id(0)));

        policy.mark_online(id(1));
        assert!(!policy.has_better_host(id(0)));
        assert!(policy.has_better_host(id(1)));

        policy.mark_offline(id(0));
        assert!(!policy.has_better_host(id(1)));
        assert_eq!(policy.select_host().unwrap().id, id(1));
    }

    #[test]
    fn test_candidates_below_current_priority() {
        let mut policy = sequential(&["a", "b", "c", "d"]);
        policy.mark_offline(id(0));
        policy.mark_online(id(2));

        let candidates = policy.candidates_worth_probing(Some(id(2)));
        let ids: Vec<EndpointId> = candidates.iter().map(|info| info.id).collect();
        // Undefined endpoints are listed before offline ones.
        assert_eq!(ids, vec![id(1), id(0)]);

        assert!(policy.candidates_worth_probing(Some(id(0))).is_empty());
    }

    #[test]
    fn test_candidates_without_current_lists_everything_not_online() {
        let mut policy = sequential(&["a", "b", "c"]);
        policy.mark_online(id(1));
        policy.mark_offline(id(2));

        let ids: Vec<EndpointId> =
            policy.candidates_worth_probing(None).iter().map(|info| info.id).collect();
        assert_eq!(ids, vec![id(0), id(2)]);
    }

    #[test]
    fn test_best_candidate_is_optimal() {
        let mut policy = sequential(&["a", "b", "c"]);
        policy.mark_online(id(2));

        let candidates = policy.candidates_worth_probing(Some(id(2)));
        assert!(candidates[0].is_optimal());
        assert!(!candidates[1].is_optimal());
    }
}
