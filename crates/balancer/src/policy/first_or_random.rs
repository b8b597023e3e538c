//! First endpoint preferred, random stand-in while it is down.

use rand::seq::IndexedRandom;

use super::{SelectionPolicy, exhausted};
use crate::{
    config::LoadBalancing,
    endpoint::{EndpointId, EndpointInfo, EndpointRegistry, EndpointStatus},
    error::Result,
};

const FIRST: EndpointId = EndpointId::new(0);

/// Always wants the first configured endpoint.
///
/// While the first endpoint is offline a random other endpoint is handed out
/// as a temporary connection, and the first endpoint stays worth probing.
#[derive(Debug)]
pub struct FirstOrRandomPolicy {
    registry: EndpointRegistry,
}

impl FirstOrRandomPolicy {
    /// Creates a first-or-random policy over the given endpoints.
    #[must_use]
    pub fn new(registry: EndpointRegistry) -> Self {
        Self { registry }
    }

    fn first_status(&self) -> Option<EndpointStatus> {
        self.registry.iter().next().map(|endpoint| endpoint.status())
    }

    fn random_other(&self, status: EndpointStatus) -> Option<EndpointId> {
        let ids: Vec<EndpointId> =
            self.registry.ids_with_status(status).into_iter().filter(|id| *id != FIRST).collect();
        ids.choose(&mut rand::rng()).copied()
    }
}

impl SelectionPolicy for FirstOrRandomPolicy {
    fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut EndpointRegistry {
        &mut self.registry
    }

    fn kind(&self) -> LoadBalancing {
        LoadBalancing::FirstOrRandom
    }

    fn select_host(&mut self) -> Result<EndpointInfo> {
        let first = self.first_status();

        if first == Some(EndpointStatus::Online) {
            return Ok(self.registry.as_optimal(FIRST));
        }
        if let Some(id) = self.random_other(EndpointStatus::Online) {
            return Ok(self.registry.as_temporary(id));
        }
        if first == Some(EndpointStatus::Undefined) {
            return Ok(self.registry.as_optimal(FIRST));
        }
        if let Some(id) = self.random_other(EndpointStatus::Undefined) {
            return Ok(self.registry.as_temporary(id));
        }
        Err(exhausted(&mut self.registry))
    }

    fn candidates_worth_probing(&self, current: Option<EndpointId>) -> Vec<EndpointInfo> {
        if self.registry.is_empty() || current == Some(FIRST) {
            return Vec::new();
        }
        vec![self.registry.as_optimal(FIRST)]
    }

    fn has_better_host(&self, current: EndpointId) -> bool {
        current != FIRST && self.first_status() == Some(EndpointStatus::Online)
    }
}
