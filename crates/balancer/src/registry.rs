//! Named balancer instances.
//!
//! Applications usually talk to a handful of ensembles, each known by a
//! configuration name. [`BalancerRegistry`] hands out one shared
//! [`ConnectionBalancer`] per name, created on first request.
//!
//! Keep a registry in a `static` (for example behind `std::sync::LazyLock`)
//! to get a process-wide instance table.

use std::{collections::BTreeMap, fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{balancer::ConnectionBalancer, connector::Connector, resolver::HostResolver};

/// Lazily created, shared balancers keyed by configuration name.
///
/// Every balancer created by a registry uses the registry's connector and
/// resolver.
pub struct BalancerRegistry<C: Connector> {
    connector: Arc<C>,
    resolver: Arc<dyn HostResolver>,
    instances: Mutex<BTreeMap<String, Arc<ConnectionBalancer<C>>>>,
}

impl<C: Connector> fmt::Debug for BalancerRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalancerRegistry")
            .field("names", &self.names())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> BalancerRegistry<C> {
    /// Creates an empty registry.
    pub fn new(connector: Arc<C>, resolver: Arc<dyn HostResolver>) -> Self {
        Self { connector, resolver, instances: Mutex::new(BTreeMap::new()) }
    }

    /// Returns the balancer registered under `name`, creating an
    /// uninitialized one if none exists.
    ///
    /// Concurrent callers asking for the same name always receive the same
    /// instance.
    pub fn instance(&self, name: &str) -> Arc<ConnectionBalancer<C>> {
        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(name) {
            return Arc::clone(existing);
        }

        tracing::debug!(balancer = name, "creating connection balancer");
        let balancer = Arc::new(ConnectionBalancer::new(
            name,
            Arc::clone(&self.connector),
            Arc::clone(&self.resolver),
        ));
        instances.insert(name.to_owned(), Arc::clone(&balancer));
        balancer
    }

    /// Returns the balancer registered under `name` without creating one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ConnectionBalancer<C>>> {
        self.instances.lock().get(name).cloned()
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.instances.lock().keys().cloned().collect()
    }

    /// Returns the number of registered balancers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    /// Returns true if no balancer has been requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockResolver};

    fn registry() -> BalancerRegistry<MockConnector> {
        BalancerRegistry::new(Arc::new(MockConnector::new()), Arc::new(MockResolver::new()))
    }

    #[test]
    fn test_same_name_same_instance() {
        let registry = registry();
        let first = registry.instance("zookeeper");
        let second = registry.instance("zookeeper");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_names_distinct_instances() {
        let registry = registry();
        let main = registry.instance("main");
        let aux = registry.instance("auxiliary");
        assert!(!Arc::ptr_eq(&main, &aux));
        assert_eq!(registry.names(), vec!["auxiliary", "main"]);
        assert_eq!(aux.name(), "auxiliary");
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = registry();
        assert!(registry.is_empty());
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());

        let created = registry.instance("present");
        assert!(Arc::ptr_eq(&registry.get("present").unwrap(), &created));
    }

    #[test]
    fn test_new_instances_are_uninitialized() {
        let registry = registry();
        assert!(!registry.instance("fresh").is_initialized());
    }

    #[test]
    fn test_concurrent_lookups_share_one_instance() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.instance("shared"))
            })
            .collect();

        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for instance in &instances[1..] {
            assert!(Arc::ptr_eq(&instances[0], instance));
        }
        assert_eq!(registry.len(), 1);
    }
}
