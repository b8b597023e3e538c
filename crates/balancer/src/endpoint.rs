//! Ensemble members and their health status.
//!
//! The [`EndpointRegistry`] owns the fixed list of ensemble members. Ids are
//! assigned sequentially at registration and the list never changes size
//! afterwards; status is the only mutable field.
//!
//! ```text
//! ┌───────────┐  success   ┌────────┐
//! │ Undefined ├───────────►│ Online │
//! └─────┬─────┘            └───┬────┘
//!       │ failure              │ failure
//!       ▼                      ▼
//! ┌──────────────────────────────────┐
//! │             Offline              │
//! └────────────────┬─────────────────┘
//!                  │ reset, all offline endpoints at once
//!                  ▼
//!              Undefined
//! ```

use std::fmt;

/// Prefix marking a host string as TLS-secured.
pub const SECURE_PREFIX: &str = "secure://";

/// Identifier of an endpoint, stable for the lifetime of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(usize);

impl EndpointId {
    /// Creates an id from a registration index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the registration index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Health status of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointStatus {
    /// Never tried, or reset after every endpoint went offline.
    #[default]
    Undefined,
    /// Last connection attempt succeeded.
    Online,
    /// Last connection attempt or resolution failed.
    Offline,
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// One ensemble member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    id: EndpointId,
    address: String,
    secure: bool,
    status: EndpointStatus,
}

impl Endpoint {
    /// Returns the endpoint id.
    #[must_use]
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Returns the address with any secure prefix stripped.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns whether the connection must use TLS.
    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    /// Returns the current health status.
    #[must_use]
    pub fn status(&self) -> EndpointStatus {
        self.status
    }
}

/// Session settings attached to a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSettings {
    /// The endpoint is a stand-in for a preferred one; the session should
    /// use the shorter fallback lifetime so it is cheap to abandon.
    pub use_fallback_session_lifetime: bool,
}

/// An endpoint chosen by a selection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Address with any secure prefix stripped.
    pub address: String,
    /// Whether the connection must use TLS.
    pub secure: bool,
    /// Endpoint id in the registry.
    pub id: EndpointId,
    /// Session settings for this pick.
    pub settings: SessionSettings,
}

impl EndpointInfo {
    /// Returns true if this is a policy-preferred pick.
    #[must_use]
    pub fn is_optimal(&self) -> bool {
        !self.settings.use_fallback_session_lifetime
    }
}

/// Splits a raw `[secure://]host[:port]` string into address and TLS flag.
///
/// Parsing is purely lexical.
#[must_use]
pub fn parse_host(raw: &str) -> (String, bool) {
    match raw.strip_prefix(SECURE_PREFIX) {
        Some(address) => (address.to_owned(), true),
        None => (raw.to_owned(), false),
    }
}

/// Fixed list of ensemble members and their health status.
///
/// The registry performs no internal synchronization; the owning
/// [`ConnectionBalancer`](crate::ConnectionBalancer) serializes access.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from raw `[secure://]host[:port]` strings, in order.
    pub fn from_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for host in hosts {
            let (address, secure) = parse_host(host.as_ref());
            registry.register(address, secure);
        }
        registry
    }

    /// Appends an endpoint with status `Undefined` and returns its id.
    pub fn register(&mut self, address: impl Into<String>, secure: bool) -> EndpointId {
        let id = EndpointId::new(self.endpoints.len());
        self.endpoints.push(Endpoint {
            id,
            address: address.into(),
            secure,
            status: EndpointStatus::Undefined,
        });
        id
    }

    /// Returns the endpoint with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this registry.
    #[must_use]
    pub fn get(&self, id: EndpointId) -> &Endpoint {
        &self.endpoints[id.index()]
    }

    /// Returns the number of endpoints.
    #[must_use]
    pub fn count(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true if no endpoint is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Iterates over endpoints in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Marks an endpoint offline.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this registry.
    pub fn mark_offline(&mut self, id: EndpointId) {
        self.endpoints[id.index()].status = EndpointStatus::Offline;
    }

    /// Marks an endpoint online.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this registry.
    pub fn mark_online(&mut self, id: EndpointId) {
        self.endpoints[id.index()].status = EndpointStatus::Online;
    }

    /// Moves every offline endpoint back to undefined.
    ///
    /// Online and undefined endpoints are untouched.
    pub fn reset_offline_to_undefined(&mut self) {
        for endpoint in &mut self.endpoints {
            if endpoint.status == EndpointStatus::Offline {
                endpoint.status = EndpointStatus::Undefined;
            }
        }
    }

    /// Returns the ids with the given status, in registration order.
    #[must_use]
    pub fn ids_with_status(&self, status: EndpointStatus) -> Vec<EndpointId> {
        self.endpoints.iter().filter(|e| e.status == status).map(|e| e.id).collect()
    }

    /// Returns the number of endpoints with the given status.
    #[must_use]
    pub fn count_with_status(&self, status: EndpointStatus) -> usize {
        self.endpoints.iter().filter(|e| e.status == status).count()
    }

    /// Builds a selection result for a policy-preferred pick.
    #[must_use]
    pub fn as_optimal(&self, id: EndpointId) -> EndpointInfo {
        self.info(id, false)
    }

    /// Builds a selection result for a stand-in pick.
    #[must_use]
    pub fn as_temporary(&self, id: EndpointId) -> EndpointInfo {
        self.info(id, true)
    }

    fn info(&self, id: EndpointId, use_fallback_session_lifetime: bool) -> EndpointInfo {
        let endpoint = self.get(id);
        EndpointInfo {
            address: endpoint.address.clone(),
            secure: endpoint.secure,
            id,
            settings: SessionSettings { use_fallback_session_lifetime },
        }
    }

    /// Emits the status of every endpoint at debug level.
    pub fn log_endpoints(&self) {
        tracing::debug!(count = self.endpoints.len(), "reporting endpoint status");
        for endpoint in &self.endpoints {
            tracing::debug!(
                endpoint_id = %endpoint.id,
                address = %endpoint.address,
                status = %endpoint.status,
                "endpoint status"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn registry(n: usize) -> EndpointRegistry {
        EndpointRegistry::from_hosts((0..n).map(|i| format!("zk{i}:2181")))
    }

    #[test]
    fn test_parse_host_plain() {
        assert_eq!(parse_host("zk1:2181"), ("zk1:2181".to_owned(), false));
    }

    #[test]
    fn test_parse_host_secure_prefix_stripped() {
        assert_eq!(parse_host("secure://zk1:2281"), ("zk1:2281".to_owned(), true));
    }

    #[test]
    fn test_parse_host_prefix_only_at_start() {
        let (address, secure) = parse_host("zk1/secure://");
        assert_eq!(address, "zk1/secure://");
        assert!(!secure);
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut registry = EndpointRegistry::new();
        assert_eq!(registry.register("a", false), EndpointId::new(0));
        assert_eq!(registry.register("b", true), EndpointId::new(1));
        assert_eq!(registry.count(), 2);
        assert!(registry.get(EndpointId::new(1)).secure());
        assert_eq!(registry.get(EndpointId::new(0)).status(), EndpointStatus::Undefined);
    }

    #[test]
    fn test_from_hosts_strips_secure_prefix() {
        let registry = EndpointRegistry::from_hosts(["zk1:2181", "secure://zk2:2281"]);
        assert_eq!(registry.get(EndpointId::new(1)).address(), "zk2:2281");
        assert!(registry.get(EndpointId::new(1)).secure());
        assert!(!registry.get(EndpointId::new(0)).secure());
    }

    #[test]
    #[should_panic]
    fn test_get_out_of_range_panics() {
        let registry = registry(2);
        let _ = registry.get(EndpointId::new(2));
    }

    #[test]
    fn test_mark_is_idempotent() {
        let mut registry = registry(2);
        let id = EndpointId::new(1);
        registry.mark_offline(id);
        registry.mark_offline(id);
        assert_eq!(registry.get(id).status(), EndpointStatus::Offline);
        registry.mark_online(id);
        registry.mark_online(id);
        assert_eq!(registry.get(id).status(), EndpointStatus::Online);
    }

    #[test]
    fn test_reset_only_touches_offline() {
        let mut registry = registry(3);
        registry.mark_online(EndpointId::new(0));
        registry.mark_offline(EndpointId::new(1));

        registry.reset_offline_to_undefined();

        assert_eq!(registry.get(EndpointId::new(0)).status(), EndpointStatus::Online);
        assert_eq!(registry.get(EndpointId::new(1)).status(), EndpointStatus::Undefined);
        assert_eq!(registry.get(EndpointId::new(2)).status(), EndpointStatus::Undefined);
    }

    #[test]
    fn test_ids_with_status_in_registration_order() {
        let mut registry = registry(4);
        registry.mark_online(EndpointId::new(3));
        registry.mark_online(EndpointId::new(1));

        assert_eq!(
            registry.ids_with_status(EndpointStatus::Online),
            vec![EndpointId::new(1), EndpointId::new(3)]
        );
        assert_eq!(
            registry.ids_with_status(EndpointStatus::Undefined),
            vec![EndpointId::new(0), EndpointId::new(2)]
        );
        assert_eq!(registry.count_with_status(EndpointStatus::Offline), 0);
    }

    #[test]
    fn test_as_optimal_and_temporary() {
        let registry = EndpointRegistry::from_hosts(["secure://zk1:2281"]);
        let optimal = registry.as_optimal(EndpointId::new(0));
        let temporary = registry.as_temporary(EndpointId::new(0));

        assert!(optimal.is_optimal());
        assert!(!temporary.is_optimal());
        assert_eq!(optimal.address, "zk1:2281");
        assert!(optimal.secure);
        assert!(temporary.settings.use_fallback_session_lifetime);
    }
}
