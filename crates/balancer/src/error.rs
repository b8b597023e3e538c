//! Balancer error types with failure classification.
//!
//! Provides a two-tier error model:
//! - **Per-endpoint errors**: resolution and connection failures that only
//!   affect one ensemble member and drive the retry loop
//! - **Terminal errors**: configuration problems and ensemble exhaustion that
//!   are returned to the caller of [`create_client`](crate::ConnectionBalancer::create_client)

use snafu::Snafu;

/// Result type alias for balancer operations.
pub type Result<T> = std::result::Result<T, BalancerError>;

/// Balancer error types with context-rich error messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BalancerError {
    /// Configuration validation error.
    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfiguration {
        /// Error description.
        message: String,
    },

    /// The host name does not exist.
    #[snafu(display("Cannot resolve host {address}: {message}"))]
    HostUnresolvable {
        /// Address as configured.
        address: String,
        /// Resolver error description.
        message: String,
    },

    /// Name resolution infrastructure is failing.
    #[snafu(display("DNS error while resolving {address}: {message}"))]
    ResolverUnavailable {
        /// Address as configured.
        address: String,
        /// Resolver error description.
        message: String,
    },

    /// The coordination-service client could not establish a session.
    #[snafu(display("Failed to connect to {address}: {message}"))]
    ConnectionFailed {
        /// Address the connection was attempted against.
        address: String,
        /// Connection error description.
        message: String,
    },

    /// Every endpoint is offline. Offline endpoints have already been reset
    /// to undefined when this is raised.
    #[snafu(display(
        "No available endpoints left. All offline endpoints are reset in undefined status. \
         Endpoints count is {endpoint_count}"
    ))]
    NoAvailableEndpoints {
        /// Total number of configured endpoints.
        endpoint_count: usize,
    },

    /// Every endpoint was exhausted and at least one failed on a DNS error.
    #[snafu(display(
        "Cannot resolve any of the {endpoint_count} provided hosts due to a DNS error"
    ))]
    DnsOutage {
        /// Total number of configured endpoints.
        endpoint_count: usize,
    },

    /// Every endpoint was exhausted without any DNS error.
    #[snafu(display("Cannot use any of the {endpoint_count} provided hosts"))]
    EnsembleUnreachable {
        /// Total number of configured endpoints.
        endpoint_count: usize,
    },

    /// A named balancer was used before `init`.
    #[snafu(display("Balancer '{name}' is not initialized"))]
    NotInitialized {
        /// Balancer name.
        name: String,
    },

    /// A named balancer was initialized twice.
    #[snafu(display("Balancer '{name}' is already initialized"))]
    AlreadyInitialized {
        /// Balancer name.
        name: String,
    },
}

impl BalancerError {
    /// Returns true if the error means the whole ensemble is currently
    /// unreachable.
    #[must_use]
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::NoAvailableEndpoints { .. }
                | Self::DnsOutage { .. }
                | Self::EnsembleUnreachable { .. }
        )
    }

    /// Returns the endpoint count carried by exhaustion errors.
    #[must_use]
    pub fn endpoint_count(&self) -> Option<usize> {
        match self {
            Self::NoAvailableEndpoints { endpoint_count }
            | Self::DnsOutage { endpoint_count }
            | Self::EnsembleUnreachable { endpoint_count } => Some(*endpoint_count),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_per_endpoint_errors_are_not_exhaustion() {
        let unresolvable = BalancerError::HostUnresolvable {
            address: "zk1:2181".to_owned(),
            message: "no such host".to_owned(),
        };
        let dns = BalancerError::ResolverUnavailable {
            address: "zk1:2181".to_owned(),
            message: "timed out".to_owned(),
        };
        let connect = BalancerError::ConnectionFailed {
            address: "zk1:2181".to_owned(),
            message: "connection refused".to_owned(),
        };

        for err in [unresolvable, dns, connect] {
            assert!(!err.is_exhaustion());
            assert_eq!(err.endpoint_count(), None);
        }
    }

    #[test]
    fn test_exhaustion_errors_are_terminal() {
        for err in [
            BalancerError::NoAvailableEndpoints { endpoint_count: 3 },
            BalancerError::DnsOutage { endpoint_count: 3 },
            BalancerError::EnsembleUnreachable { endpoint_count: 3 },
        ] {
            assert!(err.is_exhaustion());
            assert_eq!(err.endpoint_count(), Some(3));
        }
    }

    #[test]
    fn test_configuration_error_is_not_exhaustion() {
        let err = BalancerError::InvalidConfiguration { message: "no hosts".to_owned() };
        assert!(!err.is_exhaustion());
        assert_eq!(err.endpoint_count(), None);
    }

    #[test]
    fn test_exhaustion_messages_distinguish_dns() {
        let dns = BalancerError::DnsOutage { endpoint_count: 2 }.to_string();
        let unreachable = BalancerError::EnsembleUnreachable { endpoint_count: 2 }.to_string();

        assert!(dns.contains("DNS error"));
        assert!(!unreachable.contains("DNS"));
        assert!(unreachable.contains("Cannot use any"));
    }

    #[test]
    fn test_no_available_endpoints_reports_count() {
        let err = BalancerError::NoAvailableEndpoints { endpoint_count: 5 };
        assert!(err.to_string().contains("Endpoints count is 5"));
    }
}
