//! Seam to the coordination-service client library.

use std::time::Duration;

use async_trait::async_trait;

use crate::{config::SessionLifetime, endpoint::EndpointInfo, error::Result};

/// A single session attempt against one ensemble member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// The endpoint chosen by the selection policy.
    pub endpoint: EndpointInfo,
    /// Lifetime bounds the session should honor. Temporary picks always carry
    /// the fallback bounds.
    pub session_lifetime: Option<SessionLifetime>,
    /// Deadline drawn from `session_lifetime` for this attempt.
    pub session_deadline: Option<Duration>,
}

impl ConnectRequest {
    /// Returns the address to connect to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.endpoint.address
    }

    /// Returns true if the session must use TLS.
    #[must_use]
    pub fn secure(&self) -> bool {
        self.endpoint.secure
    }
}

/// Establishes sessions with ensemble members.
///
/// Implementations own connect timeouts; a failed or timed-out attempt is
/// reported as [`BalancerError::ConnectionFailed`](crate::BalancerError::ConnectionFailed)
/// and the balancer moves on to the next endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Established client handle.
    type Client: Send + 'static;

    /// Opens a session with the requested endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the session could not be established.
    async fn connect(&self, request: ConnectRequest) -> Result<Self::Client>;
}
