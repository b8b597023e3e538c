//! Balancer configuration.
//!
//! A [`BalancerConfig`] is either built in code through its validating
//! builder or deserialized (for example from an application config file)
//! and then checked with [`BalancerConfig::validate`].
//!
//! Durations are written in humantime form (`"3h"`, `"90m"`).

use std::{fmt, str::FromStr, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::{
    endpoint::parse_host,
    error::{BalancerError, InvalidConfigurationSnafu, Result},
};

/// Default lower bound of a temporary session's lifetime (3 hours).
const DEFAULT_FALLBACK_MIN: Duration = Duration::from_secs(3 * 60 * 60);

/// Default upper bound of a temporary session's lifetime (6 hours).
const DEFAULT_FALLBACK_MAX: Duration = Duration::from_secs(6 * 60 * 60);

fn default_fallback_session_lifetime() -> SessionLifetime {
    SessionLifetime { min: DEFAULT_FALLBACK_MIN, max: DEFAULT_FALLBACK_MAX }
}

// =============================================================================
// Load balancing mode
// =============================================================================

/// Endpoint selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancing {
    /// Uniform random choice.
    #[default]
    Random,
    /// Rotate through the endpoints.
    RoundRobin,
    /// First endpoint, random stand-in while it is down.
    FirstOrRandom,
    /// Earlier-listed endpoints preferred.
    InOrder,
    /// Endpoints sharing a longer name prefix with this host preferred.
    NearestHostname,
    /// Endpoints with a smaller name edit distance to this host preferred.
    HostnameLevenshteinDistance,
}

impl LoadBalancing {
    /// Every mode, in declaration order.
    pub const ALL: &'static [LoadBalancing] = &[
        LoadBalancing::Random,
        LoadBalancing::RoundRobin,
        LoadBalancing::FirstOrRandom,
        LoadBalancing::InOrder,
        LoadBalancing::NearestHostname,
        LoadBalancing::HostnameLevenshteinDistance,
    ];

    /// Returns the snake_case name used in configuration files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LoadBalancing::Random => "random",
            LoadBalancing::RoundRobin => "round_robin",
            LoadBalancing::FirstOrRandom => "first_or_random",
            LoadBalancing::InOrder => "in_order",
            LoadBalancing::NearestHostname => "nearest_hostname",
            LoadBalancing::HostnameLevenshteinDistance => "hostname_levenshtein_distance",
        }
    }

    /// Returns true for modes that rank endpoints by their distance from the
    /// local host name.
    #[must_use]
    pub const fn uses_local_host(&self) -> bool {
        matches!(self, LoadBalancing::NearestHostname | LoadBalancing::HostnameLevenshteinDistance)
    }
}

impl fmt::Display for LoadBalancing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadBalancing {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self> {
        for mode in Self::ALL {
            if mode.as_str() == s {
                return Ok(*mode);
            }
        }
        InvalidConfigurationSnafu { message: format!("unknown load balancing mode: {s}") }.fail()
    }
}

// =============================================================================
// Session lifetime
// =============================================================================

/// Bounds on how long a session may live before the client drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLifetime {
    /// Shortest allowed lifetime. Must be > 0.
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    /// Longest allowed lifetime. Must be >= `min`.
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl SessionLifetime {
    /// Creates validated lifetime bounds.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::InvalidConfiguration`] if `min` is zero or
    /// greater than `max`.
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        let lifetime = Self { min, max };
        lifetime.validate()?;
        Ok(lifetime)
    }

    /// Validates the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::InvalidConfiguration`] if `min` is zero or
    /// greater than `max`.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.min.is_zero(),
            InvalidConfigurationSnafu { message: "session lifetime min must be > 0" }
        );
        ensure!(
            self.min <= self.max,
            InvalidConfigurationSnafu {
                message: format!(
                    "session lifetime min ({}) exceeds max ({})",
                    humantime::format_duration(self.min),
                    humantime::format_duration(self.max)
                ),
            }
        );
        Ok(())
    }

    /// Draws a deadline uniformly from `[min, max]`.
    ///
    /// Spreading deadlines keeps temporary sessions across a fleet from
    /// expiring together.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rand::rng().random_range(self.min..=self.max)
    }
}

impl Default for SessionLifetime {
    fn default() -> Self {
        default_fallback_session_lifetime()
    }
}

// =============================================================================
// Balancer configuration
// =============================================================================

/// Configuration of one connection balancer.
///
/// # Example
///
/// ```no_run
/// # use keeper_balancer::{BalancerConfig, LoadBalancing};
/// let config = BalancerConfig::builder()
///     .hosts(vec!["zk1.dc1:2181".to_owned(), "secure://zk2.dc2:2281".to_owned()])
///     .load_balancing(LoadBalancing::NearestHostname)
///     .build()
///     .expect("valid balancer config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Ensemble members as `[secure://]host[:port]`, in preference order.
    pub hosts: Vec<String>,
    /// Selection strategy.
    #[serde(default)]
    pub load_balancing: LoadBalancing,
    /// Lifetime bounds for optimal sessions. `None` leaves the session
    /// unbounded.
    #[serde(default)]
    pub session_lifetime: Option<SessionLifetime>,
    /// Lifetime bounds for temporary sessions.
    #[serde(default = "default_fallback_session_lifetime")]
    pub fallback_session_lifetime: SessionLifetime,
    /// Overrides the machine host name used by hostname-based modes.
    #[serde(default)]
    pub local_host_name: Option<String>,
}

#[bon::bon]
impl BalancerConfig {
    /// Creates a new balancer configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::InvalidConfiguration`] if the host list is
    /// empty, a host entry is blank, or a lifetime range is invalid.
    #[builder]
    pub fn new(
        hosts: Vec<String>,
        #[builder(default)] load_balancing: LoadBalancing,
        session_lifetime: Option<SessionLifetime>,
        #[builder(default = default_fallback_session_lifetime())]
        fallback_session_lifetime: SessionLifetime,
        #[builder(into)] local_host_name: Option<String>,
    ) -> Result<Self> {
        let config = Self {
            hosts,
            load_balancing,
            session_lifetime,
            fallback_session_lifetime,
            local_host_name,
        };
        config.validate()?;
        Ok(config)
    }
}

impl BalancerConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`BalancerError::InvalidConfiguration`] if any value is out of
    /// range.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.hosts.is_empty(),
            InvalidConfigurationSnafu { message: "at least one host is required" }
        );
        for (index, host) in self.hosts.iter().enumerate() {
            let (address, _) = parse_host(host.trim());
            ensure!(
                !address.is_empty(),
                InvalidConfigurationSnafu { message: format!("host #{index} is empty") }
            );
        }
        if let Some(lifetime) = &self.session_lifetime {
            lifetime.validate()?;
        }
        self.fallback_session_lifetime.validate()
    }

    /// Returns the configured local host identity, lower-cased.
    #[must_use]
    pub fn local_host_override(&self) -> Option<String> {
        self.local_host_name.as_deref().map(str::to_lowercase)
    }
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
