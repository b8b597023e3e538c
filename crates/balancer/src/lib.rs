//! Client-side endpoint selection and failover for coordination-service
//! ensembles.
//!
//! A coordination-service client is configured with the whole ensemble as a
//! list of `[secure://]host[:port]` strings. This crate decides which member
//! to open a session with, remembers which members recently failed, and
//! moves to the next candidate until a session is established or the whole
//! ensemble has been tried.
//!
//! # Features
//!
//! - **Pluggable selection**: random, round robin, first-or-random, and
//!   priority-ranked modes (in order, nearest host name, host name edit
//!   distance)
//! - **Fresh resolution**: every attempt re-resolves the host, so moved or
//!   retired members are noticed immediately
//! - **Temporary sessions**: stand-in connections get a shorter, randomized
//!   lifetime so they are dropped once the preferred member is back
//! - **Concurrent use**: one balancer serves many tasks; network I/O never
//!   runs under its lock
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use keeper_balancer::{BalancerConfig, ConnectionBalancer, DnsResolver, LoadBalancing};
//!
//! #[tokio::main]
//! async fn main() -> keeper_balancer::Result<()> {
//!     let balancer = ConnectionBalancer::new(
//!         "zookeeper",
//!         Arc::new(MyConnector::default()),
//!         Arc::new(DnsResolver::new()),
//!     );
//!     balancer.init(
//!         BalancerConfig::builder()
//!             .hosts(vec!["zk1.dc1:2181".to_owned(), "zk2.dc2:2181".to_owned()])
//!             .load_balancing(LoadBalancing::NearestHostname)
//!             .build()?,
//!     )
//!     .await?;
//!
//!     let client = balancer.create_client().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            BalancerRegistry (named, shared instances)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │              ConnectionBalancer (create_client)             │
//! │   Retry sweep │ Best-so-far upgrade │ Exhaustion errors     │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   SelectionPolicy (locked)   │   HostResolver │ Connector   │
//! │   Random │ RoundRobin │ ...  │   DNS lookups │ sessions     │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │              EndpointRegistry (status per member)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod balancer;
mod config;
mod connector;
mod endpoint;
mod error;
pub mod mock;
mod policy;
mod priority;
mod registry;
mod resolver;

// Public API exports
pub use balancer::ConnectionBalancer;
pub use config::{BalancerConfig, LoadBalancing, SessionLifetime};
pub use connector::{ConnectRequest, Connector};
pub use endpoint::{
    Endpoint, EndpointId, EndpointInfo, EndpointRegistry, EndpointStatus, SECURE_PREFIX,
    SessionSettings, parse_host,
};
pub use error::{BalancerError, Result};
pub use policy::{
    FirstOrRandomPolicy, PriorityPolicy, RandomPolicy, RoundRobinPolicy, SelectionPolicy,
    build_policy,
};
pub use priority::{
    PriorityCalculator, fqdn_or_host_name, host_name_prefix_distance, hostname_levenshtein,
    in_order, levenshtein_distance, local_host_name, nearest_hostname,
};
pub use registry::BalancerRegistry;
pub use resolver::{DnsResolver, HostResolver, local_fqdn};
