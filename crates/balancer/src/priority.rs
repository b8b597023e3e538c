//! Priority calculators for the priority-based selection policy.
//!
//! A calculator maps an endpoint and the local host identity to a cost; lower
//! is more preferred. Costs are computed once when the policy is built.

use crate::endpoint::Endpoint;

/// Fallback host identity when the machine host name is unavailable.
const UNKNOWN_HOST: &str = "localhost";

/// Computes the cost of an endpoint given the local host name.
pub trait PriorityCalculator: Send + Sync {
    /// Returns the endpoint's priority. Lower is more preferred.
    fn priority(&self, endpoint: &Endpoint, local_host: &str) -> usize;
}

impl<F> PriorityCalculator for F
where
    F: Fn(&Endpoint, &str) -> usize + Send + Sync,
{
    fn priority(&self, endpoint: &Endpoint, local_host: &str) -> usize {
        self(endpoint, local_host)
    }
}

/// Earlier-listed hosts are preferred.
#[must_use]
pub fn in_order(endpoint: &Endpoint, _local_host: &str) -> usize {
    endpoint.id().index()
}

/// Hosts sharing a longer leading prefix with the local host are preferred.
#[must_use]
pub fn nearest_hostname(endpoint: &Endpoint, local_host: &str) -> usize {
    host_name_prefix_distance(local_host, host_part(endpoint.address()))
}

/// Hosts whose names are fewer edits away from the local host are preferred.
#[must_use]
pub fn hostname_levenshtein(endpoint: &Endpoint, local_host: &str) -> usize {
    levenshtein_distance(local_host, host_part(endpoint.address()))
}

/// Returns the number of characters of the longer name that lie past the
/// common leading prefix of the two names.
#[must_use]
pub fn host_name_prefix_distance(local_host: &str, host: &str) -> usize {
    let local: Vec<char> = local_host.chars().collect();
    let other: Vec<char> = host.chars().collect();
    let common = local.iter().zip(&other).take_while(|(a, b)| a == b).count();
    local.len().max(other.len()) - common
}

/// Returns the Levenshtein edit distance between two names.
#[must_use]
pub fn levenshtein_distance(lhs: &str, rhs: &str) -> usize {
    let lhs: Vec<char> = lhs.chars().collect();
    let rhs: Vec<char> = rhs.chars().collect();

    if lhs.is_empty() {
        return rhs.len();
    }
    if rhs.is_empty() {
        return lhs.len();
    }

    // Single rolling row of the DP table.
    let mut row: Vec<usize> = (0..=rhs.len()).collect();
    for (i, a) in lhs.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, b) in rhs.iter().enumerate() {
            let above = row[j + 1];
            let substitution = diagonal + usize::from(a != b);
            row[j + 1] = substitution.min(above + 1).min(row[j] + 1);
            diagonal = above;
        }
    }
    row[rhs.len()]
}

/// Strips a trailing `:port` and IPv6 brackets from an address.
#[must_use]
pub fn host_part(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match address.rsplit_once(':') {
        // More than one colon without brackets is a bare IPv6 literal.
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => address,
    }
}

/// Returns the local host name, lower-cased.
///
/// Falls back to the `HOSTNAME` and `HOST` environment variables, then to
/// `localhost`.
#[must_use]
pub fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("HOST").ok())
        .unwrap_or_else(|| UNKNOWN_HOST.to_owned())
        .to_lowercase()
}

/// Returns the canonical name if there is one, otherwise `host_name`.
///
/// A trailing root dot is dropped and the result is lower-cased.
#[must_use]
pub fn fqdn_or_host_name(host_name: &str, canonical: Option<&str>) -> String {
    canonical
        .map(|name| name.trim_end_matches('.'))
        .filter(|name| !name.is_empty())
        .unwrap_or(host_name)
        .to_lowercase()
}
