//! Search Statistics
//!
//! Terminal statistics of a search. Statistics from several backends are
//! merged into one object whose `details` keep the per-node leaves.
//!
//! ```text
//!   merge(a, b)                      leaves(x)
//!   ├─ matches, bytes   : sum          x.details  if x is an anonymous aggregate
//!   ├─ durations        : max          [x]        otherwise
//!   ├─ rates            : bytes / duration
//!   └─ details          : leaves(a) ++ leaves(b)
//! ```
//!
//! Flattening anonymous aggregates keeps merging associative, and an
//! empty statistic is the identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistics of a finished search. Durations are in microseconds,
/// rates in MB/sec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stat {
    #[serde(default)]
    pub matches: u64,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub data_rate: f64,
    #[serde(default)]
    pub fabric_duration: u64,
    #[serde(default)]
    pub fabric_data_rate: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Stat>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl Stat {
    /// Create an empty statistic attributed to `host` (empty means none)
    pub fn new(host: &str) -> Self {
        Self {
            host: (!host.is_empty()).then(|| host.to_string()),
            ..Default::default()
        }
    }

    /// Build a leaf statistic from raw counters, computing both rates
    pub fn leaf(matches: u64, total_bytes: u64, duration: u64, fabric_duration: u64) -> Self {
        Self {
            matches,
            total_bytes,
            duration,
            data_rate: rate(total_bytes, duration),
            fabric_duration,
            fabric_data_rate: rate(total_bytes, fabric_duration),
            ..Default::default()
        }
    }

    /// True for the merge identity: no counters, no host, no details
    pub fn is_empty(&self) -> bool {
        self.matches == 0
            && self.total_bytes == 0
            && self.duration == 0
            && self.fabric_duration == 0
            && self.data_rate == 0.0
            && self.fabric_data_rate == 0.0
            && self.host.is_none()
            && self.details.is_empty()
    }

    /// Merge statistics of backends that ran in parallel
    pub fn merge(&self, other: &Stat) -> Stat {
        self.join(other, u64::max)
    }

    /// Combine statistics of stages that ran one after another
    pub fn combine(&self, other: &Stat) -> Stat {
        self.join(other, u64::saturating_add)
    }

    fn join(&self, other: &Stat, durations: fn(u64, u64) -> u64) -> Stat {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }

        let matches = self.matches.saturating_add(other.matches);
        let total_bytes = self.total_bytes.saturating_add(other.total_bytes);
        let duration = durations(self.duration, other.duration);
        let fabric_duration = durations(self.fabric_duration, other.fabric_duration);

        let mut details = self.leaves();
        details.extend(other.leaves());

        Stat {
            matches,
            total_bytes,
            duration,
            data_rate: rate(total_bytes, duration),
            fabric_duration,
            fabric_data_rate: rate(total_bytes, fabric_duration),
            details,
            host: None,
        }
    }

    fn leaves(&self) -> Vec<Stat> {
        if self.host.is_none() && !self.details.is_empty() {
            self.details.clone()
        } else {
            vec![self.clone()]
        }
    }
}

/// MB/sec for `bytes` processed in `micros` microseconds
fn rate(bytes: u64, micros: u64) -> f64 {
    if micros == 0 {
        return 0.0;
    }
    let mb = bytes as f64 / 1024.0 / 1024.0;
    let sec = micros as f64 / 1e6;
    mb / sec
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stat{{{} matches on {} bytes in {} us ({:.3} MB/s), fabric {} us ({:.3} MB/s)",
            self.matches,
            self.total_bytes,
            self.duration,
            self.data_rate,
            self.fabric_duration,
            self.fabric_data_rate
        )?;
        if let Some(host) = &self.host {
            write!(f, " on {}", host)?;
        }
        if !self.details.is_empty() {
            write!(f, ", details:[")?;
            for (i, d) in self.details.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", d)?;
            }
            write!(f, "]")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(host: &str, matches: u64, bytes: u64, duration: u64) -> Stat {
        Stat {
            host: Some(host.to_string()),
            ..Stat::leaf(matches, bytes, duration, duration / 2)
        }
    }

    #[test]
    fn test_merge_sums_and_max() {
        let a = node("a", 10, 1024 * 1024, 1_000_000);
        let b = node("b", 5, 1024 * 1024, 2_000_000);

        let m = a.merge(&b);
        assert_eq!(m.matches, 15);
        assert_eq!(m.total_bytes, 2 * 1024 * 1024);
        assert_eq!(m.duration, 2_000_000);
        assert_eq!(m.fabric_duration, 1_000_000);
        assert!((m.data_rate - 1.0).abs() < 1e-9);
        assert!((m.fabric_data_rate - 2.0).abs() < 1e-9);
        assert_eq!(m.host, None);
        assert_eq!(m.details, vec![a, b]);
    }

    #[test]
    fn test_merge_associative() {
        let a = node("a", 1, 100, 10);
        let b = node("b", 2, 200, 30);
        let c = node("c", 3, 300, 20);

        let left = a.merge(&b).merge(&c);
        let right = a.merge(&b.merge(&c));
        assert_eq!(left, right);
        assert_eq!(left.details.len(), 3);
    }

    #[test]
    fn test_merge_identity() {
        let a = node("a", 1, 100, 10);
        assert_eq!(a.merge(&Stat::default()), a);
        assert_eq!(Stat::default().merge(&a), a);

        let ab = a.merge(&node("b", 2, 3, 4));
        assert_eq!(ab.merge(&Stat::default()), ab);
    }

    #[test]
    fn test_attributed_aggregate_is_kept_whole() {
        let mut remote = node("x", 1, 1, 1).merge(&node("y", 1, 1, 1));
        remote.host = Some("peer".to_string());

        let m = node("local", 1, 1, 1).merge(&remote);
        assert_eq!(m.details.len(), 2);
        assert_eq!(m.details[1].details.len(), 2);
    }

    #[test]
    fn test_combine_sums_durations() {
        let a = Stat::leaf(1, 1024 * 1024, 500_000, 0);
        let b = Stat::leaf(1, 1024 * 1024, 1_500_000, 0);

        let c = a.combine(&b);
        assert_eq!(c.duration, 2_000_000);
        assert!((c.data_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_saturates_counters() {
        let a = node("a", u64::MAX, u64::MAX, 10);
        let b = node("b", 1, 1, 10);

        let m = a.merge(&b);
        assert_eq!(m.matches, u64::MAX);
        assert_eq!(m.total_bytes, u64::MAX);
        assert_eq!(m.details.len(), 2);

        let c = a.combine(&b);
        assert_eq!(c.matches, u64::MAX);
    }

    #[test]
    fn test_wire_names() {
        let s = Stat::new("h");
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("totalBytes").is_some());
        assert!(json.get("fabricDataRate").is_some());
        assert_eq!(json["host"], "h");
        assert!(json.get("details").is_none());
    }
}
