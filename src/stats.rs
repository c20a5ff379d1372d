//! Pool occupancy and shadow-table counters.
//!
//! `Display` reproduces the textual two-line report of OpenFastPath's
//! `ofp_print_rt_stat`; `to_json` gives the same snapshot in structured
//! form for programmatic consumers.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// Current and peak occupancy of the IPv4 node pools, plus shadow rule
/// table occupancy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ipv4Stats {
    pub nodes_allocated: u32,
    pub max_nodes_allocated: u32,
    pub small_capacity: u32,
    pub large_capacity: u32,
    pub rules_used: u32,
    pub rules_capacity: u32,
}

impl fmt::Display for Ipv4Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "rt tree alloc now={} max={} total={}",
            self.nodes_allocated, self.max_nodes_allocated, self.small_capacity
        )?;
        write!(
            f,
            "rt rules used={} total={}",
            self.rules_used, self.rules_capacity
        )
    }
}

/// Current and peak occupancy of the IPv6 node pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ipv6Stats {
    pub nodes_allocated: u32,
    pub max_nodes_allocated: u32,
    pub capacity: u32,
}

impl fmt::Display for Ipv6Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rt6 tree alloc now={} max={} total={}",
            self.nodes_allocated, self.max_nodes_allocated, self.capacity
        )
    }
}

/// Combined snapshot handed to `print_stats`, mirroring the two-line shape
/// of `ofp_print_rt_stat`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Stats {
    pub v4: Ipv4Stats,
    pub v6: Ipv6Stats,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.v4)?;
        write!(f, "{}", self.v6)
    }
}

impl Stats {
    /// Emits the human-readable, `ofp_print_rt_stat`-shaped report to
    /// `sink`.
    pub fn print_to(&self, mut sink: impl fmt::Write) -> fmt::Result {
        write!(sink, "{self}")
    }

    /// Emits the structured (JSON) form of this snapshot, for programmatic
    /// consumption rather than a human-readable sink.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_counters_are_reported_verbatim() {
        let stats = Stats {
            v4: Ipv4Stats {
                nodes_allocated: 3,
                max_nodes_allocated: 5,
                small_capacity: 1024,
                large_capacity: 128,
                rules_used: 2,
                rules_capacity: 65536,
            },
            v6: Ipv6Stats {
                nodes_allocated: 4,
                max_nodes_allocated: 6,
                capacity: 65536,
            },
        };
        let rendered = stats.to_string();
        assert!(rendered.contains("now=3 max=5"));
        assert!(rendered.contains("now=4 max=6"));
        assert!(stats.to_json().unwrap().contains("\"nodes_allocated\":3"));
    }
}
