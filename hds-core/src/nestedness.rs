use serde::{Deserialize, Serialize};

use crate::basin::BasinId;

/// Where a gauged catchment sits among the other gauges of its network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nestedness {
    pub basin: BasinId,
    /// Whether another gauge lies downstream of this one.
    pub is_nested: bool,
    pub stations_downstream: Option<u32>,
    /// Closest gauge downstream.
    pub next_downstream: Option<BasinId>,
    /// Stream length to `next_downstream`, in km.
    pub distance_downstream_km: Option<f64>,
    /// Gauges whose catchments lie inside this one.
    pub nested_within: Vec<BasinId>,
}

impl Nestedness {
    pub fn nested_count(&self) -> usize {
        self.nested_within.len()
    }
}

/// Parse a published yes/no flag: `True`, `1`, `yes` and their negatives.
pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Split a list of gauge codes. Published lists use commas, pipes or
/// whitespace and may be wrapped in brackets and quotes.
pub fn parse_id_list(s: &str) -> Vec<BasinId> {
    s.split(|c: char| c == ',' || c == '|' || c.is_whitespace())
        .map(|id| id.trim_matches(|c: char| matches!(c, '[' | ']' | '\'' | '"')))
        .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("nan"))
        .map(BasinId::from)
        .collect()
}
