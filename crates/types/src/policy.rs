//! Cache refetch policy and aggregate state enums.

use serde::{Deserialize, Serialize};

/// Rule governing whether a cache hit is treated as stale and re-fetched.
///
/// The policy only matters for settled entries: a loading entry is always
/// returned as-is, and an invalidated entry always refetches first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefetchPolicy {
    /// Always refetch on access.
    Refetch,
    /// Refetch only when the current state is an error.
    IfError,
    /// Refetch only when the entry's TTL has elapsed since it last settled.
    #[default]
    NoRefetch,
}

/// Aggregate state reported by a collection of tracked outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregateState {
    /// At least one tracked outcome is loading.
    AnyLoading,
    /// Every tracked outcome is idle or terminal.
    AllSettled,
}

impl AggregateState {
    /// Whether any tracked outcome is still loading.
    pub fn is_any_loading(self) -> bool {
        matches!(self, Self::AnyLoading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(RefetchPolicy::IfError).expect("serialize"),
            serde_json::json!("if-error")
        );
        assert_eq!(
            serde_json::from_value::<RefetchPolicy>(serde_json::json!("no-refetch")).expect("parse"),
            RefetchPolicy::NoRefetch
        );
    }
}
