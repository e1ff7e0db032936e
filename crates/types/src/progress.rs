//! Progress payload attached to loading states.

use serde::{Deserialize, Serialize};

/// Partial progress report for an in-flight operation.
///
/// Updates are merged field-wise: a field present in the update overwrites
/// the stored one, an absent field leaves it untouched. This lets producers
/// report the ratio and the status line independently.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Completion ratio in `0.0..=1.0`, when the producer can estimate one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    /// Human-readable status line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Progress {
    /// Progress carrying only a completion ratio.
    pub fn ratio(ratio: f64) -> Self {
        Self {
            ratio: Some(ratio),
            message: None,
        }
    }

    /// Progress carrying only a status line.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            ratio: None,
            message: Some(message.into()),
        }
    }

    /// Merge an update into this report, field-wise.
    pub fn merge(&mut self, update: Progress) {
        if update.ratio.is_some() {
            self.ratio = update.ratio;
        }
        if update.message.is_some() {
            self.message = update.message;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_only_present_fields() {
        let mut report = Progress::message("resolving");
        report.merge(Progress::ratio(0.25));
        assert_eq!(report.ratio, Some(0.25));
        assert_eq!(report.message.as_deref(), Some("resolving"));

        report.merge(Progress::message("downloading"));
        assert_eq!(report.ratio, Some(0.25));
        assert_eq!(report.message.as_deref(), Some("downloading"));
    }
}
