use serde::{Deserialize, Serialize};

/// Aggregation health for one manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetrics {
    pub total_sids: usize,
    pub received_sids: usize,
    pub missing_sids: usize,
    pub invalid_sigs: usize,
    pub duplicate_translations: usize,
    pub empty_translations: usize,
    pub schema_violations: usize,
}

impl ProcessingMetrics {
    pub fn new(total_sids: usize) -> Self {
        Self {
            total_sids,
            ..Self::default()
        }
    }

    /// Fraction of sids that received any content.
    pub fn coverage(&self) -> f64 {
        if self.total_sids == 0 {
            return 0.0;
        }
        self.received_sids as f64 / self.total_sids as f64
    }
}
