//! Change detection against the latest stored snapshot

use crate::models::{Probabilities, ProbabilityField, Snapshot};

/// Values closer than this are the same observation. Source percentages
/// move in steps of 0.01, well above percent/100 rounding noise.
pub const CHANGE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    tolerance: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            tolerance: CHANGE_TOLERANCE,
        }
    }
}

impl ChangeDetector {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// True when there is no prior snapshot or any field moved by more than
    /// the tolerance
    pub fn has_changed(&self, current: &Probabilities, prior: Option<&Snapshot>) -> bool {
        match prior {
            None => true,
            Some(prior) => !self.changed_fields(current, &prior.probabilities).is_empty(),
        }
    }

    pub fn changed_fields(
        &self,
        current: &Probabilities,
        prior: &Probabilities,
    ) -> Vec<ProbabilityField> {
        ProbabilityField::ALL
            .into_iter()
            .filter(|f| (current.get(*f) - prior.get(*f)).abs() > self.tolerance)
            .collect()
    }
}
