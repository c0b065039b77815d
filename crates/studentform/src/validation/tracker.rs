//! Per-field presentation state.
//!
//! ```text
//! Untouched --input--> Touched --blur/submit--> Valid | Invalid
//!                         ^                          |
//!                         +---------- input ---------+
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use super::report::ValidationReport;
use crate::fields::FieldId;

/// Presentation state of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Never edited or checked.
    #[default]
    Untouched,
    /// Edited since the last check.
    Touched,
    /// Passed its last check.
    Valid,
    /// Failed its last check.
    Invalid,
}

/// Tracks [`FieldState`] for every field of a session.
#[derive(Debug, Clone, Default)]
pub struct ValidationTracker {
    states: BTreeMap<FieldId, FieldState>,
}

impl ValidationTracker {
    /// Create a tracker with every field untouched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a field.
    #[must_use]
    pub fn state(&self, field: FieldId) -> FieldState {
        self.states.get(&field).copied().unwrap_or_default()
    }

    /// The field was edited. Clears any previous verdict.
    pub fn on_input(&mut self, field: FieldId) {
        self.states.insert(field, FieldState::Touched);
    }

    /// Record the outcome of checking a single field. `None` means the
    /// field has no rule that applies to its current value.
    pub fn on_checked(&mut self, field: FieldId, outcome: Option<bool>) {
        let state = match outcome {
            Some(true) => FieldState::Valid,
            Some(false) => FieldState::Invalid,
            None => return,
        };
        self.states.insert(field, state);
    }

    /// Record every field outcome of a full-form check.
    pub fn apply_report(&mut self, report: &ValidationReport) {
        for (field, ok) in report.field_results() {
            self.on_checked(field, Some(ok));
        }
    }

    /// Fields currently marked invalid, in form order.
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<FieldId> {
        self.states
            .iter()
            .filter(|(_, state)| **state == FieldState::Invalid)
            .map(|(field, _)| *field)
            .collect()
    }

    /// The first invalid field in form order.
    #[must_use]
    pub fn first_invalid(&self) -> Option<FieldId> {
        self.invalid_fields().into_iter().next()
    }

    /// Return every field to untouched.
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut tracker = ValidationTracker::new();
        assert_eq!(tracker.state(FieldId::FullName), FieldState::Untouched);

        tracker.on_input(FieldId::FullName);
        assert_eq!(tracker.state(FieldId::FullName), FieldState::Touched);

        tracker.on_checked(FieldId::FullName, Some(false));
        assert_eq!(tracker.state(FieldId::FullName), FieldState::Invalid);

        tracker.on_input(FieldId::FullName);
        assert_eq!(tracker.state(FieldId::FullName), FieldState::Touched);

        tracker.on_checked(FieldId::FullName, Some(true));
        assert_eq!(tracker.state(FieldId::FullName), FieldState::Valid);
    }

    #[test]
    fn test_check_without_rule_keeps_state() {
        let mut tracker = ValidationTracker::new();
        tracker.on_checked(FieldId::Religion, None);
        assert_eq!(tracker.state(FieldId::Religion), FieldState::Untouched);
    }

    #[test]
    fn test_first_invalid_in_form_order() {
        let mut tracker = ValidationTracker::new();
        tracker.on_checked(FieldId::Emergency1Phone, Some(false));
        tracker.on_checked(FieldId::PhoneNumber, Some(false));
        tracker.on_checked(FieldId::FullName, Some(true));

        assert_eq!(tracker.first_invalid(), Some(FieldId::PhoneNumber));
        assert_eq!(
            tracker.invalid_fields(),
            vec![FieldId::PhoneNumber, FieldId::Emergency1Phone]
        );

        tracker.reset();
        assert!(tracker.first_invalid().is_none());
    }
}
