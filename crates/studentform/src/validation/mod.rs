//! Form validation: required fields, formats, age and consent.
//!
//! [`Validator`] never mutates the form. It returns structured results that
//! the session feeds into a [`ValidationTracker`].

pub mod report;
pub mod rules;
pub mod tracker;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

pub use report::{ConsentItem, IssueKind, RequiredCheck, ValidationIssue, ValidationReport};
pub use rules::{format_phone, FormatRule, REQUIRED_FIELDS};
pub use tracker::{FieldState, ValidationTracker};

use crate::config::ValidationConfig;
use crate::error::{Error, Result};
use crate::fields::{FieldId, FieldSet, PHONE_FIELDS};
use crate::location::LocationSelection;

/// Applies the configured rules to a field set.
#[derive(Debug)]
pub struct Validator {
    config: ValidationConfig,
    phone: FormatRule,
}

impl Validator {
    /// Create a validator with the given bounds.
    #[must_use]
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            config: config.clone(),
            phone: rules::kenyan_mobile(),
        }
    }

    /// Whether `number` is a Kenyan mobile number, ignoring whitespace.
    #[must_use]
    pub fn validate_phone(&self, number: &str) -> bool {
        self.phone.matches(&rules::strip_whitespace(number))
    }

    /// Normalize a valid mobile number to `+2547XXXXXXXX`.
    #[must_use]
    pub fn format_phone(&self, number: &str) -> Option<String> {
        format_phone(&self.phone, number)
    }

    /// Whether `id` is numeric with an accepted number of digits.
    #[must_use]
    pub fn validate_national_id(&self, id: &str) -> bool {
        rules::is_national_id(
            id.trim(),
            self.config.national_id_min_digits,
            self.config.national_id_max_digits,
        )
    }

    /// Whether the birth date gives an accepted age on `today`.
    #[must_use]
    pub fn validate_age(&self, dob: &str, today: NaiveDate) -> bool {
        rules::is_age_within(dob, today, self.config.min_age, self.config.max_age)
    }

    /// Whether an optional KCSE year is acceptable. Blank is accepted.
    #[must_use]
    pub fn validate_kcse_year(&self, year: &str, today: NaiveDate) -> bool {
        year.trim().is_empty() || rules::is_kcse_year(year, today, self.config.kcse_min_year)
    }

    /// Check the fixed list of required fields. The county additionally
    /// needs a resolved selection; it is reported at most once.
    #[must_use]
    pub fn validate_required(&self, fields: &FieldSet, selection: &LocationSelection) -> RequiredCheck {
        let mut missing_fields: Vec<FieldId> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !fields.is_filled(*f))
            .collect();

        if !selection.has_county() && !missing_fields.contains(&FieldId::County) {
            let at = missing_fields
                .iter()
                .position(|f| *f > FieldId::County)
                .unwrap_or(missing_fields.len());
            missing_fields.insert(at, FieldId::County);
        }

        RequiredCheck {
            valid: missing_fields.is_empty(),
            missing: missing_fields.iter().map(|f| f.label().to_string()).collect(),
            fields: missing_fields,
        }
    }

    /// Items of the consent section that are not ticked.
    #[must_use]
    pub fn missing_consent(&self, fields: &FieldSet) -> Vec<ConsentItem> {
        ConsentItem::ALL
            .into_iter()
            .filter(|item| !fields.is_checked(item.field()))
            .collect()
    }

    /// Require both consent items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Consent`] naming the unticked items.
    pub fn validate_consent(&self, fields: &FieldSet) -> Result<()> {
        let missing = self.missing_consent(fields);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Consent { missing })
        }
    }

    /// Check one field, as on blur. Returns `None` when no rule applies to
    /// the field's current value.
    #[must_use]
    pub fn validate_field(
        &self,
        field: FieldId,
        fields: &FieldSet,
        selection: &LocationSelection,
        today: NaiveDate,
    ) -> Option<bool> {
        let required = REQUIRED_FIELDS.contains(&field);
        let Some(value) = fields.value(field) else {
            return required.then_some(false);
        };

        let ok = match field {
            FieldId::County => selection.has_county(),
            FieldId::DateOfBirth => self.validate_age(value, today),
            FieldId::NationalId => self.validate_national_id(value),
            FieldId::KcseYear => self.validate_kcse_year(value, today),
            f if PHONE_FIELDS.contains(&f) => self.validate_phone(value),
            _ if required => true,
            _ => return None,
        };
        Some(ok)
    }

    /// Check the whole student form: required fields first, then formats.
    #[must_use]
    pub fn validate_form(
        &self,
        fields: &FieldSet,
        selection: &LocationSelection,
        today: NaiveDate,
    ) -> ValidationReport {
        let required = self.validate_required(fields, selection);
        let mut issues: Vec<ValidationIssue> = required
            .fields
            .iter()
            .map(|f| ValidationIssue {
                kind: IssueKind::Missing,
                label: f.label().to_string(),
                fields: vec![*f],
            })
            .collect();

        let mut results = BTreeMap::new();
        for field in FieldId::ALL {
            if let Some(ok) = self.validate_field(*field, fields, selection, today) {
                results.insert(*field, ok);
            }
        }

        let filled_and_invalid =
            |field: FieldId| fields.value(field).is_some() && results.get(&field) == Some(&false);

        let format_checks = [
            (IssueKind::DateOfBirth, vec![FieldId::DateOfBirth]),
            (IssueKind::PhoneNumbers, PHONE_FIELDS.to_vec()),
            (IssueKind::NationalId, vec![FieldId::NationalId]),
            (IssueKind::KcseYear, vec![FieldId::KcseYear]),
        ];
        for (kind, candidates) in format_checks {
            let bad: Vec<FieldId> = candidates
                .into_iter()
                .filter(|f| filled_and_invalid(*f))
                .collect();
            if bad.is_empty() {
                continue;
            }
            if let Some(label) = kind.format_label() {
                issues.push(ValidationIssue {
                    kind,
                    label: label.to_string(),
                    fields: bad,
                });
            }
        }

        let report = ValidationReport::new(issues, results);
        debug!(
            valid = report.is_valid(),
            issues = report.issues().len(),
            "Validated form"
        );
        report
    }
}
