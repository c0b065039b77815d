//! Structured validation results.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::fields::FieldId;

/// A consent checkbox that must be ticked before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentItem {
    /// Consent to data processing.
    DataProcessing,
    /// Acknowledgment of data subject rights.
    RightsAcknowledgment,
}

impl ConsentItem {
    /// Both items, in form order.
    pub const ALL: [ConsentItem; 2] = [Self::DataProcessing, Self::RightsAcknowledgment];

    /// Label shown when the item is missing.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DataProcessing => "Data processing consent",
            Self::RightsAcknowledgment => "Rights acknowledgment",
        }
    }

    /// The checkbox backing this item.
    #[must_use]
    pub fn field(self) -> FieldId {
        match self {
            Self::DataProcessing => FieldId::DataConsent,
            Self::RightsAcknowledgment => FieldId::DataRights,
        }
    }
}

impl fmt::Display for ConsentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What went wrong with one entry of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A required field is empty.
    Missing,
    /// The birth date is unparseable or out of the accepted age range.
    DateOfBirth,
    /// At least one filled phone number is malformed.
    PhoneNumbers,
    /// The national ID has the wrong shape.
    NationalId,
    /// The KCSE year is out of range.
    KcseYear,
}

impl IssueKind {
    /// Label used in the itemized list for format issues.
    #[must_use]
    pub fn format_label(self) -> Option<&'static str> {
        match self {
            Self::Missing => None,
            Self::DateOfBirth => Some("Valid Date of Birth"),
            Self::PhoneNumbers => Some("Valid Phone Numbers"),
            Self::NationalId => Some("Valid National ID"),
            Self::KcseYear => Some("Valid KCSE Year"),
        }
    }
}

/// One entry of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Kind of issue.
    pub kind: IssueKind,
    /// Label shown to the user.
    pub label: String,
    /// Fields that caused the issue.
    pub fields: Vec<FieldId>,
}

/// Result of the required-field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredCheck {
    /// Whether every required field is filled.
    pub valid: bool,
    /// Labels of missing fields, in form order. `County` appears at most once.
    pub missing: Vec<String>,
    /// The missing fields.
    #[serde(skip)]
    pub fields: Vec<FieldId>,
}

/// Full validation result for a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
    #[serde(skip)]
    field_results: BTreeMap<FieldId, bool>,
}

impl ValidationReport {
    pub(crate) fn new(issues: Vec<ValidationIssue>, field_results: BTreeMap<FieldId, bool>) -> Self {
        Self {
            issues,
            field_results,
        }
    }

    /// Whether the form passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// All issues, missing fields first.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Labels of every issue.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.label.clone()).collect()
    }

    /// Labels of missing required fields only.
    #[must_use]
    pub fn missing(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| i.kind == IssueKind::Missing)
            .map(|i| i.label.as_str())
            .collect()
    }

    /// Per-field outcome, for fields that have a rule.
    #[must_use]
    pub fn field_result(&self, field: FieldId) -> Option<bool> {
        self.field_results.get(&field).copied()
    }

    /// Every field outcome, in form order.
    pub fn field_results(&self) -> impl Iterator<Item = (FieldId, bool)> + '_ {
        self.field_results.iter().map(|(f, ok)| (*f, *ok))
    }

    /// The first invalid field in form order.
    #[must_use]
    pub fn first_invalid(&self) -> Option<FieldId> {
        self.field_results
            .iter()
            .find(|(_, ok)| !**ok)
            .map(|(field, _)| *field)
    }

    /// Message listing every issue.
    #[must_use]
    pub fn user_message(&self) -> String {
        format!(
            "Form Validation Error\n\nPlease fill in all required fields:\n\n• {}",
            self.labels().join("\n• ")
        )
    }
}
