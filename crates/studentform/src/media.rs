//! Media release consent form.
//!
//! The student's full name and national ID are mirrored into the media form
//! as they are typed, and the release date defaults to today.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FormConfig;
use crate::fields::{FieldId, FieldSet};

/// Form type tag stored on media release records.
pub const MEDIA_FORM_TYPE: &str = "media_release";

/// Media form fields that must all be filled.
pub const MEDIA_FIELDS: [FieldId; 4] = [
    FieldId::MediaFullName,
    FieldId::MediaIdNumber,
    FieldId::MediaDate,
    FieldId::MediaSignatureName,
];

/// Copy a student field into the media fields that mirror it. Returns the
/// media fields that were updated.
pub fn mirror_student_field(fields: &mut FieldSet, changed: FieldId) -> Vec<FieldId> {
    let targets: &[FieldId] = match changed {
        FieldId::FullName => &[FieldId::MediaFullName, FieldId::MediaSignatureName],
        FieldId::NationalId => &[FieldId::MediaIdNumber],
        _ => &[],
    };
    let value = fields.text(changed).to_string();
    for target in targets {
        fields.set_text(*target, value.clone());
    }
    targets.to_vec()
}

/// Set the release date to `today` unless one is already filled.
pub fn default_media_date(fields: &mut FieldSet, today: NaiveDate) {
    if !fields.is_filled(FieldId::MediaDate) {
        fields.set_text(FieldId::MediaDate, today.format("%Y-%m-%d").to_string());
    }
}

/// Labels of media fields that are still blank, in form order.
#[must_use]
pub fn missing_media_fields(fields: &FieldSet) -> Vec<String> {
    MEDIA_FIELDS
        .iter()
        .filter(|f| !fields.is_filled(**f))
        .map(|f| f.label().to_string())
        .collect()
}

/// Whether the media release form is complete.
#[must_use]
pub fn is_media_complete(fields: &FieldSet) -> bool {
    MEDIA_FIELDS.iter().all(|f| fields.is_filled(*f))
}

/// The media release document sent to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// Name of the person granting the release.
    pub full_name: String,
    /// Their national ID.
    pub id_number: String,
    /// Date of the release.
    pub date: String,
    /// Name typed as signature.
    pub signature_name: String,
    /// Always [`MEDIA_FORM_TYPE`].
    pub form_type: String,
    /// Form label from configuration.
    pub form_label: String,
    /// Issuing organization.
    pub organization: String,
    /// When the record was built.
    pub submission_date: DateTime<Utc>,
}

impl MediaRecord {
    /// Build a media record from the current fields.
    #[must_use]
    pub fn collect_at(form: &FormConfig, fields: &FieldSet, now: DateTime<Utc>) -> Self {
        let text = |f: FieldId| fields.value(f).unwrap_or_default().to_string();
        Self {
            full_name: text(FieldId::MediaFullName),
            id_number: text(FieldId::MediaIdNumber),
            date: text(FieldId::MediaDate),
            signature_name: text(FieldId::MediaSignatureName),
            form_type: MEDIA_FORM_TYPE.to_string(),
            form_label: form.media_form_label.clone(),
            organization: form.organization.clone(),
            submission_date: now,
        }
    }
}
