//! The form session: all live state of one registration in progress.
//!
//! A [`FormSession`] owns the field values, the location cascade, the
//! per-field validation state and the auto-save debouncer. Submissions go
//! through a [`Submitter`], which can be cloned and shared; only one
//! submission runs at a time and a second concurrent attempt is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::draft::{Debouncer, DraftManager};
use crate::error::{Error, Result};
use crate::fields::{FieldId, FieldSet, FieldValue, FormKind, FormProgress, LOCATION_FIELDS};
use crate::location::{
    CountyId, DataSource, LocationCascade, LocationHierarchy, LocationSelection, SubCountyId,
    WardId,
};
use crate::media::{self, MediaRecord};
use crate::record::{FieldAggregator, SubmissionRecord};
use crate::stats::update_daily_stats;
use crate::store::DocumentStore;
use crate::validation::{
    ConsentItem, FieldState, ValidationReport, ValidationTracker, Validator,
};

/// Records ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedSubmission {
    /// The student registration.
    pub student: SubmissionRecord,
    /// The media release, when one is required.
    pub media: Option<MediaRecord>,
}

/// What happened to a submit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Both records were stored.
    Submitted {
        /// Id of the student document.
        student_id: String,
        /// Id of the media document, if one was written.
        media_id: Option<String>,
    },
    /// Another submission was running; this one was dropped.
    AlreadyInProgress,
}

/// Holds the in-progress flag for as long as it lives.
#[derive(Debug)]
struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SubmitGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Writes prepared submissions to the document store.
#[derive(Debug, Clone)]
pub struct Submitter {
    config: Arc<Config>,
    store: Arc<dyn DocumentStore>,
    drafts: DraftManager,
    submitting: Arc<AtomicBool>,
}

impl Submitter {
    /// Create a submitter.
    pub fn new(config: Arc<Config>, store: Arc<dyn DocumentStore>, drafts: DraftManager) -> Self {
        Self {
            config,
            store,
            drafts,
            submitting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a submission is running.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Store the student record, update today's stats, store the media
    /// record and clear the draft.
    ///
    /// Stats failures are logged only. Nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Submission`] if either record cannot be stored, or
    /// an error if a record cannot be serialized.
    pub async fn submit(&self, prepared: &PreparedSubmission) -> Result<SubmitOutcome> {
        let Some(_guard) = SubmitGuard::try_acquire(&self.submitting) else {
            debug!("Submission already in progress, dropping request");
            return Ok(SubmitOutcome::AlreadyInProgress);
        };
        let names = &self.config.submission;

        let student_id = self
            .store
            .add(&names.student_collection, serde_json::to_value(&prepared.student)?)
            .await
            .map_err(|e| {
                warn!(error = %e, "Student record rejected");
                Error::Submission(e.into_submission_failure(&names.student_collection))
            })?;
        info!(id = %student_id, "Student record stored");

        if let Err(e) = update_daily_stats(
            self.store.as_ref(),
            &names.stats_collection,
            &prepared.student,
            prepared.student.metadata.submission_date,
        )
        .await
        {
            warn!(error = %e, "Failed to update daily stats");
        }

        let media_id = match &prepared.media {
            Some(media) => {
                let id = self
                    .store
                    .add(&names.media_collection, serde_json::to_value(media)?)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Media release record rejected");
                        Error::Submission(e.into_submission_failure(&names.media_collection))
                    })?;
                info!(id = %id, "Media release record stored");
                Some(id)
            }
            None => None,
        };

        self.drafts.clear();
        Ok(SubmitOutcome::Submitted {
            student_id,
            media_id,
        })
    }
}

/// Live state of one registration.
#[derive(Debug)]
pub struct FormSession {
    config: Arc<Config>,
    validator: Validator,
    fields: FieldSet,
    cascade: LocationCascade,
    tracker: ValidationTracker,
    drafts: DraftManager,
    debouncer: Debouncer,
    submitter: Submitter,
}

impl FormSession {
    /// Start an empty session.
    pub fn new(
        config: Arc<Config>,
        hierarchy: Arc<LocationHierarchy>,
        drafts: DraftManager,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let submitter = Submitter::new(config.clone(), store, drafts.clone());
        Self {
            validator: Validator::new(&config.validation),
            fields: FieldSet::new(),
            cascade: LocationCascade::new(hierarchy),
            tracker: ValidationTracker::new(),
            debouncer: Debouncer::new(config.autosave_debounce()),
            drafts,
            submitter,
            config,
        }
    }

    /// Current field values.
    #[must_use]
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// The location cascade.
    #[must_use]
    pub fn cascade(&self) -> &LocationCascade {
        &self.cascade
    }

    /// The current location selection.
    #[must_use]
    pub fn selection(&self) -> &LocationSelection {
        self.cascade.selection()
    }

    /// Presentation state of a field.
    #[must_use]
    pub fn field_state(&self, field: FieldId) -> FieldState {
        self.tracker.state(field)
    }

    /// A handle that can submit independently of this session.
    #[must_use]
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Fill progress of one form.
    #[must_use]
    pub fn progress(&self, form: FormKind) -> FormProgress {
        self.fields.progress(form)
    }

    /// Type into a text field. Location dropdowns go through the
    /// `select_*` methods instead.
    pub fn set_text(&mut self, field: FieldId, value: impl Into<String>, now: Instant) {
        if LOCATION_FIELDS.contains(&field) {
            debug!(field = %field, "Location fields are set through the cascade");
            return;
        }
        self.fields.set_text(field, value);
        self.tracker.on_input(field);
        for mirrored in media::mirror_student_field(&mut self.fields, field) {
            self.tracker.on_input(mirrored);
        }
        self.debouncer.on_input(now);
    }

    /// Tick or untick a checkbox.
    pub fn set_checked(&mut self, field: FieldId, checked: bool, now: Instant) {
        self.fields.set_checked(field, checked);
        self.tracker.on_input(field);
        self.debouncer.on_input(now);
    }

    /// Check one field as it loses focus.
    pub fn blur(&mut self, field: FieldId, now: DateTime<Utc>) -> Option<bool> {
        let outcome = self.validator.validate_field(
            field,
            &self.fields,
            self.cascade.selection(),
            now.date_naive(),
        );
        self.tracker.on_checked(field, outcome);
        outcome
    }

    /// Choose a county and populate its sub-counties.
    pub fn select_county(&mut self, id: Option<&CountyId>, now: Instant) {
        self.cascade.choose_county(id);
        self.sync_location_fields();
        self.tracker.on_input(FieldId::County);
        self.debouncer.on_input(now);
    }

    /// Choose a sub-county, which also fixes the constituency.
    pub fn select_sub_county(&mut self, id: Option<&SubCountyId>, now: Instant) {
        self.cascade.choose_sub_county(id);
        self.sync_location_fields();
        self.tracker.on_input(FieldId::SubCounty);
        self.debouncer.on_input(now);
    }

    /// Choose a ward.
    pub fn select_ward(&mut self, id: Option<&WardId>, now: Instant) {
        self.cascade.select_ward(id);
        self.sync_location_fields();
        self.tracker.on_input(FieldId::Ward);
        self.debouncer.on_input(now);
    }

    /// Save the draft if input has been quiet long enough. Returns whether
    /// a draft was written.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.debouncer.poll(now) && self.drafts.save(&self.fields)
    }

    /// Save the draft now, as when the page is closed.
    pub fn save_draft(&mut self) -> bool {
        self.debouncer.flush();
        self.drafts.save(&self.fields)
    }

    /// Load the stored draft, replaying the location cascade. Selections
    /// the current location data no longer offers are dropped. Returns
    /// whether a draft was found.
    pub fn restore_draft(&mut self, now: DateTime<Utc>) -> bool {
        let Some(snapshot) = self.drafts.load() else {
            media::default_media_date(&mut self.fields, now.date_naive());
            return false;
        };
        self.load_fields(snapshot.to_fields(), now);
        info!(fields = snapshot.len(), "Draft restored");
        true
    }

    /// Replace every field value, replaying the location cascade from the
    /// stored county, sub-county and ward ids.
    pub fn load_fields(&mut self, fields: FieldSet, now: DateTime<Utc>) {
        let county = fields.value(FieldId::County).map(CountyId::from);
        let sub_county = fields.value(FieldId::SubCounty).map(SubCountyId::from);
        let ward = fields.value(FieldId::Ward).map(WardId::from);

        self.fields = fields;
        self.tracker.reset();
        self.cascade
            .replay(county.as_ref(), sub_county.as_ref(), ward.as_ref());
        self.sync_location_fields();
        media::default_media_date(&mut self.fields, now.date_naive());
    }

    /// Empty both forms and remove the draft.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.fields.clear();
        self.cascade.reset();
        self.tracker.reset();
        self.debouncer.flush();
        self.drafts.clear();
        media::default_media_date(&mut self.fields, now.date_naive());
    }

    /// Validate the whole student form and mark every checked field.
    pub fn check(&mut self, now: DateTime<Utc>) -> ValidationReport {
        let report =
            self.validator
                .validate_form(&self.fields, self.cascade.selection(), now.date_naive());
        self.tracker.apply_report(&report);
        report
    }

    /// Consent items still unticked.
    #[must_use]
    pub fn missing_consent(&self) -> Vec<ConsentItem> {
        self.validator.missing_consent(&self.fields)
    }

    /// Labels of blank media release fields. Empty when no release is
    /// required.
    #[must_use]
    pub fn missing_media(&self) -> Vec<String> {
        if self.config.form.require_media_release {
            media::missing_media_fields(&self.fields)
        } else {
            Vec::new()
        }
    }

    /// Run every pre-submission check and build the records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`], [`Error::Consent`] or
    /// [`Error::MediaReleaseIncomplete`], in that order of precedence.
    pub fn prepare(&mut self, now: DateTime<Utc>) -> Result<PreparedSubmission> {
        let report = self.check(now);
        if !report.is_valid() {
            debug!(issues = report.issues().len(), "Form failed validation");
            return Err(Error::Validation(report));
        }

        self.validator.validate_consent(&self.fields)?;

        let missing = self.missing_media();
        if !missing.is_empty() {
            return Err(Error::MediaReleaseIncomplete { missing });
        }
        let media = self
            .config
            .form
            .require_media_release
            .then(|| MediaRecord::collect_at(&self.config.form, &self.fields, now));

        let source = self.cascade.hierarchy().source();
        let student = FieldAggregator::new(&self.config.form).collect_at(
            &self.fields,
            self.cascade.selection(),
            source,
            now,
        );
        Ok(PreparedSubmission { student, media })
    }

    /// Validate, submit, and on success reset the session.
    ///
    /// # Errors
    ///
    /// Returns the first failing check from [`FormSession::prepare`], or
    /// [`Error::Submission`] if the store rejects a record.
    pub async fn submit(&mut self, now: DateTime<Utc>) -> Result<SubmitOutcome> {
        if self.submitter.is_submitting() {
            debug!("Submission already in progress, dropping request");
            return Ok(SubmitOutcome::AlreadyInProgress);
        }
        let prepared = self.prepare(now)?;
        let outcome = self.submitter.submit(&prepared).await?;
        if matches!(outcome, SubmitOutcome::Submitted { .. }) {
            self.clear(now);
        }
        Ok(outcome)
    }

    /// Where the location data came from.
    #[must_use]
    pub fn location_source(&self) -> DataSource {
        self.cascade.hierarchy().source()
    }

    fn sync_location_fields(&mut self) {
        let selection = self.cascade.selection();
        let values = [
            selection.county.as_ref().map(|c| c.id.to_string()),
            selection.sub_county.as_ref().map(|s| s.id.to_string()),
            selection.constituency.as_ref().map(|c| c.id.to_string()),
            selection.ward.as_ref().map(|w| w.id.to_string()),
        ];
        for (field, value) in LOCATION_FIELDS.iter().zip(values) {
            match value {
                Some(id) => self.fields.set(*field, FieldValue::Text(id)),
                None => self.fields.clear_field(*field),
            }
        }
    }
}
