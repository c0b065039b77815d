//! `studentform` - Student registration and media release form engine
//!
//! This library holds the state and rules of the two registration forms:
//! the Kenyan location cascade, field validation, draft auto-save, the
//! submission workflow with its daily counters, and PDF export planning.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod draft;
pub mod error;
pub mod export;
pub mod fields;
pub mod location;
pub mod logging;
pub mod media;
pub mod record;
pub mod session;
pub mod stats;
pub mod storage;
pub mod store;
pub mod validation;

pub use config::Config;
pub use draft::{DraftManager, DraftSnapshot, DraftStore};
pub use error::{Error, FailureKind, Result, SubmissionFailure};
pub use fields::{FieldId, FieldSet, FieldValue, FormKind};
pub use location::{LocationCascade, LocationHierarchy, LocationLoader};
pub use logging::init_logging;
pub use record::{FieldAggregator, SubmissionRecord};
pub use session::{FormSession, SubmitOutcome, Submitter};
pub use storage::{Storage, StorageStats};
pub use store::{DocumentStore, MemoryDocumentStore, StoreError};
pub use validation::{ValidationReport, Validator};
