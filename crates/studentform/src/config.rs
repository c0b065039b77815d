//! Configuration management for studentform.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix for environment overrides. Sections and keys are separated by a
/// double underscore, e.g. `STUDENTFORM_VALIDATION__MIN_AGE=18`.
const ENV_PREFIX: &str = "STUDENTFORM_";

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "studentform";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "studentform.db";

/// Default location dataset file name.
const LOCATIONS_FILE_NAME: &str = "kenyan_locations.json";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (`STUDENTFORM_<SECTION>__<KEY>`)
/// 2. TOML config file at `~/.config/studentform/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Form identity and labelling.
    pub form: FormConfig,
    /// Field validation bounds.
    pub validation: ValidationConfig,
    /// Location dataset loading.
    pub locations: LocationsConfig,
    /// Draft persistence.
    pub drafts: DraftsConfig,
    /// Document store collections.
    pub submission: SubmissionConfig,
}

/// Form identity and labelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Form version stamped on every record.
    pub version: String,
    /// Issuing organization.
    pub organization: String,
    /// Form type label of the student record.
    pub student_form_label: String,
    /// Form type label of the media release record.
    pub media_form_label: String,
    /// Academic year stamped on the record.
    pub academic_year: String,
    /// Semester stamped on the record.
    pub semester: String,
    /// Whether the media release form must be completed before submit.
    pub require_media_release: bool,
}

/// Field validation bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum accepted age in full years.
    pub min_age: u32,
    /// Maximum accepted age in full years.
    pub max_age: u32,
    /// Minimum number of digits in a national ID.
    pub national_id_min_digits: usize,
    /// Maximum number of digits in a national ID.
    pub national_id_max_digits: usize,
    /// Earliest accepted KCSE year.
    pub kcse_min_year: i32,
}

/// Location dataset loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationsConfig {
    /// Path to the location dataset.
    /// Defaults to `~/.local/share/studentform/kenyan_locations.json`
    pub data_path: Option<PathBuf>,
    /// How long to wait for the dataset before falling back.
    pub load_timeout_ms: u64,
}

/// Draft persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftsConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/studentform/studentform.db`
    pub database_path: Option<PathBuf>,
    /// Key the draft snapshot is stored under.
    pub draft_key: String,
    /// Quiet period after the last input before a draft is saved.
    pub autosave_debounce_ms: u64,
}

/// Document store collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Collection receiving student records.
    pub student_collection: String,
    /// Collection receiving media release records.
    pub media_collection: String,
    /// Collection holding daily statistics.
    pub stats_collection: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            version: "2.5".to_string(),
            organization: "UoE".to_string(),
            student_form_label: "Student Personal Details".to_string(),
            media_form_label: "Media Release Consent".to_string(),
            academic_year: "2024/2025".to_string(),
            semester: "1".to_string(),
            require_media_release: true,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_age: 16,
            max_age: 70,
            national_id_min_digits: 7,
            national_id_max_digits: 8,
            kcse_min_year: 1990,
        }
    }
}

impl Default for LocationsConfig {
    fn default() -> Self {
        Self {
            data_path: None, // Resolved at runtime
            load_timeout_ms: 10_000,
        }
    }
}

impl Default for DraftsConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved at runtime
            draft_key: "uoe_dual_form_data".to_string(),
            autosave_debounce_ms: 1_000,
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            student_collection: "student_submissions".to_string(),
            media_collection: "media_submissions".to_string(),
            stats_collection: "submission_stats".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (`STUDENTFORM_<SECTION>__<KEY>`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Self::load_layers(&config_file, ENV_PREFIX)
    }

    fn load_layers(config_file: &Path, env_prefix: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(env_prefix).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let v = &self.validation;
        if v.min_age > v.max_age {
            return Err(Error::ConfigValidation {
                message: format!(
                    "min_age ({}) cannot be greater than max_age ({})",
                    v.min_age, v.max_age
                ),
            });
        }

        if v.national_id_min_digits == 0 || v.national_id_min_digits > v.national_id_max_digits {
            return Err(Error::ConfigValidation {
                message: format!(
                    "national_id_min_digits ({}) must be between 1 and national_id_max_digits ({})",
                    v.national_id_min_digits, v.national_id_max_digits
                ),
            });
        }

        if self.locations.load_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "load_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.drafts.autosave_debounce_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "autosave_debounce_ms must be greater than 0".to_string(),
            });
        }

        if self.drafts.draft_key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "draft_key must not be empty".to_string(),
            });
        }

        let collections = [
            ("student_collection", &self.submission.student_collection),
            ("media_collection", &self.submission.media_collection),
            ("stats_collection", &self.submission.stats_collection),
        ];
        for (name, value) in collections {
            if value.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must not be empty"),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.drafts
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the location dataset path, resolving defaults if not set.
    #[must_use]
    pub fn locations_path(&self) -> PathBuf {
        self.locations
            .data_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(LOCATIONS_FILE_NAME))
    }

    /// Get the location load timeout as a Duration.
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.locations.load_timeout_ms)
    }

    /// Get the autosave debounce as a Duration.
    #[must_use]
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.drafts.autosave_debounce_ms)
    }
}
