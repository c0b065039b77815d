//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::fields::FormKind;

/// Location lookup commands.
#[derive(Debug, Subcommand)]
pub enum LocationsCommand {
    /// List all counties
    Counties {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List the sub-counties of a county
    SubCounties {
        /// County id, e.g. 027
        county_id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List the wards of a sub-county
    Wards {
        /// Sub-county id
        sub_county_id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Arguments for commands that read a field file.
#[derive(Debug, Args)]
pub struct FieldsArgs {
    /// JSON file of field values keyed by field id (`-` for stdin)
    #[arg(value_name = "FIELDS_JSON")]
    pub fields: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Draft commands.
#[derive(Debug, Subcommand)]
pub enum DraftCommand {
    /// Show the stored draft
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Replace the stored draft with a field file
    Save {
        /// JSON file of field values (`-` for stdin)
        #[arg(value_name = "FIELDS_JSON")]
        fields: PathBuf,
    },

    /// Remove the stored draft
    Clear,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// JSON file of field values (`-` for stdin)
    #[arg(value_name = "FIELDS_JSON")]
    pub fields: PathBuf,

    /// Which form to export
    #[arg(short, long, value_enum, default_value = "student")]
    pub form: FormArg,

    /// Rendered width in pixels
    #[arg(long, default_value = "794", value_name = "PX")]
    pub width: u32,

    /// Rendered height in pixels
    #[arg(long, default_value = "1123", value_name = "PX")]
    pub height: u32,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Form selection argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormArg {
    /// Student personal details
    #[default]
    Student,
    /// Media release consent
    Media,
}

impl From<FormArg> for FormKind {
    fn from(arg: FormArg) -> Self {
        match arg {
            FormArg::Student => Self::Student,
            FormArg::Media => Self::Media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_arg_conversion() {
        assert_eq!(FormKind::from(FormArg::Student), FormKind::Student);
        assert_eq!(FormKind::from(FormArg::Media), FormKind::Media);
        assert_eq!(FormArg::default(), FormArg::Student);
    }

    #[test]
    fn test_form_arg_value_enum() {
        let variants = FormArg::value_variants();
        assert_eq!(variants.len(), 2);
        assert_eq!(
            FormArg::from_str("media", true).unwrap(),
            FormArg::Media
        );
    }
}
