//! `stform` - CLI for studentform
//!
//! Runs the registration form workflow against a local `SQLite` store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;

use studentform::cli::{
    Cli, Command, ConfigCommand, DraftCommand, ExportCommand, FieldsArgs, LocationsCommand,
};
use studentform::draft::DraftSnapshot;
use studentform::export::{pdf_file_name, PagePlan};
use studentform::location::{CountyId, DropdownOption, FileSource, SubCountyId};
use studentform::stats::read_daily_stats;
use studentform::{
    init_logging, Config, DraftManager, Error, FieldSet, FormKind, FormSession,
    LocationHierarchy, LocationLoader, Storage, SubmitOutcome,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Locations(cmd) => handle_locations(&config, cmd).await,
        Command::Validate(args) => handle_validate(config, &args).await,
        Command::Submit(args) => handle_submit(config, &args).await,
        Command::Draft(cmd) => handle_draft(&config, cmd),
        Command::Export(cmd) => handle_export(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn load_hierarchy(config: &Config) -> Arc<LocationHierarchy> {
    let loader = LocationLoader::new(FileSource::new(config.locations_path()), config.load_timeout());
    loader.get().await
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<Storage>> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    Ok(Arc::new(storage))
}

fn read_fields(path: &Path) -> anyhow::Result<FieldSet> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read fields from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    let snapshot = DraftSnapshot::from_json(&text)
        .with_context(|| format!("{} is not a JSON object of field values", path.display()))?;
    Ok(snapshot.to_fields())
}

async fn build_session(config: Config, fields_path: &Path) -> anyhow::Result<(FormSession, Arc<Storage>)> {
    let fields = read_fields(fields_path)?;
    let hierarchy = load_hierarchy(&config).await;
    let storage = open_storage(&config)?;
    let drafts = DraftManager::new(storage.clone(), config.drafts.draft_key.clone());
    let mut session = FormSession::new(Arc::new(config), hierarchy, drafts, storage.clone());
    session.load_fields(fields, Utc::now());
    Ok((session, storage))
}

fn print_options(options: &[DropdownOption], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(options)?);
    } else {
        for option in options {
            println!("{:<8} {}", option.value, option.label);
        }
    }
    Ok(())
}

async fn handle_locations(config: &Config, cmd: LocationsCommand) -> anyhow::Result<()> {
    let hierarchy = load_hierarchy(config).await;
    if hierarchy.is_fallback() {
        eprintln!("Location data unavailable; showing counties only.");
    }

    let options: Vec<DropdownOption> = match &cmd {
        LocationsCommand::Counties { .. } => hierarchy
            .counties()
            .into_iter()
            .map(|c| DropdownOption {
                value: c.id.to_string(),
                label: c.display_name.clone(),
            })
            .collect(),
        LocationsCommand::SubCounties { county_id, .. } => {
            let id = CountyId::from(county_id.as_str());
            if hierarchy.county(&id).is_none() {
                bail!("unknown county: {county_id}");
            }
            hierarchy
                .children_of_county(&id)
                .into_iter()
                .map(|s| DropdownOption {
                    value: s.id.to_string(),
                    label: s.display_name.clone(),
                })
                .collect()
        }
        LocationsCommand::Wards { sub_county_id, .. } => {
            let id = SubCountyId::from(sub_county_id.as_str());
            if hierarchy.sub_county(&id).is_none() {
                bail!("unknown sub-county: {sub_county_id}");
            }
            hierarchy
                .children_of_sub_county(&id)
                .into_iter()
                .map(|w| DropdownOption {
                    value: w.id.to_string(),
                    label: w.display_name.clone(),
                })
                .collect()
        }
    };

    let json = match cmd {
        LocationsCommand::Counties { json }
        | LocationsCommand::SubCounties { json, .. }
        | LocationsCommand::Wards { json, .. } => json,
    };
    print_options(&options, json)
}

async fn handle_validate(config: Config, args: &FieldsArgs) -> anyhow::Result<()> {
    let (mut session, _) = build_session(config, &args.fields).await?;
    let report = session.check(Utc::now());
    let consent = session.missing_consent();
    let media = session.missing_media();
    let valid = report.is_valid() && consent.is_empty() && media.is_empty();

    if args.json {
        let output = serde_json::json!({
            "valid": valid,
            "issues": report.issues(),
            "missingConsent": consent,
            "missingMediaFields": media,
            "firstInvalid": report.first_invalid(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if valid {
        println!("Form is valid.");
    } else {
        if !report.is_valid() {
            println!("{}", report.user_message());
        }
        for item in &consent {
            println!("Missing consent: {item}");
        }
        for label in &media {
            println!("Missing media release field: {label}");
        }
    }
    Ok(())
}

async fn handle_submit(config: Config, args: &FieldsArgs) -> anyhow::Result<()> {
    let (mut session, _) = build_session(config, &args.fields).await?;

    let outcome = match session.submit(Utc::now()).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_form_error() || e.is_submission_error() => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
        Err(e) => return Err(e).context("submission failed"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    match outcome {
        SubmitOutcome::Submitted {
            student_id,
            media_id,
        } => {
            println!("Submitted.");
            println!("  Student record: {student_id}");
            if let Some(media_id) = media_id {
                println!("  Media release:  {media_id}");
            }
        }
        SubmitOutcome::AlreadyInProgress => println!("A submission is already in progress."),
    }
    Ok(())
}

fn handle_draft(config: &Config, cmd: DraftCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let drafts = DraftManager::new(storage, config.drafts.draft_key.clone());

    match cmd {
        DraftCommand::Show { json } => {
            let Some(snapshot) = drafts.load() else {
                println!("No draft saved.");
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let fields = snapshot.to_fields();
                for (field, value) in fields.iter() {
                    println!("{:<32} {}", field.label(), serde_json::to_string(value)?);
                }
                for form in [FormKind::Student, FormKind::Media] {
                    let progress = fields.progress(form);
                    println!(
                        "{form} form: {}/{} fields ({}%)",
                        progress.filled, progress.total, progress.percent
                    );
                }
            }
        }
        DraftCommand::Save { fields } => {
            let fields = read_fields(&fields)?;
            if drafts.save(&fields) {
                println!("Draft saved.");
            } else {
                bail!("draft was not saved");
            }
        }
        DraftCommand::Clear => {
            drafts.clear();
            println!("Draft cleared.");
        }
    }
    Ok(())
}

fn handle_export(config: &Config, cmd: &ExportCommand) -> anyhow::Result<()> {
    let fields = read_fields(&cmd.fields)?;
    let kind = FormKind::from(cmd.form);
    let file_name = pdf_file_name(&config.form, kind, &fields, Utc::now().date_naive());
    let plan = PagePlan::for_image(cmd.width, cmd.height)?;

    if cmd.json {
        let output = serde_json::json!({ "fileName": file_name, "plan": plan });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{file_name}");
        println!(
            "  {} page(s), image {:.1} x {:.1} mm",
            plan.page_count(),
            plan.image_width_mm,
            plan.image_height_mm
        );
        for page in &plan.pages {
            println!("  page {}: offset {:.1} mm", page.index + 1, page.y_offset_mm);
        }
    }
    Ok(())
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let names = &config.submission;
    let students = storage.document_count(&names.student_collection)?;
    let media = storage.document_count(&names.media_collection)?;
    let today = read_daily_stats(storage.as_ref(), &names.stats_collection, Utc::now().date_naive())
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read today's stats");
            None
        });
    let stats = storage.stats()?;
    let draft_saved = DraftManager::new(storage.clone(), config.drafts.draft_key.clone()).exists();

    if json {
        let status = serde_json::json!({
            "databasePath": storage.path(),
            "studentSubmissions": students,
            "mediaSubmissions": media,
            "today": today,
            "draftSaved": draft_saved,
            "dbSizeBytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("stform status");
        println!("-------------");
        println!("Database:             {}", storage.path().display());
        println!("Student submissions:  {students}");
        println!("Media releases:       {media}");
        println!("Draft saved:          {}", if draft_saved { "yes" } else { "no" });
        match today {
            Some(today) => {
                println!("Today ({}):     {} submission(s)", today.date, today.daily_count);
                for (county, count) in &today.by_county {
                    println!("  {county:<20} {count}");
                }
            }
            None => println!("Today:                no submissions"),
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Form]");
                println!("  Organization:       {}", config.form.organization);
                println!("  Version:            {}", config.form.version);
                println!("  Academic year:      {}", config.form.academic_year);
                println!("  Semester:           {}", config.form.semester);
                println!("  Media release:      {}", config.form.require_media_release);
                println!();
                println!("[Validation]");
                println!(
                    "  Age range:          {}-{}",
                    config.validation.min_age, config.validation.max_age
                );
                println!(
                    "  National ID digits: {}-{}",
                    config.validation.national_id_min_digits, config.validation.national_id_max_digits
                );
                println!();
                println!("[Locations]");
                println!("  Data path:          {}", config.locations_path().display());
                println!("  Load timeout (ms):  {}", config.locations.load_timeout_ms);
                println!();
                println!("[Drafts]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Draft key:          {}", config.drafts.draft_key);
                println!();
                println!("[Submission]");
                println!("  Students:           {}", config.submission.student_collection);
                println!("  Media:              {}", config.submission.media_collection);
                println!("  Stats:              {}", config.submission.stats_collection);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(Error::ConfigValidation { message }) => {
                    bail!("configuration is invalid: {message}")
                }
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
