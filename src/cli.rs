use crate::{
    config::Config,
    pipeline::{AnswersOutcome, Pipeline},
    store::{MongoStore, ReportStore},
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "report-db")]
#[command(about = "Database Answers: import, clean and query test-report collections")]
pub struct Args {
    /// Name of the collection to insert data into.
    #[arg(long, value_enum)]
    pub collection: Option<CollectionArg>,

    /// CSV or .xlsx file containing data to insert into the collection.
    #[arg(long, value_name = "CSV_FILENAME")]
    pub insert: Option<PathBuf>,

    /// User ID to list entries for.
    #[arg(long, value_name = "USER_ID")]
    pub user: Option<String>,

    /// Export blocker and repeater entries and print sample documents.
    #[arg(long)]
    pub dbanswers: bool,

    /// Find reports on the specified build date (format: MM/DD/YYYY).
    #[arg(long = "build_date", value_name = "DATE")]
    pub build_date: Option<String>,

    /// Path to config TOML. If omitted, uses ./report-db.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollectionArg {
    #[value(name = "Collection1")]
    Collection1,
    #[value(name = "Collection2")]
    Collection2,
}

impl CollectionArg {
    pub fn resolve(self, cfg: &Config) -> &str {
        match self {
            CollectionArg::Collection1 => &cfg.store.collection1,
            CollectionArg::Collection2 => &cfg.store.collection2,
        }
    }
}

/// The single branch an invocation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Insert {
        collection: CollectionArg,
        input: PathBuf,
    },
    User(String),
    DbAnswers,
    BuildDate(String),
    Nothing,
}

impl Args {
    /// First match wins: insert, user, dbanswers, build_date. Empty values
    /// count as not given.
    pub fn action(&self) -> Action {
        let insert = self.insert.as_ref().filter(|p| !p.as_os_str().is_empty());
        let user = self.user.as_deref().filter(|u| !u.is_empty());
        let build_date = self.build_date.as_deref().filter(|d| !d.is_empty());

        if let (Some(collection), Some(input)) = (self.collection, insert) {
            Action::Insert {
                collection,
                input: input.clone(),
            }
        } else if let Some(user) = user {
            Action::User(user.to_string())
        } else if self.dbanswers {
            Action::DbAnswers
        } else if let Some(date) = build_date {
            Action::BuildDate(date.to_string())
        } else {
            Action::Nothing
        }
    }
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    if cfg.debug.dump_effective_config {
        let out_dir = Path::new(&cfg.output.out_dir);
        ensure_dir(out_dir)?;
        let raw = toml::to_string(&cfg).context("serialize effective config")?;
        let path = out_dir.join("effective-config.toml");
        std::fs::write(&path, raw)
            .with_context(|| format!("write effective config: {}", path.display()))?;
    }

    let store = MongoStore::connect(&cfg.store)?;
    let mut pipeline = Pipeline::new(&cfg, store);
    let result = run_action(&cfg, &mut pipeline, &args.action());

    drop(pipeline);
    info!("connection closed");
    result
}

/// Runs one branch and prints its status lines.
pub fn run_action<S: ReportStore>(
    cfg: &Config,
    pipeline: &mut Pipeline<S>,
    action: &Action,
) -> Result<()> {
    match action {
        Action::Insert { collection, input } => {
            let name = collection.resolve(cfg).to_string();
            let outcome = pipeline.insert_and_clean(&name, input)?;
            match outcome.import {
                Some(_) => println!("Data inserted into MongoDB collection successfully."),
                None => println!("Unsupported file format. Please provide a CSV or Excel file."),
            }
            println!("Collections cleaned successfully.");
            print_summary(cfg, &outcome)
        }
        Action::User(user) => {
            let outcome = pipeline.user_entries(user)?;
            println!("Total entries for user '{}': {}", outcome.user, outcome.entries);
            print_summary(cfg, &outcome)
        }
        Action::DbAnswers => {
            let outcome = pipeline.db_answers()?;
            print_answers(&outcome)
        }
        Action::BuildDate(date) => {
            let outcome = pipeline.build_date_reports(date)?;
            println!(
                "Reports on build date ({}) exported to {}",
                outcome.date,
                file_name(&outcome.file)
            );
            print_summary(cfg, &outcome)
        }
        Action::Nothing => {
            info!("no action requested");
            Ok(())
        }
    }
}

fn print_answers(outcome: &AnswersOutcome) -> Result<()> {
    println!(
        "Blocker entries exported to {}",
        file_name(&outcome.blocker_file)
    );
    println!(
        "Repeater entries exported to {}",
        file_name(&outcome.repeater_file)
    );
    println!(
        "First document: {}",
        serde_json::to_string(&outcome.sample.first.to_json())?
    );
    println!(
        "Middle document: {}",
        serde_json::to_string(&outcome.sample.middle.to_json())?
    );
    println!(
        "Last document: {}",
        serde_json::to_string(&outcome.sample.last.to_json())?
    );
    Ok(())
}

fn print_summary<T: Serialize>(cfg: &Config, outcome: &T) -> Result<()> {
    if cfg.output.print_summary {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("report-db.toml");
    if default.exists() {
        Some(default)
    } else {
        None
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the status lines; logs go to stderr.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.output.out_dir).join("report-db.log"))
}
