use crate::{
    cleaner::{self, CleanOutcome},
    config::Config,
    export,
    import::{self, ImportOutcome},
    queries::{self, Sample},
    store::ReportStore,
    util::now_rfc3339,
};
use anyhow::{Result, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// One invocation's worth of work against a single store handle.
pub struct Pipeline<S: ReportStore> {
    cfg: Config,
    store: S,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsertOutcome {
    pub started: String,
    pub finished: String,
    /// `None` when the input format is not supported.
    pub import: Option<ImportOutcome>,
    pub clean: CleanOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserOutcome {
    pub user: String,
    pub entries: usize,
    pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AnswersOutcome {
    pub blockers: usize,
    pub blocker_file: PathBuf,
    pub repeaters: usize,
    pub repeater_file: PathBuf,
    pub sample: Sample,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildDateOutcome {
    pub date: String,
    pub reports: usize,
    pub file: PathBuf,
}

impl<S: ReportStore> Pipeline<S> {
    pub fn new(cfg: &Config, store: S) -> Self {
        Self {
            cfg: cfg.clone(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn collections(&self) -> [&str; 2] {
        [
            self.cfg.store.collection1.as_str(),
            self.cfg.store.collection2.as_str(),
        ]
    }

    fn out_dir(&self) -> &Path {
        Path::new(&self.cfg.output.out_dir)
    }

    /// Imports `input` into `collection`, then cleans both collections.
    /// Cleaning runs even when the input format is not supported.
    pub fn insert_and_clean(&mut self, collection: &str, input: &Path) -> Result<InsertOutcome> {
        let started = now_rfc3339();
        let imported = import::import_file(&self.cfg, &mut self.store, collection, input)?;

        let first = self.cfg.store.collection1.clone();
        let second = self.cfg.store.collection2.clone();
        let clean = cleaner::clean_collections(&mut self.store, &first, &second)?;

        Ok(InsertOutcome {
            started,
            finished: now_rfc3339(),
            import: imported,
            clean,
        })
    }

    /// Exports the user's entries to `<user>.csv` inside the output directory.
    pub fn user_entries(&self, user: &str) -> Result<UserOutcome> {
        if user.contains(['/', '\\']) || user == "." || user == ".." {
            bail!("user id cannot be used as a file name: {user:?}");
        }
        let entries = queries::entries_by_user(&self.store, &self.collections(), user)?;
        let file = export::export_csv(self.out_dir(), &format!("{user}.csv"), &entries)?;
        info!("user={user} entries={}", entries.len());
        Ok(UserOutcome {
            user: user.to_string(),
            entries: entries.len(),
            file,
        })
    }

    /// Exports blocker and repeater lists, then samples the second collection.
    /// Both exports are written before sampling, so they survive an empty
    /// second collection.
    pub fn db_answers(&self) -> Result<AnswersOutcome> {
        let flagged = queries::blocker_and_repeater_entries(&self.store, &self.collections())?;
        let blocker_file =
            export::export_csv(self.out_dir(), &self.cfg.output.blocker_filename, &flagged.blockers)?;
        let repeater_file = export::export_csv(
            self.out_dir(),
            &self.cfg.output.repeater_filename,
            &flagged.repeaters,
        )?;
        info!(
            "blockers={} repeaters={}",
            flagged.blockers.len(),
            flagged.repeaters.len()
        );

        let sample = queries::sample_documents(&self.store, &self.cfg.store.collection2)?;

        Ok(AnswersOutcome {
            blockers: flagged.blockers.len(),
            blocker_file,
            repeaters: flagged.repeaters.len(),
            repeater_file,
            sample,
        })
    }

    pub fn build_date_reports(&self, raw_date: &str) -> Result<BuildDateOutcome> {
        let date = queries::parse_build_date(raw_date)?;
        let reports = queries::reports_on_build(&self.store, &self.collections(), date)?;
        let file_name = format!("reports_on_{}.csv", queries::build_date_slug(date));
        let file = export::export_csv(self.out_dir(), &file_name, &reports)?;
        info!("build_date={date} reports={}", reports.len());
        Ok(BuildDateOutcome {
            date: raw_date.to_string(),
            reports: reports.len(),
            file,
        })
    }
}
