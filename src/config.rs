use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: Store,
    #[serde(default)]
    pub import: Import,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub uri: String,
    pub database: String,
    pub collection1: String,
    pub collection2: String,
}
impl Default for Store {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/".into(),
            database: "your_database".into(),
            collection1: "Collection1".into(),
            collection2: "Collection2".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    /// Drop spreadsheet rows with any empty cell before inserting.
    pub xlsx_drop_incomplete_rows: bool,
    /// Store numeric-looking CSV cells as numbers instead of text.
    pub infer_numbers: bool,
}
impl Default for Import {
    fn default() -> Self {
        Self {
            xlsx_drop_incomplete_rows: true,
            infer_numbers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub out_dir: String,
    pub blocker_filename: String,
    pub repeater_filename: String,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            out_dir: ".".into(),
            blocker_filename: "blocker_entries.csv".into(),
            repeater_filename: "repeater_entries.csv".into(),
            print_summary: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
