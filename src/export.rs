use crate::{
    report::{ID_FIELD, TestReport},
    util::ensure_dir,
};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Union of keys across `reports`, in first-appearance order, `_id` first.
pub fn header_for(reports: &[TestReport]) -> Vec<String> {
    let mut header: Vec<String> = Vec::new();
    if reports.iter().any(|r| r.id.is_some()) {
        header.push(ID_FIELD.to_string());
    }
    for report in reports {
        for (key, _) in report.entries() {
            if !header.iter().any(|h| h == key) {
                header.push(key.to_string());
            }
        }
    }
    header
}

fn cell(report: &TestReport, key: &str) -> String {
    if key == ID_FIELD {
        return report.id.map(|id| id.to_hex()).unwrap_or_default();
    }
    report.get(key).map(|v| v.render()).unwrap_or_default()
}

pub fn write_csv<W: Write>(mut out: W, reports: &[TestReport]) -> Result<()> {
    let header = header_for(reports);
    if header.is_empty() {
        out.write_all(b"\n")?;
        return Ok(());
    }

    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(&header)?;
    for report in reports {
        wtr.write_record(header.iter().map(|key| cell(report, key)))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `reports` to `dir/file_name` and returns the path written.
pub fn export_csv(dir: &Path, file_name: &str, reports: &[TestReport]) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(file_name);
    let file = std::fs::File::create(&path)
        .with_context(|| format!("create export file: {}", path.display()))?;
    write_csv(std::io::BufWriter::new(file), reports)
        .with_context(|| format!("writing {}", path.display()))?;
    debug!("exported {} rows to {}", reports.len(), path.display());
    Ok(path)
}
