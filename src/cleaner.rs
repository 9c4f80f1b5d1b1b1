use crate::{
    report::{REQUIRED_FIELDS, TestReport},
    store::ReportStore,
};
use anyhow::{Context, Result};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOutcome {
    /// Distinct identities flagged across both collections.
    pub flagged: usize,
    pub deleted_first: u64,
    pub deleted_second: u64,
    /// Bad documents that carry no identity and so cannot be deleted.
    pub skipped_without_id: usize,
}

/// A document is bad when any required key is absent. Null and empty values
/// count as present.
pub fn is_bad_data(report: &TestReport) -> bool {
    REQUIRED_FIELDS.iter().any(|f| report.get(f).is_none())
}

pub fn missing_fields(report: &TestReport) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| report.get(f).is_none())
        .collect()
}

/// Deletes every bad document from both collections.
///
/// Each flagged identity is deleted from `first` and then `second`, whichever
/// collection it was found in. The two collections are not updated
/// atomically: a failure part-way leaves whatever was already deleted
/// deleted, and running the pass again finishes the job.
pub fn clean_collections<S: ReportStore + ?Sized>(
    store: &mut S,
    first: &str,
    second: &str,
) -> Result<CleanOutcome> {
    let mut outcome = CleanOutcome::default();
    let mut bad_ids: BTreeSet<ObjectId> = BTreeSet::new();

    for collection in [first, second] {
        let docs = store
            .find_all(collection)
            .with_context(|| format!("scanning {collection}"))?;
        for doc in docs.iter().filter(|d| is_bad_data(d)) {
            match doc.id {
                Some(id) => {
                    debug!("bad document {id} in {collection}: missing {:?}", missing_fields(doc));
                    bad_ids.insert(id);
                }
                None => {
                    warn!("bad document without _id in {collection}; cannot delete");
                    outcome.skipped_without_id += 1;
                }
            }
        }
    }
    outcome.flagged = bad_ids.len();

    for id in &bad_ids {
        outcome.deleted_first += store.delete_by_id(first, id)?;
        outcome.deleted_second += store.delete_by_id(second, id)?;
    }

    info!(
        "cleaned flagged={} deleted {first}={} {second}={}",
        outcome.flagged, outcome.deleted_first, outcome.deleted_second
    );
    Ok(outcome)
}
