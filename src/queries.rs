use crate::{
    report::{BLOCKER, BUILD_NUMBER, REPEATABLE, TestReport},
    store::ReportStore,
};
use anyhow::{Context, Result, anyhow, bail};
use time::{Date, Month};

/// Blocker and repeater documents, in scan order. A document flagged both
/// ways appears in both lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlaggedEntries {
    pub blockers: Vec<TestReport>,
    pub repeaters: Vec<TestReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub first: TestReport,
    pub middle: TestReport,
    pub last: TestReport,
}

/// Every document owned by `user`, collection by collection.
pub fn entries_by_user<S: ReportStore + ?Sized>(
    store: &S,
    collections: &[&str],
    user: &str,
) -> Result<Vec<TestReport>> {
    let mut entries = Vec::new();
    for collection in collections {
        let found = store
            .find_by_owner(collection, user)
            .with_context(|| format!("querying {collection} for owner {user}"))?;
        entries.extend(found);
    }
    Ok(entries)
}

fn flag_is_yes(report: &TestReport, key: &str) -> bool {
    report.get(key).and_then(|v| v.as_text()) == Some("Yes")
}

pub fn blocker_and_repeater_entries<S: ReportStore + ?Sized>(
    store: &S,
    collections: &[&str],
) -> Result<FlaggedEntries> {
    let mut out = FlaggedEntries::default();
    for collection in collections {
        for doc in store.find_all(collection)? {
            if flag_is_yes(&doc, BLOCKER) {
                out.blockers.push(doc.clone());
            }
            if flag_is_yes(&doc, REPEATABLE) {
                out.repeaters.push(doc);
            }
        }
    }
    Ok(out)
}

/// Parses `MM/DD/YYYY`; month and day may omit the leading zero.
pub fn parse_build_date(raw: &str) -> Result<Date> {
    let parts: Vec<&str> = raw.trim().split('/').collect();
    let [month, day, year] = parts.as_slice() else {
        bail!("build date must be MM/DD/YYYY: {raw:?}");
    };
    if year.len() != 4 {
        bail!("build date year must have four digits: {raw:?}");
    }
    let month: u8 = month
        .parse()
        .with_context(|| format!("bad month in build date {raw:?}"))?;
    let day: u8 = day
        .parse()
        .with_context(|| format!("bad day in build date {raw:?}"))?;
    let year: i32 = year
        .parse()
        .with_context(|| format!("bad year in build date {raw:?}"))?;
    let month = Month::try_from(month).map_err(|e| anyhow!("bad month in build date {raw:?}: {e}"))?;
    Date::from_calendar_date(year, month, day)
        .map_err(|e| anyhow!("invalid build date {raw:?}: {e}"))
}

/// `MM-DD-YYYY`, used in export file names.
pub fn build_date_slug(date: Date) -> String {
    format!("{:02}-{:02}-{:04}", u8::from(date.month()), date.day(), date.year())
}

/// Documents whose `Build #` is a timestamp falling on `date` (UTC). Anything
/// else in `Build #` never matches.
pub fn reports_on_build<S: ReportStore + ?Sized>(
    store: &S,
    collections: &[&str],
    date: Date,
) -> Result<Vec<TestReport>> {
    let mut reports = Vec::new();
    for collection in collections {
        for doc in store.find_all(collection)? {
            let on_date = doc
                .get(BUILD_NUMBER)
                .and_then(|v| v.as_datetime())
                .is_some_and(|dt| dt.date() == date);
            if on_date {
                reports.push(doc);
            }
        }
    }
    Ok(reports)
}

/// First, middle (`len / 2`) and last document of `docs`.
pub fn sample_of(mut docs: Vec<TestReport>) -> Result<Sample> {
    if docs.is_empty() {
        bail!("sample requires a non-empty collection");
    }
    let middle = docs[docs.len() / 2].clone();
    let first = docs[0].clone();
    let last = docs.pop().unwrap_or_else(|| first.clone());
    Ok(Sample { first, middle, last })
}

pub fn sample_documents<S: ReportStore + ?Sized>(store: &S, collection: &str) -> Result<Sample> {
    let docs = store.find_all(collection)?;
    sample_of(docs).with_context(|| format!("sampling {collection}"))
}
