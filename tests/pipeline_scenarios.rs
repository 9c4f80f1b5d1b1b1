use report_db::{
    cli::{Action, Args, CollectionArg, run_action},
    config::Config,
    pipeline::Pipeline,
    report::{BLOCKER, BUILD_NUMBER, FieldValue, REQUIRED_FIELDS, TEST_OWNER, TestReport},
    store::{MemoryStore, ReportStore},
};
use clap::Parser;
use std::path::Path;
use time::macros::datetime;

fn cfg_in(dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.output.out_dir = dir.display().to_string();
    cfg
}

fn full(owner: &str) -> TestReport {
    REQUIRED_FIELDS
        .iter()
        .fold(TestReport::default(), |r, k| r.with(k, FieldValue::text("No")))
        .with(TEST_OWNER, FieldValue::text(owner))
}

#[test]
fn user_query_exports_both_collections() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = cfg_in(dir.path());
    let mut store = MemoryStore::new();
    store.insert_many("Collection1", vec![full("alice"), full("bob")]).unwrap();
    store.insert_many("Collection2", vec![full("alice")]).unwrap();

    let pipeline = Pipeline::new(&cfg, store);
    let outcome = pipeline.user_entries("alice").unwrap();

    assert_eq!(outcome.entries, 2);
    assert_eq!(outcome.file, dir.path().join("alice.csv"));
    let text = std::fs::read_to_string(&outcome.file).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().next().unwrap().starts_with("_id,Test #"));
}

#[test]
fn build_date_export_name_is_dashed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = cfg_in(dir.path());
    let mut store = MemoryStore::new();
    store
        .insert_many(
            "Collection1",
            vec![
                full("a").with(BUILD_NUMBER, FieldValue::DateTime(datetime!(2024-07-04 10:00 UTC))),
                full("b").with(BUILD_NUMBER, FieldValue::DateTime(datetime!(2024-07-03 10:00 UTC))),
            ],
        )
        .unwrap();

    let pipeline = Pipeline::new(&cfg, store);
    let outcome = pipeline.build_date_reports("7/4/2024").unwrap();
    assert_eq!(outcome.reports, 1);
    assert_eq!(outcome.file, dir.path().join("reports_on_07-04-2024.csv"));
    assert!(pipeline.build_date_reports("2024-07-04").is_err());
}

#[test]
fn db_answers_exports_then_samples() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = cfg_in(dir.path());
    let mut store = MemoryStore::new();
    store
        .insert_many("Collection1", vec![full("a").with(BLOCKER, FieldValue::text("Yes"))])
        .unwrap();

    let pipeline = Pipeline::new(&cfg, store);
    // Collection2 is empty: the sample fails, but the exports are already written.
    assert!(pipeline.db_answers().is_err());
    assert!(dir.path().join("blocker_entries.csv").exists());
    assert!(dir.path().join("repeater_entries.csv").exists());

    let mut store = pipeline.into_store();
    store.insert_many("Collection2", vec![full("b"), full("c")]).unwrap();
    let pipeline = Pipeline::new(&cfg, store);
    let outcome = pipeline.db_answers().unwrap();
    assert_eq!(outcome.blockers, 1);
    assert_eq!(outcome.repeaters, 0);
    assert_eq!(outcome.sample.first.test_owner, Some(FieldValue::text("b")));
    assert_eq!(outcome.sample.middle.test_owner, Some(FieldValue::text("c")));
}

#[test]
fn insert_branch_imports_and_cleans() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = cfg_in(dir.path());
    let input = dir.path().join("reports.csv");
    std::fs::write(
        &input,
        "Test #,Build #,Category,Test Case,Expected Result,Actual Result,Repeatable?,Blocker?,Test Owner\n\
         1,B1,UI,Login,ok,ok,No,No,alice\n\
         2,B1,UI,Logout,ok,ok,No,,bob\n",
    )
    .unwrap();

    let mut store = MemoryStore::new();
    store
        .insert_many("Collection2", vec![TestReport::default().with(TEST_OWNER, FieldValue::text("x"))])
        .unwrap();
    let mut pipeline = Pipeline::new(&cfg, store);

    let args = Args::parse_from([
        "report-db",
        "--collection",
        "Collection1",
        "--insert",
        input.to_str().unwrap(),
    ]);
    run_action(&cfg, &mut pipeline, &args.action()).unwrap();

    let store = pipeline.into_store();
    assert_eq!(store.len("Collection1"), 1);
    assert_eq!(store.len("Collection2"), 0);
}

#[test]
fn unsupported_insert_still_cleans() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = cfg_in(dir.path());
    let mut store = MemoryStore::new();
    store
        .insert_many("Collection1", vec![full("alice"), TestReport::default()])
        .unwrap();
    let mut pipeline = Pipeline::new(&cfg, store);

    let outcome = pipeline
        .insert_and_clean("Collection1", &dir.path().join("reports.xls"))
        .unwrap();
    assert!(outcome.import.is_none());
    assert_eq!(outcome.clean.flagged, 1);
    assert_eq!(outcome.clean.deleted_first, 1);
    assert_eq!(pipeline.store().len("Collection1"), 1);
}

#[test]
fn user_id_must_be_a_plain_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = cfg_in(dir.path());
    let pipeline = Pipeline::new(&cfg, MemoryStore::new());

    for user in ["../alice", "a/b", "a\\b", ".."] {
        assert!(pipeline.user_entries(user).is_err(), "{user}");
    }
    assert_eq!(pipeline.user_entries("nobody").unwrap().entries, 0);
}

#[test]
fn empty_flag_values_fall_through() {
    let parse = |argv: &[&str]| Args::parse_from(argv.iter().copied()).action();

    assert_eq!(parse(&["report-db", "--user", "", "--dbanswers"]), Action::DbAnswers);
    assert_eq!(parse(&["report-db", "--build_date", ""]), Action::Nothing);
}

#[test]
fn flags_pick_the_first_matching_branch() {
    let parse = |argv: &[&str]| Args::parse_from(argv.iter().copied()).action();

    assert_eq!(parse(&["report-db"]), Action::Nothing);
    assert_eq!(
        parse(&["report-db", "--collection", "Collection2", "--insert", "x.csv", "--user", "u"]),
        Action::Insert {
            collection: CollectionArg::Collection2,
            input: "x.csv".into()
        }
    );
    assert_eq!(
        parse(&["report-db", "--insert", "x.csv", "--user", "u", "--dbanswers"]),
        Action::User("u".into())
    );
    assert_eq!(
        parse(&["report-db", "--dbanswers", "--build_date", "07/04/2024"]),
        Action::DbAnswers
    );
    assert_eq!(
        parse(&["report-db", "--build_date", "07/04/2024"]),
        Action::BuildDate("07/04/2024".into())
    );
    assert!(Args::try_parse_from(["report-db", "--collection", "Collection3"]).is_err());
}
