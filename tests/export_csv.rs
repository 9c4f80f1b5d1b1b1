use report_db::{
    export::{export_csv, header_for, write_csv},
    report::{BUILD_NUMBER, FieldValue, TEST_NUMBER, TEST_OWNER, TestReport},
};
use bson::oid::ObjectId;
use time::macros::datetime;

#[test]
fn header_is_union_in_first_seen_order() {
    let a = TestReport::default()
        .with(TEST_OWNER, FieldValue::text("alice"))
        .with("Notes", FieldValue::text("n"));
    let b = TestReport::default()
        .with(TEST_NUMBER, FieldValue::Int(2))
        .with("Severity", FieldValue::text("high"));
    assert_eq!(
        header_for(&[a, b]),
        vec!["Test Owner", "Notes", "Test #", "Severity"]
    );
}

#[test]
fn renders_ids_dates_and_gaps() {
    let id = ObjectId::new();
    let reports = vec![
        TestReport {
            id: Some(id),
            ..Default::default()
        }
        .with(TEST_NUMBER, FieldValue::Int(1))
        .with(
            BUILD_NUMBER,
            FieldValue::DateTime(datetime!(2024-07-04 08:30 UTC)),
        ),
        TestReport::default()
            .with(TEST_NUMBER, FieldValue::Float(2.5))
            .with("Flag", FieldValue::Bool(true))
            .with("Note", FieldValue::text("a, b")),
    ];

    let mut buf = Vec::new();
    write_csv(&mut buf, &reports).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "_id,Test #,Build #,Flag,Note");
    assert_eq!(lines[1], format!("{},1,2024-07-04 08:30:00,,", id.to_hex()));
    assert_eq!(lines[2], ",2.5,,True,\"a, b\"");
}

#[test]
fn empty_result_writes_blank_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = export_csv(dir.path(), "none.csv", &[]).unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "\n");
}
