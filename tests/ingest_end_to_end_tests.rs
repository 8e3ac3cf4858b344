use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use metacat::catalog::record::TIMESTAMP_FORMAT;
use metacat::catalog::{
    build_index, detect, find_entry, infer_columns, load_upload, normalize, normalize_manual,
    normalize_upload, CatalogStore, ColumnSpec, ColumnType, DataSample, FormatTag, RecordDraft,
    Upload, VersionSync,
};
use metacat::error::{CatalogError, Result};
use tempfile::TempDir;

struct FailingSync;

impl VersionSync for FailingSync {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn sync(&self, _repo_dir: &Path, _changed: &[PathBuf], _message: &str) -> Result<()> {
        Err(CatalogError::SyncFailure {
            message: "remote rejected push".to_string(),
        })
    }
}

fn parse_stamp(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).expect("last_updated should use the timestamp layout")
}

#[test]
fn csv_paste_is_detected_inferred_normalized_and_indexed() {
    let content = "id,name\n1,Alice\n2,Bob";
    assert_eq!(detect(content), FormatTag::Csv);

    let before = Local::now().naive_local() - chrono::Duration::seconds(1);
    let record = normalize(content, FormatTag::Csv, &RecordDraft::new("Acme", "t1"))
        .expect("csv should normalize");
    let after = Local::now().naive_local() + chrono::Duration::seconds(1);

    assert_eq!(
        record.columns,
        vec![
            ColumnSpec::new("id", ColumnType::Integer),
            ColumnSpec::new("name", ColumnType::Varchar),
        ]
    );
    assert_eq!(record.sample_len(), 2);
    let stamp = parse_stamp(&record.last_updated);
    assert!(before <= stamp && stamp <= after, "last_updated should be now");

    let dir = TempDir::new().expect("temp dir");
    let store = CatalogStore::new(dir.path(), 5);
    let outcome = store.save(&record).expect("record should save");
    assert_eq!(outcome.json_path, dir.path().join("Acme").join("t1.json"));
    assert!(!outcome.replaced);
    assert!(outcome.sync_warning.is_none());

    let index = build_index(dir.path());
    let entry = find_entry(&index.entries, "Acme", "t1").expect("saved record should be indexed");
    assert_eq!(entry.record, record);
}

#[test]
fn second_save_with_same_key_overwrites_the_first() {
    let dir = TempDir::new().expect("temp dir");
    let store = CatalogStore::new(dir.path(), 5);

    let mut first = RecordDraft::new("Acme", "t1");
    first.description = "first payload".to_string();
    first.add_custom_field("stale", "yes").expect("custom field");
    store
        .save(&normalize_manual(&first))
        .expect("first save");

    let mut second = RecordDraft::new("Acme", "t1");
    second.description = "second payload".to_string();
    let second_record = normalize_manual(&second);
    let outcome = store.save(&second_record).expect("second save");
    assert!(outcome.replaced);

    let stored = store.load_record("Acme", "t1").expect("record should load");
    assert_eq!(stored, second_record);
    assert!(stored.custom_fields.is_empty(), "overwrite must not merge");

    let raw = fs::read_to_string(&outcome.json_path).expect("json file");
    let reparsed: serde_json::Value = serde_json::from_str(&raw).expect("stored json");
    assert_eq!(reparsed["description"], "second payload");
}

#[test]
fn samples_are_capped_when_saved() {
    let dir = TempDir::new().expect("temp dir");
    let store = CatalogStore::new(dir.path(), 5);
    let content: String = std::iter::once("n".to_string())
        .chain((1..=12).map(|i| i.to_string()))
        .collect::<Vec<_>>()
        .join("\n");
    let mut draft = RecordDraft::new("Acme", "numbers");
    draft.title = "Numbers".to_string();
    let record = normalize(&format!("{content}\n"), FormatTag::Tsv, &draft).expect("tsv");
    assert_eq!(record.sample_len(), 12);

    store.save(&record).expect("save");
    let stored = store.load_record("Acme", "numbers").expect("load");
    assert_eq!(stored.sample_len(), 5);
    let Some(DataSample::Rows(rows)) = stored.data_sample else {
        panic!("expected rows");
    };
    assert_eq!(rows[4]["n"], 5);
}

#[test]
fn sync_failure_is_a_warning_after_a_durable_write() {
    let dir = TempDir::new().expect("temp dir");
    let store = CatalogStore::new(dir.path(), 5).with_sync(Box::new(FailingSync));
    let record = normalize_manual(&RecordDraft::new("Acme", "t1"));

    let outcome = store.save(&record).expect("local write should still succeed");
    let warning = outcome.sync_warning.expect("sync failure should be reported");
    assert!(warning.contains("remote rejected push"));
    assert!(outcome.json_path.is_file());
    assert!(outcome.text_path.is_file());
}

#[test]
fn missing_table_name_is_rejected_before_any_write() {
    let dir = TempDir::new().expect("temp dir");
    let store = CatalogStore::new(dir.path(), 5);
    let record = normalize_manual(&RecordDraft::new("Acme", "  "));
    let err = store.save(&record).expect_err("table_name is required");
    assert!(matches!(
        err,
        CatalogError::MissingRequiredField { field: "table_name" }
    ));
    assert!(!dir.path().join("Acme").exists());
}

#[test]
fn uploads_choose_the_format_from_the_extension() {
    let dir = TempDir::new().expect("temp dir");
    let tsv = dir.path().join("codes.tsv");
    fs::write(&tsv, "code\tlabel\n75\tParis\n").expect("write");
    let txt = dir.path().join("paste.txt");
    fs::write(&txt, "[{\"a\": 1}]").expect("write");
    let other = dir.path().join("data.parquet");
    fs::write(&other, "PAR1").expect("write");

    let upload = load_upload(&tsv).expect("tsv upload");
    assert!(matches!(
        upload,
        Upload::Text {
            format: FormatTag::Tsv,
            ..
        }
    ));
    let record = normalize_upload(&upload, &RecordDraft::new("Ville", "codes")).expect("normalize");
    assert_eq!(record.columns[0].column_type, ColumnType::Integer);

    assert!(matches!(
        load_upload(&txt).expect("txt upload"),
        Upload::Text {
            format: FormatTag::Json,
            ..
        }
    ));

    let err = load_upload(&other).expect_err("unsupported extension");
    assert_eq!(err.kind(), "parse_failure");
}

#[test]
fn spreadsheet_tables_infer_like_delimited_text() {
    let table = metacat::catalog::table::parse_delimited("a,b\n1,x\n2,y", b',').expect("table");
    let columns = infer_columns(&table);
    assert_eq!(columns[0].column_type, ColumnType::Integer);
    let record = normalize_upload(&Upload::Table(table), &RecordDraft::new("Acme", "sheet"))
        .expect("table upload");
    assert_eq!(record.sample_len(), 2);
    assert_eq!(record.columns, columns);
}

#[test]
fn xlsx_uploads_read_the_first_sheet() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/communes.xlsx");
    let Upload::Table(table) = load_upload(&path).expect("xlsx upload should load") else {
        panic!("spreadsheets should load as tables");
    };

    assert_eq!(table.headers, vec!["code", "Unnamed: 1", "date", "code.1"]);
    assert_eq!(table.rows.len(), 2, "the empty third row should be dropped");
    assert_eq!(table.rows[0][0].as_deref(), Some("75"));
    assert_eq!(table.rows[0][1].as_deref(), Some("Paris"));
    assert_eq!(table.rows[0][2].as_deref(), Some("2024-03-01 00:00:00"));
    assert_eq!(table.rows[0][3].as_deref(), Some("1.5"));
    assert_eq!(table.rows[1][3].as_deref(), Some("2"));

    let types: Vec<ColumnType> = infer_columns(&table).iter().map(|c| c.column_type).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Integer,
            ColumnType::Varchar,
            ColumnType::Timestamp,
            ColumnType::Numeric,
        ]
    );

    let record = normalize_upload(&Upload::Table(table), &RecordDraft::new("INSEE", "communes"))
        .expect("table upload should normalize");
    assert_eq!(record.sample_len(), 2);
}
