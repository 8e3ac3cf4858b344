use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;

use crate::catalog::detect::detect;
use crate::catalog::export::{export_record, ExportFormat};
use crate::catalog::index::{build_index, load_catalog, scan_storage};
use crate::catalog::infer::infer_columns;
use crate::catalog::normalize::{inspect, load_upload, normalize_upload, Upload};
use crate::catalog::query::{find_entry, search, ALL_PRODUCERS};
use crate::catalog::record::{EntrySummary, RecordDraft};
use crate::catalog::store::CatalogStore;
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::server;

const USAGE: &str =
    "usage: metacat <serve|index|search|detect|infer|ingest|show|export|validate>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Index,
    Search,
    Detect,
    Infer,
    Ingest,
    Show,
    Export,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("index") => Some(Command::Index),
        Some("search") => Some(Command::Search),
        Some("detect") => Some(Command::Detect),
        Some("infer") => Some(Command::Infer),
        Some("ingest") => Some(Command::Ingest),
        Some("show") => Some(Command::Show),
        Some("export") => Some(Command::Export),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    let Some(command) = parse_command(args) else {
        eprintln!("{USAGE}");
        return 2;
    };
    let config = CatalogConfig::load();
    match command {
        Command::Serve => handle_serve(config),
        Command::Index => handle_index(&config, args),
        Command::Search => handle_search(&config, args),
        Command::Detect => handle_detect(args),
        Command::Infer => handle_infer(args),
        Command::Ingest => handle_ingest(&config, args),
        Command::Show => handle_show(&config, args),
        Command::Export => handle_export(&config, args),
        Command::Validate => handle_validate(&config, args),
    }
}

fn handle_serve(config: CatalogConfig) -> i32 {
    match server::run_server(config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn print_json<T: Serialize>(payload: &T) -> i32 {
    match serde_json::to_string_pretty(payload) {
        Ok(body) => {
            println!("{body}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize output: {err}");
            1
        }
    }
}

fn handle_index(config: &CatalogConfig, args: &[String]) -> i32 {
    let root = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.storage_root.clone());
    let index = build_index(&root);
    for warning in &index.warnings {
        eprintln!("warning: {warning}");
    }
    let entries: Vec<EntrySummary> = index.entries.iter().map(|e| e.summary()).collect();
    print_json(&json!({
        "source": index.source,
        "total": entries.len(),
        "entries": entries,
    }))
}

fn handle_search(config: &CatalogConfig, args: &[String]) -> i32 {
    let keyword = args.get(2).map(|k| k.trim()).unwrap_or("");
    let producer = args.get(3).map(String::as_str).unwrap_or(ALL_PRODUCERS);

    let index = load_catalog(config);
    for warning in &index.warnings {
        eprintln!("warning: {warning}");
    }
    let results: Vec<EntrySummary> = search(&index.entries, keyword, producer)
        .into_iter()
        .map(|e| e.summary())
        .collect();
    print_json(&json!({
        "source": index.source,
        "count": results.len(),
        "entries": results,
    }))
}

/// Read a path, or stdin for `-`.
fn read_text_input(path: &str) -> Result<String, CatalogError> {
    if path == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map_err(|err| CatalogError::io("<stdin>", err))?;
        return Ok(content);
    }
    std::fs::read_to_string(path).map_err(|err| CatalogError::io(path, err))
}

fn read_upload(path: &str) -> Result<Upload, CatalogError> {
    if path == "-" {
        let content = read_text_input(path)?;
        let format = detect(&content);
        return Ok(Upload::Text { content, format });
    }
    load_upload(Path::new(path))
}

fn handle_detect(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: metacat detect <file|->");
        return 2;
    };
    match read_text_input(path) {
        Ok(content) => {
            println!("{}", detect(&content));
            0
        }
        Err(err) => {
            eprintln!("detect failed: {err}");
            1
        }
    }
}

fn handle_infer(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: metacat infer <file|->");
        return 2;
    };
    let inspection = read_upload(path).and_then(|upload| match upload {
        Upload::Text { content, .. } => inspect(&content).map(|found| {
            json!({
                "format": found.format,
                "row_count": found.row_count,
                "columns": found.columns,
            })
        }),
        Upload::Table(table) => Ok(json!({
            "format": "spreadsheet",
            "row_count": table.rows.len(),
            "columns": infer_columns(&table),
        })),
    });
    match inspection {
        Ok(payload) => print_json(&payload),
        Err(err) => {
            eprintln!("infer failed: {err}");
            1
        }
    }
}

#[derive(Debug, Default)]
struct IngestArgs {
    path: Option<String>,
    draft: RecordDraft,
}

fn parse_ingest_args(args: &[String]) -> Result<IngestArgs, String> {
    let mut parsed = IngestArgs::default();
    let mut iter = args.iter().skip(2);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} needs a value"))
        };
        match arg.as_str() {
            "--producer" => parsed.draft.producer = value("--producer")?,
            "--table" => parsed.draft.table_name = value("--table")?,
            "--title" => parsed.draft.title = value("--title")?,
            "--description" => parsed.draft.description = value("--description")?,
            "--field" => {
                let raw = value("--field")?;
                let (key, val) = raw
                    .split_once('=')
                    .ok_or_else(|| format!("--field expects key=value, got '{raw}'"))?;
                parsed
                    .draft
                    .add_custom_field(key, val)
                    .map_err(|err| err.to_string())?;
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option '{flag}'")),
            positional if parsed.path.is_none() => parsed.path = Some(positional.to_string()),
            extra => return Err(format!("unexpected argument '{extra}'")),
        }
    }
    Ok(parsed)
}

fn handle_ingest(config: &CatalogConfig, args: &[String]) -> i32 {
    let usage = "usage: metacat ingest <file|-> --producer P --table T [--title X] [--description Y] [--field key=value]...";
    let parsed = match parse_ingest_args(args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{usage}");
            return 2;
        }
    };
    let Some(path) = parsed.path else {
        eprintln!("{usage}");
        return 2;
    };

    let store = CatalogStore::from_config(config);
    let saved = read_upload(&path)
        .and_then(|upload| normalize_upload(&upload, &parsed.draft))
        .and_then(|record| store.save(&record));
    match saved {
        Ok(outcome) => {
            if let Some(warning) = &outcome.sync_warning {
                eprintln!("warning: {warning}");
            }
            print_json(&json!({
                "status": "saved",
                "path": outcome.json_path,
                "replaced": outcome.replaced,
                "table_name": outcome.record.table_name,
                "producer": outcome.record.producer,
                "columns": outcome.record.columns,
            }))
        }
        Err(err) => {
            eprintln!("ingest failed: {err}");
            1
        }
    }
}

fn handle_show(config: &CatalogConfig, args: &[String]) -> i32 {
    let (Some(producer), Some(table_name)) = (args.get(2), args.get(3)) else {
        eprintln!("usage: metacat show <producer> <table_name>");
        return 2;
    };
    let index = load_catalog(config);
    match find_entry(&index.entries, producer, table_name) {
        Some(entry) => print_json(&entry.record),
        None => {
            eprintln!("no record '{table_name}' for producer '{producer}'");
            1
        }
    }
}

fn handle_export(config: &CatalogConfig, args: &[String]) -> i32 {
    let (Some(producer), Some(table_name), Some(raw_format)) =
        (args.get(2), args.get(3), args.get(4))
    else {
        eprintln!("usage: metacat export <producer> <table_name> <json|csv|flat>");
        return 2;
    };
    let format = match raw_format.parse::<ExportFormat>() {
        Ok(format) => format,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };

    let index = load_catalog(config);
    let Some(entry) = find_entry(&index.entries, producer, table_name) else {
        eprintln!("no record '{table_name}' for producer '{producer}'");
        return 1;
    };
    match export_record(&entry.record, format) {
        Ok(body) => {
            print!("{body}");
            if !body.ends_with('\n') {
                println!();
            }
            0
        }
        Err(err) => {
            eprintln!("export failed: {err}");
            1
        }
    }
}

fn handle_validate(config: &CatalogConfig, args: &[String]) -> i32 {
    let root = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.storage_root.clone());
    match scan_storage(&root) {
        Ok(report) => {
            let malformed = report.warnings.len();
            if malformed == 0 {
                println!(
                    "validation passed: {} record(s) under {}",
                    report.entries.len(),
                    root.display()
                );
                0
            } else {
                eprintln!(
                    "validation failed: {malformed} of {} file(s) could not be loaded",
                    report.candidates
                );
                for warning in report.warnings {
                    eprintln!("- {warning}");
                }
                1
            }
        }
        Err(err) => {
            eprintln!("validation failed: {err}");
            1
        }
    }
}
