//! Raw tabular input: delimited text (sniffed or explicit separator) and spreadsheets.
//! First row is always the header; missing cells are `None`.

use std::collections::HashMap;
use std::path::Path;

use calamine::Reader;

use crate::catalog::record::TIMESTAMP_FORMAT;
use crate::error::{CatalogError, Result};

/// Separators tried when sniffing comma-style text. Tabs are classified separately as TSV.
pub const SNIFF_DELIMITERS: [u8; 3] = [b',', b';', b'|'];

/// Records inspected when sniffing; the full parse still checks every row.
const SNIFF_SAMPLE_RECORDS: usize = 20;

/// Cell spellings treated as missing (compared case-insensitively after trimming).
const MISSING_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none", "#n/a"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Cells of one column in row order; short rows yield `None`.
    pub fn column(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).and_then(|cell| cell.as_deref()))
    }
}

pub fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    MISSING_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
}

/// Pick the separator that splits every sampled record into the same number (> 1) of fields.
/// Widest consistent split wins; ties go to the earlier candidate.
pub fn sniff_delimiter(content: &str) -> Option<u8> {
    let mut best: Option<(u8, usize)> = None;
    for delimiter in SNIFF_DELIMITERS {
        let Some(width) = consistent_width(content, delimiter) else {
            continue;
        };
        if best.map_or(true, |(_, best_width)| width > best_width) {
            best = Some((delimiter, width));
        }
    }
    best.map(|(delimiter, _)| delimiter)
}

fn consistent_width(content: &str, delimiter: u8) -> Option<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut width = None;
    for record in reader.records().take(SNIFF_SAMPLE_RECORDS) {
        let len = record.ok()?.len();
        match width {
            None => width = Some(len),
            Some(w) if w != len => return None,
            Some(_) => {}
        }
    }
    width.filter(|w| *w > 1)
}

/// Parse with an explicit separator. Rows longer than the header are a parse failure,
/// shorter rows are padded with missing cells.
pub fn parse_delimited(content: &str, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let Some(header) = records.next() else {
        return Ok(Table::default());
    };
    let header = header.map_err(|err| CatalogError::parse("tabular input", err))?;
    let headers = mangle_headers(header.iter().map(str::to_string).collect());

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record.map_err(|err| CatalogError::parse("tabular input", err))?;
        if record.len() > headers.len() {
            return Err(CatalogError::parse(
                "tabular input",
                format!(
                    "row {} has {} fields, expected {}",
                    index + 1,
                    record.len(),
                    headers.len()
                ),
            ));
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|cell| (!is_missing(cell)).then(|| cell.to_string()))
            .collect();
        row.resize(headers.len(), None);
        rows.push(row);
    }

    Ok(Table { headers, rows })
}

/// Sniff the separator and parse. `None` when the text is not consistently delimited.
pub fn parse_sniffed(content: &str) -> Option<Table> {
    let delimiter = sniff_delimiter(content)?;
    parse_delimited(content, delimiter).ok()
}

/// Empty headers become `Unnamed: <i>`, repeats get `.1`, `.2` suffixes.
fn mangle_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(index, name)| {
            let name = name.trim();
            let base = if name.is_empty() {
                format!("Unnamed: {index}")
            } else {
                name.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let unique = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

/// Load the first sheet of an xlsx/xls/ods workbook. Fully empty rows are dropped.
pub fn read_spreadsheet(path: &Path) -> Result<Table> {
    let source_name = path.display().to_string();
    let mut workbook =
        calamine::open_workbook_auto(path).map_err(|err| CatalogError::parse(&source_name, err))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| CatalogError::parse(&source_name, "workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| CatalogError::parse(&source_name, err))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let headers = mangle_headers(
        header
            .iter()
            .map(|cell| cell_text(cell).unwrap_or_default())
            .collect(),
    );

    let rows = rows
        .map(|row| {
            let mut cells: Vec<Option<String>> = row.iter().map(cell_text).collect();
            cells.resize(headers.len(), None);
            cells
        })
        .filter(|cells| cells.iter().any(Option::is_some))
        .collect();

    Ok(Table { headers, rows })
}

fn cell_text(cell: &calamine::Data) -> Option<String> {
    let text = match cell {
        calamine::Data::Empty | calamine::Data::Error(_) => return None,
        calamine::Data::String(s) => s.trim().to_string(),
        calamine::Data::Int(i) => i.to_string(),
        // Whole floats come back from Excel for integer cells.
        calamine::Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        calamine::Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        calamine::Data::DateTimeIso(s) | calamine::Data::DurationIso(s) => s.clone(),
    };
    (!is_missing(&text)).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_semicolons_over_commas_in_decimal_data() {
        let content = "city;price\nLyon;3,5\nNantes;4,0";
        assert_eq!(sniff_delimiter(content), Some(b';'));
    }

    #[test]
    fn inconsistent_rows_do_not_sniff() {
        let content = "Hello, world. This is, a test\nSecond line";
        assert_eq!(sniff_delimiter(content), None);
        assert!(parse_sniffed(content).is_none());
    }

    #[test]
    fn tab_separated_text_is_not_sniffed_as_comma_style() {
        assert_eq!(sniff_delimiter("a\tb\n1\t2"), None);
    }

    #[test]
    fn parses_missing_cells_and_pads_short_rows() {
        let table = parse_delimited("a,b,c\n1,,NA\n2", b',').expect("table");
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.rows[0], vec![Some("1".to_string()), None, None]);
        assert_eq!(table.rows[1], vec![Some("2".to_string()), None, None]);
        assert_eq!(table.column(0).collect::<Vec<_>>(), vec![Some("1"), Some("2")]);
    }

    #[test]
    fn long_rows_are_a_parse_failure() {
        let err = parse_delimited("a,b\n1,2,3", b',').expect_err("too many fields");
        assert_eq!(err.kind(), "parse_failure");
    }

    #[test]
    fn quoted_separators_stay_in_one_cell() {
        let table = parse_delimited("name,city\n\"Doe, Jane\",Paris", b',').expect("table");
        assert_eq!(table.rows[0][0].as_deref(), Some("Doe, Jane"));
    }

    #[test]
    fn headers_are_mangled_like_dataframes() {
        let table = parse_delimited("id,,id,id\n1,2,3,4", b',').expect("table");
        assert_eq!(table.headers, vec!["id", "Unnamed: 1", "id.1", "id.2"]);
    }
}
