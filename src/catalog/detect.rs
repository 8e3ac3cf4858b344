//! Classify pasted or uploaded text as JSON, CSV, TSV or plain text. Never fails.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::table::parse_sniffed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Json,
    Csv,
    Tsv,
    Text,
}

impl FormatTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "text" | "txt" => Ok(Self::Text),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

/// Priority: JSON (bracketed and valid), then sniffed delimited text with more than one
/// column, then multi-line text containing tabs, then plain text.
pub fn detect(content: &str) -> FormatTag {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return FormatTag::Text;
    }

    if is_bracketed(trimmed) && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return FormatTag::Json;
    }

    if parse_sniffed(trimmed).is_some_and(|table| table.width() > 1) {
        return FormatTag::Csv;
    }

    let mut lines = trimmed.lines();
    let multi_line = lines.next().is_some() && lines.next().is_some();
    if multi_line && trimmed.lines().any(|line| line.contains('\t')) {
        return FormatTag::Tsv;
    }

    FormatTag::Text
}

fn is_bracketed(trimmed: &str) -> bool {
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(r#"{"title": "Emplois"}"#, FormatTag::Json)]
    #[case("  [1, 2, 3]\n", FormatTag::Json)]
    #[case("id,name\n1,Alice\n2,Bob", FormatTag::Csv)]
    #[case("city;price\nLyon;3,5", FormatTag::Csv)]
    #[case("a\tb\n1\t2", FormatTag::Tsv)]
    #[case("just a note\nwith two lines", FormatTag::Text)]
    #[case("single\tline", FormatTag::Text)]
    #[case("", FormatTag::Text)]
    fn classifies_content(#[case] content: &str, #[case] expected: FormatTag) {
        assert_eq!(detect(content), expected);
    }

    #[test]
    fn malformed_json_degrades_instead_of_failing() {
        assert_eq!(detect("{not json}"), FormatTag::Text);
        // Brackets but not JSON, still comma separated.
        assert_eq!(detect("[a,b]\n[c,d]"), FormatTag::Csv);
    }

    #[test]
    fn detected_json_reparses_losslessly() {
        let content = r#"{"a":[1,2.5,"x",null,true],"b":{"c":"é"}}"#;
        assert_eq!(detect(content), FormatTag::Json);
        let first: serde_json::Value = serde_json::from_str(content).expect("json");
        let again: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&first).expect("serialize"))
                .expect("reparse");
        assert_eq!(first, again);
    }

    #[test]
    fn format_tags_parse_from_cli_spelling() {
        assert_eq!("TSV".parse::<FormatTag>(), Ok(FormatTag::Tsv));
        assert_eq!("txt".parse::<FormatTag>(), Ok(FormatTag::Text));
        assert!("xml".parse::<FormatTag>().is_err());
    }
}
