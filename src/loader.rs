// CSV loading with encoding fallback.
//
// Survey exports come from several tools and their encodings are unknown, so
// every file is decoded by trying an ordered list of encodings before the CSV
// reader sees it. Failures are typed (`LoadError`) and never abort a run: the
// caller logs them and the section is treated as empty.
use crate::error::{LoadError, LoadResult};
use crate::types::{SurveyRow, SurveyTable};
use crate::util::{collapse_whitespace, normalize_period};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Header names accepted for the respondent identifier.
pub const ENTITY_COLUMNS: [&str; 3] = ["UserId", "User ID", "User_ID"];
/// Header of the organizational-unit column.
pub const UNIT_COLUMN: &str = "Department/Region";
/// Header names accepted for the period column.
pub const PERIOD_COLUMNS: [&str; 2] = ["YEAR", "year"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "utf-8-sig")]
    Utf8Sig,
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "latin-1")]
    Latin1,
    #[serde(rename = "cp1252")]
    Cp1252,
    #[serde(rename = "iso-8859-1")]
    Iso8859_1,
}

impl Encoding {
    pub const DEFAULT_ORDER: [Encoding; 5] = [
        Encoding::Utf8Sig,
        Encoding::Utf8,
        Encoding::Latin1,
        Encoding::Cp1252,
        Encoding::Iso8859_1,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Utf8Sig => "utf-8-sig",
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
            Encoding::Cp1252 => "cp1252",
            Encoding::Iso8859_1 => "iso-8859-1",
        }
    }

    /// Strict decode; `None` if the bytes are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Encoding::Utf8Sig => {
                let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(str::to_string)
            }
            Encoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            // Every byte maps to the code point of the same value.
            Encoding::Latin1 | Encoding::Iso8859_1 => {
                Some(bytes.iter().map(|&b| b as char).collect())
            }
            Encoding::Cp1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|s| s.into_owned()),
        }
    }
}

/// Counters collected while loading, printed after option [1].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub files_loaded: usize,
    pub files_missing: usize,
    pub files_unreadable: usize,
    pub total_rows: usize,
    pub parse_errors: usize,
}

/// Read a file and decode it with the first encoding in `encodings` that
/// accepts its bytes, then parse it as CSV. The second tuple element counts
/// lines the CSV reader rejected.
pub fn read_with_fallback(path: &Path, encodings: &[Encoding]) -> LoadResult<(SurveyTable, usize)> {
    let bytes = read_bytes(path)?;
    for enc in encodings {
        if let Some(text) = enc.decode(&bytes) {
            debug!("{} decoded as {}", path.display(), enc.label());
            return parse_table(path, &text);
        }
    }
    Err(LoadError::Decode {
        path: path.to_path_buf(),
        tried: encodings.iter().map(|e| e.label().to_string()).collect(),
    })
}

/// Non-fatal loader used by the report flow.
///
/// Missing, unreadable and malformed files are logged and yield `None`. When
/// no listed encoding fits, the file is read once more as lossy UTF-8.
pub fn load_table(path: &Path, encodings: &[Encoding], report: &mut LoadReport) -> Option<SurveyTable> {
    let result = match read_with_fallback(path, encodings) {
        Err(LoadError::Decode { .. }) => {
            warn!(
                "{}: no configured encoding matched, reading as lossy UTF-8",
                path.display()
            );
            read_bytes(path).and_then(|bytes| parse_table(path, &String::from_utf8_lossy(&bytes)))
        }
        other => other,
    };
    match result {
        Ok((table, parse_errors)) => {
            report.files_loaded += 1;
            report.total_rows += table.rows.len();
            report.parse_errors += parse_errors;
            Some(table)
        }
        Err(e @ LoadError::NotFound { .. }) => {
            warn!("{}", e);
            report.files_missing += 1;
            None
        }
        Err(e) => {
            warn!("{}", e);
            report.files_unreadable += 1;
            None
        }
    }
}

fn read_bytes(path: &Path) -> LoadResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound { path: path.to_path_buf() }
        } else {
            LoadError::Io { path: path.to_path_buf(), source }
        }
    })
}

fn column_position(headers: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|n| headers.iter().position(|h| h.as_str() == *n))
}

fn parse_table(path: &Path, text: &str) -> LoadResult<(SurveyTable, usize)> {
    let csv_err = |source| LoadError::Csv { path: path.to_path_buf(), source };
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| collapse_whitespace(h.trim_start_matches('\u{feff}')))
        .collect();

    let entity_idx = column_position(&headers, &ENTITY_COLUMNS);
    let unit_idx = column_position(&headers, &[UNIT_COLUMN]);
    let period_idx = column_position(&headers, &PERIOD_COLUMNS);

    let mut rows = Vec::new();
    let mut parse_errors = 0usize;
    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("{}: skipping line: {}", path.display(), e);
                parse_errors += 1;
                continue;
            }
        };
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        let responses: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(SurveyRow {
            entity_id: cell(entity_idx).trim().to_string(),
            organizational_unit: unit_idx.map(|_| cell(unit_idx).trim().to_string()),
            period: normalize_period(cell(period_idx)),
            responses,
        });
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((SurveyTable { name, headers, rows }, parse_errors))
}
