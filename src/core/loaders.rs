//! Loader for regional signal statistics CSV files.
//!
//! The expected file has one row per regency/city with the columns
//! `KABUPATEN JAWA BARAT`, `BTS`, `SINYAL KUAT`, `SINYAL LEMAH`,
//! `TIDAK ADA SINYAL` and `4G/LTE`. Extra columns are ignored.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use csv::ReaderBuilder;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Region name column.
pub const COL_REGION: &str = "KABUPATEN JAWA BARAT";
/// Base transceiver station count column.
pub const COL_BTS: &str = "BTS";
/// Strong signal column.
pub const COL_STRONG: &str = "SINYAL KUAT";
/// Weak signal column.
pub const COL_WEAK: &str = "SINYAL LEMAH";
/// No signal column.
pub const COL_NO_SIGNAL: &str = "TIDAK ADA SINYAL";
/// 4G/LTE coverage column.
pub const COL_LTE: &str = "4G/LTE";

/// All columns the loader requires, in file order.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_REGION,
    COL_BTS,
    COL_STRONG,
    COL_WEAK,
    COL_NO_SIGNAL,
    COL_LTE,
];

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error at row {row}, column '{column}': {message}")]
    Parse {
        row: usize,
        column: String,
        message: String,
    },

    #[error("Duplicate region '{0}'")]
    DuplicateRegion(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One row of the signal statistics table.
///
/// Numeric fields are optional so that an empty cell survives loading; the
/// pipeline decides whether the column is needed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionRecord {
    pub region_name: String,
    pub bts_count: Option<u64>,
    pub strong_signal: Option<f64>,
    pub weak_signal: Option<f64>,
    pub no_signal: Option<f64>,
    pub lte_coverage: Option<f64>,
}

impl RegionRecord {
    /// Creates a record with every numeric field present.
    pub fn new(
        region_name: impl Into<String>,
        bts_count: u64,
        strong_signal: f64,
        weak_signal: f64,
        no_signal: f64,
        lte_coverage: f64,
    ) -> Self {
        Self {
            region_name: region_name.into(),
            bts_count: Some(bts_count),
            strong_signal: Some(strong_signal),
            weak_signal: Some(weak_signal),
            no_signal: Some(no_signal),
            lte_coverage: Some(lte_coverage),
        }
    }

    /// Region name normalized for lookups.
    pub fn normalized_name(&self) -> String {
        normalize_region_name(&self.region_name)
    }
}

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Normalize a region name: trim, collapse whitespace runs, uppercase.
pub fn normalize_region_name(name: &str) -> String {
    whitespace().replace_all(name.trim(), " ").to_uppercase()
}

/// Load signal records from a CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, lacks a required column,
/// holds no data rows, or contains a malformed value.
pub fn load_signal_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RegionRecord>> {
    let path = path.as_ref();
    let bytes = read_signal_bytes(path)?;
    parse_signal_csv(bytes.as_slice(), &path.display().to_string())
}

/// Read the raw bytes of a signal CSV file.
pub fn read_signal_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse signal records from any reader. `source` names the input in errors.
pub fn parse_signal_csv<R: Read>(reader: R, source: &str) -> Result<Vec<RegionRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_uppercase(), i))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !col_map.contains_key(*col))
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns(missing.join(", ")));
    }

    let idx = |col: &str| col_map[col];
    let (region_idx, bts_idx) = (idx(COL_REGION), idx(COL_BTS));
    let (strong_idx, weak_idx) = (idx(COL_STRONG), idx(COL_WEAK));
    let (none_idx, lte_idx) = (idx(COL_NO_SIGNAL), idx(COL_LTE));

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (i, result) in reader.records().enumerate() {
        let record = result?;
        // 1-based, header is row 1
        let row = i + 2;

        let region_name = record.get(region_idx).unwrap_or("").to_string();
        if region_name.is_empty() {
            return Err(LoaderError::Parse {
                row,
                column: COL_REGION.to_string(),
                message: "region name is empty".to_string(),
            });
        }
        if !seen.insert(normalize_region_name(&region_name)) {
            return Err(LoaderError::DuplicateRegion(region_name));
        }

        let cell = |col_idx: usize| record.get(col_idx).unwrap_or("");

        records.push(RegionRecord {
            bts_count: parse_count(cell(bts_idx), row, COL_BTS)?,
            strong_signal: parse_measure(cell(strong_idx), row, COL_STRONG)?,
            weak_signal: parse_measure(cell(weak_idx), row, COL_WEAK)?,
            no_signal: parse_measure(cell(none_idx), row, COL_NO_SIGNAL)?,
            lte_coverage: parse_measure(cell(lte_idx), row, COL_LTE)?,
            region_name,
        });
    }

    if records.is_empty() {
        return Err(LoaderError::EmptyFile(source.to_string()));
    }

    log::debug!("{}: loaded {} regions", source, records.len());
    Ok(records)
}

fn parse_count(raw: &str, row: usize, column: &str) -> Result<Option<u64>> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>().map(Some).map_err(|_| LoaderError::Parse {
        row,
        column: column.to_string(),
        message: format!("'{}' is not a non-negative integer", raw),
    })
}

fn parse_measure(raw: &str, row: usize, column: &str) -> Result<Option<f64>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let invalid = |message: String| LoaderError::Parse {
        row,
        column: column.to_string(),
        message,
    };
    let value: f64 = raw
        .parse()
        .map_err(|_| invalid(format!("'{}' is not a number", raw)))?;
    if !value.is_finite() {
        return Err(invalid(format!("'{}' is not finite", raw)));
    }
    if value < 0.0 {
        return Err(invalid(format!("{} is negative", value)));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "KABUPATEN JAWA BARAT,BTS,SINYAL KUAT,SINYAL LEMAH,TIDAK ADA SINYAL,4G/LTE";

    #[test]
    fn test_normalize_region_name() {
        assert_eq!(normalize_region_name("  Kota   Bandung "), "KOTA BANDUNG");
        assert_eq!(normalize_region_name("kabupaten\tbogor"), "KABUPATEN BOGOR");
        assert_eq!(normalize_region_name("GARUT"), "GARUT");
    }

    #[test]
    fn test_load_signal_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "KABUPATEN BOGOR,1200,800,50,5,600").unwrap();
        writeln!(file, "KOTA BANDUNG,900,790.5,60,6,590").unwrap();
        file.flush().unwrap();

        let records = load_signal_csv(file.path())?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], RegionRecord::new("KABUPATEN BOGOR", 1200, 800.0, 50.0, 5.0, 600.0));
        assert_eq!(records[1].strong_signal, Some(790.5));
        Ok(())
    }

    #[test]
    fn test_extra_columns_and_header_whitespace() -> Result<()> {
        let data = "NO, KABUPATEN JAWA BARAT ,BTS,SINYAL KUAT,SINYAL LEMAH,TIDAK ADA SINYAL,4G/LTE,TAHUN\n\
                    1,GARUT,10,800,50,5,600,2023\n";
        let records = parse_signal_csv(data.as_bytes(), "inline")?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].region_name, "GARUT");
        assert_eq!(records[0].bts_count, Some(10));
        Ok(())
    }

    #[test]
    fn test_empty_cell_is_none() -> Result<()> {
        let data = format!("{}\nGARUT,,800,50,5,\n", HEADER);
        let records = parse_signal_csv(data.as_bytes(), "inline")?;
        assert_eq!(records[0].bts_count, None);
        assert_eq!(records[0].lte_coverage, None);
        assert_eq!(records[0].strong_signal, Some(800.0));
        Ok(())
    }

    #[test]
    fn test_missing_columns() {
        let data = "KABUPATEN JAWA BARAT,BTS,SINYAL KUAT\nGARUT,10,800\n";
        match parse_signal_csv(data.as_bytes(), "inline") {
            Err(LoaderError::MissingColumns(cols)) => {
                assert!(cols.contains("SINYAL LEMAH"));
                assert!(cols.contains("4G/LTE"));
                assert!(!cols.contains("BTS"));
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_value() {
        let data = format!("{}\nGARUT,10,banyak,50,5,600\n", HEADER);
        match parse_signal_csv(data.as_bytes(), "inline") {
            Err(LoaderError::Parse { row, column, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(column, COL_STRONG);
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_and_non_finite_values() {
        let negative = format!("{}\nGARUT,10,-1,50,5,600\n", HEADER);
        assert!(matches!(
            parse_signal_csv(negative.as_bytes(), "inline"),
            Err(LoaderError::Parse { .. })
        ));

        let infinite = format!("{}\nGARUT,10,inf,50,5,600\n", HEADER);
        assert!(matches!(
            parse_signal_csv(infinite.as_bytes(), "inline"),
            Err(LoaderError::Parse { .. })
        ));

        let fractional_bts = format!("{}\nGARUT,10.5,800,50,5,600\n", HEADER);
        assert!(matches!(
            parse_signal_csv(fractional_bts.as_bytes(), "inline"),
            Err(LoaderError::Parse { .. })
        ));
    }

    #[test]
    fn test_duplicate_region() {
        let data = format!("{}\nGarut,10,800,50,5,600\n GARUT ,12,790,60,6,590\n", HEADER);
        assert!(matches!(
            parse_signal_csv(data.as_bytes(), "inline"),
            Err(LoaderError::DuplicateRegion(_))
        ));
    }

    #[test]
    fn test_header_only_is_empty() {
        let data = format!("{}\n", HEADER);
        assert!(matches!(
            parse_signal_csv(data.as_bytes(), "inline"),
            Err(LoaderError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load_signal_csv("/nonexistent/Sinyal.csv");
        assert!(matches!(result, Err(LoaderError::Io { .. })));
    }
}
