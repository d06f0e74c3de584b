//! Utility functions for the model module. Contains helpers to read delimited files and to report data issues.

use super::error::DatasetError;
use log::{error, warn};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// A problem found in a single row of a dataset. Loading goes on after recording it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    details: String,
    data: Vec<String>,
}

impl ValidationError {
    pub fn new(msg: &str, data: Vec<String>) -> ValidationError {
        ValidationError {
            details: msg.to_string(),
            data,
        }
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn data(&self) -> &[String] {
        &self.data
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.data.is_empty() {
            write!(f, "{}", self.details)
        } else {
            write!(f, "{} ({})", self.details, self.data.join(", "))
        }
    }
}

impl Error for ValidationError {}

pub fn get_delimiter(filepath: &Path) -> Result<u8, DatasetError> {
    let suffix = match filepath.extension().and_then(|s| s.to_str()) {
        Some(suffix) => suffix.to_lowercase(),
        None => {
            return Err(DatasetError::UnsupportedFileType {
                suffix: "<none>".to_string(),
            })
        }
    };

    match suffix.as_str() {
        "csv" => Ok(b','),
        "tsv" => Ok(b'\t'),
        "txt" => Ok(b' '),
        _ => Err(DatasetError::UnsupportedFileType { suffix }),
    }
}

pub fn parse_csv_error(e: &csv::Error) -> String {
    match *e.kind() {
        csv::ErrorKind::Deserialize {
            pos: Some(ref pos),
            ref err,
            ..
        } => {
            format!(
                "Failed to deserialize the data, line: {}, column: {}, details: ({})",
                pos.line(),
                pos.record() + 1,
                err.kind()
            )
        }
        csv::ErrorKind::UnequalLengths {
            pos: Some(ref pos),
            expected_len,
            len,
        } => {
            format!(
                "Found a row with {} fields but the header has {}, line: {}",
                len,
                expected_len,
                pos.line()
            )
        }
        _ => {
            format!("Failed to parse CSV: ({})", e)
        }
    }
}

pub fn show_errors(errors: &[ValidationError], show_all_errors: bool) {
    if !show_all_errors {
        let total = errors.len();
        let num = if total > 3 { 3 } else { total };
        warn!("Found {} errors, only show the {} validation errors, if you want to see all errors, use --show-all-errors.", total, num);
        for e in errors.iter().take(3) {
            error!("{}", e);
        }

        if total == num {
            return;
        } else {
            warn!("Hide {} validation errors.", errors.len() - num);
        }
    } else {
        for e in errors {
            error!("{}", e);
        }
    }
}
