//! Crime dataset loading and cleaning.
//!
//! A crime dataset is a delimited file with one row per (year, state, district, registration circle).
//! The identifier columns are `year`, `state_name`, `district_name` and optionally
//! `registration_circles`, `lat` and `lon`. Every other column holds the number of crimes of one type.
//!
//! Cleaning follows a fixed order:
//! 1. Column names are trimmed and lower-cased.
//! 2. Empty state, district and registration circle cells are forward filled from the row above.
//! 3. Crime counts which are empty or not numeric become 0.

use super::error::DatasetError;
use super::util::{get_delimiter, parse_csv_error, ValidationError};
use itertools::Itertools;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use poem_openapi::Object;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const YEAR_COLUMN: &str = "year";
pub const STATE_COLUMN: &str = "state_name";
pub const DISTRICT_COLUMN: &str = "district_name";
pub const REGISTRATION_CIRCLE_COLUMN: &str = "registration_circles";
pub const LAT_COLUMN: &str = "lat";
pub const LON_COLUMN: &str = "lon";

pub const REQUIRED_COLUMNS: [&str; 3] = [YEAR_COLUMN, STATE_COLUMN, DISTRICT_COLUMN];

/// Columns which identify a row. All the others are crime columns.
pub const IDENTIFIER_COLUMNS: [&str; 6] = [
    YEAR_COLUMN,
    STATE_COLUMN,
    DISTRICT_COLUMN,
    REGISTRATION_CIRCLE_COLUMN,
    LAT_COLUMN,
    LON_COLUMN,
];

lazy_static! {
    // 2001 or 2001.0, as written by spreadsheets which store years as floats.
    static ref YEAR_REGEX: Regex = Regex::new(r"^(\d{1,4})(?:\.0+)?$").unwrap();
}

/// One cleaned row of a crime dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeRecord {
    pub year: Option<i64>,
    pub state_name: String,
    pub district_name: String,
    pub registration_circle: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Crime counts in the order of [`CrimeDataset::crime_columns`].
    pub counts: Vec<f64>,
}

/// An overview of a dataset, used to explore it before selecting a year and a state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct DatasetSummary {
    pub rows: u64,
    pub crime_columns: Vec<String>,
    pub years: Vec<i64>,
    pub states: u64,
    pub districts: u64,
    pub has_coordinates: bool,
    pub issues: u64,
}

#[derive(Debug)]
struct ColumnLayout {
    year: usize,
    state: usize,
    district: usize,
    registration_circle: Option<usize>,
    coordinates: Option<(usize, usize)>,
    crimes: Vec<usize>,
}

impl ColumnLayout {
    /// Returns the layout and the normalized names of the crime columns.
    fn from_headers(headers: &csv::StringRecord) -> Result<(ColumnLayout, Vec<String>), DatasetError> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        if let Some(duplicated) = names.iter().duplicates().next() {
            return Err(DatasetError::DuplicateColumn {
                column: duplicated.to_string(),
            });
        }

        let position = |column: &str| names.iter().position(|n| n == column);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| position(*c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns {
                columns: missing.join(", "),
            });
        }

        let crimes: Vec<usize> = names
            .iter()
            .enumerate()
            .filter(|(_, n)| !IDENTIFIER_COLUMNS.contains(&n.as_str()))
            .map(|(i, _)| i)
            .collect();
        if crimes.is_empty() {
            return Err(DatasetError::NoCrimeColumns);
        }
        let crime_columns = crimes.iter().map(|&i| names[i].clone()).collect();

        let coordinates = match (position(LAT_COLUMN), position(LON_COLUMN)) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            (None, None) => None,
            _ => {
                warn!("Only one of the lat and lon columns exists, coordinates are ignored.");
                None
            }
        };

        let layout = ColumnLayout {
            // Checked above.
            year: position(YEAR_COLUMN).unwrap_or_default(),
            state: position(STATE_COLUMN).unwrap_or_default(),
            district: position(DISTRICT_COLUMN).unwrap_or_default(),
            registration_circle: position(REGISTRATION_CIRCLE_COLUMN),
            coordinates,
            crimes,
        };

        Ok((layout, crime_columns))
    }
}

/// Fills empty cells with the last non-empty value seen in the same column.
#[derive(Debug, Default)]
struct ForwardFill {
    last: Option<String>,
}

impl ForwardFill {
    fn fill(&mut self, value: &str) -> Option<String> {
        let value = value.trim();
        if !value.is_empty() {
            self.last = Some(value.to_string());
        }
        self.last.clone()
    }
}

fn parse_year(value: &str) -> Result<Option<i64>, ()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    match YEAR_REGEX.captures(value) {
        Some(caps) => caps[1].parse::<i64>().map(Some).map_err(|_| ()),
        None => Err(()),
    }
}

fn parse_count(value: &str) -> Result<f64, ()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0.0);
    }

    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(()),
    }
}

fn parse_coordinate(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone)]
pub struct CrimeDataset {
    crime_columns: Vec<String>,
    records: Vec<CrimeRecord>,
    has_coordinates: bool,
    issues: Vec<ValidationError>,
}

impl CrimeDataset {
    /// Read a dataset from a file, the delimiter is chosen by the file suffix.
    pub fn from_path(filepath: &Path) -> Result<CrimeDataset, DatasetError> {
        let delimiter = get_delimiter(filepath)?;
        info!("Loading the crime dataset from {}.", filepath.display());
        let file = File::open(filepath)?;
        Self::from_reader(file, delimiter)
    }

    pub fn from_csv_str(data: &str) -> Result<CrimeDataset, DatasetError> {
        Self::from_reader(data.as_bytes(), b',')
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<CrimeDataset, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let (layout, crime_columns) = ColumnLayout::from_headers(&headers)?;
        debug!(
            "Found {} crime columns: {:?}",
            crime_columns.len(),
            crime_columns
        );

        let mut state_fill = ForwardFill::default();
        let mut district_fill = ForwardFill::default();
        let mut circle_fill = ForwardFill::default();
        let mut records = Vec::new();
        let mut issues = Vec::new();

        for result in reader.records() {
            let row = match result {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    issues.push(ValidationError::new(&parse_csv_error(&e), vec![]));
                    continue;
                }
            };

            let line = row.position().map(|p| p.line()).unwrap_or_default();
            let cell = |index: usize| row.get(index).unwrap_or("");

            if row.len() > headers.len() {
                issues.push(ValidationError::new(
                    &format!("Extra fields are ignored, line: {}", line),
                    row.iter().skip(headers.len()).map(|s| s.to_string()).collect(),
                ));
            }

            let year = match parse_year(cell(layout.year)) {
                Ok(year) => year,
                Err(_) => {
                    issues.push(ValidationError::new(
                        &format!("Invalid year, line: {}", line),
                        vec![cell(layout.year).to_string()],
                    ));
                    None
                }
            };

            let counts = layout
                .crimes
                .iter()
                .zip(crime_columns.iter())
                .map(|(&index, column)| match parse_count(cell(index)) {
                    Ok(count) => count,
                    Err(_) => {
                        issues.push(ValidationError::new(
                            &format!("Non-numeric crime count replaced by 0, line: {}", line),
                            vec![column.clone(), cell(index).to_string()],
                        ));
                        0.0
                    }
                })
                .collect();

            let (lat, lon) = match layout.coordinates {
                Some((lat, lon)) => (parse_coordinate(cell(lat)), parse_coordinate(cell(lon))),
                None => (None, None),
            };

            records.push(CrimeRecord {
                year,
                state_name: state_fill.fill(cell(layout.state)).unwrap_or_default(),
                district_name: district_fill.fill(cell(layout.district)).unwrap_or_default(),
                registration_circle: layout
                    .registration_circle
                    .and_then(|index| circle_fill.fill(cell(index))),
                lat,
                lon,
                counts,
            });
        }

        if !issues.is_empty() {
            warn!(
                "Found {} issues while cleaning the dataset, they were fixed or skipped.",
                issues.len()
            );
        }

        Ok(CrimeDataset {
            crime_columns,
            records,
            has_coordinates: layout.coordinates.is_some(),
            issues,
        })
    }

    pub fn crime_columns(&self) -> &[String] {
        &self.crime_columns
    }

    pub fn records(&self) -> &[CrimeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_coordinates(&self) -> bool {
        self.has_coordinates
    }

    pub fn issues(&self) -> &[ValidationError] {
        &self.issues
    }

    pub fn years(&self) -> Vec<i64> {
        self.records
            .iter()
            .filter_map(|r| r.year)
            .unique()
            .sorted()
            .collect()
    }

    pub fn states(&self, year: i64) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.year == Some(year) && !r.state_name.is_empty())
            .map(|r| r.state_name.clone())
            .unique()
            .sorted()
            .collect()
    }

    pub fn filter<'a>(
        &'a self,
        year: i64,
        state: &'a str,
    ) -> impl Iterator<Item = &'a CrimeRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.year == Some(year) && r.state_name == state)
    }

    pub fn summary(&self) -> DatasetSummary {
        let states = self
            .records
            .iter()
            .filter(|r| !r.state_name.is_empty())
            .map(|r| r.state_name.as_str())
            .unique()
            .count();
        let districts = self
            .records
            .iter()
            .filter(|r| !r.district_name.is_empty())
            .map(|r| (r.state_name.as_str(), r.district_name.as_str()))
            .unique()
            .count();

        DatasetSummary {
            rows: self.records.len() as u64,
            crime_columns: self.crime_columns.clone(),
            years: self.years(),
            states: states as u64,
            districts: districts as u64,
            has_coordinates: self.has_coordinates,
            issues: self.issues.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRIMES: &str = "\
 YEAR ,State_Name,District_Name,Registration_Circles,Murder,Theft
2001,Kerala,Idukki,Circle A,3,10
2001,,,Circle B,2,x
2001,,Kollam,,,5
2002,Goa,North Goa,Circle C,1,1
2001.0,Goa,South Goa,Circle D,4,4
,Goa,South Goa,Circle E,9,9
";

    #[test]
    fn test_normalize_headers() {
        let dataset = CrimeDataset::from_csv_str(CRIMES).unwrap();
        assert_eq!(
            dataset.crime_columns(),
            &["murder".to_string(), "theft".to_string()]
        );
        assert!(!dataset.has_coordinates());
        assert_eq!(dataset.len(), 6);
    }

    #[test]
    fn test_forward_fill() {
        let dataset = CrimeDataset::from_csv_str(CRIMES).unwrap();
        let records = dataset.records();
        assert_eq!(records[1].state_name, "Kerala");
        assert_eq!(records[1].district_name, "Idukki");
        assert_eq!(records[2].state_name, "Kerala");
        assert_eq!(records[2].district_name, "Kollam");
        assert_eq!(records[2].registration_circle.as_deref(), Some("Circle B"));
    }

    #[test]
    fn test_leading_empty_cells_stay_empty() {
        let dataset =
            CrimeDataset::from_csv_str("year,state_name,district_name,murder\n2001,,,1\n2001,Goa,Panaji,2\n")
                .unwrap();
        assert_eq!(dataset.records()[0].state_name, "");
        assert_eq!(dataset.states(2001), vec!["Goa".to_string()]);
    }

    #[test]
    fn test_coerce_counts() {
        let dataset = CrimeDataset::from_csv_str(CRIMES).unwrap();
        assert_eq!(dataset.records()[1].counts, vec![2.0, 0.0]);
        assert_eq!(dataset.records()[2].counts, vec![0.0, 5.0]);
        // Only the non-numeric "x" is an issue, empty cells are expected.
        assert_eq!(dataset.issues().len(), 1);
        assert_eq!(dataset.issues()[0].data(), &["theft".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_years_and_states() {
        let dataset = CrimeDataset::from_csv_str(CRIMES).unwrap();
        assert_eq!(dataset.years(), vec![2001, 2002]);
        assert_eq!(
            dataset.states(2001),
            vec!["Goa".to_string(), "Kerala".to_string()]
        );
        assert_eq!(dataset.states(2002), vec!["Goa".to_string()]);
        assert!(dataset.states(1999).is_empty());
    }

    #[test]
    fn test_filter() {
        let dataset = CrimeDataset::from_csv_str(CRIMES).unwrap();
        let districts: Vec<&str> = dataset
            .filter(2001, "Kerala")
            .map(|r| r.district_name.as_str())
            .collect();
        assert_eq!(districts, vec!["Idukki", "Idukki", "Kollam"]);
        // The row without a year never matches.
        assert_eq!(dataset.filter(2001, "Goa").count(), 1);
    }

    #[test]
    fn test_invalid_year() {
        let dataset =
            CrimeDataset::from_csv_str("year,state_name,district_name,murder\n20x1,Goa,Panaji,2\n")
                .unwrap();
        assert_eq!(dataset.records()[0].year, None);
        assert_eq!(dataset.issues().len(), 1);
        assert!(dataset.years().is_empty());
    }

    #[test]
    fn test_missing_columns() {
        let err = CrimeDataset::from_csv_str("year,murder\n2001,1\n").unwrap_err();
        match err {
            DatasetError::MissingColumns { columns } => {
                assert_eq!(columns, "state_name, district_name")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_and_empty_columns() {
        let err =
            CrimeDataset::from_csv_str("year,state_name,district_name,Murder,murder\n").unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateColumn { .. }));

        let err = CrimeDataset::from_csv_str("year,state_name,district_name,lat,lon\n").unwrap_err();
        assert!(matches!(err, DatasetError::NoCrimeColumns));
    }

    #[test]
    fn test_coordinates() {
        let dataset = CrimeDataset::from_csv_str(
            "year,state_name,district_name,lat,lon,murder\n2001,Goa,Panaji,15.49,73.82,1\n2001,Goa,Margao,,73.95,2\n",
        )
        .unwrap();
        assert!(dataset.has_coordinates());
        assert_eq!(dataset.crime_columns(), &["murder".to_string()]);
        assert_eq!(dataset.records()[0].lat, Some(15.49));
        assert_eq!(dataset.records()[1].lat, None);
        assert_eq!(dataset.records()[1].lon, Some(73.95));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let dataset =
            CrimeDataset::from_csv_str("year,state_name,district_name,murder,theft\n2001,Goa,Panaji,4\n")
                .unwrap();
        assert_eq!(dataset.records()[0].counts, vec![4.0, 0.0]);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let dataset = CrimeDataset::from_csv_str(
            "year,state_name,district_name,murder\n2001,Goa,Panaji,4,9,extra\n",
        )
        .unwrap();
        assert_eq!(dataset.records()[0].counts, vec![4.0]);
        assert_eq!(dataset.issues().len(), 1);
        assert_eq!(dataset.issues()[0].details(), "Extra fields are ignored, line: 2");
        assert_eq!(
            dataset.issues()[0].data(),
            &["9".to_string(), "extra".to_string()]
        );
    }

    #[test]
    fn test_summary() {
        let summary = CrimeDataset::from_csv_str(CRIMES).unwrap().summary();
        assert_eq!(summary.rows, 6);
        assert_eq!(summary.years, vec![2001, 2002]);
        assert_eq!(summary.states, 2);
        // Idukki, Kollam, North Goa, South Goa
        assert_eq!(summary.districts, 4);
        assert_eq!(summary.issues, 1);
        assert!(!summary.has_coordinates);
    }
}
