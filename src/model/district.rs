//! District level aggregation of a crime dataset for one year and one state, plus the crime index ranking.

use super::dataset::{CrimeDataset, DISTRICT_COLUMN, LAT_COLUMN, LON_COLUMN};
use super::error::DatasetError;
use crate::algorithm::scaler::min_max_scale;
use log::debug;
use polars::prelude::{CsvWriter, DataFrame, NamedFrom, SerWriter, Series};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

pub const TOTAL_CRIME_COLUMN: &str = "total_crime";
pub const CRIME_INDEX_COLUMN: &str = "crime_index";

pub const MIN_TOP_N: usize = 5;
pub const MAX_TOP_N: usize = 25;
pub const DEFAULT_TOP_N: usize = 10;

/// How rows are grouped into districts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// One group per district name.
    District,
    /// One group per (district name, lat, lon). Rows without coordinates are dropped.
    DistrictWithCoordinates,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct DistrictStat {
    pub district_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Crime sums in the order of [`DistrictTable::crime_columns`].
    pub counts: Vec<f64>,
    pub total_crime: f64,
    /// `total_crime` min-max scaled over all districts of the table.
    pub crime_index: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct DistrictRank {
    pub district_name: String,
    pub total_crime: f64,
    pub crime_index: f64,
}

impl From<&DistrictStat> for DistrictRank {
    fn from(stat: &DistrictStat) -> Self {
        DistrictRank {
            district_name: stat.district_name.clone(),
            total_crime: stat.total_crime,
            crime_index: stat.crime_index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct DistrictTable {
    pub year: i64,
    pub state_name: String,
    pub crime_columns: Vec<String>,
    pub with_coordinates: bool,
    pub districts: Vec<DistrictStat>,
}

pub fn validate_top_n(top_n: usize) -> Result<usize, DatasetError> {
    if (MIN_TOP_N..=MAX_TOP_N).contains(&top_n) {
        Ok(top_n)
    } else {
        Err(DatasetError::InvalidTopN {
            top_n,
            min: MIN_TOP_N,
            max: MAX_TOP_N,
        })
    }
}

fn cmp_coordinate(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

impl CrimeDataset {
    /// Sum every crime column per district for the rows of `year` and `state`.
    ///
    /// Districts are ordered by name, then by coordinates. An empty selection gives an empty table.
    pub fn district_table(
        &self,
        year: i64,
        state: &str,
        grouping: Grouping,
    ) -> Result<DistrictTable, DatasetError> {
        let with_coordinates = grouping == Grouping::DistrictWithCoordinates;
        if with_coordinates && !self.has_coordinates() {
            return Err(DatasetError::MissingCoordinates);
        }

        let width = self.crime_columns().len();
        let mut groups: HashMap<(String, Option<u64>, Option<u64>), usize> = HashMap::new();
        let mut districts: Vec<DistrictStat> = Vec::new();

        for record in self.filter(year, state) {
            let (lat, lon) = if with_coordinates {
                match (record.lat, record.lon) {
                    (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
                    _ => {
                        debug!(
                            "Skip a row of {} without coordinates.",
                            record.district_name
                        );
                        continue;
                    }
                }
            } else {
                (None, None)
            };

            let key = (
                record.district_name.clone(),
                lat.map(f64::to_bits),
                lon.map(f64::to_bits),
            );
            let index = *groups.entry(key).or_insert_with(|| {
                districts.push(DistrictStat {
                    district_name: record.district_name.clone(),
                    lat,
                    lon,
                    counts: vec![0.0; width],
                    total_crime: 0.0,
                    crime_index: 0.0,
                });
                districts.len() - 1
            });

            let stat = &mut districts[index];
            for (sum, count) in stat.counts.iter_mut().zip(record.counts.iter()) {
                *sum += count;
            }
        }

        districts.sort_by(|a, b| {
            a.district_name
                .cmp(&b.district_name)
                .then_with(|| cmp_coordinate(a.lat, b.lat))
                .then_with(|| cmp_coordinate(a.lon, b.lon))
        });

        for stat in districts.iter_mut() {
            stat.total_crime = stat.counts.iter().sum();
            if !stat.total_crime.is_finite() {
                return Err(DatasetError::CountOverflow {
                    district: stat.district_name.clone(),
                });
            }
        }
        let totals: Vec<f64> = districts.iter().map(|d| d.total_crime).collect();
        for (stat, index) in districts.iter_mut().zip(min_max_scale(&totals)) {
            stat.crime_index = index;
        }

        debug!(
            "Aggregated {} districts for {} ({}).",
            districts.len(),
            state,
            year
        );

        Ok(DistrictTable {
            year,
            state_name: state.to_string(),
            crime_columns: self.crime_columns().to_vec(),
            with_coordinates,
            districts,
        })
    }
}

impl DistrictTable {
    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }

    /// The `top_n` districts with the highest crime index. Ties keep the table order.
    pub fn top_districts(&self, top_n: usize) -> Vec<&DistrictStat> {
        let mut ranked: Vec<&DistrictStat> = self.districts.iter().collect();
        ranked.sort_by(|a, b| b.crime_index.total_cmp(&a.crime_index));
        ranked.truncate(top_n);
        ranked
    }

    pub fn ranking(&self, top_n: usize) -> Vec<DistrictRank> {
        self.top_districts(top_n)
            .into_iter()
            .map(DistrictRank::from)
            .collect()
    }

    /// Values of one column of the heatmap, which shows every crime column and the total.
    pub fn heatmap_columns(&self) -> Vec<String> {
        let mut columns = self.crime_columns.clone();
        columns.push(TOTAL_CRIME_COLUMN.to_string());
        columns
    }

    /// One row per district: the crime sums followed by the total.
    pub fn heatmap_rows(&self) -> Vec<Vec<f64>> {
        self.districts
            .iter()
            .map(|d| {
                let mut row = d.counts.clone();
                row.push(d.total_crime);
                row
            })
            .collect()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, DatasetError> {
        let names: Vec<&str> = self
            .districts
            .iter()
            .map(|d| d.district_name.as_str())
            .collect();
        let mut columns = vec![Series::new(DISTRICT_COLUMN, names)];

        if self.with_coordinates {
            let lats: Vec<Option<f64>> = self.districts.iter().map(|d| d.lat).collect();
            let lons: Vec<Option<f64>> = self.districts.iter().map(|d| d.lon).collect();
            columns.push(Series::new(LAT_COLUMN, lats));
            columns.push(Series::new(LON_COLUMN, lons));
        }

        for (i, column) in self.crime_columns.iter().enumerate() {
            let values: Vec<f64> = self.districts.iter().map(|d| d.counts[i]).collect();
            columns.push(Series::new(column.as_str(), values));
        }

        let totals: Vec<f64> = self.districts.iter().map(|d| d.total_crime).collect();
        let indexes: Vec<f64> = self.districts.iter().map(|d| d.crime_index).collect();
        columns.push(Series::new(TOTAL_CRIME_COLUMN, totals));
        columns.push(Series::new(CRIME_INDEX_COLUMN, indexes));

        Ok(DataFrame::new(columns)?)
    }

    pub fn write_csv(&self, filepath: &Path) -> Result<(), DatasetError> {
        let mut df = self.to_dataframe()?;
        let writer = File::create(filepath)?;
        CsvWriter::new(writer).has_header(true).finish(&mut df)?;
        debug!("Wrote {} districts to {}.", df.height(), filepath.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRIMES: &str = "\
year,state_name,district_name,registration_circles,murder,theft
2001,Kerala,Kollam,Circle A,1,1
2001,,,Circle B,2,2
2001,Kerala,Idukki,Circle C,10,20
2001,Kerala,Wayanad,Circle D,0,7
2002,Kerala,Kollam,Circle A,100,100
2001,Goa,Panaji,Circle E,5,5
";

    fn table() -> DistrictTable {
        CrimeDataset::from_csv_str(CRIMES)
            .unwrap()
            .district_table(2001, "Kerala", Grouping::District)
            .unwrap()
    }

    #[test]
    fn test_district_table() {
        let table = table();
        let names: Vec<&str> = table
            .districts
            .iter()
            .map(|d| d.district_name.as_str())
            .collect();
        assert_eq!(names, vec!["Idukki", "Kollam", "Wayanad"]);

        let kollam = &table.districts[1];
        assert_eq!(kollam.counts, vec![3.0, 3.0]);
        assert_eq!(kollam.total_crime, 6.0);
        assert_eq!(kollam.lat, None);
    }

    #[test]
    fn test_crime_index() {
        let table = table();
        let indexes: Vec<f64> = table.districts.iter().map(|d| d.crime_index).collect();
        // Totals are 30, 6 and 7.
        assert_eq!(indexes[0], 1.0);
        assert_eq!(indexes[1], 0.0);
        assert!((indexes[2] - 1.0 / 24.0).abs() < 1e-12);
        assert!(indexes.iter().all(|i| (0.0..=1.0).contains(i)));
    }

    #[test]
    fn test_count_overflow() {
        let dataset = CrimeDataset::from_csv_str(
            "year,state_name,district_name,murder,theft\n\
             2001,Goa,North,1e308,1e308\n\
             2001,Goa,South,1,1\n",
        )
        .unwrap();
        let err = dataset
            .district_table(2001, "Goa", Grouping::District)
            .unwrap_err();
        assert!(matches!(err, DatasetError::CountOverflow { ref district } if district == "North"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_crime_index_with_large_totals() {
        let dataset = CrimeDataset::from_csv_str(
            "year,state_name,district_name,murder\n\
             2001,Goa,North,1e308\n\
             2001,Goa,South,1\n\
             2001,Goa,West,-1e308\n",
        )
        .unwrap();
        let table = dataset
            .district_table(2001, "Goa", Grouping::District)
            .unwrap();
        assert!(table
            .districts
            .iter()
            .all(|d| (0.0..=1.0).contains(&d.crime_index)));
    }

    #[test]
    fn test_empty_selection() {
        let table = CrimeDataset::from_csv_str(CRIMES)
            .unwrap()
            .district_table(1990, "Kerala", Grouping::District)
            .unwrap();
        assert!(table.is_empty());
        assert!(table.top_districts(10).is_empty());

        let dir = tempfile::tempdir().unwrap();
        let filepath = dir.path().join("empty.csv");
        table.write_csv(&filepath).unwrap();
        let content = std::fs::read_to_string(&filepath).unwrap();
        assert_eq!(
            content.trim_end(),
            "district_name,murder,theft,total_crime,crime_index"
        );
    }

    #[test]
    fn test_top_districts() {
        let table = table();
        let ranking = table.ranking(2);
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].district_name, "Idukki");
        assert_eq!(ranking[1].district_name, "Wayanad");
        assert_eq!(table.top_districts(25).len(), 3);
    }

    #[test]
    fn test_top_districts_ties_keep_table_order() {
        let table = CrimeDataset::from_csv_str(
            "year,state_name,district_name,murder\n2001,Goa,South,4\n2001,Goa,North,4\n",
        )
        .unwrap()
        .district_table(2001, "Goa", Grouping::District)
        .unwrap();
        let names: Vec<&str> = table
            .top_districts(10)
            .iter()
            .map(|d| d.district_name.as_str())
            .collect();
        assert_eq!(names, vec!["North", "South"]);
    }

    #[test]
    fn test_validate_top_n() {
        assert_eq!(validate_top_n(5).unwrap(), 5);
        assert_eq!(validate_top_n(25).unwrap(), 25);
        assert!(validate_top_n(4).is_err());
        assert!(validate_top_n(26).is_err());
    }

    #[test]
    fn test_grouping_with_coordinates() {
        let dataset = CrimeDataset::from_csv_str(
            "year,state_name,district_name,lat,lon,murder\n\
             2001,Goa,Panaji,15.4,73.8,1\n\
             2001,Goa,Panaji,15.4,73.8,2\n\
             2001,Goa,Panaji,15.5,73.8,4\n\
             2001,Goa,Margao,,74.0,8\n",
        )
        .unwrap();
        let table = dataset
            .district_table(2001, "Goa", Grouping::DistrictWithCoordinates)
            .unwrap();
        assert_eq!(table.districts.len(), 2);
        assert_eq!(table.districts[0].lat, Some(15.4));
        assert_eq!(table.districts[0].total_crime, 3.0);
        assert_eq!(table.districts[1].lat, Some(15.5));

        let err = CrimeDataset::from_csv_str(CRIMES)
            .unwrap()
            .district_table(2001, "Kerala", Grouping::DistrictWithCoordinates)
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingCoordinates));
    }

    #[test]
    fn test_heatmap_matrix() {
        let table = table();
        assert_eq!(
            table.heatmap_columns(),
            vec!["murder".to_string(), "theft".to_string(), "total_crime".to_string()]
        );
        assert_eq!(table.heatmap_rows()[0], vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_to_dataframe() {
        let df = table().to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(
            df.get_column_names(),
            vec!["district_name", "murder", "theft", "total_crime", "crime_index"]
        );
    }

    #[test]
    fn test_write_csv_with_coordinates() {
        let table = CrimeDataset::from_csv_str(
            "year,state_name,district_name,lat,lon,murder\n\
             2001,Goa,Panaji,15.5,73.8,3\n\
             2001,Goa,Margao,15.25,74.0,1\n",
        )
        .unwrap()
        .district_table(2001, "Goa", Grouping::DistrictWithCoordinates)
        .unwrap();

        let df = table.to_dataframe().unwrap();
        assert_eq!(
            df.get_column_names(),
            vec!["district_name", "lat", "lon", "murder", "total_crime", "crime_index"]
        );

        let dir = tempfile::tempdir().unwrap();
        let filepath = dir.path().join("districts.csv");
        table.write_csv(&filepath).unwrap();

        let content = std::fs::read_to_string(&filepath).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "district_name,lat,lon,murder,total_crime,crime_index"
        );
        assert!(lines.next().unwrap().starts_with("Margao,15.25,74"));
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let filepath = dir.path().join("districts.csv");
        table().write_csv(&filepath).unwrap();

        let content = std::fs::read_to_string(&filepath).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "district_name,murder,theft,total_crime,crime_index"
        );
        assert!(lines.next().unwrap().starts_with("Idukki,10"));
    }
}
