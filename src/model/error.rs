//! Errors raised while loading, cleaning and analysing crime datasets.

use custom_error::custom_error;

custom_error! {
    /// Failures which stop an analysis. Row level problems are reported as
    /// [`ValidationError`](super::util::ValidationError) instead.
    pub DatasetError
    Io{source: std::io::Error} = "Failed to read the dataset: {source}",
    Csv{source: csv::Error} = "Failed to parse the dataset: {source}",
    Polars{source: polars::prelude::PolarsError} = "Failed to build the data frame: {source}",
    Json{source: serde_json::Error} = "Failed to serialize the result: {source}",
    UnsupportedFileType{suffix: String} = "Unsupported file type: {suffix}",
    MissingColumns{columns: String} = "The dataset must contain the following columns: {columns}",
    DuplicateColumn{column: String} = "The column {column} appears more than once",
    NoCrimeColumns = "The dataset doesn't contain any crime column",
    MissingCoordinates = "The dataset must contain 'lat' and 'lon' columns for the map heatmap",
    CountOverflow{district: String} = "The crime counts of {district} are too large to add up",
    EmptySelection{msg: String} = "{msg}",
    InvalidTopN{top_n: usize, min: usize, max: usize} = "The number of districts should be between {min} and {max}, got {top_n}",
    DatasetNotFound{id: String} = "No dataset found with id {id}",
    DatasetTooLarge{size: usize, limit: usize} = "The dataset is at least {size} bytes, larger than the limit of {limit} bytes",
    InvalidEncoding = "The dataset must be utf-8 text",
    StoreUnavailable = "The dataset store is unavailable",
}

impl DatasetError {
    /// Whether the error means the requested data doesn't exist, not that the request was malformed.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DatasetError::DatasetNotFound { .. } | DatasetError::EmptySelection { .. }
        )
    }
}
