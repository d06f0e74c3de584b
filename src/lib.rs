#![doc = include_str!("../README.md")]
//! CrimeScope library for district level crime analysis.

pub mod algorithm;
pub mod api;
pub mod model;

use log::{debug, LevelFilter};
use log4rs;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use model::dataset::CrimeDataset;
use model::error::DatasetError;
use std::path::Path;

/// Load a crime dataset from a csv/tsv/txt file and log what we found.
pub fn load_dataset(filepath: &Path) -> Result<CrimeDataset, DatasetError> {
    let dataset = CrimeDataset::from_path(filepath)?;
    debug!(
        "Loaded {} rows with {} crime columns from {}.",
        dataset.len(),
        dataset.crime_columns().len(),
        filepath.display()
    );

    Ok(dataset)
}

pub fn init_logger(tag_name: &str, level: LevelFilter) -> Result<log4rs::Handle, String> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            &(format!("[{}]", tag_name) + " {d} - {h({l} - {t} - {m}{n})}"),
        )))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .logger(
            Logger::builder()
                .appender("stdout")
                .additive(false)
                .build("stdout", level),
        )
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| format!("couldn't build log configuration. Reason: {}", e))?;

    log4rs::init_config(config)
        .map_err(|e| format!("couldn't initialize log configuration. Reason: {}", e))
}
