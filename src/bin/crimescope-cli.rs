extern crate log;

use anyhow::Context;
use crimescope::algorithm::geo::map_heat_layer;
use crimescope::algorithm::heatmap::{crime_heatmap, plot2json, EMPTY_SELECTION_MSG};
use crimescope::model::dataset::CrimeDataset;
use crimescope::model::district::{validate_top_n, DistrictTable, Grouping};
use crimescope::model::error::DatasetError;
use crimescope::model::util::show_errors;
use crimescope::{init_logger, load_dataset};
use log::*;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

/// A cli for crimescope.
#[derive(StructOpt, Debug)]
#[structopt(setting=structopt::clap::AppSettings::ColoredHelp, name = "A cli for crimescope.", author="Jingcheng Yang <yjcyxky@163.com>;")]
struct Opt {
    /// Activate debug mode
    /// short and long flags (--debug) will be deduced from the field's name
    #[structopt(name = "debug", long = "debug")]
    debug: bool,

    #[structopt(subcommand)]
    cmd: SubCommands,
}

#[derive(Debug, PartialEq, StructOpt)]
enum SubCommands {
    #[structopt(name = "check")]
    Check(CheckArguments),
    #[structopt(name = "summary")]
    Summary(SummaryArguments),
    #[structopt(name = "districts")]
    Districts(DistrictsArguments),
    #[structopt(name = "heatmap")]
    Heatmap(PlotArguments),
    #[structopt(name = "map")]
    Map(PlotArguments),
    #[structopt(name = "top")]
    Top(TopArguments),
}

/// Check a crime dataset and show the rows which were cleaned.
#[derive(StructOpt, PartialEq, Debug)]
#[structopt(setting=structopt::clap::AppSettings::ColoredHelp, name="CrimeScope - check", author="Jingcheng Yang <yjcyxky@163.com>")]
pub struct CheckArguments {
    /// [Required] The file path of the dataset, a csv/tsv/txt file which contains the year, state_name, district_name and crime columns.
    #[structopt(name = "filepath", short = "f", long = "filepath")]
    filepath: PathBuf,

    /// [Optional] Show all issues instead of the first 3 ones.
    #[structopt(name = "show_all_errors", short = "e", long = "show-all-errors")]
    show_all_errors: bool,
}

/// Show the years and the states of each year.
#[derive(StructOpt, PartialEq, Debug)]
#[structopt(setting=structopt::clap::AppSettings::ColoredHelp, name="CrimeScope - summary", author="Jingcheng Yang <yjcyxky@163.com>")]
pub struct SummaryArguments {
    /// [Required] The file path of the dataset.
    #[structopt(name = "filepath", short = "f", long = "filepath")]
    filepath: PathBuf,
}

/// Sum the crimes of every district for a year and a state.
#[derive(StructOpt, PartialEq, Debug)]
#[structopt(setting=structopt::clap::AppSettings::ColoredHelp, name="CrimeScope - districts", author="Jingcheng Yang <yjcyxky@163.com>")]
pub struct DistrictsArguments {
    /// [Required] The file path of the dataset.
    #[structopt(name = "filepath", short = "f", long = "filepath")]
    filepath: PathBuf,

    /// [Required] Which year, e.g. 2001.
    #[structopt(name = "year", short = "y", long = "year")]
    year: i64,

    /// [Required] Which state, e.g. Kerala. It must match the state_name column after trimming.
    #[structopt(name = "state", short = "s", long = "state")]
    state: String,

    /// [Optional] Write the table into a csv file instead of printing it.
    #[structopt(name = "output", short = "o", long = "output")]
    output: Option<PathBuf>,

    /// [Optional] Group districts by name and coordinates. The dataset must have the lat and lon columns.
    #[structopt(name = "with_coordinates", short = "c", long = "with-coordinates")]
    with_coordinates: bool,
}

/// Render a heatmap or a map for a year and a state.
#[derive(StructOpt, PartialEq, Debug)]
#[structopt(setting=structopt::clap::AppSettings::ColoredHelp, name="CrimeScope - plot", author="Jingcheng Yang <yjcyxky@163.com>")]
pub struct PlotArguments {
    /// [Required] The file path of the dataset.
    #[structopt(name = "filepath", short = "f", long = "filepath")]
    filepath: PathBuf,

    /// [Required] Which year, e.g. 2001.
    #[structopt(name = "year", short = "y", long = "year")]
    year: i64,

    /// [Required] Which state, e.g. Kerala.
    #[structopt(name = "state", short = "s", long = "state")]
    state: String,

    /// [Required] The output file. A .json file gets the data of the figure, a .html file gets a standalone page.
    #[structopt(name = "output", short = "o", long = "output")]
    output: PathBuf,
}

/// Show the districts with the highest crime index.
#[derive(StructOpt, PartialEq, Debug)]
#[structopt(setting=structopt::clap::AppSettings::ColoredHelp, name="CrimeScope - top", author="Jingcheng Yang <yjcyxky@163.com>")]
pub struct TopArguments {
    /// [Required] The file path of the dataset.
    #[structopt(name = "filepath", short = "f", long = "filepath")]
    filepath: PathBuf,

    /// [Required] Which year, e.g. 2001.
    #[structopt(name = "year", short = "y", long = "year")]
    year: i64,

    /// [Required] Which state, e.g. Kerala.
    #[structopt(name = "state", short = "s", long = "state")]
    state: String,

    /// [Optional] How many districts, between 5 and 25.
    #[structopt(name = "top_n", short = "n", long = "top-n", default_value = "10")]
    top_n: usize,
}

enum OutputFormat {
    Json,
    Html,
}

fn output_format(output: &Path) -> Result<OutputFormat, DatasetError> {
    let suffix = output
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    match suffix.as_str() {
        "json" => Ok(OutputFormat::Json),
        "html" | "htm" => Ok(OutputFormat::Html),
        _ => Err(DatasetError::UnsupportedFileType { suffix }),
    }
}

fn load_or_exit(filepath: &Path) -> CrimeDataset {
    match load_dataset(filepath) {
        Ok(dataset) => dataset,
        Err(e) => {
            error!("Load {} failed: {}", filepath.display(), e);
            std::process::exit(1);
        }
    }
}

fn table_or_exit(dataset: &CrimeDataset, year: i64, state: &str, grouping: Grouping) -> DistrictTable {
    let table = match dataset.district_table(year, state, grouping) {
        Ok(table) => table,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if table.is_empty() {
        warn!("{}", EMPTY_SELECTION_MSG);
    }

    table
}

fn table_lines(table: &DistrictTable) -> Vec<String> {
    let mut header = vec!["district_name".to_string()];
    if table.with_coordinates {
        header.push("lat".to_string());
        header.push("lon".to_string());
    }
    header.extend(table.heatmap_columns());
    header.push("crime_index".to_string());

    let mut lines = vec![header.join("\t")];
    for district in &table.districts {
        let mut row = vec![district.district_name.clone()];
        if table.with_coordinates {
            row.push(district.lat.map(|v| v.to_string()).unwrap_or_default());
            row.push(district.lon.map(|v| v.to_string()).unwrap_or_default());
        }
        row.extend(district.counts.iter().map(|v| v.to_string()));
        row.push(district.total_crime.to_string());
        row.push(format!("{:.4}", district.crime_index));
        lines.push(row.join("\t"));
    }

    lines
}

fn ranking_lines(table: &DistrictTable, top_n: usize) -> Vec<String> {
    let mut lines = vec!["rank\tdistrict_name\ttotal_crime\tcrime_index".to_string()];
    for (i, rank) in table.ranking(top_n).iter().enumerate() {
        lines.push(format!(
            "{}\t{}\t{}\t{:.4}",
            i + 1,
            rank.district_name,
            rank.total_crime,
            rank.crime_index
        ));
    }

    lines
}

fn write_heatmap(table: &DistrictTable, output: &Path) -> Result<(), anyhow::Error> {
    let format = output_format(output)?;
    let plot = crime_heatmap(table)?;
    let content = match format {
        OutputFormat::Json => plot2json(&plot),
        OutputFormat::Html => plot.to_html(),
    };
    std::fs::write(output, content).with_context(|| format!("Cannot write {}", output.display()))?;

    Ok(())
}

fn write_map(table: &DistrictTable, output: &Path) -> Result<(), anyhow::Error> {
    let format = output_format(output)?;
    let layer = map_heat_layer(table)?;
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&layer)?,
        OutputFormat::Html => layer.to_html()?,
    };
    std::fs::write(output, content).with_context(|| format!("Cannot write {}", output.display()))?;

    Ok(())
}

fn main() {
    let opt = Opt::from_args();

    let _ = if opt.debug {
        init_logger("crimescope-cli", LevelFilter::Debug)
    } else {
        init_logger("crimescope-cli", LevelFilter::Info)
    };

    match opt.cmd {
        SubCommands::Check(arguments) => {
            let dataset = load_or_exit(&arguments.filepath);
            let summary = dataset.summary();
            info!(
                "{} rows, {} crime columns, {} years, {} states, {} districts, coordinates: {}.",
                summary.rows,
                summary.crime_columns.len(),
                summary.years.len(),
                summary.states,
                summary.districts,
                summary.has_coordinates
            );

            if dataset.issues().is_empty() {
                info!("{} is valid.", arguments.filepath.display());
            } else {
                show_errors(dataset.issues(), arguments.show_all_errors);
            }
        }
        SubCommands::Summary(arguments) => {
            let dataset = load_or_exit(&arguments.filepath);
            println!("Crime columns: {}", dataset.crime_columns().join(", "));
            for year in dataset.years() {
                println!("{}\t{}", year, dataset.states(year).join(", "));
            }
        }
        SubCommands::Districts(arguments) => {
            let dataset = load_or_exit(&arguments.filepath);
            let grouping = if arguments.with_coordinates {
                Grouping::DistrictWithCoordinates
            } else {
                Grouping::District
            };
            let table = table_or_exit(&dataset, arguments.year, &arguments.state, grouping);

            match arguments.output {
                Some(output) => match table.write_csv(&output) {
                    Ok(_) => info!("Write {} districts into {}.", table.districts.len(), output.display()),
                    Err(e) => {
                        error!("Write {} failed: {}", output.display(), e);
                        std::process::exit(1);
                    }
                },
                None => {
                    for line in table_lines(&table) {
                        println!("{}", line);
                    }
                }
            }
        }
        SubCommands::Heatmap(arguments) => {
            let dataset = load_or_exit(&arguments.filepath);
            let table = table_or_exit(&dataset, arguments.year, &arguments.state, Grouping::District);
            match write_heatmap(&table, &arguments.output) {
                Ok(_) => info!("Write the heatmap into {}.", arguments.output.display()),
                Err(e) => {
                    error!("Write the heatmap failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        SubCommands::Map(arguments) => {
            let dataset = load_or_exit(&arguments.filepath);
            let table = table_or_exit(
                &dataset,
                arguments.year,
                &arguments.state,
                Grouping::DistrictWithCoordinates,
            );
            match write_map(&table, &arguments.output) {
                Ok(_) => info!("Write the map into {}.", arguments.output.display()),
                Err(e) => {
                    error!("Write the map failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        SubCommands::Top(arguments) => {
            let top_n = match validate_top_n(arguments.top_n) {
                Ok(v) => v,
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            };
            let dataset = load_or_exit(&arguments.filepath);
            let table = table_or_exit(&dataset, arguments.year, &arguments.state, Grouping::District);
            for line in ranking_lines(&table, top_n) {
                println!("{}", line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRIMES: &str = "year,state_name,district_name,murder,theft\n\
                          2001,Goa,Panaji,4,1\n\
                          2001,Goa,Margao,1,1\n";

    fn table(year: i64) -> DistrictTable {
        CrimeDataset::from_csv_str(CRIMES)
            .unwrap()
            .district_table(year, "Goa", Grouping::District)
            .unwrap()
    }

    #[test]
    fn test_table_lines() {
        let lines = table_lines(&table(2001));
        assert_eq!(lines[0], "district_name\tmurder\ttheft\ttotal_crime\tcrime_index");
        assert_eq!(lines[1], "Margao\t1\t1\t2\t0.0000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_selection_prints_headers_only() {
        let empty = table(1999);
        assert_eq!(table_lines(&empty).len(), 1);
        assert_eq!(
            ranking_lines(&empty, 10),
            vec!["rank\tdistrict_name\ttotal_crime\tcrime_index".to_string()]
        );
    }

    #[test]
    fn test_empty_selection_fails_for_plots() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_heatmap(&table(1999), &dir.path().join("heatmap.json")).unwrap_err();
        assert_eq!(err.to_string(), EMPTY_SELECTION_MSG);
    }

    #[test]
    fn test_ranking_lines() {
        let lines = ranking_lines(&table(2001), 5);
        assert_eq!(lines[1], "1\tPanaji\t5\t1.0000");
    }

    #[test]
    fn test_output_format() {
        assert!(matches!(output_format(Path::new("a.JSON")), Ok(OutputFormat::Json)));
        assert!(matches!(output_format(Path::new("a.html")), Ok(OutputFormat::Html)));
        assert!(output_format(Path::new("a.png")).is_err());
    }
}
