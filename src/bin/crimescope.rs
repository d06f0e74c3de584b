#[macro_use]
extern crate log;

use crimescope::api::route::{api_service, ApiSettings, DEFAULT_MAX_UPLOAD_SIZE};
use crimescope::model::store::{DatasetStore, DEFAULT_MAX_DATASETS};
use crimescope::{init_logger, load_dataset};
use dotenv::dotenv;
use log::LevelFilter;
use poem::{
    listener::TcpListener,
    middleware::{AddData, Cors},
    EndpointExt, Route, Server,
};
use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;

/// CrimeScope backend server.
#[derive(Debug, PartialEq, StructOpt)]
#[structopt(setting=structopt::clap::AppSettings::ColoredHelp, name="crimescope", author="Jingcheng Yang <yjcyxky@163.com>")]
struct Opt {
    /// Activate debug mode
    /// short and long flags (--debug) will be deduced from the field's name
    #[structopt(name = "debug", long = "debug")]
    debug: bool,

    /// Activate openapi mode
    #[structopt(name = "openapi", short = "o", long = "openapi")]
    openapi: bool,

    /// Enable simple CORS support.
    #[structopt(name = "cors", short = "c", long = "cors")]
    cors: bool,

    /// 127.0.0.1 or 0.0.0.0
    #[structopt(name = "host", short = "H", long = "host", possible_values=&["127.0.0.1", "0.0.0.0"], default_value = "127.0.0.1")]
    host: String,

    /// Which port.
    #[structopt(name = "port", short = "p", long = "port", default_value = "3000")]
    port: String,

    /// How many uploaded datasets are kept in memory, the oldest one is dropped when a new one comes in.
    /// You can also set it with env var: CRIMESCOPE_MAX_DATASETS.
    #[structopt(name = "max-datasets", short = "m", long = "max-datasets")]
    max_datasets: Option<usize>,

    /// The largest dataset (in bytes) which can be uploaded.
    /// You can also set it with env var: CRIMESCOPE_MAX_UPLOAD_SIZE.
    #[structopt(name = "max-upload-size", short = "s", long = "max-upload-size")]
    max_upload_size: Option<usize>,

    /// A csv/tsv file to load when the server starts, such as crimes.csv.
    /// You can also set it with env var: CRIMESCOPE_DATASET.
    #[structopt(name = "dataset", short = "d", long = "dataset")]
    dataset: Option<String>,
}

fn env_or<T: std::str::FromStr>(value: Option<T>, key: &str, default: T) -> T {
    if let Some(v) = value {
        return v;
    }

    match std::env::var(key) {
        Ok(v) => match v.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("{} is not valid ({}), use the default value.", key, v);
                default
            }
        },
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv().ok();

    let args = Opt::from_args();

    let log_result = if args.debug {
        init_logger("crimescope", LevelFilter::Debug)
    } else {
        init_logger("crimescope", LevelFilter::Info)
    };

    if let Err(log) = log_result {
        eprintln!("Log initialization error, {}", log);
        std::process::exit(1);
    };

    let host = args.host;
    let port = args.port;

    println!("\n\t\t*** Launch crimescope on {}:{} ***", host, port);

    let max_datasets = env_or(args.max_datasets, "CRIMESCOPE_MAX_DATASETS", DEFAULT_MAX_DATASETS);
    let max_upload_size = env_or(
        args.max_upload_size,
        "CRIMESCOPE_MAX_UPLOAD_SIZE",
        DEFAULT_MAX_UPLOAD_SIZE,
    );
    info!(
        "Keep at most {} datasets, each one up to {} bytes.",
        max_datasets, max_upload_size
    );

    let store = Arc::new(DatasetStore::new(max_datasets));

    // Preload a dataset, such as a dataset which every user shares.
    let dataset = args
        .dataset
        .or_else(|| std::env::var("CRIMESCOPE_DATASET").ok())
        .filter(|v| !v.is_empty());
    if let Some(dataset) = dataset {
        let filepath = PathBuf::from(&dataset);
        let name = filepath
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("preloaded")
            .to_string();
        match load_dataset(&filepath).and_then(|d| store.insert(&name, d)) {
            Ok(info) => info!("Preloaded {} as dataset {}.", filepath.display(), info.id),
            Err(err) => {
                error!("Preload {} failed, {}", filepath.display(), err);
                std::process::exit(1);
            }
        }
    }

    let api_service = api_service(&format!("http://{}:{}", host, port));
    let openapi = api_service.swagger_ui();
    let spec = api_service.spec();

    let route = Route::new();

    let route = if args.openapi {
        info!("OpenApi mode is enabled. You can access the OpenApi spec at /openapi.");
        route
            .nest("/openapi", openapi)
            .at("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
    } else {
        warn!("OpenApi mode is disabled. If you need the OpenApi, please use `--openapi` flag.");
        route
    };

    let route = route
        .nest_no_strip("/api/v1", api_service)
        .with(AddData::new(store))
        .with(AddData::new(ApiSettings { max_upload_size }));

    if args.cors {
        info!("CORS mode is enabled.");
        let route = route.with(Cors::new().allow_origin("*"));
        Server::new(TcpListener::bind(format!("{}:{}", host, port)))
            .run(route)
            .await
    } else {
        warn!("CORS mode is disabled. If you need the CORS, please use `--cors` flag.");
        Server::new(TcpListener::bind(format!("{}:{}", host, port)))
            .run(route)
            .await
    }
}
