use anyhow::Result;
use churn_core::{ModelContext, SystemClock};
use churn_rpc::{start_server, AppState, ServicePaths};
use churn_storage::{CsvCustomerStore, CsvHistoryLog, CustomerStore};
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use crate::config::ServiceConfig;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn cli() -> Command {
    Command::new("churn-service")
        .version(SERVICE_VERSION)
        .about("Customer churn prediction API")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Address to bind the HTTP server to"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("HTTP port"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .value_name("FILE")
                .help("Model artifact (JSON)"),
        )
        .arg(
            Arg::new("database")
                .long("database")
                .value_name("FILE")
                .help("Customer store (CSV)"),
        )
        .arg(
            Arg::new("history-log")
                .long("history-log")
                .value_name("FILE")
                .help("Append-only log of submitted analyses"),
        )
        .arg(
            Arg::new("external-history")
                .long("external-history")
                .value_name("FILE")
                .help("Semicolon-delimited history produced by external tools"),
        )
        .arg(
            Arg::new("frontend-dir")
                .long("frontend-dir")
                .value_name("DIR")
                .help("Directory holding the static frontend"),
        )
        .arg(
            Arg::new("reference-date")
                .long("reference-date")
                .value_name("YYYY-MM-DD")
                .help("Snapshot date of the customer store"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Log format (pretty, compact)"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Validate configuration and model, then exit"),
        )
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut ServiceConfig) {
    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }

    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }

    if let Some(model) = matches.get_one::<String>("model") {
        config.model_path = PathBuf::from(model);
    }

    if let Some(database) = matches.get_one::<String>("database") {
        config.database_path = PathBuf::from(database);
    }

    if let Some(history_log) = matches.get_one::<String>("history-log") {
        config.history_log_path = PathBuf::from(history_log);
    }

    if let Some(external) = matches.get_one::<String>("external-history") {
        config.external_history_path = PathBuf::from(external);
    }

    if let Some(frontend) = matches.get_one::<String>("frontend-dir") {
        config.frontend_dir = PathBuf::from(frontend);
    }

    if let Some(date) = matches.get_one::<String>("reference-date") {
        config.reference_date = date.clone();
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }
}

fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<ServiceConfig> {
    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = ServiceConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &ServiceConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "compact" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = load_config_with_overrides(&matches)?;
    init_logging(&config)?;

    let reference_date = config.reference_date()?;

    info!("Starting churn service v{}", SERVICE_VERSION);
    if let Some(path) = config.config_file() {
        info!("Configuration: {}", path.display());
    }
    info!("Model: {}", config.model_path.display());
    info!("Customer store: {}", config.database_path.display());
    info!("History log: {}", config.history_log_path.display());
    info!("External history: {}", config.external_history_path.display());
    info!("Frontend: {}", config.frontend_dir.display());
    info!("Reference date: {}", reference_date);

    let model = match ModelContext::load(&config.model_path) {
        Ok(model) => model,
        Err(err) => {
            warn!(
                "Failed to load model artifact from {}: {}",
                config.model_path.display(),
                err
            );
            ModelContext::unloaded(&config.model_path)
        }
    };
    if !model.is_loaded() {
        warn!("Running without a model; prediction routes will answer 503");
    }

    let store = CsvCustomerStore::new(&config.database_path);
    if !store.exists() {
        warn!(
            "Customer store {} does not exist yet",
            config.database_path.display()
        );
    }

    if matches.get_flag("check") {
        info!(
            model_loaded = model.is_loaded(),
            features = model.features().len(),
            "Configuration check passed"
        );
        return Ok(());
    }

    let state = AppState {
        model: Arc::new(model),
        store: Arc::new(store),
        history: Arc::new(CsvHistoryLog::new(&config.history_log_path)),
        paths: ServicePaths {
            model_path: config.model_path.clone(),
            database_path: config.database_path.clone(),
            external_history_path: config.external_history_path.clone(),
            frontend_dir: config.frontend_dir.clone(),
        },
        reference_date,
        clock: Arc::new(SystemClock),
    };

    start_server(state, &config.bind_address()).await
}
