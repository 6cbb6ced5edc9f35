//! PV forecast entry point: CLI wiring and config-driven service construction.

use std::path::{Path, PathBuf};
use std::process;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use pv_forecast::config::ServiceConfig;
use pv_forecast::io::export::export_csv;
use pv_forecast::service::ForecastService;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    preset: Option<String>,
    system: Option<String>,
    days: Option<usize>,
    device: Option<String>,
    lookahead: usize,
    weather_csv: Option<String>,
    seed_override: Option<u64>,
    forecast_out: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    bind: Option<String>,
}

fn print_help() {
    eprintln!("pv-forecast: photovoltaic power forecast and load scheduling");
    eprintln!();
    eprintln!("Usage: pv-forecast [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load configuration from a TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline, offline)");
    eprintln!("  --system <id>            System to forecast (default: first configured)");
    eprintln!("  --days <n>               Forecast days (default: forecast.default_days)");
    eprintln!("  --device <id>            Also find the best run window for this device");
    eprintln!("  --lookahead <n>          Window search lookahead in days (default: 1)");
    eprintln!("  --weather-csv <path>     Read weather from a CSV file instead");
    eprintln!("  --seed <u64>             Override the synthetic weather seed");
    eprintln!("  --forecast-out <path>    Export the hourly forecast to CSV");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start the REST API after printing results");
        eprintln!("  --bind <addr>            API bind address (default: api.bind)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --config or --preset is given, the baseline preset is used.");
    eprintln!("Log level is controlled with RUST_LOG (default: pv_forecast=info).");
}

fn value_of(args: &[String], i: usize, flag: &str, what: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, flag: &str, what: &str) -> T {
    raw.parse::<T>().unwrap_or_else(|_| {
        eprintln!("error: {flag} value \"{raw}\" is not a valid {what}");
        process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        preset: None,
        system: None,
        days: None,
        device: None,
        lookahead: 1,
        weather_csv: None,
        seed_override: None,
        forecast_out: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        bind: None,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                cli.config_path = Some(value_of(&args, i, flag, "a path argument"));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(value_of(&args, i, flag, "a name argument"));
            }
            "--system" => {
                i += 1;
                cli.system = Some(value_of(&args, i, flag, "an id argument"));
            }
            "--days" => {
                i += 1;
                let raw = value_of(&args, i, flag, "a number");
                cli.days = Some(parse_number(&raw, flag, "day count"));
            }
            "--device" => {
                i += 1;
                cli.device = Some(value_of(&args, i, flag, "an id argument"));
            }
            "--lookahead" => {
                i += 1;
                let raw = value_of(&args, i, flag, "a number");
                cli.lookahead = parse_number(&raw, flag, "day count");
            }
            "--weather-csv" => {
                i += 1;
                cli.weather_csv = Some(value_of(&args, i, flag, "a path argument"));
            }
            "--seed" => {
                i += 1;
                let raw = value_of(&args, i, flag, "a u64 argument");
                cli.seed_override = Some(parse_number(&raw, flag, "u64"));
            }
            "--forecast-out" => {
                i += 1;
                cli.forecast_out = Some(value_of(&args, i, flag, "a path argument"));
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--bind" => {
                i += 1;
                cli.bind = Some(value_of(&args, i, flag, "an address argument"));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Resolves the configuration: `--config` first, then `--preset`, then baseline,
/// with CLI overrides applied on top.
fn load_config(cli: &CliArgs) -> ServiceConfig {
    let loaded = if let Some(ref path) = cli.config_path {
        ServiceConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        ServiceConfig::from_preset(name)
    } else {
        Ok(ServiceConfig::baseline())
    };
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(ref path) = cli.weather_csv {
        config.weather.source = "csv".to_string();
        config.weather.csv_path = Some(PathBuf::from(path));
    }
    if let Some(seed) = cli.seed_override {
        config.weather.seed = seed;
    }
    #[cfg(feature = "api")]
    if let Some(ref bind) = cli.bind {
        config.api.bind = bind.clone();
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

async fn run(cli: CliArgs, config: ServiceConfig) -> Result<(), String> {
    let service = ForecastService::from_config(&config).map_err(|e| e.to_string())?;

    let system_id = match cli.system.clone().or_else(|| config.systems.first().map(|s| s.id.clone())) {
        Some(id) => id,
        None => return Err("no systems configured".to_string()),
    };

    let now = Utc::now();
    let forecast = service
        .forecast(&system_id, cli.days, now)
        .await
        .map_err(|e| e.to_string())?;
    println!("{forecast}");

    if let Some(ref device_id) = cli.device {
        let window = service
            .optimal_window(&system_id, device_id, cli.lookahead, now)
            .await
            .map_err(|e| e.to_string())?;
        println!("\n{window}");
    }

    if let Some(ref path) = cli.forecast_out {
        export_csv(&forecast, Path::new(path)).map_err(|e| format!("failed to write CSV: {e}"))?;
        eprintln!("Forecast written to {path}");
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let addr: SocketAddr = config
            .api
            .bind
            .parse()
            .map_err(|e| format!("invalid bind address: {e}"))?;
        let state = Arc::new(pv_forecast::api::AppState::new(service));
        pv_forecast::api::serve(state, addr)
            .await
            .map_err(|e| format!("server error: {e}"))?;
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pv_forecast=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    let config = load_config(&cli);

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });
    if let Err(e) = rt.block_on(run(cli, config)) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
