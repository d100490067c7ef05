// Module declarations for the application's core components
pub mod codec;         // Register decoding
pub mod config;        // Configuration management
pub mod device;        // Microinverter and panel register layouts
pub mod dtu;           // DTU facade: discovery, identity, aggregates, power limit
pub mod error;         // Error handling and types
pub mod modbus;        // Modbus-TCP session and links
pub mod monitor;       // Periodic polling of the DTU
pub mod options;       // Command line options parsing
pub mod power_limit;   // Throttled power limit control
pub mod prelude;       // Common imports and types

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::monitor::Monitor;

fn init_logging(level: &str) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init()
}

/// Main application entry point
///
/// Loads the configuration, then runs the monitor against the configured DTU
/// until a shutdown is broadcast.
pub async fn app(shutdown_rx: broadcast::Receiver<()>, options: Options) -> Result<()> {
    // the config is needed for the real log level, so read it before logging is up
    let config = Config::new(options.config_file.clone());
    let level = config
        .as_ref()
        .map(|c| c.loglevel().to_string())
        .unwrap_or_else(|_| "info".to_string());
    if let Err(e) = init_logging(&level) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    info!("hoymiles-bridge {} starting with config file: {}", CARGO_PKG_VERSION, options.config_file);

    let config = config.map_err(|err| {
        error!("Failed to load config: {:?}", err);
        err
    })?;
    config.log_summary();

    let session = Session::tcp(config.dtu.host(), config.dtu.port(), config.dtu.unit_id());
    let dtu = Dtu::with_session(session);

    let mut monitor = Monitor::new(config, dtu);
    monitor.start(shutdown_rx).await?;

    info!("Application shutdown complete");
    Ok(())
}
