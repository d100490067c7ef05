use crate::prelude::*;
use crate::dtu::{POWER_LIMIT_MAX, POWER_LIMIT_MIN};

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub dtu: Dtu,

    #[serde(default = "Config::default_polling")]
    pub polling: Polling,

    #[serde(default = "Config::default_power_limit")]
    pub power_limit: PowerLimit,

    /// Log a JSON snapshot of every panel on each power poll
    #[serde(default)]
    pub report: bool,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Dtu {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Dtu {
    pub host: String,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    pub unit_id: Option<u8>,
}
impl Dtu {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id.unwrap_or(crate::modbus::tcp::DEFAULT_UNIT_ID)
    }
} // }}}

// Polling {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Polling {
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_interval")]
    pub power_interval: Duration,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_interval")]
    pub energy_interval: Duration,
}
impl Polling {
    pub fn power_interval(&self) -> Duration {
        self.power_interval
    }

    pub fn energy_interval(&self) -> Duration {
        self.energy_interval
    }
} // }}}

// PowerLimit {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct PowerLimit {
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_min_write_interval")]
    pub min_write_interval: Duration,

    /// Applied once at startup when set
    pub level: Option<u8>,
}
impl PowerLimit {
    pub fn min_write_interval(&self) -> Duration {
        self.min_write_interval
    }

    pub fn level(&self) -> Option<u8> {
        self.level
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    /// Logs the effective settings. Called once logging is up.
    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  DTU: {}:{} (unit {})", self.dtu.host, self.dtu.port, self.dtu.unit_id());
        info!("  Power Interval: {}s", self.polling.power_interval.as_secs());
        info!("  Energy Interval: {}s", self.polling.energy_interval.as_secs());
        info!(
            "  Power Limit: {} (min write interval {}s)",
            self.power_limit
                .level
                .map(|l| format!("{}%", l))
                .unwrap_or_else(|| "unchanged".to_string()),
            self.power_limit.min_write_interval.as_secs()
        );
        info!("  Report: {}", self.report);
        info!("  Log Level: {}", self.loglevel);
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    fn validate(&self) -> Result<()> {
        if self.dtu.host.is_empty() {
            return Err(anyhow!("config.rs:DTU host cannot be empty"));
        }
        if self.dtu.port == 0 {
            bail!("dtu.port must be between 1 and 65535");
        }

        if self.polling.power_interval.is_zero() {
            bail!("polling.power_interval must be at least 1 second");
        }
        if self.polling.energy_interval.is_zero() {
            bail!("polling.energy_interval must be at least 1 second");
        }

        if let Some(level) = self.power_limit.level {
            if !(POWER_LIMIT_MIN..=POWER_LIMIT_MAX).contains(&level) {
                bail!(
                    "power_limit.level must be between {} and {}",
                    POWER_LIMIT_MIN,
                    POWER_LIMIT_MAX
                );
            }
        }

        Ok(())
    }

    fn default_port() -> u16 {
        502
    }

    fn default_interval() -> Duration {
        Duration::from_secs(120)
    }

    fn default_polling() -> Polling {
        Polling {
            power_interval: Self::default_interval(),
            energy_interval: Self::default_interval(),
        }
    }

    fn default_min_write_interval() -> Duration {
        crate::power_limit::DEFAULT_MIN_WRITE_INTERVAL
    }

    fn default_power_limit() -> PowerLimit {
        PowerLimit {
            min_write_interval: Self::default_min_write_interval(),
            level: None,
        }
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}
