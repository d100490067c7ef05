use crate::prelude::*;
use crate::power_limit::PowerLimiter;

use tokio::time::{Instant, MissedTickBehavior};

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Readings {
    /// Watts
    pub power: Option<f64>,
    /// kWh
    pub daily_energy: Option<f64>,
}

/// Periodically polls a DTU and reports station power and daily energy.
///
/// All reads go through the one DTU session, one after another.
pub struct Monitor {
    config: Config,
    dtu: Dtu,
    power_limiter: PowerLimiter,
    readings: Readings,
    last_energy_update: Option<Instant>,
}

impl Monitor {
    pub fn new(config: Config, dtu: Dtu) -> Self {
        let power_limiter = PowerLimiter::new(config.power_limit.min_write_interval());
        Self {
            config,
            dtu,
            power_limiter,
            readings: Readings::default(),
            last_energy_update: None,
        }
    }

    pub fn dtu(&mut self) -> &mut Dtu {
        &mut self.dtu
    }

    pub fn power_limiter(&self) -> &PowerLimiter {
        &self.power_limiter
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    /// Discovers the microinverters and fetches the DTU identity.
    pub async fn setup(&mut self) -> Result<()> {
        let count = self.dtu.map_microinverters().await?;
        info!("Mapped {} microinverters.", count);
        for microinverter in self.dtu.microinverters() {
            debug!(
                "  microinverter {} at {:#06x} with {} panel(s)",
                microinverter.serial_number(),
                microinverter.base_address(),
                microinverter.panels().len()
            );
        }

        self.dtu.fetch_serial_number().await?;
        let device_info = self.dtu.device_info()?;
        info!(
            "Setting up {} ({}) with SID {}",
            device_info.name, device_info.model, device_info.identifier
        );

        if let Some(level) = self.config.power_limit.level() {
            self.set_power_level(level).await?;
        }

        Ok(())
    }

    pub async fn set_power_level(&mut self, percentage: u8) -> Result<crate::power_limit::Outcome> {
        Ok(self.power_limiter.set(&mut self.dtu, percentage).await?)
    }

    pub async fn poll_power(&mut self) -> Result<f64> {
        let sid = self.dtu.sid().unwrap_or_default();
        debug!("Fetching current power for station {}", sid);
        let power = self.dtu.get_total_power().await?;
        info!("{} current power: {:.1} W", sid, power);
        self.readings.power = Some(power);
        Ok(power)
    }

    /// Reads daily energy unless the last reading is younger than the energy
    /// interval. Returns kWh.
    pub async fn poll_energy(&mut self) -> Result<f64> {
        let now = Instant::now();
        if let (Some(energy), Some(last)) = (self.readings.daily_energy, self.last_energy_update) {
            if now.saturating_duration_since(last) < self.config.polling.energy_interval() {
                debug!("Skipping daily energy update, last update was too recent.");
                return Ok(energy);
            }
        }
        self.last_energy_update = Some(now);

        let sid = self.dtu.sid().unwrap_or_default();
        debug!("Fetching daily energy for station {}", sid);
        let kwh = self.dtu.get_daily_power().await? as f64 / 1000.0;
        info!("{} daily energy: {:.3} kWh", sid, kwh);
        self.readings.daily_energy = Some(kwh);
        Ok(kwh)
    }

    pub async fn report(&mut self) -> Result<()> {
        let snapshot = self.dtu.snapshot().await?;
        info!("report: {}", serde_json::to_string(&snapshot)?);
        Ok(())
    }

    async fn tick(&mut self) {
        if let Err(e) = self.poll_power().await {
            error!("Failed to poll power: {}", e);
        }
        if let Err(e) = self.poll_energy().await {
            error!("Failed to poll daily energy: {}", e);
        }
        if self.config.report {
            if let Err(e) = self.report().await {
                error!("Failed to build report: {}", e);
            }
        }
        if let Err(e) = self.power_limiter.flush(&mut self.dtu).await {
            error!("Failed to apply pending power level: {}", e);
        }
    }

    pub async fn start(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let setup = tokio::select! {
            result = self.setup() => Some(result),
            _ = shutdown_rx.recv() => None,
        };
        match setup {
            Some(result) => result?,
            None => {
                info!("Shutdown received during setup");
                self.dtu.disconnect().await;
                return Ok(());
            }
        }

        let mut interval = tokio::time::interval(self.config.polling.power_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown_rx.recv() => {
                    info!("Monitor received shutdown signal");
                    break;
                }
            }
        }

        self.dtu.disconnect().await;
        Ok(())
    }
}
