use crate::prelude::*;
use crate::dtu::{validate_power_level, POWER_LIMIT_MAX};

use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MIN_WRITE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Written to the DTU.
    Applied(u8),
    /// Held back; `retry_in` is the time left until writes are allowed again.
    Throttled { pending: u8, retry_in: Duration },
    /// The DTU answered the write with an exception.
    Refused(u8),
}

/// Rate-limited power limit control.
///
/// Successful writes are at least `min_interval` apart. A request made too
/// soon is kept as the pending value and can be applied later with
/// [`PowerLimiter::flush`].
#[derive(Debug)]
pub struct PowerLimiter {
    min_interval: Duration,
    last_write: Option<Instant>,
    current: u8,
    pending: Option<u8>,
}

impl Default for PowerLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_WRITE_INTERVAL)
    }
}

impl PowerLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_write: None,
            current: POWER_LIMIT_MAX,
            pending: None,
        }
    }

    /// Last value successfully written (100 until the first write).
    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn pending(&self) -> Option<u8> {
        self.pending
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        let last_write = self.last_write?;
        let elapsed = now.saturating_duration_since(last_write);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }

    pub async fn set(&mut self, dtu: &mut Dtu, percentage: u8) -> Result<Outcome, Error> {
        validate_power_level(percentage)?;

        let now = Instant::now();
        if let Some(retry_in) = self.remaining(now) {
            warn!(
                "Power level change to {}% throttled. Last change was {:.1}s ago. Minimum interval is {}s",
                percentage,
                (self.min_interval - retry_in).as_secs_f64(),
                self.min_interval.as_secs()
            );
            self.pending = Some(percentage);
            return Ok(Outcome::Throttled {
                pending: percentage,
                retry_in,
            });
        }

        debug!("Setting power level to {}%", percentage);
        match dtu.write_power_level(percentage).await {
            Ok(true) => {
                self.current = percentage;
                self.last_write = Some(now);
                self.pending = None;
                info!("Successfully set power level to {}%", percentage);
                Ok(Outcome::Applied(percentage))
            }
            Ok(false) => {
                warn!("DTU refused power level {}%", percentage);
                Ok(Outcome::Refused(percentage))
            }
            Err(e) => {
                error!("Failed to set power level to {}%: {}", percentage, e);
                Err(e)
            }
        }
    }

    /// Applies the pending value if there is one and the interval has passed.
    pub async fn flush(&mut self, dtu: &mut Dtu) -> Result<Option<Outcome>, Error> {
        let Some(pending) = self.pending else {
            return Ok(None);
        };

        if self.remaining(Instant::now()).is_some() {
            return Ok(None);
        }

        self.set(dtu, pending).await.map(Some)
    }
}
