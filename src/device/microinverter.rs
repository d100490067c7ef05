use crate::prelude::*;
use crate::device::{numeric, read_field, register_map, PanelReading, TEMPERATURE_SCALE};

use serde::Serialize;

/// A microinverter found during discovery, with its panels in discovery order.
///
/// There is always at least one panel: the one at the microinverter's own base
/// address, added on creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Microinverter {
    serial_number: String,
    base_address: u16,
    panels: Vec<Panel>,
}

impl Microinverter {
    pub fn new(base_address: u16, serial_number: impl Into<String>) -> Self {
        let mut microinverter = Self {
            serial_number: serial_number.into(),
            base_address,
            panels: Vec::new(),
        };
        microinverter.add_panel(base_address);
        microinverter
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn base_address(&self) -> u16 {
        self.base_address
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    /// Adds a panel at `address`. Returns false if one is already registered there.
    pub fn add_panel(&mut self, address: u16) -> bool {
        if self.panels.iter().any(|p| p.address() == address) {
            debug!("Panel at address {:#06x} already exists, skipping creation.", address);
            return false;
        }

        self.panels.push(Panel::new(address));
        true
    }

    pub async fn read_value(&self, session: &mut Session, field: Field) -> Result<Value, Error> {
        read_field(session, &register_map::MICROINVERTER, field, self.base_address).await
    }

    /// °C.
    pub async fn temperature(&self, session: &mut Session) -> Result<f64, Error> {
        let value = self.read_value(session, Field::Temperature).await?;
        Ok(numeric(Field::Temperature, &value)? / TEMPERATURE_SCALE)
    }

    /// Sum of `pv_power` over all panels, in watts.
    pub async fn total_current_power(&self, session: &mut Session) -> Result<f64, Error> {
        let mut total = 0.0;
        for panel in &self.panels {
            total += panel.pv_power(session).await?;
        }
        Ok(total)
    }

    /// Sum of `today_production` over all panels, in Wh.
    pub async fn today_production(&self, session: &mut Session) -> Result<u64, Error> {
        debug!("Getting today's production for microinverter {}", self.serial_number);
        let mut total = 0;
        for panel in &self.panels {
            total += panel.today_production(session).await? as u64;
        }
        Ok(total)
    }

    pub async fn reading(&self, session: &mut Session) -> Result<MicroinverterReading, Error> {
        let temperature = self.temperature(session).await?;
        let mut panels = Vec::with_capacity(self.panels.len());
        for panel in &self.panels {
            panels.push(panel.reading(session).await?);
        }

        Ok(MicroinverterReading {
            serial_number: self.serial_number.clone(),
            base_address: self.base_address,
            temperature,
            panels,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MicroinverterReading {
    pub serial_number: String,
    pub base_address: u16,
    pub temperature: f64,
    pub panels: Vec<PanelReading>,
}
