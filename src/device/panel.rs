use crate::prelude::*;
use crate::device::{
    numeric, read_field, register_map, unsigned, CURRENT_SCALE, FREQUENCY_SCALE, POWER_SCALE,
    TEMPERATURE_SCALE, VOLTAGE_SCALE,
};

use serde::Serialize;

/// One DC input of a microinverter, identified by the slot address it was found at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Panel {
    address: u16,
}

impl Panel {
    pub fn new(address: u16) -> Self {
        Self { address }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub async fn read_value(&self, session: &mut Session, field: Field) -> Result<Value, Error> {
        read_field(session, &register_map::PANEL, field, self.address).await
    }

    async fn read_scaled(&self, session: &mut Session, field: Field, scale: f64) -> Result<f64, Error> {
        let value = self.read_value(session, field).await?;
        Ok(numeric(field, &value)? / scale)
    }

    async fn read_raw(&self, session: &mut Session, field: Field) -> Result<u32, Error> {
        let value = self.read_value(session, field).await?;
        unsigned(field, &value)
    }

    /// Volts.
    pub async fn pv_voltage(&self, session: &mut Session) -> Result<f64, Error> {
        self.read_scaled(session, Field::PvVoltage, VOLTAGE_SCALE).await
    }

    /// Amps.
    pub async fn pv_current(&self, session: &mut Session) -> Result<f64, Error> {
        self.read_scaled(session, Field::PvCurrent, CURRENT_SCALE).await
    }

    pub async fn grid_voltage(&self, session: &mut Session) -> Result<f64, Error> {
        self.read_scaled(session, Field::GridVoltage, VOLTAGE_SCALE).await
    }

    /// Hz.
    pub async fn grid_frequency(&self, session: &mut Session) -> Result<f64, Error> {
        self.read_scaled(session, Field::GridFrequency, FREQUENCY_SCALE).await
    }

    /// Watts; the register holds deci-watts.
    pub async fn pv_power(&self, session: &mut Session) -> Result<f64, Error> {
        self.read_scaled(session, Field::PvPower, POWER_SCALE).await
    }

    /// Wh, unscaled.
    pub async fn today_production(&self, session: &mut Session) -> Result<u32, Error> {
        debug!("Getting today's production for panel at address {:#06x}", self.address);
        let wh = self.read_raw(session, Field::TodayProduction).await?;
        debug!("Today's production for panel at address {:#06x}: {} Wh", self.address, wh);
        Ok(wh)
    }

    /// Wh, unscaled.
    pub async fn total_production(&self, session: &mut Session) -> Result<u32, Error> {
        self.read_raw(session, Field::TotalProduction).await
    }

    /// °C.
    pub async fn temperature(&self, session: &mut Session) -> Result<f64, Error> {
        self.read_scaled(session, Field::Temperature, TEMPERATURE_SCALE).await
    }

    pub async fn operating_status(&self, session: &mut Session) -> Result<u32, Error> {
        self.read_raw(session, Field::OperatingStatus).await
    }

    pub async fn alarm_code(&self, session: &mut Session) -> Result<u32, Error> {
        self.read_raw(session, Field::AlarmCode).await
    }

    pub async fn alarm_count(&self, session: &mut Session) -> Result<u32, Error> {
        self.read_raw(session, Field::AlarmCount).await
    }

    pub async fn link_status(&self, session: &mut Session) -> Result<u32, Error> {
        self.read_raw(session, Field::LinkStatus).await
    }

    /// Reads every reported field, one request at a time.
    pub async fn reading(&self, session: &mut Session) -> Result<PanelReading, Error> {
        Ok(PanelReading {
            address: self.address,
            pv_voltage: self.pv_voltage(session).await?,
            pv_current: self.pv_current(session).await?,
            grid_voltage: self.grid_voltage(session).await?,
            grid_frequency: self.grid_frequency(session).await?,
            pv_power: self.pv_power(session).await?,
            today_production: self.today_production(session).await?,
            total_production: self.total_production(session).await?,
            temperature: self.temperature(session).await?,
            operating_status: self.operating_status(session).await?,
            alarm_code: self.alarm_code(session).await?,
            alarm_count: self.alarm_count(session).await?,
            link_status: self.link_status(session).await?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PanelReading {
    pub address: u16,
    pub pv_voltage: f64,
    pub pv_current: f64,
    pub grid_voltage: f64,
    pub grid_frequency: f64,
    pub pv_power: f64,
    pub today_production: u32,
    pub total_production: u32,
    pub temperature: f64,
    pub operating_status: u32,
    pub alarm_code: u32,
    pub alarm_count: u32,
    pub link_status: u32,
}
