use crate::prelude::*;
use crate::device::register_map::{ORIGIN, SLOT_SIZE};
use crate::device::MicroinverterReading;
use crate::modbus::tcp::DEFAULT_UNIT_ID;

use serde::Serialize;

/// The DTU's own identity registers start here.
pub const DTU_BASE_ADDRESS: u16 = 0x2000;

/// Device slots probed during discovery.
pub const MAX_SLOTS: u16 = 20;

/// First of the 8 coils holding the power limit percentage, LSB first.
pub const POWER_LIMIT_COIL: u16 = 0xC001;
pub const POWER_LIMIT_BITS: u16 = 8;
pub const POWER_LIMIT_MIN: u8 = 5;
pub const POWER_LIMIT_MAX: u8 = 100;

const SERIAL_REGISTERS: u16 = 3;

pub const MANUFACTURER: &str = "Hoymiles";
pub const MODEL: &str = "PRO (s)";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub serial_number: Option<String>,
    pub total_power: f64,
    pub daily_energy: u64,
    pub microinverters: Vec<MicroinverterReading>,
}

/// A Hoymiles DTU reached over Modbus-TCP: its session, identity and the
/// microinverters found by [`Dtu::map_microinverters`].
pub struct Dtu {
    session: Session,
    base_address: u16,
    serial_number: Option<String>,
    microinverters: Vec<Microinverter>,
}

impl Dtu {
    pub fn new_client(host: impl Into<String>, port: u16) -> Self {
        Self::with_session(Session::tcp(host, port, DEFAULT_UNIT_ID))
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session,
            base_address: DTU_BASE_ADDRESS,
            serial_number: None,
            microinverters: Vec::new(),
        }
    }

    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    pub async fn connect(&mut self) -> bool {
        self.session.connect().await
    }

    pub async fn disconnect(&mut self) {
        self.session.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Connects and reads the serial number; any failure becomes `false`.
    pub async fn test_connection(&mut self) -> bool {
        debug!(
            "Testing connection to Hoymiles DTU at {}:{}...",
            self.session.host(),
            self.session.port()
        );
        self.session.connect().await;
        match self.read_serial_number().await {
            Ok(_) => true,
            Err(e) => {
                error!("Connection test failed: {}", e);
                false
            }
        }
    }

    fn address(&self, offset: u16) -> u16 {
        self.base_address + offset
    }

    // Identity {{{
    pub async fn read_serial_number(&mut self) -> Result<String, Error> {
        let value = self
            .session
            .read_holding_registers(self.address(0), SERIAL_REGISTERS, RegisterType::AsciiBcd)
            .await?;

        value
            .into_string()
            .ok_or_else(|| Error::InvalidData("serial number is not a string".to_string()))
    }

    /// Reads and stores the DTU serial number, which [`Dtu::sid`] and
    /// [`Dtu::name`] depend on.
    pub async fn fetch_serial_number(&mut self) -> Result<&str, Error> {
        let serial = self.read_serial_number().await?;
        if serial.is_empty() {
            return Err(Error::Domain(
                "Failed to fetch serial number from Hoymiles DTU.".to_string(),
            ));
        }

        debug!("Serial number set to: {}", serial);
        Ok(self.serial_number.insert(serial).as_str())
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    fn require_serial(&self) -> Result<&str, Error> {
        self.serial_number.as_deref().ok_or_else(|| {
            Error::Domain("Serial number not set. Call fetch_serial_number() first.".to_string())
        })
    }

    pub fn sid(&self) -> Result<String, Error> {
        Ok(format!("hoymiles_dtu_{}_tcp", self.require_serial()?))
    }

    pub fn name(&self) -> Result<String, Error> {
        Ok(format!("Hoymiles DTU {}", self.require_serial()?))
    }

    pub fn device_info(&self) -> Result<DeviceInfo, Error> {
        Ok(DeviceInfo {
            identifier: self.sid()?,
            name: self.name()?,
            manufacturer: MANUFACTURER,
            model: MODEL,
        })
    }
    // }}}

    // Discovery {{{
    /// Walks the device slots and records every microinverter found.
    ///
    /// Scanning stops at the first slot that fails to read or holds an empty
    /// serial number. A serial number seen again at a later slot adds a panel
    /// to the existing microinverter. Returns the number of microinverters,
    /// failing if there are none.
    pub async fn map_microinverters(&mut self) -> Result<usize, Error> {
        debug!(
            "Mapping microinverters on {}:{}...",
            self.session.host(),
            self.session.port()
        );

        for slot in 0..MAX_SLOTS {
            let base_address = ORIGIN + slot * SLOT_SIZE;

            let serial = match self
                .session
                .read_holding_registers(base_address + 1, SERIAL_REGISTERS, RegisterType::AsciiBcd)
                .await
            {
                Ok(value) => value.into_string().unwrap_or_default(),
                Err(e) => {
                    debug!("Stopping discovery at slot {} ({:#06x}): {}", slot, base_address, e);
                    break;
                }
            };

            if serial.is_empty() {
                debug!("Slot {} ({:#06x}) is empty, stopping discovery", slot, base_address);
                break;
            }

            debug!("Microinverter {} at address {:#06x}", serial, base_address);
            match self.microinverter_mut(&serial) {
                Some(microinverter) => {
                    microinverter.add_panel(base_address);
                }
                None => self
                    .microinverters
                    .push(Microinverter::new(base_address, serial)),
            }
        }

        let count = self.microinverters.len();
        if count == 0 {
            return Err(Error::Domain(
                "Failed to map microinverters. No microinverters found.".to_string(),
            ));
        }

        debug!("Found {} microinverters", count);
        Ok(count)
    }

    pub fn microinverters(&self) -> &[Microinverter] {
        &self.microinverters
    }

    pub fn microinverter(&self, serial_number: &str) -> Option<&Microinverter> {
        self.microinverters
            .iter()
            .find(|m| m.serial_number() == serial_number)
    }

    fn microinverter_mut(&mut self, serial_number: &str) -> Option<&mut Microinverter> {
        self.microinverters
            .iter_mut()
            .find(|m| m.serial_number() == serial_number)
    }
    // }}}

    // Aggregates {{{
    /// Current output of every panel, in watts.
    pub async fn get_total_power(&mut self) -> Result<f64, Error> {
        let mut total = 0.0;
        for microinverter in &self.microinverters {
            total += microinverter.total_current_power(&mut self.session).await?;
        }
        Ok(total)
    }

    /// Today's production of every panel, in Wh.
    pub async fn get_daily_power(&mut self) -> Result<u64, Error> {
        let mut total = 0;
        for microinverter in &self.microinverters {
            total += microinverter.today_production(&mut self.session).await?;
        }
        Ok(total)
    }

    pub async fn snapshot(&mut self) -> Result<Snapshot, Error> {
        let mut microinverters = Vec::with_capacity(self.microinverters.len());
        for microinverter in &self.microinverters {
            microinverters.push(microinverter.reading(&mut self.session).await?);
        }

        let total_power: f64 = microinverters
            .iter()
            .flat_map(|m| m.panels.iter())
            .map(|p| p.pv_power)
            .sum();
        let daily_energy: u64 = microinverters
            .iter()
            .flat_map(|m| m.panels.iter())
            .map(|p| p.today_production as u64)
            .sum();

        Ok(Snapshot {
            serial_number: self.serial_number.clone(),
            total_power,
            daily_energy,
            microinverters,
        })
    }
    // }}}

    // Power limit {{{
    pub async fn read_power_level(&mut self) -> Result<u8, Error> {
        let bits = self
            .session
            .read_coils(POWER_LIMIT_COIL, POWER_LIMIT_BITS)
            .await?;

        Ok(power_level_from_bits(&bits))
    }

    /// Writes the power limit percentage. Values outside 5..=100 are rejected
    /// before any I/O. Returns false if the DTU refused the write.
    pub async fn write_power_level(&mut self, percentage: u8) -> Result<bool, Error> {
        validate_power_level(percentage)?;

        let bits = power_level_to_bits(percentage);
        debug!("Writing {}% as bits: {:?}", percentage, bits);

        let written = self.session.write_coils(POWER_LIMIT_COIL, &bits).await?;
        if written {
            debug!("Successfully wrote {}% to register {:#06x}", percentage, POWER_LIMIT_COIL);
        }
        Ok(written)
    }
    // }}}
}

pub fn validate_power_level(percentage: u8) -> Result<(), Error> {
    if !(POWER_LIMIT_MIN..=POWER_LIMIT_MAX).contains(&percentage) {
        return Err(Error::Validation(format!(
            "power level {}% must be between {} and {}",
            percentage, POWER_LIMIT_MIN, POWER_LIMIT_MAX
        )));
    }
    Ok(())
}

pub fn power_level_to_bits(percentage: u8) -> [bool; POWER_LIMIT_BITS as usize] {
    std::array::from_fn(|i| (percentage >> i) & 1 == 1)
}

pub fn power_level_from_bits(bits: &[bool]) -> u8 {
    bits.iter()
        .take(POWER_LIMIT_BITS as usize)
        .enumerate()
        .fold(0, |acc, (i, bit)| if *bit { acc | (1 << i) } else { acc })
}
