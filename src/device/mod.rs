pub mod microinverter;
pub mod panel;
pub mod register_map;

pub use microinverter::{Microinverter, MicroinverterReading};
pub use panel::{Panel, PanelReading};
pub use register_map::{Field, RegisterMap, RegisterSpec};

use crate::prelude::*;

// Fixed-point divisors applied by the individual accessors.
pub const VOLTAGE_SCALE: f64 = 10.0;
pub const CURRENT_SCALE: f64 = 100.0;
pub const FREQUENCY_SCALE: f64 = 100.0;
pub const POWER_SCALE: f64 = 10.0;
pub const TEMPERATURE_SCALE: f64 = 10.0;

/// Reads `field` through `map` for an entity based at `base_address`.
pub(crate) async fn read_field(
    session: &mut Session,
    map: &RegisterMap,
    field: Field,
    base_address: u16,
) -> Result<Value, Error> {
    let spec = map.get(field)?;
    let address = map.address(field, base_address)?;
    debug!(
        "Reading {} of {} at {:#06x} ({} registers) as {}",
        field,
        map.entity(),
        address,
        spec.count,
        spec.register_type
    );
    session
        .read_holding_registers(address, spec.count, spec.register_type)
        .await
}

pub(crate) fn numeric(field: Field, value: &Value) -> Result<f64, Error> {
    value
        .as_f64()
        .ok_or_else(|| Error::InvalidData(format!("{} is not numeric: {:?}", field, value)))
}

pub(crate) fn unsigned(field: Field, value: &Value) -> Result<u32, Error> {
    value
        .as_u32()
        .ok_or_else(|| Error::InvalidData(format!("{} is not unsigned: {:?}", field, value)))
}
