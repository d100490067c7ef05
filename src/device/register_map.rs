use crate::codec::RegisterType;
use crate::error::Error;

use serde::Serialize;

/// Offsets in the maps below are relative to this origin; the first slot of the
/// DTU's device table starts here.
pub const ORIGIN: u16 = 0x1000;

/// Registers per device slot (`0x1000..0x1028` for the first device).
pub const SLOT_SIZE: u16 = 0x0028;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    DataType,
    SerialNumber,
    Firmware,
    PortNumber,
    PvVoltage,
    PvCurrent,
    GridVoltage,
    GridFrequency,
    PvPower,
    TodayProduction,
    TotalProduction,
    Temperature,
    OperatingStatus,
    AlarmCode,
    AlarmCount,
    LinkStatus,
    Fixed,
    Reserved1,
    Reserved2,
    Reserved3,
    Reserved4,
    Reserved5,
    Reserved6,
}

impl Field {
    pub fn name(&self) -> &'static str {
        use Field::*;

        match self {
            DataType => "data_type",
            SerialNumber => "serial_number",
            Firmware => "firmware",
            PortNumber => "port_number",
            PvVoltage => "pv_voltage",
            PvCurrent => "pv_current",
            GridVoltage => "grid_voltage",
            GridFrequency => "grid_frequency",
            PvPower => "pv_power",
            TodayProduction => "today_production",
            TotalProduction => "total_production",
            Temperature => "temperature",
            OperatingStatus => "operating_status",
            AlarmCode => "alarm_code",
            AlarmCount => "alarm_count",
            LinkStatus => "link_status",
            Fixed => "fixed",
            Reserved1 => "reserved_1",
            Reserved2 => "reserved_2",
            Reserved3 => "reserved_3",
            Reserved4 => "reserved_4",
            Reserved5 => "reserved_5",
            Reserved6 => "reserved_6",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a field lives and how to decode it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterSpec {
    pub offset: u16,
    pub count: u16,
    pub register_type: RegisterType,
}

const fn spec(offset: u16, count: u16, register_type: RegisterType) -> RegisterSpec {
    RegisterSpec {
        offset,
        count,
        register_type,
    }
}

/// Named register layout for one kind of entity, reusable at any base address.
#[derive(Debug)]
pub struct RegisterMap {
    entity: &'static str,
    fields: &'static [(Field, RegisterSpec)],
}

impl RegisterMap {
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.iter().map(|(field, _)| *field)
    }

    pub fn get(&self, field: Field) -> Result<RegisterSpec, Error> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, spec)| *spec)
            .ok_or(Error::UnknownField {
                field,
                entity: self.entity,
            })
    }

    /// Absolute register address of `field` for an entity based at `base_address`.
    pub fn address(&self, field: Field, base_address: u16) -> Result<u16, Error> {
        let spec = self.get(field)?;
        translate(spec.offset, base_address).ok_or_else(|| {
            Error::Domain(format!(
                "{} of {} at {:#06x} is outside the register space",
                field, self.entity, base_address
            ))
        })
    }
}

/// `(offset - ORIGIN) + base_address`, or `None` on overflow.
pub fn translate(offset: u16, base_address: u16) -> Option<u16> {
    offset
        .checked_sub(ORIGIN)
        .and_then(|relative| relative.checked_add(base_address))
}

// status/alarm/link are 2 registers wide here but 1 in the panel map
pub static MICROINVERTER: RegisterMap = RegisterMap {
    entity: "microinverter",
    fields: &[
        (Field::DataType, spec(0x1000, 1, RegisterType::U16)),
        (Field::SerialNumber, spec(0x1001, 3, RegisterType::AsciiBcd)),
        (Field::Firmware, spec(0x1004, 3, RegisterType::Ascii)),
        (Field::PortNumber, spec(0x1007, 1, RegisterType::U16)),
        (Field::PvVoltage, spec(0x1008, 1, RegisterType::U16)),
        (Field::PvCurrent, spec(0x100A, 1, RegisterType::U16)),
        (Field::GridVoltage, spec(0x100C, 1, RegisterType::U16)),
        (Field::GridFrequency, spec(0x100E, 1, RegisterType::U16)),
        (Field::PvPower, spec(0x1010, 1, RegisterType::U16)),
        (Field::TodayProduction, spec(0x1012, 1, RegisterType::U16)),
        (Field::TotalProduction, spec(0x1014, 2, RegisterType::U32)),
        (Field::Temperature, spec(0x1018, 1, RegisterType::I16)),
        (Field::OperatingStatus, spec(0x101A, 2, RegisterType::U16)),
        (Field::AlarmCode, spec(0x101C, 2, RegisterType::U16)),
        (Field::AlarmCount, spec(0x101E, 2, RegisterType::U16)),
        (Field::LinkStatus, spec(0x1020, 2, RegisterType::U16)),
        (Field::Fixed, spec(0x1021, 1, RegisterType::U16)),
        (Field::Reserved1, spec(0x1022, 1, RegisterType::U16)),
        (Field::Reserved2, spec(0x1023, 1, RegisterType::U16)),
        (Field::Reserved3, spec(0x1024, 1, RegisterType::U16)),
        (Field::Reserved4, spec(0x1025, 1, RegisterType::U16)),
        (Field::Reserved5, spec(0x1026, 1, RegisterType::U16)),
        (Field::Reserved6, spec(0x1027, 1, RegisterType::U16)),
    ],
};

pub static PANEL: RegisterMap = RegisterMap {
    entity: "panel",
    fields: &[
        (Field::SerialNumber, spec(0x1001, 3, RegisterType::AsciiBcd)),
        (Field::PvVoltage, spec(0x1008, 1, RegisterType::U16)),
        (Field::PvCurrent, spec(0x100A, 1, RegisterType::U16)),
        (Field::GridVoltage, spec(0x100C, 1, RegisterType::U16)),
        (Field::GridFrequency, spec(0x100E, 1, RegisterType::U16)),
        (Field::PvPower, spec(0x1010, 1, RegisterType::U16)),
        (Field::TodayProduction, spec(0x1012, 1, RegisterType::U16)),
        (Field::TotalProduction, spec(0x1014, 2, RegisterType::U32)),
        (Field::Temperature, spec(0x1018, 1, RegisterType::I16)),
        (Field::OperatingStatus, spec(0x101A, 1, RegisterType::U16)),
        (Field::AlarmCode, spec(0x101C, 1, RegisterType::U16)),
        (Field::AlarmCount, spec(0x101E, 1, RegisterType::U16)),
        (Field::LinkStatus, spec(0x1020, 1, RegisterType::U16)),
    ],
};
