use crate::error::Error;

use serde::Serialize;
use std::fmt::Write as _;

/// How a run of holding registers should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterType {
    U16,
    I16,
    U32,
    Ascii,
    AsciiBcd,
    Hex,
}

impl RegisterType {
    pub fn tag(&self) -> &'static str {
        match self {
            RegisterType::U16 => "uint16",
            RegisterType::I16 => "int16",
            RegisterType::U32 => "uint32",
            RegisterType::Ascii => "ascii",
            RegisterType::AsciiBcd => "ascii_bcd",
            RegisterType::Hex => "hex",
        }
    }
}

impl std::fmt::Display for RegisterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for RegisterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uint16" => Ok(RegisterType::U16),
            "int16" => Ok(RegisterType::I16),
            "uint32" => Ok(RegisterType::U32),
            "ascii" => Ok(RegisterType::Ascii),
            "ascii_bcd" => Ok(RegisterType::AsciiBcd),
            "hex" => Ok(RegisterType::Hex),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}

// Value {{{
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    U16(u16),
    I16(i16),
    U32(u32),
    Ascii(String),
    AsciiBcd(String),
    Hex(String),
}

impl Value {
    /// Numeric view of the value; `None` for the string types.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::U16(v) => Some(*v as f64),
            Value::I16(v) => Some(*v as f64),
            Value::U32(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Unsigned view of the value; `None` for negative or string values.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U16(v) => Some(*v as u32),
            Value::I16(v) => u32::try_from(*v).ok(),
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Ascii(s) | Value::AsciiBcd(s) | Value::Hex(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Value::Ascii(s) | Value::AsciiBcd(s) | Value::Hex(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::U16(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::Ascii(s) | Value::AsciiBcd(s) | Value::Hex(s) => write!(f, "{}", s),
        }
    }
} // }}}

/// Decodes raw holding registers into a typed value.
pub fn decode(registers: &[u16], register_type: RegisterType) -> Result<Value, Error> {
    match register_type {
        RegisterType::U16 => Ok(Value::U16(first(registers, register_type)?)),
        RegisterType::I16 => Ok(Value::I16(first(registers, register_type)? as i16)),
        RegisterType::U32 => {
            if registers.len() < 2 {
                return Err(Error::InsufficientData {
                    register_type: register_type.tag(),
                    needed: 2,
                    got: registers.len(),
                });
            }
            Ok(Value::U32(((registers[0] as u32) << 16) | registers[1] as u32))
        }
        RegisterType::Ascii => {
            let bytes = to_bytes(registers);
            if !bytes.is_ascii() {
                return Err(Error::InvalidData(format!(
                    "non-ascii bytes in {:02x?}",
                    bytes
                )));
            }
            let s = String::from_utf8_lossy(&bytes);
            Ok(Value::Ascii(s.trim_end_matches('\0').to_string()))
        }
        RegisterType::AsciiBcd => {
            let mut digits = String::with_capacity(registers.len() * 4);
            for b in to_bytes(registers) {
                // nibbles above 9 are rendered as their decimal value
                let _ = write!(digits, "{}{}", b >> 4, b & 0x0f);
            }
            Ok(Value::AsciiBcd(digits.trim_start_matches('0').to_string()))
        }
        RegisterType::Hex => {
            let mut hex = String::with_capacity(registers.len() * 4);
            for b in to_bytes(registers) {
                let _ = write!(hex, "{:02x}", b);
            }
            Ok(Value::Hex(hex))
        }
    }
}

/// Like [`decode`] but takes the textual type tag (`"uint16"`, `"ascii_bcd"`, ...).
pub fn decode_tagged(registers: &[u16], tag: &str) -> Result<Value, Error> {
    decode(registers, tag.parse()?)
}

fn first(registers: &[u16], register_type: RegisterType) -> Result<u16, Error> {
    registers.first().copied().ok_or(Error::InsufficientData {
        register_type: register_type.tag(),
        needed: 1,
        got: 0,
    })
}

fn to_bytes(registers: &[u16]) -> Vec<u8> {
    registers.iter().flat_map(|r| r.to_be_bytes()).collect()
}
