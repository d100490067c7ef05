use crate::device::Field;

/// Errors raised by the DTU core.
///
/// Transport-level failures (`Connection`, `Protocol`, `Transport`) leave the
/// session disconnected so the next call starts from a fresh connect.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection to {host}:{port} failed: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("modbus exception at {address:#06x}: {reason}")]
    Protocol { address: u16, reason: String },

    #[error("transport error at {address:#06x}: {reason}")]
    Transport { address: u16, reason: String },

    #[error("unsupported register type: {0}")]
    UnsupportedType(String),

    #[error("{register_type} needs {needed} registers, got {got}")]
    InsufficientData {
        register_type: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("invalid register data: {0}")]
    InvalidData(String),

    #[error("field {field} is not mapped for {entity}")]
    UnknownField { field: Field, entity: &'static str },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Domain(String),
}

impl Error {
    /// True for failures of the link itself, as opposed to misuse or bad input.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. } | Error::Protocol { .. } | Error::Transport { .. }
        )
    }
}
