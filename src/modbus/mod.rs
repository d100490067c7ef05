pub mod session;
pub mod tcp;

pub use session::Session;
pub use tcp::TcpConnector;

use crate::error::Error;

use async_trait::async_trait;

/// Opens links to a DTU. One call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Link>, Error>;
}

/// An open Modbus link. Exception responses come back as `Error::Protocol`,
/// socket and framing failures as `Error::Transport`.
#[async_trait]
pub trait Link: Send {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, Error>;

    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, Error>;

    async fn write_coils(&mut self, address: u16, bits: &[bool]) -> Result<(), Error>;
}
