use crate::prelude::*;
use crate::modbus::{Connector, Link};

use {
    async_trait::async_trait,
    net2::TcpStreamExt,
    std::time::Duration,
    tokio_modbus::client::Context,
    tokio_modbus::prelude::{Reader, Slave, Writer},
};

const TCP_KEEPALIVE_SECS: u64 = 60;

/// Default Modbus unit id answered by the DTU.
pub const DEFAULT_UNIT_ID: u8 = 1;

/// Opens plain Modbus-TCP links with `tokio-modbus`.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    unit_id: u8,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_UNIT_ID)
    }
}

impl TcpConnector {
    pub fn new(unit_id: u8) -> Self {
        Self { unit_id }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Link>, Error> {
        let connection_error = |reason: String| Error::Connection {
            host: host.to_string(),
            port,
            reason,
        };

        let stream = tokio::net::TcpStream::connect((host, port))
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        // keepalive has to be set on the std socket
        let std_stream = stream
            .into_std()
            .map_err(|e| connection_error(e.to_string()))?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
            warn!("Failed to set TCP keepalive: {}", e);
        }
        let stream = tokio::net::TcpStream::from_std(std_stream)
            .map_err(|e| connection_error(e.to_string()))?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let ctx = tokio_modbus::client::tcp::attach_slave(stream, Slave(self.unit_id));
        Ok(Box::new(TcpLink { ctx }))
    }
}

pub struct TcpLink {
    ctx: Context,
}

fn map_modbus_result<T>(address: u16, result: tokio_modbus::Result<T>) -> Result<T, Error> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(code)) => Err(Error::Protocol {
            address,
            reason: format!("{:?}", code),
        }),
        Err(e) => Err(Error::Transport {
            address,
            reason: e.to_string(),
        }),
    }
}

#[async_trait]
impl Link for TcpLink {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, Error> {
        map_modbus_result(address, self.ctx.read_holding_registers(address, count).await)
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, Error> {
        map_modbus_result(address, self.ctx.read_coils(address, count).await)
    }

    async fn write_coils(&mut self, address: u16, bits: &[bool]) -> Result<(), Error> {
        map_modbus_result(address, self.ctx.write_multiple_coils(address, bits).await)
    }
}
