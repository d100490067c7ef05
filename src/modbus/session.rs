use crate::prelude::*;
use crate::codec;
use crate::modbus::{Connector, Link, TcpConnector};

use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10; // per connect attempt, and per request
const CONNECT_RETRIES: usize = 3;

#[cfg(not(feature = "mocks"))]
const REQUEST_DELAY_MS: u64 = 100;

#[cfg(feature = "mocks")]
const REQUEST_DELAY_MS: u64 = 0; // no pacing in tests

/// The single connection to a DTU.
///
/// The link is opened lazily on first use and reused until an error occurs or
/// [`Session::disconnect`] is called. Any failed register read drops the link,
/// so the following call reconnects from scratch.
pub struct Session {
    host: String,
    port: u16,
    connector: Box<dyn Connector>,
    link: Option<Box<dyn Link>>,
}

impl Session {
    pub fn new(host: impl Into<String>, port: u16, connector: Box<dyn Connector>) -> Self {
        Self {
            host: host.into(),
            port,
            connector,
            link: None,
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self::new(host, port, Box::new(TcpConnector::new(unit_id)))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Opens the link if needed. Never fails; a `false` return has already been logged.
    pub async fn connect(&mut self) -> bool {
        if self.link.is_some() {
            return true;
        }

        let timeout_duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
        let mut last_error = String::new();

        for attempt in 0..=CONNECT_RETRIES {
            match tokio::time::timeout(timeout_duration, self.connector.connect(&self.host, self.port)).await {
                Ok(Ok(link)) => {
                    debug!("Connected to DTU at {}:{}", self.host, self.port);
                    self.link = Some(link);
                    return true;
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("timeout after {} seconds", CONNECT_TIMEOUT_SECS)
                }
            }
            debug!(
                "connect attempt {} of {} to {}:{} failed: {}",
                attempt + 1,
                CONNECT_RETRIES + 1,
                self.host,
                self.port,
                last_error
            );
        }

        error!("Failed to connect to DTU at {}:{}: {}", self.host, self.port, last_error);
        false
    }

    pub async fn disconnect(&mut self) {
        if self.link.take().is_some() {
            debug!("Disconnected from DTU at {}:{}", self.host, self.port);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Reads `count` holding registers at `address` and decodes them.
    ///
    /// Any failure after the link is up disconnects before the error is returned.
    pub async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
        register_type: RegisterType,
    ) -> Result<Value, Error> {
        let link = self.ensure_connected().await?;

        let result = async {
            // pace requests, the DTU is easily overwhelmed
            tokio::time::sleep(Duration::from_millis(REQUEST_DELAY_MS)).await;
            let registers = with_timeout(address, link.read_holding_registers(address, count)).await?;
            codec::decode(&registers, register_type)
        }
        .await;

        match result {
            Ok(value) => {
                trace!("read {:#06x} x{} as {}: {}", address, count, register_type, value);
                Ok(value)
            }
            Err(e) => {
                error!("Failed to read address {:#06x}: {}", address, e);
                self.disconnect().await;
                Err(e)
            }
        }
    }

    pub async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, Error> {
        let link = self.ensure_connected().await?;

        match with_timeout(address, link.read_coils(address, count)).await {
            Ok(bits) => {
                debug!("Read {} bits from {:#06x}: {:?}", bits.len(), address, bits);
                Ok(bits)
            }
            Err(e) => {
                error!("Failed to read coils at {:#06x}: {}", address, e);
                self.disconnect().await;
                Err(e)
            }
        }
    }

    /// Writes coils starting at `address`.
    ///
    /// An exception response from the device is logged and reported as
    /// `Ok(false)`; transport failures disconnect and propagate.
    pub async fn write_coils(&mut self, address: u16, bits: &[bool]) -> Result<bool, Error> {
        let link = self.ensure_connected().await?;

        match with_timeout(address, link.write_coils(address, bits)).await {
            Ok(()) => {
                debug!("Wrote {} bits to {:#06x}: {:?}", bits.len(), address, bits);
                Ok(true)
            }
            Err(e @ Error::Protocol { .. }) => {
                error!("Error writing to register {:#06x}: {}", address, e);
                Ok(false)
            }
            Err(e) => {
                error!("Failed to write coils at {:#06x}: {}", address, e);
                self.disconnect().await;
                Err(e)
            }
        }
    }

    async fn ensure_connected(&mut self) -> Result<&mut Box<dyn Link>, Error> {
        if !self.connect().await {
            return Err(Error::Connection {
                host: self.host.clone(),
                port: self.port,
                reason: "failed to connect to DTU".to_string(),
            });
        }

        match self.link.as_mut() {
            Some(link) => Ok(link),
            None => Err(Error::Connection {
                host: self.host.clone(),
                port: self.port,
                reason: "link dropped while connecting".to_string(),
            }),
        }
    }
}

async fn with_timeout<T>(
    address: u16,
    request: impl std::future::Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match tokio::time::timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), request).await {
        Ok(result) => result,
        Err(_) => Err(Error::Transport {
            address,
            reason: format!("no reply after {} seconds", CONNECT_TIMEOUT_SECS),
        }),
    }
}
