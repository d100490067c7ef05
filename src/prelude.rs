pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use tokio::sync::broadcast;

pub use std::io::Write;

pub use crate::codec::{RegisterType, Value};
pub use crate::config::{self, Config};
pub use crate::device::{Field, Microinverter, Panel};
pub use crate::dtu::Dtu;
pub use crate::error::Error;
pub use crate::modbus::{Connector, Link, Session};
pub use crate::options::Options;
