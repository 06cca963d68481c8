//! # temper - userspace driver for TEMPer USB thermometers
//!
//! Talks to the two known TEMPer hardware revisions over libusb (via rusb). Provides:
//! - Device discovery and identification (Microdia 0c45:7401, RDing 1130:660c)
//! - The vendor initialization handshake for each revision
//! - Calibrated temperature reads through a blocking [`Session`]
//! - An optional background [`Monitor`] that polls a session at a fixed interval
//!
//! ## Quick Start
//! ```no_run
//! use temper::{Session, SessionConfig};
//!
//! let mut session = Session::open(SessionConfig::from_env()).unwrap();
//! let reading = session.read().unwrap();
//! println!("{} ({:.1}°F)", reading, reading.fahrenheit());
//! session.close().unwrap();
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod protocol;
pub mod transport;
pub mod driver;
pub mod device;
pub mod monitor;

#[cfg(test)]
pub(crate) mod mock;

pub use error::TemperError;
pub use types::*;
pub use config::SessionConfig;
pub use device::{Session, State};
pub use monitor::Monitor;

/// Result type alias for temper operations.
pub type Result<T> = std::result::Result<T, TemperError>;
