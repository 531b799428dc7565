//! Local-network client for Daikin air conditioners exposing the
//! `/dsiot/multireq` HTTP endpoint.
//!
//! The device models everything as nested attribute trees addressed by
//! short hex-ish keys. [`DaikinClient`] polls those trees into a single
//! [`DeviceState`] snapshot and issues setting writes, handling the
//! device's quirks (mode-dependent attribute slots, two-step power-on,
//! commit markers, escalating retry backoff) internally.
//!
//! ```no_run
//! use daikin_local::{DaikinClient, Mode};
//!
//! # async fn run() -> daikin_local::Result<()> {
//! let mut client = DaikinClient::builder("192.168.1.70").build();
//! client.poll().await;
//! if client.available() {
//!     client.set_mode(Mode::Cool).await?;
//!     client.set_temperature(24.0).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod codec;
mod convert;
mod error;
mod logger;
mod protocol;
mod types;

pub use client::{DaikinClient, DaikinClientBuilder};
pub use convert::{hex_to_temperature, temperature_to_hex};
pub use error::{Error, Result};
pub use types::{
    DeviceState, FanSpeed, HorizontalVane, Mode, SwingMode, VerticalVane,
};
