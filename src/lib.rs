#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod analog;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod dht;
pub mod http;
pub mod measurement;
pub mod query;
pub mod reporter;
pub mod transport;

#[cfg(feature = "esp32")]
pub mod board;
#[cfg(feature = "esp32")]
pub mod net;
#[cfg(feature = "esp32")]
pub mod wifi;
