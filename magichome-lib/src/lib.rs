//! # MagicHome Library for LAN LED Controllers
//!
//! `magichome-lib` is a Rust library for controlling MagicHome (Flux LED) Wi-Fi
//! controllers on the local network. It speaks the controllers' binary TCP
//! protocol on port 5577 and finds them with the UDP broadcast on port 48899.
//!
//! This library is designed to be used by command-line tools or by hosts that
//! poll a set of controllers and report their state.
//!
//! ## Features
//!
//! - Device discovery on local networks
//! - Power, RGB color, warm white, preset and custom patterns
//! - Reading and replacing the six on-board timers
//! - Reading and setting the controller clock
//! - Sessions that reconnect once on a failed send
//!
//! ## Example
//!
//! Here is a simple example of how to find controllers and turn the first one red:
//!
//! ```no_run
//! use magichome_lib::config::Config;
//! use magichome_lib::control_interface::{ControlInterface, RGB};
//! use magichome_lib::util::discovery::Discovery;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let devices = Discovery::find_devices(Duration::from_secs(3)).await?;
//!
//!     if let Some(device) = devices.into_iter().next() {
//!         let mut control = ControlInterface::from_discovered(device, config.session).await;
//!         control.turn_on().await?;
//!         control.set_color(RGB::new(255, 0, 0), true).await?;
//!         println!("{}", control);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially
//! connected with Magic Home or its affiliates.

pub mod config;

// The `control_interface` module holds the per-device session and the high
// level handle built on top of it, together with the device state they track.
//
// Example usage:
//
// ```
// use magichome_lib::config::SessionConfig;
// use magichome_lib::control_interface::{ControlInterface, DeviceAddress};
// use std::net::Ipv4Addr;
//
// #[tokio::main]
// async fn main() {
//     let address = DeviceAddress::from_ip(Ipv4Addr::new(192, 168, 1, 40));
//     let mut control = ControlInterface::open(address, SessionConfig::default()).await;
//     control.set_warm_white(80, true).await.unwrap();
// }
// ```
pub mod control_interface;

pub mod error;

// The `protocol` module encodes commands and decodes replies. It performs no
// I/O and covers the timer records and the preset pattern tables.
pub mod protocol;

// The `util` module provides device discovery and link health bookkeeping for
// hosts that poll.
pub mod util;

pub use error::{Error, Result};
