#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![cfg_attr(
    not(feature = "std"),
    allow(dead_code, reason = "connection and config errors are raised by the std tunnel only")
)]

//! # knx-tunnel
//!
//! KNXnet/IP tunneling client with bit-exact frame codecs.
//!
//! The codec layer (addresses, datapoint types, TPDU, cEMI and KNXnet/IP
//! frames) is `no_std` and allocation free. With the default `std` feature
//! the crate adds a tunnel connection that talks to a gateway over UDP from
//! a background worker thread.
//!
//! ## Features
//!
//! - Group and individual addressing with compile-time checked macros
//! - Datapoint types 1, 2, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13 and 14
//! - KNXnet/IP core and tunneling services (connect, heartbeat, disconnect)
//! - Acknowledged sends with sequence tracking and heartbeat supervision
//! - `log` based logging, or `defmt` on embedded targets
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_tunnel::dpt::DatapointValue;
//! use knx_tunnel::{ga, register_datapoints, Telegram, TunnelConfig, TunnelConnection};
//!
//! let mut config = TunnelConfig::default().with_name("office");
//! register_datapoints! { config, 1/2/10 => Float16 };
//!
//! let tunnel = TunnelConnection::new(config);
//! tunnel.connect("192.168.1.10:3671".parse()?)?;
//! tunnel.send(&Telegram::group_write(ga!(1/1/1), &DatapointValue::Bool(true))?)?;
//!
//! if let Some(telegram) = tunnel.receive(true) {
//!     println!("{}: {:?}", telegram.destination, telegram.value);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Macro modules (must be declared before use)
#[macro_use]
pub mod macros;
#[macro_use]
pub mod logging;

pub mod addressing;
#[cfg(feature = "std")]
pub mod config;
pub mod dpt;
pub mod error;
#[cfg(feature = "std")]
pub mod net;
pub mod protocol;
#[cfg(feature = "std")]
pub mod queue;

// Re-export commonly used types
#[doc(inline)]
pub use addressing::{Destination, GroupAddress, IndividualAddress};
#[doc(inline)]
pub use dpt::{DatapointType, DatapointValue};
#[doc(inline)]
pub use error::{KnxError, Result};
#[doc(inline)]
pub use protocol::{Frame, Telegram};

#[cfg(feature = "std")]
#[doc(inline)]
pub use config::TunnelConfig;
#[cfg(feature = "std")]
#[doc(inline)]
pub use protocol::tunnel::{TunnelConnection, TunnelFailure, TunnelState};

#[doc(hidden)]
pub use log as __log;
