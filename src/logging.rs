//! Unified logging macro.
//!
//! `knx_log!` forwards to the `log` facade on hosted builds. A `no_std` build
//! with the `defmt` feature routes through `defmt` instead. The crate never
//! installs a logger; binaries and tests pick their own sink (for instance
//! `env_logger`).
//!
//! ```rust
//! use knx_tunnel::knx_log;
//!
//! knx_log!(info, "tunnel {} connected", "gw-1");
//! knx_log!(debug, "dropping {} bytes", 12);
//! ```

/// Log through `log::` or `defmt::` depending on the active features.
#[macro_export]
#[cfg(any(feature = "std", not(feature = "defmt")))]
macro_rules! knx_log {
    (info, $($arg:tt)*) => { $crate::__log::info!($($arg)*) };
    (debug, $($arg:tt)*) => { $crate::__log::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { $crate::__log::warn!($($arg)*) };
    (error, $($arg:tt)*) => { $crate::__log::error!($($arg)*) };
    (trace, $($arg:tt)*) => { $crate::__log::trace!($($arg)*) };
}

#[macro_export]
#[cfg(all(not(feature = "std"), feature = "defmt"))]
macro_rules! knx_log {
    (info, $($arg:tt)*) => { ::defmt::info!($($arg)*) };
    (debug, $($arg:tt)*) => { ::defmt::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { ::defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { ::defmt::error!($($arg)*) };
    (trace, $($arg:tt)*) => { ::defmt::trace!($($arg)*) };
}
