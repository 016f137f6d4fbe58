//! KNXnet/IP protocol implementation.
//!
//! The codec modules are `no_std` and allocation free: every structure
//! reports its `encoded_len`, encodes into a caller buffer and decodes from
//! a borrowed slice.
//!
//! ```text
//! frame      header + service body (the UDP datagram)
//! services   connect / connection-state / disconnect / tunnel bodies
//! cemi       cEMI L_Data messages carried by tunnel requests
//! tpdu       transport layer PDU with APCI and payload
//! telegram   high-level group telegram with a decoded value
//! tunnel     connection state machine and worker (std)
//! ```

pub mod cemi;
pub mod constants;
pub mod frame;
pub mod services;
pub mod telegram;
pub mod tpdu;
#[cfg(feature = "std")]
pub mod tunnel;

pub use cemi::{CemiFrame, LData};
pub use constants::{CemiMessageCode, Priority, ServiceType};
pub use frame::{Frame, FrameBytes, Hpai, KnxnetIpHeader};
pub use telegram::Telegram;
pub use tpdu::{Apci, Tpdu};
#[cfg(feature = "std")]
pub use tunnel::{TunnelConnection, TunnelFailure, TunnelState, TunnelStats};
