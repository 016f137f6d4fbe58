//! Tunnel connection settings.
//!
//! Values start from sensible defaults and can be changed with the `with_*`
//! builders or from a block of `KEY=VALUE` lines:
//!
//! ```rust
//! use std::time::Duration;
//! use knx_tunnel::dpt::DatapointType;
//! use knx_tunnel::{ga, TunnelConfig};
//!
//! let mut config = TunnelConfig::default().with_name("living-room");
//! config.apply_overrides(
//!     r#"
//!     ## faster heartbeat on a flaky link
//!     HEARTBEAT_INTERVAL_MS=10000
//!     ACK_TIMEOUT_MS=500
//!     DATAPOINT 1/2/3=9.001
//!     "#,
//! )?;
//! assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
//! assert_eq!(config.datapoint_type(ga!(1/2/3)), Some(DatapointType::Float16));
//! # Ok::<(), knx_tunnel::KnxError>(())
//! ```

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::dpt::DatapointType;
use crate::error::{KnxError, Result};

/// Prefix of override keys that register a group's datapoint type.
const DATAPOINT_PREFIX: &str = "DATAPOINT ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Label attached to every log line of the connection
    pub name: String,
    pub local_bind: SocketAddrV4,
    pub connect_timeout: Duration,
    pub ack_timeout: Duration,
    /// Idle time between acknowledged heartbeats
    pub heartbeat_interval: Duration,
    /// Wait for a heartbeat response before retrying
    pub heartbeat_timeout: Duration,
    /// Unanswered heartbeats before the tunnel is declared dead
    pub heartbeat_retries: u32,
    /// Upper bound of one socket wait in the worker
    pub poll_interval: Duration,
    pub disconnect_timeout: Duration,
    /// Source of outgoing telegrams; `0.0.0` lets the gateway substitute
    pub source_address: IndividualAddress,
    datapoints: HashMap<GroupAddress, DatapointType>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            name: String::from("knx-tunnel"),
            local_bind: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            heartbeat_retries: 3,
            poll_interval: Duration::from_millis(100),
            disconnect_timeout: Duration::from_secs(1),
            source_address: IndividualAddress::UNSPECIFIED,
            datapoints: HashMap::new(),
        }
    }
}

impl TunnelConfig {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_local_bind(mut self, local_bind: SocketAddrV4) -> Self {
        self.local_bind = local_bind;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration, retries: u32) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_timeout = timeout;
        self.heartbeat_retries = retries;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_source_address(mut self, address: IndividualAddress) -> Self {
        self.source_address = address;
        self
    }

    /// Decode telegrams for `group` as `ty`. Replaces an earlier entry.
    pub fn register_datapoint(&mut self, group: GroupAddress, ty: DatapointType) {
        self.datapoints.insert(group, ty);
    }

    pub fn datapoint_type(&self, group: GroupAddress) -> Option<DatapointType> {
        self.datapoints.get(&group).copied()
    }

    pub fn datapoint_types(&self) -> &HashMap<GroupAddress, DatapointType> {
        &self.datapoints
    }

    /// Apply `KEY=VALUE` lines on top of the current values.
    ///
    /// Blank lines and lines starting with `#` are skipped, unknown keys are
    /// logged and ignored. Durations are in milliseconds.
    ///
    /// | Key | Field |
    /// |---|---|
    /// | `TUNNEL_NAME` | `name` |
    /// | `LOCAL_BIND` | `local_bind` (`a.b.c.d:port`) |
    /// | `SOURCE_ADDRESS` | `source_address` (`area.line.device`) |
    /// | `CONNECT_TIMEOUT_MS` | `connect_timeout` |
    /// | `ACK_TIMEOUT_MS` | `ack_timeout` |
    /// | `HEARTBEAT_INTERVAL_MS` | `heartbeat_interval` |
    /// | `HEARTBEAT_TIMEOUT_MS` | `heartbeat_timeout` |
    /// | `HEARTBEAT_RETRIES` | `heartbeat_retries` |
    /// | `POLL_INTERVAL_MS` | `poll_interval` |
    /// | `DISCONNECT_TIMEOUT_MS` | `disconnect_timeout` |
    /// | `DATAPOINT <group>` | datapoint registry (`9.001`, `Float16`, ...) |
    ///
    /// # Errors
    ///
    /// A `Config` error naming the first bad line. Lines before it are
    /// already applied.
    pub fn apply_overrides(&mut self, overrides: &str) -> Result<()> {
        for (index, line) in overrides.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| KnxError::config_missing_separator(line_no))?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "TUNNEL_NAME" => self.name = value.to_owned(),
                "LOCAL_BIND" => self.local_bind = parse(value, line_no)?,
                "SOURCE_ADDRESS" => self.source_address = parse(value, line_no)?,
                "CONNECT_TIMEOUT_MS" => self.connect_timeout = millis(value, line_no)?,
                "ACK_TIMEOUT_MS" => self.ack_timeout = millis(value, line_no)?,
                "HEARTBEAT_INTERVAL_MS" => self.heartbeat_interval = millis(value, line_no)?,
                "HEARTBEAT_TIMEOUT_MS" => self.heartbeat_timeout = millis(value, line_no)?,
                "HEARTBEAT_RETRIES" => self.heartbeat_retries = parse(value, line_no)?,
                "POLL_INTERVAL_MS" => self.poll_interval = millis(value, line_no)?,
                "DISCONNECT_TIMEOUT_MS" => self.disconnect_timeout = millis(value, line_no)?,
                _ => match key.strip_prefix(DATAPOINT_PREFIX) {
                    Some(group) => {
                        let group = parse(group.trim(), line_no)?;
                        self.register_datapoint(group, parse(value, line_no)?);
                    }
                    None => knx_log!(debug, "[{}] ignoring unknown key {}", self.name, key),
                },
            }
        }
        Ok(())
    }
}

fn parse<T: FromStr>(value: &str, line: usize) -> Result<T> {
    value
        .parse()
        .map_err(|_| KnxError::config_invalid_value(line))
}

fn millis(value: &str, line: usize) -> Result<Duration> {
    parse(value, line).map(Duration::from_millis)
}
