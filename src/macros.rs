//! Address and datapoint registration macros.

/// Creates a [`GroupAddress`](crate::addressing::GroupAddress) from 3-level
/// notation, validated at compile time.
///
/// ```rust
/// use knx_tunnel::ga;
///
/// let light = ga!(1/1/1);
/// assert_eq!(light.raw(), 0x0901);
/// ```
///
/// ```compile_fail
/// // main group > 31
/// let addr = knx_tunnel::ga!(32/0/0);
/// ```
///
/// ```compile_fail
/// // middle group > 7
/// let addr = knx_tunnel::ga!(1/8/0);
/// ```
#[macro_export]
macro_rules! ga {
    ($main:literal / $middle:literal / $sub:literal) => {{
        const ADDR: $crate::addressing::GroupAddress =
            match $crate::addressing::GroupAddress::from_parts($main, $middle, $sub) {
                Some(addr) => addr,
                None => panic!("group address out of range (main 0-31, middle 0-7)"),
            };
        ADDR
    }};
}

/// Creates an [`IndividualAddress`](crate::addressing::IndividualAddress)
/// from `area.line.device` components, validated at compile time.
///
/// Components are comma separated because `1.1.5` does not tokenize as three
/// literals.
///
/// ```rust
/// use knx_tunnel::ia;
///
/// let gateway = ia!(1, 1, 250);
/// assert_eq!(gateway.to_string(), "1.1.250");
/// ```
///
/// ```compile_fail
/// let addr = knx_tunnel::ia!(16, 0, 1);
/// ```
#[macro_export]
macro_rules! ia {
    ($area:literal, $line:literal, $device:literal) => {{
        const ADDR: $crate::addressing::IndividualAddress =
            match $crate::addressing::IndividualAddress::from_parts($area, $line, $device) {
                Some(addr) => addr,
                None => panic!("individual address out of range (area 0-15, line 0-15)"),
            };
        ADDR
    }};
}

/// Registers datapoint types for several group addresses on a
/// [`TunnelConfig`](crate::config::TunnelConfig).
///
/// Telegrams addressed to a registered group carry a decoded value.
///
/// ```rust
/// use knx_tunnel::{register_datapoints, TunnelConfig};
///
/// let mut config = TunnelConfig::default();
/// register_datapoints! {
///     config,
///     1/1/1 => Bool,
///     1/2/10 => Float16,
///     3/0/1 => TimeOfDay,
/// };
/// assert_eq!(config.datapoint_types().len(), 3);
/// ```
#[macro_export]
macro_rules! register_datapoints {
    ($config:expr, $($main:literal / $middle:literal / $sub:literal => $ty:ident),+ $(,)?) => {{
        $(
            $config.register_datapoint($crate::ga!($main / $middle / $sub), $crate::dpt::DatapointType::$ty);
        )+
    }};
}
