//! DPT 3.xxx - 3-bit controlled (dimming and blinds)
//!
//! ```text
//! ┌─────────┬─────────────┐
//! │ Control │  Stepcode   │
//! │  (1b)   │    (3b)     │
//! └─────────┴─────────────┘
//!    Bit 3     Bits 0-2
//! ```
//!
//! Stepcode 0 stops the running movement; 1-7 select 1, 2, 4 ... 64
//! intervals. The control bit means increase (dimming) or down (blinds).

/// Number of intervals for a stepped command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum StepCode {
    Break = 0,
    Intervals1 = 1,
    Intervals2 = 2,
    Intervals4 = 3,
    Intervals8 = 4,
    Intervals16 = 5,
    Intervals32 = 6,
    Intervals64 = 7,
}

impl StepCode {
    /// Low three bits of `raw`; every value is a valid stepcode.
    pub const fn from_bits(raw: u8) -> Self {
        match raw & 0x07 {
            0 => Self::Break,
            1 => Self::Intervals1,
            2 => Self::Intervals2,
            3 => Self::Intervals4,
            4 => Self::Intervals8,
            5 => Self::Intervals16,
            6 => Self::Intervals32,
            _ => Self::Intervals64,
        }
    }

    /// Interval count, `None` for `Break`.
    pub const fn intervals(self) -> Option<u8> {
        match self {
            Self::Break => None,
            step => Some(1 << (step as u8 - 1)),
        }
    }
}

/// Direction plus step size of a DPT 3 command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlCommand {
    /// false = decrease/up, true = increase/down
    pub control: bool,
    pub step: StepCode,
}

impl ControlCommand {
    pub const fn new(control: bool, step: StepCode) -> Self {
        Self { control, step }
    }

    /// Stop command (stepcode 0).
    pub const fn stop() -> Self {
        Self::new(false, StepCode::Break)
    }

    pub const fn to_nibble(self) -> u8 {
        ((self.control as u8) << 3) | self.step as u8
    }

    /// Read bits 3-0; higher bits are ignored.
    pub const fn from_nibble(raw: u8) -> Self {
        Self {
            control: raw & 0x08 != 0,
            step: StepCode::from_bits(raw),
        }
    }
}
