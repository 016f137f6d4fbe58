//! KNX addressing.
//!
//! - Individual addresses identify devices (`area.line.device`)
//! - Group addresses identify functions (`main/middle/sub` or `main/sub`)
//!
//! An L_Data frame carries a 16-bit destination whose meaning is selected by
//! the address-type bit of the second control byte; [`Destination`] keeps the
//! two interpretations apart.

pub mod group;
pub mod individual;

use core::fmt;

pub use group::GroupAddress;
pub use individual::IndividualAddress;

/// Destination of a telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Destination {
    Group(GroupAddress),
    Individual(IndividualAddress),
}

impl Destination {
    /// Build from the raw wire value and the address-type bit.
    pub const fn from_raw(raw: u16, is_group: bool) -> Self {
        if is_group {
            Self::Group(GroupAddress::from_raw(raw))
        } else {
            Self::Individual(IndividualAddress::from_raw(raw))
        }
    }

    pub const fn raw(self) -> u16 {
        match self {
            Self::Group(ga) => ga.raw(),
            Self::Individual(ia) => ia.raw(),
        }
    }

    pub const fn is_group(self) -> bool {
        matches!(self, Self::Group(_))
    }

    pub const fn group(self) -> Option<GroupAddress> {
        match self {
            Self::Group(ga) => Some(ga),
            Self::Individual(_) => None,
        }
    }
}

impl From<GroupAddress> for Destination {
    fn from(addr: GroupAddress) -> Self {
        Self::Group(addr)
    }
}

impl From<IndividualAddress> for Destination {
    fn from(addr: IndividualAddress) -> Self {
        Self::Individual(addr)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(ga) => ga.fmt(f),
            Self::Individual(ia) => ia.fmt(f),
        }
    }
}
