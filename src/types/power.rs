// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On/off state and its protocol encoding.
//!
//! Each switchable property encodes "on" and "off" with its own pair of
//! bytes. The generic operation status pair is `0x30`/`0x31`, but many
//! setting properties use `0x41`/`0x42` instead, so the pair travels with the
//! capability descriptor rather than being hardcoded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Logical state of a switch.
///
/// # Examples
///
/// ```
/// use echonet_switch::types::PowerState;
///
/// assert_eq!(PowerState::from(true), PowerState::On);
/// assert_eq!("off".parse::<PowerState>().unwrap(), PowerState::Off);
/// assert_eq!(PowerState::On.as_str(), "ON");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    /// Switch is off.
    Off,
    /// Switch is on.
    On,
}

impl PowerState {
    /// Returns the display string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    /// Returns `true` for [`PowerState::On`].
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OFF" | "0" | "FALSE" => Ok(Self::Off),
            "ON" | "1" | "TRUE" => Ok(Self::On),
            _ => Err(ValueError::InvalidPowerState(s.to_string())),
        }
    }
}

impl From<bool> for PowerState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

/// Protocol bytes that mean "on" and "off" for one property.
///
/// # Examples
///
/// ```
/// use echonet_switch::types::{PowerState, ValueMap};
///
/// let map = ValueMap::POWER;
/// assert_eq!(map.value(PowerState::On), 0x30);
/// assert_eq!(map.state_of(0x31), Some(PowerState::Off));
/// assert_eq!(map.state_of(0x42), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueMap {
    /// Value written to turn the property on.
    pub on: u8,
    /// Value written to turn the property off.
    pub off: u8,
}

impl ValueMap {
    /// Operation status encoding.
    pub const POWER: Self = Self::new(0x30, 0x31);

    /// Encoding used by most "setting" properties (`0x41` on, `0x42` off).
    pub const SETTING: Self = Self::new(0x41, 0x42);

    /// Creates a value map.
    #[must_use]
    pub const fn new(on: u8, off: u8) -> Self {
        Self { on, off }
    }

    /// Returns the protocol value for a logical state.
    #[must_use]
    pub const fn value(&self, state: PowerState) -> u8 {
        match state {
            PowerState::On => self.on,
            PowerState::Off => self.off,
        }
    }

    /// Decodes a protocol value, if it is one of the pair.
    #[must_use]
    pub fn state_of(&self, value: u8) -> Option<PowerState> {
        if value == self.on {
            Some(PowerState::On)
        } else if value == self.off {
            Some(PowerState::Off)
        } else {
            None
        }
    }

    /// Returns whether a cached value reads as on. Missing values read as off.
    #[must_use]
    pub fn is_on(&self, cached: Option<u8>) -> bool {
        cached == Some(self.on)
    }
}

impl Default for ValueMap {
    fn default() -> Self {
        Self::POWER
    }
}
