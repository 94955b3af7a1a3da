// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-byte protocol identifiers.
//!
//! ECHONET Lite addresses a device object by a group code, a class code and an
//! instance number, and addresses one property of that object by a property
//! code (EPC). All of them are plain bytes on the wire; the newtypes here keep
//! them from being mixed up.
//!
//! In capability tables and configuration files the codes may be written
//! either as numbers or as hex strings:
//!
//! ```
//! use echonet_switch::types::PropertyCode;
//!
//! let a: PropertyCode = serde_json::from_str("128").unwrap();
//! let b: PropertyCode = serde_json::from_str("\"0x80\"").unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.to_string(), "0x80");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Serialized form accepted for any code byte.
#[derive(Deserialize)]
#[serde(untagged)]
enum ByteRepr {
    Number(u8),
    Text(String),
}

fn parse_byte(text: &str) -> Result<u8, ValueError> {
    let trimmed = text.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => trimmed.parse::<u8>(),
    };
    parsed.map_err(|_| ValueError::InvalidCode(text.to_string()))
}

macro_rules! byte_code {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "ByteRepr", into = "u8")]
        pub struct $name(u8);

        impl $name {
            /// Wraps a raw byte.
            #[must_use]
            pub const fn new(value: u8) -> Self {
                Self(value)
            }

            /// Returns the raw byte.
            #[must_use]
            pub const fn value(self) -> u8 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#04x})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#04x}", self.0)
            }
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u8 {
            fn from(code: $name) -> Self {
                code.0
            }
        }

        impl FromStr for $name {
            type Err = ValueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_byte(s).map(Self)
            }
        }

        impl TryFrom<ByteRepr> for $name {
            type Error = ValueError;

            fn try_from(repr: ByteRepr) -> Result<Self, Self::Error> {
                match repr {
                    ByteRepr::Number(value) => Ok(Self(value)),
                    ByteRepr::Text(text) => text.parse(),
                }
            }
        }
    };
}

byte_code! {
    /// Property code (EPC) of one property of a device object.
    PropertyCode
}

byte_code! {
    /// Class group code of a device object (for example `0x02` for housing
    /// and facility equipment).
    GroupCode
}

byte_code! {
    /// Class code of a device object within its group.
    ClassCode
}

impl PropertyCode {
    /// Operation status: the canonical primary power property.
    pub const STATUS: Self = Self(0x80);
}

/// Full address of a device object: group, class and instance number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Class group code.
    pub group: GroupCode,
    /// Class code.
    pub class: ClassCode,
    /// Instance number.
    pub instance: u8,
}

impl ObjectKey {
    /// Creates an object key from raw bytes.
    #[must_use]
    pub const fn new(group: u8, class: u8, instance: u8) -> Self {
        Self {
            group: GroupCode::new(group),
            class: ClassCode::new(class),
            instance,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{:#04x}", self.group, self.class, self.instance)
    }
}
