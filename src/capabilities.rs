// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability index: which device properties can be exposed as switches.
//!
//! The index is a read-only table keyed by device group, device class and
//! property code. Each entry is a [`Capability`]; only
//! [`Capability::Switch`] entries turn into switches. The table is built once
//! at startup, either with [`CapabilityIndexBuilder`], from JSON with
//! [`CapabilityIndex::from_json`], or from [`CapabilityIndex::builtin`].
//!
//! # Examples
//!
//! ```
//! use echonet_switch::capabilities::{CapabilityDescriptor, CapabilityIndex, CapabilityKey};
//! use echonet_switch::types::{PropertyCode, ValueMap};
//!
//! let index = CapabilityIndex::builder()
//!     .switch(
//!         CapabilityKey::new(0x02, 0x72, 0xe3),
//!         CapabilityDescriptor::new("Automatic bath water heating", "mdi:bathtub", ValueMap::SETTING)
//!             .with_prerequisite(PropertyCode::STATUS),
//!     )
//!     .build();
//!
//! let descriptor = index.switch(&CapabilityKey::new(0x02, 0x72, 0xe3)).unwrap();
//! assert_eq!(descriptor.prerequisite, Some(PropertyCode::STATUS));
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};
use crate::types::{ClassCode, GroupCode, PropertyCode, ValueMap};

/// Icon used for switches that have no specific capability entry.
pub const DEFAULT_POWER_ICON: &str = "mdi:power-settings";

/// Label used for the synthesized operation status switch.
pub const DEFAULT_POWER_LABEL: &str = "Operation status";

/// Switch metadata for one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Human readable property name.
    pub label: String,
    /// Icon shown by the host.
    pub icon: String,
    /// Protocol values for on and off.
    #[serde(default)]
    pub values: ValueMap,
    /// Property that must be on before this one can be turned on.
    #[serde(default)]
    pub prerequisite: Option<PropertyCode>,
}

impl CapabilityDescriptor {
    /// Creates a descriptor without a prerequisite.
    #[must_use]
    pub fn new(label: impl Into<String>, icon: impl Into<String>, values: ValueMap) -> Self {
        Self {
            label: label.into(),
            icon: icon.into(),
            values,
            prerequisite: None,
        }
    }

    /// Sets the prerequisite property.
    #[must_use]
    pub fn with_prerequisite(mut self, code: PropertyCode) -> Self {
        self.prerequisite = Some(code);
        self
    }

    /// Descriptor for an operation status property that has no entry of its
    /// own: generic power icon and values, no prerequisite.
    #[must_use]
    pub fn fallback_power() -> Self {
        Self::new(DEFAULT_POWER_LABEL, DEFAULT_POWER_ICON, ValueMap::POWER)
    }
}

/// What the index knows about one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Capability {
    /// The property can be exposed as an on/off switch.
    Switch(CapabilityDescriptor),
    /// The property is known but read-only from the switch platform's view.
    Sensor {
        /// Human readable property name.
        label: String,
    },
}

impl Capability {
    /// Returns the switch descriptor if this property is switch-capable.
    #[must_use]
    pub fn as_switch(&self) -> Option<&CapabilityDescriptor> {
        match self {
            Self::Switch(descriptor) => Some(descriptor),
            Self::Sensor { .. } => None,
        }
    }

    /// Returns the property label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Switch(descriptor) => &descriptor.label,
            Self::Sensor { label } => label,
        }
    }
}

/// Composite lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityKey {
    /// Device class group code.
    pub group: GroupCode,
    /// Device class code.
    pub class: ClassCode,
    /// Property code.
    pub code: PropertyCode,
}

impl CapabilityKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn new(group: u8, class: u8, code: u8) -> Self {
        Self {
            group: GroupCode::new(group),
            class: ClassCode::new(class),
            code: PropertyCode::new(code),
        }
    }

    /// Returns the same device class with a different property code.
    #[must_use]
    pub const fn with_code(self, code: PropertyCode) -> Self {
        Self { code, ..self }
    }
}

/// One row of a JSON capability table.
#[derive(Debug, Deserialize)]
struct IndexEntry {
    group: GroupCode,
    class: ClassCode,
    code: PropertyCode,
    capability: Capability,
}

/// Read-only capability table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityIndex {
    entries: HashMap<CapabilityKey, Capability>,
}

impl CapabilityIndex {
    /// Returns a builder for an index.
    #[must_use]
    pub fn builder() -> CapabilityIndexBuilder {
        CapabilityIndexBuilder::default()
    }

    /// Parses an index from a JSON array of entries.
    ///
    /// ```json
    /// [
    ///   { "group": "0x02", "class": "0x72", "code": "0xe3",
    ///     "capability": { "kind": "switch", "label": "Automatic bath water heating",
    ///                     "icon": "mdi:bathtub", "values": { "on": 65, "off": 66 },
    ///                     "prerequisite": "0x80" } }
    /// ]
    /// ```
    ///
    /// Later duplicates of a key replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) wrapping [`ParseError::Json`] if the
    /// document is malformed or a code is not a valid byte.
    pub fn from_json(json: &str) -> Result<Self> {
        let rows: Vec<IndexEntry> = serde_json::from_str(json).map_err(ParseError::from)?;
        let entries = rows
            .into_iter()
            .map(|row| {
                let key = CapabilityKey {
                    group: row.group,
                    class: row.class,
                    code: row.code,
                };
                (key, row.capability)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Built-in table covering common residential equipment.
    #[must_use]
    pub fn builtin() -> Self {
        Self::builder()
            // Home air conditioner
            .switch(
                CapabilityKey::new(0x01, 0x30, 0x80),
                CapabilityDescriptor::new(DEFAULT_POWER_LABEL, "mdi:air-conditioner", ValueMap::POWER),
            )
            .switch(
                CapabilityKey::new(0x01, 0x30, 0x8f),
                CapabilityDescriptor::new("Power-saving operation", "mdi:leaf", ValueMap::SETTING),
            )
            .sensor(CapabilityKey::new(0x01, 0x30, 0xbb), "Measured room temperature")
            // Electric water heater
            .switch(
                CapabilityKey::new(0x02, 0x6b, 0xe3),
                CapabilityDescriptor::new(
                    "Automatic bath water heating",
                    "mdi:bathtub",
                    ValueMap::SETTING,
                )
                .with_prerequisite(PropertyCode::STATUS),
            )
            .switch(
                CapabilityKey::new(0x02, 0x6b, 0xe9),
                CapabilityDescriptor::new("Bathroom priority", "mdi:shower", ValueMap::SETTING),
            )
            .sensor(CapabilityKey::new(0x02, 0x6b, 0xe1), "Measured remaining hot water")
            // Instantaneous water heater
            .switch(
                CapabilityKey::new(0x02, 0x72, 0xe3),
                CapabilityDescriptor::new(
                    "Automatic bath water heating",
                    "mdi:bathtub",
                    ValueMap::SETTING,
                )
                .with_prerequisite(PropertyCode::STATUS),
            )
            // General lighting
            .switch(
                CapabilityKey::new(0x02, 0x90, 0x80),
                CapabilityDescriptor::new(DEFAULT_POWER_LABEL, "mdi:lightbulb", ValueMap::POWER),
            )
            .build()
    }

    /// Looks up any capability for a key.
    #[must_use]
    pub fn get(&self, key: &CapabilityKey) -> Option<&Capability> {
        self.entries.get(key)
    }

    /// Looks up the switch descriptor for a key.
    ///
    /// Returns `None` both for unknown properties and for known properties
    /// that are not switch-capable.
    #[must_use]
    pub fn switch(&self, key: &CapabilityKey) -> Option<&CapabilityDescriptor> {
        self.get(key).and_then(Capability::as_switch)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for a [`CapabilityIndex`].
#[derive(Debug, Default)]
pub struct CapabilityIndexBuilder {
    entries: HashMap<CapabilityKey, Capability>,
}

impl CapabilityIndexBuilder {
    /// Adds a switch-capable property.
    #[must_use]
    pub fn switch(mut self, key: CapabilityKey, descriptor: CapabilityDescriptor) -> Self {
        self.entries.insert(key, Capability::Switch(descriptor));
        self
    }

    /// Adds a known property that is not switch-capable.
    #[must_use]
    pub fn sensor(mut self, key: CapabilityKey, label: impl Into<String>) -> Self {
        self.entries.insert(
            key,
            Capability::Sensor {
                label: label.into(),
            },
        );
        self
    }

    /// Builds the index.
    #[must_use]
    pub fn build(self) -> CapabilityIndex {
        CapabilityIndex {
            entries: self.entries,
        }
    }
}
