// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch event types.

/// Events emitted by switches and the switch platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchEvent {
    /// A switch was registered with the platform.
    SwitchAdded {
        /// Unique ID of the switch.
        unique_id: String,
    },

    /// A switch was removed together with its device.
    SwitchRemoved {
        /// Unique ID of the switch.
        unique_id: String,
    },

    /// The observed on/off state of a switch changed.
    StateChanged {
        /// Unique ID of the switch.
        unique_id: String,
        /// New observed state.
        is_on: bool,
        /// `true` when the change arrived as a push notification. From then
        /// on the switch relies on push only and the host should stop
        /// polling it.
        push_driven: bool,
    },
}

impl SwitchEvent {
    /// Returns the unique ID of the switch the event is about.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        match self {
            Self::SwitchAdded { unique_id }
            | Self::SwitchRemoved { unique_id }
            | Self::StateChanged { unique_id, .. } => unique_id,
        }
    }

    /// Returns `true` if this is a registration event (added/removed).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::SwitchAdded { .. } | Self::SwitchRemoved { .. })
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Creates a switch added event.
    #[must_use]
    pub fn switch_added(unique_id: impl Into<String>) -> Self {
        Self::SwitchAdded {
            unique_id: unique_id.into(),
        }
    }

    /// Creates a switch removed event.
    #[must_use]
    pub fn switch_removed(unique_id: impl Into<String>) -> Self {
        Self::SwitchRemoved {
            unique_id: unique_id.into(),
        }
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(unique_id: impl Into<String>, is_on: bool, push_driven: bool) -> Self {
        Self::StateChanged {
            unique_id: unique_id.into(),
            is_on,
            push_driven,
        }
    }
}
