// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch state and the values reported to the host.

/// Observed state of one switch plus its update mode.
///
/// A switch starts out polled. The first push notification that actually
/// changes the observed state moves it to push-only for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchState {
    observed_on: bool,
    polling_enabled: bool,
}

impl SwitchState {
    /// Creates a polled state.
    #[must_use]
    pub fn new(observed_on: bool) -> Self {
        Self {
            observed_on,
            polling_enabled: true,
        }
    }

    /// Last observed on/off state.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.observed_on
    }

    /// Whether the host should keep polling this switch.
    #[must_use]
    pub fn polling_enabled(&self) -> bool {
        self.polling_enabled
    }

    /// Records a state read from a poll or a confirmed command.
    ///
    /// Returns `true` if the observed state changed.
    pub(crate) fn observe(&mut self, is_on: bool) -> bool {
        let changed = self.observed_on != is_on;
        self.observed_on = is_on;
        changed
    }

    /// Records a state read after a push notification.
    ///
    /// A real change switches off polling permanently. Returns `true` if the
    /// observed state changed.
    pub(crate) fn observe_push(&mut self, is_on: bool) -> bool {
        if self.observed_on == is_on {
            return false;
        }
        self.observed_on = is_on;
        self.polling_enabled = false;
        true
    }
}

/// Point-in-time view of a switch, as read by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchSnapshot {
    /// Unique ID of the switch.
    pub unique_id: String,
    /// Display name.
    pub name: String,
    /// Icon.
    pub icon: String,
    /// Observed on/off state.
    pub is_on: bool,
    /// Whether the host should keep polling.
    pub should_poll: bool,
}

/// Result of a turn-on or turn-off command.
///
/// A failed command never changes the switch state and is not an error;
/// the next poll or push corrects whatever drifted. The outcome is only
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The device confirmed the write and the state was updated.
    Applied,
    /// The device did not confirm the write.
    Rejected,
    /// The prerequisite property could not be turned on, so the target was
    /// never written.
    PrerequisiteFailed,
}

impl CommandOutcome {
    /// Returns `true` for [`CommandOutcome::Applied`].
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}
