// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch entities.
//!
//! A [`SwitchController`] turns one discovered control point into an on/off
//! entity. It sequences commands (prerequisite first, then a settle delay,
//! then the target) and reconciles its observed state from polls and push
//! notifications.
//!
//! # Update modes
//!
//! Every switch starts out polled. As soon as a push notification actually
//! changes its state, the switch stops polling for good and relies on push
//! only. [`SwitchSnapshot::should_poll`] tells the host which mode is active.

mod controller;
mod state;

pub use controller::SwitchController;
pub use state::{CommandOutcome, SwitchSnapshot, SwitchState};
