// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events published to the host.
//!
//! Switches report every state change on an [`EventBus`], a tokio broadcast
//! channel that the host listens to in order to republish state to its UI.
//!
//! # Examples
//!
//! ```
//! use echonet_switch::event::{EventBus, SwitchEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(SwitchEvent::state_changed("fe00-128", true, false));
//! assert!(rx.try_recv().unwrap().is_state_change());
//! ```

mod event_bus;
mod switch_event;

pub(crate) use event_bus::DEFAULT_CHANNEL_CAPACITY;
pub use event_bus::EventBus;
pub use switch_event::SwitchEvent;
