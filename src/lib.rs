// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `echonet_switch` - Switch control points for ECHONET Lite devices.
//!
//! This library turns the on/off-capable properties of ECHONET Lite devices
//! into switch entities for a home automation host. It sits on top of a
//! device connector that already caches property values and relays push
//! notifications.
//!
//! # Supported Features
//!
//! - **Discovery**: Pick switch-capable properties from a capability index,
//!   with a default power switch for devices the index does not cover
//! - **Command sequencing**: Turn on a prerequisite property first and wait
//!   for the device to settle before writing the target
//! - **State reconciliation**: Poll until the device proves it pushes
//!   changes, then rely on push only
//! - **Events**: Every state change is published on a broadcast bus
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use echonet_switch::{
//!     CapabilityIndex, DeviceHandle, DeviceInfo, MemoryTransport, ObjectKey, PlatformConfig,
//!     PropertyCode, SwitchEvent, SwitchPlatform,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> echonet_switch::Result<()> {
//! let config = PlatformConfig::default().with_settle_delay(Duration::from_millis(10));
//! let platform = SwitchPlatform::new(CapabilityIndex::builtin(), config);
//! let mut events = platform.subscribe();
//!
//! // An instantaneous water heater with automatic bath heating
//! let bath = PropertyCode::new(0xe3);
//! let device = DeviceHandle::new(
//!     DeviceInfo::new("fe00-72", ObjectKey::new(0x02, 0x72, 0x01), "Water heater"),
//!     MemoryTransport::new(),
//! )
//! .with_properties([PropertyCode::STATUS, bath])
//! .with_set_map([PropertyCode::STATUS, bath])
//! .with_cached_value(PropertyCode::STATUS, 0x31);
//!
//! platform.add_device(Arc::new(device)).await?;
//!
//! // Turns on the heater itself first, then bath heating
//! platform.turn_on("fe00-72-227").await?;
//!
//! while let Ok(event) = events.try_recv() {
//!     if let SwitchEvent::StateChanged { unique_id, is_on, .. } = event {
//!         println!("{unique_id} is now {}", if is_on { "on" } else { "off" });
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod connector;
pub mod discovery;
pub mod error;
pub mod event;
pub mod platform;
pub mod switch;
pub mod types;

pub use capabilities::{Capability, CapabilityDescriptor, CapabilityIndex, CapabilityKey};
pub use config::PlatformConfig;
pub use connector::{DeviceHandle, DeviceInfo, MemoryTransport, PropertyChange, Transport};
pub use discovery::{ControlPoint, Prerequisite, discover};
pub use error::{Error, ParseError, ProtocolError, Result, ValueError};
pub use event::{EventBus, SwitchEvent};
pub use platform::SwitchPlatform;
pub use switch::{CommandOutcome, SwitchController, SwitchSnapshot, SwitchState};
pub use types::{ClassCode, GroupCode, ObjectKey, PowerState, PropertyCode, ValueMap};
