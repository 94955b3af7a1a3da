// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host adapter for switches across many devices.
//!
//! [`SwitchPlatform`] is the entry point for an application that manages a
//! fleet of devices:
//!
//! - **Registration**: adding a device runs discovery and creates one
//!   controller per switch-capable property
//! - **Commands**: turn switches on or off by unique ID
//! - **Reconciliation**: push listeners are started per switch, and polled
//!   switches can be refreshed on an interval
//! - **Events**: every registration and state change is published on one bus
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use echonet_switch::capabilities::CapabilityIndex;
//! use echonet_switch::config::PlatformConfig;
//! use echonet_switch::connector::{DeviceHandle, DeviceInfo, MemoryTransport};
//! use echonet_switch::platform::SwitchPlatform;
//! use echonet_switch::types::{ObjectKey, PropertyCode};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> echonet_switch::Result<()> {
//! let platform = SwitchPlatform::new(CapabilityIndex::builtin(), PlatformConfig::default());
//!
//! let device = DeviceHandle::new(
//!     DeviceInfo::new("fe00-90", ObjectKey::new(0x02, 0x90, 0x01), "Porch light"),
//!     MemoryTransport::new(),
//! )
//! .with_properties([PropertyCode::STATUS])
//! .with_set_map([PropertyCode::STATUS]);
//!
//! let ids = platform.add_device(Arc::new(device)).await?;
//! assert_eq!(ids, vec!["fe00-90-128".to_string()]);
//!
//! platform.turn_on(&ids[0]).await?;
//! assert!(platform.state(&ids[0]).await?.is_on);
//! # Ok(())
//! # }
//! ```

mod switch_platform;

pub use switch_platform::SwitchPlatform;
