// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device connector: the per-device proxy between switches and the wire.
//!
//! A [`DeviceHandle`] owns the cached property values of one device object,
//! forwards property writes and polls to a [`Transport`], and broadcasts a
//! [`PropertyChange`] whenever the transport reports that the device changed
//! on its own. The handle is shared through an `Arc` by every switch of the
//! device.
//!
//! # Consistency
//!
//! The cache is not locked across commands. Two switches writing the same
//! property race, and whichever write completes last wins. Switches only
//! ever read their own property plus, when turning on, one prerequisite.
//!
//! # Transports
//!
//! The wire encoding is out of scope for this crate. Implement [`Transport`]
//! for your protocol stack, or use [`MemoryTransport`] to simulate a device.

mod device_handle;
mod memory;

pub use device_handle::{DeviceHandle, DeviceInfo, PropertyChange};
pub use memory::{MemoryTransport, WriteRecord};

use std::future::Future;

use crate::error::ProtocolError;
use crate::types::PropertyCode;

/// Wire side of a device connection.
///
/// Implementations handle encoding, retries and timeouts. The switch core
/// only cares whether a write was confirmed.
pub trait Transport: Send + Sync + 'static {
    /// Writes one property.
    ///
    /// # Errors
    ///
    /// Returns an error unless the device confirmed the write.
    fn set_property(
        &self,
        code: PropertyCode,
        value: u8,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Reads the current values of the given properties.
    ///
    /// Properties the device did not answer for are left out of the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the device could not be queried at all.
    fn get_properties(
        &self,
        codes: &[PropertyCode],
    ) -> impl Future<Output = Result<Vec<(PropertyCode, u8)>, ProtocolError>> + Send;
}
