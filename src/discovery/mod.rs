// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch discovery.
//!
//! Decides which properties of a device become switches by cross-referencing
//! the device's known property codes with the [`CapabilityIndex`].
//!
//! # Operation status fallback
//!
//! Every controllable device should get at least a primary power switch. When
//! the index has no switch entry for the operation status property (`0x80`)
//! of a device class, but the device accepts writes to it, discovery
//! synthesizes one with [`CapabilityDescriptor::fallback_power`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use echonet_switch::capabilities::CapabilityIndex;
//! use echonet_switch::connector::{DeviceHandle, DeviceInfo, MemoryTransport};
//! use echonet_switch::discovery::discover;
//! use echonet_switch::types::{ObjectKey, PropertyCode};
//!
//! // A storage battery: no entries in the built-in table
//! let device = Arc::new(
//!     DeviceHandle::new(
//!         DeviceInfo::new("fe00-7d", ObjectKey::new(0x02, 0x7d, 0x01), "Battery"),
//!         MemoryTransport::new(),
//!     )
//!     .with_properties([PropertyCode::STATUS, PropertyCode::new(0xe4)])
//!     .with_set_map([PropertyCode::STATUS]),
//! );
//!
//! let points = discover(&device, &CapabilityIndex::builtin());
//! assert_eq!(points.len(), 1);
//! assert!(points[0].is_fallback());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::capabilities::{CapabilityDescriptor, CapabilityIndex, CapabilityKey};
use crate::connector::{DeviceHandle, Transport};
use crate::types::{PropertyCode, ValueMap};

/// A property that must be on before a dependent switch can turn on.
///
/// Resolved at discovery time: the prerequisite's own value map is taken from
/// the index when it is a switch there, otherwise the generic power pair is
/// assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prerequisite {
    /// Property code of the prerequisite.
    pub code: PropertyCode,
    /// Its on/off encoding.
    pub values: ValueMap,
}

/// One device property modeled as an on/off switch.
///
/// Immutable once discovered.
pub struct ControlPoint<T> {
    code: PropertyCode,
    descriptor: CapabilityDescriptor,
    prerequisite: Option<Prerequisite>,
    fallback: bool,
    device: Arc<DeviceHandle<T>>,
}

impl<T: Transport> ControlPoint<T> {
    /// Creates a control point, resolving the descriptor's prerequisite
    /// against `index`.
    #[must_use]
    pub fn new(
        device: Arc<DeviceHandle<T>>,
        code: PropertyCode,
        descriptor: CapabilityDescriptor,
        index: &CapabilityIndex,
    ) -> Self {
        let key = capability_key(&device, code);
        let prerequisite = descriptor.prerequisite.map(|pre_code| Prerequisite {
            code: pre_code,
            values: index
                .switch(&key.with_code(pre_code))
                .map_or(ValueMap::POWER, |pre| pre.values),
        });

        Self {
            code,
            descriptor,
            prerequisite,
            fallback: false,
            device,
        }
    }

    /// Creates the synthesized operation status switch.
    #[must_use]
    pub fn fallback_status(device: Arc<DeviceHandle<T>>) -> Self {
        Self {
            code: PropertyCode::STATUS,
            descriptor: CapabilityDescriptor::fallback_power(),
            prerequisite: None,
            fallback: true,
            device,
        }
    }

    /// Property code of this switch.
    #[must_use]
    pub fn code(&self) -> PropertyCode {
        self.code
    }

    /// Capability descriptor of this switch.
    #[must_use]
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    /// Resolved prerequisite, if any.
    #[must_use]
    pub fn prerequisite(&self) -> Option<Prerequisite> {
        self.prerequisite
    }

    /// Returns `true` for the synthesized operation status switch.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// The device this switch belongs to.
    #[must_use]
    pub fn device(&self) -> &Arc<DeviceHandle<T>> {
        &self.device
    }

    /// Unique ID of this switch: device UID and the property code in
    /// decimal, e.g. `fe00-72-128` for operation status.
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{}-{}", self.device.info().uid, self.code.value())
    }
}

impl<T> Clone for ControlPoint<T> {
    fn clone(&self) -> Self {
        Self {
            code: self.code,
            descriptor: self.descriptor.clone(),
            prerequisite: self.prerequisite,
            fallback: self.fallback,
            device: Arc::clone(&self.device),
        }
    }
}

impl<T> fmt::Debug for ControlPoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPoint")
            .field("code", &self.code)
            .field("descriptor", &self.descriptor)
            .field("prerequisite", &self.prerequisite)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

fn capability_key<T: Transport>(device: &DeviceHandle<T>, code: PropertyCode) -> CapabilityKey {
    let object = device.info().object;
    CapabilityKey {
        group: object.group,
        class: object.class,
        code,
    }
}

/// Builds the switches of one device.
///
/// Properties without a switch entry in `index` are skipped silently. Each
/// property code appears at most once in the result. The order of the result
/// is unspecified.
#[must_use]
pub fn discover<T: Transport>(
    device: &Arc<DeviceHandle<T>>,
    index: &CapabilityIndex,
) -> Vec<ControlPoint<T>> {
    let mut seen = HashSet::new();
    let mut points = Vec::new();

    for &code in device.properties() {
        let Some(descriptor) = index.switch(&capability_key(device, code)) else {
            continue;
        };
        if !seen.insert(code) {
            continue;
        }
        points.push(ControlPoint::new(
            Arc::clone(device),
            code,
            descriptor.clone(),
            index,
        ));
    }

    if !seen.contains(&PropertyCode::STATUS) && device.is_settable(PropertyCode::STATUS) {
        tracing::debug!(
            uid = %device.info().uid,
            object = %device.info().object,
            "No capability entry for operation status, adding default power switch"
        );
        points.push(ControlPoint::fallback_status(Arc::clone(device)));
    }

    tracing::debug!(uid = %device.info().uid, count = points.len(), "Discovered switches");
    points
}
