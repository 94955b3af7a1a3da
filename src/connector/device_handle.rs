// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared device proxy with a property cache and change notifications.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::ProtocolError;
use crate::types::{ObjectKey, PropertyCode};

use super::Transport;

/// Capacity of the per-device change channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Static identity of a device object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Unique ID of the physical device (usually derived from its
    /// identification number).
    pub uid: String,
    /// Group, class and instance of the device object.
    pub object: ObjectKey,
    /// Title shown to the user; switch names are prefixed with it.
    pub title: String,
    /// Manufacturer name, when the device reported one.
    pub manufacturer: Option<String>,
}

impl DeviceInfo {
    /// Creates device info without a manufacturer.
    #[must_use]
    pub fn new(uid: impl Into<String>, object: ObjectKey, title: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            object,
            title: title.into(),
            manufacturer: None,
        }
    }

    /// Sets the manufacturer.
    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }
}

/// Notification that the device reported new property values.
///
/// Listeners must not assume the listed properties are the only ones that
/// changed, nor that any value actually differs from before: delivery is
/// at-least-once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    /// Properties included in the report.
    pub codes: Vec<PropertyCode>,
}

/// Per-device proxy shared by all switches of the device.
///
/// # Examples
///
/// ```
/// use echonet_switch::connector::{DeviceHandle, DeviceInfo, MemoryTransport};
/// use echonet_switch::types::{ObjectKey, PropertyCode};
///
/// let handle = DeviceHandle::new(
///     DeviceInfo::new("fe00-01", ObjectKey::new(0x02, 0x90, 0x01), "Hall light"),
///     MemoryTransport::new(),
/// )
/// .with_properties([PropertyCode::STATUS])
/// .with_set_map([PropertyCode::STATUS])
/// .with_cached_value(PropertyCode::STATUS, 0x31);
///
/// assert_eq!(handle.cached_value(PropertyCode::STATUS), Some(0x31));
/// assert!(handle.is_settable(PropertyCode::STATUS));
/// ```
pub struct DeviceHandle<T> {
    info: DeviceInfo,
    transport: T,
    properties: Vec<PropertyCode>,
    set_map: HashSet<PropertyCode>,
    cache: RwLock<HashMap<PropertyCode, u8>>,
    changes: broadcast::Sender<PropertyChange>,
}

impl<T: Transport> DeviceHandle<T> {
    /// Creates a handle with no known properties and an empty cache.
    #[must_use]
    pub fn new(info: DeviceInfo, transport: T) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            info,
            transport,
            properties: Vec::new(),
            set_map: HashSet::new(),
            cache: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Sets the property codes the device is known to support.
    ///
    /// These are the codes refreshed on every poll and considered during
    /// switch discovery.
    #[must_use]
    pub fn with_properties(mut self, codes: impl IntoIterator<Item = PropertyCode>) -> Self {
        self.properties = codes.into_iter().collect();
        self
    }

    /// Sets the property codes the device accepts writes for.
    #[must_use]
    pub fn with_set_map(mut self, codes: impl IntoIterator<Item = PropertyCode>) -> Self {
        self.set_map = codes.into_iter().collect();
        self
    }

    /// Seeds one cached value.
    #[must_use]
    pub fn with_cached_value(self, code: PropertyCode, value: u8) -> Self {
        self.cache.write().insert(code, value);
        self
    }

    /// Returns the device identity.
    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the known property codes.
    #[must_use]
    pub fn properties(&self) -> &[PropertyCode] {
        &self.properties
    }

    /// Returns whether the device accepts writes for `code`.
    #[must_use]
    pub fn is_settable(&self, code: PropertyCode) -> bool {
        self.set_map.contains(&code)
    }

    /// Returns the last known value of a property.
    #[must_use]
    pub fn cached_value(&self, code: PropertyCode) -> Option<u8> {
        self.cache.read().get(&code).copied()
    }

    /// Overwrites a cached value without notifying listeners.
    ///
    /// Used after a confirmed write, where the writer already knows the
    /// outcome.
    pub fn set_cached(&self, code: PropertyCode, value: u8) {
        self.cache.write().insert(code, value);
    }

    /// Writes a property through the transport.
    ///
    /// The cache is left untouched; callers update it once the write is
    /// confirmed.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the write was not confirmed.
    pub async fn write_property(&self, code: PropertyCode, value: u8) -> Result<(), ProtocolError> {
        tracing::debug!(uid = %self.info.uid, code = %code, value, "Writing property");
        self.transport.set_property(code, value).await
    }

    /// Polls all known properties and updates the cache in place.
    ///
    /// Polling does not notify change listeners.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the device could not be queried. The
    /// cache keeps its previous values in that case.
    pub async fn refresh(&self) -> Result<(), ProtocolError> {
        let values = self.transport.get_properties(&self.properties).await?;
        tracing::debug!(uid = %self.info.uid, count = values.len(), "Refreshed properties");

        let mut cache = self.cache.write();
        cache.extend(values);
        Ok(())
    }

    /// Subscribes to change notifications for this device.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PropertyChange> {
        self.changes.subscribe()
    }

    /// Applies values reported by the device on its own initiative and
    /// notifies every listener.
    ///
    /// Listeners are notified even if no value differs from the cache.
    pub fn apply_push(&self, updates: impl IntoIterator<Item = (PropertyCode, u8)>) {
        let codes = {
            let mut cache = self.cache.write();
            updates
                .into_iter()
                .map(|(code, value)| {
                    cache.insert(code, value);
                    code
                })
                .collect::<Vec<_>>()
        };

        tracing::debug!(uid = %self.info.uid, ?codes, "Device pushed property update");

        // No subscribers is fine
        let _ = self.changes.send(PropertyChange { codes });
    }

    /// Returns the number of active change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

impl<T> fmt::Debug for DeviceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("info", &self.info)
            .field("properties", &self.properties)
            .field("cache", &*self.cache.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::MemoryTransport;

    const SUB: PropertyCode = PropertyCode::new(0xe3);

    fn handle(transport: MemoryTransport) -> DeviceHandle<MemoryTransport> {
        DeviceHandle::new(
            DeviceInfo::new("dev-1", ObjectKey::new(0x02, 0x72, 0x01), "Water heater"),
            transport,
        )
        .with_properties([PropertyCode::STATUS, SUB])
        .with_set_map([PropertyCode::STATUS, SUB])
    }

    #[tokio::test]
    async fn refresh_updates_cache_from_transport() {
        let transport = MemoryTransport::new()
            .with_value(PropertyCode::STATUS, 0x30)
            .with_value(SUB, 0x42);
        let handle = handle(transport);

        assert_eq!(handle.cached_value(PropertyCode::STATUS), None);
        handle.refresh().await.unwrap();

        assert_eq!(handle.cached_value(PropertyCode::STATUS), Some(0x30));
        assert_eq!(handle.cached_value(SUB), Some(0x42));
    }

    #[tokio::test]
    async fn refresh_failure_keeps_cache() {
        let transport = MemoryTransport::new().with_value(PropertyCode::STATUS, 0x30);
        transport.set_offline(true);
        let handle = handle(transport).with_cached_value(PropertyCode::STATUS, 0x31);

        assert!(handle.refresh().await.is_err());
        assert_eq!(handle.cached_value(PropertyCode::STATUS), Some(0x31));
    }

    #[tokio::test]
    async fn refresh_does_not_notify() {
        let handle = handle(MemoryTransport::new().with_value(SUB, 0x41));
        let mut rx = handle.subscribe();

        handle.refresh().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn write_property_leaves_cache_alone() {
        let handle = handle(MemoryTransport::new()).with_cached_value(SUB, 0x42);

        handle.write_property(SUB, 0x41).await.unwrap();
        assert_eq!(handle.cached_value(SUB), Some(0x42));
        assert_eq!(handle.transport().value(SUB), Some(0x41));
    }

    #[test]
    fn apply_push_updates_cache_and_notifies() {
        let handle = handle(MemoryTransport::new());
        let mut rx = handle.subscribe();

        handle.apply_push([(PropertyCode::STATUS, 0x30)]);

        assert_eq!(handle.cached_value(PropertyCode::STATUS), Some(0x30));
        let change = rx.try_recv().unwrap();
        assert_eq!(change.codes, vec![PropertyCode::STATUS]);
    }

    #[test]
    fn apply_push_notifies_even_without_difference() {
        let handle = handle(MemoryTransport::new()).with_cached_value(SUB, 0x41);
        let mut rx = handle.subscribe();

        handle.apply_push([(SUB, 0x41)]);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn set_cached_is_silent() {
        let handle = handle(MemoryTransport::new());
        let mut rx = handle.subscribe();

        handle.set_cached(SUB, 0x41);
        assert_eq!(handle.cached_value(SUB), Some(0x41));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn listener_count_tracks_receivers() {
        let handle = handle(MemoryTransport::new());
        assert_eq!(handle.listener_count(), 0);

        let rx = handle.subscribe();
        assert_eq!(handle.listener_count(), 1);

        drop(rx);
        assert_eq!(handle.listener_count(), 0);
    }
}
