// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport simulating a device.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::ProtocolError;
use crate::types::PropertyCode;

use super::Transport;

/// One write attempt seen by a [`MemoryTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    /// Property written.
    pub code: PropertyCode,
    /// Value sent.
    pub value: u8,
    /// Whether the simulated device confirmed the write.
    pub accepted: bool,
    /// When the write was issued.
    pub at: Instant,
}

/// Transport backed by an in-memory property table.
///
/// Writes are recorded in order, including rejected ones, which makes this
/// useful for asserting command sequences. Individual properties can be
/// configured to reject writes, and the whole device can be taken offline.
///
/// # Examples
///
/// ```
/// use echonet_switch::connector::{MemoryTransport, Transport};
/// use echonet_switch::types::PropertyCode;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = MemoryTransport::new().with_value(PropertyCode::STATUS, 0x31);
/// transport.reject(PropertyCode::new(0xe3));
///
/// assert!(transport.set_property(PropertyCode::STATUS, 0x30).await.is_ok());
/// assert!(transport.set_property(PropertyCode::new(0xe3), 0x41).await.is_err());
/// assert_eq!(transport.writes().len(), 2);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryTransport {
    values: Mutex<HashMap<PropertyCode, u8>>,
    rejected: Mutex<HashSet<PropertyCode>>,
    writes: Mutex<Vec<WriteRecord>>,
    reads: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryTransport {
    /// Creates a transport for a device with no property values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a device-side property value.
    #[must_use]
    pub fn with_value(self, code: PropertyCode, value: u8) -> Self {
        self.values.lock().insert(code, value);
        self
    }

    /// Changes a device-side value without going through a write, as if
    /// someone pressed a button on the device.
    pub fn set_device_value(&self, code: PropertyCode, value: u8) {
        self.values.lock().insert(code, value);
    }

    /// Returns the device-side value of a property.
    #[must_use]
    pub fn value(&self, code: PropertyCode) -> Option<u8> {
        self.values.lock().get(&code).copied()
    }

    /// Makes writes to `code` fail.
    pub fn reject(&self, code: PropertyCode) {
        self.rejected.lock().insert(code);
    }

    /// Makes writes to `code` succeed again.
    pub fn accept(&self, code: PropertyCode) {
        self.rejected.lock().remove(&code);
    }

    /// Takes the device offline (every request fails) or back online.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns how many read requests the device received.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Returns all write attempts so far, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    /// Returns the write attempts for one property.
    #[must_use]
    pub fn writes_to(&self, code: PropertyCode) -> Vec<WriteRecord> {
        self.writes
            .lock()
            .iter()
            .filter(|record| record.code == code)
            .copied()
            .collect()
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    async fn set_property(&self, code: PropertyCode, value: u8) -> Result<(), ProtocolError> {
        // Behave like a real round trip and let other tasks run.
        tokio::task::yield_now().await;

        if self.is_offline() {
            return Err(ProtocolError::ConnectionFailed("device offline".to_string()));
        }

        let accepted = !self.rejected.lock().contains(&code);
        self.writes.lock().push(WriteRecord {
            code,
            value,
            accepted,
            at: Instant::now(),
        });

        if !accepted {
            return Err(ProtocolError::Rejected { code, value });
        }

        self.values.lock().insert(code, value);
        Ok(())
    }

    async fn get_properties(
        &self,
        codes: &[PropertyCode],
    ) -> Result<Vec<(PropertyCode, u8)>, ProtocolError> {
        tokio::task::yield_now().await;
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.is_offline() {
            return Err(ProtocolError::Timeout(0));
        }

        let values = self.values.lock();
        Ok(codes
            .iter()
            .filter_map(|code| values.get(code).map(|value| (*code, *value)))
            .collect())
    }
}
