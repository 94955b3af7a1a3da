// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch platform coordinating the switches of many devices.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::capabilities::CapabilityIndex;
use crate::config::PlatformConfig;
use crate::connector::{DeviceHandle, Transport};
use crate::discovery::discover;
use crate::error::Error;
use crate::event::{EventBus, SwitchEvent};
use crate::switch::{CommandOutcome, SwitchController, SwitchSnapshot};

/// A registered switch and its push listener.
struct SwitchEntry<T> {
    controller: Arc<SwitchController<T>>,
    listener: JoinHandle<()>,
}

struct Registry<T> {
    /// Switch IDs per device UID. Devices without switches are kept too.
    devices: HashMap<String, Vec<String>>,
    switches: HashMap<String, SwitchEntry<T>>,
}

/// Registers devices, exposes their switches by unique ID and keeps them in
/// sync.
///
/// # Examples
///
/// ```
/// use echonet_switch::capabilities::CapabilityIndex;
/// use echonet_switch::config::PlatformConfig;
/// use echonet_switch::connector::MemoryTransport;
/// use echonet_switch::platform::SwitchPlatform;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let platform: SwitchPlatform<MemoryTransport> =
///     SwitchPlatform::new(CapabilityIndex::builtin(), PlatformConfig::default());
/// let mut events = platform.subscribe();
///
/// assert_eq!(platform.switch_count().await, 0);
/// assert!(events.try_recv().is_err());
/// # }
/// ```
pub struct SwitchPlatform<T> {
    registry: RwLock<Registry<T>>,
    index: Arc<CapabilityIndex>,
    config: PlatformConfig,
    event_bus: EventBus,
}

impl<T: Transport> SwitchPlatform<T> {
    /// Creates an empty platform.
    #[must_use]
    pub fn new(index: impl Into<Arc<CapabilityIndex>>, config: PlatformConfig) -> Self {
        let event_bus = EventBus::with_capacity(config.event_capacity.max(1));
        Self {
            registry: RwLock::new(Registry {
                devices: HashMap::new(),
                switches: HashMap::new(),
            }),
            index: index.into(),
            config,
            event_bus,
        }
    }

    /// Returns the platform configuration.
    #[must_use]
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Returns the capability index used for discovery.
    #[must_use]
    pub fn index(&self) -> &CapabilityIndex {
        &self.index
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribes to switch events of every registered device.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchEvent> {
        self.event_bus.subscribe()
    }

    /// Returns the number of active event subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.event_bus.subscriber_count()
    }

    // =========================================================================
    // Device Management
    // =========================================================================

    /// Registers a device and creates its switches.
    ///
    /// Runs discovery against the capability index, starts one push listener
    /// per switch and publishes a [`SwitchEvent::SwitchAdded`] for each.
    /// Returns the unique IDs of the new switches, which may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceAlreadyRegistered`] if a device with the same
    /// UID is already registered.
    pub async fn add_device(&self, device: Arc<DeviceHandle<T>>) -> Result<Vec<String>, Error> {
        let uid = device.info().uid.clone();
        let mut registry = self.registry.write().await;

        if registry.devices.contains_key(&uid) {
            return Err(Error::DeviceAlreadyRegistered(uid));
        }

        let mut ids = Vec::new();
        for point in discover(&device, &self.index) {
            let controller = Arc::new(
                SwitchController::new(point, self.event_bus.clone())
                    .with_settle_delay(self.config.settle_delay()),
            );
            let unique_id = controller.unique_id().to_string();
            let listener = controller.listen();

            registry.switches.insert(
                unique_id.clone(),
                SwitchEntry {
                    controller,
                    listener,
                },
            );
            ids.push(unique_id);
        }

        registry.devices.insert(uid.clone(), ids.clone());
        drop(registry);

        tracing::info!(uid = %uid, switches = ids.len(), "Device registered");
        for id in &ids {
            self.event_bus.publish(SwitchEvent::switch_added(id));
        }

        Ok(ids)
    }

    /// Unregisters a device and all of its switches.
    ///
    /// Push listeners are stopped and a [`SwitchEvent::SwitchRemoved`] is
    /// published for each switch.
    ///
    /// # Returns
    ///
    /// Returns `true` if the device was found and removed, `false` otherwise.
    pub async fn remove_device(&self, uid: &str) -> bool {
        let removed = {
            let mut registry = self.registry.write().await;
            let Some(ids) = registry.devices.remove(uid) else {
                return false;
            };
            for id in &ids {
                if let Some(entry) = registry.switches.remove(id) {
                    entry.listener.abort();
                }
            }
            ids
        };

        tracing::info!(uid, switches = removed.len(), "Device removed");
        for id in removed {
            self.event_bus.publish(SwitchEvent::switch_removed(id));
        }
        true
    }

    /// Returns the UIDs of all registered devices.
    pub async fn device_uids(&self) -> Vec<String> {
        self.registry.read().await.devices.keys().cloned().collect()
    }

    /// Returns the unique IDs of all registered switches.
    pub async fn switch_ids(&self) -> Vec<String> {
        self.registry.read().await.switches.keys().cloned().collect()
    }

    /// Returns the number of registered switches.
    pub async fn switch_count(&self) -> usize {
        self.registry.read().await.switches.len()
    }

    /// Returns the controller behind a switch.
    pub async fn switch(&self, unique_id: &str) -> Option<Arc<SwitchController<T>>> {
        self.registry
            .read()
            .await
            .switches
            .get(unique_id)
            .map(|entry| Arc::clone(&entry.controller))
    }

    async fn controller(&self, unique_id: &str) -> Result<Arc<SwitchController<T>>, Error> {
        self.switch(unique_id)
            .await
            .ok_or_else(|| Error::SwitchNotFound(unique_id.to_string()))
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Turns a switch on.
    ///
    /// The outcome of the command is returned as a value; a rejected command
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SwitchNotFound`] if no switch has this ID.
    pub async fn turn_on(&self, unique_id: &str) -> Result<CommandOutcome, Error> {
        let controller = self.controller(unique_id).await?;
        Ok(controller.turn_on().await)
    }

    /// Turns a switch off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SwitchNotFound`] if no switch has this ID.
    pub async fn turn_off(&self, unique_id: &str) -> Result<CommandOutcome, Error> {
        let controller = self.controller(unique_id).await?;
        Ok(controller.turn_off().await)
    }

    /// Returns the current state of a switch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SwitchNotFound`] if no switch has this ID.
    pub async fn state(&self, unique_id: &str) -> Result<SwitchSnapshot, Error> {
        Ok(self.controller(unique_id).await?.current_state())
    }

    /// Returns the current state of every switch.
    pub async fn states(&self) -> Vec<SwitchSnapshot> {
        self.registry
            .read()
            .await
            .switches
            .values()
            .map(|entry| entry.controller.current_state())
            .collect()
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Polls every switch that still relies on polling.
    ///
    /// Each device with at least one polled switch is refreshed once, then
    /// its polled switches re-read the cache. A failed refresh is logged and
    /// the switches re-read the unchanged cache.
    ///
    /// Returns the number of switches polled.
    pub async fn poll_all(&self) -> usize {
        let mut by_device: HashMap<String, Vec<Arc<SwitchController<T>>>> = HashMap::new();
        {
            let registry = self.registry.read().await;
            for (uid, ids) in &registry.devices {
                let polled: Vec<_> = ids
                    .iter()
                    .filter_map(|id| registry.switches.get(id))
                    .filter(|entry| entry.controller.should_poll())
                    .map(|entry| Arc::clone(&entry.controller))
                    .collect();
                if !polled.is_empty() {
                    by_device.insert(uid.clone(), polled);
                }
            }
        }

        let mut count = 0;
        for (uid, controllers) in by_device {
            let device = Arc::clone(controllers[0].control_point().device());
            if let Err(error) = device.refresh().await {
                tracing::warn!(uid = %uid, error = %error, "Refresh failed");
            }
            for controller in &controllers {
                controller.reconcile_from_poll();
            }
            count += controllers.len();
        }

        tracing::trace!(count, "Polled switches");
        count
    }

    /// Spawns a task that calls [`poll_all`](Self::poll_all) at the
    /// configured poll interval.
    ///
    /// The first poll happens one interval after this call. The task runs
    /// until the returned handle is aborted.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let platform = Arc::clone(self);
        let period = self.config.poll_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(period_secs = period.as_secs(), "Starting poll loop");
            loop {
                interval.tick().await;
                platform.poll_all().await;
            }
        })
    }
}

impl<T> Drop for SwitchPlatform<T> {
    fn drop(&mut self) {
        for entry in self.registry.get_mut().switches.values() {
            entry.listener.abort();
        }
    }
}

impl<T> fmt::Debug for SwitchPlatform<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchPlatform")
            .field("config", &self.config)
            .field("event_bus", &self.event_bus)
            .finish_non_exhaustive()
    }
}
