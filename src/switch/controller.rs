// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch controller for one control point.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::config::DEFAULT_SETTLE_DELAY;
use crate::connector::{DeviceInfo, Transport};
use crate::discovery::ControlPoint;
use crate::event::{EventBus, SwitchEvent};
use crate::types::PowerState;

use super::state::{CommandOutcome, SwitchSnapshot, SwitchState};

/// Stateful switch entity for one [`ControlPoint`].
///
/// The controller keeps the observed on/off state of its property in sync
/// with the device cache, from three sources:
///
/// - confirmed commands ([`turn_on`](Self::turn_on), [`turn_off`](Self::turn_off)),
/// - polls ([`poll_now`](Self::poll_now)), while polling is enabled,
/// - push notifications ([`reconcile_from_push`](Self::reconcile_from_push)).
///
/// Concurrent commands on the same controller are not serialized. If two
/// overlap, the last write to complete decides the cached and published
/// state.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use echonet_switch::capabilities::CapabilityIndex;
/// use echonet_switch::connector::{DeviceHandle, DeviceInfo, MemoryTransport};
/// use echonet_switch::discovery::discover;
/// use echonet_switch::event::EventBus;
/// use echonet_switch::switch::SwitchController;
/// use echonet_switch::types::{ObjectKey, PropertyCode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let device = Arc::new(
///     DeviceHandle::new(
///         DeviceInfo::new("fe00-90", ObjectKey::new(0x02, 0x90, 0x01), "Hall"),
///         MemoryTransport::new(),
///     )
///     .with_properties([PropertyCode::STATUS])
///     .with_set_map([PropertyCode::STATUS])
///     .with_cached_value(PropertyCode::STATUS, 0x31),
/// );
///
/// let point = discover(&device, &CapabilityIndex::builtin()).remove(0);
/// let switch = SwitchController::new(point, EventBus::new());
/// assert!(!switch.is_on());
///
/// switch.turn_on().await;
/// assert!(switch.is_on());
/// assert_eq!(switch.current_state().name, "Hall Operation status");
/// # }
/// ```
pub struct SwitchController<T> {
    point: ControlPoint<T>,
    unique_id: String,
    name: String,
    settle_delay: Duration,
    events: EventBus,
    state: Mutex<SwitchState>,
}

impl<T: Transport> SwitchController<T> {
    /// Creates a controller whose initial state is read from the device
    /// cache.
    #[must_use]
    pub fn new(point: ControlPoint<T>, events: EventBus) -> Self {
        let unique_id = point.unique_id();
        let name = format!(
            "{} {}",
            point.device().info().title,
            point.descriptor().label
        );
        let observed_on = point
            .descriptor()
            .values
            .is_on(point.device().cached_value(point.code()));

        Self {
            point,
            unique_id,
            name,
            settle_delay: DEFAULT_SETTLE_DELAY,
            events,
            state: Mutex::new(SwitchState::new(observed_on)),
        }
    }

    /// Sets how long to wait after turning on a prerequisite.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Unique ID of this switch.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Display name: device title followed by the property label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The control point this switch drives.
    #[must_use]
    pub fn control_point(&self) -> &ControlPoint<T> {
        &self.point
    }

    /// Identity of the device this switch belongs to.
    #[must_use]
    pub fn device_info(&self) -> &DeviceInfo {
        self.point.device().info()
    }

    /// Last observed on/off state.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.state.lock().is_on()
    }

    /// Whether the host should keep polling this switch.
    #[must_use]
    pub fn should_poll(&self) -> bool {
        self.state.lock().polling_enabled()
    }

    /// Returns the current state for the host.
    #[must_use]
    pub fn current_state(&self) -> SwitchSnapshot {
        let state = *self.state.lock();
        SwitchSnapshot {
            unique_id: self.unique_id.clone(),
            name: self.name.clone(),
            icon: self.point.descriptor().icon.clone(),
            is_on: state.is_on(),
            should_poll: state.polling_enabled(),
        }
    }

    /// Turns the switch on.
    ///
    /// If the switch has a prerequisite that is not on, the prerequisite is
    /// turned on first and the settle delay elapses before the target is
    /// written. If the prerequisite write fails the target is never written.
    ///
    /// The write is issued even if the switch already looks on, so that a
    /// drifted cache gets corrected. Failures leave the state untouched.
    pub async fn turn_on(&self) -> CommandOutcome {
        if let Some(prerequisite) = self.point.prerequisite() {
            let device = self.point.device();

            if !prerequisite
                .values
                .is_on(device.cached_value(prerequisite.code))
            {
                if let Err(error) = device
                    .write_property(prerequisite.code, prerequisite.values.on)
                    .await
                {
                    tracing::warn!(
                        unique_id = %self.unique_id,
                        prerequisite = %prerequisite.code,
                        error = %error,
                        "Prerequisite could not be turned on, skipping"
                    );
                    return CommandOutcome::PrerequisiteFailed;
                }

                device.set_cached(prerequisite.code, prerequisite.values.on);
                tracing::debug!(
                    unique_id = %self.unique_id,
                    prerequisite = %prerequisite.code,
                    delay = ?self.settle_delay,
                    "Prerequisite turned on, waiting for device to settle"
                );
                tokio::time::sleep(self.settle_delay).await;
            }

            // Re-read: a push may have turned it off again while we waited.
            if !prerequisite
                .values
                .is_on(device.cached_value(prerequisite.code))
            {
                tracing::warn!(
                    unique_id = %self.unique_id,
                    prerequisite = %prerequisite.code,
                    "Prerequisite is off after settling, skipping"
                );
                return CommandOutcome::PrerequisiteFailed;
            }
        }

        self.write_state(PowerState::On).await
    }

    /// Turns the switch off. Failures leave the state untouched.
    pub async fn turn_off(&self) -> CommandOutcome {
        self.write_state(PowerState::Off).await
    }

    async fn write_state(&self, target: PowerState) -> CommandOutcome {
        let code = self.point.code();
        let value = self.point.descriptor().values.value(target);
        let device = self.point.device();

        if let Err(error) = device.write_property(code, value).await {
            tracing::warn!(
                unique_id = %self.unique_id,
                state = %target,
                error = %error,
                "Switch command was not confirmed"
            );
            return CommandOutcome::Rejected;
        }

        device.set_cached(code, value);
        self.state.lock().observe(target.is_on());
        tracing::debug!(unique_id = %self.unique_id, state = %target, "Switch command confirmed");

        self.events.publish(SwitchEvent::state_changed(
            &self.unique_id,
            target.is_on(),
            false,
        ));
        CommandOutcome::Applied
    }

    /// Refreshes the device cache and re-reads this switch's state.
    ///
    /// Does nothing once push notifications have taken over. A failed
    /// refresh is logged and the state is re-read from the unchanged cache.
    /// Publishes a state change only if the observed state moved.
    pub async fn poll_now(&self) {
        if !self.should_poll() {
            return;
        }

        if let Err(error) = self.point.device().refresh().await {
            tracing::warn!(unique_id = %self.unique_id, error = %error, "Refresh failed");
        }

        self.reconcile_from_poll();
    }

    /// Re-reads this switch's state from a cache that was just refreshed by
    /// a poll, without querying the device.
    ///
    /// Does nothing once push notifications have taken over. Returns `true`
    /// if the state changed, in which case a state change is published.
    pub fn reconcile_from_poll(&self) -> bool {
        let is_on = self.read_cache();
        let changed = {
            let mut state = self.state.lock();
            state.polling_enabled() && state.observe(is_on)
        };
        if changed {
            tracing::debug!(unique_id = %self.unique_id, is_on, "Poll observed state change");
            self.events
                .publish(SwitchEvent::state_changed(&self.unique_id, is_on, false));
        }
        changed
    }

    /// Re-reads this switch's state after the device reported a change.
    ///
    /// The notification may concern any property of the device. If this
    /// switch's state actually moved, polling is switched off for good and
    /// a push-driven state change is published; otherwise nothing happens.
    ///
    /// Returns `true` if the state changed.
    pub fn reconcile_from_push(&self) -> bool {
        let is_on = self.read_cache();

        let (changed, was_polling) = {
            let mut state = self.state.lock();
            let was_polling = state.polling_enabled();
            (state.observe_push(is_on), was_polling)
        };
        if !changed {
            return false;
        }

        if was_polling {
            tracing::info!(unique_id = %self.unique_id, "Push updates confirmed, polling disabled");
        }
        self.events
            .publish(SwitchEvent::state_changed(&self.unique_id, is_on, true));
        true
    }

    fn read_cache(&self) -> bool {
        self.point
            .descriptor()
            .values
            .is_on(self.point.device().cached_value(self.point.code()))
    }
}

impl<T: Transport> SwitchController<T> {
    /// Spawns a task that reconciles this switch on every change
    /// notification of its device.
    ///
    /// The subscription is taken before this returns, so no notification
    /// sent afterwards is missed. The task only holds a weak reference to
    /// the switch: it stops once the switch is dropped, when the device's
    /// change channel closes, or when the returned handle is aborted.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.point.device().subscribe();
        let switch = Arc::downgrade(self);
        let unique_id = self.unique_id.clone();

        tokio::spawn(async move {
            loop {
                let received = changes.recv().await;
                let Some(this) = switch.upgrade() else {
                    break;
                };
                match received {
                    Ok(_) => {
                        this.reconcile_from_push();
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(unique_id = %unique_id, missed, "Change listener lagged");
                        this.reconcile_from_push();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!(unique_id = %unique_id, "Change listener stopped");
        })
    }
}

impl<T> fmt::Debug for SwitchController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchController")
            .field("unique_id", &self.unique_id)
            .field("name", &self.name)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::capabilities::{CapabilityDescriptor, CapabilityIndex, CapabilityKey};
    use crate::connector::{DeviceHandle, MemoryTransport};
    use crate::types::{ObjectKey, PropertyCode, ValueMap};

    const SUB: PropertyCode = PropertyCode::new(0xe3);

    fn index() -> CapabilityIndex {
        CapabilityIndex::builder()
            .switch(
                CapabilityKey::new(0x02, 0x72, 0x80),
                CapabilityDescriptor::new("Power", "mdi:power", ValueMap::POWER),
            )
            .switch(
                CapabilityKey::new(0x02, 0x72, 0xe3),
                CapabilityDescriptor::new("Bath", "mdi:bathtub", ValueMap::SETTING)
                    .with_prerequisite(PropertyCode::STATUS),
            )
            .build()
    }

    fn device(status: u8, sub: u8) -> Arc<DeviceHandle<MemoryTransport>> {
        Arc::new(
            DeviceHandle::new(
                DeviceInfo::new("dev", ObjectKey::new(0x02, 0x72, 0x01), "Heater"),
                MemoryTransport::new()
                    .with_value(PropertyCode::STATUS, status)
                    .with_value(SUB, sub),
            )
            .with_properties([PropertyCode::STATUS, SUB])
            .with_set_map([PropertyCode::STATUS, SUB])
            .with_cached_value(PropertyCode::STATUS, status)
            .with_cached_value(SUB, sub),
        )
    }

    fn controller(
        device: &Arc<DeviceHandle<MemoryTransport>>,
        code: PropertyCode,
        events: &EventBus,
    ) -> SwitchController<MemoryTransport> {
        let index = index();
        let descriptor = index
            .switch(&CapabilityKey::new(0x02, 0x72, code.value()))
            .unwrap()
            .clone();
        SwitchController::new(
            ControlPoint::new(Arc::clone(device), code, descriptor, &index),
            events.clone(),
        )
    }

    #[test]
    fn initial_state_from_cache() {
        let events = EventBus::new();
        let dev = device(0x30, 0x42);

        assert!(controller(&dev, PropertyCode::STATUS, &events).is_on());
        assert!(!controller(&dev, SUB, &events).is_on());
    }

    #[test]
    fn snapshot_fields() {
        let events = EventBus::new();
        let dev = device(0x30, 0x42);
        let switch = controller(&dev, SUB, &events);

        assert_eq!(
            switch.current_state(),
            SwitchSnapshot {
                unique_id: "dev-227".to_string(),
                name: "Heater Bath".to_string(),
                icon: "mdi:bathtub".to_string(),
                is_on: false,
                should_poll: true,
            }
        );
    }

    #[tokio::test]
    async fn turn_on_when_already_on_still_writes() {
        let events = EventBus::new();
        let dev = device(0x30, 0x42);
        let switch = controller(&dev, PropertyCode::STATUS, &events);

        assert_eq!(switch.turn_on().await, CommandOutcome::Applied);

        let writes = dev.transport().writes_to(PropertyCode::STATUS);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].value, 0x30);
    }

    #[tokio::test(start_paused = true)]
    async fn prerequisite_already_on_skips_settle_delay() {
        let events = EventBus::new();
        let dev = device(0x30, 0x42);
        let switch = controller(&dev, SUB, &events);
        let started = Instant::now();

        assert_eq!(switch.turn_on().await, CommandOutcome::Applied);

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(dev.transport().writes_to(PropertyCode::STATUS).is_empty());
        assert_eq!(dev.cached_value(SUB), Some(0x41));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_settle_delay_is_used() {
        let events = EventBus::new();
        let dev = device(0x31, 0x42);
        let switch = controller(&dev, SUB, &events).with_settle_delay(Duration::from_millis(250));
        let started = Instant::now();

        switch.turn_on().await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn prerequisite_turned_off_during_settle_aborts() {
        let events = EventBus::new();
        let dev = device(0x31, 0x42);
        let switch = Arc::new(controller(&dev, SUB, &events));

        let task = tokio::spawn({
            let switch = Arc::clone(&switch);
            async move { switch.turn_on().await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        dev.apply_push([(PropertyCode::STATUS, 0x31)]);

        assert_eq!(task.await.unwrap(), CommandOutcome::PrerequisiteFailed);
        assert!(dev.transport().writes_to(SUB).is_empty());
        assert!(!switch.is_on());
    }

    #[tokio::test]
    async fn turn_off_rejected_keeps_state() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(0x30, 0x41);
        dev.transport().reject(SUB);
        let switch = controller(&dev, SUB, &events);

        assert_eq!(switch.turn_off().await, CommandOutcome::Rejected);

        assert!(switch.is_on());
        assert_eq!(dev.cached_value(SUB), Some(0x41));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn turn_off_publishes() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(0x30, 0x41);
        let switch = controller(&dev, SUB, &events);

        assert_eq!(switch.turn_off().await, CommandOutcome::Applied);

        assert!(!switch.is_on());
        assert_eq!(dev.cached_value(SUB), Some(0x42));
        assert_eq!(
            rx.try_recv().unwrap(),
            SwitchEvent::state_changed("dev-227", false, false)
        );
    }

    #[tokio::test]
    async fn poll_picks_up_device_side_change() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(0x31, 0x42);
        let switch = controller(&dev, PropertyCode::STATUS, &events);

        dev.transport().set_device_value(PropertyCode::STATUS, 0x30);
        switch.poll_now().await;

        assert!(switch.is_on());
        assert!(switch.should_poll());
        assert_eq!(
            rx.try_recv().unwrap(),
            SwitchEvent::state_changed("dev-128", true, false)
        );
    }

    #[tokio::test]
    async fn poll_without_change_is_quiet() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(0x31, 0x42);
        let switch = controller(&dev, PropertyCode::STATUS, &events);

        switch.poll_now().await;

        assert!(!switch.is_on());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_refresh_rereads_cache() {
        let events = EventBus::new();
        let dev = device(0x31, 0x42);
        let switch = controller(&dev, PropertyCode::STATUS, &events);

        // Cache moved behind the controller's back; refresh fails.
        dev.set_cached(PropertyCode::STATUS, 0x30);
        dev.transport().set_offline(true);
        switch.poll_now().await;

        assert!(switch.is_on());
    }

    #[tokio::test]
    async fn poll_is_noop_after_push_takeover() {
        let events = EventBus::new();
        let dev = device(0x31, 0x42);
        let switch = controller(&dev, PropertyCode::STATUS, &events);

        dev.apply_push([(PropertyCode::STATUS, 0x30)]);
        assert!(switch.reconcile_from_push());
        assert!(!switch.should_poll());

        // A poll would now read "off" from the device, but it must not run.
        switch.poll_now().await;
        assert!(switch.is_on());
        assert_eq!(dev.cached_value(PropertyCode::STATUS), Some(0x30));
    }

    #[tokio::test]
    async fn push_for_other_property_is_ignored() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(0x31, 0x42);
        let switch = controller(&dev, PropertyCode::STATUS, &events);

        dev.apply_push([(SUB, 0x41)]);

        assert!(!switch.reconcile_from_push());
        assert!(switch.should_poll());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn detached_listener_releases_switch_and_device() {
        let events = EventBus::new();
        let dev = device(0x31, 0x42);
        let switch = Arc::new(controller(&dev, PropertyCode::STATUS, &events));
        let task = switch.listen();
        let weak_device = Arc::downgrade(&dev);
        let weak_switch = Arc::downgrade(&switch);

        drop(switch);
        drop(dev);

        assert!(weak_switch.upgrade().is_none());
        assert!(weak_device.upgrade().is_none());
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("listener stops once its device is gone")
            .unwrap();
    }

    #[tokio::test]
    async fn listener_stops_when_switch_dropped_while_device_lives() {
        let events = EventBus::new();
        let dev = device(0x31, 0x42);
        let switch = Arc::new(controller(&dev, PropertyCode::STATUS, &events));
        let task = switch.listen();

        drop(switch);
        dev.apply_push([(PropertyCode::STATUS, 0x30)]);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("listener stops on the next notification")
            .unwrap();
        assert_eq!(dev.listener_count(), 0);
    }

    #[tokio::test]
    async fn listener_reconciles_on_push() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(0x31, 0x42);
        let switch = Arc::new(controller(&dev, PropertyCode::STATUS, &events));
        let task = switch.listen();

        dev.apply_push([(PropertyCode::STATUS, 0x30)]);

        let event = rx.recv().await.unwrap();
        assert_eq!(event, SwitchEvent::state_changed("dev-128", true, true));
        assert!(switch.is_on());
        assert!(!switch.should_poll());

        task.abort();
    }
}
