// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end switch scenarios against an in-memory device.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use echonet_switch::{
    CapabilityDescriptor, CapabilityIndex, CapabilityKey, CommandOutcome, DeviceHandle, DeviceInfo,
    EventBus, MemoryTransport, ObjectKey, PropertyCode, SwitchController, SwitchEvent, ValueMap,
    discover,
};
use tokio::sync::broadcast::Receiver;

const SUB: PropertyCode = PropertyCode::new(0xe3);
const OFF: u8 = 0x31;
const SUB_OFF: u8 = 0x42;

type Device = Arc<DeviceHandle<MemoryTransport>>;

/// Index for an instantaneous water heater where bath heating needs the
/// heater itself to be running.
fn index() -> CapabilityIndex {
    CapabilityIndex::builder()
        .switch(
            CapabilityKey::new(0x02, 0x72, 0x80),
            CapabilityDescriptor::new("Power", "mdi:power", ValueMap::POWER),
        )
        .switch(
            CapabilityKey::new(0x02, 0x72, 0xe3),
            CapabilityDescriptor::new("Bath heating", "mdi:bathtub", ValueMap::SETTING)
                .with_prerequisite(PropertyCode::STATUS),
        )
        .build()
}

fn device(status: u8, sub: u8) -> Device {
    Arc::new(
        DeviceHandle::new(
            DeviceInfo::new("fe00-72", ObjectKey::new(0x02, 0x72, 0x01), "Water heater"),
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

fn switches(device: &Device, events: &EventBus) -> Vec<Arc<SwitchController<MemoryTransport>>> {
    discover(device, &index())
        .into_iter()
        .map(|point| Arc::new(SwitchController::new(point, events.clone())))
        .collect()
}

fn switch_for(
    switches: &[Arc<SwitchController<MemoryTransport>>],
    code: PropertyCode,
) -> Arc<SwitchController<MemoryTransport>> {
    let found = switches
        .iter()
        .find(|s| s.control_point().code() == code)
        .expect("switch for code");
    Arc::clone(found)
}

fn drain(rx: &mut Receiver<SwitchEvent>) -> Vec<SwitchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn turn_on_without_prerequisite() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(OFF, SUB_OFF);
        let status = switch_for(&switches(&dev, &events), PropertyCode::STATUS);

        assert_eq!(status.turn_on().await, CommandOutcome::Applied);

        let writes = dev.transport().writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].code, PropertyCode::STATUS);
        assert_eq!(writes[0].value, 0x30);
        assert!(status.is_on());
        assert_eq!(
            drain(&mut rx),
            vec![SwitchEvent::state_changed("fe00-72-128", true, false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn turn_on_writes_prerequisite_first_and_waits() {
        let events = EventBus::new();
        let dev = device(OFF, SUB_OFF);
        let sub = switch_for(&switches(&dev, &events), SUB);

        assert_eq!(sub.turn_on().await, CommandOutcome::Applied);

        let writes = dev.transport().writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(
            (writes[0].code, writes[0].value),
            (PropertyCode::STATUS, 0x30)
        );
        assert!(writes[0].accepted);
        assert_eq!((writes[1].code, writes[1].value), (SUB, 0x41));
        assert!(writes[1].at.duration_since(writes[0].at) >= Duration::from_secs(3));

        assert!(sub.is_on());
        assert_eq!(dev.cached_value(PropertyCode::STATUS), Some(0x30));
        assert_eq!(dev.cached_value(SUB), Some(0x41));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_prerequisite_skips_target() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(OFF, SUB_OFF);
        dev.transport().reject(PropertyCode::STATUS);
        let sub = switch_for(&switches(&dev, &events), SUB);

        assert_eq!(sub.turn_on().await, CommandOutcome::PrerequisiteFailed);

        assert!(dev.transport().writes_to(SUB).is_empty());
        assert!(!sub.is_on());
        assert_eq!(dev.cached_value(SUB), Some(SUB_OFF));
        assert_eq!(dev.cached_value(PropertyCode::STATUS), Some(OFF));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn offline_device_leaves_state_alone() {
        let events = EventBus::new();
        let dev = device(OFF, SUB_OFF);
        dev.transport().set_offline(true);
        let status = switch_for(&switches(&dev, &events), PropertyCode::STATUS);

        assert_eq!(status.turn_on().await, CommandOutcome::Rejected);
        assert!(!status.is_on());
        assert_eq!(dev.cached_value(PropertyCode::STATUS), Some(OFF));
    }

    #[tokio::test(start_paused = true)]
    async fn turning_on_sub_is_seen_by_status_switch_on_push() {
        let events = EventBus::new();
        let dev = device(OFF, SUB_OFF);
        let all = switches(&dev, &events);
        let status = switch_for(&all, PropertyCode::STATUS);
        let sub = switch_for(&all, SUB);

        sub.turn_on().await;

        // The shared cache already holds the new status value.
        assert!(!status.is_on());
        dev.apply_push([(PropertyCode::STATUS, 0x30)]);
        assert!(status.reconcile_from_push());
        assert!(status.is_on());
    }
}

// ============================================================================
// Push reconciliation
// ============================================================================

mod push {
    use super::*;

    #[tokio::test]
    async fn push_with_change_switches_to_push_mode() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(OFF, SUB_OFF);
        let status = switch_for(&switches(&dev, &events), PropertyCode::STATUS);
        let listener = status.listen();

        dev.apply_push([(PropertyCode::STATUS, 0x30)]);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            SwitchEvent::state_changed("fe00-72-128", true, true)
        );
        assert!(status.is_on());
        assert!(!status.should_poll());
        assert!(rx.try_recv().is_err());

        listener.abort();
    }

    #[tokio::test]
    async fn push_without_change_publishes_nothing() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(OFF, SUB_OFF);
        let status = switch_for(&switches(&dev, &events), PropertyCode::STATUS);

        dev.apply_push([(PropertyCode::STATUS, OFF)]);

        assert!(!status.reconcile_from_push());
        assert!(status.should_poll());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn polling_stays_off_after_takeover() {
        let events = EventBus::new();
        let dev = device(OFF, SUB_OFF);
        let status = switch_for(&switches(&dev, &events), PropertyCode::STATUS);

        dev.apply_push([(PropertyCode::STATUS, 0x30)]);
        status.reconcile_from_push();
        dev.apply_push([(PropertyCode::STATUS, OFF)]);
        status.reconcile_from_push();
        status.turn_on().await;
        status.poll_now().await;

        assert!(!status.should_poll());
        assert!(!status.current_state().should_poll);
    }

    #[tokio::test]
    async fn one_push_reaches_every_switch_of_the_device() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let dev = device(OFF, SUB_OFF);
        let all = switches(&dev, &events);
        let listeners: Vec<_> = all.iter().map(SwitchController::listen).collect();

        dev.apply_push([(PropertyCode::STATUS, 0x30), (SUB, 0x41)]);

        let mut ids = HashSet::new();
        for _ in 0..2 {
            let event = rx.recv().await.unwrap();
            ids.insert(event.unique_id().to_string());
        }
        assert_eq!(
            ids,
            HashSet::from(["fe00-72-128".to_string(), "fe00-72-227".to_string()])
        );

        for listener in listeners {
            listener.abort();
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

mod discovery {
    use super::*;

    #[test]
    fn builtin_index_adds_single_fallback() {
        let dev = Arc::new(
            DeviceHandle::new(
                DeviceInfo::new("fe00-6b", ObjectKey::new(0x02, 0x6b, 0x01), "Boiler"),
                MemoryTransport::new(),
            )
            .with_properties([PropertyCode::STATUS, SUB, SUB, PropertyCode::new(0xe1)])
            .with_set_map([PropertyCode::STATUS, SUB]),
        );

        let points = discover(&dev, &CapabilityIndex::builtin());
        let codes: Vec<_> = points.iter().map(|p| p.code()).collect();
        let unique: HashSet<_> = codes.iter().copied().collect();

        assert_eq!(codes.len(), unique.len());
        assert_eq!(unique, HashSet::from([PropertyCode::STATUS, SUB]));
        assert_eq!(points.iter().filter(|p| p.is_fallback()).count(), 1);
    }

    #[test]
    fn index_from_json_drives_discovery() {
        let index = CapabilityIndex::from_json(
            r#"[
                {
                    "group": "0x02", "class": "0x7b", "code": "0xe0",
                    "capability": {
                        "kind": "switch",
                        "label": "Floor heating",
                        "icon": "mdi:heating-coil",
                        "values": { "on": 48, "off": 49 }
                    }
                }
            ]"#,
        )
        .unwrap();
        let dev = Arc::new(
            DeviceHandle::new(
                DeviceInfo::new("fe00-7b", ObjectKey::new(0x02, 0x7b, 0x01), "Floor"),
                MemoryTransport::new(),
            )
            .with_properties([PropertyCode::new(0xe0)]),
        );

        let points = discover(&dev, &index);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].descriptor().label, "Floor heating");
        assert!(!points[0].is_fallback());
    }
}
