use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use super::*;
use crate::control::{Direction, Property, SlotIndex};
use crate::device::testing::GatedCamera;
use crate::device::{ApplyError, Constraints, DeviceCapabilities, DeviceId, PtzDevice, SimulatedCamera};
use crate::input::gesture::PressEnd;
use crate::input::SteerDelta;

const TICK: Duration = Duration::from_millis(50);

fn pan(value: f64) -> Constraints {
    [(Property::Pan, value)].into_iter().collect()
}

async fn next_event(events: &mut broadcast::Receiver<HubEvent>) -> HubEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no hub event within 5s")
        .expect("event stream closed")
}

async fn property(hub: &HubHandle, device: &DeviceId, property: Property) -> PropertySnapshot {
    let snapshot = hub.snapshot().await.unwrap();
    let surface = snapshot.iter().find(|s| &s.device == device).unwrap();
    surface
        .properties
        .iter()
        .find(|p| p.property == property)
        .cloned()
        .unwrap()
}

async fn surface(hub: &HubHandle, device: &DeviceId) -> SurfaceSnapshot {
    let snapshot = hub.snapshot().await.unwrap();
    snapshot.into_iter().find(|s| &s.device == device).unwrap()
}

/// Holds a minus/plus button for `ticks` repeat intervals
async fn hold_for(hub: &HubHandle, device: &DeviceId, property: Property, direction: Direction, ticks: u32) {
    hub.hold(device, property, direction, PressPhase::Start).unwrap();
    sleep(TICK * ticks + TICK / 5).await;
    hub.hold(device, property, direction, PressPhase::End(PressEnd::Release))
        .unwrap();
}

async fn gated(hub: &HubHandle, camera: GatedCamera) -> (Arc<GatedCamera>, DeviceId) {
    let camera = Arc::new(camera);
    let device: Arc<dyn PtzDevice> = camera.clone();
    let descriptor = hub.register(device).await.unwrap();
    (camera, descriptor.device)
}

#[tokio::test(start_paused = true)]
async fn three_rapid_steps_converge_to_thirty() {
    let hub = HubHandle::spawn(None);
    let mut events = hub.subscribe();
    let (camera, id) = gated(&hub, GatedCamera::pan_only("cam")).await;

    hold_for(&hub, &id, Property::Pan, Direction::Increase, 3).await;
    let control = property(&hub, &id, Property::Pan).await;
    assert_eq!((control.current, control.desired), (0.0, 30.0));
    assert!(surface(&hub, &id).await.in_flight);

    camera.release(1);
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::Applied { device: id.clone(), payload: pan(10.0) }
    );
    camera.release(1);
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::Applied { device: id.clone(), payload: pan(30.0) }
    );

    let control = property(&hub, &id, Property::Pan).await;
    assert_eq!((control.current, control.desired), (30.0, 30.0));
    assert_eq!(camera.calls(), vec![pan(10.0), pan(30.0)]);
    assert_eq!(camera.max_outstanding(), 1);
    assert!(!surface(&hub, &id).await.in_flight);
}

#[tokio::test(start_paused = true)]
async fn zoom_reset_below_min_issues_no_apply() {
    let hub = HubHandle::spawn(None);
    let (camera, id) = gated(&hub, GatedCamera::zoom_only("cam")).await;

    hub.reset(&id).unwrap();
    let zoom = property(&hub, &id, Property::Zoom).await;
    assert_eq!((zoom.current, zoom.desired), (100.0, 100.0));

    sleep(Duration::from_millis(100)).await;
    assert!(camera.calls().is_empty());
    assert!(!surface(&hub, &id).await.in_flight);
}

#[tokio::test(start_paused = true)]
async fn failure_is_reported_once_and_next_click_settles() {
    let hub = HubHandle::spawn(None);
    let mut events = hub.subscribe();
    let (camera, id) = gated(&hub, GatedCamera::pan_only("cam")).await;
    camera.fail_next(ApplyError::Rejected("out of reach".into()));

    hold_for(&hub, &id, Property::Pan, Direction::Increase, 1).await;
    camera.release(1);
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::ApplyFailed {
            device: id.clone(),
            payload: pan(10.0),
            error: ApplyError::Rejected("out of reach".into()),
        }
    );

    // nothing retries on its own and the target is not rolled back
    sleep(Duration::from_secs(1)).await;
    assert_eq!(camera.calls().len(), 1);
    let control = property(&hub, &id, Property::Pan).await;
    assert_eq!((control.current, control.desired), (0.0, 10.0));

    hold_for(&hub, &id, Property::Pan, Direction::Increase, 1).await;
    camera.release(1);
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::Applied { device: id.clone(), payload: pan(20.0) }
    );

    let control = property(&hub, &id, Property::Pan).await;
    assert_eq!((control.current, control.desired), (20.0, 20.0));
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn long_press_saves_with_acknowledgment_and_short_press_loads() {
    let hub = HubHandle::spawn(None);
    let mut events = hub.subscribe();
    let (camera, id) = gated(&hub, GatedCamera::pan_only("cam")).await;
    let slot = SlotIndex::new(2).unwrap();

    hold_for(&hub, &id, Property::Pan, Direction::Increase, 1).await;
    camera.release(1);
    next_event(&mut events).await;

    hub.preset(&id, slot, PressPhase::Start).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::PresetSaved { device: id.clone(), slot }
    );
    let saved = surface(&hub, &id).await;
    assert!(saved.presets[slot.position()].acknowledged);
    assert!(saved.presets[slot.position()].saved_at.is_some());

    sleep(Duration::from_millis(350)).await;
    assert!(!surface(&hub, &id).await.presets[slot.position()].acknowledged);

    // the release after a long press does nothing
    hub.preset(&id, slot, PressPhase::End(PressEnd::Release)).unwrap();
    hub.snapshot().await.unwrap();
    assert!(events.try_recv().is_err());

    hold_for(&hub, &id, Property::Pan, Direction::Increase, 2).await;
    camera.release(2);
    next_event(&mut events).await;
    next_event(&mut events).await;
    assert_eq!(property(&hub, &id, Property::Pan).await.current, 30.0);

    hub.preset(&id, slot, PressPhase::Start).unwrap();
    sleep(Duration::from_millis(200)).await;
    hub.preset(&id, slot, PressPhase::End(PressEnd::Release)).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::PresetLoaded { device: id.clone(), slot }
    );
    assert_eq!(property(&hub, &id, Property::Pan).await.desired, 10.0);

    camera.release(1);
    next_event(&mut events).await;
    assert_eq!(property(&hub, &id, Property::Pan).await.current, 10.0);
}

#[tokio::test(start_paused = true)]
async fn released_hold_stops_stepping() {
    let hub = HubHandle::spawn(None);
    let camera = Arc::new(SimulatedCamera::standard("cam", "Desk", Duration::ZERO));
    let device: Arc<dyn PtzDevice> = camera.clone();
    let id = hub.register(device).await.unwrap().device;

    hub.hold(&id, Property::Tilt, Direction::Decrease, PressPhase::Start)
        .unwrap();
    sleep(TICK * 2 + TICK / 5).await;
    hub.hold(&id, Property::Tilt, Direction::Decrease, PressPhase::End(PressEnd::Leave))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    let tilt = property(&hub, &id, Property::Tilt).await;
    assert_eq!((tilt.current, tilt.desired), (-7_200.0, -7_200.0));
    assert_eq!(camera.position(Property::Tilt), Some(-7_200.0));
}

#[tokio::test(start_paused = true)]
async fn steering_while_in_flight_lands_in_next_payload() {
    let hub = HubHandle::spawn(None);
    let mut events = hub.subscribe();
    let (camera, id) = gated(&hub, GatedCamera::pan_only("cam")).await;
    let (zoom_camera, zoom_id) = gated(&hub, GatedCamera::zoom_only("zoom")).await;

    hub.steer(vec![SteerDelta { property: Property::Pan, units: 1.0 }])
        .unwrap();
    hub.steer(vec![SteerDelta { property: Property::Pan, units: 2.0 }])
        .unwrap();
    let control = property(&hub, &id, Property::Pan).await;
    assert_eq!((control.current, control.desired), (0.0, 30.0));

    camera.release(2);
    next_event(&mut events).await;
    next_event(&mut events).await;

    assert_eq!(camera.calls(), vec![pan(10.0), pan(30.0)]);
    assert_eq!(property(&hub, &id, Property::Pan).await.current, 30.0);
    // a camera without pan is left alone
    assert!(zoom_camera.calls().is_empty());
    assert!(!surface(&hub, &zoom_id).await.in_flight);
}

fn constraints(values: &[(Property, f64)]) -> Constraints {
    values.iter().copied().collect()
}

#[tokio::test(start_paused = true)]
async fn one_steer_tick_becomes_one_apply() {
    let hub = HubHandle::spawn(None);
    let mut events = hub.subscribe();
    let (camera, id) = gated(&hub, GatedCamera::three_axis("cam")).await;

    hub.steer(vec![
        SteerDelta { property: Property::Pan, units: 1.0 },
        SteerDelta { property: Property::Tilt, units: -2.0 },
        SteerDelta { property: Property::Zoom, units: 1.0 },
        SteerDelta { property: Property::Zoom, units: -1.0 },
    ])
    .unwrap();
    camera.release(1);
    let expected = constraints(&[(Property::Pan, 10.0), (Property::Tilt, -20.0)]);
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::Applied { device: id.clone(), payload: expected.clone() }
    );

    sleep(Duration::from_millis(100)).await;
    assert_eq!(camera.calls(), vec![expected]);
    assert!(!surface(&hub, &id).await.in_flight);
}

#[tokio::test(start_paused = true)]
async fn preset_load_moves_every_property_in_one_apply() {
    let hub = HubHandle::spawn(None);
    let mut events = hub.subscribe();
    let (camera, id) = gated(&hub, GatedCamera::three_axis("cam")).await;
    let slot = SlotIndex::new(1).unwrap();

    hub.steer(vec![
        SteerDelta { property: Property::Pan, units: 1.0 },
        SteerDelta { property: Property::Tilt, units: 1.0 },
        SteerDelta { property: Property::Zoom, units: 1.0 },
    ])
    .unwrap();
    camera.release(1);
    next_event(&mut events).await;

    hub.preset(&id, slot, PressPhase::Start).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::PresetSaved { device: id.clone(), slot }
    );
    hub.preset(&id, slot, PressPhase::End(PressEnd::Release)).unwrap();

    hub.reset(&id).unwrap();
    camera.release(1);
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::Applied {
            device: id.clone(),
            payload: constraints(&[(Property::Pan, 0.0), (Property::Tilt, 0.0), (Property::Zoom, 100.0)]),
        }
    );

    hub.preset(&id, slot, PressPhase::Start).unwrap();
    sleep(Duration::from_millis(200)).await;
    hub.preset(&id, slot, PressPhase::End(PressEnd::Release)).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::PresetLoaded { device: id.clone(), slot }
    );
    camera.release(1);
    let recalled = constraints(&[(Property::Pan, 10.0), (Property::Tilt, 10.0), (Property::Zoom, 150.0)]);
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::Applied { device: id.clone(), payload: recalled.clone() }
    );

    assert_eq!(camera.calls().len(), 3);
    assert_eq!(camera.calls().last(), Some(&recalled));
    assert_eq!(camera.max_outstanding(), 1);
}

#[tokio::test]
async fn camera_without_controls_gets_an_empty_surface() {
    let hub = HubHandle::spawn(None);
    let bare: Arc<dyn PtzDevice> = Arc::new(GatedCamera::new("bare", DeviceCapabilities::default()));

    let descriptor = hub.register(bare).await.unwrap();
    assert!(descriptor.controls.is_empty());
    assert_eq!(descriptor.preset_slots, 0);
    assert!(hub.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn descriptor_lists_every_control() {
    let hub = HubHandle::spawn(None);
    let camera: Arc<dyn PtzDevice> = Arc::new(SimulatedCamera::standard("cam", "Desk", Duration::ZERO));

    let descriptor = hub.register(camera).await.unwrap();
    let properties: Vec<Property> = descriptor.controls.iter().map(|c| c.property).collect();
    assert_eq!(properties, vec![Property::Pan, Property::Tilt, Property::Zoom]);
    assert_eq!(descriptor.preset_slots, 3);
    assert_eq!(descriptor.label, "Desk");
}

#[tokio::test(start_paused = true)]
async fn unregistered_device_outcome_is_discarded() {
    let hub = HubHandle::spawn(None);
    let mut events = hub.subscribe();
    let (camera, id) = gated(&hub, GatedCamera::pan_only("cam")).await;

    hold_for(&hub, &id, Property::Pan, Direction::Increase, 1).await;
    hub.unregister(&id).await.unwrap();
    camera.release(1);
    sleep(Duration::from_millis(100)).await;

    assert!(events.try_recv().is_err());
    assert_eq!(
        hub.unregister(&id).await,
        Err(HubError::UnknownDevice(id.clone()))
    );
}

#[tokio::test(start_paused = true)]
async fn re_registration_replaces_the_surface() {
    let hub = HubHandle::spawn(None);
    let mut events = hub.subscribe();
    let (old, id) = gated(&hub, GatedCamera::pan_only("cam")).await;

    hold_for(&hub, &id, Property::Pan, Direction::Increase, 1).await;
    assert!(surface(&hub, &id).await.in_flight);

    let (new, same_id) = gated(&hub, GatedCamera::pan_only("cam")).await;
    assert_eq!(same_id, id);
    let fresh = surface(&hub, &id).await;
    assert!(!fresh.in_flight);
    assert_eq!(property(&hub, &id, Property::Pan).await.desired, 0.0);

    // the old camera's outcome no longer has a surface to land on
    old.release(1);
    sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());

    hold_for(&hub, &id, Property::Pan, Direction::Increase, 1).await;
    new.release(1);
    assert_eq!(
        next_event(&mut events).await,
        HubEvent::Applied { device: id.clone(), payload: pan(10.0) }
    );
    assert_eq!(new.calls(), vec![pan(10.0)]);
}

#[tokio::test]
async fn shutdown_closes_the_hub() {
    let hub = HubHandle::spawn(None);
    hub.shutdown().unwrap();
    hub.closed().await;
    assert_eq!(hub.snapshot().await, Err(HubError::ChannelClosed));
}
