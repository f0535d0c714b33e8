use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;
use tracing::{debug, info};

use super::control_hub::TimerEvent;
use super::hub_handle::HubSettings;
use crate::control::{DeviceState, Direction, PresetBank, Property, SlotIndex, PRESET_SLOTS};
use crate::device::{DeviceId, PtzDevice};
use crate::input::gesture::{send_after, Gesture, HoldRepeat, PressClassifier, PressEnd};

/// Static description of a control, fixed at registration
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDescriptor {
    pub property: Property,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub initial: f64,
}

/// What a front end needs to lay out the controls of one camera
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDescriptor {
    pub device: DeviceId,
    pub label: String,
    pub controls: Vec<ControlDescriptor>,
    /// 0 when the camera has nothing to control
    pub preset_slots: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySnapshot {
    pub property: Property,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub current: f64,
    pub desired: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresetSnapshot {
    pub slot: SlotIndex,
    pub saved_at: Option<DateTime<Local>>,
    /// True for a short while after a save
    pub acknowledged: bool,
}

/// Live view of one camera, published after every hub step
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSnapshot {
    pub device: DeviceId,
    pub label: String,
    pub properties: Vec<PropertySnapshot>,
    pub presets: Vec<PresetSnapshot>,
    pub in_flight: bool,
}

struct Ack {
    id: u64,
    _timer: DropGuard,
}

/// Interaction state of one registered camera
///
/// Owns the value store and preset bank plus every gesture timer started for
/// this camera. Dropping the surface stops all of them.
pub struct ControlSurface {
    pub(super) device: Arc<dyn PtzDevice>,
    pub(super) state: DeviceState,
    id: DeviceId,
    label: String,
    settings: HubSettings,
    presets: PresetBank,
    preset_presses: [PressClassifier; PRESET_SLOTS],
    holds: HashMap<(Property, Direction), HoldRepeat>,
    acks: [Option<Ack>; PRESET_SLOTS],
    next_ack: u64,
}

impl ControlSurface {
    /// `None` when the camera exposes none of pan, tilt or zoom
    pub fn open(device: Arc<dyn PtzDevice>, settings: &HubSettings) -> Option<Self> {
        let state = DeviceState::from_capabilities(&device.capabilities());
        if state.is_empty() {
            return None;
        }

        let presets = PresetBank::new(&state);
        let preset_presses = std::array::from_fn(|_| PressClassifier::new(settings.long_press));
        Some(Self {
            id: device.id().clone(),
            label: device.label().to_string(),
            device,
            state,
            settings: settings.clone(),
            presets,
            preset_presses,
            holds: HashMap::new(),
            acks: Default::default(),
            next_ack: 0,
        })
    }

    pub fn descriptor(&self) -> SurfaceDescriptor {
        SurfaceDescriptor {
            device: self.id.clone(),
            label: self.label.clone(),
            controls: self
                .state
                .iter()
                .map(|(property, control)| ControlDescriptor {
                    property,
                    min: control.min(),
                    max: control.max(),
                    step: control.step(),
                    initial: control.initial_value(),
                })
                .collect(),
            preset_slots: PRESET_SLOTS,
        }
    }

    pub fn snapshot(&self, in_flight: bool) -> SurfaceSnapshot {
        SurfaceSnapshot {
            device: self.id.clone(),
            label: self.label.clone(),
            properties: self
                .state
                .iter()
                .map(|(property, control)| PropertySnapshot {
                    property,
                    min: control.min(),
                    max: control.max(),
                    step: control.step(),
                    current: control.current_value(),
                    desired: control.desired_value(),
                })
                .collect(),
            presets: SlotIndex::all()
                .map(|slot| PresetSnapshot {
                    slot,
                    saved_at: self.presets.slot(slot).saved_at,
                    acknowledged: self.acks[slot.position()].is_some(),
                })
                .collect(),
            in_flight,
        }
    }

    /// Starts repeating steps while the minus/plus button is held
    pub(crate) fn start_hold(
        &mut self,
        property: Property,
        direction: Direction,
        timers: &mpsc::UnboundedSender<TimerEvent>,
    ) {
        if !self.state.contains(property) {
            debug!("{} has no {} control, ignoring hold", self.id, property);
            return;
        }
        let cadence = self.settings.repeat_interval;
        let device = self.id.clone();
        let hold = self
            .holds
            .entry((property, direction))
            .or_insert_with(|| HoldRepeat::new(cadence));
        hold.press(timers, move |hold| TimerEvent::HoldTick {
            device: device.clone(),
            property,
            direction,
            hold,
        });
    }

    pub fn end_hold(&mut self, property: Property, direction: Direction, how: PressEnd) {
        if let Some(hold) = self.holds.get_mut(&(property, direction)) {
            hold.release(how);
        }
    }

    /// Applies one repeat step if `hold` is still the running hold
    pub fn hold_tick(&mut self, property: Property, direction: Direction, hold: u64) -> bool {
        let current = self
            .holds
            .get(&(property, direction))
            .is_some_and(|running| running.is_current(hold));
        if !current {
            debug!("Discarding stale hold tick {} for {} {}", hold, self.id, property);
            return false;
        }
        self.state.nudge(property, direction.sign()).is_some()
    }

    pub(crate) fn start_preset_press(&mut self, slot: SlotIndex, timers: &mpsc::UnboundedSender<TimerEvent>) {
        let device = self.id.clone();
        self.preset_presses[slot.position()].press(timers, move |press| TimerEvent::LongPress {
            device,
            slot,
            press,
        });
    }

    pub fn end_preset_press(&mut self, slot: SlotIndex, how: PressEnd) -> Option<Gesture> {
        self.preset_presses[slot.position()].release(how)
    }

    pub fn long_press_elapsed(&mut self, slot: SlotIndex, press: u64) -> Option<Gesture> {
        self.preset_presses[slot.position()].elapse(press)
    }

    /// Stores the current values in `slot` and raises its acknowledgment
    pub(crate) fn save_preset(&mut self, slot: SlotIndex, timers: &mpsc::UnboundedSender<TimerEvent>) {
        self.presets.save(slot, &self.state);

        self.next_ack += 1;
        let ack = self.next_ack;
        let expired = TimerEvent::AckExpired {
            device: self.id.clone(),
            slot,
            ack,
        };
        self.acks[slot.position()] = Some(Ack {
            id: ack,
            _timer: send_after(timers, self.settings.ack, expired),
        });
    }

    pub fn clear_ack(&mut self, slot: SlotIndex, ack: u64) {
        let entry = &mut self.acks[slot.position()];
        if entry.as_ref().is_some_and(|current| current.id == ack) {
            *entry = None;
        }
    }

    pub fn load_preset(&mut self, slot: SlotIndex) {
        self.presets.load(slot, &mut self.state);
    }

    /// Proposes 0 for every property; clamping may leave values unchanged
    pub fn reset(&mut self) {
        let properties: Vec<Property> = self.state.controllable().collect();
        for property in properties {
            self.state.propose(property, 0.0);
        }
        info!("Reset requested for {}", self.id);
    }
}
