use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::hub_handle::{HubEvent, HubSettings};
use super::surface::{ControlSurface, SurfaceDescriptor, SurfaceSnapshot};
use crate::control::{Direction, Property, SlotIndex};
use crate::device::{DeviceId, PtzDevice};
use crate::input::gesture::{Gesture, PressEnd};
use crate::input::SteerDelta;
use crate::reconcile::{ApplyOutcome, Reconciler, Settlement};

/// Edge of a press on an on-screen button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressPhase {
    Start,
    End(PressEnd),
}

pub(crate) enum HubCommand {
    Register {
        device: Arc<dyn PtzDevice>,
        reply: oneshot::Sender<SurfaceDescriptor>,
    },
    Unregister {
        device: DeviceId,
        reply: oneshot::Sender<bool>,
    },
    Hold {
        device: DeviceId,
        property: Property,
        direction: Direction,
        phase: PressPhase,
    },
    Preset {
        device: DeviceId,
        slot: SlotIndex,
        phase: PressPhase,
    },
    Reset {
        device: DeviceId,
    },
    Steer(Vec<SteerDelta>),
    Snapshot {
        reply: oneshot::Sender<Vec<SurfaceSnapshot>>,
    },
    Shutdown,
}

/// Messages from gesture timers; each carries the id of the interaction that armed it
#[derive(Debug)]
pub(crate) enum TimerEvent {
    HoldTick {
        device: DeviceId,
        property: Property,
        direction: Direction,
        hold: u64,
    },
    LongPress {
        device: DeviceId,
        slot: SlotIndex,
        press: u64,
    },
    AckExpired {
        device: DeviceId,
        slot: SlotIndex,
        ack: u64,
    },
}

/// The control hub
///
/// One task owns every surface, value store and the reconciler. Commands,
/// timer messages and apply outcomes are handled strictly one at a time, so
/// the check-and-set of the in-flight marker and every store write happen
/// without locks. Only the hardware apply runs elsewhere.
///
/// ```text
///  HubHandle ──commands──┐
///  gesture timers ───────┼──► ControlHub ──► Reconciler ──spawn──► PtzDevice::apply
///  apply outcomes ───────┘         │                                    │
///        ▲                         ├──► watch<Vec<SurfaceSnapshot>>     │
///        └─────────────────────────┼──► broadcast<HubEvent>             │
///                                  └────────────────────────────────────┘
/// ```
pub struct ControlHub {
    settings: HubSettings,
    surfaces: BTreeMap<DeviceId, ControlSurface>,
    reconciler: Reconciler,
    commands: mpsc::UnboundedReceiver<HubCommand>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    outcomes: mpsc::UnboundedReceiver<ApplyOutcome>,
    snapshots: watch::Sender<Vec<SurfaceSnapshot>>,
    events: broadcast::Sender<HubEvent>,
}

impl ControlHub {
    pub(crate) fn new(
        settings: HubSettings,
        commands: mpsc::UnboundedReceiver<HubCommand>,
        snapshots: watch::Sender<Vec<SurfaceSnapshot>>,
        events: broadcast::Sender<HubEvent>,
    ) -> Self {
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        Self {
            settings,
            surfaces: BTreeMap::new(),
            reconciler: Reconciler::new(outcome_tx),
            commands,
            timer_tx,
            timer_rx,
            outcomes,
            snapshots,
            events,
        }
    }

    pub async fn run(mut self) {
        info!("Control hub started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(HubCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(timer) = self.timer_rx.recv() => self.handle_timer(timer),
                Some(outcome) = self.outcomes.recv() => self.handle_outcome(outcome),
            }
            self.publish();
        }

        info!("Control hub stopped, closing {} surfaces", self.surfaces.len());
        self.surfaces.clear();
        self.publish();
    }

    fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { device, reply } => {
                let descriptor = self.register(device);
                if reply.send(descriptor).is_err() {
                    debug!("Register caller went away before the reply");
                }
            }
            HubCommand::Unregister { device, reply } => {
                let removed = self.surfaces.remove(&device).is_some();
                if removed {
                    info!("Unregistered {}", device);
                }
                let _ = reply.send(removed);
            }
            HubCommand::Hold {
                device,
                property,
                direction,
                phase,
            } => {
                let Some(surface) = self.surfaces.get_mut(&device) else {
                    warn!("Hold for unknown device {}", device);
                    return;
                };
                match phase {
                    PressPhase::Start => surface.start_hold(property, direction, &self.timer_tx),
                    PressPhase::End(how) => surface.end_hold(property, direction, how),
                }
            }
            HubCommand::Preset { device, slot, phase } => {
                let Some(surface) = self.surfaces.get_mut(&device) else {
                    warn!("Preset press for unknown device {}", device);
                    return;
                };
                match phase {
                    PressPhase::Start => surface.start_preset_press(slot, &self.timer_tx),
                    PressPhase::End(how) => {
                        if let Some(gesture) = surface.end_preset_press(slot, how) {
                            self.preset_gesture(&device, slot, gesture);
                        }
                    }
                }
            }
            HubCommand::Reset { device } => {
                let Some(surface) = self.surfaces.get_mut(&device) else {
                    warn!("Reset for unknown device {}", device);
                    return;
                };
                surface.reset();
                self.reconciler.reconcile(&surface.device, &surface.state);
            }
            HubCommand::Steer(deltas) => self.steer(&deltas),
            HubCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            HubCommand::Shutdown => {}
        }
    }

    fn handle_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::HoldTick {
                device,
                property,
                direction,
                hold,
            } => {
                if let Some(surface) = self.surfaces.get_mut(&device) {
                    if surface.hold_tick(property, direction, hold) {
                        self.reconciler.reconcile(&surface.device, &surface.state);
                    }
                }
            }
            TimerEvent::LongPress { device, slot, press } => {
                let gesture = self
                    .surfaces
                    .get_mut(&device)
                    .and_then(|surface| surface.long_press_elapsed(slot, press));
                if let Some(gesture) = gesture {
                    self.preset_gesture(&device, slot, gesture);
                }
            }
            TimerEvent::AckExpired { device, slot, ack } => {
                if let Some(surface) = self.surfaces.get_mut(&device) {
                    surface.clear_ack(slot, ack);
                }
            }
        }
    }

    fn handle_outcome(&mut self, outcome: ApplyOutcome) {
        let device = outcome.device.clone();
        let payload = outcome.payload.clone();
        let target = self
            .surfaces
            .get_mut(&device)
            .map(|surface| (&surface.device, &mut surface.state));

        let event = match self.reconciler.settle(outcome, target) {
            Settlement::Converged | Settlement::Redispatched(_) => HubEvent::Applied { device, payload },
            Settlement::Failed(error) => HubEvent::ApplyFailed {
                device,
                payload,
                error,
            },
            Settlement::Detached => return,
        };
        self.emit(event);
    }

    fn register(&mut self, device: Arc<dyn PtzDevice>) -> SurfaceDescriptor {
        let id = device.id().clone();
        let Some(surface) = ControlSurface::open(Arc::clone(&device), &self.settings) else {
            info!("{} ({}) has no pan, tilt or zoom control", id, device.label());
            return SurfaceDescriptor {
                device: id,
                label: device.label().to_string(),
                controls: Vec::new(),
                preset_slots: 0,
            };
        };

        let descriptor = surface.descriptor();
        if self.surfaces.insert(id.clone(), surface).is_some() {
            warn!("{} registered again, replacing its surface", id);
        }
        info!(
            "Registered {} ({}) with {} controls",
            id,
            descriptor.label,
            descriptor.controls.len()
        );
        descriptor
    }

    fn preset_gesture(&mut self, device: &DeviceId, slot: SlotIndex, gesture: Gesture) {
        let Some(surface) = self.surfaces.get_mut(device) else {
            return;
        };
        let event = match gesture {
            Gesture::Short => {
                surface.load_preset(slot);
                self.reconciler.reconcile(&surface.device, &surface.state);
                HubEvent::PresetLoaded {
                    device: device.clone(),
                    slot,
                }
            }
            Gesture::Long => {
                surface.save_preset(slot, &self.timer_tx);
                HubEvent::PresetSaved {
                    device: device.clone(),
                    slot,
                }
            }
        };
        self.emit(event);
    }

    fn steer(&mut self, deltas: &[SteerDelta]) {
        for surface in self.surfaces.values_mut() {
            let mut moved = false;
            for delta in deltas {
                moved |= surface.state.nudge(delta.property, delta.units).is_some();
            }
            if moved {
                self.reconciler.reconcile(&surface.device, &surface.state);
            }
        }
    }

    fn snapshot(&self) -> Vec<SurfaceSnapshot> {
        self.surfaces
            .values()
            .map(|surface| surface.snapshot(self.reconciler.is_in_flight(&surface.device)))
            .collect()
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    fn emit(&self, event: HubEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
