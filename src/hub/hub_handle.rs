//! Hub Handle - Public API of the control hub
//!
//! Every operation is a message to the hub task. Press and steering calls
//! are fire-and-forget; registration and snapshots wait for the hub's reply.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info};

use super::control_hub::{ControlHub, HubCommand, PressPhase};
use super::surface::{SurfaceDescriptor, SurfaceSnapshot};
use crate::control::{Direction, Property, SlotIndex};
use crate::device::{ApplyError, Constraints, DeviceId, PtzDevice};
use crate::input::gesture::{DEFAULT_LONG_PRESS, DEFAULT_REPEAT_INTERVAL};
use crate::input::SteerDelta;

/// Timing of the on-screen gestures
///
/// Passed to [`HubHandle::spawn`]; `None` there means [`HubSettings::default`].
/// Loaded from the `[gesture]` section of the config file.
///
/// ```rust,ignore
/// // Slower presets for a touch screen
/// let settings = HubSettings {
///     long_press: Duration::from_millis(1500),
///     ..HubSettings::default()
/// };
/// let hub = HubHandle::spawn(Some(settings));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HubSettings {
    /// Press duration at which a preset press counts as long (save)
    ///
    /// The save fires the moment the threshold passes while the button is
    /// still held, and the release that follows does nothing. Shorter presses
    /// recall the slot on release.
    pub long_press: Duration,

    /// Cadence of steps while a minus/plus button is held
    ///
    /// The first step comes one cadence after the press. Every step moves the
    /// target by one hardware step, so this sets the sweep speed.
    pub repeat_interval: Duration,

    /// How long a preset button stays highlighted after a save
    pub ack: Duration,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            long_press: DEFAULT_LONG_PRESS,
            repeat_interval: DEFAULT_REPEAT_INTERVAL,
            ack: Duration::from_millis(300),
        }
    }
}

/// Errors returned by [`HubHandle`] calls
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HubError {
    /// The hub task has stopped
    ///
    /// Happens after [`HubHandle::shutdown`] or once every handle was dropped.
    /// Commands sent from then on are lost; callers should stop sending.
    #[error("Control hub is not running")]
    ChannelClosed,

    /// No surface is registered under this id
    ///
    /// Returned by [`HubHandle::unregister`]. Press commands for unknown ids
    /// are only logged, since they are fire-and-forget.
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),
}

/// Things that happened inside the hub, for observers such as the UI log
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Applied {
        device: DeviceId,
        payload: Constraints,
    },
    ApplyFailed {
        device: DeviceId,
        payload: Constraints,
        error: ApplyError,
    },
    PresetSaved {
        device: DeviceId,
        slot: SlotIndex,
    },
    PresetLoaded {
        device: DeviceId,
        slot: SlotIndex,
    },
}

/// Cloneable handle to a running [`ControlHub`]
///
/// The hub stops once every handle is dropped or [`HubHandle::shutdown`] is called.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    surfaces: watch::Receiver<Vec<SurfaceSnapshot>>,
    events: broadcast::Sender<HubEvent>,
}

impl HubHandle {
    pub fn spawn(settings: Option<HubSettings>) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Spawning control hub with settings: {:?}", settings);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (surface_tx, surface_rx) = watch::channel(Vec::new());
        let (event_tx, _) = broadcast::channel(256);

        let hub = ControlHub::new(settings, command_rx, surface_tx, event_tx.clone());
        let task_handle = tokio::spawn(hub.run());
        debug!("Control hub task spawned with handle: {:?}", task_handle);

        Self {
            commands: command_tx,
            surfaces: surface_rx,
            events: event_tx,
        }
    }

    fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .map_err(|_| HubError::ChannelClosed)
    }

    /// Opens a control surface for `device`
    ///
    /// Registering an id that is already known replaces the old surface.
    pub async fn register(&self, device: Arc<dyn PtzDevice>) -> Result<SurfaceDescriptor, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Register { device, reply })?;
        response.await.map_err(|_| HubError::ChannelClosed)
    }

    pub async fn unregister(&self, device: &DeviceId) -> Result<(), HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Unregister {
            device: device.clone(),
            reply,
        })?;
        if response.await.map_err(|_| HubError::ChannelClosed)? {
            Ok(())
        } else {
            Err(HubError::UnknownDevice(device.clone()))
        }
    }

    /// Press or release of a minus/plus button
    pub fn hold(
        &self,
        device: &DeviceId,
        property: Property,
        direction: Direction,
        phase: PressPhase,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Hold {
            device: device.clone(),
            property,
            direction,
            phase,
        })
    }

    /// Press or release of a preset button; short loads, long saves
    pub fn preset(&self, device: &DeviceId, slot: SlotIndex, phase: PressPhase) -> Result<(), HubError> {
        self.send(HubCommand::Preset {
            device: device.clone(),
            slot,
            phase,
        })
    }

    pub fn reset(&self, device: &DeviceId) -> Result<(), HubError> {
        self.send(HubCommand::Reset {
            device: device.clone(),
        })
    }

    /// One gamepad tick worth of movement, applied to every camera
    pub fn steer(&self, deltas: Vec<SteerDelta>) -> Result<(), HubError> {
        self.send(HubCommand::Steer(deltas))
    }

    pub async fn snapshot(&self) -> Result<Vec<SurfaceSnapshot>, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Snapshot { reply })?;
        response.await.map_err(|_| HubError::ChannelClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// Snapshots of every surface, updated after each step of the hub
    pub fn surfaces(&self) -> watch::Receiver<Vec<SurfaceSnapshot>> {
        self.surfaces.clone()
    }

    /// Resolves once the hub task has stopped
    pub async fn closed(&self) {
        self.commands.closed().await
    }

    pub fn shutdown(&self) -> Result<(), HubError> {
        info!("Shutting down control hub");
        self.send(HubCommand::Shutdown)
    }
}
