use statum::{machine, state};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::gamepad_source::{ConnectionEvent, GamepadSource, PadSnapshot, PollerError};
use crate::control::Property;
use crate::hub::HubHandle;

/// Configuration of the gamepad poller
///
/// Loaded from the `[gamepad]` section of the config file and passed to
/// [`GamepadHandle::spawn`]; `None` there means the defaults below.
#[derive(Clone, Debug, PartialEq)]
pub struct GamepadSettings {
    /// Inputs with magnitude at or below this are ignored (0.0-1.0)
    ///
    /// Worn sticks rarely rest at exactly zero. Too small a value makes the
    /// camera creep while the stick is untouched.
    pub deadzone: f32,

    /// Sampling period while a controller is connected
    ///
    /// Each sample that leaves the deadzone moves the camera by one or two
    /// steps, so this also sets the steering speed.
    pub refresh_interval: Duration,

    /// How often to look for a controller while none is connected
    ///
    /// Bounds how long a newly plugged-in controller waits before it steers.
    pub idle_scan_interval: Duration,

    /// Stick right pans the camera left when set
    pub invert_pan: bool,

    /// Stick down tilts the camera up when set
    pub invert_tilt: bool,
}

impl Default for GamepadSettings {
    fn default() -> Self {
        Self {
            deadzone: 0.1,
            refresh_interval: Duration::from_millis(16),
            idle_scan_interval: Duration::from_millis(250),
            invert_pan: true,
            invert_tilt: true,
        }
    }
}

/// Movement of one property in units of its step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteerDelta {
    pub property: Property,
    pub units: f64,
}

/// Turns one controller sample into step deltas
///
/// Stick x drives pan, stick y drives tilt, the right trigger zooms in and the
/// left trigger zooms out. Each input above the deadzone moves by
/// `clamp(|input|, 1, 2)` steps in the direction of its sign.
pub fn steering_deltas(pad: &PadSnapshot, settings: &GamepadSettings) -> Vec<SteerDelta> {
    let pan = if settings.invert_pan { -pad.stick_x } else { pad.stick_x };
    let tilt = if settings.invert_tilt { -pad.stick_y } else { pad.stick_y };
    let inputs = [
        (Property::Pan, pan),
        (Property::Tilt, tilt),
        (Property::Zoom, pad.right_trigger),
        (Property::Zoom, -pad.left_trigger),
    ];

    inputs
        .into_iter()
        .filter(|(_, input)| input.abs() > settings.deadzone)
        .map(|(property, input)| SteerDelta {
            property,
            units: f64::from(input.abs().clamp(1.0, 2.0)) * f64::from(input.signum()),
        })
        .collect()
}

// Poller states: looking for a controller, or sampling one every refresh
#[state]
#[derive(Debug, Clone)]
pub enum PollerState {
    Scanning,
    Polling,
}

#[machine]
pub struct GamepadPoller<S: PollerState> {
    source: Box<dyn GamepadSource>,
    settings: GamepadSettings,
    hub: HubHandle,
    polling: watch::Sender<bool>,
    stop: CancellationToken,
}

impl<S: PollerState> GamepadPoller<S> {
    fn drain_connection_events(&mut self) {
        for event in self.source.drain_events() {
            match event {
                ConnectionEvent::Connected(name) => debug!("Connection event: {} connected", name),
                ConnectionEvent::Disconnected(name) => debug!("Connection event: {} disconnected", name),
            }
        }
    }
}

impl GamepadPoller<Scanning> {
    pub fn create(
        source: Box<dyn GamepadSource>,
        settings: Option<GamepadSettings>,
        hub: HubHandle,
        polling: watch::Sender<bool>,
        stop: CancellationToken,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating gamepad poller with settings: {:?}", settings);
        Self::new(source, settings, hub, polling, stop)
    }

    /// Waits until a controller is connected; `Ok(None)` when asked to stop
    pub async fn wait_for_controller(mut self) -> Result<Option<GamepadPoller<Polling>>, PollerError> {
        let mut scan = interval(self.settings.idle_scan_interval);
        scan.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => return Ok(None),
                _ = self.hub.closed() => return Err(PollerError::HubClosed),
                _ = scan.tick() => {}
            }

            self.drain_connection_events();
            if let Some(pad) = self.source.connected().first() {
                info!("Gamepad {} available, starting poll loop", pad.name);
                self.polling.send_replace(true);
                let polling: GamepadPoller<Polling> = self.transition();
                return Ok(Some(polling));
            }
        }
    }
}

impl GamepadPoller<Polling> {
    /// Samples the first controller every refresh until none is left
    pub async fn run_until_disconnected(mut self) -> Result<Option<GamepadPoller<Scanning>>, PollerError> {
        let mut refresh = interval(self.settings.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => {
                    self.polling.send_replace(false);
                    return Ok(None);
                }
                _ = refresh.tick() => {}
            }

            self.drain_connection_events();
            let pads = self.source.connected();
            let Some(pad) = pads.first() else {
                info!("Last gamepad disconnected, stopping poll loop");
                self.polling.send_replace(false);
                let scanning: GamepadPoller<Scanning> = self.transition();
                return Ok(Some(scanning));
            };

            let deltas = steering_deltas(pad, &self.settings);
            if deltas.is_empty() {
                continue;
            }
            debug!("Gamepad {} input {:?}: {:?}", pad.name, pad, deltas);
            self.hub.steer(deltas).map_err(|_| PollerError::HubClosed)?;
        }
    }
}

async fn run_poller_loop(mut poller: GamepadPoller<Scanning>) -> Result<(), PollerError> {
    info!("Gamepad poller waiting for a controller");
    loop {
        let Some(polling) = poller.wait_for_controller().await? else {
            return Ok(());
        };
        let Some(scanning) = polling.run_until_disconnected().await? else {
            return Ok(());
        };
        poller = scanning;
    }
}

/// Owner of the single gamepad poll task
///
/// Connects and disconnects only move the task between scanning and polling;
/// there is never a second poll loop for the same handle.
pub struct GamepadHandle {
    polling: watch::Receiver<bool>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl GamepadHandle {
    pub fn spawn(source: Box<dyn GamepadSource>, settings: Option<GamepadSettings>, hub: HubHandle) -> Self {
        info!("Spawning gamepad poller with settings: {:?}", settings);
        let (polling_tx, polling) = watch::channel(false);
        let stop = CancellationToken::new();
        let poller = GamepadPoller::create(source, settings, hub, polling_tx, stop.clone());

        let task = tokio::spawn(async move {
            match run_poller_loop(poller).await {
                Ok(()) => info!("Gamepad poller stopped"),
                Err(e) => error!("Gamepad poller terminated with error: {}", e),
            }
        });

        Self { polling, stop, task }
    }

    pub fn is_polling(&self) -> bool {
        *self.polling.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.polling.clone()
    }

    pub async fn shutdown(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            error!("Gamepad poller task failed: {}", e);
        }
    }
}
