use gilrs::{Axis, Button, Event, EventType, Gamepad, Gilrs};
use tracing::{debug, error, info, warn};

/// State of one connected controller at the moment it was sampled
///
/// Stick axes are in [-1, 1] with +x to the right and +y downwards.
/// Triggers are in [0, 1].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PadSnapshot {
    pub name: String,
    pub stick_x: f32,
    pub stick_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected(String),
    Disconnected(String),
}

/// Errors that end gamepad input
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    /// The gamepad backend could not be opened
    ///
    /// Usually a missing input device permission or no supported backend on
    /// this platform. The application keeps running without gamepad input.
    #[error("Failed to initialize gamepad input: {0}")]
    InitializationError(String),

    /// The control hub stopped, so there is nothing left to steer
    ///
    /// Ends the poll task; it is not restarted.
    #[error("Control hub is gone")]
    HubClosed,
}

/// Where the poller gets controller state from
///
/// Axis changes are not pushed; the poller samples [`GamepadSource::connected`]
/// once per refresh tick after draining pending connection events.
pub trait GamepadSource: Send {
    fn drain_events(&mut self) -> Vec<ConnectionEvent>;

    /// Connected controllers in discovery order
    fn connected(&self) -> Vec<PadSnapshot>;
}

/// [`GamepadSource`] backed by gilrs
pub struct GilrsSource {
    gilrs: Gilrs,
}

impl GilrsSource {
    pub fn new() -> Result<Self, PollerError> {
        info!("Initializing gilrs controller interface");
        match Gilrs::new() {
            Ok(gilrs) => {
                info!("Successfully initialized gilrs");
                Ok(Self { gilrs })
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                Err(PollerError::InitializationError(e.to_string()))
            }
        }
    }
}

impl GamepadSource for GilrsSource {
    fn drain_events(&mut self) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        // next_event also folds axis/button changes into the cached gamepad state
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            let name = self.gilrs.gamepad(id).name().to_string();
            match event {
                EventType::Connected => {
                    info!("Gamepad connected: {} ({})", name, id);
                    events.push(ConnectionEvent::Connected(name));
                }
                EventType::Disconnected => {
                    warn!("Gamepad disconnected: {} ({})", name, id);
                    events.push(ConnectionEvent::Disconnected(name));
                }
                _ => {}
            }
        }
        events
    }

    fn connected(&self) -> Vec<PadSnapshot> {
        self.gilrs
            .gamepads()
            .filter(|(_, gamepad)| gamepad.is_connected())
            .map(|(_, gamepad)| snapshot(&gamepad))
            .collect()
    }
}

fn snapshot(gamepad: &Gamepad<'_>) -> PadSnapshot {
    let pad = PadSnapshot {
        name: gamepad.name().to_string(),
        stick_x: gamepad.value(Axis::LeftStickX),
        // gilrs reports +y as up
        stick_y: -gamepad.value(Axis::LeftStickY),
        left_trigger: trigger(gamepad, Button::LeftTrigger2, Axis::LeftZ),
        right_trigger: trigger(gamepad, Button::RightTrigger2, Axis::RightZ),
    };
    debug!("Sampled gamepad: {:?}", pad);
    pad
}

// Analog triggers show up as a button value on most mappings, as a Z axis on some
fn trigger(gamepad: &Gamepad<'_>, button: Button, axis: Axis) -> f32 {
    gamepad
        .button_data(button)
        .map(|data| data.value())
        .unwrap_or_else(|| gamepad.value(axis).max(0.0))
}

#[cfg(test)]
pub mod scripted {
    //! Source whose controllers are set by the test

    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Script {
        pads: Vec<PadSnapshot>,
        events: Vec<ConnectionEvent>,
    }

    #[derive(Clone, Default)]
    pub struct ScriptedSource {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedSource {
        pub fn connect(&self, pad: PadSnapshot) {
            let mut script = self.script.lock().unwrap();
            script.events.push(ConnectionEvent::Connected(pad.name.clone()));
            script.pads.push(pad);
        }

        pub fn disconnect_all(&self) {
            let mut script = self.script.lock().unwrap();
            let names: Vec<String> = script.pads.drain(..).map(|pad| pad.name).collect();
            script
                .events
                .extend(names.into_iter().map(ConnectionEvent::Disconnected));
        }

        /// Replaces the sampled state of the first controller
        pub fn set_first(&self, pad: PadSnapshot) {
            let mut script = self.script.lock().unwrap();
            match script.pads.first_mut() {
                Some(first) => *first = pad,
                None => script.pads.push(pad),
            }
        }
    }

    impl GamepadSource for ScriptedSource {
        fn drain_events(&mut self) -> Vec<ConnectionEvent> {
            std::mem::take(&mut self.script.lock().unwrap().events)
        }

        fn connected(&self) -> Vec<PadSnapshot> {
            self.script.lock().unwrap().pads.clone()
        }
    }
}
