//! Input producers
//!
//! Everything that turns operator interaction into desired-value changes.
//!
//! 1. [`gesture`] - Short/long press classification and repeat-while-held timers
//! 2. [`gamepad_source`] - Connected controllers and connect/disconnect signals (gilrs)
//! 3. [`gamepad_poller`] - Per-refresh sampling of the first controller into steering deltas
//!
//! # Data Flow
//!
//! ```text
//! egui press/release ──► HubHandle ──► PressClassifier / HoldRepeat ──┐
//!                                                                     ├──► ControlHub
//! gilrs ──► GamepadSource ──► GamepadPoller ──► SteerDelta ───────────┘
//! ```

pub mod gamepad_poller;
pub mod gamepad_source;
pub mod gesture;

pub use gamepad_poller::{steering_deltas, GamepadHandle, GamepadSettings, SteerDelta};
pub use gamepad_source::{ConnectionEvent, GamepadSource, GilrsSource, PadSnapshot, PollerError};
pub use gesture::{Gesture, HoldRepeat, PressClassifier, PressEnd};
