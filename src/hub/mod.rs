//! Control hub - owner of every camera's control surface
//!
//! All input producers end up here:
//!
//! 1. [`hub_handle`] - Cloneable API: register cameras, forward presses, steer
//! 2. [`control_hub`] - The actor task processing commands, timers and apply outcomes
//! 3. [`surface`] - Per-camera interaction state and the descriptors handed to the UI
//!
//! # Architecture
//!
//! ```text
//! egui ─────┐
//!           ├──► HubHandle ──► ControlHub ──► ControlSurface ──► DeviceState
//! gamepad ──┘                      │
//!                                  └──► Reconciler ──► PtzDevice::apply
//! ```
//!
//! Every producer first writes the desired value, then asks the reconciler to
//! converge that one device. Nothing reconciles implicitly on write.

pub mod control_hub;
pub mod hub_handle;
pub mod surface;

#[cfg(test)]
mod tests;

pub use control_hub::{ControlHub, PressPhase};
pub use hub_handle::{HubError, HubEvent, HubHandle, HubSettings};
pub use surface::{
    ControlDescriptor, PresetSnapshot, PropertySnapshot, SurfaceDescriptor, SurfaceSnapshot,
};
