//! Control value store and preset manager
//!
//! Holds the per-device record of what each PTZ property currently is on the
//! hardware and what the operator wants it to be.
//!
//! 1. [`store`] - Per-property current/desired values with range clamping
//! 2. [`preset`] - Three saved snapshots per device, loadable into the desired state
//!
//! # Data Flow
//!
//! ```text
//! Input ──► propose / nudge ──► desired_value
//!                                    │
//!                              Reconciler diff ──► apply ──► confirm ──► current_value
//! ```
//!
//! Writing a desired value never triggers reconciliation by itself; the caller
//! decides when a batch of proposals is complete and reconciles once.

pub mod preset;
pub mod store;

pub use preset::{PresetBank, PresetError, PresetSlot, SlotIndex, PRESET_SLOTS};
pub use store::{ControlProperty, DeviceState, Direction, Property};
