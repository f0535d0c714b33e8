//! Convergence of desired state onto the hardware
//!
//! [`Reconciler`] keeps at most one apply outstanding per device and re-issues
//! as soon as an apply completes while the desired state has moved on.
//! [`InFlightTable`] is the busy marker behind that guarantee.

pub mod in_flight;
pub mod reconciler;

pub use in_flight::InFlightTable;
pub use reconciler::{ApplyOutcome, ReconcileStep, Reconciler, Settlement};
