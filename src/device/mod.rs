//! Camera device boundary
//!
//! Everything the control core needs from a camera: a capability query taken
//! once when the device is opened, and an asynchronous apply operation that
//! moves the hardware to a set of target values.
//!
//! Discovery of cameras is not handled here. Whoever opens a device wraps it in
//! an `Arc<dyn PtzDevice>` and registers it with the hub.

pub mod simulated;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

use crate::control::Property;

pub use simulated::SimulatedCamera;

/// Stable identity of a registered camera
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hardware range of a single property
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capability {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Result of the capability/settings query
///
/// A property missing from `ranges` is not controllable on this device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceCapabilities {
    ranges: BTreeMap<Property, Capability>,
    values: BTreeMap<Property, f64>,
}

impl DeviceCapabilities {
    pub fn insert(&mut self, property: Property, capability: Capability, value: Option<f64>) {
        self.ranges.insert(property, capability);
        match value {
            Some(value) => {
                self.values.insert(property, value);
            }
            None => {
                self.values.remove(&property);
            }
        }
    }

    pub fn get(&self, property: Property) -> Option<&Capability> {
        self.ranges.get(&property)
    }

    /// Value reported when the device was opened
    pub fn value(&self, property: Property) -> Option<f64> {
        self.values.get(&property).copied()
    }
}

/// Target values sent to the hardware in one apply call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints(BTreeMap<Property, f64>);

impl Constraints {
    pub fn get(&self, property: Property) -> Option<f64> {
        self.0.get(&property).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, f64)> + '_ {
        self.0.iter().map(|(property, value)| (*property, *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Property, f64)> for Constraints {
    fn from_iter<I: IntoIterator<Item = (Property, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (property, value)) in self.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", property, value)?;
        }
        write!(f, "}}")
    }
}

/// Reasons the hardware refused or lost an apply
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ApplyError {
    #[error("Constraint rejected: {0}")]
    Rejected(String),

    #[error("Property not supported by device: {0}")]
    Unsupported(Property),

    #[error("Device disconnected")]
    Disconnected,
}

/// A camera whose pan, tilt or zoom can be driven
///
/// `apply` may be slow and may fail. The reconciler never calls it twice
/// concurrently for the same device.
#[async_trait]
pub trait PtzDevice: Send + Sync {
    fn id(&self) -> &DeviceId;

    fn label(&self) -> &str;

    fn capabilities(&self) -> DeviceCapabilities;

    async fn apply(&self, constraints: &Constraints) -> Result<(), ApplyError>;
}
