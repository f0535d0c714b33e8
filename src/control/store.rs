use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::device::{Capability, Constraints, DeviceCapabilities};

/// Controllable camera axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    Pan,
    Tilt,
    Zoom,
}

impl Property {
    pub const ALL: [Property; 3] = [Property::Pan, Property::Tilt, Property::Zoom];
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Pan => write!(f, "pan"),
            Property::Tilt => write!(f, "tilt"),
            Property::Zoom => write!(f, "zoom"),
        }
    }
}

/// Sign of a step for the minus/plus buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Decrease,
    Increase,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Decrease => -1.0,
            Direction::Increase => 1.0,
        }
    }
}

/// One property of one device
///
/// `current_value` is only written through [`DeviceState::confirm`] after the
/// hardware accepted a value; `desired_value` only through the clamping
/// proposal methods. Both stay inside `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlProperty {
    min: f64,
    max: f64,
    step: f64,
    initial_value: f64,
    current_value: f64,
    desired_value: f64,
}

impl ControlProperty {
    pub fn new(capability: &Capability, value: f64) -> Self {
        let (min, max) = if capability.min <= capability.max {
            (capability.min, capability.max)
        } else {
            (capability.max, capability.min)
        };
        let initial_value = clamp(value, min, max);

        Self {
            min,
            max,
            step: capability.step,
            initial_value,
            current_value: initial_value,
            desired_value: initial_value,
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn initial_value(&self) -> f64 {
        self.initial_value
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    pub fn desired_value(&self) -> f64 {
        self.desired_value
    }

    pub fn is_settled(&self) -> bool {
        self.desired_value == self.current_value
    }

    /// Stores `value` clamped to the property range and returns what was stored
    pub fn propose(&mut self, value: f64) -> f64 {
        self.desired_value = clamp(value, self.min, self.max);
        self.desired_value
    }

    /// Moves the desired value by `units` steps
    pub fn nudge(&mut self, units: f64) -> f64 {
        self.propose(self.desired_value + units * self.step)
    }

    fn confirm(&mut self, value: f64) {
        self.current_value = clamp(value, self.min, self.max);
    }
}

// NaN proposals collapse to the lower bound instead of poisoning the store
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.max(min).min(max)
    }
}

/// Every controllable property of a single device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    properties: BTreeMap<Property, ControlProperty>,
}

impl DeviceState {
    /// Builds the store from a capability query
    ///
    /// Properties without a capability entry are not controllable and are left out.
    pub fn from_capabilities(capabilities: &DeviceCapabilities) -> Self {
        let mut properties = BTreeMap::new();
        for property in Property::ALL {
            match capabilities.get(property) {
                Some(capability) => {
                    let value = capabilities.value(property).unwrap_or(0.0);
                    properties.insert(property, ControlProperty::new(capability, value));
                }
                None => debug!("Capability for {} absent, property not controllable", property),
            }
        }
        Self { properties }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn contains(&self, property: Property) -> bool {
        self.properties.contains_key(&property)
    }

    pub fn get(&self, property: Property) -> Option<&ControlProperty> {
        self.properties.get(&property)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, &ControlProperty)> {
        self.properties.iter().map(|(property, value)| (*property, value))
    }

    pub fn controllable(&self) -> impl Iterator<Item = Property> + '_ {
        self.properties.keys().copied()
    }

    /// Proposes a new desired value; `None` if the property is not controllable
    pub fn propose(&mut self, property: Property, value: f64) -> Option<f64> {
        self.properties
            .get_mut(&property)
            .map(|control| control.propose(value))
    }

    pub fn nudge(&mut self, property: Property, units: f64) -> Option<f64> {
        self.properties
            .get_mut(&property)
            .map(|control| control.nudge(units))
    }

    /// Desired values of every property that is not settled
    pub fn diff(&self) -> Constraints {
        self.properties
            .iter()
            .filter(|(_, control)| !control.is_settled())
            .map(|(property, control)| (*property, control.desired_value))
            .collect()
    }

    pub fn is_settled(&self) -> bool {
        self.properties.values().all(ControlProperty::is_settled)
    }

    /// Records a value the hardware accepted
    pub(crate) fn confirm(&mut self, property: Property, value: f64) {
        if let Some(control) = self.properties.get_mut(&property) {
            control.confirm(value);
        }
    }
}
