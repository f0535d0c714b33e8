use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use super::store::{DeviceState, Property};

/// Number of preset buttons per device
pub const PRESET_SLOTS: usize = 3;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PresetError {
    #[error("Preset slot {0} out of range (1..={max})", max = PRESET_SLOTS)]
    SlotOutOfRange(u8),
}

/// One-based preset slot number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub fn new(number: u8) -> Result<Self, PresetError> {
        if (1..=PRESET_SLOTS as u8).contains(&number) {
            Ok(Self(number))
        } else {
            Err(PresetError::SlotOutOfRange(number))
        }
    }

    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (1..=PRESET_SLOTS as u8).map(SlotIndex)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn position(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored values of one preset; absent properties load as 0
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetSlot {
    pub values: BTreeMap<Property, f64>,
    pub saved_at: Option<DateTime<Local>>,
}

impl PresetSlot {
    pub fn value(&self, property: Property) -> Option<f64> {
        self.values.get(&property).copied()
    }
}

/// Preset slots of one device
#[derive(Debug, Clone)]
pub struct PresetBank {
    slots: [PresetSlot; PRESET_SLOTS],
}

impl PresetBank {
    /// Creates the bank with slot 1 holding the device's values at open time
    pub fn new(state: &DeviceState) -> Self {
        let mut slots: [PresetSlot; PRESET_SLOTS] = Default::default();
        slots[0].values = state
            .iter()
            .map(|(property, control)| (property, control.initial_value()))
            .collect();
        Self { slots }
    }

    pub fn slot(&self, slot: SlotIndex) -> &PresetSlot {
        &self.slots[slot.position()]
    }

    /// Copies every current value into the slot
    pub fn save(&mut self, slot: SlotIndex, state: &DeviceState) -> &PresetSlot {
        let now = Local::now();
        let target = &mut self.slots[slot.position()];
        for (property, control) in state.iter() {
            target.values.insert(property, control.current_value());
        }
        target.saved_at = Some(now);
        info!(
            "Preset {} saved at {}: {:?}",
            slot,
            now.format("%H:%M:%S.%3f"),
            target.values
        );
        target
    }

    /// Proposes the stored values as the new desired state
    ///
    /// Only writes the store. The caller reconciles once for the whole batch.
    pub fn load(&self, slot: SlotIndex, state: &mut DeviceState) {
        let stored = &self.slots[slot.position()];
        let properties: Vec<Property> = state.controllable().collect();
        for property in properties {
            let value = stored.value(property).unwrap_or(0.0);
            state.propose(property, value);
        }
        debug!("Preset {} loaded into desired state", slot);
    }
}
