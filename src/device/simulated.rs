use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ApplyError, Capability, Constraints, DeviceCapabilities, DeviceId, PtzDevice};
use crate::control::Property;

/// In-process PTZ camera with a fixed apply latency
///
/// Rejects values outside the advertised range and properties it does not
/// have. `fail_next` makes the following applies fail, driven by the
/// `fail_first` camera setting.
pub struct SimulatedCamera {
    id: DeviceId,
    label: String,
    capabilities: DeviceCapabilities,
    latency: Duration,
    position: Mutex<BTreeMap<Property, f64>>,
    pending_failures: AtomicU32,
    applied: AtomicU32,
}

impl SimulatedCamera {
    pub fn new(
        id: DeviceId,
        label: impl Into<String>,
        capabilities: DeviceCapabilities,
        latency: Duration,
    ) -> Self {
        let position = Property::ALL
            .into_iter()
            .filter(|property| capabilities.get(*property).is_some())
            .map(|property| (property, capabilities.value(property).unwrap_or(0.0)))
            .collect();

        Self {
            id,
            label: label.into(),
            capabilities,
            latency,
            position: Mutex::new(position),
            pending_failures: AtomicU32::new(0),
            applied: AtomicU32::new(0),
        }
    }

    /// Camera with pan, tilt and zoom in typical UVC units
    pub fn standard(id: &str, label: &str, latency: Duration) -> Self {
        let mut caps = DeviceCapabilities::default();
        caps.insert(
            Property::Pan,
            Capability { min: -180_000.0, max: 180_000.0, step: 3_600.0 },
            Some(0.0),
        );
        caps.insert(
            Property::Tilt,
            Capability { min: -180_000.0, max: 180_000.0, step: 3_600.0 },
            Some(0.0),
        );
        caps.insert(
            Property::Zoom,
            Capability { min: 100.0, max: 400.0, step: 10.0 },
            Some(100.0),
        );
        Self::new(DeviceId::new(id), label, caps, latency)
    }

    /// Makes the next `count` applies fail
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Where the simulated motors currently are
    pub fn position(&self, property: Property) -> Option<f64> {
        match self.position.lock() {
            Ok(position) => position.get(&property).copied(),
            Err(poisoned) => poisoned.into_inner().get(&property).copied(),
        }
    }

    /// Number of applies that succeeded
    pub fn applied_count(&self) -> u32 {
        self.applied.load(Ordering::SeqCst)
    }

    fn validate(&self, constraints: &Constraints) -> Result<(), ApplyError> {
        for (property, value) in constraints.iter() {
            let capability = self
                .capabilities
                .get(property)
                .ok_or(ApplyError::Unsupported(property))?;
            if !(capability.min..=capability.max).contains(&value) {
                return Err(ApplyError::Rejected(format!(
                    "{} = {} outside [{}, {}]",
                    property, value, capability.min, capability.max
                )));
            }
        }
        Ok(())
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PtzDevice for SimulatedCamera {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities.clone()
    }

    async fn apply(&self, constraints: &Constraints) -> Result<(), ApplyError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.take_failure() {
            warn!("Simulated camera {} rejecting {}", self.id, constraints);
            return Err(ApplyError::Rejected("simulated failure".to_string()));
        }
        self.validate(constraints)?;

        let mut position = match self.position.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (property, value) in constraints.iter() {
            position.insert(property, value);
        }
        self.applied.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated camera {} moved to {}", self.id, constraints);
        Ok(())
    }
}
