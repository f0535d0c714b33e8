//! Test double that holds every apply until the test lets it finish

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

use super::{ApplyError, Capability, Constraints, DeviceCapabilities, DeviceId, PtzDevice};
use crate::control::Property;

pub struct GatedCamera {
    id: DeviceId,
    capabilities: DeviceCapabilities,
    gate: Semaphore,
    calls: Mutex<Vec<Constraints>>,
    failures: Mutex<VecDeque<ApplyError>>,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
}

impl GatedCamera {
    pub fn new(id: &str, capabilities: DeviceCapabilities) -> Self {
        Self {
            id: DeviceId::new(id),
            capabilities,
            gate: Semaphore::new(0),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            outstanding: AtomicUsize::new(0),
            max_outstanding: AtomicUsize::new(0),
        }
    }

    /// pan in [-100, 100], step 10, starting at 0
    pub fn pan_only(id: &str) -> Self {
        let mut caps = DeviceCapabilities::default();
        caps.insert(Property::Pan, Capability { min: -100.0, max: 100.0, step: 10.0 }, Some(0.0));
        Self::new(id, caps)
    }

    /// zoom in [100, 400], step 50, starting at 100
    pub fn zoom_only(id: &str) -> Self {
        let mut caps = DeviceCapabilities::default();
        caps.insert(Property::Zoom, Capability { min: 100.0, max: 400.0, step: 50.0 }, Some(100.0));
        Self::new(id, caps)
    }

    /// pan and tilt in [-100, 100], step 10, starting at 0; zoom as in [`GatedCamera::zoom_only`]
    pub fn three_axis(id: &str) -> Self {
        let mut caps = DeviceCapabilities::default();
        caps.insert(Property::Pan, Capability { min: -100.0, max: 100.0, step: 10.0 }, Some(0.0));
        caps.insert(Property::Tilt, Capability { min: -100.0, max: 100.0, step: 10.0 }, Some(0.0));
        caps.insert(Property::Zoom, Capability { min: 100.0, max: 400.0, step: 50.0 }, Some(100.0));
        Self::new(id, caps)
    }

    /// Lets `count` held applies complete
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Makes the next apply to be released fail with `error`
    pub fn fail_next(&self, error: ApplyError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> Vec<Constraints> {
        self.calls.lock().unwrap().clone()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PtzDevice for GatedCamera {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn label(&self) -> &str {
        "gated"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities.clone()
    }

    async fn apply(&self, constraints: &Constraints) -> Result<(), ApplyError> {
        self.calls.lock().unwrap().push(constraints.clone());
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        if let Ok(permit) = permit {
            permit.forget();
        }
        self.outstanding.fetch_sub(1, Ordering::SeqCst);

        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
