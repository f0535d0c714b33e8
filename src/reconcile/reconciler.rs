use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::in_flight::InFlightTable;
use crate::control::DeviceState;
use crate::device::{ApplyError, Constraints, DeviceId, PtzDevice};

/// Completion report of one apply call, delivered back to the reconciler's owner
#[derive(Debug)]
pub struct ApplyOutcome {
    pub device: DeviceId,
    handle: Weak<dyn PtzDevice>,
    pub payload: Constraints,
    pub result: Result<(), ApplyError>,
}

/// What a reconcile call did
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileStep {
    /// An apply is already outstanding; its completion re-checks drift
    InFlight,
    /// Desired equals current for every property
    Settled,
    /// An apply with this payload was started
    Dispatched(Constraints),
}

/// What settling an outcome led to
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Converged,
    /// New drift arrived during the apply; a follow-up apply was started
    Redispatched(Constraints),
    Failed(ApplyError),
    /// The device was unregistered or replaced while the apply ran
    Detached,
}

/// Single-flight applier
///
/// ```text
/// Idle ──reconcile──► Applying ──ok, settled──► Idle
///                        │  ▲
///                        │  └──ok, drifted (re-dispatch)
///                        └──error──► Idle (no retry)
/// ```
///
/// All methods are synchronous; the apply itself runs in a spawned task that
/// sends an [`ApplyOutcome`] when done. The owner feeds that back through
/// [`Reconciler::settle`]. Because the owner processes one message at a time,
/// check-and-set on the in-flight table needs no lock.
pub struct Reconciler {
    in_flight: InFlightTable<dyn PtzDevice>,
    outcomes: mpsc::UnboundedSender<ApplyOutcome>,
}

impl Reconciler {
    pub fn new(outcomes: mpsc::UnboundedSender<ApplyOutcome>) -> Self {
        Self {
            in_flight: InFlightTable::new(),
            outcomes,
        }
    }

    pub fn is_in_flight(&self, device: &Arc<dyn PtzDevice>) -> bool {
        self.in_flight.contains(device)
    }

    /// Starts an apply for everything in `state` that is not settled
    ///
    /// Idempotent: a no-op while an apply for this device is outstanding or
    /// when nothing differs.
    pub fn reconcile(&mut self, device: &Arc<dyn PtzDevice>, state: &DeviceState) -> ReconcileStep {
        if self.in_flight.contains(device) {
            debug!("Apply already in flight for {}, deferring", device.id());
            return ReconcileStep::InFlight;
        }

        let payload = state.diff();
        if payload.is_empty() {
            return ReconcileStep::Settled;
        }
        if !self.in_flight.try_acquire(device) {
            return ReconcileStep::InFlight;
        }

        debug!("Applying {} to {}", payload, device.id());
        let device = Arc::clone(device);
        let outcomes = self.outcomes.clone();
        let sent = payload.clone();
        tokio::spawn(async move {
            let result = device.apply(&sent).await;
            let outcome = ApplyOutcome {
                device: device.id().clone(),
                handle: Arc::downgrade(&device),
                payload: sent,
                result,
            };
            drop(device);
            if outcomes.send(outcome).is_err() {
                warn!("Reconciler gone, dropping apply outcome");
            }
        });

        ReconcileStep::Dispatched(payload)
    }

    /// Processes a finished apply
    ///
    /// `target` is the device currently registered under `outcome.device`
    /// together with its state, if any. On success every submitted value
    /// becomes the current value and any remaining drift is dispatched
    /// right away. On failure the desired values stay as they are and nothing
    /// is retried until the next reconcile call.
    pub fn settle(
        &mut self,
        outcome: ApplyOutcome,
        target: Option<(&Arc<dyn PtzDevice>, &mut DeviceState)>,
    ) -> Settlement {
        self.in_flight.release(&outcome.handle);

        let target = target.filter(|(device, _)| {
            let device: &Arc<dyn PtzDevice> = device;
            Arc::as_ptr(device).cast::<()>() == outcome.handle.as_ptr().cast::<()>()
        });
        let Some((device, state)) = target else {
            debug!(
                "Discarding outcome of {} for {}, device no longer registered",
                outcome.payload, outcome.device
            );
            return Settlement::Detached;
        };

        match outcome.result {
            Ok(()) => {
                for (property, value) in outcome.payload.iter() {
                    state.confirm(property, value);
                    info!("Set {} of {} to {}", property, outcome.device, value);
                }
                if state.is_settled() {
                    return Settlement::Converged;
                }
                match self.reconcile(device, state) {
                    ReconcileStep::Dispatched(next) => Settlement::Redispatched(next),
                    ReconcileStep::Settled | ReconcileStep::InFlight => Settlement::Converged,
                }
            }
            Err(e) => {
                error!(
                    "Error setting {} on {}: {}",
                    outcome.payload, outcome.device, e
                );
                Settlement::Failed(e)
            }
        }
    }
}
