//! Press gestures: short/long classification and repeat-while-held
//!
//! Neither type knows what a press means. Timers report back by sending a
//! caller-built message on an unbounded channel, so the owner of the channel
//! sees timer expiry as just another event in its queue.
//!
//! Every running timer is tied to a [`DropGuard`]. Releasing, leaving,
//! cancelling or dropping the detector drops the guard and stops the timer.
//! Messages carry the id of the press that started them, so one that was
//! already queued when the press ended can be recognised and discarded.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(1000);
pub const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Sends `message` on `tx` once `delay` has passed
///
/// Dropping the returned guard before then cancels the send.
pub fn send_after<M>(tx: &mpsc::UnboundedSender<M>, delay: Duration, message: M) -> DropGuard
where
    M: Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let tx = tx.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = cancelled.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                let _ = tx.send(message);
            }
        }
    });

    token.drop_guard()
}

/// Result of one press/release cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Short,
    Long,
}

/// How a press ended. All variants end the press the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressEnd {
    Release,
    Leave,
    Cancel,
}

enum PressState {
    Idle,
    Pressed {
        id: u64,
        since: Instant,
        _timer: DropGuard,
    },
    LongFired,
}

/// Short/long press classifier
///
/// `Idle → Pressed → (Short | LongFired) → Idle`. When the threshold passes
/// while the button is still down the long gesture is reported at that moment
/// (through [`PressClassifier::elapse`]) and the later release reports nothing.
pub struct PressClassifier {
    threshold: Duration,
    state: PressState,
    next_id: u64,
}

impl PressClassifier {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: PressState::Idle,
            next_id: 0,
        }
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self.state, PressState::Pressed { .. })
    }

    /// Records the press start and arms the long-press timer
    ///
    /// When the threshold expires `on_elapsed(id)` is sent on `tx`; feed that id
    /// back into [`PressClassifier::elapse`]. A second press while one is
    /// already being timed is ignored.
    pub fn press<M, F>(&mut self, tx: &mpsc::UnboundedSender<M>, on_elapsed: F) -> Option<u64>
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M,
    {
        if self.is_pressed() {
            debug!("Press already in progress, ignoring repeated press start");
            return None;
        }

        self.next_id += 1;
        let id = self.next_id;
        self.state = PressState::Pressed {
            id,
            since: Instant::now(),
            _timer: send_after(tx, self.threshold, on_elapsed(id)),
        };
        Some(id)
    }

    /// Ends the press; `None` for a stray end or after the long gesture already fired
    pub fn release(&mut self, how: PressEnd) -> Option<Gesture> {
        match std::mem::replace(&mut self.state, PressState::Idle) {
            PressState::Idle => {
                debug!("Ignoring {:?} without a matching press", how);
                None
            }
            PressState::LongFired => None,
            PressState::Pressed { since, .. } => {
                if since.elapsed() < self.threshold {
                    Some(Gesture::Short)
                } else {
                    Some(Gesture::Long)
                }
            }
        }
    }

    /// Handles the long-press timer message for press `id`
    pub fn elapse(&mut self, id: u64) -> Option<Gesture> {
        if matches!(self.state, PressState::Pressed { id: current, .. } if current == id) {
            self.state = PressState::LongFired;
            Some(Gesture::Long)
        } else {
            debug!("Discarding stale long-press timer {}", id);
            None
        }
    }
}

impl Default for PressClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_LONG_PRESS)
    }
}

struct ActiveHold {
    id: u64,
    _ticker: DropGuard,
}

/// Emits a message at a fixed cadence while a control is held
pub struct HoldRepeat {
    cadence: Duration,
    active: Option<ActiveHold>,
    next_id: u64,
}

impl HoldRepeat {
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            active: None,
            next_id: 0,
        }
    }

    /// Whether a tick from hold `id` still belongs to the ongoing hold
    pub fn is_current(&self, id: u64) -> bool {
        self.active.as_ref().is_some_and(|hold| hold.id == id)
    }

    /// Starts ticking; the first tick comes one cadence after the press
    ///
    /// Returns the hold id, or the running hold's id if already held.
    pub fn press<M, F>(&mut self, tx: &mpsc::UnboundedSender<M>, tick: F) -> u64
    where
        M: Send + 'static,
        F: Fn(u64) -> M + Send + 'static,
    {
        if let Some(hold) = &self.active {
            return hold.id;
        }

        self.next_id += 1;
        let id = self.next_id;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = tx.clone();
        let cadence = self.cadence;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + cadence, cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(tick(id)).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.active = Some(ActiveHold {
            id,
            _ticker: token.drop_guard(),
        });
        id
    }

    /// Stops ticking; returns false if nothing was held
    pub fn release(&mut self, how: PressEnd) -> bool {
        match self.active.take() {
            Some(hold) => {
                debug!("Hold {} ended by {:?}", hold.id, how);
                true
            }
            None => false,
        }
    }
}

impl Default for HoldRepeat {
    fn default() -> Self {
        Self::new(DEFAULT_REPEAT_INTERVAL)
    }
}
