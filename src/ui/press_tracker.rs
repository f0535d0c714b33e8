//! Turns per-frame "is this button down" into press start/end edges
//!
//! egui is immediate mode: every frame only tells us which buttons are held
//! right now. The hub needs discrete press-start and press-end signals, so the
//! tracker diffs consecutive frames.

use std::collections::HashSet;
use std::hash::Hash;

use crate::hub::PressPhase;
use crate::input::PressEnd;

pub struct PressTracker<K> {
    active: HashSet<K>,
}

impl<K: Eq + Hash + Clone> PressTracker<K> {
    pub fn new() -> Self {
        Self {
            active: HashSet::new(),
        }
    }

    /// Edges between the previous frame and this one
    ///
    /// A button that stops being held while the pointer is still down was
    /// left; one that stops while the window lost focus was cancelled.
    pub fn frame(&mut self, down: HashSet<K>, pointer_down: bool, focused: bool) -> Vec<(K, PressPhase)> {
        let down = if focused { down } else { HashSet::new() };
        let how = if !focused {
            PressEnd::Cancel
        } else if pointer_down {
            PressEnd::Leave
        } else {
            PressEnd::Release
        };

        let mut edges: Vec<(K, PressPhase)> = self
            .active
            .difference(&down)
            .map(|key| (key.clone(), PressPhase::End(how)))
            .collect();
        edges.extend(
            down.difference(&self.active)
                .map(|key| (key.clone(), PressPhase::Start)),
        );

        self.active = down;
        edges
    }
}

impl<K: Eq + Hash + Clone> Default for PressTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&'static str]) -> HashSet<&'static str> {
        items.iter().copied().collect()
    }

    #[test]
    fn press_and_release() {
        let mut tracker = PressTracker::new();
        assert_eq!(tracker.frame(keys(&["plus"]), true, true), vec![("plus", PressPhase::Start)]);
        assert!(tracker.frame(keys(&["plus"]), true, true).is_empty());
        assert_eq!(
            tracker.frame(keys(&[]), false, true),
            vec![("plus", PressPhase::End(PressEnd::Release))]
        );
        assert!(tracker.frame(keys(&[]), false, true).is_empty());
    }

    #[test]
    fn sliding_off_a_button_is_a_leave() {
        let mut tracker = PressTracker::new();
        tracker.frame(keys(&["minus"]), true, true);
        assert_eq!(
            tracker.frame(keys(&[]), true, true),
            vec![("minus", PressPhase::End(PressEnd::Leave))]
        );
    }

    #[test]
    fn losing_focus_cancels_every_press() {
        let mut tracker = PressTracker::new();
        tracker.frame(keys(&["a", "b"]), true, true);
        let mut edges = tracker.frame(keys(&["a", "b"]), true, false);
        edges.sort_by_key(|(key, _)| *key);
        assert_eq!(
            edges,
            vec![
                ("a", PressPhase::End(PressEnd::Cancel)),
                ("b", PressPhase::End(PressEnd::Cancel)),
            ]
        );
    }
}
