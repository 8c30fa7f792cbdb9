//! Weighted state-change history and flapping hysteresis.
//!
//! Each checkable keeps the last 20 state-change flags in a packed circular
//! buffer. Recent changes weigh more than old ones; the weighted percentage
//! is compared against a two-threshold hysteresis band so the flapping flag
//! does not oscillate at the boundary.

use chrono::{DateTime, Utc};

/// Number of history slots per checkable.
pub const FLAPPING_SLOTS: u8 = 20;

/// Base weight of the oldest slot.
const WEIGHT_BASE: f64 = 0.8;
/// Weight gained per recency rank; the newest slot weighs 0.8 + 19 * 0.02.
const WEIGHT_STEP: f64 = 0.02;

/// Per-checkable flapping history and derived state.
///
/// The buffer packs one flag per slot into the low 20 bits of a `u32`; the
/// write index always stays in `[0, 20)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlappingHistory {
    buffer: u32,
    index: u8,
    current: f64,
    flapping: bool,
    last_change: Option<DateTime<Utc>>,
}

impl FlappingHistory {
    /// Record one completed check and re-derive the flapping flag.
    ///
    /// Overwrites the slot at the write index with `state_changed`, advances
    /// the index mod 20, then computes the weighted change count over the
    /// whole window. Hysteresis: while flapping, the flag stays set as long
    /// as the value exceeds `threshold_low`; while calm, it only sets once
    /// the value exceeds `threshold_high`.
    ///
    /// Returns `Some(new_flag)` when the flag actually flipped; the
    /// last-change timestamp is only stamped on a flip.
    pub fn record(
        &mut self,
        state_changed: bool,
        threshold_low: f64,
        threshold_high: f64,
        now: DateTime<Utc>,
    ) -> Option<bool> {
        let slot = 1u32 << self.index;
        if state_changed {
            self.buffer |= slot;
        } else {
            self.buffer &= !slot;
        }
        self.index = (self.index + 1) % FLAPPING_SLOTS;

        // Walk the window from oldest (rank 0) to newest (rank 19); the
        // slot at the new write index is the oldest.
        let mut weighted = 0.0;
        for rank in 0..FLAPPING_SLOTS {
            let position = (self.index + rank) % FLAPPING_SLOTS;
            if self.buffer & (1u32 << position) != 0 {
                weighted += WEIGHT_STEP.mul_add(f64::from(rank), WEIGHT_BASE);
            }
        }
        self.current = 100.0 * weighted / f64::from(FLAPPING_SLOTS);

        let was_flapping = self.flapping;
        self.flapping = if was_flapping {
            self.current > threshold_low
        } else {
            self.current > threshold_high
        };

        if self.flapping == was_flapping {
            None
        } else {
            self.last_change = Some(now);
            Some(self.flapping)
        }
    }

    /// Weighted state-change percentage from the last update.
    #[must_use]
    pub const fn current(&self) -> f64 {
        self.current
    }

    /// Persisted flapping flag. Callers wanting the policy-aware answer
    /// (global and per-object enable switches) go through the engine.
    #[must_use]
    pub const fn flag(&self) -> bool {
        self.flapping
    }

    /// Next slot to overwrite.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    /// Packed history bits (low 20 bits).
    #[must_use]
    pub const fn buffer_bits(&self) -> u32 {
        self.buffer
    }

    /// Timestamp of the most recent flag flip, if any.
    #[must_use]
    pub const fn last_change(&self) -> Option<DateTime<Utc>> {
        self.last_change
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::{FLAPPING_SLOTS, FlappingHistory};

    const LOW: f64 = 20.0;
    const HIGH: f64 = 30.0;

    fn drive(history: &mut FlappingHistory, flags: &[bool]) {
        for &flag in flags {
            history.record(flag, LOW, HIGH, Utc::now());
        }
    }

    #[test]
    fn all_changes_drive_value_toward_maximum() {
        let mut history = FlappingHistory::default();
        drive(&mut history, &[true; 20]);
        // Full buffer: sum of 0.8 + 0.02*i for i in 0..20 = 19.8.
        assert!((history.current() - 99.0).abs() < 1e-9);
        assert!(history.flag());
    }

    #[test]
    fn hysteresis_keeps_flag_between_thresholds() {
        let mut history = FlappingHistory::default();
        drive(&mut history, &[true; 20]);
        assert!(history.flag());

        // Feed calm checks until the value sits inside the band; the flag
        // must hold until the value drops below the low threshold.
        while history.current() > LOW {
            assert!(history.flag(), "flag dropped at {}", history.current());
            history.record(false, LOW, HIGH, Utc::now());
        }
        assert!(!history.flag());
    }

    #[test]
    fn calm_history_never_starts_flapping_below_high_threshold() {
        let mut history = FlappingHistory::default();
        // Five isolated changes keep the value well under the high mark.
        drive(&mut history, &[true, false, false, false, true, false]);
        assert!(history.current() < HIGH);
        assert!(!history.flag());
    }

    #[test]
    fn last_change_is_stamped_only_on_flips() {
        let mut history = FlappingHistory::default();
        assert!(history.last_change().is_none());

        drive(&mut history, &[true; 20]);
        let flipped_at = history.last_change().expect("flip recorded");

        // Another flapping check does not move the timestamp.
        history.record(true, LOW, HIGH, Utc::now());
        assert_eq!(history.last_change(), Some(flipped_at));
    }

    #[test]
    fn noisy_then_calm_run_flaps_up_then_down() {
        let mut history = FlappingHistory::default();
        drive(&mut history, &[true; 20]);
        assert!(history.current() > HIGH);
        assert!(history.flag());

        drive(&mut history, &[false; 20]);
        assert!(history.current() < LOW);
        assert!(!history.flag());
    }

    proptest! {
        #[test]
        fn buffer_and_index_invariants_hold(flags in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut history = FlappingHistory::default();
            for (step, &flag) in flags.iter().enumerate() {
                history.record(flag, LOW, HIGH, Utc::now());
                prop_assert!(history.index() < FLAPPING_SLOTS);
                prop_assert_eq!(history.index() as usize, (step + 1) % FLAPPING_SLOTS as usize);
                prop_assert_eq!(history.buffer_bits() >> FLAPPING_SLOTS, 0);
                prop_assert!(history.current() >= 0.0);
                prop_assert!(history.current() < 120.0);
            }
        }

        #[test]
        fn buffer_holds_exactly_the_last_twenty_flags(flags in proptest::collection::vec(any::<bool>(), 20..100)) {
            let mut history = FlappingHistory::default();
            for &flag in &flags {
                history.record(flag, LOW, HIGH, Utc::now());
            }
            let tail = &flags[flags.len() - 20..];
            let set_bits = history.buffer_bits().count_ones() as usize;
            prop_assert_eq!(set_bits, tail.iter().filter(|&&f| f).count());
        }
    }
}
