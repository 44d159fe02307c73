//! Firmware line fault injection
//!
//! The device may answer a well-formed `FIRMWARE:` line with `ERROR` to
//! exercise the operator's retry path. Which lines get rejected is decided by
//! a [`FaultInjector`] handed to the device at construction.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides whether a firmware line is rejected
pub trait FaultInjector: Send {
    /// Called once per `FIRMWARE:` line received while in reception mode
    fn should_reject(&mut self, line: &str) -> bool;
}

/// Never rejects
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn should_reject(&mut self, _line: &str) -> bool {
        false
    }
}

/// Rejects each line independently with a fixed probability
#[derive(Debug)]
pub struct RandomFaults {
    rate: f64,
    rng: StdRng,
}

impl RandomFaults {
    /// `rate` is clamped to `0.0..=1.0`; a seed makes the sequence repeatable
    pub fn new(rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rate: if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 },
            rng,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl FaultInjector for RandomFaults {
    fn should_reject(&mut self, _line: &str) -> bool {
        self.rate > 0.0 && self.rng.gen_bool(self.rate)
    }
}

/// Rejects exactly the listed attempts
///
/// Attempts are numbered from 1 and count every `FIRMWARE:` line the device
/// sees in reception mode, retries included.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFaults {
    reject: BTreeSet<usize>,
    seen: usize,
}

impl ScriptedFaults {
    pub fn on_attempts(attempts: impl IntoIterator<Item = usize>) -> Self {
        Self {
            reject: attempts.into_iter().collect(),
            seen: 0,
        }
    }

    /// Attempts observed so far
    pub fn seen(&self) -> usize {
        self.seen
    }
}

impl FaultInjector for ScriptedFaults {
    fn should_reject(&mut self, _line: &str) -> bool {
        self.seen += 1;
        self.reject.contains(&self.seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_zero_and_one() {
        let mut never = RandomFaults::new(0.0, Some(1));
        let mut always = RandomFaults::new(1.0, Some(1));
        for _ in 0..100 {
            assert!(!never.should_reject("x"));
            assert!(always.should_reject("x"));
        }
    }

    #[test]
    fn test_rate_is_clamped() {
        assert_eq!(RandomFaults::new(7.5, None).rate(), 1.0);
        assert_eq!(RandomFaults::new(-1.0, None).rate(), 0.0);
        assert_eq!(RandomFaults::new(f64::NAN, None).rate(), 0.0);
    }

    #[test]
    fn test_seeded_sequence_repeats() {
        let draw = |seed| {
            let mut faults = RandomFaults::new(0.5, Some(seed));
            (0..32).map(|_| faults.should_reject("x")).collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
    }

    #[test]
    fn test_default_rate_roughly_one_in_ten() {
        let mut faults = RandomFaults::new(0.1, Some(2024));
        let rejected = (0..10_000).filter(|_| faults.should_reject("x")).count();
        assert!((700..1300).contains(&rejected), "rejected {}", rejected);
    }

    #[test]
    fn test_scripted_attempts() {
        let mut faults = ScriptedFaults::on_attempts([2, 3]);
        let results: Vec<bool> = (0..5).map(|_| faults.should_reject("x")).collect();
        assert_eq!(results, vec![false, true, true, false, false]);
        assert_eq!(faults.seen(), 5);
    }
}
