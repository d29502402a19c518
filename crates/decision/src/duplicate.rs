//! Duplicate signal suppression.

use crate::guards::GuardOutcome;
use algo_trade_core::{Direction, DuplicateConfig, Signal};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Signals remembered for comparison.
const HISTORY_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SeenSignal {
    symbol: String,
    signal_type: String,
    direction: Direction,
    timestamp: i64,
}

impl SeenSignal {
    fn from_signal(signal: &Signal) -> Self {
        Self {
            symbol: signal.symbol.clone(),
            signal_type: signal.signal_type.clone(),
            direction: signal.direction,
            timestamp: signal.timestamp,
        }
    }

    fn matches(&self, signal: &Signal, window_secs: i64) -> bool {
        self.symbol == signal.symbol
            && self.signal_type == signal.signal_type
            && self.direction == signal.direction
            && (self.timestamp - signal.timestamp).abs() <= window_secs
    }
}

/// Flags a signal when one with the same symbol, type and direction was
/// seen within the window of its timestamp.
#[derive(Debug)]
pub struct DuplicateDetector {
    window_secs: i64,
    seen: Mutex<VecDeque<SeenSignal>>,
}

impl DuplicateDetector {
    #[must_use]
    pub fn new(config: DuplicateConfig) -> Self {
        Self {
            window_secs: config.window_secs,
            seen: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    #[must_use]
    pub fn check(&self, signal: &Signal) -> GuardOutcome {
        let seen = self.seen.lock();
        match seen.iter().find(|s| s.matches(signal, self.window_secs)) {
            Some(previous) => GuardOutcome::blocked(format!(
                "Duplicate signal detected. Similar signal already processed at {}",
                previous.timestamp
            )),
            None => GuardOutcome::Allowed,
        }
    }

    pub fn record(&self, signal: &Signal) {
        let mut seen = self.seen.lock();
        if seen.len() == HISTORY_CAPACITY {
            seen.pop_front();
        }
        seen.push_back(SeenSignal::from_signal(signal));
    }

    /// Checks and, when admitted, remembers the signal.
    pub fn check_and_record(&self, signal: &Signal) -> GuardOutcome {
        let outcome = self.check(signal);
        if outcome.admits() {
            self.record(signal);
        }
        outcome
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DuplicateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::tests::make_signal;

    #[test]
    fn test_same_signal_within_window_is_duplicate() {
        let detector = DuplicateDetector::default();
        let signal = make_signal();
        assert_eq!(detector.check_and_record(&signal), GuardOutcome::Allowed);

        let mut echo = signal.clone();
        echo.timestamp += 45;
        let outcome = detector.check_and_record(&echo);
        assert!(outcome.is_blocked());
        assert!(outcome.reason().unwrap().contains(&signal.timestamp.to_string()));
    }

    #[test]
    fn test_outside_window_or_different_key_is_new() {
        let detector = DuplicateDetector::default();
        let signal = make_signal();
        detector.record(&signal);

        let mut later = signal.clone();
        later.timestamp += 61;
        assert_eq!(detector.check(&later), GuardOutcome::Allowed);

        let mut flipped = signal.clone();
        flipped.direction = Direction::Short;
        assert_eq!(detector.check(&flipped), GuardOutcome::Allowed);

        let mut other = signal;
        other.signal_type = "SWEEP".to_string();
        assert_eq!(detector.check(&other), GuardOutcome::Allowed);
    }

    #[test]
    fn test_earlier_timestamp_also_matches() {
        let detector = DuplicateDetector::default();
        let signal = make_signal();
        detector.record(&signal);

        let mut earlier = signal;
        earlier.timestamp -= 30;
        assert!(detector.check(&earlier).is_blocked());
    }
}
