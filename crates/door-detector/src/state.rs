//! Door state tracking

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Door state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    #[default]
    Unknown,
    Open,
    Closed,
}

impl DoorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorState::Unknown => "unknown",
            DoorState::Open => "open",
            DoorState::Closed => "closed",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of proposing a candidate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Candidate equals the committed state
    Unchanged,
    /// Candidate differs but was held back
    Suppressed { candidate: DoorState },
    /// Candidate committed
    Committed { from: DoorState, to: DoorState },
}

/// Debounced door state: a state change is only committed once the
/// cooldown has elapsed since the previous one.
///
/// `Unknown` is left only through [`DoorStateMachine::reset_closed`];
/// no proposal ever leads back to it.
#[derive(Debug, Clone)]
pub struct DoorStateMachine {
    state: DoorState,
    last_change: Instant,
    cooldown: Duration,
}

impl DoorStateMachine {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: DoorState::Unknown,
            last_change: Instant::now(),
            cooldown,
        }
    }

    /// Committed state
    pub fn state(&self) -> DoorState {
        self.state
    }

    /// Time of the last committed change
    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Force `Closed` after a calibration and restart the cooldown
    pub fn reset_closed(&mut self, now: Instant) {
        self.state = DoorState::Closed;
        self.last_change = now;
    }

    /// Offer a candidate state observed at `now`
    pub fn propose(&mut self, candidate: DoorState, now: Instant) -> Transition {
        if candidate == self.state {
            return Transition::Unchanged;
        }
        if self.state == DoorState::Unknown || candidate == DoorState::Unknown {
            return Transition::Suppressed { candidate };
        }
        if now.saturating_duration_since(self.last_change) < self.cooldown {
            return Transition::Suppressed { candidate };
        }

        let from = self.state;
        self.state = candidate;
        self.last_change = now;
        Transition::Committed { from, to: candidate }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const COOLDOWN: Duration = Duration::from_secs(1);

    fn calibrated(now: Instant) -> DoorStateMachine {
        let mut machine = DoorStateMachine::new(COOLDOWN);
        machine.reset_closed(now);
        machine
    }

    #[test]
    fn test_starts_unknown_and_ignores_proposals() {
        let t0 = Instant::now();
        let mut machine = DoorStateMachine::new(COOLDOWN);
        let later = t0 + Duration::from_secs(10);

        assert_eq!(machine.state(), DoorState::Unknown);
        assert_eq!(
            machine.propose(DoorState::Open, later),
            Transition::Suppressed { candidate: DoorState::Open }
        );
        assert_eq!(machine.state(), DoorState::Unknown);
    }

    #[test]
    fn test_change_within_cooldown_is_suppressed() {
        let t0 = Instant::now();
        let mut machine = calibrated(t0);

        let early = machine.propose(DoorState::Open, t0 + Duration::from_millis(999));
        assert_eq!(early, Transition::Suppressed { candidate: DoorState::Open });
        assert_eq!(machine.state(), DoorState::Closed);

        let on_time = machine.propose(DoorState::Open, t0 + COOLDOWN);
        assert_eq!(
            on_time,
            Transition::Committed { from: DoorState::Closed, to: DoorState::Open }
        );
        assert_eq!(machine.last_change(), t0 + COOLDOWN);
    }

    #[test]
    fn test_same_state_does_not_touch_timestamp() {
        let t0 = Instant::now();
        let mut machine = calibrated(t0);
        assert_eq!(
            machine.propose(DoorState::Closed, t0 + Duration::from_secs(5)),
            Transition::Unchanged
        );
        assert_eq!(machine.last_change(), t0);
    }

    #[test]
    fn test_never_returns_to_unknown() {
        let t0 = Instant::now();
        let mut machine = calibrated(t0);
        machine.propose(DoorState::Unknown, t0 + Duration::from_secs(5));
        assert_eq!(machine.state(), DoorState::Closed);
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(DoorState::Open.as_str(), "open");
        assert_eq!(DoorState::Closed.to_string(), "closed");
        assert_eq!(DoorState::default().to_string(), "unknown");
    }

    proptest! {
        #[test]
        fn prop_commits_respect_cooldown(
            steps in proptest::collection::vec((any::<bool>(), 0u64..1500), 1..60)
        ) {
            let t0 = Instant::now();
            let mut machine = calibrated(t0);
            let mut now = t0;
            let mut commits = vec![t0];

            for (open, delta_ms) in steps {
                now += Duration::from_millis(delta_ms);
                let candidate = if open { DoorState::Open } else { DoorState::Closed };
                match machine.propose(candidate, now) {
                    Transition::Committed { to, .. } => {
                        prop_assert_eq!(to, candidate);
                        commits.push(now);
                    }
                    Transition::Suppressed { .. } => prop_assert_ne!(machine.state(), candidate),
                    Transition::Unchanged => prop_assert_eq!(machine.state(), candidate),
                }
            }

            for pair in commits.windows(2) {
                prop_assert!(pair[1].duration_since(pair[0]) >= COOLDOWN);
            }
        }
    }
}
