// THEORY:
// A single frame pair is a noisy witness: auto-exposure steps, a passing
// shadow or compression artifacts all light up the difference image for one
// frame and then vanish. The `DebouncePolicy` turns the raw per-frame signal
// into a rare, trustworthy alert.
//
// Rules:
// 1.  A positive signal increments a consecutive counter; a negative signal
//     resets it to zero with no partial decay.
// 2.  When the counter reaches the threshold the policy reports `Fired` once
//     and resets itself to `Idle`, so a long motion event yields one alert per
//     `threshold` positive frames rather than one per frame.
// 3.  The policy knows nothing about publishing. Whether the alert was
//     delivered has no influence on the counter.

/// Where the policy stands after the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Accumulating(u32),
}

/// Result of feeding one detection signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Negative signal, counter cleared.
    Idle,
    /// Positive signal below the threshold.
    Accumulating { count: u32, threshold: u32 },
    /// Threshold reached. The counter has already been reset.
    Fired,
}

impl DebounceOutcome {
    pub fn fired(&self) -> bool {
        matches!(self, DebounceOutcome::Fired)
    }
}

/// Consecutive-positive counter with a fixed firing threshold.
#[derive(Debug, Clone)]
pub struct DebouncePolicy {
    consecutive_count: u32,
    threshold: u32,
}

impl DebouncePolicy {
    /// A threshold of zero is treated as one.
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_count: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn update(&mut self, motion_detected: bool) -> DebounceOutcome {
        if !motion_detected {
            self.consecutive_count = 0;
            return DebounceOutcome::Idle;
        }

        self.consecutive_count += 1;
        if self.consecutive_count >= self.threshold {
            self.consecutive_count = 0;
            DebounceOutcome::Fired
        } else {
            DebounceOutcome::Accumulating {
                count: self.consecutive_count,
                threshold: self.threshold,
            }
        }
    }

    pub fn state(&self) -> DebounceState {
        match self.consecutive_count {
            0 => DebounceState::Idle,
            n => DebounceState::Accumulating(n),
        }
    }

    pub fn consecutive_count(&self) -> u32 {
        self.consecutive_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
