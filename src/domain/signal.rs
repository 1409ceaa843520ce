//! Strategy output value types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// One strategy verdict: a signal plus a confidence/sizing hint in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDecision {
    pub signal: Signal,
    pub confidence: f64,
}

impl SignalDecision {
    pub fn new(signal: Signal, confidence: f64) -> Self {
        SignalDecision {
            signal,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn hold() -> Self {
        SignalDecision {
            signal: Signal::Hold,
            confidence: 0.0,
        }
    }
}
