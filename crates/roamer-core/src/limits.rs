//! Suite budgets and per-call timeouts.
//!
//! A suite stops at whichever budget is hit first. Budgets are checked
//! between sequences, so the last sequence always finishes and is written.

use std::time::Duration;

use roamer_explore::traversal::criteria::{
    AnyCompletion, CompletionCriterion, FailureBudget, SequenceBudget, StopHandle, StopRequested, TimeBudget,
};
use serde::{Deserialize, Serialize};

/// Stop conditions for one suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteLimits {
    /// Stop after this many written sequences.
    pub max_sequences: Option<u32>,
    /// Stop once the suite has run this long.
    pub max_duration_secs: Option<u64>,
    /// Stop after this many driver-failed attempts in a row.
    pub max_consecutive_failures: u32,
}

impl Default for SuiteLimits {
    fn default() -> Self {
        Self {
            max_sequences: Some(100),
            max_duration_secs: Some(3600), // 1 hour
            max_consecutive_failures: 5,
        }
    }
}

impl SuiteLimits {
    /// The completion criterion these limits describe, plus an optional
    /// external stop request.
    pub fn completion_criteria(&self, stop: Option<StopHandle>) -> AnyCompletion {
        let mut criteria: Vec<Box<dyn CompletionCriterion>> = Vec::new();
        if let Some(handle) = stop {
            criteria.push(Box::new(StopRequested(handle)));
        }
        if let Some(secs) = self.max_duration_secs {
            criteria.push(Box::new(TimeBudget(Duration::from_secs(secs))));
        }
        if let Some(count) = self.max_sequences {
            criteria.push(Box::new(SequenceBudget(count)));
        }
        criteria.push(Box::new(FailureBudget(self.max_consecutive_failures)));
        AnyCompletion(criteria)
    }
}

/// Upper bounds on single external calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub driver_secs: u64,
    pub device_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            driver_secs: 30,
            device_secs: 60,
        }
    }
}

impl Timeouts {
    pub fn driver(&self) -> Duration {
        Duration::from_secs(self.driver_secs)
    }

    pub fn device(&self) -> Duration {
        Duration::from_secs(self.device_secs)
    }
}

/// Validate limits before a suite is started.
pub fn validate_limits(
    max_events_per_sequence: usize,
    limits: &SuiteLimits,
    timeouts: &Timeouts,
) -> Result<(), LimitViolation> {
    if max_events_per_sequence == 0 {
        return Err(LimitViolation::ZeroEventCeiling);
    }
    if limits.max_sequences.is_none() && limits.max_duration_secs.is_none() {
        return Err(LimitViolation::Unbounded);
    }
    if limits.max_consecutive_failures == 0 {
        return Err(LimitViolation::ZeroFailureBudget);
    }
    if timeouts.driver_secs == 0 {
        return Err(LimitViolation::ZeroTimeout { call: "driver" });
    }
    if timeouts.device_secs == 0 {
        return Err(LimitViolation::ZeroTimeout { call: "device" });
    }
    Ok(())
}

/// A limit violation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitViolation {
    ZeroEventCeiling,
    Unbounded,
    ZeroFailureBudget,
    ZeroTimeout { call: &'static str },
}

impl std::fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroEventCeiling => write!(f, "max_events_per_sequence must be at least 1"),
            Self::Unbounded => write!(f, "Suite needs a sequence limit or a time limit"),
            Self::ZeroFailureBudget => write!(f, "max_consecutive_failures must be at least 1"),
            Self::ZeroTimeout { call } => write!(f, "The {call} timeout must be at least 1 second"),
        }
    }
}

impl std::error::Error for LimitViolation {}
