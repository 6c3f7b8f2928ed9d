//! Stop conditions.
//!
//! Termination criteria end a single sequence and are evaluated after every
//! executed event. Completion criteria end the whole suite and are evaluated
//! between sequences, so a sequence always finishes in a safe state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use roamer_ir::Fingerprint;
use roamer_store::{KnowledgeBase, StoreError};
use serde::{Deserialize, Serialize};

// ── Termination (per sequence) ───────────────────────────────────────

/// What a termination criterion sees after each event.
#[derive(Debug, Clone)]
pub struct SequenceProgress<'a> {
    pub suite_id: &'a str,
    /// Fingerprint of the events so far, launch included.
    pub sequence_hash: &'a Fingerprint,
    /// Events so far, launch included.
    pub event_count: usize,
}

pub trait TerminationCriterion: Send + Sync {
    fn should_terminate(
        &self,
        store: &dyn KnowledgeBase,
        progress: &SequenceProgress<'_>,
    ) -> Result<bool, StoreError>;
}

/// Stop once the events so far form a sequence already recorded for the suite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceSeen;

impl TerminationCriterion for SequenceSeen {
    fn should_terminate(
        &self,
        store: &dyn KnowledgeBase,
        progress: &SequenceProgress<'_>,
    ) -> Result<bool, StoreError> {
        store.sequence_seen(progress.suite_id, progress.sequence_hash)
    }
}

/// Stop once the sequence holds `max_events` events.
#[derive(Debug, Clone, Copy)]
pub struct EventCeiling(pub usize);

impl TerminationCriterion for EventCeiling {
    fn should_terminate(
        &self,
        _store: &dyn KnowledgeBase,
        progress: &SequenceProgress<'_>,
    ) -> Result<bool, StoreError> {
        Ok(progress.event_count >= self.0)
    }
}

/// Logical OR of several criteria, evaluated in order.
pub struct AnyTermination(pub Vec<Box<dyn TerminationCriterion>>);

impl TerminationCriterion for AnyTermination {
    fn should_terminate(
        &self,
        store: &dyn KnowledgeBase,
        progress: &SequenceProgress<'_>,
    ) -> Result<bool, StoreError> {
        for criterion in &self.0 {
            if criterion.should_terminate(store, progress)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Repeat detection OR the event ceiling.
pub fn default_termination(max_events: usize) -> AnyTermination {
    AnyTermination(vec![Box::new(SequenceSeen), Box::new(EventCeiling(max_events))])
}

// ── Completion (per suite) ───────────────────────────────────────────

/// Reason a suite was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Wall-clock budget exhausted.
    WallTimeExceeded,
    /// Sequence-count budget reached.
    SequenceLimitReached,
    /// Too many consecutive attempts failed in the driver.
    TooManyFailures,
    /// An external stop was requested.
    StopRequested,
}

/// What a completion criterion sees between sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuiteProgress {
    pub elapsed: Duration,
    /// Sequences written so far.
    pub sequence_count: u32,
    /// Driver-failed attempts since the last written sequence.
    pub consecutive_failures: u32,
}

pub trait CompletionCriterion: Send + Sync {
    /// `None` while the suite should keep going.
    fn check(&self, progress: &SuiteProgress) -> Option<StopReason>;
}

#[derive(Debug, Clone, Copy)]
pub struct TimeBudget(pub Duration);

impl CompletionCriterion for TimeBudget {
    fn check(&self, progress: &SuiteProgress) -> Option<StopReason> {
        (progress.elapsed >= self.0).then_some(StopReason::WallTimeExceeded)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SequenceBudget(pub u32);

impl CompletionCriterion for SequenceBudget {
    fn check(&self, progress: &SuiteProgress) -> Option<StopReason> {
        (progress.sequence_count >= self.0).then_some(StopReason::SequenceLimitReached)
    }
}

/// Caps consecutive driver failures so a dead device cannot spin the suite.
#[derive(Debug, Clone, Copy)]
pub struct FailureBudget(pub u32);

impl CompletionCriterion for FailureBudget {
    fn check(&self, progress: &SuiteProgress) -> Option<StopReason> {
        (progress.consecutive_failures >= self.0).then_some(StopReason::TooManyFailures)
    }
}

/// Cloneable flag for requesting a graceful stop from outside the suite.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct StopRequested(pub StopHandle);

impl CompletionCriterion for StopRequested {
    fn check(&self, _progress: &SuiteProgress) -> Option<StopReason> {
        self.0
            .is_stop_requested()
            .then_some(StopReason::StopRequested)
    }
}

/// First criterion to report a reason wins.
pub struct AnyCompletion(pub Vec<Box<dyn CompletionCriterion>>);

impl CompletionCriterion for AnyCompletion {
    fn check(&self, progress: &SuiteProgress) -> Option<StopReason> {
        self.0.iter().find_map(|c| c.check(progress))
    }
}
