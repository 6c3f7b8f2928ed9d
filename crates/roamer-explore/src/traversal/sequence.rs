//! One exploration run: launch, explore until a stop condition, write out.
//!
//! Phases:
//! - initialize: open a driver session, seed the sequence with the launch event
//! - explore: select, execute, observe, record; repeat until termination or
//!   until the app leaves its own package
//! - leave: press home (not recorded)
//! - finalize: record the sequence, write it out, close the session
//!
//! A driver fault in any phase before finalize abandons the sequence. Event
//! statistics already written stay in the knowledge base.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use roamer_ir::event::{back_event, home_event, launch_event, synthesize};
use roamer_ir::{fingerprint_event, fingerprint_sequence, ActionKind, Event, Fingerprint, State};
use roamer_store::{KnowledgeBase, StoreError};

use super::criteria::{SequenceProgress, TerminationCriterion};
use super::driver::{with_timeout, Driver, SessionFactory};
use super::strategy::{Candidate, SelectionStrategy};
use crate::error::GenerationError;
use crate::output::write_sequence;

/// Settings shared by every sequence of a suite.
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    /// Package of the application under test.
    pub app_package: String,
    /// Upper bound on any single driver call.
    pub driver_timeout: Duration,
    /// Pause after each executed event so the UI can settle.
    pub event_interval: Duration,
    /// Payloads for text-entry actions the driver offers without one.
    pub text_entry_values: Vec<String>,
    /// Seed for picking among `text_entry_values`.
    pub seed: u64,
}

/// A sequence under construction, owning its driver session.
pub struct SequenceInProgress<D: Driver> {
    pub driver: D,
    pub events: Vec<Event>,
    /// Unix seconds.
    pub start_time: i64,
    pub start_state: State,
    /// Screen the app is on now.
    pub current_state: State,
}

/// An executed, fingerprinted event ready to append.
#[derive(Debug, Clone)]
pub struct NextEvent {
    pub event: Event,
    pub fingerprint: Fingerprint,
    pub resulting_state: State,
}

/// Why exploration stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEnd {
    /// A termination criterion fired.
    Terminated,
    /// The last event took the app out of its package; that event is now terminal.
    LeftApplication { event: Fingerprint, package: String },
}

/// A sequence that reached finalization.
#[derive(Debug, Clone)]
pub struct FinishedSequence {
    pub index: u32,
    pub fingerprint: Fingerprint,
    pub events: Vec<Event>,
    pub duration_secs: i64,
    pub path: PathBuf,
    pub end: SequenceEnd,
}

pub struct SequenceGenerator<F: SessionFactory> {
    store: Arc<dyn KnowledgeBase>,
    sessions: F,
    strategy: Box<dyn SelectionStrategy>,
    termination: Box<dyn TerminationCriterion>,
    config: SequenceConfig,
    text_rng: ChaCha8Rng,
}

impl<F: SessionFactory> SequenceGenerator<F> {
    pub fn new(
        store: Arc<dyn KnowledgeBase>,
        sessions: F,
        strategy: Box<dyn SelectionStrategy>,
        termination: Box<dyn TerminationCriterion>,
        config: SequenceConfig,
    ) -> Self {
        let text_rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            store,
            sessions,
            strategy,
            termination,
            config,
            text_rng,
        }
    }

    pub fn app_package(&self) -> &str {
        &self.config.app_package
    }

    /// Generate, record and write sequence number `index` of the suite.
    pub async fn run(
        &mut self,
        suite_id: &str,
        sequences_dir: &Path,
        index: u32,
    ) -> Result<FinishedSequence, GenerationError> {
        let mut sequence = self.initialize().await?;
        tracing::debug!(index = index + 1, "generating sequence");

        match self.explore(&mut sequence, suite_id).await {
            Ok(end) => {
                self.leave(&mut sequence).await;
                self.finalize(sequence, suite_id, sequences_dir, index, end).await
            }
            Err(err) => {
                self.abandon(sequence).await;
                Err(err)
            }
        }
    }

    pub async fn initialize(&self) -> Result<SequenceInProgress<F::Driver>, GenerationError> {
        let timeout = self.config.driver_timeout;
        let mut driver = with_timeout("open_session", timeout, self.sessions.open()).await?;

        let start_state = match with_timeout("current_state", timeout, driver.current_state()).await {
            Ok(state) => state,
            Err(err) => {
                self.close_session(driver).await;
                return Err(err.into());
            }
        };

        tracing::debug!(
            strategy = self.strategy.name(),
            start = %start_state.activity,
            "session open"
        );
        Ok(SequenceInProgress {
            driver,
            events: vec![launch_event(&start_state)],
            start_time: Utc::now().timestamp(),
            current_state: start_state.clone(),
            start_state,
        })
    }

    /// Explore until a termination criterion fires or the app is left.
    pub async fn explore(
        &mut self,
        sequence: &mut SequenceInProgress<F::Driver>,
        suite_id: &str,
    ) -> Result<SequenceEnd, GenerationError> {
        loop {
            let sequence_hash = fingerprint_sequence(&sequence.events);
            let progress = SequenceProgress {
                suite_id,
                sequence_hash: &sequence_hash,
                event_count: sequence.events.len(),
            };
            if self
                .termination
                .should_terminate(self.store.as_ref(), &progress)?
            {
                return Ok(SequenceEnd::Terminated);
            }

            let next = self.next_event(sequence, suite_id).await?;
            self.store.bump_event_frequency(&next.fingerprint, suite_id)?;
            sequence.current_state = next.resulting_state;
            sequence.events.push(next.event);

            let package = with_timeout(
                "current_package",
                self.config.driver_timeout,
                sequence.driver.current_package(),
            )
            .await?;
            if package != self.config.app_package {
                self.store.mark_terminal_event(&next.fingerprint, suite_id)?;
                tracing::debug!(event = %next.fingerprint, %package, "event left the application");
                return Ok(SequenceEnd::LeftApplication {
                    event: next.fingerprint,
                    package,
                });
            }
        }
    }

    /// Choose, execute and observe one event.
    pub async fn next_event(
        &mut self,
        sequence: &mut SequenceInProgress<F::Driver>,
        suite_id: &str,
    ) -> Result<NextEvent, GenerationError> {
        let timeout = self.config.driver_timeout;
        let mut selected = self.choose_event(sequence, suite_id).await?;
        self.fill_text_entries(&mut selected);

        with_timeout("execute", timeout, sequence.driver.execute(&selected)).await?;
        if !self.config.event_interval.is_zero() {
            tokio::time::sleep(self.config.event_interval).await;
        }
        let resulting_state = with_timeout("current_state", timeout, sequence.driver.current_state()).await?;

        let event = synthesize(selected, resulting_state.clone());
        let fingerprint = fingerprint_event(&event);
        Ok(NextEvent {
            event,
            fingerprint,
            resulting_state,
        })
    }

    /// Pick the next partial event. Falls back to back navigation when every
    /// offered event is terminal for this suite.
    pub async fn choose_event(
        &mut self,
        sequence: &mut SequenceInProgress<F::Driver>,
        suite_id: &str,
    ) -> Result<Event, GenerationError> {
        let available = with_timeout(
            "available_events",
            self.config.driver_timeout,
            sequence.driver.available_events(),
        )
        .await?;

        let screen = available
            .first()
            .map(|e| e.precondition.clone())
            .unwrap_or_else(|| sequence.current_state.clone());
        let candidates = self.remove_terminal_events(suite_id, available)?;

        if candidates.is_empty() {
            tracing::warn!(
                activity = %screen.activity,
                "no selectable events; all events on this screen are terminal"
            );
            return Ok(back_event(&screen));
        }

        let hashes: Vec<Fingerprint> = candidates.iter().map(|c| c.fingerprint.clone()).collect();
        let frequencies = self.store.event_frequencies(&hashes, suite_id)?;
        let decision = self.strategy.select(&candidates, &frequencies);
        tracing::debug!(
            event = %decision.fingerprint,
            frequency = decision.frequency,
            candidates = candidates.len(),
            "selected event"
        );

        let offered = candidates.len();
        candidates
            .into_iter()
            .nth(decision.index)
            .map(|c| c.event)
            .ok_or_else(|| GenerationError::Selection {
                strategy: self.strategy.name().to_string(),
                index: decision.index,
                candidates: offered,
            })
    }

    /// Give every text-entry action without a payload one of the configured
    /// values. No values configured leaves the payload empty.
    fn fill_text_entries(&mut self, event: &mut Event) {
        for action in &mut event.actions {
            if action.kind != ActionKind::TextEntry || action.text.is_some() {
                continue;
            }
            if let Some(value) = self.config.text_entry_values.choose(&mut self.text_rng) {
                action.text = Some(value.clone());
            }
        }
    }

    /// Fingerprint the offered events and drop those terminal for the suite.
    pub fn remove_terminal_events(
        &self,
        suite_id: &str,
        events: Vec<Event>,
    ) -> Result<Vec<Candidate>, StoreError> {
        let mut candidates = Vec::with_capacity(events.len());
        for event in events {
            let fingerprint = fingerprint_event(&event);
            if self.store.is_terminal_event(&fingerprint, suite_id)? {
                tracing::debug!(event = %fingerprint, "skipping terminal event");
                continue;
            }
            candidates.push(Candidate { event, fingerprint });
        }
        Ok(candidates)
    }

    /// Press home to leave the app. Cleanup only; the press is not
    /// exploration data and a failure is not fatal.
    pub async fn leave(&self, sequence: &mut SequenceInProgress<F::Driver>) {
        let home = home_event(&sequence.current_state);
        if let Err(err) = with_timeout("execute", self.config.driver_timeout, sequence.driver.execute(&home)).await {
            tracing::warn!(error = %err, "home navigation failed");
        }
    }

    /// Record and write the sequence, then close its session.
    pub async fn finalize(
        &self,
        sequence: SequenceInProgress<F::Driver>,
        suite_id: &str,
        sequences_dir: &Path,
        index: u32,
        end: SequenceEnd,
    ) -> Result<FinishedSequence, GenerationError> {
        let duration_secs = Utc::now().timestamp() - sequence.start_time;
        let fingerprint = fingerprint_sequence(&sequence.events);

        let recorded = self
            .store
            .record_sequence(&fingerprint, suite_id, sequence.start_time, duration_secs)
            .map_err(GenerationError::from)
            .and_then(|()| {
                write_sequence(sequences_dir, &sequence.events, index, duration_secs).map_err(GenerationError::from)
            });
        let SequenceInProgress { driver, events, .. } = sequence;
        self.close_session(driver).await;
        let path = recorded?;

        tracing::debug!(
            index = index + 1,
            events = events.len(),
            path = %path.display(),
            "sequence written"
        );
        Ok(FinishedSequence {
            index,
            fingerprint,
            events,
            duration_secs,
            path,
            end,
        })
    }

    /// Drop an unfinished sequence, closing its session best-effort.
    pub async fn abandon(&self, sequence: SequenceInProgress<F::Driver>) {
        self.close_session(sequence.driver).await;
    }

    async fn close_session(&self, driver: F::Driver) {
        if let Err(err) = with_timeout("close_session", self.config.driver_timeout, self.sessions.close(driver)).await {
            tracing::warn!(error = %err, "failed to close driver session");
        }
    }
}
