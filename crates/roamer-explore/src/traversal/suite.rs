//! The suite loop: generate sequences until a completion criterion fires.
//!
//! The device is reset before each sequence. Coverage and logs are pulled
//! after the home press, while the app process is still alive, and before
//! the sequence is recorded. Device-agent failures are logged and ignored.
//! Driver failures cost one attempt. Store and output failures abort.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use roamer_store::KnowledgeBase;
use serde::Serialize;

use super::criteria::{CompletionCriterion, StopReason, SuiteProgress};
use super::driver::{device_call, DeviceAgent, SessionFactory};
use super::sequence::{FinishedSequence, SequenceGenerator};
use crate::error::GenerationError;
use crate::output::OutputPaths;

/// Outcome of a suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSummary {
    pub suite_id: String,
    pub creation_time: i64,
    pub end_time: i64,
    /// `end_time - creation_time`, in seconds.
    pub duration_secs: i64,
    pub sequence_count: u32,
    /// Attempts lost to driver failures.
    pub failed_attempts: u32,
    pub stop_reason: StopReason,
    pub output_dir: PathBuf,
    pub sequence_files: Vec<PathBuf>,
}

pub struct SuiteGenerator<F: SessionFactory, A: DeviceAgent> {
    store: Arc<dyn KnowledgeBase>,
    sequences: SequenceGenerator<F>,
    agent: A,
    completion: Box<dyn CompletionCriterion>,
    device_timeout: Duration,
}

impl<F: SessionFactory, A: DeviceAgent> SuiteGenerator<F, A> {
    pub fn new(
        store: Arc<dyn KnowledgeBase>,
        sequences: SequenceGenerator<F>,
        agent: A,
        completion: Box<dyn CompletionCriterion>,
        device_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sequences,
            agent,
            completion,
            device_timeout,
        }
    }

    /// Run one suite, writing artifacts under `output_root`.
    pub async fn run(&mut self, output_root: &Path) -> Result<SuiteSummary, GenerationError> {
        let suite = self.store.create_suite()?;
        let paths = OutputPaths::create(output_root, self.sequences.app_package(), suite.creation_time)?;
        tracing::info!(
            suite = %suite.id,
            package = self.sequences.app_package(),
            output = %paths.root.display(),
            "suite started"
        );

        let started = tokio::time::Instant::now();
        let mut progress = SuiteProgress::default();
        let mut failed_attempts = 0u32;
        let mut sequence_files = Vec::new();

        let stop_reason = loop {
            progress.elapsed = started.elapsed();
            if let Some(reason) = self.completion.check(&progress) {
                break reason;
            }

            self.prepare_device().await;
            let index = progress.sequence_count;
            match self.run_sequence(&suite.id, &paths, index).await {
                Ok(finished) => {
                    self.teardown_device().await;
                    tracing::info!(
                        suite = %suite.id,
                        sequence = index + 1,
                        events = finished.events.len(),
                        duration_secs = finished.duration_secs,
                        "sequence complete"
                    );
                    sequence_files.push(finished.path);
                    progress.sequence_count += 1;
                    progress.consecutive_failures = 0;
                }
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(suite = %suite.id, error = %err, "sequence attempt failed; retrying");
                    failed_attempts += 1;
                    progress.consecutive_failures += 1;
                }
                Err(err) => {
                    tracing::error!(suite = %suite.id, error = %err, "suite aborted");
                    return Err(err);
                }
            }
        };

        let end_time = Utc::now().timestamp();
        let duration_secs = end_time - suite.creation_time;
        self.store.finalize_suite(&suite.id, end_time, duration_secs)?;
        tracing::info!(
            suite = %suite.id,
            sequences = progress.sequence_count,
            failed_attempts,
            duration_secs,
            reason = ?stop_reason,
            "suite finished"
        );

        Ok(SuiteSummary {
            suite_id: suite.id,
            creation_time: suite.creation_time,
            end_time,
            duration_secs,
            sequence_count: progress.sequence_count,
            failed_attempts,
            stop_reason,
            output_dir: paths.root,
            sequence_files,
        })
    }

    async fn run_sequence(
        &mut self,
        suite_id: &str,
        paths: &OutputPaths,
        index: u32,
    ) -> Result<FinishedSequence, GenerationError> {
        let mut sequence = self.sequences.initialize().await?;
        tracing::debug!(suite = suite_id, index = index + 1, "generating sequence");

        let end = match self.sequences.explore(&mut sequence, suite_id).await {
            Ok(end) => end,
            Err(err) => {
                self.sequences.abandon(sequence).await;
                return Err(err);
            }
        };
        self.sequences.leave(&mut sequence).await;
        self.collect_artifacts(paths, index).await;
        self.sequences
            .finalize(sequence, suite_id, &paths.sequences, index, end)
            .await
    }

    async fn prepare_device(&self) {
        if let Err(err) = device_call("clear_app_data", self.device_timeout, self.agent.clear_app_data()).await {
            tracing::warn!(error = %err, "could not clear app data");
        }
        if let Err(err) = device_call("clear_logs", self.device_timeout, self.agent.clear_logs()).await {
            tracing::warn!(error = %err, "could not clear device logs");
        }
    }

    async fn collect_artifacts(&self, paths: &OutputPaths, index: u32) {
        let limit = self.device_timeout;
        if let Err(err) = device_call("pull_coverage", limit, self.agent.pull_coverage(&paths.coverage, index)).await {
            tracing::warn!(error = %err, "could not pull coverage");
        }

        let pid = match device_call(
            "find_process_id",
            limit,
            self.agent.find_process_id(self.sequences.app_package()),
        )
        .await
        {
            Ok(pid) => pid,
            Err(err) => {
                tracing::warn!(error = %err, "could not find app process; skipping logs");
                return;
            }
        };
        if let Err(err) = device_call("pull_logs", limit, self.agent.pull_logs(&pid, &paths.logs, index)).await {
            tracing::warn!(error = %err, "could not pull logs");
        }
    }

    async fn teardown_device(&self) {
        if let Err(err) = device_call("clear_app_data", self.device_timeout, self.agent.clear_app_data()).await {
            tracing::warn!(error = %err, "could not reset app after sequence");
        }
    }
}
