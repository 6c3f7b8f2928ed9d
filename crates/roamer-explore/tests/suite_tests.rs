mod common;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use roamer_explore::traversal::criteria::{
    AnyCompletion, CompletionCriterion, FailureBudget, SequenceBudget, StopHandle, StopReason, StopRequested,
    TimeBudget,
};
use roamer_explore::traversal::driver::{DeviceAgent, DeviceError};
use roamer_explore::traversal::suite::SuiteGenerator;
use roamer_explore::GenerationError;
use roamer_ir::{ActionKind, Fingerprint};
use roamer_store::{FrequencyTable, KnowledgeBase, MemoryStore, StoreError, SuiteInfo, SuiteRecord};

fn two_button_app() -> MockApp {
    MockApp::new("s0").screen("s0", &[("a", "s0"), ("b", "s0")])
}

fn budget(sequences: u32) -> Box<dyn CompletionCriterion> {
    Box::new(AnyCompletion(vec![
        Box::new(SequenceBudget(sequences)),
        Box::new(FailureBudget(3)),
    ]))
}

fn suite<A: DeviceAgent>(
    store: Arc<dyn KnowledgeBase>,
    sessions: MockSessions,
    agent: A,
    completion: Box<dyn CompletionCriterion>,
) -> SuiteGenerator<MockSessions, A> {
    let sequences = sequence_generator(Arc::clone(&store), sessions, 3);
    SuiteGenerator::new(store, sequences, agent, completion, Duration::from_secs(5))
}

#[tokio::test]
async fn test_suite_writes_one_file_per_sequence() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let sessions = MockSessions::new(two_button_app(), Faults::default());
    let mut generator = suite(store.clone(), sessions, RecordingAgent::default(), budget(2));

    let summary = generator.run(dir.path()).await.unwrap();

    assert_eq!(summary.sequence_count, 2);
    assert_eq!(summary.failed_attempts, 0);
    assert_eq!(summary.stop_reason, StopReason::SequenceLimitReached);
    assert_eq!(
        summary.output_dir,
        dir.path().join(format!("{APP}_{}", summary.creation_time))
    );

    let names = files_in(&summary.output_dir.join("sequences"));
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("seq001_"));
    assert!(names[1].starts_with("seq002_"));
    assert_eq!(summary.sequence_files.len(), 2);

    // Both sequences are [launch, a, b]; the store keeps one row.
    assert_eq!(store.sequence_count(&summary.suite_id).unwrap(), 1);
}

#[tokio::test]
async fn test_suite_is_finalized_with_duration() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let sessions = MockSessions::new(two_button_app(), Faults::default());
    let mut generator = suite(store.clone(), sessions, RecordingAgent::default(), budget(1));

    let summary = generator.run(dir.path()).await.unwrap();

    let record = store.suite_details(&summary.suite_id).unwrap();
    assert_eq!(record.creation_time, summary.creation_time);
    assert_eq!(record.end_time, Some(summary.end_time));
    assert_eq!(record.duration, Some(summary.end_time - summary.creation_time));
    assert_eq!(summary.duration_secs, summary.end_time - summary.creation_time);
}

#[tokio::test]
async fn test_device_calls_around_each_sequence() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let sessions = MockSessions::new(two_button_app(), Faults::default());
    let agent = RecordingAgent::default();
    let calls = Arc::clone(&agent.calls);
    let mut generator = suite(store, sessions, agent, budget(2));

    let summary = generator.run(dir.path()).await.unwrap();

    let expected: Vec<String> = [0, 1]
        .iter()
        .flat_map(|i| {
            vec![
                "clear_app_data".to_string(),
                "clear_logs".to_string(),
                format!("pull_coverage:{i}"),
                format!("find_process_id:{APP}"),
                format!("pull_logs:4242:{i}"),
                "clear_app_data".to_string(),
            ]
        })
        .collect();
    assert_eq!(*calls.lock().unwrap(), expected);
    assert_eq!(
        files_in(&summary.output_dir.join("coverage")),
        ["coverage001.ec", "coverage002.ec"]
    );
    assert_eq!(files_in(&summary.output_dir.join("logs")), ["log001.txt", "log002.txt"]);
}

/// Snapshots the driver log whenever an artifact is pulled.
struct SessionWatchingAgent {
    driver: Arc<Mutex<DriverLog>>,
    /// `(sessions open, last executed action)` at each pull.
    seen: Arc<Mutex<Vec<(u32, Option<ActionKind>)>>>,
}

impl SessionWatchingAgent {
    fn snapshot(&self) {
        let log = self.driver.lock().unwrap();
        let last = log.executed.last().map(|e| e.actions[0].kind);
        self.seen.lock().unwrap().push((log.opened - log.closed, last));
    }
}

#[async_trait]
impl DeviceAgent for SessionWatchingAgent {
    async fn clear_app_data(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn clear_logs(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn find_process_id(&self, _package: &str) -> Result<String, DeviceError> {
        self.snapshot();
        Ok("4242".into())
    }

    async fn pull_coverage(&self, dest: &Path, _index: u32) -> Result<PathBuf, DeviceError> {
        self.snapshot();
        Ok(dest.to_path_buf())
    }

    async fn pull_logs(&self, _pid: &str, dest: &Path, _index: u32) -> Result<PathBuf, DeviceError> {
        self.snapshot();
        Ok(dest.to_path_buf())
    }
}

#[tokio::test]
async fn test_artifacts_are_pulled_after_home_press_while_session_is_open() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let sessions = MockSessions::new(two_button_app(), Faults::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let agent = SessionWatchingAgent {
        driver: Arc::clone(&sessions.log),
        seen: Arc::clone(&seen),
    };
    let mut generator = suite(store, sessions, agent, budget(1));

    generator.run(dir.path()).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|snapshot| *snapshot == (1, Some(ActionKind::Home))));
}

#[tokio::test]
async fn test_device_agent_failures_are_ignored() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let sessions = MockSessions::new(two_button_app(), Faults::default());
    let mut generator = suite(store, sessions, BrokenAgent, budget(2));

    let summary = generator.run(dir.path()).await.unwrap();

    assert_eq!(summary.sequence_count, 2);
    assert!(files_in(&summary.output_dir.join("coverage")).is_empty());
}

#[tokio::test]
async fn test_driver_failure_costs_one_attempt() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let faults = Faults {
        fail_open: 1,
        ..Default::default()
    };
    let sessions = MockSessions::new(two_button_app(), faults);
    let mut generator = suite(store, sessions, RecordingAgent::default(), budget(2));

    let summary = generator.run(dir.path()).await.unwrap();

    assert_eq!(summary.sequence_count, 2);
    assert_eq!(summary.failed_attempts, 1);
    assert_eq!(files_in(&summary.output_dir.join("sequences")).len(), 2);
}

#[tokio::test]
async fn test_persistent_driver_failure_exhausts_failure_budget() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let faults = Faults {
        fail_open: u32::MAX,
        ..Default::default()
    };
    let sessions = MockSessions::new(two_button_app(), faults);
    let mut generator = suite(store.clone(), sessions, RecordingAgent::default(), budget(2));

    let summary = generator.run(dir.path()).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::TooManyFailures);
    assert_eq!(summary.sequence_count, 0);
    assert_eq!(summary.failed_attempts, 3);
    assert!(store.suite_details(&summary.suite_id).unwrap().end_time.is_some());
}

#[tokio::test]
async fn test_stop_request_ends_suite_before_next_sequence() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let sessions = MockSessions::new(two_button_app(), Faults::default());
    let log = Arc::clone(&sessions.log);
    let handle = StopHandle::new();
    handle.request_stop();
    let completion = Box::new(AnyCompletion(vec![
        Box::new(StopRequested(handle)),
        Box::new(SequenceBudget(5)),
    ]));
    let mut generator = suite(store, sessions, RecordingAgent::default(), completion);

    let summary = generator.run(dir.path()).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::StopRequested);
    assert_eq!(summary.sequence_count, 0);
    assert_eq!(log.lock().unwrap().opened, 0);
}

#[tokio::test]
async fn test_exhausted_time_budget_runs_nothing() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let sessions = MockSessions::new(two_button_app(), Faults::default());
    let mut generator = suite(
        store,
        sessions,
        RecordingAgent::default(),
        Box::new(TimeBudget(Duration::ZERO)),
    );

    let summary = generator.run(dir.path()).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::WallTimeExceeded);
    assert_eq!(summary.sequence_count, 0);
}

/// Delegates to a memory store but refuses to record sequences.
struct ReadOnlyStore(MemoryStore);

impl KnowledgeBase for ReadOnlyStore {
    fn create_suite(&self) -> Result<SuiteInfo, StoreError> {
        self.0.create_suite()
    }

    fn finalize_suite(&self, suite_id: &str, end_time: i64, duration: i64) -> Result<(), StoreError> {
        self.0.finalize_suite(suite_id, end_time, duration)
    }

    fn suite_details(&self, suite_id: &str) -> Result<SuiteRecord, StoreError> {
        self.0.suite_details(suite_id)
    }

    fn record_sequence(&self, _: &Fingerprint, _: &str, _: i64, _: i64) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }

    fn sequence_seen(&self, suite_id: &str, sequence_hash: &Fingerprint) -> Result<bool, StoreError> {
        self.0.sequence_seen(suite_id, sequence_hash)
    }

    fn sequence_count(&self, suite_id: &str) -> Result<u64, StoreError> {
        self.0.sequence_count(suite_id)
    }

    fn mark_terminal_event(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<(), StoreError> {
        self.0.mark_terminal_event(event_hash, suite_id)
    }

    fn is_terminal_event(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<bool, StoreError> {
        self.0.is_terminal_event(event_hash, suite_id)
    }

    fn bump_event_frequency(&self, event_hash: &Fingerprint, suite_id: &str) -> Result<(), StoreError> {
        self.0.bump_event_frequency(event_hash, suite_id)
    }

    fn event_frequencies(&self, event_hashes: &[Fingerprint], suite_id: &str) -> Result<FrequencyTable, StoreError> {
        self.0.event_frequencies(event_hashes, suite_id)
    }
}

#[tokio::test]
async fn test_store_failure_aborts_suite() {
    let store = Arc::new(ReadOnlyStore(MemoryStore::new()));
    let dir = tempfile::tempdir().unwrap();
    let sessions = MockSessions::new(two_button_app(), Faults::default());
    let log = Arc::clone(&sessions.log);
    let mut generator = suite(store, sessions, RecordingAgent::default(), budget(2));

    let err = generator.run(dir.path()).await.unwrap_err();

    assert!(matches!(err, GenerationError::Store(StoreError::Poisoned)));
    assert!(!err.is_recoverable());
    let log = log.lock().unwrap();
    assert_eq!(log.opened, 1);
    assert_eq!(log.closed, 1);
}
