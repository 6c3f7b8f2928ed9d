//! Wiring: configuration in, one finished suite out.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use roamer_explore::traversal::criteria::{default_termination, StopHandle};
use roamer_explore::traversal::driver::{DeviceAgent, SessionFactory};
use roamer_explore::traversal::sequence::SequenceGenerator;
use roamer_explore::traversal::strategy::{
    FrequencyWeightedStrategy, LeastFrequentStrategy, SelectionStrategy, UniformRandomStrategy,
    WidgetPriorityStrategy,
};
use roamer_explore::traversal::suite::{SuiteGenerator, SuiteSummary};
use roamer_explore::GenerationError;
use roamer_store::{KnowledgeBase, SqliteStore, StoreError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, GeneratorConfig, StrategyKind};
use crate::telemetry::init_logging;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot prepare {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Knowledge base error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Interrupted while a sequence was in progress")]
    Interrupted,
}

/// The selection strategy named by the config, seeded from `config.seed`.
pub fn build_strategy(config: &GeneratorConfig) -> Box<dyn SelectionStrategy> {
    match config.strategy {
        StrategyKind::LeastFrequent => Box::new(LeastFrequentStrategy),
        StrategyKind::FrequencyWeighted => {
            Box::new(FrequencyWeightedStrategy::new(ChaCha8Rng::seed_from_u64(config.seed)))
        }
        StrategyKind::UniformRandom => Box::new(UniformRandomStrategy::new(ChaCha8Rng::seed_from_u64(config.seed))),
        StrategyKind::WidgetPriority => Box::new(
            config
                .widget_priority
                .clone()
                .map(WidgetPriorityStrategy::new)
                .unwrap_or_default(),
        ),
    }
}

/// Install logging from `config.log_filter`, open the SQLite knowledge base
/// at `config.database_path` and run one suite.
pub async fn run_generation<F, A>(
    config: &GeneratorConfig,
    sessions: F,
    agent: A,
) -> Result<SuiteSummary, EngineError>
where
    F: SessionFactory,
    A: DeviceAgent,
{
    if !init_logging(&config.log_filter) {
        tracing::debug!("keeping the already installed subscriber");
    }
    config.validate()?;
    if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| EngineError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let store = SqliteStore::open(&config.database_path)?;
    tracing::debug!(database = %config.database_path.display(), "knowledge base open");

    run_with_store(config, Arc::new(store), sessions, agent).await
}

/// Run one suite against an already-open knowledge base. Logging is left to
/// the caller.
///
/// With `stop_on_ctrl_c`, the first Ctrl-C lets the current sequence finish
/// and the second abandons it. An abandoned suite is not finalized.
pub async fn run_with_store<F, A>(
    config: &GeneratorConfig,
    store: Arc<dyn KnowledgeBase>,
    sessions: F,
    agent: A,
) -> Result<SuiteSummary, EngineError>
where
    F: SessionFactory,
    A: DeviceAgent,
{
    config.validate()?;
    let strategy = build_strategy(config);
    tracing::info!(
        package = %config.app_package,
        strategy = strategy.name(),
        max_events = config.max_events_per_sequence,
        "starting generation"
    );

    let stop = StopHandle::new();
    let sequences = SequenceGenerator::new(
        Arc::clone(&store),
        sessions,
        strategy,
        Box::new(default_termination(config.max_events_per_sequence)),
        config.sequence_config(),
    );
    let completion = config.budget.completion_criteria(Some(stop.clone()));
    let mut suite = SuiteGenerator::new(store, sequences, agent, Box::new(completion), config.timeouts.device());

    let force = Arc::new(Notify::new());
    let ctrl_c = config
        .stop_on_ctrl_c
        .then(|| watch_signals(tokio::signal::ctrl_c, stop, Arc::clone(&force)));
    let result = run_until_forced(&mut suite, &config.output_dir, &force).await;
    if let Some(watcher) = ctrl_c {
        watcher.abort();
    }

    result
}

async fn run_until_forced<F, A>(
    suite: &mut SuiteGenerator<F, A>,
    output_dir: &Path,
    force: &Notify,
) -> Result<SuiteSummary, EngineError>
where
    F: SessionFactory,
    A: DeviceAgent,
{
    tokio::select! {
        result = suite.run(output_dir) => Ok(result?),
        () = force.notified() => Err(EngineError::Interrupted),
    }
}

/// First signal requests a graceful stop, the second forces one.
fn watch_signals<S, Fut>(mut next_signal: S, stop: StopHandle, force: Arc<Notify>) -> JoinHandle<()>
where
    S: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = std::io::Result<()>> + Send,
{
    tokio::spawn(async move {
        if next_signal().await.is_err() {
            return;
        }
        tracing::warn!("stop requested; finishing the current sequence (interrupt again to abort it)");
        stop.request_stop();

        if next_signal().await.is_ok() {
            tracing::error!("second stop request; abandoning the current sequence");
            force.notify_one();
        }
    })
}
