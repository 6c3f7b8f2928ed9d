use roamer_store::StoreError;

use crate::output::OutputError;
use crate::traversal::driver::DriverError;

/// Failure of one sequence attempt.
///
/// Driver faults cost the suite one attempt. Store and output faults abort
/// the suite: losing bookkeeping would break deduplication. A strategy that
/// picks outside its candidates is a bug and aborts too.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Knowledge base error: {0}")]
    Store(#[from] StoreError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Strategy `{strategy}` selected index {index} of {candidates} candidates")]
    Selection {
        strategy: String,
        index: usize,
        candidates: usize,
    },
}

impl GenerationError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GenerationError::Driver(_))
    }
}
