pub mod error;
pub mod output;
pub mod traversal;

pub use error::GenerationError;
