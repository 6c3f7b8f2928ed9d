use serde::{Deserialize, Serialize};

use crate::types::Event;

/// On-disk form of a finished sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceFile {
    pub events: Vec<Event>,
    pub length: usize,
}

impl SequenceFile {
    pub fn new(events: Vec<Event>) -> Self {
        let length = events.len();
        Self { events, length }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sequence declares {declared} events but contains {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

pub fn parse_sequence_file(json: &str) -> Result<SequenceFile, ParseError> {
    let file: SequenceFile = serde_json::from_str(json)?;
    if file.length != file.events.len() {
        return Err(ParseError::LengthMismatch {
            declared: file.length,
            actual: file.events.len(),
        });
    }
    Ok(file)
}
