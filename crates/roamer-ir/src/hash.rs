//! Event and sequence fingerprints.
//!
//! An event's identity is its action kinds, target selectors and the
//! precondition state id. Timestamps, the observed postcondition and
//! presentation details (description, widget class, text payload) are not
//! part of it, so a partial event offered by the driver and the complete
//! event synthesized from it share one fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::types::Event;

/// SHA-256 digest rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    fn from_digest(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Canonical serialization of an event. `json!` objects are key-sorted,
/// which keeps the byte form stable.
fn canonical_form(event: &Event) -> String {
    let actions: Vec<_> = event
        .actions
        .iter()
        .map(|a| {
            json!({
                "kind": a.kind.as_str(),
                "selector": a.target.selector.as_str(),
                "selector_value": a.target.selector_value,
            })
        })
        .collect();

    json!({
        "actions": actions,
        "precondition": event.precondition.state_id,
    })
    .to_string()
}

pub fn fingerprint_event(event: &Event) -> Fingerprint {
    let digest = Sha256::digest(canonical_form(event).as_bytes());
    Fingerprint::from_digest(&digest)
}

/// Order-sensitive fingerprint of a whole sequence.
pub fn fingerprint_sequence(events: &[Event]) -> Fingerprint {
    let mut hasher = Sha256::new();
    for event in events {
        hasher.update(fingerprint_event(event).as_str().as_bytes());
        hasher.update(b"\n");
    }
    Fingerprint::from_digest(&hasher.finalize())
}
