pub mod event;
pub mod hash;
pub mod parse;
pub mod types;

pub use hash::{fingerprint_event, fingerprint_sequence, Fingerprint};
pub use types::{Action, ActionKind, Event, SelectorKind, State, Target, TargetState, WidgetType};
