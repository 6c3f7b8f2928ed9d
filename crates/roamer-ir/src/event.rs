//! Synthetic events the generator injects around driver-offered ones.

use chrono::Utc;

use crate::types::{key_code, Action, ActionKind, Event, SelectorKind, State, Target, TargetState, WidgetType};

/// The launch event that seeds every sequence. It is born complete: the app
/// start screen is both its pre- and post-condition.
pub fn launch_event(start_state: &State) -> Event {
    let target = Target {
        selector: SelectorKind::System,
        selector_value: "launch".to_string(),
        description: "Launch application".to_string(),
        widget: WidgetType::App,
        state: TargetState::Enabled,
    };
    Event {
        actions: vec![Action::new(ActionKind::Launch, target)],
        precondition: start_state.clone(),
        postcondition: Some(start_state.clone()),
        executed_at: Some(Utc::now()),
    }
}

/// HOME key press on the given screen (partial).
pub fn home_event(state: &State) -> Event {
    let target = Target::system_key(key_code::HOME, "Home navigation");
    Event::partial(vec![Action::new(ActionKind::Home, target)], state.clone())
}

/// BACK key press on the given screen (partial).
pub fn back_event(state: &State) -> Event {
    let target = Target::system_key(key_code::BACK, "Back navigation");
    Event::partial(vec![Action::new(ActionKind::Back, target)], state.clone())
}

/// Complete a partial event with the state observed after executing it.
pub fn synthesize(partial: Event, resulting_state: State) -> Event {
    Event {
        postcondition: Some(resulting_state),
        executed_at: Some(Utc::now()),
        ..partial
    }
}
