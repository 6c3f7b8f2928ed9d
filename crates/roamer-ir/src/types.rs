use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Actions ──────────────────────────────────────────────────────────

/// The closed set of interactions a driver can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Click,
    LongClick,
    Check,
    Uncheck,
    SwipeUp,
    SwipeDown,
    SwipeLeft,
    SwipeRight,
    TextEntry,
    Home,
    Back,
    Enter,
    Launch,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::LongClick => "long-click",
            ActionKind::Check => "check",
            ActionKind::Uncheck => "uncheck",
            ActionKind::SwipeUp => "swipe-up",
            ActionKind::SwipeDown => "swipe-down",
            ActionKind::SwipeLeft => "swipe-left",
            ActionKind::SwipeRight => "swipe-right",
            ActionKind::TextEntry => "text-entry",
            ActionKind::Home => "home",
            ActionKind::Back => "back",
            ActionKind::Enter => "enter",
            ActionKind::Launch => "launch",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a target element is located on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Id,
    Xpath,
    /// System key press; the selector value is an Android key code.
    System,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Id => "id",
            SelectorKind::Xpath => "xpath",
            SelectorKind::System => "system",
        }
    }
}

/// Android key codes used by system selectors.
pub mod key_code {
    pub const HOME: u32 = 3;
    pub const BACK: u32 = 4;
}

/// UI widget class reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetType {
    App,
    Nav,
    Spinner,
    EditText,
    TextView,
    Button,
    RadioButton,
    CheckBox,
    ImageButton,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Enabled,
    Disabled,
}

/// The element an action is aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub selector: SelectorKind,
    pub selector_value: String,
    pub description: String,
    #[serde(rename = "type")]
    pub widget: WidgetType,
    pub state: TargetState,
}

impl Target {
    /// A system key target (home, back) addressed by key code.
    pub fn system_key(code: u32, description: &str) -> Self {
        Self {
            selector: SelectorKind::System,
            selector_value: code.to_string(),
            description: description.to_string(),
            widget: WidgetType::Nav,
            state: TargetState::Enabled,
        }
    }
}

/// An atomic interaction: what to do, to which element, with what payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind, target: Target) -> Self {
        Self {
            kind,
            target,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

// ── States and events ────────────────────────────────────────────────

/// Screen identity as observed through the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(rename = "activityName")]
    pub activity: String,
    pub state_id: String,
}

impl State {
    pub fn new(activity: impl Into<String>, state_id: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            state_id: state_id.into(),
        }
    }
}

/// One step of a sequence.
///
/// A driver offers *partial* events (precondition only). Executing one and
/// observing the resulting screen yields a *complete* event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub actions: Vec<Action>,
    pub precondition: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcondition: Option<State>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl Event {
    /// A partial event offered by the driver on the given screen.
    pub fn partial(actions: Vec<Action>, precondition: State) -> Self {
        Self {
            actions,
            precondition,
            postcondition: None,
            executed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.postcondition.is_some()
    }

    /// Widget class of the first action's target, used by priority-based selection.
    pub fn widget(&self) -> WidgetType {
        self.actions
            .first()
            .map(|a| a.target.widget)
            .unwrap_or(WidgetType::Unknown)
    }
}
