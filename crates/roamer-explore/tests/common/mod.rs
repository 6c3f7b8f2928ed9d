#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use roamer_explore::output::{coverage_file_name, log_file_name};
use roamer_explore::traversal::criteria::default_termination;
use roamer_explore::traversal::driver::{DeviceAgent, DeviceError, Driver, DriverError, SessionFactory};
use roamer_explore::traversal::sequence::{SequenceConfig, SequenceGenerator};
use roamer_explore::traversal::strategy::LeastFrequentStrategy;
use roamer_ir::{Action, ActionKind, Event, SelectorKind, State, Target, TargetState, WidgetType};
use roamer_store::KnowledgeBase;

pub const APP: &str = "com.example.notes";
pub const LAUNCHER: &str = "com.android.launcher";
pub const ACTIVITY: &str = ".MainActivity";
/// Transition target meaning "the app was left".
pub const OUTSIDE: &str = "outside";

/// A toy app: screens keyed by state id, each offering clickable buttons
/// that lead to another screen.
#[derive(Debug, Clone)]
pub struct MockApp {
    start: String,
    screens: HashMap<String, Vec<(String, String)>>,
    text_fields: HashMap<String, Vec<String>>,
}

impl MockApp {
    pub fn new(start: &str) -> Self {
        Self {
            start: start.to_string(),
            screens: HashMap::new(),
            text_fields: HashMap::new(),
        }
    }

    /// Add a screen with `(button id, next state id)` pairs.
    pub fn screen(mut self, state_id: &str, buttons: &[(&str, &str)]) -> Self {
        self.screens.insert(
            state_id.to_string(),
            buttons
                .iter()
                .map(|(id, next)| (id.to_string(), next.to_string()))
                .collect(),
        );
        self
    }

    /// Add an editable text field to a screen. Typing keeps the screen.
    pub fn text_field(mut self, state_id: &str, id: &str) -> Self {
        self.text_fields
            .entry(state_id.to_string())
            .or_default()
            .push(id.to_string());
        self
    }

    pub fn start_state(&self) -> State {
        State::new(ACTIVITY, self.start.as_str())
    }
}

pub fn button(id: &str) -> Target {
    Target {
        selector: SelectorKind::Id,
        selector_value: id.to_string(),
        description: id.to_string(),
        widget: WidgetType::Button,
        state: TargetState::Enabled,
    }
}

/// The partial click event the mock driver offers for `id` on `state_id`.
pub fn click(id: &str, state_id: &str) -> Event {
    Event::partial(
        vec![Action::new(ActionKind::Click, button(id))],
        State::new(ACTIVITY, state_id),
    )
}

/// The partial text-entry event the mock driver offers for field `id`.
pub fn text_entry(id: &str, state_id: &str) -> Event {
    let target = Target {
        widget: WidgetType::EditText,
        ..button(id)
    };
    Event::partial(
        vec![Action::new(ActionKind::TextEntry, target)],
        State::new(ACTIVITY, state_id),
    )
}

/// Failure injection for the mock driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// The first `fail_open` session opens fail.
    pub fail_open: u32,
    /// The n-th execute of every session fails (1-based).
    pub fail_execute_at: Option<usize>,
    /// Every execute hangs forever.
    pub hang_execute: bool,
}

#[derive(Debug, Default)]
pub struct DriverLog {
    pub opened: u32,
    pub closed: u32,
    pub executed: Vec<Event>,
}

impl DriverLog {
    pub fn executed_values(&self) -> Vec<String> {
        self.executed
            .iter()
            .map(|e| e.actions[0].target.selector_value.clone())
            .collect()
    }
}

pub struct MockDriver {
    app: Arc<MockApp>,
    faults: Faults,
    log: Arc<Mutex<DriverLog>>,
    state: String,
    package: String,
    executes: usize,
}

#[async_trait]
impl Driver for MockDriver {
    async fn available_events(&mut self) -> Result<Vec<Event>, DriverError> {
        let buttons = self.app.screens.get(&self.state).cloned().unwrap_or_default();
        let fields = self.app.text_fields.get(&self.state).cloned().unwrap_or_default();
        Ok(buttons
            .iter()
            .map(|(id, _)| click(id, &self.state))
            .chain(fields.iter().map(|id| text_entry(id, &self.state)))
            .collect())
    }

    async fn execute(&mut self, event: &Event) -> Result<(), DriverError> {
        self.executes += 1;
        self.log.lock().unwrap().executed.push(event.clone());

        if self.faults.hang_execute {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.faults.fail_execute_at == Some(self.executes) {
            return Err(DriverError::Failed("injected execute failure".into()));
        }

        let action = &event.actions[0];
        match action.kind {
            ActionKind::Click => {
                let next = self
                    .app
                    .screens
                    .get(&self.state)
                    .and_then(|buttons| buttons.iter().find(|(id, _)| *id == action.target.selector_value))
                    .map(|(_, next)| next.clone())
                    .ok_or_else(|| DriverError::ElementNotFound(action.target.selector_value.clone()))?;
                if next == OUTSIDE {
                    self.package = LAUNCHER.to_string();
                }
                self.state = next;
            }
            ActionKind::Back => self.state = self.app.start.clone(),
            ActionKind::Home => self.package = LAUNCHER.to_string(),
            _ => {}
        }
        Ok(())
    }

    async fn current_state(&mut self) -> Result<State, DriverError> {
        Ok(State::new(ACTIVITY, self.state.as_str()))
    }

    async fn current_package(&mut self) -> Result<String, DriverError> {
        Ok(self.package.clone())
    }
}

pub struct MockSessions {
    app: Arc<MockApp>,
    faults: Faults,
    opens: AtomicU32,
    pub log: Arc<Mutex<DriverLog>>,
}

impl MockSessions {
    pub fn new(app: MockApp, faults: Faults) -> Self {
        Self {
            app: Arc::new(app),
            faults,
            opens: AtomicU32::new(0),
            log: Arc::new(Mutex::new(DriverLog::default())),
        }
    }
}

#[async_trait]
impl SessionFactory for MockSessions {
    type Driver = MockDriver;

    async fn open(&self) -> Result<MockDriver, DriverError> {
        let attempt = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.faults.fail_open {
            return Err(DriverError::Session("device offline".into()));
        }
        self.log.lock().unwrap().opened += 1;
        Ok(MockDriver {
            app: Arc::clone(&self.app),
            faults: self.faults,
            log: Arc::clone(&self.log),
            state: self.app.start.clone(),
            package: APP.to_string(),
            executes: 0,
        })
    }

    async fn close(&self, _driver: MockDriver) -> Result<(), DriverError> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Records every device call and writes placeholder artifacts.
#[derive(Debug, Clone, Default)]
pub struct RecordingAgent {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingAgent {
    fn note(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DeviceAgent for RecordingAgent {
    async fn clear_app_data(&self) -> Result<(), DeviceError> {
        self.note("clear_app_data".into());
        Ok(())
    }

    async fn clear_logs(&self) -> Result<(), DeviceError> {
        self.note("clear_logs".into());
        Ok(())
    }

    async fn find_process_id(&self, package: &str) -> Result<String, DeviceError> {
        self.note(format!("find_process_id:{package}"));
        Ok("4242".into())
    }

    async fn pull_coverage(&self, dest: &Path, index: u32) -> Result<PathBuf, DeviceError> {
        self.note(format!("pull_coverage:{index}"));
        let path = dest.join(coverage_file_name(index));
        std::fs::write(&path, b"coverage")?;
        Ok(path)
    }

    async fn pull_logs(&self, pid: &str, dest: &Path, index: u32) -> Result<PathBuf, DeviceError> {
        self.note(format!("pull_logs:{pid}:{index}"));
        let path = dest.join(log_file_name(index));
        std::fs::write(&path, b"log")?;
        Ok(path)
    }
}

/// Agent whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokenAgent;

#[async_trait]
impl DeviceAgent for BrokenAgent {
    async fn clear_app_data(&self) -> Result<(), DeviceError> {
        Err(broken("clear_app_data"))
    }

    async fn clear_logs(&self) -> Result<(), DeviceError> {
        Err(broken("clear_logs"))
    }

    async fn find_process_id(&self, _package: &str) -> Result<String, DeviceError> {
        Err(broken("pidof"))
    }

    async fn pull_coverage(&self, _dest: &Path, _index: u32) -> Result<PathBuf, DeviceError> {
        Err(broken("pull"))
    }

    async fn pull_logs(&self, _pid: &str, _dest: &Path, _index: u32) -> Result<PathBuf, DeviceError> {
        Err(broken("logcat"))
    }
}

fn broken(command: &str) -> DeviceError {
    DeviceError::Command {
        command: command.to_string(),
        message: "no devices/emulators found".to_string(),
    }
}

/// Least-frequent selection, repeat detection plus an event ceiling.
pub fn sequence_generator(
    store: Arc<dyn KnowledgeBase>,
    sessions: MockSessions,
    max_events: usize,
) -> SequenceGenerator<MockSessions> {
    SequenceGenerator::new(
        store,
        sessions,
        Box::new(LeastFrequentStrategy),
        Box::new(default_termination(max_events)),
        SequenceConfig {
            app_package: APP.to_string(),
            driver_timeout: Duration::from_secs(5),
            event_interval: Duration::ZERO,
            text_entry_values: Vec::new(),
            seed: 0,
        },
    )
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
