//! Contracts for the external collaborators: the UI-automation driver and
//! the device-control agent.
//!
//! Every call the generators make through these traits goes through
//! [`with_timeout`] / [`device_call`], so a hung backend surfaces as an
//! ordinary error instead of stalling the suite.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use roamer_ir::{Event, State};

/// Transient automation failure. Always recoverable at suite level.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Driver session error: {0}")]
    Session(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Driver call `{operation}` timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Driver failure: {0}")]
    Failed(String),
}

/// Device-agent failure. Logged and ignored by the suite generator.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Device call `{operation}` timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live automation session against the app under test.
#[async_trait]
pub trait Driver: Send {
    /// Partial events actionable on the current screen.
    async fn available_events(&mut self) -> Result<Vec<Event>, DriverError>;

    async fn execute(&mut self, event: &Event) -> Result<(), DriverError>;

    async fn current_state(&mut self) -> Result<State, DriverError>;

    /// Package name of the foreground application.
    async fn current_package(&mut self) -> Result<String, DriverError>;
}

/// Opens and closes driver sessions, one per sequence.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Driver: Driver;

    async fn open(&self) -> Result<Self::Driver, DriverError>;

    async fn close(&self, driver: Self::Driver) -> Result<(), DriverError>;
}

/// Device-level control: app data, logs and coverage artifacts.
#[async_trait]
pub trait DeviceAgent: Send + Sync {
    async fn clear_app_data(&self) -> Result<(), DeviceError>;

    async fn clear_logs(&self) -> Result<(), DeviceError>;

    async fn find_process_id(&self, package: &str) -> Result<String, DeviceError>;

    /// Pull the coverage file for sequence `index` into `dest`.
    async fn pull_coverage(&self, dest: &Path, index: u32) -> Result<PathBuf, DeviceError>;

    /// Dump the log of process `pid` for sequence `index` into `dest`.
    async fn pull_logs(&self, pid: &str, dest: &Path, index: u32) -> Result<PathBuf, DeviceError>;
}

/// Agent for runs without device control. Every call succeeds and pulls nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDeviceAgent;

#[async_trait]
impl DeviceAgent for NullDeviceAgent {
    async fn clear_app_data(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn clear_logs(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn find_process_id(&self, _package: &str) -> Result<String, DeviceError> {
        Ok(String::new())
    }

    async fn pull_coverage(&self, dest: &Path, _index: u32) -> Result<PathBuf, DeviceError> {
        Ok(dest.to_path_buf())
    }

    async fn pull_logs(&self, _pid: &str, dest: &Path, _index: u32) -> Result<PathBuf, DeviceError> {
        Ok(dest.to_path_buf())
    }
}

/// Bound a driver call. Expiry is a driver failure.
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout {
            operation,
            after: limit,
        }),
    }
}

/// Bound a device-agent call.
pub async fn device_call<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, DeviceError>
where
    F: Future<Output = Result<T, DeviceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(DeviceError::Timeout {
            operation,
            after: limit,
        }),
    }
}
