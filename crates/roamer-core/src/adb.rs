//! Device agent backed by the `adb` command-line tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use roamer_explore::output::{coverage_file_name, log_file_name};
use roamer_explore::traversal::driver::{DeviceAgent, DeviceError};
use tokio::process::Command;

use crate::config::AdbConfig;

pub struct AdbAgent {
    adb: PathBuf,
    package: String,
    coverage_device_path: String,
    coverage_broadcast: Option<String>,
}

impl AdbAgent {
    pub fn new(config: &AdbConfig, package: impl Into<String>) -> Self {
        Self {
            adb: config.adb_path.clone(),
            package: package.into(),
            coverage_device_path: config.coverage_device_path.clone(),
            coverage_broadcast: config.coverage_broadcast.clone(),
        }
    }

    /// Run `adb <args>` and return its stdout. A non-zero exit is an error
    /// carrying stderr.
    async fn run(&self, args: &[&str]) -> Result<String, DeviceError> {
        tracing::debug!(args = ?args, "adb");
        let output = Command::new(&self.adb)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DeviceError::Command {
                command: format!("adb {}", args.join(" ")),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// First pid in `pidof` output.
fn parse_pid(stdout: &str) -> Option<&str> {
    stdout.split_whitespace().next()
}

#[async_trait]
impl DeviceAgent for AdbAgent {
    async fn clear_app_data(&self) -> Result<(), DeviceError> {
        self.run(&["shell", "pm", "clear", self.package.as_str()]).await?;
        Ok(())
    }

    async fn clear_logs(&self) -> Result<(), DeviceError> {
        self.run(&["logcat", "-c"]).await?;
        Ok(())
    }

    async fn find_process_id(&self, package: &str) -> Result<String, DeviceError> {
        let stdout = self.run(&["shell", "pidof", package]).await?;
        parse_pid(&stdout)
            .map(str::to_string)
            .ok_or_else(|| DeviceError::Command {
                command: format!("adb shell pidof {package}"),
                message: "process not running".to_string(),
            })
    }

    async fn pull_coverage(&self, dest: &Path, index: u32) -> Result<PathBuf, DeviceError> {
        if let Some(action) = &self.coverage_broadcast {
            self.run(&["shell", "am", "broadcast", "-a", action.as_str()]).await?;
        }
        let path = dest.join(coverage_file_name(index));
        self.run(&["pull", self.coverage_device_path.as_str(), &*path.to_string_lossy()])
            .await?;
        Ok(path)
    }

    async fn pull_logs(&self, pid: &str, dest: &Path, index: u32) -> Result<PathBuf, DeviceError> {
        let pid_filter = format!("--pid={pid}");
        let log = self.run(&["logcat", "-d", pid_filter.as_str()]).await?;
        let path = dest.join(log_file_name(index));
        tokio::fs::write(&path, log).await?;
        Ok(path)
    }
}
