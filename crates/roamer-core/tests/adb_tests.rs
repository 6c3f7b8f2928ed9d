#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use roamer_core::adb::AdbAgent;
use roamer_core::config::AdbConfig;
use roamer_explore::traversal::driver::{DeviceAgent, DeviceError};

/// A stand-in `adb` that logs its arguments and fakes the few outputs the
/// agent reads.
const FAKE_ADB: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.txt"
case "$1" in
  shell)
    if [ "$2" = "pidof" ]; then echo "4321"; fi
    if [ "$2" = "pm" ] && [ "$4" = "com.example.broken" ]; then echo "Failed" >&2; exit 1; fi
    ;;
  pull) echo "coverage" > "$3" ;;
  logcat) if [ "$2" = "-d" ]; then echo "I/notes: started"; fi ;;
esac
exit 0
"#;

fn install_fake_adb(dir: &Path) -> AdbConfig {
    let adb = dir.join("adb");
    std::fs::write(&adb, FAKE_ADB).unwrap();
    std::fs::set_permissions(&adb, std::fs::Permissions::from_mode(0o755)).unwrap();
    AdbConfig {
        adb_path: adb,
        coverage_device_path: "/sdcard/coverage.ec".to_string(),
        coverage_broadcast: Some("com.example.DUMP_COVERAGE".to_string()),
    }
}

#[tokio::test]
async fn test_adb_agent_commands() {
    let dir = tempfile::tempdir().unwrap();
    let config = install_fake_adb(dir.path());
    let artifacts = dir.path().join("artifacts");
    std::fs::create_dir(&artifacts).unwrap();

    let agent = AdbAgent::new(&config, "com.example.notes");
    agent.clear_app_data().await.unwrap();
    agent.clear_logs().await.unwrap();
    let pid = agent.find_process_id("com.example.notes").await.unwrap();
    let coverage = agent.pull_coverage(&artifacts, 0).await.unwrap();
    let log = agent.pull_logs(&pid, &artifacts, 0).await.unwrap();

    assert_eq!(pid, "4321");
    assert_eq!(coverage, artifacts.join("coverage001.ec"));
    assert_eq!(std::fs::read_to_string(&coverage).unwrap(), "coverage\n");
    assert_eq!(log, artifacts.join("log001.txt"));
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "I/notes: started\n");

    let calls = std::fs::read_to_string(dir.path().join("calls.txt")).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(
        calls,
        [
            "shell pm clear com.example.notes".to_string(),
            "logcat -c".to_string(),
            "shell pidof com.example.notes".to_string(),
            "shell am broadcast -a com.example.DUMP_COVERAGE".to_string(),
            format!("pull /sdcard/coverage.ec {}", coverage.display()),
            "logcat -d --pid=4321".to_string(),
        ]
    );

    // Non-zero exit surfaces as a command error with stderr attached.
    let broken = AdbAgent::new(&config, "com.example.broken");
    let err = broken.clear_app_data().await.unwrap_err();
    match err {
        DeviceError::Command { command, message } => {
            assert_eq!(command, "adb shell pm clear com.example.broken");
            assert_eq!(message, "Failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}
