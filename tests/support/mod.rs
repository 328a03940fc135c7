#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_cmd::Command;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use tasktrack::{ManualClock, MemoryStorage, Task, TaskChanges, TaskStore};
use tempfile::TempDir;

/// Fixed instant used by store tests: a Thursday at noon UTC.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 10, 12, 0, 0).unwrap()
}

pub fn memory_store() -> (TaskStore, MemoryStorage, Arc<ManualClock>) {
    let storage = MemoryStorage::new();
    let clock = Arc::new(ManualClock::new(base_time()));
    let store = TaskStore::open(storage.clone(), clock.clone()).expect("open store");
    (store, storage, clock)
}

/// A pending task created one hour before [`base_time`].
pub fn task(id: &str, title: &str) -> Task {
    Task::new(id, title, base_time() - Duration::hours(1))
}

pub fn task_due(id: &str, title: &str, due: Option<DateTime<Utc>>) -> Task {
    task(id, title).with_changes(&TaskChanges::new().due_date(due))
}

pub fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.id.as_str()).collect()
}

pub fn ref_ids<'a>(tasks: &[&'a Task]) -> Vec<&'a str> {
    tasks.iter().map(|task| task.id.as_str()).collect()
}

/// Temporary data directory for CLI runs.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.dir.path().join("tasks.json")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_tasks(&self) -> Value {
        let contents = fs::read_to_string(self.tasks_path()).expect("read tasks.json");
        serde_json::from_str(&contents).expect("parse tasks.json")
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tasktrack").expect("binary");
        cmd.env("TASKTRACK_DIR", self.path());
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--json` and return the parsed envelope of a successful command.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }

    pub fn add(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let value = self.json(&full);
        value["data"]["id"].as_str().expect("task id").to_string()
    }
}
