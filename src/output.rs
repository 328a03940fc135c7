//! Shared output formatting for tasktrack CLI commands.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::error::{Error, JsonError, Result};
use crate::task::Task;

pub const SCHEMA_VERSION: &str = "tasktrack.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    if json {
        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: JsonError,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: JsonError::from(err),
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = error_hint(err) {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];

    if !output.summary.is_empty() {
        lines.push(String::new());
        for (key, value) in &output.summary {
            if value.is_empty() {
                lines.push(format!("- {key}"));
            } else {
                lines.push(format!("- {key}: {value}"));
            }
        }
    }

    if !output.details.is_empty() {
        lines.push(String::new());
        lines.extend(output.details.iter().cloned());
    }

    lines.join("\n")
}

/// One line per task: marker, id, title and the interesting attributes.
pub fn format_task_line(task: &Task, now: DateTime<FixedOffset>) -> String {
    let marker = match task.status {
        crate::task::Status::Pending => "[ ]",
        crate::task::Status::InProgress => "[~]",
        crate::task::Status::Completed => "[x]",
        crate::task::Status::Cancelled => "[-]",
    };
    let mut line = format!(
        "{marker} {}  {}  ({}, {})",
        task.id, task.title, task.priority, task.category
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {}", format_timestamp(due, now)));
        if task.is_overdue(now) {
            line.push_str(" OVERDUE");
        }
    }
    if !task.tags.is_empty() {
        line.push_str(&format!("  #{}", task.tags.join(" #")));
    }
    line
}

pub fn format_timestamp(at: DateTime<Utc>, now: DateTime<FixedOffset>) -> String {
    at.with_timezone(now.offset())
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Global flags whose value is a separate argument.
const VALUE_FLAGS: &[&str] = &["--data-dir"];

pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

/// First positional argument, skipping flags and the values of [`VALUE_FLAGS`].
pub fn infer_command_name<I>(args: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
            continue;
        }
        if !arg.starts_with('-') {
            return arg;
        }
    }
    "tasktrack".to_string()
}

fn error_hint(err: &Error) -> Option<&'static str> {
    match err {
        Error::TaskNotFound(_) => Some("tasktrack list"),
        Error::DuplicateTask(_) => Some("pick a different id or use `tasktrack edit`"),
        Error::InvalidConfig(_) => Some("fix tasktrack.toml then retry"),
        Error::LockFailed(_) => Some("another tasktrack process is writing; retry shortly"),
        _ => None,
    }
}
