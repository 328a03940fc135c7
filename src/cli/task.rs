//! tasktrack command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use directories::ProjectDirs;
use serde::Serialize;
use ulid::Ulid;

use crate::cli::TaskFields;
use crate::config::Config;
use crate::criteria::{FilterCriteria, SortOption};
use crate::error::{Error, Result};
use crate::output::{emit_success, format_task_line, format_timestamp, HumanOutput, OutputOptions};
use crate::stats::TaskStats;
use crate::storage::FileStorage;
use crate::store::{StoreOptions, TaskStore};
use crate::task::{Category, Priority, Status, Task, TaskChanges};

pub struct AddOptions {
    pub title: String,
    pub id: Option<String>,
    pub fields: TaskFields,
    pub data_dir: PathBuf,
    pub output: OutputOptions,
}

pub struct ListOptions {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub sort: Option<SortOption>,
    pub hide_completed: bool,
    pub data_dir: PathBuf,
    pub output: OutputOptions,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub status: Option<Status>,
    pub actual: Option<u32>,
    pub clear_due: bool,
    pub clear_color: bool,
    pub fields: TaskFields,
    pub data_dir: PathBuf,
    pub output: OutputOptions,
}

/// Fixed date-based views over the whole collection.
#[derive(Debug, Clone, Copy)]
pub enum Query {
    Today,
    Overdue,
    Upcoming,
}

impl Query {
    fn command(self) -> &'static str {
        match self {
            Query::Today => "today",
            Query::Overdue => "overdue",
            Query::Upcoming => "upcoming",
        }
    }

    fn header(self) -> &'static str {
        match self {
            Query::Today => "Due today",
            Query::Overdue => "Overdue",
            Query::Upcoming => "Upcoming",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskListOutput<'a> {
    total: usize,
    criteria: &'a FilterCriteria,
    tasks: &'a [Task],
}

#[derive(Serialize)]
struct QueryOutput<'a> {
    total: usize,
    tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
struct ToggleOutput<'a> {
    id: &'a str,
    status: Status,
    task: &'a Task,
}

#[derive(Serialize)]
struct RemoveOutput<'a> {
    id: &'a str,
    removed: bool,
}

struct TaskContext {
    store: TaskStore,
}

impl TaskContext {
    /// Wait for queued writes and surface any that failed.
    fn finish(&self) -> Result<()> {
        self.store.flush();
        tracing::debug!(written = self.store.written_snapshots(), "flushed task snapshots");
        let failed = self.store.failed_writes();
        if failed > 0 {
            return Err(Error::OperationFailed(format!(
                "{failed} task snapshot write(s) failed"
            )));
        }
        Ok(())
    }
}

/// Use `explicit` when given, else the platform data directory.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    ProjectDirs::from("", "", "tasktrack")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::InvalidArgument(
                "could not determine a data directory; pass --data-dir".to_string(),
            )
        })
}

fn load_context(data_dir: &Path) -> Result<TaskContext> {
    let config = Config::load_from_dir(data_dir);
    let storage = FileStorage::new(data_dir).with_lock_timeout(config.storage.lock_timeout_ms);
    let clock = Arc::new(config.clock.system_clock());
    tracing::debug!(data_dir = %data_dir.display(), slot = %config.storage.slot, "opening store");
    let store = TaskStore::open_with(storage, clock, StoreOptions::from(&config))?;
    Ok(TaskContext { store })
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let mut ctx = load_context(&options.data_dir)?;
    let now = ctx.store.now();

    let title = options.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title must not be empty".to_string()));
    }
    let id = match options.id {
        Some(id) if id.trim().is_empty() => {
            return Err(Error::InvalidArgument("id must not be empty".to_string()));
        }
        Some(id) => id,
        None => Ulid::new().to_string(),
    };

    let changes = field_changes(TaskChanges::new(), &options.fields, now.offset())?;
    let task = Task::new(id, title, now.with_timezone(&Utc)).with_changes(&changes);
    ctx.store.add_task(task.clone())?;
    ctx.finish()?;

    let mut human = HumanOutput::new(format!("Added {}", task.id));
    human.push_detail(format_task_line(&task, now));
    emit_success(options.output, "add", &task, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let mut ctx = load_context(&options.data_dir)?;
    let now = ctx.store.now();

    let mut criteria = ctx.store.criteria().clone();
    if let Some(search) = options.search {
        criteria.search_query = search;
    }
    criteria.selected_category = options.category.or(criteria.selected_category);
    criteria.selected_status = options.status.or(criteria.selected_status);
    criteria.selected_priority = options.priority.or(criteria.selected_priority);
    if let Some(sort) = options.sort {
        criteria.sort_option = sort;
    }
    if options.hide_completed {
        criteria.show_completed = false;
    }
    ctx.store.set_criteria(criteria);

    let tasks = ctx.store.filtered_tasks();
    let output = TaskListOutput {
        total: tasks.len(),
        criteria: ctx.store.criteria(),
        tasks,
    };

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    human.push_summary("Sort", ctx.store.sort_option().to_string());
    if !ctx.store.search_query().is_empty() {
        human.push_summary("Search", ctx.store.search_query());
    }
    for task in tasks {
        human.push_detail(format_task_line(task, now));
    }

    emit_success(options.output, "list", &output, Some(&human))
}

pub fn run_show(id: &str, data_dir: &Path, output: OutputOptions) -> Result<()> {
    let ctx = load_context(data_dir)?;
    let now = ctx.store.now();
    let task = ctx
        .store
        .task(id)
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    human.push_summary("Title", task.title.as_str());
    human.push_summary("Status", task.status.to_string());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary("Category", task.category.to_string());
    human.push_summary("Created", format_timestamp(task.created_at, now));
    if let Some(due) = task.due_date {
        let mut value = format_timestamp(due, now);
        if task.is_overdue(now) {
            value.push_str(" (overdue)");
        } else if task.is_due_today(now) {
            value.push_str(" (today)");
        } else if task.is_due_tomorrow(now) {
            value.push_str(" (tomorrow)");
        }
        human.push_summary("Due", value);
    }
    if let Some(completed) = task.completed_at {
        human.push_summary("Completed", format_timestamp(completed, now));
    }
    if !task.tags.is_empty() {
        human.push_summary("Tags", task.tags.join(", "));
    }
    if task.estimated_minutes > 0 || task.actual_minutes > 0 {
        human.push_summary(
            "Minutes",
            format!("{} estimated, {} actual", task.estimated_minutes, task.actual_minutes),
        );
    }
    if let Some(color) = task.custom_color {
        human.push_summary("Color", color.to_string());
    }
    if !task.description.is_empty() {
        human.push_detail(task.description.as_str());
    }

    emit_success(output, "show", task, Some(&human))
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut ctx = load_context(&options.data_dir)?;
    let now = ctx.store.now();

    let mut changes = TaskChanges::new();
    if let Some(title) = options.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidArgument("title must not be empty".to_string()));
        }
        changes = changes.title(title);
    }
    if let Some(status) = options.status {
        changes = changes.status(status);
    }
    if let Some(actual) = options.actual {
        changes = changes.actual_minutes(actual);
    }
    if options.clear_due {
        changes = changes.due_date(None);
    }
    if options.clear_color {
        changes = changes.custom_color(None);
    }
    let changes = field_changes(changes, &options.fields, now.offset())?;
    if changes.is_empty() {
        return Err(Error::InvalidArgument("nothing to change".to_string()));
    }

    let task = ctx
        .store
        .edit_task(&options.id, &changes)?
        .cloned()
        .ok_or_else(|| Error::TaskNotFound(options.id.clone()))?;
    ctx.finish()?;

    let mut human = HumanOutput::new(format!("Updated {}", task.id));
    human.push_detail(format_task_line(&task, now));
    emit_success(options.output, "edit", &task, Some(&human))
}

pub fn run_toggle(id: &str, data_dir: &Path, output: OutputOptions) -> Result<()> {
    let mut ctx = load_context(data_dir)?;
    let now = ctx.store.now();
    let status = ctx
        .store
        .toggle_status(id)
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
    ctx.finish()?;

    let task = ctx
        .store
        .task(id)
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
    let mut human = HumanOutput::new(format!("{id} is now {status}"));
    human.push_detail(format_task_line(task, now));
    emit_success(
        output,
        "toggle",
        &ToggleOutput { id, status, task },
        Some(&human),
    )
}

pub fn run_rm(id: &str, data_dir: &Path, output: OutputOptions) -> Result<()> {
    let mut ctx = load_context(data_dir)?;
    if !ctx.store.delete_task(id) {
        return Err(Error::TaskNotFound(id.to_string()));
    }
    ctx.finish()?;

    let human = HumanOutput::new(format!("Removed {id}"));
    emit_success(output, "rm", &RemoveOutput { id, removed: true }, Some(&human))
}

pub fn run_stats(data_dir: &Path, output: OutputOptions) -> Result<()> {
    let ctx = load_context(data_dir)?;
    let stats: TaskStats = ctx.store.stats();

    let mut human = HumanOutput::new("Task stats");
    human.push_summary("Total", stats.total_tasks.to_string());
    human.push_summary("Completed", stats.completed_tasks.to_string());
    human.push_summary("Pending", stats.pending_tasks.to_string());
    human.push_summary("In progress", stats.in_progress_tasks.to_string());
    human.push_summary("Overdue", stats.overdue_tasks.to_string());
    human.push_summary("Due today", stats.today_tasks.to_string());
    human.push_summary("Completion", format!("{:.1}%", stats.completion_rate));

    emit_success(output, "stats", &stats, Some(&human))
}

pub fn run_query(query: Query, data_dir: &Path, output: OutputOptions) -> Result<()> {
    let ctx = load_context(data_dir)?;
    let now = ctx.store.now();
    let tasks = match query {
        Query::Today => ctx.store.today_tasks(),
        Query::Overdue => ctx.store.overdue_tasks(),
        Query::Upcoming => ctx.store.upcoming_tasks(),
    };

    let mut human = HumanOutput::new(query.header());
    human.push_summary("Total", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(format_task_line(task, now));
    }

    emit_success(
        output,
        query.command(),
        &QueryOutput {
            total: tasks.len(),
            tasks,
        },
        Some(&human),
    )
}

/// Fold the shared add/edit flags into `changes`.
fn field_changes(
    mut changes: TaskChanges,
    fields: &TaskFields,
    offset: &FixedOffset,
) -> Result<TaskChanges> {
    if let Some(description) = &fields.description {
        changes = changes.description(description.as_str());
    }
    if let Some(priority) = fields.priority {
        changes = changes.priority(priority);
    }
    if let Some(category) = fields.category {
        changes = changes.category(category);
    }
    if let Some(due) = &fields.due {
        changes = changes.due_date(Some(parse_due(due, offset)?));
    }
    if !fields.tags.is_empty() {
        let tags: Vec<&str> = fields
            .tags
            .iter()
            .map(|tag| tag.trim().trim_start_matches('#'))
            .filter(|tag| !tag.is_empty())
            .collect();
        changes = changes.tags(tags);
    }
    if let Some(estimate) = fields.estimate {
        changes = changes.estimated_minutes(estimate);
    }
    if let Some(color) = fields.color {
        changes = changes.custom_color(Some(color));
    }
    Ok(changes)
}

/// Parse a due date. Values without an offset are read in `offset`; a bare
/// date means the last second of that day.
pub(crate) fn parse_due(value: &str, offset: &FixedOffset) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| NaiveTime::from_hms_opt(23, 59, 59).map(|end| date.and_time(end)))
        })
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid due date '{value}': expected RFC 3339, 'YYYY-MM-DD HH:MM' or 'YYYY-MM-DD'"
            ))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidArgument(format!("invalid due date '{value}'")))
}
