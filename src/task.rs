//! Task entity model.
//!
//! A [`Task`] is an immutable value: every change produces a new value with
//! the same `id` via [`Task::with_changes`]. Tasks persist as plain JSON
//! records with camelCase keys; enum fields are stored by symbolic name and
//! fall back to a documented default when a name is missing or unknown, so
//! records written by newer versions still load.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Enums stored by symbolic name.
trait Named: Copy + Default + 'static {
    const KIND: &'static str;
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;
}

fn lookup<T: Named>(name: &str) -> Option<T> {
    T::ALL.iter().copied().find(|value| value.as_str() == name)
}

fn normalize_name(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|ch| *ch != '_' && *ch != '-')
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Loose parse for user input: case-insensitive, ignores `_` and `-`.
fn parse_loose<T: Named>(input: &str) -> Result<T> {
    let wanted = normalize_name(input);
    T::ALL
        .iter()
        .copied()
        .find(|value| normalize_name(value.as_str()) == wanted)
        .ok_or_else(|| {
            let expected: Vec<&str> = T::ALL.iter().map(|value| value.as_str()).collect();
            Error::InvalidArgument(format!(
                "unknown {} '{}' (expected one of: {})",
                T::KIND,
                input.trim(),
                expected.join(", ")
            ))
        })
}

/// Deserialize an enum by name, falling back to its default.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Named,
{
    let value = Value::deserialize(deserializer)?;
    let resolved = value.as_str().and_then(lookup::<T>);
    if resolved.is_none() && !value.is_null() {
        tracing::debug!(kind = T::KIND, value = %value, "unrecognized name, using default");
    }
    Ok(resolved.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Severity rank, higher is more severe.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

impl Named for Priority {
    const KIND: &'static str = "priority";
    const ALL: &'static [Self] = &[
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    /// Position in declaration order, used when sorting by status.
    pub fn rank(self) -> u8 {
        match self {
            Status::Pending => 0,
            Status::InProgress => 1,
            Status::Completed => 2,
            Status::Cancelled => 3,
        }
    }

    /// The status a toggle moves to.
    pub fn toggled(self) -> Status {
        match self {
            Status::Pending => Status::InProgress,
            Status::InProgress => Status::Completed,
            Status::Completed | Status::Cancelled => Status::Pending,
        }
    }
}

impl Named for Status {
    const KIND: &'static str = "status";
    const ALL: &'static [Self] = &[
        Status::Pending,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "inProgress",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Work,
    #[default]
    Personal,
    Health,
    Education,
    Finance,
    Other,
}

impl Named for Category {
    const KIND: &'static str = "category";
    const ALL: &'static [Self] = &[
        Category::Work,
        Category::Personal,
        Category::Health,
        Category::Education,
        Category::Finance,
        Category::Other,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Health => "health",
            Category::Education => "education",
            Category::Finance => "finance",
            Category::Other => "other",
        }
    }
}

macro_rules! impl_display_from_str {
    ($($ty:ty),*) => {$(
        impl $ty {
            pub fn as_str(self) -> &'static str {
                Named::as_str(self)
            }

            pub fn all() -> &'static [Self] {
                <Self as Named>::ALL
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Named::as_str(*self))
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                parse_loose(s)
            }
        }
    )*};
}

impl_display_from_str!(Priority, Status, Category);

/// Opaque 32-bit ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskColor(pub u32);

impl fmt::Display for TaskColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl FromStr for TaskColor {
    type Err = Error;

    /// Accepts `#RRGGBB` (opaque) or `#AARRGGBB`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let invalid = || Error::InvalidArgument(format!("invalid color '{trimmed}'"));
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
        match hex.len() {
            6 => Ok(TaskColor(0xFF00_0000 | value)),
            8 => Ok(TaskColor(value)),
            _ => Err(invalid()),
        }
    }
}

/// A single trackable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub estimated_minutes: u32,
    pub actual_minutes: u32,
    pub custom_color: Option<TaskColor>,
}

/// Wire form accepted when reading persisted tasks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    priority: Priority,
    #[serde(default, deserialize_with = "lenient")]
    status: Status,
    #[serde(default, deserialize_with = "lenient")]
    category: Category,
    created_at: DateTime<Utc>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    estimated_minutes: Option<u32>,
    #[serde(default)]
    actual_minutes: Option<u32>,
    #[serde(default)]
    custom_color: Option<TaskColor>,
}

/// Why a task with this id and title cannot be stored, if it cannot.
fn identity_problem(id: &str, title: &str) -> Option<String> {
    if id.trim().is_empty() {
        return Some("empty id".to_string());
    }
    if title.trim().is_empty() {
        return Some(format!("empty title for {id}"));
    }
    None
}

impl TaskRecord {
    fn into_task(self) -> Result<Task> {
        if let Some(problem) = identity_problem(&self.id, &self.title) {
            return Err(Error::MalformedRecord(problem));
        }
        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            priority: self.priority,
            status: self.status,
            category: self.category,
            created_at: self.created_at,
            due_date: self.due_date,
            completed_at: self.completed_at,
            tags: self.tags.unwrap_or_default(),
            estimated_minutes: self.estimated_minutes.unwrap_or(0),
            actual_minutes: self.actual_minutes.unwrap_or(0),
            custom_color: self.custom_color,
        })
    }
}

impl Task {
    /// A pending, medium-priority personal task with no schedule.
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            priority: Priority::default(),
            status: Status::default(),
            category: Category::default(),
            created_at,
            due_date: None,
            completed_at: None,
            tags: Vec::new(),
            estimated_minutes: 0,
            actual_minutes: 0,
            custom_color: None,
        }
    }

    /// Reject tasks the loader would skip: blank id or blank title.
    pub fn validate(&self) -> Result<()> {
        match identity_problem(&self.id, &self.title) {
            Some(problem) => Err(Error::InvalidArgument(problem)),
            None => Ok(()),
        }
    }

    pub fn to_record(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_record(record: Value) -> Result<Self> {
        let record: TaskRecord = serde_json::from_value(record)
            .map_err(|err| Error::MalformedRecord(err.to_string()))?;
        record.into_task()
    }

    /// Copy of this task with the fields present in `changes` replaced.
    pub fn with_changes(&self, changes: &TaskChanges) -> Task {
        let mut next = self.clone();
        if let Some(title) = &changes.title {
            next.title = title.clone();
        }
        if let Some(description) = &changes.description {
            next.description = description.clone();
        }
        if let Some(priority) = changes.priority {
            next.priority = priority;
        }
        if let Some(status) = changes.status {
            next.status = status;
        }
        if let Some(category) = changes.category {
            next.category = category;
        }
        if let Some(due_date) = changes.due_date {
            next.due_date = due_date;
        }
        if let Some(completed_at) = changes.completed_at {
            next.completed_at = completed_at;
        }
        if let Some(tags) = &changes.tags {
            next.tags = tags.clone();
        }
        if let Some(minutes) = changes.estimated_minutes {
            next.estimated_minutes = minutes;
        }
        if let Some(minutes) = changes.actual_minutes {
            next.actual_minutes = minutes;
        }
        if let Some(color) = changes.custom_color {
            next.custom_color = color;
        }
        next
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    pub fn is_overdue(&self, now: DateTime<FixedOffset>) -> bool {
        match self.due_date {
            Some(due) => !self.is_completed() && due < now.with_timezone(&Utc),
            None => false,
        }
    }

    pub fn is_due_today(&self, now: DateTime<FixedOffset>) -> bool {
        self.due_on(now, now.date_naive())
    }

    pub fn is_due_tomorrow(&self, now: DateTime<FixedOffset>) -> bool {
        match now.date_naive().succ_opt() {
            Some(tomorrow) => self.due_on(now, tomorrow),
            None => false,
        }
    }

    /// Signed time left until the due date; negative once it has passed.
    pub fn time_until_due(&self, now: DateTime<FixedOffset>) -> Option<Duration> {
        self.due_date
            .map(|due| due.signed_duration_since(now.with_timezone(&Utc)))
    }

    pub fn matches_query(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.description.to_lowercase().contains(query_lower)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(query_lower))
    }

    fn due_on(&self, now: DateTime<FixedOffset>, day: chrono::NaiveDate) -> bool {
        self.due_date
            .map(|due| due.with_timezone(now.offset()).date_naive() == day)
            .unwrap_or(false)
    }
}

/// Partial update applied by [`Task::with_changes`].
///
/// Optional task fields use a nested `Option` so they can be cleared:
/// `Some(None)` clears, `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub category: Option<Category>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub estimated_minutes: Option<u32>,
    pub actual_minutes: Option<u32>,
    pub custom_color: Option<Option<TaskColor>>,
}

impl TaskChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn due_date(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn completed_at(mut self, completed_at: Option<DateTime<Utc>>) -> Self {
        self.completed_at = Some(completed_at);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn estimated_minutes(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn actual_minutes(mut self, minutes: u32) -> Self {
        self.actual_minutes = Some(minutes);
        self
    }

    pub fn custom_color(mut self, color: Option<TaskColor>) -> Self {
        self.custom_color = Some(color);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn local(at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.fixed_offset()
    }

    fn full_task() -> Task {
        Task::new("t-1", "Write report", at(2025, 1, 10, 9)).with_changes(
            &TaskChanges::new()
                .description("Quarterly numbers")
                .priority(Priority::Urgent)
                .status(Status::InProgress)
                .category(Category::Finance)
                .due_date(Some(at(2025, 1, 15, 17)))
                .completed_at(Some(at(2025, 1, 12, 8)))
                .tags(["q1", "Reports"])
                .estimated_minutes(90)
                .actual_minutes(45)
                .custom_color(Some(TaskColor(0xFF33_6699))),
        )
    }

    #[test]
    fn record_uses_symbolic_names_and_explicit_nulls() {
        let record = Task::new("t-2", "Call", at(2025, 1, 1, 0))
            .with_changes(&TaskChanges::new().status(Status::InProgress))
            .to_record()
            .expect("record");
        assert_eq!(record["status"], json!("inProgress"));
        assert_eq!(record["priority"], json!("medium"));
        assert_eq!(record["category"], json!("personal"));
        assert_eq!(record["createdAt"], json!("2025-01-01T00:00:00Z"));
        assert!(record["dueDate"].is_null());
        assert!(record["completedAt"].is_null());
        assert!(record["customColor"].is_null());
        assert_eq!(record["tags"], json!([]));
        assert_eq!(record["estimatedMinutes"], json!(0));
    }

    #[test]
    fn record_round_trips() {
        let task = full_task();
        let record = task.to_record().expect("record");
        assert_eq!(record["customColor"], json!(0xFF33_6699_u32));
        let restored = Task::from_record(record).expect("restore");
        assert_eq!(restored, task);
    }

    #[test]
    fn unknown_enum_names_fall_back_to_defaults() {
        let record = json!({
            "id": "t-3",
            "title": "Future task",
            "priority": "critical",
            "status": 7,
            "category": "travel",
            "createdAt": "2025-01-01T00:00:00Z"
        });
        let task = Task::from_record(record).expect("lenient");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.category, Category::Personal);
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let record = json!({
            "id": "t-4",
            "title": "Minimal",
            "createdAt": "2025-01-01T00:00:00Z"
        });
        let task = Task::from_record(record).expect("minimal");
        assert_eq!(task.description, "");
        assert!(task.tags.is_empty());
        assert_eq!(task.estimated_minutes, 0);
        assert_eq!(task.actual_minutes, 0);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn missing_id_or_title_is_malformed() {
        let no_id = json!({ "title": "x", "createdAt": "2025-01-01T00:00:00Z" });
        assert!(matches!(
            Task::from_record(no_id),
            Err(Error::MalformedRecord(_))
        ));

        let no_title = json!({ "id": "t-5", "createdAt": "2025-01-01T00:00:00Z" });
        assert!(matches!(
            Task::from_record(no_title),
            Err(Error::MalformedRecord(_))
        ));

        let blank_title = json!({ "id": "t-5", "title": "  ", "createdAt": "2025-01-01T00:00:00Z" });
        assert!(Task::from_record(blank_title).is_err());

        assert!(Task::from_record(json!("not an object")).is_err());
    }

    #[test]
    fn with_changes_keeps_untouched_fields() {
        let task = full_task();
        let changed = task.with_changes(&TaskChanges::new().title("Renamed").due_date(None));
        assert_eq!(changed.id, task.id);
        assert_eq!(changed.title, "Renamed");
        assert!(changed.due_date.is_none());
        assert_eq!(changed.tags, task.tags);
        assert_eq!(changed.custom_color, task.custom_color);
        assert_eq!(task.title, "Write report");
        assert_eq!(task.with_changes(&TaskChanges::new()), task);
    }

    #[test]
    fn toggle_cycle() {
        assert_eq!(Status::Pending.toggled(), Status::InProgress);
        assert_eq!(Status::InProgress.toggled(), Status::Completed);
        assert_eq!(Status::Completed.toggled(), Status::Pending);
        assert_eq!(Status::Cancelled.toggled(), Status::Pending);
    }

    #[test]
    fn overdue_ignores_completed_tasks() {
        let now = local(at(2025, 1, 20, 12));
        let task = full_task();
        assert!(task.is_overdue(now));
        let done = task.with_changes(&TaskChanges::new().status(Status::Completed));
        assert!(!done.is_overdue(now));
        let undated = task.with_changes(&TaskChanges::new().due_date(None));
        assert!(!undated.is_overdue(now));
    }

    #[test]
    fn due_day_predicates_ignore_time_of_day() {
        let now = local(at(2025, 1, 15, 23));
        let task = full_task();
        assert!(task.is_due_today(now));
        assert!(!task.is_due_tomorrow(now));
        assert!(task.is_due_tomorrow(local(at(2025, 1, 14, 0))));

        let done = task.with_changes(&TaskChanges::new().status(Status::Completed));
        assert!(done.is_due_today(now));
    }

    #[test]
    fn due_day_uses_clock_offset() {
        let task = Task::new("t-6", "Late", at(2025, 1, 1, 0))
            .with_changes(&TaskChanges::new().due_date(Some(at(2025, 1, 15, 23))));
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = at(2025, 1, 16, 8).with_timezone(&plus_two);
        assert!(task.is_due_today(now));
    }

    #[test]
    fn time_until_due_is_signed() {
        let task = full_task();
        let before = task.time_until_due(local(at(2025, 1, 15, 15))).expect("due");
        assert_eq!(before, Duration::hours(2));
        let after = task.time_until_due(local(at(2025, 1, 15, 18))).expect("due");
        assert_eq!(after, Duration::hours(-1));
        assert!(Task::new("x", "y", at(2025, 1, 1, 0))
            .time_until_due(local(at(2025, 1, 1, 0)))
            .is_none());
    }

    #[test]
    fn parse_user_input_loosely() {
        assert_eq!("in_progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("URGENT".parse::<Priority>().unwrap(), Priority::Urgent);
        assert!("travel".parse::<Category>().is_err());
        assert_eq!(Status::InProgress.to_string(), "inProgress");
    }

    #[test]
    fn color_parses_hex() {
        assert_eq!("#336699".parse::<TaskColor>().unwrap(), TaskColor(0xFF33_6699));
        assert_eq!("80336699".parse::<TaskColor>().unwrap(), TaskColor(0x8033_6699));
        assert_eq!(TaskColor(0xFF33_6699).to_string(), "#FF336699");
        assert!("#12".parse::<TaskColor>().is_err());
    }

    #[test]
    fn color_rejects_signs_and_non_hex() {
        assert!("+12345".parse::<TaskColor>().is_err());
        assert!("#+12345".parse::<TaskColor>().is_err());
        assert!("#-1234567".parse::<TaskColor>().is_err());
        assert!("#33669G".parse::<TaskColor>().is_err());
    }

    #[test]
    fn validate_matches_what_loading_accepts() {
        let created = at(2025, 1, 1, 0);
        for (id, title) in [("", "Blank id"), ("  ", "Blank id"), ("b", ""), ("b", "   ")] {
            let task = Task::new(id, title, created);
            assert!(matches!(task.validate(), Err(Error::InvalidArgument(_))));
            let record = task.to_record().expect("record");
            assert!(matches!(
                Task::from_record(record),
                Err(Error::MalformedRecord(_))
            ));
        }

        let ok = Task::new("b", "Fine", created);
        assert!(ok.validate().is_ok());
        assert_eq!(Task::from_record(ok.to_record().expect("record")).expect("load"), ok);
    }
}
