//! The task store: single owner of the task collection and the active
//! criteria.
//!
//! Every mutation follows the same sequence: update the authoritative
//! collection, recompute the filtered view, queue a full snapshot for
//! persistence, then notify subscribers. The caller never waits on I/O;
//! use [`TaskStore::flush`] when writes must be on disk (e.g. before exit).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde_json::Value;

use crate::clock::Clock;
use crate::config::Config;
use crate::criteria::{apply_filters, FilterCriteria, SortOption};
use crate::error::{Error, Result};
use crate::persist::PersistWorker;
use crate::stats::TaskStats;
use crate::storage::KeyValueStore;
use crate::task::{Category, Priority, Status, Task, TaskChanges};

/// Slot used when none is configured.
pub const DEFAULT_SLOT: &str = "tasks";

/// Length of the "upcoming" window.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// Handle returned by [`TaskStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn() + Send>;

/// Options applied when a store opens.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub slot: String,
    pub criteria: FilterCriteria,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            slot: DEFAULT_SLOT.to_string(),
            criteria: FilterCriteria::default(),
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            slot: config.storage.slot.clone(),
            criteria: config.view.criteria(),
        }
    }
}

pub struct TaskStore {
    tasks: Vec<Task>,
    criteria: FilterCriteria,
    filtered: Vec<Task>,
    clock: Arc<dyn Clock>,
    persist: PersistWorker,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    revision: u64,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks.len())
            .field("filtered", &self.filtered.len())
            .field("criteria", &self.criteria)
            .field("listeners", &self.listeners.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl TaskStore {
    /// Open a store over `storage` with default options.
    pub fn open<S: KeyValueStore>(storage: S, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::open_with(storage, clock, StoreOptions::default())
    }

    /// Open a store, loading the persisted collection from `options.slot`.
    ///
    /// Fails only when the slot cannot be read at all. Individual records
    /// that do not deserialize are skipped with a warning.
    pub fn open_with<S: KeyValueStore>(
        storage: S,
        clock: Arc<dyn Clock>,
        options: StoreOptions,
    ) -> Result<Self> {
        let persisted = storage.read(&options.slot)?;
        let persist = PersistWorker::spawn(storage, options.slot.clone())?;
        let mut store = Self {
            tasks: Vec::new(),
            criteria: options.criteria,
            filtered: Vec::new(),
            clock,
            persist,
            listeners: Vec::new(),
            next_subscription: 0,
            revision: 0,
        };
        store.load(persisted, &options.slot);
        Ok(store)
    }

    fn load(&mut self, persisted: Option<Value>, slot: &str) {
        let records = match persisted {
            None => Vec::new(),
            Some(Value::Array(records)) => records,
            Some(other) => {
                tracing::warn!(
                    slot,
                    kind = value_kind(&other),
                    "persisted tasks are not a list; starting empty"
                );
                Vec::new()
            }
        };

        let total = records.len();
        let mut tasks: Vec<Task> = Vec::with_capacity(total);
        for (index, record) in records.into_iter().enumerate() {
            match Task::from_record(record) {
                Ok(task) if tasks.iter().any(|existing| existing.id == task.id) => {
                    tracing::warn!(index, id = %task.id, "skipping duplicate task id");
                }
                Ok(task) => tasks.push(task),
                Err(err) => {
                    tracing::warn!(index, error = %err, "skipping unreadable task record");
                }
            }
        }
        tracing::debug!(slot, loaded = tasks.len(), skipped = total - tasks.len(), "loaded tasks");

        self.tasks = tasks;
        self.refresh_view();
        self.notify();
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append a new task. A task whose id is already present, or whose id
    /// or title is blank, is rejected.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        task.validate()?;
        if self.contains(&task.id) {
            return Err(Error::DuplicateTask(task.id));
        }
        tracing::debug!(id = %task.id, "adding task");
        self.tasks.push(task);
        self.commit();
        Ok(())
    }

    /// Replace the task with the same id. Returns `Ok(false)`, changing
    /// nothing, when no such task exists. A blank title is rejected and
    /// leaves the stored task as it was.
    ///
    /// A task arriving as completed without a completion time is stamped
    /// with the current time.
    pub fn update_task(&mut self, task: Task) -> Result<bool> {
        task.validate()?;
        let now = self.clock.now();
        let Some(slot) = self.tasks.iter_mut().find(|existing| existing.id == task.id) else {
            tracing::debug!(id = %task.id, "update ignored, unknown task");
            return Ok(false);
        };

        let mut task = task;
        if task.status == Status::Completed && task.completed_at.is_none() {
            task.completed_at = Some(now);
        }
        tracing::debug!(id = %task.id, "updating task");
        *slot = task;
        self.commit();
        Ok(true)
    }

    /// Apply a partial change to one task. Returns the updated task, or
    /// `Ok(None)` for an unknown id.
    pub fn edit_task(&mut self, id: &str, changes: &TaskChanges) -> Result<Option<&Task>> {
        let Some(current) = self.task(id) else {
            return Ok(None);
        };
        let updated = current.with_changes(changes);
        self.update_task(updated)?;
        Ok(self.task(id))
    }

    /// Remove every task with `id`. Returns `false` when there was none.
    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        if self.tasks.len() == before {
            tracing::debug!(id, "delete ignored, unknown task");
            return false;
        }
        tracing::debug!(id, "deleted task");
        self.commit();
        true
    }

    /// Advance a task's status: pending → inProgress → completed → pending,
    /// and cancelled → pending. Entering completed records the completion
    /// time; leaving it keeps the old one. Returns the new status.
    pub fn toggle_status(&mut self, id: &str) -> Option<Status> {
        let now = self.clock.now();
        let slot = self.tasks.iter_mut().find(|task| task.id == id)?;

        let next = slot.status.toggled();
        let mut changes = TaskChanges::new().status(next);
        if next == Status::Completed {
            changes = changes.completed_at(Some(now));
        }
        tracing::debug!(id, from = %slot.status, to = %next, "toggling status");
        *slot = slot.with_changes(&changes);
        self.commit();
        Some(next)
    }

    // =========================================================================
    // Criteria
    // =========================================================================

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.criteria.search_query = query.into();
        self.criteria_changed();
    }

    pub fn set_selected_category(&mut self, category: Option<Category>) {
        self.criteria.selected_category = category;
        self.criteria_changed();
    }

    pub fn set_selected_status(&mut self, status: Option<Status>) {
        self.criteria.selected_status = status;
        self.criteria_changed();
    }

    pub fn set_selected_priority(&mut self, priority: Option<Priority>) {
        self.criteria.selected_priority = priority;
        self.criteria_changed();
    }

    pub fn set_sort_option(&mut self, option: SortOption) {
        self.criteria.sort_option = option;
        self.criteria_changed();
    }

    pub fn set_show_completed(&mut self, show: bool) {
        self.criteria.show_completed = show;
        self.criteria_changed();
    }

    /// Reset every criterion: no query or selectors, due-date sort, and
    /// completed tasks shown.
    pub fn clear_filters(&mut self) {
        self.criteria = FilterCriteria::default();
        self.criteria_changed();
    }

    /// Replace all criteria at once.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.criteria_changed();
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The filtered and sorted view.
    pub fn filtered_tasks(&self) -> &[Task] {
        &self.filtered
    }

    /// The authoritative collection, in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.task(id).is_some()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn search_query(&self) -> &str {
        &self.criteria.search_query
    }

    pub fn selected_category(&self) -> Option<Category> {
        self.criteria.selected_category
    }

    pub fn selected_status(&self) -> Option<Status> {
        self.criteria.selected_status
    }

    pub fn selected_priority(&self) -> Option<Priority> {
        self.criteria.selected_priority
    }

    pub fn sort_option(&self) -> SortOption {
        self.criteria.sort_option
    }

    pub fn show_completed(&self) -> bool {
        self.criteria.show_completed
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::compute(&self.tasks, self.now())
    }

    pub fn tasks_by_category(&self, category: Category) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.category == category)
            .collect()
    }

    /// Due today and not completed.
    pub fn today_tasks(&self) -> Vec<&Task> {
        let now = self.now();
        self.tasks
            .iter()
            .filter(|task| task.is_due_today(now) && !task.is_completed())
            .collect()
    }

    pub fn overdue_tasks(&self) -> Vec<&Task> {
        let now = self.now();
        self.tasks.iter().filter(|task| task.is_overdue(now)).collect()
    }

    /// Not completed and due strictly within the next seven days.
    pub fn upcoming_tasks(&self) -> Vec<&Task> {
        let now = self.clock.now();
        let horizon = now + Duration::days(UPCOMING_WINDOW_DAYS);
        self.tasks
            .iter()
            .filter(|task| !task.is_completed())
            .filter(|task| {
                task.due_date
                    .is_some_and(|due| due > now && due < horizon)
            })
            .collect()
    }

    /// Current time in the clock's offset.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.local_now()
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Notification and persistence
    // =========================================================================

    /// Register a listener called after every observable change.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Number of change notifications emitted so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Block until every queued snapshot has been written or has failed.
    pub fn flush(&self) {
        self.persist.flush();
    }

    /// Snapshot writes that reached storage since the store opened.
    pub fn written_snapshots(&self) -> usize {
        self.persist.written()
    }

    /// Snapshot writes that failed since the store opened.
    pub fn failed_writes(&self) -> usize {
        self.persist.failed()
    }

    fn commit(&mut self) {
        self.refresh_view();
        self.persist.save(self.snapshot());
        self.notify();
    }

    fn criteria_changed(&mut self) {
        self.refresh_view();
        self.notify();
    }

    fn refresh_view(&mut self) {
        self.filtered = apply_filters(&self.tasks, &self.criteria);
    }

    fn snapshot(&self) -> Value {
        let records = self
            .tasks
            .iter()
            .filter_map(|task| match task.to_record() {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::error!(id = %task.id, error = %err, "failed to serialize task");
                    None
                }
            })
            .collect();
        Value::Array(records)
    }

    fn notify(&mut self) {
        self.revision += 1;
        for (_, listener) in &self.listeners {
            listener();
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 10, 12, 0, 0).unwrap()
    }

    fn store() -> (TaskStore, MemoryStorage, Arc<ManualClock>) {
        let storage = MemoryStorage::new();
        let clock = Arc::new(ManualClock::new(start()));
        let store = TaskStore::open(storage.clone(), clock.clone()).unwrap();
        (store, storage, clock)
    }

    #[test]
    fn duplicate_add_is_rejected_without_side_effects() {
        let (mut store, _, _) = store();
        store.add_task(Task::new("a", "First", start())).unwrap();
        let revision = store.revision();

        let err = store
            .add_task(Task::new("a", "Second", start()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTask(id) if id == "a"));
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].title, "First");
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn listeners_fire_until_unsubscribed() {
        let (mut store, _, _) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.add_task(Task::new("a", "A", start())).unwrap();
        store.set_search_query("x");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.clear_filters();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unknown_ids_are_silent_noops() {
        let (mut store, storage, _) = store();
        store.add_task(Task::new("a", "A", start())).unwrap();
        store.flush();
        let persisted = storage.get(DEFAULT_SLOT);
        let revision = store.revision();

        assert!(!store.update_task(Task::new("zzz", "Ghost", start())).unwrap());
        assert!(!store.delete_task("zzz"));
        assert!(store.toggle_status("zzz").is_none());
        assert!(store
            .edit_task("zzz", &TaskChanges::new().title("x"))
            .unwrap()
            .is_none());

        store.flush();
        assert_eq!(store.revision(), revision);
        assert_eq!(storage.get(DEFAULT_SLOT), persisted);
    }

    #[test]
    fn criteria_changes_do_not_persist() {
        let (mut store, storage, _) = store();
        store.set_sort_option(SortOption::Title);
        store.set_show_completed(false);
        store.flush();
        assert!(storage.get(DEFAULT_SLOT).is_none());
        assert_eq!(store.sort_option(), SortOption::Title);
        assert!(!store.show_completed());
    }

    #[test]
    fn edit_task_applies_partial_changes() {
        let (mut store, _, clock) = store();
        store.add_task(Task::new("a", "A", start())).unwrap();
        clock.advance(Duration::minutes(5));

        let edited = store
            .edit_task("a", &TaskChanges::new().status(Status::Completed).tags(["x"]))
            .unwrap()
            .cloned()
            .unwrap();
        assert_eq!(edited.tags, vec!["x".to_string()]);
        assert_eq!(edited.completed_at, Some(start() + Duration::minutes(5)));
        assert_eq!(edited.created_at, start());
    }

    #[test]
    fn non_list_slot_loads_empty() {
        let storage = MemoryStorage::with_slot(DEFAULT_SLOT, json!({ "id": "a" }));
        let clock = Arc::new(ManualClock::new(start()));
        let store = TaskStore::open(storage, clock).unwrap();
        assert!(store.tasks().is_empty());
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn options_from_config_set_slot_and_criteria() {
        let mut config = Config::default();
        config.storage.slot = "work".to_string();
        config.view.sort = SortOption::Priority;
        let options = StoreOptions::from(&config);

        let storage = MemoryStorage::new();
        let clock = Arc::new(ManualClock::new(start()));
        let mut store = TaskStore::open_with(storage.clone(), clock, options).unwrap();
        assert_eq!(store.sort_option(), SortOption::Priority);

        store.add_task(Task::new("a", "A", start())).unwrap();
        store.flush();
        assert!(storage.get("work").is_some());
        assert!(storage.get(DEFAULT_SLOT).is_none());
    }
}
