//! Filter and sort criteria, and the pipeline that turns the authoritative
//! collection into the filtered view.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{Category, Priority, Status, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    #[default]
    DueDate,
    Priority,
    Title,
    CreatedAt,
    Status,
}

impl SortOption {
    pub const ALL: [SortOption; 5] = [
        SortOption::DueDate,
        SortOption::Priority,
        SortOption::Title,
        SortOption::CreatedAt,
        SortOption::Status,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortOption::DueDate => "due_date",
            SortOption::Priority => "priority",
            SortOption::Title => "title",
            SortOption::CreatedAt => "created_at",
            SortOption::Status => "status",
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        SortOption::ALL
            .into_iter()
            .find(|option| option.as_str().replace('_', "") == wanted)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown sort option '{}' (expected due_date, priority, title, created_at, status)",
                    s.trim()
                ))
            })
    }
}

/// The active search, filter and sort settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub search_query: String,
    pub selected_category: Option<Category>,
    pub selected_status: Option<Status>,
    pub selected_priority: Option<Priority>,
    pub sort_option: SortOption,
    pub show_completed: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search_query: String::new(),
            selected_category: None,
            selected_status: None,
            selected_priority: None,
            sort_option: SortOption::default(),
            show_completed: true,
        }
    }
}

impl FilterCriteria {
    /// Whether a task passes the query, the selectors and the completed toggle.
    pub fn matches(&self, task: &Task) -> bool {
        let query = self.search_query.to_lowercase();
        self.matches_normalized(task, &query)
    }

    fn matches_normalized(&self, task: &Task, query_lower: &str) -> bool {
        if !query_lower.is_empty() && !task.matches_query(query_lower) {
            return false;
        }
        if self.selected_category.is_some_and(|c| task.category != c) {
            return false;
        }
        if self.selected_status.is_some_and(|s| task.status != s) {
            return false;
        }
        if self.selected_priority.is_some_and(|p| task.priority != p) {
            return false;
        }
        self.show_completed || !task.is_completed()
    }
}

/// Filter `tasks` (in their given order) and stable-sort the survivors.
pub fn apply_filters(tasks: &[Task], criteria: &FilterCriteria) -> Vec<Task> {
    let query = criteria.search_query.to_lowercase();
    let mut filtered: Vec<Task> = tasks
        .iter()
        .filter(|task| criteria.matches_normalized(task, &query))
        .cloned()
        .collect();
    sort_tasks(&mut filtered, criteria.sort_option);
    filtered
}

/// Stable sort; ties keep their incoming relative order.
pub fn sort_tasks(tasks: &mut [Task], option: SortOption) {
    tasks.sort_by(|left, right| compare(left, right, option));
}

fn compare(left: &Task, right: &Task, option: SortOption) -> Ordering {
    match option {
        SortOption::DueDate => match (left.due_date, right.due_date) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortOption::Priority => right.priority.rank().cmp(&left.priority.rank()),
        SortOption::Title => left.title.cmp(&right.title),
        SortOption::CreatedAt => right.created_at.cmp(&left.created_at),
        SortOption::Status => left.status.rank().cmp(&right.status.rank()),
    }
}
