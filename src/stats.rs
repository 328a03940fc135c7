//! Summary statistics over the authoritative collection.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::task::{Status, Task};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub overdue_tasks: usize,
    /// Due today and not completed.
    pub today_tasks: usize,
    /// Percentage in `0.0..=100.0`; zero for an empty collection.
    pub completion_rate: f64,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], now: DateTime<FixedOffset>) -> Self {
        let count = |status: Status| tasks.iter().filter(|task| task.status == status).count();
        let total_tasks = tasks.len();
        let completed_tasks = count(Status::Completed);
        let completion_rate = if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64 * 100.0
        };

        Self {
            total_tasks,
            completed_tasks,
            pending_tasks: count(Status::Pending),
            in_progress_tasks: count(Status::InProgress),
            overdue_tasks: tasks.iter().filter(|task| task.is_overdue(now)).count(),
            today_tasks: tasks
                .iter()
                .filter(|task| task.is_due_today(now) && !task.is_completed())
                .count(),
            completion_rate,
        }
    }
}
