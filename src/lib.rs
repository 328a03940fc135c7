//! tasktrack - personal task tracking library
//!
//! This library provides the task store behind the `tasktrack` CLI: it holds
//! a user's tasks, applies search/filter/sort criteria, derives summary
//! statistics and persists the collection to local storage.
//!
//! # Core Concepts
//!
//! - **Task**: an immutable value; changes produce a new value with the same id
//! - **Criteria**: search query, category/status/priority filters, sort option
//!   and completed visibility
//! - **Filtered view**: the collection after criteria are applied, recomputed
//!   on every change
//! - **Persistence**: a full snapshot queued after every mutation and written
//!   in order by a background worker
//!
//! # Module Organization
//!
//! - `task`: Task entity, enums and record (de)serialization
//! - `criteria`: Filter criteria and the filter/sort pipeline
//! - `stats`: Summary statistics
//! - `store`: The task store
//! - `clock`: Injected time sources
//! - `storage`: Key-value persistence backends
//! - `persist`: Ordered background persistence worker
//! - `lock`: File locking and atomic writes
//! - `config`: Configuration loading from `tasktrack.toml`
//! - `error`: Error types and result aliases
//! - `cli`, `output`: Command-line front end

pub mod cli;
pub mod clock;
pub mod config;
pub mod criteria;
pub mod error;
pub mod lock;
pub mod output;
pub mod persist;
pub mod stats;
pub mod storage;
pub mod store;
pub mod task;

pub use clock::{Clock, ManualClock, SystemClock};
pub use criteria::{FilterCriteria, SortOption};
pub use error::{Error, Result};
pub use stats::TaskStats;
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use store::{StoreOptions, SubscriptionId, TaskStore};
pub use task::{Category, Priority, Status, Task, TaskChanges, TaskColor};
