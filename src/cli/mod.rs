//! Command-line interface for tasktrack
//!
//! This module defines the CLI structure using clap derive macros. Command
//! implementations live in `task`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::criteria::SortOption;
use crate::error::Result;
use crate::output::OutputOptions;
use crate::task::{Category, Priority, Status, TaskColor};

mod task;

/// tasktrack - personal task tracking
///
/// Keeps a local list of tasks with priorities, categories and due dates,
/// and answers "what is overdue / due today / coming up".
#[derive(Parser, Debug)]
#[command(name = "tasktrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding tasks and tasktrack.toml (defaults to the platform data dir)
    #[arg(long, global = true, env = "TASKTRACK_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Explicit id (a new ULID when omitted)
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// List tasks through the filter/sort pipeline
    #[command(alias = "ls")]
    List {
        /// Case-insensitive match on title, description or tags
        #[arg(short, long)]
        search: Option<String>,

        /// Only this category
        #[arg(long)]
        category: Option<Category>,

        /// Only this status
        #[arg(long)]
        status: Option<Status>,

        /// Only this priority
        #[arg(long)]
        priority: Option<Priority>,

        /// Sort: due_date, priority, title, created_at, status
        #[arg(long)]
        sort: Option<SortOption>,

        /// Hide completed tasks
        #[arg(long)]
        hide_completed: bool,
    },

    /// Show one task
    Show {
        /// Task id
        id: String,
    },

    /// Change fields of a task
    Edit {
        /// Task id
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New status
        #[arg(long)]
        status: Option<Status>,

        /// Minutes actually spent
        #[arg(long)]
        actual: Option<u32>,

        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,

        /// Remove the custom color
        #[arg(long, conflicts_with = "color")]
        clear_color: bool,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Advance status: pending → in progress → completed → pending
    Toggle {
        /// Task id
        id: String,
    },

    /// Delete a task
    #[command(alias = "delete")]
    Rm {
        /// Task id
        id: String,
    },

    /// Summary statistics
    Stats,

    /// Tasks due today that are not completed
    Today,

    /// Tasks past their due date
    Overdue,

    /// Tasks due within the next seven days
    Upcoming,
}

/// Fields shared by `add` and `edit`
#[derive(clap::Args, Debug, Default)]
pub struct TaskFields {
    /// Longer description
    #[arg(short, long)]
    pub description: Option<String>,

    /// low, medium, high, urgent
    #[arg(short, long)]
    pub priority: Option<Priority>,

    /// work, personal, health, education, finance, other
    #[arg(short, long)]
    pub category: Option<Category>,

    /// Due date: RFC 3339, "YYYY-MM-DD HH:MM" or "YYYY-MM-DD" (end of day)
    #[arg(long)]
    pub due: Option<String>,

    /// Tag (repeatable; replaces all tags on edit)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Estimated minutes
    #[arg(long)]
    pub estimate: Option<u32>,

    /// Color as #RRGGBB or #AARRGGBB
    #[arg(long)]
    pub color: Option<TaskColor>,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let data_dir = task::resolve_data_dir(self.data_dir)?;

        match self.command {
            Commands::Add { title, id, fields } => task::run_add(task::AddOptions {
                title,
                id,
                fields,
                data_dir,
                output,
            }),
            Commands::List {
                search,
                category,
                status,
                priority,
                sort,
                hide_completed,
            } => task::run_list(task::ListOptions {
                search,
                category,
                status,
                priority,
                sort,
                hide_completed,
                data_dir,
                output,
            }),
            Commands::Show { id } => task::run_show(&id, &data_dir, output),
            Commands::Edit {
                id,
                title,
                status,
                actual,
                clear_due,
                clear_color,
                fields,
            } => task::run_edit(task::EditOptions {
                id,
                title,
                status,
                actual,
                clear_due,
                clear_color,
                fields,
                data_dir,
                output,
            }),
            Commands::Toggle { id } => task::run_toggle(&id, &data_dir, output),
            Commands::Rm { id } => task::run_rm(&id, &data_dir, output),
            Commands::Stats => task::run_stats(&data_dir, output),
            Commands::Today => task::run_query(task::Query::Today, &data_dir, output),
            Commands::Overdue => task::run_query(task::Query::Overdue, &data_dir, output),
            Commands::Upcoming => task::run_query(task::Query::Upcoming, &data_dir, output),
        }
    }
}
