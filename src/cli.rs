use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taskbell", about = "Task list with desktop due-date reminders")]
pub struct Cli {
    /// Path to the task file [default: ~/.taskbell/tasks.json]
    #[arg(long, env = "TASKBELL_TASKS", global = true)]
    pub tasks: Option<PathBuf>,

    /// Path to the config file [default: ~/.taskbell/config.toml]
    #[arg(long, env = "TASKBELL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task
    Add {
        /// Task title
        name: String,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due_date: String,
        /// Due time (HH:MM, 24-hour)
        #[arg(long)]
        due_time: String,
        /// Task description
        #[arg(short, long, default_value = "")]
        desc: String,
        /// Priority (High, Medium, Low)
        #[arg(short, long, default_value = "Medium")]
        priority: String,
        /// Attach a file (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },

    /// List tasks by priority, then due time
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show task details
    Show {
        /// Task id prefix or exact title
        task: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark tasks as completed
    Done {
        /// Task id prefixes or exact titles
        #[arg(id = "task_refs", value_name = "TASKS", required = true)]
        tasks: Vec<String>,
    },

    /// Delete tasks
    Rm {
        /// Task id prefixes or exact titles
        #[arg(id = "task_refs", value_name = "TASKS", required = true)]
        tasks: Vec<String>,
    },

    /// Open an attached file with the default application
    Open {
        /// Task id prefix or exact title
        task: String,
        /// Attachment index as shown by `show`
        #[arg(default_value_t = 0)]
        index: usize,
    },

    /// Send a test notification for a task
    TestNotify {
        /// Task id prefix or exact title
        task: String,
    },

    /// Show pending reminders in firing order
    Queue,

    /// Run the reminder scheduler with an interactive prompt
    Run,
}
