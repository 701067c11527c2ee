//! Default file locations. Everything lives under one data directory,
//! `$TASKBELL_DIR` or `$HOME/.taskbell`.

use std::path::PathBuf;

pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TASKBELL_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".taskbell")
}

pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn tasks_path() -> PathBuf {
    data_dir().join("tasks.json")
}

pub fn completion_log_path() -> PathBuf {
    data_dir().join("executed_tasks.txt")
}

pub fn debug_log_path() -> PathBuf {
    data_dir().join("scheduler_debug.log")
}
