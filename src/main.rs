mod cli;
mod session;

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use taskbell::alert::{Alert, AlertSink};
use taskbell::clock::SystemClock;
use taskbell::config::Config;
use taskbell::manager::{CreationReminder, NewTask, TaskManager};
use taskbell::model::{Priority, TaskId};
use taskbell::notifier::DesktopNotifier;
use taskbell::output;
use taskbell::paths;
use taskbell::scheduler::ReminderSettings;
use taskbell::store::JsonFileStore;

use cli::{Cli, Command};

fn setup_logging(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .context("failed to open log file")?;

    env_logger::Builder::new()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    setup_logging(&paths::debug_log_path())?;

    let tasks_path = cli.tasks.unwrap_or_else(|| config.tasks_file());
    info!("Using task file {}", tasks_path.display());

    let (alerts, alert_rx) = AlertSink::channel();
    let mut manager = TaskManager::open(
        Arc::new(JsonFileStore::new(&tasks_path, config.completion_log())),
        Arc::new(DesktopNotifier::new(config.notifications.command.clone())),
        Arc::new(SystemClock),
        alerts,
        ReminderSettings::from_config(&config),
    );

    let result = match cli.command {
        Command::Run => session::run(
            &mut manager,
            &tasks_path,
            &alert_rx,
            config.reminders.shutdown_timeout(),
        ),
        command => dispatch(&mut manager, command),
    };
    print_alerts(&alert_rx);
    result
}

fn print_alerts(alerts: &Receiver<Alert>) {
    while let Ok(alert) = alerts.try_recv() {
        eprintln!("{alert}");
    }
}

fn resolve_all(manager: &TaskManager, queries: &[String]) -> Result<Vec<TaskId>> {
    queries.iter().map(|q| manager.resolve(q)).collect()
}

fn dispatch(manager: &mut TaskManager, command: Command) -> Result<()> {
    match command {
        Command::Add {
            name,
            due_date,
            due_time,
            desc,
            priority,
            files,
        } => {
            let priority = Priority::parse(&priority)?;
            let (id, reminder) = manager.add_task(NewTask {
                name,
                description: desc,
                due_date,
                due_time,
                priority,
                files,
            })?;
            if let Some(task) = manager.task(id) {
                eprintln!("Added task '{}' ({})", task.name, id.short());
            }
            match reminder {
                CreationReminder::Scheduled => {}
                CreationReminder::Sent => eprintln!("Task is due soon, reminder sent"),
                CreationReminder::Failed => eprintln!("Task is due soon, but the reminder failed"),
                CreationReminder::PastDue => {
                    eprintln!("Task is already past due, no reminder will be sent")
                }
            }
        }

        Command::List { json } => {
            let tasks = manager.tasks_sorted();
            if json {
                println!("{}", output::tasks_json(&tasks)?);
            } else {
                print!("{}", output::format_task_list(&tasks));
            }
        }

        Command::Show { task, json } => {
            let id = manager.resolve(&task)?;
            let task = manager
                .task(id)
                .with_context(|| format!("task '{task}' not found"))?;
            if json {
                println!("{}", output::task_json(&task)?);
            } else {
                print!("{}", output::format_task_detail(&task));
            }
        }

        Command::Done { tasks } => {
            let ids = resolve_all(manager, &tasks)?;
            let n = manager.complete_tasks(&ids)?;
            eprintln!("Marked {n} task(s) completed");
        }

        Command::Rm { tasks } => {
            let ids = resolve_all(manager, &tasks)?;
            let n = manager.delete_tasks(&ids)?;
            eprintln!("Deleted {n} task(s)");
        }

        Command::Open { task, index } => {
            let id = manager.resolve(&task)?;
            let path = manager.open_attachment(id, index)?;
            eprintln!("Opened {}", path.display());
        }

        Command::TestNotify { task } => {
            let id = manager.resolve(&task)?;
            manager.test_notification(id)?;
            eprintln!("Test notification sent");
        }

        Command::Queue => {
            print!(
                "{}",
                output::format_queue(&manager.queue_entries(), &manager.tasks())
            );
        }

        Command::Run => anyhow::bail!("run cannot be nested"),
    }

    Ok(())
}
