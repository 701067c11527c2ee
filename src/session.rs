//! Interactive `run` session. The reminder scheduler ticks in the background
//! while commands are read from stdin, one per line.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info, warn};

use taskbell::alert::Alert;
use taskbell::manager::TaskManager;
use taskbell::watch;

use crate::cli::{Cli, Command};

/// Saves arrive as a burst of events; wait this long and coalesce them.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(300);
/// How often pending alerts are flushed while the prompt is idle.
const ALERT_POLL: Duration = Duration::from_millis(500);

enum Event {
    Line(String),
    Eof,
    FileChanged,
    Interrupt,
}

enum Flow {
    Continue,
    Quit,
}

fn prompt() {
    print!("taskbell> ");
    let _ = io::stdout().flush();
}

pub fn run(
    manager: &mut TaskManager,
    tasks_path: &Path,
    alerts: &Receiver<Alert>,
    shutdown_timeout: Duration,
) -> Result<()> {
    let (tx, rx) = mpsc::channel();

    let ctrl_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrl_tx.send(Event::Interrupt);
    })
    .context("failed to set signal handler")?;

    if let Some(dir) = tasks_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let (_watcher, changes) = watch::watch_file(tasks_path)?;
    let change_tx = tx.clone();
    thread::Builder::new()
        .name("taskbell-watch".into())
        .spawn(move || {
            while watch::wait_for_change(&changes, Duration::MAX) {
                thread::sleep(RELOAD_DEBOUNCE);
                watch::drain_events(&changes);
                if change_tx.send(Event::FileChanged).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn watcher thread")?;

    thread::Builder::new()
        .name("taskbell-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(Event::Line(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(Event::Eof);
        })
        .context("failed to spawn input thread")?;

    let mut handle = manager.start_scheduler()?;
    info!("Session started");
    eprintln!("Reminders running. Type a command, `help`, or `quit`.");
    prompt();

    loop {
        crate::print_alerts(alerts);
        match rx.recv_timeout(ALERT_POLL) {
            Ok(Event::Line(line)) => {
                match handle_line(manager, &line) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => eprintln!("error: {e:#}"),
                }
                crate::print_alerts(alerts);
                prompt();
            }
            Ok(Event::FileChanged) => {
                info!("Task file changed, reloading");
                if let Err(e) = manager.reload() {
                    error!("Reload failed: {e:#}");
                    eprintln!("error: {e:#}");
                }
            }
            Ok(Event::Eof) | Ok(Event::Interrupt) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Session ending, stopping scheduler");
    if !handle.stop(shutdown_timeout) {
        warn!("Scheduler did not stop within {shutdown_timeout:?}, detaching");
        eprintln!("warning: scheduler did not stop in time");
    }
    Ok(())
}

fn handle_line(manager: &mut TaskManager, line: &str) -> Result<Flow> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Flow::Continue);
    }
    if matches!(line, "quit" | "exit") {
        return Ok(Flow::Quit);
    }
    if let Some(command) = parse_line(line)? {
        crate::dispatch(manager, command)?;
    }
    Ok(Flow::Continue)
}

/// Parse one session line as a subcommand. Help requests are printed and
/// yield `None`.
fn parse_line(line: &str) -> Result<Option<Command>> {
    let Some(tokens) = shlex::split(line) else {
        bail!("unbalanced quotes: {line}");
    };
    let mut args = vec!["taskbell".to_string()];
    args.extend(tokens);

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            print!("{e}");
            return Ok(None);
        }
        Err(e) => return Err(e).with_context(|| format!("failed to parse: {line}")),
    };
    match cli.command {
        Command::Run => bail!("run cannot be nested"),
        command => Ok(Some(command)),
    }
}
