use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub app_name: String,
    pub timeout: Duration,
}

/// Fire-and-forget desktop notification delivery. Implementations may fail;
/// callers log the failure and move on.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Delivers through the platform's notification tool.
pub struct DesktopNotifier {
    program: Option<String>,
}

impl DesktopNotifier {
    /// `program` overrides the platform default. It is invoked with
    /// `notify-send` style arguments: `-a APP -t MILLIS TITLE MESSAGE`.
    pub fn new(program: Option<String>) -> Self {
        Self { program }
    }

    fn command_for(&self, n: &Notification) -> Command {
        if let Some(program) = &self.program {
            return notify_send(program, n);
        }
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {} with title {} subtitle {}",
                applescript_string(&n.message),
                applescript_string(&n.title),
                applescript_string(&n.app_name),
            );
            let mut cmd = Command::new("osascript");
            cmd.args(["-e", &script]);
            cmd
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "[void][Reflection.Assembly]::LoadWithPartialName('System.Windows.Forms'); \
                 $n = New-Object System.Windows.Forms.NotifyIcon; \
                 $n.Icon = [System.Drawing.SystemIcons]::Information; \
                 $n.Visible = $true; \
                 $n.ShowBalloonTip({}, '{}', '{}', 'Info'); \
                 Start-Sleep -Milliseconds {}; $n.Dispose()",
                n.timeout.as_millis(),
                powershell_escape(&n.title),
                powershell_escape(&n.message),
                n.timeout.as_millis(),
            );
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-Command", &script]);
            cmd
        } else {
            notify_send("notify-send", n)
        }
    }
}

fn notify_send(program: &str, n: &Notification) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(["-a", &n.app_name])
        .args(["-t", &n.timeout.as_millis().to_string()])
        .arg(&n.title)
        .arg(&n.message);
    cmd
}

fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn powershell_escape(s: &str) -> String {
    s.replace('\'', "''")
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        let mut cmd = self.command_for(notification);
        let program = cmd.get_program().to_string_lossy().into_owned();
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to run {program}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{program} failed: {}", stderr.trim());
        }
        Ok(())
    }
}

/// Keeps notifications in memory instead of delivering them.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every attempt but reports each one as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().push(notification.clone());
        if self.fail {
            bail!("notification service unavailable");
        }
        Ok(())
    }
}
