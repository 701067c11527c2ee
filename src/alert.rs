use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warning,
    Error,
}

/// A non-fatal problem the user should see. Alerts never block the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: Level,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            Level::Warning => "warning",
            Level::Error => "error",
        };
        write!(f, "{tag}: {}: {}", self.title, self.message)
    }
}

#[derive(Clone)]
pub struct AlertSink {
    tx: Sender<Alert>,
}

impl AlertSink {
    pub fn channel() -> (Self, Receiver<Alert>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, alert: Alert) {
        // Receiver gone means nobody is displaying alerts; the log still has it.
        let _ = self.tx.send(alert);
    }
}
