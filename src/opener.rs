use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to open {}: {reason}", path.display())]
    Handler { path: PathBuf, reason: String },
}

fn handler_command(path: &Path) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

/// Open `path` with the host's default handler.
pub fn open_path(path: &Path) -> Result<(), OpenError> {
    if !path.exists() {
        return Err(OpenError::NotFound(path.to_path_buf()));
    }
    let status = handler_command(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| OpenError::Handler {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if !status.success() {
        return Err(OpenError::Handler {
            path: path.to_path_buf(),
            reason: format!("handler exited with {status}"),
        });
    }
    Ok(())
}
