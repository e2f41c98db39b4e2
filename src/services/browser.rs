//! Opening URLs in the user's browser.

use crate::error::{AuraError, Result};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long the opener command may run before it is left to itself.
const OPENER_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that can show a URL to the user.
pub trait UrlOpener: Send + Sync {
    /// Open `url`. Must not block for long.
    ///
    /// # Errors
    ///
    /// Returns an error when no opener is available or it fails to start.
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the platform launcher (`xdg-open`, `open`, or
/// `cmd /C start`).
#[derive(Debug, Clone, Default)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(url: &str) -> Result<Command> {
        if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            return Ok(cmd);
        }
        let program = if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        let path: PathBuf = which::which(program)
            .map_err(|_| AuraError::Io(std::io::Error::other(format!("{program} not found"))))?;
        let mut cmd = Command::new(path);
        cmd.arg(url);
        Ok(cmd)
    }
}

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        let child = Self::command(url)?
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!(url, "opener spawned");
        settle(child, url, OPENER_TIMEOUT)?;
        Ok(())
    }
}

/// Launchers hand off and exit at once. Poll for up to `timeout`, then hand
/// the child to a reaper thread so it is still waited on. Returns the
/// reaper when one was started.
fn settle(mut child: Child, url: &str, timeout: Duration) -> Result<Option<JoinHandle<()>>> {
    let start = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => {
                if !status.success() {
                    let code = status.code().unwrap_or(-1);
                    warn!(url, code, "opener exited with failure");
                }
                return Ok(None);
            }
            None if start.elapsed() > timeout => break,
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    }

    debug!(url, "opener still running; detaching");
    let reaper = std::thread::Builder::new()
        .name("aura-opener-reaper".into())
        .spawn(move || {
            let _ = child.wait();
        })?;
    Ok(Some(reaper))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_launcher_needs_no_reaper() {
        let Ok(path) = which::which("true") else {
            return;
        };
        let child = Command::new(path).spawn().expect("spawn");
        let reaper =
            settle(child, "https://example.com", Duration::from_secs(5)).expect("settle");
        assert!(reaper.is_none());
    }

    #[test]
    fn slow_launcher_is_reaped_in_background() {
        let Ok(path) = which::which("sleep") else {
            return;
        };
        let child = Command::new(path).arg("1").spawn().expect("spawn");
        let started = Instant::now();
        let reaper = settle(child, "https://example.com", Duration::from_millis(100))
            .expect("settle")
            .expect("reaper started");
        assert!(started.elapsed() < Duration::from_secs(1));
        reaper.join().expect("reaper finished");
    }
}
