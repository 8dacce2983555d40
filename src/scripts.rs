//! External PowerShell collaborators. One script refreshes the spreadsheet
//! from SharePoint, one downloads attachments for a list of row ids.
//!
//! Scripts run on a worker thread so the event loop stays responsive. The
//! thread streams output lines and the final exit over a channel; the model
//! drains it on every tick. There is no cancellation, the user waits for the
//! process to exit.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use tracing::{debug, info, warn};

use crate::domain::{SpvConfig, SpvError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptKind {
    Refresh,
    Download,
}

impl ScriptKind {
    pub fn title(self) -> &'static str {
        match self {
            ScriptKind::Refresh => "Synchronizing data",
            ScriptKind::Download => "Downloading attachments",
        }
    }
}

#[derive(Debug)]
pub enum ScriptEvent {
    /// One non-empty line of script output, for the progress popup.
    Line(String),
    /// The process exited. `code` is `None` when killed by a signal.
    Finished {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The process could not be spawned or waited for.
    Failed(String),
}

/// Handle to a running script. Dropped once the final event is consumed.
#[derive(Debug)]
pub struct ScriptJob {
    pub kind: ScriptKind,
    pub last_line: String,
    rx: Receiver<ScriptEvent>,
}

impl ScriptJob {
    pub fn try_next(&self) -> Option<ScriptEvent> {
        self.rx.try_recv().ok()
    }
}

/// Spawn a script through PowerShell. The script path is checked before any
/// launch attempt; extra arguments are appended after `-File <script>`.
pub fn launch(
    config: &SpvConfig,
    kind: ScriptKind,
    extra_args: &[String],
) -> Result<ScriptJob, SpvError> {
    let script = match kind {
        ScriptKind::Refresh => &config.refresh_script,
        ScriptKind::Download => &config.download_script,
    };
    if !script.is_file() {
        return Err(SpvError::ScriptNotFound(script.clone()));
    }

    let mut cmd = Command::new(&config.powershell_bin);
    cmd.arg("-ExecutionPolicy")
        .arg("Bypass")
        .arg("-File")
        .arg(script)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    info!("Launching {:?}: {:?}", kind, cmd);
    let (tx, rx) = channel();
    thread::spawn(move || run_script(cmd, tx));

    Ok(ScriptJob {
        kind,
        last_line: "Starting ...".to_string(),
        rx,
    })
}

// Worker: stream stdout line by line, collect stderr on a side thread and
// report the exit. Send errors mean the model dropped the job; ignore them.
fn run_script(mut cmd: Command, tx: Sender<ScriptEvent>) {
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = tx.send(ScriptEvent::Failed(e.to_string()));
            return;
        }
    };

    let stderr = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });

    let mut stdout = String::new();
    if let Some(pipe) = child.stdout.take() {
        for line in BufReader::new(pipe).lines() {
            let Ok(line) = line else { break };
            stdout.push_str(&line);
            stdout.push('\n');
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                debug!("Script output: {trimmed}");
                let _ = tx.send(ScriptEvent::Line(trimmed.to_string()));
            }
        }
    }

    let stderr = stderr_reader.join().unwrap_or_default();
    match child.wait() {
        Ok(status) => {
            info!("Script finished with {status}");
            let _ = tx.send(ScriptEvent::Finished {
                code: status.code(),
                stdout,
                stderr,
            });
        }
        Err(e) => {
            warn!("Waiting for script failed: {e}");
            let _ = tx.send(ScriptEvent::Failed(e.to_string()));
        }
    }
}

/// Normalize a raw row id for the download argument list. Numeric values are
/// rendered as plain integers ("1024.0" becomes "1024"), everything else
/// passes through unchanged.
pub fn normalize_row_id(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => format!("{}", value.trunc() as i64),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_lose_their_decimal_tail() {
        assert_eq!(normalize_row_id("1024.0"), "1024");
        assert_eq!(normalize_row_id("1024"), "1024");
        assert_eq!(normalize_row_id(" 7.0 "), "7");
        assert_eq!(normalize_row_id("12.9"), "12");
        assert_eq!(normalize_row_id("1e3"), "1000");
    }

    #[test]
    fn non_numeric_ids_pass_through() {
        assert_eq!(normalize_row_id("ABC-12"), "ABC-12");
        assert_eq!(normalize_row_id(""), "");
        assert_eq!(normalize_row_id("nan"), "nan");
    }

    #[test]
    fn launch_rejects_a_missing_script() {
        let config = SpvConfig::default().with_refresh_script("no/such/script.ps1");
        let err = launch(&config, ScriptKind::Refresh, &[]).unwrap_err();
        assert!(matches!(err, SpvError::ScriptNotFound(_)));
    }
}
