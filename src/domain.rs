use std::io::Error;
use std::path::PathBuf;

use calamine::XlsxError;
use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::filter::Role;

#[derive(Debug)]
pub enum SpvError {
    IoError(Error),
    PolarsError(PolarsError),
    XlsxError(XlsxError),
    LoadingFailed(String),
    FileNotFound(PathBuf),
    PermissionDenied(PathBuf),
    UnknownFileType(PathBuf),
    ScriptNotFound(PathBuf),
    InvalidPath(String),
}

impl SpvError {
    /// Short, user facing description for the status line and error popups.
    pub fn describe(&self) -> String {
        match self {
            SpvError::IoError(e) => format!("I/O error: {e}"),
            SpvError::PolarsError(e) => format!("Failed to read table: {e}"),
            SpvError::XlsxError(e) => format!("Failed to read workbook: {e}"),
            SpvError::LoadingFailed(msg) => format!("Loading failed: {msg}"),
            SpvError::FileNotFound(p) => format!("File not found: {}", p.display()),
            SpvError::PermissionDenied(p) => format!("Permission denied: {}", p.display()),
            SpvError::UnknownFileType(p) => format!("Unknown file type: {}", p.display()),
            SpvError::ScriptNotFound(p) => format!("Script not found: {}", p.display()),
            SpvError::InvalidPath(msg) => format!("Invalid path: {msg}"),
        }
    }
}

impl From<Error> for SpvError {
    fn from(err: Error) -> Self {
        SpvError::IoError(err)
    }
}

impl From<PolarsError> for SpvError {
    fn from(err: PolarsError) -> Self {
        SpvError::PolarsError(err)
    }
}

impl From<XlsxError> for SpvError {
    fn from(err: XlsxError) -> Self {
        SpvError::XlsxError(err)
    }
}

/// Runtime configuration, assembled in main from the CLI arguments.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_", into)]
pub struct SpvConfig {
    pub data_path: PathBuf,
    pub sheet_name: String,
    pub refresh_script: PathBuf,
    pub download_script: PathBuf,
    pub powershell_bin: String,
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl Default for SpvConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("DefaultView-Data.xlsx"),
            sheet_name: "DefaultView".to_string(),
            refresh_script: PathBuf::from("exportAllColumns.ps1"),
            download_script: PathBuf::from("downloadAttachments.ps1"),
            powershell_bin: "powershell.exe".to_string(),
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    OpenPicker(Role),
    ClearFilters,
    ToggleMark,
    Reload,
    RunRefresh,
    RunDownload,
    CopyCell,
    CopyRow,
    Help,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusLevel {
    NORMAL,
    INFO,
    SUCCESS,
    WARNING,
    ERROR,
}

pub const HELP_TEXT: &str = "\
 Navigation
   Up/Down/Left/Right   move the cursor
   PgUp/PgDn            move one page
   Home/End             first / last row

 Filters
   c   company filter
   i   identification filter
   e   equipment filter
   s   status filter
   x   clear all filters

 Data
   space   mark row for download
   d       download attachments (marked rows, or all visible)
   r       synchronize the spreadsheet from SharePoint
   l       reload the spreadsheet from disk
   y / Y   copy cell / row to clipboard

 Other
   ?   this help
   q   quit
";
