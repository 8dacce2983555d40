use arboard::Clipboard;
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use std::collections::HashSet;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{HELP_TEXT, Message, SpvConfig, SpvError, StatusLevel};
use crate::filter::{self, FilterView, Role, RoleMap, Selection};
use crate::inputter::Inputter;
use crate::scripts::{self, ScriptEvent, ScriptJob, ScriptKind};
use crate::table::{self, Column};
use crate::ui::{
    COLUMN_WIDTH_MARGIN, FILTERBAR_HEIGHT, HEADER_HEIGHT, MARKER_WIDTH, PICKER_VISIBLE,
    STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    PICKER,
    CONFIRM,
    POPUP,
}

/// Window of one column sent to the UI for rendering.
#[derive(Debug, Clone)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let chrome = HEADER_HEIGHT + FILTERBAR_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT;
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(MARKER_WIDTH),
            table_height: ui_height.saturating_sub(chrome),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Dropdown replacement: a list of the role's cascaded options plus a query
/// line that narrows it down while typing.
pub struct Picker {
    pub role: Role,
    pub entries: Vec<String>,
    /// True while the query is empty and entry 0 is the synthetic "(any)".
    pub has_any: bool,
    pub cursor: usize,
    pub offset: usize,
    pub query: Inputter,
    options: Vec<String>,
}

impl Picker {
    const ANY: &'static str = "(any)";

    fn new(role: Role, options: Vec<String>) -> Self {
        let mut picker = Picker {
            role,
            entries: Vec::new(),
            has_any: true,
            cursor: 0,
            offset: 0,
            query: Inputter::default(),
            options,
        };
        picker.rebuild();
        picker
    }

    fn rebuild(&mut self) {
        if self.query.is_empty() {
            self.has_any = true;
            self.entries = std::iter::once(Self::ANY.to_string())
                .chain(self.options.iter().cloned())
                .collect();
        } else {
            let needle = self.query.text().to_lowercase();
            self.has_any = false;
            self.entries = self
                .options
                .iter()
                .filter(|option| option.to_lowercase().contains(&needle))
                .cloned()
                .collect();
        }
        self.cursor = 0;
        self.offset = 0;
    }

    fn move_up(&mut self, step: usize) {
        self.cursor = self.cursor.saturating_sub(step);
        if self.cursor < self.offset {
            self.offset = self.cursor;
        }
    }

    fn move_down(&mut self, step: usize) {
        if self.entries.is_empty() {
            return;
        }
        self.cursor = std::cmp::min(self.cursor + step, self.entries.len() - 1);
        if self.cursor >= self.offset + PICKER_VISIBLE {
            self.offset = self.cursor + 1 - PICKER_VISIBLE;
        }
    }

    // The value this picker stands for when confirmed. A query that matches
    // no option is taken literally, like typing into an editable combo box.
    fn choice(&self) -> Option<String> {
        if self.has_any && self.cursor == 0 {
            return None;
        }
        if let Some(entry) = self.entries.get(self.cursor) {
            return Some(entry.clone());
        }
        if !self.query.is_empty() {
            return Some(self.query.text().to_string());
        }
        None
    }
}

pub struct Confirm {
    pub ids: Vec<String>,
    pub scope: &'static str,
}

pub struct Popup {
    pub title: String,
    pub text: String,
}

pub struct Model {
    config: SpvConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    table_name: String,
    data: Vec<Column>,
    role_map: RoleMap,
    selection: Selection,
    view: FilterView,
    visible_columns: Vec<usize>,
    view_columns: Vec<ColumnView>,
    marker_flags: Vec<bool>,
    marked: HashSet<usize>,
    cursor_row: usize,
    offset_row: usize,
    cursor_column: usize,
    offset_column: usize,
    picker: Option<Picker>,
    confirm: Option<Confirm>,
    popup: Option<Popup>,
    script: Option<ScriptJob>,
    clipboard: Option<Clipboard>,
    layout: UILayout,
    status_message: String,
    status_level: StatusLevel,
}

impl Model {
    pub fn init(config: &SpvConfig, ui_width: usize, ui_height: usize) -> Result<Self, SpvError> {
        let clipboard = match Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                warn!("Clipboard unavailable: {e}");
                None
            }
        };
        Ok(Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            table_name: String::new(),
            data: Vec::new(),
            role_map: RoleMap::empty(),
            selection: Selection::default(),
            view: FilterView::default(),
            visible_columns: Vec::new(),
            view_columns: Vec::new(),
            marker_flags: Vec::new(),
            marked: HashSet::new(),
            cursor_row: 0,
            offset_row: 0,
            cursor_column: 0,
            offset_column: 0,
            picker: None,
            confirm: None,
            popup: None,
            script: None,
            clipboard,
            layout: UILayout::from_values(ui_width, ui_height),
            status_message: "Started spv!".to_string(),
            status_level: StatusLevel::NORMAL,
        })
    }

    // ----------------------- Loading ----------------------- //

    /// Load the spreadsheet if it exists; otherwise stay in the empty state
    /// and point the user at the synchronize action.
    pub fn load_if_present(&mut self) {
        if !self.config.data_path.exists() {
            self.set_status(
                format!(
                    "{} not found - press r to synchronize",
                    self.config.data_path.display()
                ),
                StatusLevel::WARNING,
            );
            return;
        }
        if let Err(e) = self.load_data_file() {
            error!("Loading failed: {e:?}");
            self.set_status(e.describe(), StatusLevel::ERROR);
            self.show_popup("Load error", e.describe());
        }
    }

    pub fn load_data_file(&mut self) -> Result<(), SpvError> {
        let path = self.config.data_path.clone();
        let columns = table::load(&path, &self.config.sheet_name)?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        self.install(name, columns);
        Ok(())
    }

    // Commit a freshly loaded table. Everything up to here is fallible and
    // leaves the previous state untouched.
    fn install(&mut self, name: String, mut columns: Vec<Column>) {
        for column in columns.iter_mut() {
            let width = std::cmp::max(column.name.len(), column.max_width) + COLUMN_WIDTH_MARGIN;
            column.render_width = std::cmp::min(width, self.config.max_column_width);
        }

        self.role_map = filter::resolve(&columns);
        debug!("Resolved roles: {:?}", self.role_map);
        self.table_name = name;
        self.data = columns;
        self.selection = Selection::default();
        self.marked.clear();
        self.cursor_row = 0;
        self.offset_row = 0;
        self.cursor_column = 0;
        self.offset_column = 0;
        self.status = Status::READY;

        // Approved records are what the user looks at most of the time.
        let initial = filter::apply_filters(&self.data, &self.role_map, &self.selection);
        if let Some(approved) = filter::default_status(initial.options(Role::Status)) {
            let approved = approved.clone();
            info!("Auto-selecting status \"{approved}\"");
            self.selection.set(Role::Status, Some(approved));
        }
        self.apply_selection();
    }

    // ----------------------- Filtering ----------------------- //

    fn apply_selection(&mut self) {
        self.view = filter::apply_filters(&self.data, &self.role_map, &self.selection);
        self.marked.clear();
        self.cursor_row = 0;
        self.offset_row = 0;
        self.refresh_view();

        let total = self.nrows_total();
        if self.selection.is_empty() {
            self.set_status(format!("Loaded: {total} records"), StatusLevel::SUCCESS);
        } else {
            self.set_status(
                format!("Filtered: {} of {} records", self.view.rows.len(), total),
                StatusLevel::INFO,
            );
        }
    }

    fn clear_filters(&mut self) {
        if self.data.is_empty() {
            return;
        }
        self.selection.clear();
        self.apply_selection();
        self.set_status("Filters cleared", StatusLevel::NORMAL);
    }

    fn open_picker(&mut self, role: Role) {
        if self.data.is_empty() {
            self.set_status("No data loaded", StatusLevel::WARNING);
            return;
        }
        if self.role_map.column(role).is_none() {
            self.set_status(
                format!(
                    "Column \"{}\" not present in this sheet",
                    self.role_map.header(role)
                ),
                StatusLevel::WARNING,
            );
            return;
        }

        let mut picker = Picker::new(role, self.view.options(role).to_vec());
        if let Some(current) = self.selection.get(role)
            && let Some(pos) = picker.entries.iter().position(|e| e == current)
        {
            picker.cursor = pos;
            picker.move_down(0);
        }
        self.picker = Some(picker);
        self.previous_modus = self.modus;
        self.modus = Modus::PICKER;
    }

    fn picker_key(&mut self, key: KeyEvent) {
        let Some(picker) = self.picker.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Up => picker.move_up(1),
            KeyCode::Down => picker.move_down(1),
            KeyCode::PageUp => picker.move_up(PICKER_VISIBLE),
            KeyCode::PageDown => picker.move_down(PICKER_VISIBLE),
            KeyCode::Esc => {
                self.picker = None;
                self.modus = Modus::TABLE;
            }
            KeyCode::Enter => {
                let picker = self.picker.take().unwrap();
                self.modus = Modus::TABLE;
                trace!("Picker choice for {:?}: {:?}", picker.role, picker.choice());
                self.selection.set(picker.role, picker.choice());
                self.apply_selection();
            }
            _ => {
                if picker.query.read(key) {
                    picker.rebuild();
                }
            }
        }
    }

    // ----------------------- Scripts ----------------------- //

    fn request_refresh(&mut self) {
        if self.script.is_some() {
            self.set_status("A script is already running", StatusLevel::WARNING);
            return;
        }
        match scripts::launch(&self.config, ScriptKind::Refresh, &[]) {
            Ok(job) => {
                self.set_status("Executing PowerShell ...", StatusLevel::WARNING);
                self.script = Some(job);
            }
            Err(e) => self.set_status(e.describe(), StatusLevel::ERROR),
        }
    }

    fn request_download(&mut self) {
        if self.script.is_some() {
            self.set_status("A script is already running", StatusLevel::WARNING);
            return;
        }
        if self.data.is_empty() {
            self.set_status("No data loaded", StatusLevel::WARNING);
            return;
        }
        let Some(id_col) = self.role_map.column(Role::RowId) else {
            self.set_status(
                format!("ID column \"{}\" not found", self.role_map.header(Role::RowId)),
                StatusLevel::ERROR,
            );
            return;
        };

        // Marked rows win; otherwise every visible (filtered) row is taken.
        let (rows, scope): (Vec<usize>, &'static str) = if self.marked.is_empty() {
            (self.view.rows.clone(), "visible")
        } else {
            let marked = self
                .view
                .rows
                .iter()
                .copied()
                .filter(|ridx| self.marked.contains(ridx))
                .collect();
            (marked, "marked")
        };
        if rows.is_empty() {
            self.set_status("There are no rows to download", StatusLevel::WARNING);
            return;
        }

        let ids = rows
            .iter()
            .map(|&ridx| scripts::normalize_row_id(&self.data[id_col].data[ridx]))
            .collect();
        self.confirm = Some(Confirm { ids, scope });
        self.previous_modus = self.modus;
        self.modus = Modus::CONFIRM;
    }

    fn confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => self.confirm_download(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm = None;
                self.modus = Modus::TABLE;
                self.set_status("Download cancelled", StatusLevel::NORMAL);
            }
            _ => {}
        }
    }

    fn confirm_download(&mut self) {
        let Some(confirm) = self.confirm.take() else {
            return;
        };
        self.modus = Modus::TABLE;
        let args = vec!["-Ids".to_string(), confirm.ids.join(",")];
        match scripts::launch(&self.config, ScriptKind::Download, &args) {
            Ok(job) => {
                self.set_status(
                    format!("Downloading attachments for {} items ...", confirm.ids.len()),
                    StatusLevel::WARNING,
                );
                self.script = Some(job);
            }
            Err(e) => self.set_status(e.describe(), StatusLevel::ERROR),
        }
    }

    // Drain the worker channel; keeps the progress popup current and handles
    // the final exit exactly once.
    fn poll_script(&mut self) {
        let Some(job) = self.script.as_mut() else {
            return;
        };
        let mut finished = None;
        while let Some(event) = job.try_next() {
            match event {
                ScriptEvent::Line(line) => job.last_line = line,
                done => {
                    finished = Some(done);
                    break;
                }
            }
        }
        if let Some(event) = finished {
            let job = self.script.take();
            let kind = job.map(|j| j.kind).unwrap_or(ScriptKind::Refresh);
            self.on_script_finished(kind, event);
        }
    }

    fn on_script_finished(&mut self, kind: ScriptKind, event: ScriptEvent) {
        match event {
            ScriptEvent::Finished { code: Some(0), .. } => match kind {
                ScriptKind::Refresh => {
                    self.set_status("Synchronization finished", StatusLevel::SUCCESS);
                    self.load_if_present();
                }
                ScriptKind::Download => {
                    self.set_status("Download finished", StatusLevel::SUCCESS);
                }
            },
            ScriptEvent::Finished {
                code,
                stdout,
                stderr,
            } => {
                self.set_status("Script failed", StatusLevel::ERROR);
                let text = format!(
                    "{} exited with status {:?}\n\nstderr:\n{}\nstdout:\n{}",
                    kind.title(),
                    code,
                    stderr,
                    stdout
                );
                self.show_popup("Script error", text);
            }
            ScriptEvent::Line(_) => {}
            ScriptEvent::Failed(msg) => {
                self.set_status("Script failed", StatusLevel::ERROR);
                self.show_popup("Script error", msg);
            }
        }
    }

    // ----------------------- View plumbing ----------------------- //

    // Rebuild the visible window after any change to data, filters, cursor
    // or layout.
    fn refresh_view(&mut self) {
        self.view_columns.clear();
        self.marker_flags.clear();
        if self.data.is_empty() {
            return;
        }

        let nrows = self.view.rows.len();
        let height = self.layout.table_height;
        self.offset_row = std::cmp::min(self.offset_row, nrows.saturating_sub(1));
        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + height, nrows);
        let window = rend.saturating_sub(rbegin);
        self.cursor_row = if window == 0 {
            0
        } else {
            std::cmp::min(self.cursor_row, window - 1)
        };

        // Columns that fit the table width, starting at the column offset.
        // The last one may render partially; the UI clips it.
        self.offset_column = std::cmp::min(self.offset_column, self.data.len() - 1);
        self.visible_columns.clear();
        let mut used = 0;
        for (cidx, column) in self.data.iter().enumerate().skip(self.offset_column) {
            if used + column.render_width + 1 > self.layout.table_width
                && !self.visible_columns.is_empty()
            {
                if used < self.layout.table_width {
                    self.visible_columns.push(cidx);
                }
                break;
            }
            self.visible_columns.push(cidx);
            used += column.render_width + 1;
        }
        self.cursor_column = std::cmp::min(
            self.cursor_column,
            self.visible_columns.len().saturating_sub(1),
        );

        for &cidx in self.visible_columns.iter() {
            let column = &self.data[cidx];
            let data = self.view.rows[rbegin..rend]
                .iter()
                .map(|&ridx| column.data[ridx].clone())
                .collect();
            self.view_columns.push(ColumnView {
                name: visible_name(&column.name, column.render_width),
                width: column.render_width,
                data,
            });
        }
        self.marker_flags = self.view.rows[rbegin..rend]
            .iter()
            .map(|ridx| self.marked.contains(ridx))
            .collect();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.layout.width, width, self.layout.height, height
        );
        self.layout = UILayout::from_values(width, height);
        self.refresh_view();
    }

    fn cursor_abs_row(&self) -> Option<usize> {
        self.view.rows.get(self.offset_row + self.cursor_row).copied()
    }

    // ----------------------- Cursor movement ----------------------- //

    fn move_up(&mut self, step: usize) {
        let abs = (self.offset_row + self.cursor_row).saturating_sub(step);
        if abs >= self.offset_row {
            self.cursor_row = abs - self.offset_row;
        } else {
            self.offset_row = abs;
            self.cursor_row = 0;
        }
        self.refresh_view();
    }

    fn move_down(&mut self, step: usize) {
        let nrows = self.view.rows.len();
        if nrows == 0 {
            return;
        }
        let height = std::cmp::max(self.layout.table_height, 1);
        let abs = std::cmp::min(self.offset_row + self.cursor_row + step, nrows - 1);
        if abs < self.offset_row + height {
            self.cursor_row = abs - self.offset_row;
        } else {
            self.offset_row = abs + 1 - height;
            self.cursor_row = height - 1;
        }
        self.refresh_view();
    }

    fn move_beginning(&mut self) {
        self.cursor_row = 0;
        self.offset_row = 0;
        self.refresh_view();
    }

    fn move_end(&mut self) {
        let nrows = self.view.rows.len();
        if nrows == 0 {
            return;
        }
        let height = std::cmp::max(self.layout.table_height, 1);
        if nrows <= height {
            self.offset_row = 0;
            self.cursor_row = nrows - 1;
        } else {
            self.offset_row = nrows - height;
            self.cursor_row = height - 1;
        }
        self.refresh_view();
    }

    fn move_left(&mut self) {
        if self.cursor_column > 0 {
            self.cursor_column -= 1;
        } else if self.offset_column > 0 {
            self.offset_column -= 1;
        } else {
            return;
        }
        self.refresh_view();
    }

    fn move_right(&mut self) {
        if self.data.is_empty() {
            return;
        }
        if self.cursor_column + 1 < self.visible_columns.len() {
            self.cursor_column += 1;
        } else if self.visible_columns.last().copied().unwrap_or(0) + 1 < self.data.len() {
            self.offset_column += 1;
        } else {
            return;
        }
        self.refresh_view();
    }

    // ----------------------- Row marking & clipboard ----------------------- //

    fn toggle_mark(&mut self) {
        let Some(ridx) = self.cursor_abs_row() else {
            return;
        };
        if !self.marked.remove(&ridx) {
            self.marked.insert(ridx);
        }
        self.refresh_view();
    }

    fn copy_cell(&mut self) {
        let Some(ridx) = self.cursor_abs_row() else {
            return;
        };
        let Some(&cidx) = self.visible_columns.get(self.cursor_column) else {
            return;
        };
        let cell = self.data[cidx].data[ridx].clone();
        self.copy_to_clipboard(cell, "Copied cell");
    }

    fn copy_row(&mut self) {
        let Some(ridx) = self.cursor_abs_row() else {
            return;
        };
        let content = self
            .data
            .iter()
            .map(|column| wrap_cell_content(&column.data[ridx]))
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(content, "Copied row");
    }

    fn copy_to_clipboard(&mut self, content: String, what: &str) {
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.set_status("Clipboard unavailable", StatusLevel::WARNING);
            return;
        };
        match clipboard.set_text(content) {
            Ok(_) => self.set_status(what, StatusLevel::NORMAL),
            Err(e) => {
                warn!("Error copying to clipboard: {e:?}");
                self.set_status("Error copying to clipboard", StatusLevel::ERROR);
            }
        }
    }

    // ----------------------- Popups & status ----------------------- //

    fn show_popup(&mut self, title: impl Into<String>, text: impl Into<String>) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup = Some(Popup {
            title: title.into(),
            text: text.into(),
        });
    }

    fn close_popup(&mut self) {
        self.popup = None;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn show_help(&mut self) {
        self.show_popup("Help", HELP_TEXT);
    }

    fn set_status(&mut self, message: impl Into<String>, level: StatusLevel) {
        self.status_message = message.into();
        self.status_level = level;
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    // ----------------------- Message handling ----------------------- //

    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::PICKER | Modus::CONFIRM)
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), SpvError> {
        self.poll_script();

        let Some(msg) = message else { return Ok(()) };
        if let Message::Resize(width, height) = msg {
            self.ui_resize(width, height);
            return Ok(());
        }

        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_up(1),
                Message::MoveDown => self.move_down(1),
                Message::MoveLeft => self.move_left(),
                Message::MoveRight => self.move_right(),
                Message::MovePageUp => self.move_up(self.layout.table_height + 1),
                Message::MovePageDown => self.move_down(self.layout.table_height + 1),
                Message::MoveBeginning => self.move_beginning(),
                Message::MoveEnd => self.move_end(),
                Message::OpenPicker(role) => self.open_picker(role),
                Message::ClearFilters => self.clear_filters(),
                Message::ToggleMark => self.toggle_mark(),
                Message::Reload => self.load_if_present(),
                Message::RunRefresh => self.request_refresh(),
                Message::RunDownload => self.request_download(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::PICKER | Modus::CONFIRM => match msg {
                Message::Quit => self.quit(),
                Message::RawKey(key) => {
                    if self.modus == Modus::PICKER {
                        self.picker_key(key);
                    } else {
                        self.confirm_key(key);
                    }
                }
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter => self.close_popup(),
                _ => (),
            },
        }
        Ok(())
    }

    // ----------------------- UI accessors ----------------------- //

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view_columns(&self) -> &[ColumnView] {
        &self.view_columns
    }

    pub fn marker_flags(&self) -> &[bool] {
        &self.marker_flags
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_column)
    }

    pub fn selected_abs_row(&self) -> usize {
        self.offset_row + self.cursor_row
    }

    pub fn nrows_visible(&self) -> usize {
        self.view.rows.len()
    }

    pub fn nrows_total(&self) -> usize {
        self.data.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    pub fn filters(&self) -> impl Iterator<Item = (Role, Option<&str>)> {
        Role::FILTERS
            .into_iter()
            .map(|role| (role, self.selection.get(role)))
    }

    pub fn status_line(&self) -> (&str, StatusLevel) {
        (&self.status_message, self.status_level)
    }

    pub fn picker(&self) -> Option<&Picker> {
        self.picker.as_ref()
    }

    pub fn confirm(&self) -> Option<&Confirm> {
        self.confirm.as_ref()
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn script(&self) -> Option<&ScriptJob> {
        self.script.as_ref()
    }

    #[cfg(test)]
    fn from_columns(config: &SpvConfig, columns: Vec<Column>) -> Self {
        let mut model = Model::init(config, 120, 40).unwrap();
        model.install("test".to_string(), columns);
        model
    }
}

fn visible_name(name: &str, width: usize) -> String {
    if width < 3 {
        return String::new();
    }
    if name.len() > width {
        let mut reduced: String = name.chars().take(width.saturating_sub(3)).collect();
        reduced.push_str("...");
        reduced
    } else {
        name.to_string()
    }
}

// CSV-style quoting for whole-row clipboard copies.
fn wrap_cell_content(cell: &str) -> String {
    let needs_escaping = cell.contains('"');
    let needs_wrapping = cell.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(cell);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_config() -> SpvConfig {
        SpvConfig::default().with_data_path("tests/fixtures/defaultview_01.csv")
    }

    fn loaded_model() -> Model {
        let mut model = Model::init(&fixture_config(), 120, 40).unwrap();
        model.load_if_present();
        model
    }

    fn raw(code: KeyCode) -> Option<Message> {
        Some(Message::RawKey(KeyEvent::from(code)))
    }

    fn col(name: &str, values: &[&str]) -> Column {
        Column::from_values(name, values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn loading_auto_selects_the_approved_status() {
        let model = loaded_model();
        assert_eq!(model.status, Status::READY);
        assert_eq!(model.selection.get(Role::Status), Some("Aprovado"));
        assert_eq!(model.nrows_visible(), 4);
        assert_eq!(model.nrows_total(), 8);
    }

    #[test]
    fn clear_filters_restores_the_full_table() {
        let mut model = loaded_model();
        model.update(Some(Message::ClearFilters)).unwrap();
        assert_eq!(model.nrows_visible(), 8);
        assert!(model.selection.is_empty());
    }

    #[test]
    fn picking_a_company_cascades_into_the_other_dropdowns() {
        let mut model = loaded_model();

        // Status "Aprovado" is active; companies offered are those with
        // approved rows: Acme Energia, Borealis Wind, Cetus Power.
        model.update(Some(Message::OpenPicker(Role::Company))).unwrap();
        let entries = model.picker().unwrap().entries.clone();
        assert_eq!(
            entries,
            ["(any)", "Acme Energia", "Borealis Wind", "Cetus Power"]
        );

        model.update(raw(KeyCode::Down)).unwrap();
        model.update(raw(KeyCode::Enter)).unwrap();

        assert_eq!(model.selection.get(Role::Company), Some("Acme Energia"));
        assert_eq!(model.nrows_visible(), 1);
        assert_eq!(model.view.options(Role::Identification), ["WTG-01"]);
    }

    #[test]
    fn picker_query_narrows_and_takes_unmatched_text_literally() {
        let mut model = loaded_model();
        model.update(Some(Message::OpenPicker(Role::Company))).unwrap();

        for chr in "bore".chars() {
            model.update(raw(KeyCode::Char(chr))).unwrap();
        }
        assert_eq!(model.picker().unwrap().entries, ["Borealis Wind"]);
        model.update(raw(KeyCode::Enter)).unwrap();
        assert_eq!(model.selection.get(Role::Company), Some("Borealis Wind"));

        // A query matching nothing is applied verbatim and empties the view.
        model.update(Some(Message::OpenPicker(Role::Company))).unwrap();
        for chr in "zz".chars() {
            model.update(raw(KeyCode::Char(chr))).unwrap();
        }
        model.update(raw(KeyCode::Enter)).unwrap();
        assert_eq!(model.selection.get(Role::Company), Some("zz"));
        assert_eq!(model.nrows_visible(), 0);
    }

    #[test]
    fn picker_any_entry_clears_the_role() {
        let mut model = loaded_model();
        model.update(Some(Message::OpenPicker(Role::Status))).unwrap();

        // The cursor starts on the current selection ("Aprovado", entry 1).
        assert_eq!(model.picker().unwrap().cursor, 1);
        model.update(raw(KeyCode::Up)).unwrap();
        model.update(raw(KeyCode::Enter)).unwrap();

        assert_eq!(model.selection.get(Role::Status), None);
        assert_eq!(model.nrows_visible(), 8);
    }

    #[test]
    fn download_confirm_collects_visible_ids_when_nothing_is_marked() {
        let mut model = loaded_model();
        model.update(Some(Message::RunDownload)).unwrap();

        let confirm = model.confirm().unwrap();
        assert_eq!(confirm.scope, "visible");
        assert_eq!(confirm.ids, ["1", "3", "5", "8"]);
    }

    #[test]
    fn download_confirm_prefers_marked_rows() {
        let mut model = loaded_model();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::ToggleMark)).unwrap();
        model.update(Some(Message::RunDownload)).unwrap();

        let confirm = model.confirm().unwrap();
        assert_eq!(confirm.scope, "marked");
        assert_eq!(confirm.ids, ["3"]);
    }

    #[test]
    fn download_without_an_id_column_is_aborted() {
        let columns = vec![
            col("Empresa", &["Acme", "Borealis"]),
            col("Equipamento", &["Gearbox", "Blade"]),
        ];
        let mut model = Model::from_columns(&fixture_config(), columns);
        model.update(Some(Message::RunDownload)).unwrap();

        assert!(model.confirm().is_none());
        let (message, level) = model.status_line();
        assert_eq!(level, StatusLevel::ERROR);
        assert!(message.contains("ID"));
    }

    #[test]
    fn selections_for_missing_columns_leave_the_view_alone() {
        let columns = vec![
            col("Empresa", &["Acme", "Borealis"]),
            col("Id", &["1", "2"]),
        ];
        let mut model = Model::from_columns(&fixture_config(), columns);
        model.selection.set(Role::Equipment, Some("Gearbox".to_string()));
        model.apply_selection();
        assert_eq!(model.nrows_visible(), 2);
    }

    #[test]
    fn confirm_dialog_can_be_cancelled() {
        let mut model = loaded_model();
        model.update(Some(Message::RunDownload)).unwrap();
        assert!(model.raw_keyevents());

        model.update(raw(KeyCode::Char('n'))).unwrap();
        assert!(model.confirm().is_none());
        assert!(!model.raw_keyevents());
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = loaded_model();
        model.update(Some(Message::Help)).unwrap();
        assert!(model.popup().is_some());

        model.update(Some(Message::Exit)).unwrap();
        assert!(model.popup().is_none());
    }
}
