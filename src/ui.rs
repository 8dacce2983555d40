use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::domain::StatusLevel;
use crate::model::{Confirm, Model, Picker, Popup};
use crate::scripts::ScriptJob;

pub const HEADER_HEIGHT: usize = 1;
pub const FILTERBAR_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const MARKER_WIDTH: usize = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
/// Entries shown at once in a filter picker.
pub const PICKER_VISIBLE: usize = 12;

pub fn draw(model: &Model, frame: &mut Frame) {
    let [header, filterbar, table, statusline] = Layout::vertical([
        Constraint::Length(HEADER_HEIGHT as u16),
        Constraint::Length(FILTERBAR_HEIGHT as u16),
        Constraint::Min(0),
        Constraint::Length(STATUSLINE_HEIGHT as u16),
    ])
    .areas(frame.area());

    draw_header(model, frame, header);
    draw_filterbar(model, frame, filterbar);
    draw_table(model, frame, table);
    draw_statusline(model, frame, statusline);

    // Overlays, at most one active plus a possible script progress box.
    if let Some(picker) = model.picker() {
        draw_picker(picker, frame);
    }
    if let Some(confirm) = model.confirm() {
        draw_confirm(confirm, frame);
    }
    if let Some(popup) = model.popup() {
        draw_popup(popup, frame);
    }
    if let Some(job) = model.script() {
        draw_progress(job, frame);
    }
}

fn draw_header(model: &Model, frame: &mut Frame, area: Rect) {
    let name = if model.is_empty() {
        "no data".to_string()
    } else {
        model.table_name().to_string()
    };
    let title = Line::from(vec![" spv ".bold(), "| ".dark_gray(), name.yellow()]);
    frame.render_widget(Paragraph::new(title), area);
}

fn draw_filterbar(model: &Model, frame: &mut Frame, area: Rect) {
    let mut spans: Vec<Span> = Vec::new();
    for (role, selected) in model.filters() {
        spans.push(format!(" {}:", role.label()).dark_gray());
        match selected {
            Some(value) => spans.push(value.to_string().cyan().bold()),
            None => spans.push("(any)".dim()),
        }
        spans.push(" ".into());
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_table(model: &Model, frame: &mut Frame, area: Rect) {
    if model.is_empty() {
        let hint = Paragraph::new("No data loaded - press r to synchronize, ? for help")
            .dim()
            .centered();
        frame.render_widget(hint, area);
        return;
    }

    let (cursor_row, cursor_column) = model.cursor();
    let marker = " ".repeat(MARKER_WIDTH);

    let mut header = vec![Span::raw(marker.clone())];
    for (cidx, column) in model.view_columns().iter().enumerate() {
        let mut style = Style::new().bold();
        if cidx == cursor_column {
            style = style.underlined();
        }
        header.push(Span::styled(pad(&column.name, column.width + 1), style));
    }

    let nrows = model
        .view_columns()
        .first()
        .map(|c| c.data.len())
        .unwrap_or(0);
    let mut lines = vec![Line::from(header)];
    for ridx in 0..nrows {
        let mut spans: Vec<Span> = Vec::new();
        if model.marker_flags().get(ridx).copied().unwrap_or(false) {
            let flag = format!("▌{}", " ".repeat(MARKER_WIDTH - 1));
            spans.push(Span::styled(flag, Style::new().green()));
        } else {
            spans.push(Span::raw(marker.clone()));
        }
        for (cidx, column) in model.view_columns().iter().enumerate() {
            let cell = pad(&column.data[ridx], column.width + 1);
            let mut style = Style::new();
            if ridx == cursor_row {
                style = style.bg(Color::Rgb(40, 40, 48));
                if cidx == cursor_column {
                    style = style.reversed();
                }
            }
            spans.push(Span::styled(cell, style));
        }
        lines.push(Line::from(spans));
    }
    if nrows == 0 {
        lines.push(Line::from("  (no rows match the current filters)".dim()));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_statusline(model: &Model, frame: &mut Frame, area: Rect) {
    let (message, level) = model.status_line();
    let status = Line::from(vec![
        " ● ".fg(level_color(level)),
        Span::styled(message.to_string(), Style::new().fg(level_color(level))),
    ]);
    frame.render_widget(Paragraph::new(status), area);

    let counters = format!(
        "{} marked | row {}/{} of {} | q quit | ? help ",
        model.marked_count(),
        std::cmp::min(model.selected_abs_row() + 1, model.nrows_visible()),
        model.nrows_visible(),
        model.nrows_total(),
    );
    frame.render_widget(Paragraph::new(counters.dim()).right_aligned(), area);
}

fn draw_picker(picker: &Picker, frame: &mut Frame) {
    let widest = picker
        .entries
        .iter()
        .map(|e| e.len())
        .max()
        .unwrap_or(0)
        .max(20) as u16;
    let area = centered_rect(
        frame.area(),
        (widest + 6).clamp(28, frame.area().width.saturating_sub(4)),
        PICKER_VISIBLE as u16 + 4,
    );
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from(vec![
        " > ".dark_gray(),
        picker.query.text().to_string().cyan(),
        "▏".dim(),
    ])];
    let end = std::cmp::min(picker.offset + PICKER_VISIBLE, picker.entries.len());
    for (idx, entry) in picker.entries[picker.offset..end].iter().enumerate() {
        let absolute = picker.offset + idx;
        let mut style = Style::new();
        if picker.has_any && absolute == 0 {
            style = style.dim().italic();
        }
        if absolute == picker.cursor {
            style = style.reversed();
        }
        lines.push(Line::from(Span::styled(format!(" {entry} "), style)));
    }
    if picker.entries.is_empty() {
        lines.push(Line::from(" (no matching value, enter applies the text) ".dim()));
    }

    let block = Block::bordered()
        .title(Line::from(format!(" {} ", picker.role.label()).bold()))
        .title_bottom(Line::from(" ↑↓ select · enter apply · esc cancel ".dim()).centered());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_confirm(confirm: &Confirm, frame: &mut Frame) {
    let area = centered_rect(frame.area(), 56, 5);
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(format!(
            "Download attachments for {} {} rows?",
            confirm.ids.len(),
            confirm.scope
        ))
        .centered(),
        Line::from(""),
        Line::from(vec!["[y]".green().bold(), " yes   ".into(), "[n]".red().bold(), " no".into()])
            .centered(),
    ];
    let block = Block::bordered().title(Line::from(" Confirm ".bold()));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_progress(job: &ScriptJob, frame: &mut Frame) {
    let area = centered_rect(frame.area(), 60, 6);
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(truncate(&job.last_line, 54)).centered(),
        Line::from("waiting for the script to finish ...".dim()).centered(),
    ];
    let block = Block::bordered().title(Line::from(format!(" {} ", job.kind.title()).bold()));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_popup(popup: &Popup, frame: &mut Frame) {
    let frame_area = frame.area();
    let area = centered_rect(
        frame_area,
        (frame_area.width * 3 / 4).clamp(30, 90),
        (frame_area.height * 3 / 4).max(10),
    );
    frame.render_widget(Clear, area);

    let block = Block::bordered()
        .title(Line::from(format!(" {} ", popup.title).bold()))
        .title_bottom(Line::from(" esc to close ".dim()).centered());
    frame.render_widget(
        Paragraph::new(popup.text.clone())
            .wrap(Wrap { trim: false })
            .block(block),
        area,
    );
}

fn level_color(level: StatusLevel) -> Color {
    match level {
        StatusLevel::NORMAL => Color::Gray,
        StatusLevel::INFO => Color::Blue,
        StatusLevel::SUCCESS => Color::Green,
        StatusLevel::WARNING => Color::Yellow,
        StatusLevel::ERROR => Color::Red,
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

// Fixed-width cell rendering; overlong values are cut, short ones padded.
fn pad(value: &str, width: usize) -> String {
    if value.len() > width {
        truncate(value, width)
    } else {
        format!("{value:<width$}")
    }
}

fn truncate(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}
