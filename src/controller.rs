use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

use crate::domain::{Message, SpvConfig, SpvError};
use crate::filter::Role;
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(config: &SpvConfig) -> Self {
        Self {
            event_poll_time: config.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, SpvError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(self.handle_key(model, key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, model: &Model, key: event::KeyEvent) -> Option<Message> {
        // Ctrl-C quits from every modus.
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Message::Quit);
        }

        // Picker and confirm dialogs interpret keys themselves.
        if model.raw_keyevents() {
            return Some(Message::RawKey(key));
        }

        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Right => Some(Message::MoveRight),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Home => Some(Message::MoveBeginning),
            KeyCode::End => Some(Message::MoveEnd),
            KeyCode::Char('c') => Some(Message::OpenPicker(Role::Company)),
            KeyCode::Char('i') => Some(Message::OpenPicker(Role::Identification)),
            KeyCode::Char('e') => Some(Message::OpenPicker(Role::Equipment)),
            KeyCode::Char('s') => Some(Message::OpenPicker(Role::Status)),
            KeyCode::Char('x') => Some(Message::ClearFilters),
            KeyCode::Char(' ') => Some(Message::ToggleMark),
            KeyCode::Char('r') => Some(Message::RunRefresh),
            KeyCode::Char('d') => Some(Message::RunDownload),
            KeyCode::Char('l') => Some(Message::Reload),
            KeyCode::Char('y') => Some(Message::CopyCell),
            KeyCode::Char('Y') => Some(Message::CopyRow),
            KeyCode::Char('?') | KeyCode::F(1) => Some(Message::Help),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
