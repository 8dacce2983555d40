use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Minimal line editor backing the picker's query field.
#[derive(Debug, Default)]
pub struct Inputter {
    buffer: String,
}

impl Inputter {
    /// Feed one key event. Returns true when the buffer changed.
    pub fn read(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return false;
        }
        match key.code {
            KeyCode::Backspace => self.buffer.pop().is_some(),
            code => {
                if let Some(chr) = code.as_char() {
                    self.buffer.push(chr);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    #[test]
    fn collects_typed_characters() {
        let mut input = Inputter::default();
        assert!(input.read(key(KeyCode::Char('w'))));
        assert!(input.read(key(KeyCode::Char('t'))));
        assert!(input.read(key(KeyCode::Char('g'))));
        assert_eq!(input.text(), "wtg");
    }

    #[test]
    fn backspace_removes_the_last_character() {
        let mut input = Inputter::default();
        input.read(key(KeyCode::Char('a')));
        input.read(key(KeyCode::Char('b')));
        assert!(input.read(key(KeyCode::Backspace)));
        assert_eq!(input.text(), "a");

        input.read(key(KeyCode::Backspace));
        assert!(!input.read(key(KeyCode::Backspace)));
        assert!(input.is_empty());
    }

    #[test]
    fn ignores_control_chords_and_non_character_keys() {
        let mut input = Inputter::default();
        let chord = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(!input.read(chord));
        assert!(!input.read(key(KeyCode::Up)));
        assert!(input.is_empty());
    }
}
