use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Single line text input used for the query editor and the filter.
#[derive(Default)]
pub struct LineInput {
    text: String,
    cursor: usize, // In chars
    finished: bool,
    canceled: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputState {
    pub text: String,
    pub cursor: usize,
    pub finished: bool,
    pub canceled: bool,
    pub changed: bool,
}

impl LineInput {
    pub fn read(&mut self, key: KeyEvent) -> InputState {
        let before = self.text.clone();
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => {
                self.finished = true;
                self.canceled = true;
            }
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Right, _) => self.cursor = std::cmp::min(self.cursor + 1, self.len()),
            (KeyCode::Home, _) => self.cursor = 0,
            (KeyCode::End, _) => self.cursor = self.len(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.text.clear();
                self.cursor = 0;
            }
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => self.insert(chr),
            (code, modifiers) => trace!("Ignoring input key {code:?} {modifiers:?}"),
        }
        let mut state = self.get();
        state.changed = before != self.text;
        state
    }

    /// Replaces the text and moves the cursor behind it.
    pub fn set(&mut self, s: &str) {
        self.text = s.to_string();
        self.cursor = self.len();
        self.finished = false;
        self.canceled = false;
    }

    pub fn get(&self) -> InputState {
        InputState {
            text: self.text.clone(),
            cursor: self.cursor,
            finished: self.finished,
            canceled: self.canceled,
            changed: false,
        }
    }

    pub fn clear(&mut self) {
        self.set("");
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    fn insert(&mut self, chr: char) {
        let at = self.byte_pos(self.cursor);
        self.text.insert(at, chr);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_pos(self.cursor);
            self.text.remove(at);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_pos(self.cursor);
            self.text.remove(at);
        }
    }

    fn byte_pos(&self, char_pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(input: &mut LineInput, text: &str) -> InputState {
        let mut state = input.get();
        for c in text.chars() {
            state = input.read(key(KeyCode::Char(c)));
        }
        state
    }

    #[test]
    fn typing_and_editing() {
        let mut input = LineInput::default();
        let state = type_text(&mut input, "selct");
        assert!(state.changed);
        input.read(key(KeyCode::Left));
        input.read(key(KeyCode::Left));
        let state = type_text(&mut input, "e");
        assert_eq!(state.text, "select");
        assert_eq!(state.cursor, 4);

        let state = input.read(key(KeyCode::Backspace));
        assert_eq!(state.text, "selct");
        let state = input.read(key(KeyCode::Delete));
        assert_eq!(state.text, "selt");
        let state = input.read(key(KeyCode::Left));
        assert!(!state.changed);
    }

    #[test]
    fn multibyte_characters() {
        let mut input = LineInput::default();
        input.set("Soße");
        input.read(key(KeyCode::Left));
        let state = input.read(key(KeyCode::Backspace));
        assert_eq!(state.text, "Soe");
        let state = input.read(key(KeyCode::Home));
        assert_eq!(state.cursor, 0);
        let state = input.read(key(KeyCode::End));
        assert_eq!(state.cursor, 3);
    }

    #[test]
    fn enter_and_escape() {
        let mut input = LineInput::default();
        type_text(&mut input, "x");
        let state = input.read(key(KeyCode::Enter));
        assert!(state.finished && !state.canceled);
        assert_eq!(state.text, "x");

        input.set("y");
        let state = input.read(key(KeyCode::Esc));
        assert!(state.finished && state.canceled);
    }

    #[test]
    fn control_u_clears() {
        let mut input = LineInput::default();
        input.set("select");
        let state = input.read(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(state.text, "");
        assert!(state.changed);
    }
}
