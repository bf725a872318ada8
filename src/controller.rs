use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, SelectorKind, ViewerConfig, ViewerError};
use crate::model::{KeyContext, Model};
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &ViewerConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Waits up to the poll time for an input event. Returns Ok(None) on timeout
    /// so the model still gets updated while a query runs.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, ViewerError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(Self::map_key(model.key_context(), key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn map_key(context: KeyContext, key: KeyEvent) -> Option<Message> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Message::Quit);
        }
        let message = match context {
            KeyContext::Raw => Some(Message::RawKey(key)),
            KeyContext::Popup => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?') => Some(Message::Exit),
                KeyCode::Char('q') => Some(Message::Quit),
                _ => None,
            },
            KeyContext::Selector(kind) => match key.code {
                KeyCode::Esc => Some(Message::Exit),
                KeyCode::Enter => Some(Message::Enter),
                KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
                KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
                KeyCode::Char('b') if kind == SelectorKind::History => Some(Message::Bookmark),
                KeyCode::Char('d') if kind == SelectorKind::Bookmarks => {
                    Some(Message::RemoveBookmark)
                }
                KeyCode::Char('q') => Some(Message::Quit),
                _ => None,
            },
            KeyContext::Table => match key.code {
                KeyCode::Char('q') => Some(Message::Quit),
                KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
                KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
                KeyCode::Left => Some(Message::MoveLeft),
                KeyCode::Right => Some(Message::MoveRight),
                KeyCode::Char('g') | KeyCode::Home => Some(Message::MoveBeginning),
                KeyCode::Char('G') | KeyCode::End => Some(Message::MoveEnd),
                KeyCode::Char('n') | KeyCode::PageDown => Some(Message::NextPage),
                KeyCode::Char('b') | KeyCode::PageUp => Some(Message::PrevPage),
                KeyCode::Char('+') => Some(Message::GrowPageSize),
                KeyCode::Char('-') => Some(Message::ShrinkPageSize),
                KeyCode::Char('e') | KeyCode::Char(':') => Some(Message::EditQuery),
                KeyCode::Char('r') | KeyCode::Enter => Some(Message::RunQuery),
                KeyCode::Char('c') => Some(Message::ClearQuery),
                KeyCode::Char('/') => Some(Message::Filter),
                KeyCode::Char('x') => Some(Message::ClearFilter),
                KeyCode::Char('v') => Some(Message::ToggleColumnsView),
                KeyCode::Char('t') => Some(Message::ToggleTheme),
                KeyCode::Char('s') => Some(Message::Export),
                KeyCode::Char('y') => Some(Message::CopyCell),
                KeyCode::Char('Y') => Some(Message::CopyRow),
                KeyCode::Char('l') => Some(Message::OpenSelector(SelectorKind::Predefined)),
                KeyCode::Char('h') => Some(Message::OpenSelector(SelectorKind::History)),
                KeyCode::Char('m') => Some(Message::OpenSelector(SelectorKind::Bookmarks)),
                KeyCode::Char('?') => Some(Message::Help),
                _ => None,
            },
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn table_keys() {
        let map = |c| Controller::map_key(KeyContext::Table, key(c));
        assert_eq!(map(KeyCode::Char('q')), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('r')), Some(Message::RunQuery));
        assert_eq!(map(KeyCode::Char('/')), Some(Message::Filter));
        assert_eq!(
            map(KeyCode::Char('h')),
            Some(Message::OpenSelector(SelectorKind::History))
        );
        assert_eq!(map(KeyCode::Char('Y')), Some(Message::CopyRow));
        assert_eq!(map(KeyCode::Char('z')), None);
    }

    #[test]
    fn raw_context_passes_keys_through() {
        let k = key(KeyCode::Char('q'));
        assert_eq!(
            Controller::map_key(KeyContext::Raw, k),
            Some(Message::RawKey(k))
        );
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(
            Controller::map_key(KeyContext::Raw, ctrl_c),
            Some(Message::Quit)
        );
    }

    #[test]
    fn selector_keys_depend_on_kind() {
        let history = KeyContext::Selector(SelectorKind::History);
        let bookmarks = KeyContext::Selector(SelectorKind::Bookmarks);
        assert_eq!(
            Controller::map_key(history, key(KeyCode::Char('b'))),
            Some(Message::Bookmark)
        );
        assert_eq!(Controller::map_key(bookmarks, key(KeyCode::Char('b'))), None);
        assert_eq!(
            Controller::map_key(bookmarks, key(KeyCode::Char('d'))),
            Some(Message::RemoveBookmark)
        );
        assert_eq!(
            Controller::map_key(history, key(KeyCode::Esc)),
            Some(Message::Exit)
        );
    }

    #[test]
    fn popup_closes_on_escape() {
        assert_eq!(
            Controller::map_key(KeyContext::Popup, key(KeyCode::Esc)),
            Some(Message::Exit)
        );
        assert_eq!(
            Controller::map_key(KeyContext::Popup, key(KeyCode::Char('j'))),
            None
        );
    }
}
