use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crate::domain::{TVConfig, TVError, Message};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::Char('n') | KeyCode::PageDown, _) => Some(Message::NextPage),
            (KeyCode::Char('p') | KeyCode::PageUp, _) => Some(Message::PreviousPage),
            (KeyCode::Char('g') | KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::Char('G') | KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Char(c @ '1'..='5'), _) => {
                Some(Message::GoToWindowSlot(c as usize - '1' as usize))
            }
            (KeyCode::Char('r'), _) => Some(Message::Refresh),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char('c'), _) => Some(Message::ToggleColumnPanel),
            (KeyCode::Char(' '), _) => Some(Message::ToggleSelectedColumn),
            (KeyCode::Char('K'), _) => Some(Message::MoveColumnUp),
            (KeyCode::Char('J'), _) => Some(Message::MoveColumnDown),
            (KeyCode::Char('t'), _) => Some(Message::EditFilterTitle),
            (KeyCode::Char('b'), _) => Some(Message::EditFilterBody),
            (KeyCode::Char('a'), _) => Some(Message::ApplyFilter),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char(']'), _) => Some(Message::SearchNext),
            (KeyCode::Char('['), _) => Some(Message::SearchPrev),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
