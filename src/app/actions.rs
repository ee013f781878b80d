use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::state::FocusPane;
use crate::model::PainLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    MoveDays(i64),
    PreviousMonth,
    NextMonth,
    Today,
    SetLevel(PainLevel),
    FocusNotes,
    FocusCalendar,
    InsertChar(char),
    Backspace,
    ClearNotes,
    SaveNotes,
    ToggleLayout,
}

fn plain(key: &KeyEvent) -> bool {
    !key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

/// Maps a key press to a form action for the focused pane.
pub fn map_key(key: &KeyEvent, focus: FocusPane) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            KeyCode::Char('s') => Some(Action::SaveNotes),
            KeyCode::Char('u') if focus == FocusPane::Notes => Some(Action::ClearNotes),
            _ => None,
        };
    }

    match focus {
        FocusPane::Notes => match key.code {
            KeyCode::Esc | KeyCode::Tab | KeyCode::Enter => Some(Action::FocusCalendar),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Char(ch) if plain(key) => Some(Action::InsertChar(ch)),
            _ => None,
        },
        FocusPane::Calendar => match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('h') | KeyCode::Left => Some(Action::MoveDays(-1)),
            KeyCode::Char('l') | KeyCode::Right => Some(Action::MoveDays(1)),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveDays(-7)),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveDays(7)),
            KeyCode::Char('[') | KeyCode::PageUp => Some(Action::PreviousMonth),
            KeyCode::Char(']') | KeyCode::PageDown => Some(Action::NextMonth),
            KeyCode::Char('t') => Some(Action::Today),
            KeyCode::Char('c') => Some(Action::ToggleLayout),
            KeyCode::Char('n') | KeyCode::Tab | KeyCode::Enter => Some(Action::FocusNotes),
            KeyCode::Char('x') => PainLevel::new(10).ok().map(Action::SetLevel),
            KeyCode::Char(ch) if plain(key) => ch
                .to_digit(10)
                .and_then(|digit| u8::try_from(digit).ok())
                .and_then(|digit| PainLevel::new(digit).ok())
                .map(Action::SetLevel),
            _ => None,
        },
    }
}
