use unicode_segmentation::UnicodeSegmentation;

use crate::config::{CalendarStyle, FormLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Calendar,
    Notes,
}

/// Terminal-only state that the controller does not own.
#[derive(Debug, Clone)]
pub struct AppState {
    pub focus: FocusPane,
    pub layout: FormLayout,
    pub style: CalendarStyle,
    status_message: Option<String>,
}

impl AppState {
    pub fn new(layout: FormLayout, style: CalendarStyle) -> Self {
        Self {
            focus: FocusPane::Calendar,
            layout,
            style,
            status_message: None,
        }
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    pub fn toggle_layout(&mut self) -> FormLayout {
        self.layout = self.layout.toggled();
        self.layout
    }

    pub fn is_editing_notes(&self) -> bool {
        self.focus == FocusPane::Notes
    }
}

pub fn pop_grapheme(text: &str) -> String {
    let mut graphemes: Vec<&str> = text.graphemes(true).collect();
    graphemes.pop();
    graphemes.concat()
}
