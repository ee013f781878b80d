use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::dates::DateKey;
use crate::model::UserId;
use crate::storage::EntryStore;
use crate::ui;

mod actions;
pub mod controller;
pub mod state;
pub mod view;

pub use actions::{map_key, Action};
pub use controller::{
    ChartPoint, ControllerOptions, PainEntryController, SelectionState, StoreStatus,
};
pub use state::{AppState, FocusPane};
pub use view::{CalendarCell, FormView};

pub struct App {
    pub config: Arc<AppConfig>,
    controller: PainEntryController<dyn EntryStore>,
    state: AppState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn EntryStore>,
        user_id: Option<UserId>,
        today: DateKey,
    ) -> Self {
        let mut controller =
            PainEntryController::new(store, ControllerOptions::from(&config.notes), today);
        let mut state = AppState::new(config.layout, config.calendar_style);
        if user_id.is_none() {
            state.set_status_message(Some(
                "No user configured; pass --user or set PAINLOG_USER to start logging.",
            ));
        }
        controller.set_user(user_id);
        Self {
            config,
            controller,
            state,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        }
    }

    pub fn controller(&self) -> &PainEntryController<dyn EntryStore> {
        &self.controller
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        self.controller.close();
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn view(&self) -> FormView {
        FormView::build(&self.controller, self.state.layout, self.state.style)
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            let view = self.view();
            terminal
                .draw(|frame| ui::draw_form(frame, &view, &self.state))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key, Instant::now());
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick(Instant::now());
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if let Some(action) = map_key(&key, self.state.focus) {
            self.handle_action(action, now);
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.controller.poll(now);
    }

    pub fn handle_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::MoveDays(delta) => {
                let target = self.controller.selection().date.offset_days(delta);
                self.controller.select_date(target);
                self.state.clear_status_message();
            }
            Action::PreviousMonth => {
                let month = self.controller.displayed_month().previous();
                self.controller.change_month(month);
            }
            Action::NextMonth => {
                let month = self.controller.displayed_month().next();
                self.controller.change_month(month);
            }
            Action::Today => self.controller.select_date(DateKey::today()),
            Action::SetLevel(level) => {
                if self.controller.user_id().is_none() {
                    self.state
                        .set_status_message(Some("No user configured; level not saved"));
                }
                self.controller.set_pain_level(level);
            }
            Action::FocusNotes => {
                self.state.focus = FocusPane::Notes;
                self.state.set_status_message(Some(
                    "Editing notes: type to change • Esc done • Ctrl-s save now",
                ));
            }
            Action::FocusCalendar => {
                self.state.focus = FocusPane::Calendar;
                self.state.clear_status_message();
            }
            Action::InsertChar(ch) => {
                let mut notes = self.controller.selection().notes.clone();
                notes.push(ch);
                self.controller.set_notes(notes, now);
            }
            Action::Backspace => {
                let notes = state::pop_grapheme(&self.controller.selection().notes);
                self.controller.set_notes(notes, now);
            }
            Action::ClearNotes => self.controller.set_notes(String::new(), now),
            Action::SaveNotes => {
                let message = if self.controller.flush_notes() {
                    "Notes saved"
                } else {
                    "No pending notes"
                };
                self.state.set_status_message(Some(message));
            }
            Action::ToggleLayout => {
                let layout = self.state.toggle_layout();
                tracing::debug!(%layout, "layout toggled");
            }
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormLayout;
    use crate::model::PainLevel;
    use crate::storage::MemoryEntryStore;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn app_with_store(user: Option<&str>) -> (Arc<MemoryEntryStore>, App) {
        let store = Arc::new(MemoryEntryStore::new());
        let app = App::new(
            Arc::new(AppConfig::default()),
            store.clone(),
            user.and_then(UserId::new),
            DateKey::parse("2024-05-10").unwrap(),
        );
        (store, app)
    }

    fn press(app: &mut App, code: KeyCode, now: Instant) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), now);
    }

    #[test]
    fn typing_notes_then_waiting_writes_entry() {
        let (store, mut app) = app_with_store(Some("alice"));
        let now = Instant::now();
        app.on_tick(now);
        press(&mut app, KeyCode::Char('4'), now);
        press(&mut app, KeyCode::Char('n'), now);
        for ch in "ok".chars() {
            press(&mut app, KeyCode::Char(ch), now);
        }
        press(&mut app, KeyCode::Esc, now);
        assert_eq!(app.state().focus, FocusPane::Calendar);

        app.on_tick(now + Duration::from_millis(1000));
        let alice = UserId::new("alice").unwrap();
        let stored = store
            .entry(&alice, DateKey::parse("2024-05-10").unwrap())
            .expect("entry stored");
        assert_eq!(stored.pain_level, PainLevel::new(4).unwrap());
        assert_eq!(stored.notes, "ok");
    }

    #[test]
    fn arrow_keys_walk_across_month_boundary() {
        let (_store, mut app) = app_with_store(Some("alice"));
        let now = Instant::now();
        for _ in 0..3 {
            press(&mut app, KeyCode::Down, now);
        }
        assert_eq!(app.controller().selection().date.to_string(), "2024-05-31");
        press(&mut app, KeyCode::Right, now);
        assert_eq!(app.controller().displayed_month().to_string(), "2024-06");
    }

    #[test]
    fn layout_toggle_changes_view_shape() {
        let (_store, mut app) = app_with_store(Some("alice"));
        assert_eq!(app.view().layout, FormLayout::Chart);
        assert!(app.view().chart.is_some());
        press(&mut app, KeyCode::Char('c'), Instant::now());
        assert!(app.view().chart.is_none());
    }

    #[test]
    fn missing_identity_is_reported() {
        let (store, mut app) = app_with_store(None);
        assert!(app.state().status_message().is_some());
        press(&mut app, KeyCode::Char('3'), Instant::now());
        assert_eq!(store.active_subscriptions(), 0);
        assert!(!app.view().has_identity);
        press(&mut app, KeyCode::Char('q'), Instant::now());
        assert!(app.should_quit());
    }
}
