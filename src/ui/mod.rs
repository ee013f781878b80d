use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Gauge, Paragraph, Wrap};
use ratatui::Frame;
use time::{macros::format_description, OffsetDateTime};

use crate::app::controller::{ChartPoint, StoreStatus};
use crate::app::state::{AppState, FocusPane};
use crate::app::view::{CalendarCell, FormView};
use crate::colorize::{gradient, PainColor};
use crate::config::CalendarStyle;
use crate::model::MAX_PAIN_LEVEL;

const WEEKDAY_HEADER: &str = " Su  Mo  Tu  We  Th  Fr  Sa ";
const CALENDAR_WIDTH: u16 = 30;

pub fn draw_form(frame: &mut Frame, view: &FormView, state: &AppState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(4)])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(CALENDAR_WIDTH), Constraint::Min(20)])
        .split(vertical[0]);

    render_calendar(frame, view, state, columns[0]);

    let form_constraints = if view.chart.is_some() {
        vec![
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(12),
        ]
    } else {
        vec![Constraint::Length(3), Constraint::Min(4)]
    };
    let form = Layout::default()
        .direction(Direction::Vertical)
        .constraints(form_constraints)
        .split(columns[1]);

    render_meter(frame, view, form[0]);
    render_notes(frame, view, state, form[1]);
    if let Some(points) = &view.chart {
        render_chart(frame, points, form[2]);
    }

    let status = build_status_line(view, state);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[1]);
}

fn pane_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn to_color(color: PainColor) -> Option<Color> {
    color.to_rgb().map(|(r, g, b)| Color::Rgb(r, g, b))
}

fn render_calendar(frame: &mut Frame, view: &FormView, state: &AppState, area: Rect) {
    let mut lines = Vec::with_capacity(view.weeks.len() + 1);
    lines.push(Line::from(Span::styled(
        WEEKDAY_HEADER,
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::BOLD),
    )));
    for week in &view.weeks {
        let spans: Vec<Span> = week
            .iter()
            .map(|cell| match cell {
                Some(cell) => calendar_span(cell, state.style),
                None => Span::raw("    "),
            })
            .collect();
        lines.push(Line::from(spans));
    }

    let calendar = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .title(view.month.title())
            .borders(Borders::ALL)
            .border_style(pane_style(state.focus == FocusPane::Calendar)),
    );
    frame.render_widget(calendar, area);
}

fn calendar_span(cell: &CalendarCell, style: CalendarStyle) -> Span<'static> {
    let day = cell.day.date().day();
    let label = if cell.selected {
        format!("[{day:>2}]")
    } else {
        format!(" {day:>2} ")
    };

    let mut span_style = match (to_color(cell.color), style) {
        (None, _) => Style::default().fg(Color::DarkGray),
        (Some(color), CalendarStyle::Flat) => Style::default().bg(color).fg(Color::Black),
        // terminals cannot draw gradients; radial cells tint the numeral instead
        (Some(color), CalendarStyle::Radial) => Style::default()
            .fg(color)
            .add_modifier(Modifier::BOLD),
    };
    if cell.selected {
        span_style = span_style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    }
    Span::styled(label, span_style)
}

fn render_meter(frame: &mut Frame, view: &FormView, area: Rect) {
    let title = format!("Pain level • {}", view.selection.date.label());
    let block = Block::default().title(title).borders(Borders::ALL);
    let gauge = match view.selection.pain_level {
        Some(level) => {
            let color = to_color(gradient(level)).unwrap_or(Color::Gray);
            Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(color).bg(Color::Black))
                .ratio(f64::from(level.value()) / f64::from(view.meter_max))
                .label(format!("{} / {}", level, view.meter_max))
        }
        None => Gauge::default()
            .block(block)
            .gauge_style(Style::default().fg(Color::DarkGray))
            .ratio(0.0)
            .label("not logged • press 0-9 or x"),
    };
    frame.render_widget(gauge, area);
}

fn render_notes(frame: &mut Frame, view: &FormView, state: &AppState, area: Rect) {
    let editing = state.is_editing_notes();
    let title = match (editing, view.notes_pending) {
        (true, true) => "Notes [EDIT*]",
        (true, false) => "Notes [EDIT]",
        (false, true) => "Notes *",
        (false, false) => "Notes",
    };

    let notes = view.selection.notes.as_str();
    let mut lines: Vec<Line> = notes.lines().map(|line| Line::from(line.to_string())).collect();
    if notes.ends_with('\n') || lines.is_empty() {
        lines.push(Line::from(""));
    }
    if editing {
        if let Some(last) = lines.last_mut() {
            last.spans.push(Span::styled(
                "▏",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ));
        }
    } else if notes.is_empty() {
        lines = vec![Line::from(Span::styled(
            "Press `n` to write notes for this day.",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(pane_style(editing)),
        );
    frame.render_widget(paragraph, area);
}

fn render_chart(frame: &mut Frame, points: &[ChartPoint], area: Rect) {
    let block = Block::default().title("This month").borders(Borders::ALL);
    if points.is_empty() {
        let empty = Paragraph::new("Nothing logged this month.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let bars: Vec<Bar> = points
        .iter()
        .map(|point| {
            let color = to_color(gradient(point.pain_level)).unwrap_or(Color::Gray);
            Bar::default()
                .value(u64::from(point.pain_level.value()))
                .label(Line::from(point.date.date().day().to_string()))
                .style(Style::default().fg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .bar_width(3)
        .bar_gap(1)
        .max(u64::from(MAX_PAIN_LEVEL))
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn build_status_line(view: &FormView, state: &AppState) -> Text<'static> {
    let level = view
        .selection
        .pain_level
        .map(|level| level.to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut spans = vec![
        Span::raw(format!("Date: {} ", view.selection.date)),
        Span::raw(" | Level: "),
        Span::styled(level, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | Layout: "),
        Span::styled(
            view.layout.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Store: "),
    ];

    match &view.status {
        StoreStatus::Idle if !view.has_identity => spans.push(Span::styled(
            "no user",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        )),
        StoreStatus::Idle => spans.push(Span::styled(
            "loading…",
            Style::default().fg(Color::Gray),
        )),
        StoreStatus::Synced { at } => spans.push(Span::styled(
            format!("synced {}", format_time_short(*at)),
            Style::default().fg(Color::Green),
        )),
        StoreStatus::Error { message, at } => spans.push(Span::styled(
            format!("error at {}: {}", format_time_short(*at), message),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
    }

    if view.notes_pending {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            "notes pending",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ));
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(message) = state.status_message() {
        lines.push(Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Cyan),
        )));
    }
    let keys = match state.focus {
        FocusPane::Calendar => {
            "Keys: h/j/k/l move • [ ] month • t today • 0-9/x level • n notes • c layout • q quit"
        }
        FocusPane::Notes => "Keys: type notes • Backspace delete • Ctrl-u clear • Ctrl-s save • Esc done",
    };
    lines.push(Line::from(Span::styled(
        keys,
        Style::default().fg(Color::DarkGray),
    )));

    Text::from(lines)
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}
