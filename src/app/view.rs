use crate::app::controller::{ChartPoint, PainEntryController, SelectionState, StoreStatus};
use crate::colorize::PainColor;
use crate::config::{CalendarStyle, FormLayout};
use crate::dates::{DateKey, MonthRange};
use crate::storage::EntryStore;

pub const METER_MAX: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell {
    pub day: DateKey,
    pub color: PainColor,
    pub css: String,
    pub selected: bool,
    pub logged: bool,
}

/// Render-ready form: what every layout draws, plus the chart when the
/// layout asks for it. Built fresh from the controller each frame.
#[derive(Debug, Clone)]
pub struct FormView {
    pub layout: FormLayout,
    pub month: MonthRange,
    /// Sunday-first rows; `None` pads days outside the month.
    pub weeks: Vec<[Option<CalendarCell>; 7]>,
    pub selection: SelectionState,
    pub meter_max: u8,
    pub chart: Option<Vec<ChartPoint>>,
    pub status: StoreStatus,
    pub notes_pending: bool,
    pub has_identity: bool,
}

impl FormView {
    pub fn build<S: EntryStore + ?Sized>(
        controller: &PainEntryController<S>,
        layout: FormLayout,
        style: CalendarStyle,
    ) -> Self {
        let month = controller.displayed_month();
        let selection = controller.selection().clone();
        let cache = controller.month_cache();

        let mut weeks = Vec::with_capacity(6);
        let mut row: [Option<CalendarCell>; 7] = Default::default();
        for day in month.days() {
            let column = usize::from(day.date().weekday().number_days_from_sunday());
            let color = controller.color_for(day);
            row[column] = Some(CalendarCell {
                day,
                color,
                css: style.css(color),
                selected: day == selection.date,
                logged: cache.contains_key(&day),
            });
            if column == 6 {
                weeks.push(std::mem::take(&mut row));
            }
        }
        if row.iter().any(Option::is_some) {
            weeks.push(row);
        }

        Self {
            layout,
            month,
            weeks,
            selection,
            meter_max: METER_MAX,
            chart: layout.shows_chart().then(|| controller.chart_points()),
            status: controller.status().clone(),
            notes_pending: controller.has_pending_notes(),
            has_identity: controller.user_id().is_some(),
        }
    }

    pub fn cell(&self, day: DateKey) -> Option<&CalendarCell> {
        self.weeks
            .iter()
            .flat_map(|week| week.iter())
            .flatten()
            .find(|cell| cell.day == day)
    }
}
