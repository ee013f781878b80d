use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::colorize::PainColor;

/// How a view paints calendar cells. Chosen per view at construction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CalendarStyle {
    /// Solid hue, transparent when nothing is logged.
    #[default]
    Flat,
    /// Radial fade from the hue toward grey.
    Radial,
}

impl CalendarStyle {
    pub fn css(self, color: PainColor) -> String {
        match (self, color) {
            (CalendarStyle::Flat, PainColor::NoData) => "transparent".to_string(),
            (CalendarStyle::Flat, PainColor::Hue(hue)) => format!("hsl({hue}, 100%, 50%)"),
            (CalendarStyle::Radial, PainColor::NoData) => {
                "radial-gradient(circle, hsla(0, 100%, 50%, 0.0) 30%, hsla(0, 5%, 50%, 1.0)"
                    .to_string()
            }
            (CalendarStyle::Radial, PainColor::Hue(hue)) => format!(
                "radial-gradient(circle, hsl({hue}, 100%, 50%) 20%, hsl({hue}, 15%, 50%))"
            ),
        }
    }
}

/// Which widgets the form shows around the shared controller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FormLayout {
    /// Calendar, meter and notes.
    Day,
    /// Day layout plus the month chart.
    #[default]
    Chart,
}

impl FormLayout {
    pub fn shows_chart(self) -> bool {
        matches!(self, FormLayout::Chart)
    }

    pub fn toggled(self) -> Self {
        match self {
            FormLayout::Day => FormLayout::Chart,
            FormLayout::Chart => FormLayout::Day,
        }
    }
}
