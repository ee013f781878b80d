use crate::dates::DateKey;
use crate::model::{MonthEntryCache, PainLevel};

/// Hue for the least painful level; higher levels move toward red.
pub const BASE_HUE: u16 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PainColor {
    NoData,
    Hue(u16),
}

impl PainColor {
    /// Fully saturated, mid-lightness RGB for the hue.
    pub fn to_rgb(self) -> Option<(u8, u8, u8)> {
        let PainColor::Hue(hue) = self else {
            return None;
        };
        let h = f64::from(hue % 360) / 60.0;
        let x = 1.0 - ((h % 2.0) - 1.0).abs();
        let (r, g, b) = match h as u8 {
            0 => (1.0, x, 0.0),
            1 => (x, 1.0, 0.0),
            2 => (0.0, 1.0, x),
            3 => (0.0, x, 1.0),
            4 => (x, 0.0, 1.0),
            _ => (1.0, 0.0, x),
        };
        let channel = |v: f64| (v * 255.0).round() as u8;
        Some((channel(r), channel(g), channel(b)))
    }
}

/// `120 - ceil(level / 11 * 120)`, computed in integers so the ceiling is exact.
pub fn gradient_hue(level: PainLevel) -> u16 {
    let pain = u16::from(level.value());
    BASE_HUE - (pain * BASE_HUE + 10) / 11
}

pub fn gradient(level: PainLevel) -> PainColor {
    PainColor::Hue(gradient_hue(level))
}

pub fn color_for(
    day: DateKey,
    selected_date: DateKey,
    selected_level: Option<PainLevel>,
    cache: &MonthEntryCache,
) -> PainColor {
    if day == selected_date {
        return selected_level.map(gradient).unwrap_or(PainColor::NoData);
    }
    cache
        .get(&day)
        .map(|entry| gradient(entry.pain_level))
        .unwrap_or(PainColor::NoData)
}
