pub mod app;
pub mod cli;
pub mod colorize;
pub mod config;
pub mod dates;
pub mod journaling;
pub mod model;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use dates::{DateKey, MonthRange};
pub use model::{Entry, PainLevel, UserId};
