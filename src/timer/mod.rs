#[cfg(feature = "desktop")]
pub mod commands;
pub mod controller;
pub mod state;
pub mod streak;

pub use controller::{format_clock, ring_offset, TimerController, TimerEvent, TimerSnapshot};
pub use state::{TimerState, TimerStatus};
pub use streak::{apply_streak, session_date_label};
