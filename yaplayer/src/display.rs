//! Output side of the UI

use yacatalog::SourceEntry;
use yasource::{Mode, Track};

/// Where the player loop writes what the user sees
pub trait Display: Send {
    fn set_title(&mut self, track: &Track);

    /// Empty string clears the status
    fn set_status(&mut self, status: &str);

    fn set_mode(&mut self, mode: Mode, source_name: Option<&str>);

    fn set_progress(&mut self, position: f64, duration: f64);

    fn set_volume(&mut self, volume: f64);

    /// Numbered list the user can pick from
    fn show_choices(&mut self, title: &str, choices: &[SourceEntry]);
}

/// `m:ss/m:ss`
pub fn format_progress(position: f64, duration: f64) -> String {
    fn mmss(seconds: f64) -> String {
        let seconds = seconds.max(0.0) as u64;
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
    format!("{}/{}", mmss(position), mmss(duration))
}
