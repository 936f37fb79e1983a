//! Nice `ktdhf` output formatting.

use std::fmt;

use log;

const KTDHF_BANNER_LENGTH: usize = 91;

/// Logs a warning to the `ktdhf-output` logger.
macro_rules! ktdhf_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "ktdhf-output", $fmt, $($($arg)*)?); }
}

/// Logs a main output line to the `ktdhf-output` logger.
macro_rules! ktdhf_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "ktdhf-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {ktdhf_output, ktdhf_warn};

/// Logs a nicely formatted section title to the `ktdhf-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(KTDHF_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    ktdhf_output!("┌──{bar}──┐");
    ktdhf_output!("│§ {title:^length$} §│");
    ktdhf_output!("└──{bar}──┘");
}

/// Logs a nicely formatted subtitle to the `ktdhf-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    ktdhf_output!("{}", subtitle);
    ktdhf_output!("{}", bar);
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `ktdhf` outputs nicely.
pub(crate) trait KTdhfOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            ktdhf_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> KTdhfOutput for T where T: fmt::Debug + fmt::Display {}
