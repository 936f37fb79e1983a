//! Injectable sinks for diagnostic notices emitted by numerical routines.
//!
//! Numerical code in this crate never calls the logging facade directly. Instead, it is handed
//! a [`DiagnosticSink`] and reports through it, so that the numerics stay free of global side
//! effects and can be observed in tests.

use std::cell::RefCell;

use log::Level;

#[cfg(test)]
#[path = "diagnostics_tests.rs"]
mod diagnostics_tests;

/// Trait for receivers of fire-and-forget diagnostic notices.
pub trait DiagnosticSink {
    /// Receives a notice.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity of the notice.
    /// * `message` - The content of the notice.
    fn notice(&self, level: Level, message: &str);
}

/// Sink forwarding every notice to the [`log`] facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn notice(&self, level: Level, message: &str) {
        log::log!(level, "{message}");
    }
}

/// Sink discarding every notice.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn notice(&self, _: Level, _: &str) {}
}

/// Sink keeping every notice in memory, in order of arrival.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: RefCell<Vec<(Level, String)>>,
}

impl RecordingSink {
    /// Returns a copy of the notices received so far.
    pub fn notices(&self) -> Vec<(Level, String)> {
        self.notices.borrow().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn notice(&self, level: Level, message: &str) {
        self.notices.borrow_mut().push((level, message.to_string()));
    }
}
