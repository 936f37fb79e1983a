//! Output helpers and diagnostic sinks.

pub mod diagnostics;
pub(crate) mod format;
