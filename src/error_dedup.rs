//! Single-flight reporting of stream errors.

use std::panic::{self, AssertUnwindSafe};

use agent_stream::StreamError;
use tracing::{debug, warn};

use crate::error::NotifyError;

/// What [`ErrorDeduplicator::observe`] did with one snapshot's error field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// No error present; the last-seen text was forgotten.
    Cleared,
    /// Error present but not worth reporting (repeat or empty text).
    Suppressed,
    Reported,
    /// The notifier failed or panicked. The error still counts as reported.
    ReportFailed,
}

/// Remembers the most recently surfaced error text so a stream that keeps
/// repeating the same failure is reported once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDeduplicator {
    last_reported: Option<String>,
}

impl ErrorDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_reported(&self) -> Option<&str> {
        self.last_reported.as_deref()
    }

    /// Forgets the last-seen error, e.g. when the active thread changes.
    pub fn reset(&mut self) {
        self.last_reported = None;
    }

    pub fn observe(
        &mut self,
        error: Option<&StreamError>,
        notify: &mut dyn FnMut(&str) -> Result<(), NotifyError>,
    ) -> Notification {
        let Some(error) = error else {
            self.last_reported = None;
            return Notification::Cleared;
        };

        let text = error.message.as_str();
        if text.is_empty() || self.last_reported.as_deref() == Some(text) {
            return Notification::Suppressed;
        }

        self.last_reported = Some(text.to_string());

        match panic::catch_unwind(AssertUnwindSafe(|| notify(text))) {
            Ok(Ok(())) => {
                debug!(error = text, "stream error reported");
                Notification::Reported
            }
            Ok(Err(failure)) => {
                warn!(error = text, %failure, "error notification failed");
                Notification::ReportFailed
            }
            Err(_) => {
                warn!(error = text, "error notifier panicked");
                Notification::ReportFailed
            }
        }
    }
}
