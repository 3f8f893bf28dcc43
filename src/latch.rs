//! Per-run error state.
//!
//! Every orchestration step receives the run's [`ErrorState`] explicitly and
//! consults it before acting. The latch is monotonic within a run: once a
//! fatal condition is recorded, nothing short of [`ErrorState::clear`] at the
//! start of the next run un-sets it.

use serde::Serialize;

/// One recorded call to [`ErrorState::set_error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub message: String,
    pub fatal: bool,
}

/// Error latch for a single sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorState {
    is_error: bool,
    is_fatal: bool,
    message: Option<String>,
    fatal_message: Option<String>,
    history: Vec<ErrorEntry>,
}

impl ErrorState {
    /// Creates a cleared latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error.
    ///
    /// The last message always wins for [`message`](Self::message). The first
    /// fatal message is kept as [`fatal_message`](Self::fatal_message), and a
    /// later non-fatal call never clears the fatal flag.
    pub fn set_error(&mut self, message: impl Into<String>, fatal: bool) {
        let message = message.into();

        if fatal {
            if self.is_fatal {
                log::debug!("Additional fatal error after latch tripped: {}", message);
            } else {
                log::debug!("Error latch tripped: {}", message);
                self.fatal_message = Some(message.clone());
            }
            self.is_fatal = true;
        }

        self.is_error = true;
        self.history.push(ErrorEntry {
            message: message.clone(),
            fatal,
        });
        self.message = Some(message);
    }

    /// Whether a fatal condition has been recorded in this run.
    pub fn is_fatal(&self) -> bool {
        self.is_fatal
    }

    /// Whether any error has been recorded in this run.
    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// The most recently recorded message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The message that first tripped the fatal flag.
    pub fn fatal_message(&self) -> Option<&str> {
        self.fatal_message.as_deref()
    }

    /// All recorded errors in order.
    pub fn history(&self) -> &[ErrorEntry] {
        &self.history
    }

    /// Resets the latch. Only called at a run boundary.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
