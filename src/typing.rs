use std::time::{Duration, Instant};

pub const DEFAULT_TYPING_WINDOW: Duration = Duration::from_secs(2);

/// Composer-local typing indicator.
///
/// Not part of the message model: the boolean is derived from whether the
/// composer received input within the window, and clearing the composer
/// clears it immediately. Nothing here schedules timers; callers re-derive
/// on render.
#[derive(Debug)]
pub struct TypingIndicator {
    window: Duration,
    armed_until: Option<Instant>,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl TypingIndicator {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_TYPING_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            armed_until: None,
        }
    }

    /// Records the composer's current text.
    pub fn record_input(&mut self, text: &str) {
        if text.is_empty() {
            self.armed_until = None;
        } else {
            self.armed_until = Some(Instant::now() + self.window);
        }
    }

    pub fn is_typing(&self) -> bool {
        self.armed_until.is_some_and(|deadline| Instant::now() < deadline)
    }

    pub fn clear(&mut self) {
        self.armed_until = None;
    }
}
