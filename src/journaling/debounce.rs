use std::time::{Duration, Instant};

/// Trailing-edge debounce; tracks timing only, the caller builds the write.
#[derive(Debug, Clone)]
pub struct DebouncedWriter {
    window: Duration,
    deadline: Option<Instant>,
}

impl DebouncedWriter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Clears the pending write; returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}
