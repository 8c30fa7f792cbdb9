//! In-memory event sink.

use parking_lot::Mutex;

use super::{EventSink, StateEvent};

/// Accumulating sink for tests and embedders that drain events themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<StateEvent>>,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StateEvent> {
        self.events.lock().clone()
    }

    /// Drain recorded events, leaving the sink empty.
    #[must_use]
    pub fn drain(&self) -> Vec<StateEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &StateEvent) {
        self.events.lock().push(event.clone());
    }
}
