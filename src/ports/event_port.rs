//! Notification port trait.

use crate::domain::event::EngineEvent;

pub trait EventSink {
    fn publish(&mut self, event: &EngineEvent);
}

/// Sink that drops everything. Used where no observer is configured.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&mut self, _event: &EngineEvent) {}
}
