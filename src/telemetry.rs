use serde::Serialize;
use tokio::sync::broadcast;

use crate::collaborators::{EventHandlerTelemetry, StateChangeTelemetry, TelemetrySink};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    EventHandlerStarted(EventHandlerTelemetry),
    EventHandlerFinished(EventHandlerTelemetry),
    StateChanged(StateChangeTelemetry),
}

/// Publishes telemetry on a broadcast channel. Events sent with no subscriber are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastTelemetry {
    tx: broadcast::Sender<TelemetryEvent>,
}

impl BroadcastTelemetry {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: TelemetryEvent) {
        let _ = self.tx.send(event);
    }
}

impl TelemetrySink for BroadcastTelemetry {
    fn event_handler_started(&self, event: &EventHandlerTelemetry) {
        self.publish(TelemetryEvent::EventHandlerStarted(event.clone()));
    }

    fn event_handler_finished(&self, event: &EventHandlerTelemetry) {
        self.publish(TelemetryEvent::EventHandlerFinished(event.clone()));
    }

    fn state_changed(&self, event: &StateChangeTelemetry) {
        self.publish(TelemetryEvent::StateChanged(event.clone()));
    }
}
