//! Narrow contracts for the services the reactor drives.
//!
//! Every side effect of a transition pass goes through one of these traits so that each step
//! can be replaced independently.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::command::CommandRunner;
use crate::macros::MacroContext;
use crate::models::{ObjectId, StateType, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    Normal,
}

/// Asks the notification subsystem to alert contacts. Suppression is the subsystem's business.
pub trait NotificationTrigger: Send + Sync {
    fn notify(&self, subject: &Subject<'_>, kind: NotificationKind);
}

/// Which of the two event handlers a log line or telemetry record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlerScope {
    Global,
    Object,
}

pub trait EventLog: Send + Sync {
    /// Records a state change (or a soft retry) in the event log.
    fn state_change(&self, subject: &Subject<'_>);

    /// Records that an event handler is about to run.
    fn event_handler(&self, scope: HandlerScope, subject: &Subject<'_>, handler: &str);

    fn warning(&self, text: &str);
}

pub trait PerformanceSink: Send + Sync {
    fn update(&self, subject: &Subject<'_>);
}

pub trait DowntimeStore: Send + Sync {
    /// Starts any flexible downtime for the subject whose trigger criteria are met.
    fn check_pending_flex_downtime(&self, subject: &Subject<'_>, now: DateTime<Utc>);
}

pub trait AcknowledgementStore: Send + Sync {
    /// Removes non-persistent acknowledgement comments for the object.
    fn delete_acknowledgement_comments(&self, object: &ObjectId);
}

pub trait ExternalCommandDrain: Send + Sync {
    /// Processes queued control directives. Returns how many were handled.
    fn drain(&self) -> usize;
}

#[derive(Debug, Clone, Serialize)]
pub struct EventHandlerTelemetry {
    pub object: ObjectId,
    pub scope: HandlerScope,
    pub state: &'static str,
    pub state_type: StateType,
    pub handler: String,
    pub timeout_secs: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub command_line: Option<String>,
    pub exit_status: Option<i32>,
    pub timed_out: bool,
    pub elapsed_ms: Option<u64>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateChangeTelemetry {
    pub object: ObjectId,
    pub state: &'static str,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub max_attempts: u32,
}

/// Observational hooks. All methods default to doing nothing.
pub trait TelemetrySink: Send + Sync {
    fn event_handler_started(&self, _event: &EventHandlerTelemetry) {}
    fn event_handler_finished(&self, _event: &EventHandlerTelemetry) {}
    fn state_changed(&self, _event: &StateChangeTelemetry) {}
}

/// Everything a reactor needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub runner: Arc<dyn CommandRunner>,
    pub macros: Arc<dyn MacroContext>,
    pub notifier: Arc<dyn NotificationTrigger>,
    pub log: Arc<dyn EventLog>,
    pub perfdata: Arc<dyn PerformanceSink>,
    pub downtime: Arc<dyn DowntimeStore>,
    pub acknowledgements: Arc<dyn AcknowledgementStore>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub external_commands: Arc<dyn ExternalCommandDrain>,
}
