use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::collaborators::{
    Collaborators, EventHandlerTelemetry, EventLog, HandlerScope, StateChangeTelemetry,
    TelemetrySink,
};
use crate::command::{prepare_command_line, CommandOutcome, CommandRunner, CommandTable};
use crate::config::ReactorSettings;
use crate::error::HandlerError;
use crate::macros::{MacroContext, MacroOptions};
use crate::models::{ObjectKind, Subject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRun {
    pub scope: HandlerScope,
    pub command_line: String,
    pub outcome: CommandOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReport {
    /// Event handlers are disabled globally or for the object.
    Disabled,
    Ran {
        global: Result<HandlerRun, HandlerError>,
        object: Result<HandlerRun, HandlerError>,
    },
}

impl DispatchReport {
    pub fn ran(&self) -> bool {
        matches!(self, DispatchReport::Ran { .. })
    }
}

/// Runs the global event handler and then the object's own handler.
pub struct EventHandlerDispatcher {
    settings: Arc<ReactorSettings>,
    commands: Arc<CommandTable>,
    runner: Arc<dyn CommandRunner>,
    macros: Arc<dyn MacroContext>,
    log: Arc<dyn EventLog>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl EventHandlerDispatcher {
    pub fn new(
        settings: Arc<ReactorSettings>,
        commands: Arc<CommandTable>,
        collaborators: &Collaborators,
    ) -> Self {
        Self {
            settings,
            commands,
            runner: Arc::clone(&collaborators.runner),
            macros: Arc::clone(&collaborators.macros),
            log: Arc::clone(&collaborators.log),
            telemetry: Arc::clone(&collaborators.telemetry),
        }
    }

    /// Failures of either handler are reported in the result, never raised.
    pub async fn dispatch(&self, subject: &Subject<'_>) -> DispatchReport {
        self.telemetry.state_changed(&StateChangeTelemetry {
            object: subject.id().clone(),
            state: subject.state_label(),
            state_type: subject.state_type(),
            current_attempt: subject.current_attempt(),
            max_attempts: subject.max_attempts(),
        });

        if !self.settings.enable_event_handlers || !subject.event_handler_enabled() {
            return DispatchReport::Disabled;
        }

        let global_handler = self.settings.global_event_handler(subject.kind());
        let global = self
            .run_handler(HandlerScope::Global, global_handler, subject)
            .await;
        let object = self
            .run_handler(HandlerScope::Object, subject.event_handler(), subject)
            .await;

        for (scope, result) in [(HandlerScope::Global, &global), (HandlerScope::Object, &object)] {
            if let Err(e) = result {
                debug!(object = %subject.id(), ?scope, error = %e, "Event handler did not run");
            }
        }

        DispatchReport::Ran { global, object }
    }

    async fn run_handler(
        &self,
        scope: HandlerScope,
        handler: Option<&str>,
        subject: &Subject<'_>,
    ) -> Result<HandlerRun, HandlerError> {
        let handler = handler.ok_or(HandlerError::NotConfigured)?;
        let timeout = self.settings.event_handler_timeout();

        debug!(object = %subject.id(), ?scope, handler, "Running event handler");

        let mut telemetry = EventHandlerTelemetry {
            object: subject.id().clone(),
            scope,
            state: subject.state_label(),
            state_type: subject.state_type(),
            handler: handler.to_string(),
            timeout_secs: self.settings.event_handler_timeout_secs,
            started_at: Utc::now(),
            finished_at: None,
            command_line: None,
            exit_status: None,
            timed_out: false,
            elapsed_ms: None,
            output: None,
        };
        // Sent before preparation; a command that fails to prepare gets no finish event.
        self.telemetry.event_handler_started(&telemetry);

        let command_line = prepare_command_line(
            &self.commands,
            self.macros.as_ref(),
            handler,
            subject,
            MacroOptions::STRIP,
        )?;

        if self.settings.log_event_handlers {
            self.log.event_handler(scope, subject, handler);
        }

        let outcome = self.runner.run(&command_line, timeout).await;

        if outcome.timed_out {
            self.log.warning(&format!(
                "Warning: {} command '{}' timed out after {} seconds",
                handler_title(scope, subject.kind()),
                command_line,
                self.settings.event_handler_timeout_secs
            ));
        }

        telemetry.finished_at = Some(Utc::now());
        telemetry.command_line = Some(command_line.clone());
        telemetry.exit_status = Some(outcome.exit_status);
        telemetry.timed_out = outcome.timed_out;
        telemetry.elapsed_ms = Some(outcome.elapsed.as_millis() as u64);
        telemetry.output = Some(outcome.output.clone());
        self.telemetry.event_handler_finished(&telemetry);

        Ok(HandlerRun {
            scope,
            command_line,
            outcome,
        })
    }
}

fn handler_title(scope: HandlerScope, kind: ObjectKind) -> &'static str {
    match (scope, kind) {
        (HandlerScope::Global, ObjectKind::Host) => "Global host event handler",
        (HandlerScope::Global, ObjectKind::Service) => "Global service event handler",
        (HandlerScope::Object, ObjectKind::Host) => "Host event handler",
        (HandlerScope::Object, ObjectKind::Service) => "Service event handler",
    }
}
