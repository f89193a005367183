use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{Collaborators, EventLog};
use crate::command::{prepare_command_line, CommandOutcome, CommandRunner, CommandTable};
use crate::config::ReactorSettings;
use crate::error::HandlerError;
use crate::macros::{MacroContext, MacroOptions};
use crate::models::{ObjectKind, Subject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Obsessing is switched off globally or for this object.
    Skipped,
    Ran {
        command_line: String,
        outcome: CommandOutcome,
    },
}

/// Relays every completed check to the OCHP/OCSP command.
pub struct ObsessiveForwarder {
    settings: Arc<ReactorSettings>,
    commands: Arc<CommandTable>,
    runner: Arc<dyn CommandRunner>,
    macros: Arc<dyn MacroContext>,
    log: Arc<dyn EventLog>,
}

impl ObsessiveForwarder {
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
        }
    }

    pub async fn forward(&self, subject: &Subject<'_>) -> Result<ForwardOutcome, HandlerError> {
        let kind = subject.kind();
        if !self.settings.obsess_enabled(kind) || !subject.obsess() {
            return Ok(ForwardOutcome::Skipped);
        }

        let reference = self
            .settings
            .obsess_command(kind)
            .ok_or(HandlerError::NotConfigured)?;
        let command_line = prepare_command_line(
            &self.commands,
            self.macros.as_ref(),
            reference,
            subject,
            MacroOptions::STRIP,
        )?;

        let timeout_secs = self.settings.obsess_timeout_secs(kind);
        let outcome = self
            .runner
            .run(&command_line, Duration::from_secs(timeout_secs))
            .await;

        if outcome.timed_out {
            let text = match kind {
                ObjectKind::Host => format!(
                    "Warning: OCHP command '{}' for host '{}' timed out after {} seconds",
                    command_line,
                    subject.host_name(),
                    timeout_secs
                ),
                ObjectKind::Service => format!(
                    "Warning: OCSP command '{}' for service '{}' on host '{}' timed out after {} seconds",
                    command_line,
                    subject.description().unwrap_or_default(),
                    subject.host_name(),
                    timeout_secs
                ),
            };
            self.log.warning(&text);
        }

        Ok(ForwardOutcome::Ran {
            command_line,
            outcome,
        })
    }
}
