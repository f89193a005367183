use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::command::CommandTable;
use crate::config::ReactorSettings;
use crate::error::ReactorError;
use crate::event_handler::{DispatchReport, EventHandlerDispatcher};
use crate::event_id::EventIdCounter;
use crate::models::{
    AcknowledgementType, Host, HostState, MonitoredObject, ObjectId, ObjectState, ObjectStore,
    ServiceState, StateType,
};
use crate::obsess::ObsessiveForwarder;
use crate::transition::{self, ChangeReason, Step};

/// What a single `handle_state` pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateOutcome {
    pub reason: ChangeReason,
    pub steps: Vec<Step>,
    pub event_id: Option<u64>,
    pub dispatch: Option<DispatchReport>,
}

/// Reacts to completed checks: detects state changes and fires their side effects.
pub struct Reactor {
    settings: Arc<ReactorSettings>,
    event_ids: Arc<EventIdCounter>,
    collaborators: Collaborators,
    forwarder: ObsessiveForwarder,
    dispatcher: EventHandlerDispatcher,
}

impl Reactor {
    pub fn new(
        settings: Arc<ReactorSettings>,
        commands: Arc<CommandTable>,
        event_ids: Arc<EventIdCounter>,
        collaborators: Collaborators,
    ) -> Self {
        let forwarder =
            ObsessiveForwarder::new(Arc::clone(&settings), Arc::clone(&commands), &collaborators);
        let dispatcher =
            EventHandlerDispatcher::new(Arc::clone(&settings), commands, &collaborators);

        Self {
            settings,
            event_ids,
            collaborators,
            forwarder,
            dispatcher,
        }
    }

    pub fn event_ids(&self) -> &EventIdCounter {
        &self.event_ids
    }

    /// Post-check processing. Call exactly once per completed check, after the new
    /// state, state type and attempt have been written into the record.
    pub async fn handle_state(
        &self,
        objects: &mut ObjectStore,
        id: &ObjectId,
    ) -> Result<StateOutcome, ReactorError> {
        match id {
            ObjectId::Host { name } => {
                let host = objects
                    .host_mut(name)
                    .ok_or_else(|| ReactorError::UnknownObject(id.clone()))?;
                Ok(self.process(host, None).await)
            }
            ObjectId::Service {
                host_name,
                description,
            } => {
                let (service, host) = objects
                    .service_with_host(host_name, description)
                    .ok_or_else(|| ReactorError::UnknownObject(id.clone()))?;
                Ok(self.process(service, host).await)
            }
        }
    }

    /// Runs the event handlers for an object outside a transition pass, then drains
    /// any external commands they queued.
    pub async fn dispatch_event_handler(
        &self,
        objects: &mut ObjectStore,
        id: &ObjectId,
    ) -> Result<DispatchReport, ReactorError> {
        let report = match id {
            ObjectId::Host { name } => {
                let host = objects
                    .host_mut(name)
                    .ok_or_else(|| ReactorError::UnknownObject(id.clone()))?;
                self.dispatcher.dispatch(&HostState::subject(host, None)).await
            }
            ObjectId::Service {
                host_name,
                description,
            } => {
                let (service, host) = objects
                    .service_with_host(host_name, description)
                    .ok_or_else(|| ReactorError::UnknownObject(id.clone()))?;
                self.dispatcher
                    .dispatch(&ServiceState::subject(service, host))
                    .await
            }
        };

        if report.ran() {
            self.collaborators.external_commands.drain();
        }
        Ok(report)
    }

    async fn process<S: ObjectState>(
        &self,
        object: &mut MonitoredObject<S>,
        host: Option<&Host>,
    ) -> StateOutcome {
        let now = Utc::now();
        let plan = transition::plan(object, self.settings.log_retries(S::KIND));

        if plan.reason.is_change() {
            debug!(object = %object.id, reason = ?plan.reason, "State change detected");
        }

        let mut outcome = StateOutcome {
            reason: plan.reason,
            steps: plan.steps.clone(),
            event_id: None,
            dispatch: None,
        };

        for step in plan.steps {
            self.apply(step, object, host, now, &mut outcome).await;
        }
        outcome
    }

    async fn apply<S: ObjectState>(
        &self,
        step: Step,
        object: &mut MonitoredObject<S>,
        host: Option<&Host>,
        now: DateTime<Utc>,
        outcome: &mut StateOutcome,
    ) {
        let c = &self.collaborators;

        match step {
            Step::Obsess => {
                if let Err(e) = self.forwarder.forward(&S::subject(object, host)).await {
                    debug!(object = %object.id, error = %e, "Obsessive forwarding skipped");
                }
            }
            Step::UpdatePerformanceData => c.perfdata.update(&S::subject(object, host)),
            Step::RecordStateTime => {
                object.last_time_in_state.insert(object.current_state, now);
            }
            Step::StampStateChange => {
                object.last_state_change = Some(now);
                if object.state_type == StateType::Hard {
                    object.last_hard_state_change = Some(now);
                }
            }
            Step::AssignEventId => {
                object.last_event_id = object.current_event_id;
                object.current_event_id = self.event_ids.next_id();
                outcome.event_id = Some(object.current_event_id);
            }
            Step::ClearAcknowledgement => {
                object.problem_has_been_acknowledged = false;
                object.acknowledgement_type = AcknowledgementType::None;
                c.acknowledgements.delete_acknowledgement_comments(&object.id);
            }
            Step::ResetNotificationTimes => {
                object.last_notification = None;
                object.next_notification = None;
                object.no_more_notifications = false;
            }
            Step::LogStateChange => c.log.state_change(&S::subject(object, host)),
            Step::CheckFlexDowntime => c
                .downtime
                .check_pending_flex_downtime(&S::subject(object, host), now),
            Step::Notify(kind) => c.notifier.notify(&S::subject(object, host), kind),
            Step::DispatchEventHandlers => {
                let report = self.dispatcher.dispatch(&S::subject(object, host)).await;
                outcome.dispatch = Some(report);
            }
            Step::DrainExternalCommands => {
                let drained = c.external_commands.drain();
                if drained > 0 {
                    info!(object = %object.id, drained, "Processed external commands");
                }
            }
            Step::ResetRecovery => {
                object.current_attempt = 1;
                object.current_notification_number = 0;
                object.notified_on.clear();
            }
        }
    }
}
