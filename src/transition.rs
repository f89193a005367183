//! State change detection and the ordered step list of a transition pass.

use serde::Serialize;

use crate::collaborators::NotificationKind;
use crate::models::{AcknowledgementType, MonitoredObject, ObjectState, StateType};

/// Why a check result was (or was not) treated as a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeReason {
    ChangedByState,
    ChangedByHardState,
    /// The object is fully OK but mid-retry. Processed as a change on every such check.
    ChangedBySoftRecovery,
    Unchanged,
}

impl ChangeReason {
    pub fn is_change(self) -> bool {
        !matches!(self, ChangeReason::Unchanged)
    }
}

pub fn detect_change<S: ObjectState>(object: &MonitoredObject<S>) -> ChangeReason {
    if object.last_state != object.current_state {
        ChangeReason::ChangedByState
    } else if object.last_hard_state != object.current_state {
        ChangeReason::ChangedByHardState
    } else if object.current_state.is_ok() && object.state_type == StateType::Soft {
        ChangeReason::ChangedBySoftRecovery
    } else {
        ChangeReason::Unchanged
    }
}

/// One side effect of a transition pass. Executed strictly in plan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    Obsess,
    UpdatePerformanceData,
    RecordStateTime,
    StampStateChange,
    AssignEventId,
    ClearAcknowledgement,
    ResetNotificationTimes,
    LogStateChange,
    CheckFlexDowntime,
    Notify(NotificationKind),
    DispatchEventHandlers,
    DrainExternalCommands,
    ResetRecovery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    pub reason: ChangeReason,
    pub steps: Vec<Step>,
}

/// Builds the step list for a freshly checked object. `log_retries` is the per-kind
/// "log soft retries" switch.
pub fn plan<S: ObjectState>(object: &MonitoredObject<S>, log_retries: bool) -> TransitionPlan {
    let reason = detect_change(object);
    let ok = object.current_state.is_ok();
    let hard = object.state_type == StateType::Hard;

    let mut steps = vec![Step::Obsess, Step::UpdatePerformanceData, Step::RecordStateTime];

    if reason.is_change() {
        steps.push(Step::StampStateChange);
        steps.push(Step::AssignEventId);

        match object.acknowledgement_type {
            AcknowledgementType::Normal => steps.push(Step::ClearAcknowledgement),
            AcknowledgementType::Sticky if ok => steps.push(Step::ClearAcknowledgement),
            _ => {}
        }

        steps.push(Step::ResetNotificationTimes);

        if hard || log_retries {
            steps.push(Step::LogStateChange);
        }

        if hard {
            steps.push(Step::CheckFlexDowntime);
            steps.push(Step::Notify(NotificationKind::Normal));
        }

        steps.push(Step::DispatchEventHandlers);
        steps.push(Step::DrainExternalCommands);

        if ok {
            steps.push(Step::ResetRecovery);
        }
    } else {
        if !ok && hard {
            steps.push(Step::Notify(NotificationKind::Normal));
        }
        if !hard && log_retries {
            steps.push(Step::LogStateChange);
        }
    }

    TransitionPlan { reason, steps }
}
