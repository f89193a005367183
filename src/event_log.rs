use tracing::{debug, error, info, warn};

use crate::collaborators::{EventLog, HandlerScope, PerformanceSink};
use crate::models::{StateType, Subject};

const EVENTS: &str = "netpulse::events";
const PERFDATA: &str = "netpulse::perfdata";

/// Event log and performance data sink backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventLog;

/// `HOST ALERT: web01;DOWN;HARD;3;output` or the `SERVICE ALERT` equivalent.
pub fn alert_line(subject: &Subject<'_>) -> String {
    match subject.description() {
        None => format!(
            "HOST ALERT: {};{};{};{};{}",
            subject.host_name(),
            subject.state_label(),
            subject.state_type().label(),
            subject.current_attempt(),
            subject.output()
        ),
        Some(description) => format!(
            "SERVICE ALERT: {};{};{};{};{};{}",
            subject.host_name(),
            description,
            subject.state_label(),
            subject.state_type().label(),
            subject.current_attempt(),
            subject.output()
        ),
    }
}

pub fn event_handler_line(scope: HandlerScope, subject: &Subject<'_>, handler: &str) -> String {
    let prefix = match scope {
        HandlerScope::Global => "GLOBAL ",
        HandlerScope::Object => "",
    };
    match subject.description() {
        None => format!(
            "{}HOST EVENT HANDLER: {};{};{};{};{}",
            prefix,
            subject.host_name(),
            subject.state_label(),
            subject.state_type().label(),
            subject.current_attempt(),
            handler
        ),
        Some(description) => format!(
            "{}SERVICE EVENT HANDLER: {};{};{};{};{};{}",
            prefix,
            subject.host_name(),
            description,
            subject.state_label(),
            subject.state_type().label(),
            subject.current_attempt(),
            handler
        ),
    }
}

impl EventLog for TracingEventLog {
    fn state_change(&self, subject: &Subject<'_>) {
        let line = alert_line(subject);
        let object = subject.id();
        if subject.state_type() == StateType::Soft {
            info!(target: EVENTS, %object, "{}", line);
        } else if subject.is_ok() {
            warn!(target: EVENTS, %object, "{}", line);
        } else {
            error!(target: EVENTS, %object, "{}", line);
        }
    }

    fn event_handler(&self, scope: HandlerScope, subject: &Subject<'_>, handler: &str) {
        info!(
            target: EVENTS,
            object = %subject.id(),
            ?scope,
            "{}",
            event_handler_line(scope, subject, handler)
        );
    }

    fn warning(&self, text: &str) {
        warn!(target: EVENTS, "{}", text);
    }
}

impl PerformanceSink for TracingEventLog {
    fn update(&self, subject: &Subject<'_>) {
        if let Some((_, perfdata)) = subject.output().split_once('|') {
            let perfdata = perfdata.trim();
            if !perfdata.is_empty() {
                debug!(target: PERFDATA, object = %subject.id(), perfdata, "Performance data");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Host, HostState, ObjectId, ObjectState, Service, ServiceState};

    #[test]
    fn host_and_service_alert_lines() {
        let mut host = Host::new(ObjectId::host("web01"), HostState::Down, 3);
        host.current_attempt = 3;
        host.plugin_output = "PING CRITICAL".into();
        assert_eq!(
            alert_line(&HostState::subject(&host, None)),
            "HOST ALERT: web01;DOWN;HARD;3;PING CRITICAL"
        );

        let mut service = Service::new(ObjectId::service("web01", "HTTP"), ServiceState::Warning, 4);
        service.state_type = StateType::Soft;
        service.current_attempt = 2;
        service.plugin_output = "slow".into();
        assert_eq!(
            alert_line(&ServiceState::subject(&service, Some(&host))),
            "SERVICE ALERT: web01;HTTP;WARNING;SOFT;2;slow"
        );
    }

    #[test]
    fn event_handler_lines_name_the_scope() {
        let host = Host::new(ObjectId::host("web01"), HostState::Down, 3);
        let subject = HostState::subject(&host, None);
        assert_eq!(
            event_handler_line(HandlerScope::Global, &subject, "log-all"),
            "GLOBAL HOST EVENT HANDLER: web01;DOWN;HARD;1;log-all"
        );
        assert_eq!(
            event_handler_line(HandlerScope::Object, &subject, "restart!web"),
            "HOST EVENT HANDLER: web01;DOWN;HARD;1;restart!web"
        );
    }
}
