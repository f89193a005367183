#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use netpulse_reactor::collaborators::{
    AcknowledgementStore, Collaborators, DowntimeStore, EventHandlerTelemetry, EventLog,
    ExternalCommandDrain, HandlerScope, NotificationKind, NotificationTrigger, PerformanceSink,
    StateChangeTelemetry, TelemetrySink,
};
use netpulse_reactor::event_log::alert_line;
use netpulse_reactor::macros::StandardMacros;
use netpulse_reactor::models::Subject;
use netpulse_reactor::{
    CommandOutcome, CommandRunner, CommandTable, EventIdCounter, Host, HostState, ObjectId,
    ObjectStore, Reactor, ReactorSettings, Service, ServiceState, StateType,
};

pub const FIRST_EVENT_ID: u64 = 100;

/// Shared, ordered record of every collaborator call.
#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Command lines starting with `hang` report a timeout; everything else exits 0.
pub struct RecordingRunner {
    trace: Trace,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command_line: &str, limit: Duration) -> CommandOutcome {
        self.trace.push(format!("run:{}", command_line));
        if command_line.starts_with("hang") {
            CommandOutcome {
                exit_status: 2,
                output: String::new(),
                elapsed: limit,
                timed_out: true,
            }
        } else {
            CommandOutcome {
                exit_status: 0,
                output: "ok".into(),
                elapsed: Duration::from_millis(5),
                timed_out: false,
            }
        }
    }
}

pub struct RecordingNotifier {
    trace: Trace,
}

impl NotificationTrigger for RecordingNotifier {
    fn notify(&self, subject: &Subject<'_>, _kind: NotificationKind) {
        self.trace
            .push(format!("notify:{}:{}", subject.id(), subject.state_label()));
    }
}

pub struct RecordingLog {
    trace: Trace,
}

impl EventLog for RecordingLog {
    fn state_change(&self, subject: &Subject<'_>) {
        self.trace.push(format!("log:{}", alert_line(subject)));
    }

    fn event_handler(&self, scope: HandlerScope, _subject: &Subject<'_>, handler: &str) {
        self.trace.push(format!("handler-log:{:?}:{}", scope, handler));
    }

    fn warning(&self, text: &str) {
        self.trace.push(format!("warning:{}", text));
    }
}

impl PerformanceSink for RecordingLog {
    fn update(&self, subject: &Subject<'_>) {
        self.trace.push(format!("perfdata:{}", subject.id()));
    }
}

pub struct RecordingStores {
    trace: Trace,
}

impl DowntimeStore for RecordingStores {
    fn check_pending_flex_downtime(&self, subject: &Subject<'_>, _now: DateTime<Utc>) {
        self.trace.push(format!("downtime:{}", subject.id()));
    }
}

impl AcknowledgementStore for RecordingStores {
    fn delete_acknowledgement_comments(&self, object: &ObjectId) {
        self.trace.push(format!("ack-comments:{}", object));
    }
}

impl ExternalCommandDrain for RecordingStores {
    fn drain(&self) -> usize {
        self.trace.push("drain");
        0
    }
}

/// Telemetry goes to its own trace so step-order assertions stay readable.
pub struct RecordingTelemetry {
    trace: Trace,
}

impl TelemetrySink for RecordingTelemetry {
    fn event_handler_started(&self, event: &EventHandlerTelemetry) {
        self.trace
            .push(format!("started:{:?}:{}", event.scope, event.handler));
    }

    fn event_handler_finished(&self, event: &EventHandlerTelemetry) {
        self.trace.push(format!(
            "finished:{:?}:{}:{}",
            event.scope,
            event.exit_status.unwrap_or(-1),
            event.timed_out
        ));
    }

    fn state_changed(&self, event: &StateChangeTelemetry) {
        self.trace
            .push(format!("state:{}:{}", event.object, event.state));
    }
}

pub struct Harness {
    pub reactor: Reactor,
    pub objects: ObjectStore,
    pub trace: Trace,
    pub telemetry: Trace,
}

pub fn commands() -> CommandTable {
    let mut commands = CommandTable::default();
    commands.define("global-host", "global-host $HOSTNAME$");
    commands.define("global-service", "global-service $HOSTNAME$ $SERVICEDESC$");
    commands.define("restart", "restart $HOSTNAME$ $ARG1$");
    commands.define("ochp", "ochp $HOSTNAME$ $HOSTSTATE$");
    commands.define("ocsp", "ocsp $HOSTNAME$ $SERVICEDESC$ $SERVICESTATE$");
    commands.define("hang", "hang $HOSTNAME$");
    commands.define("blank", "$ARG1$");
    commands
}

/// Event handlers on with a global handler for each kind; obsessing off.
pub fn settings() -> ReactorSettings {
    ReactorSettings {
        global_host_event_handler: Some("global-host".into()),
        global_service_event_handler: Some("global-service".into()),
        ..ReactorSettings::default()
    }
}

/// Recording collaborators: calls go to the first trace, telemetry to the second.
pub fn collaborators() -> (Collaborators, Trace, Trace) {
    let trace = Trace::default();
    let telemetry = Trace::default();
    let log = Arc::new(RecordingLog {
        trace: trace.clone(),
    });
    let stores = Arc::new(RecordingStores {
        trace: trace.clone(),
    });

    let collaborators = Collaborators {
        runner: Arc::new(RecordingRunner {
            trace: trace.clone(),
        }),
        macros: Arc::new(StandardMacros::default()),
        notifier: Arc::new(RecordingNotifier {
            trace: trace.clone(),
        }),
        log: log.clone(),
        perfdata: log,
        downtime: stores.clone(),
        acknowledgements: stores.clone(),
        telemetry: Arc::new(RecordingTelemetry {
            trace: telemetry.clone(),
        }),
        external_commands: stores,
    };
    (collaborators, trace, telemetry)
}

pub fn harness(settings: ReactorSettings) -> Harness {
    let (collaborators, trace, telemetry) = collaborators();
    let reactor = Reactor::new(
        Arc::new(settings),
        Arc::new(commands()),
        Arc::new(EventIdCounter::new(FIRST_EVENT_ID)),
        collaborators,
    );

    Harness {
        reactor,
        objects: ObjectStore::new(),
        trace,
        telemetry,
    }
}

pub fn host(
    name: &str,
    current: HostState,
    last: HostState,
    last_hard: HostState,
    state_type: StateType,
) -> Host {
    let mut host = Host::new(ObjectId::host(name), current, 3);
    host.last_state = last;
    host.last_hard_state = last_hard;
    host.state_type = state_type;
    host.event_handler = Some("restart!web".into());
    host
}

pub fn service(
    host_name: &str,
    description: &str,
    current: ServiceState,
    last: ServiceState,
    last_hard: ServiceState,
    state_type: StateType,
) -> Service {
    let mut service = Service::new(ObjectId::service(host_name, description), current, 3);
    service.last_state = last;
    service.last_hard_state = last_hard;
    service.state_type = state_type;
    service.event_handler = Some("restart!svc".into());
    service
}
