use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::HandlerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HostState {
    Up,
    Down,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Host,
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateType {
    Soft,
    Hard,
}

impl StateType {
    pub fn label(self) -> &'static str {
        match self {
            StateType::Soft => "SOFT",
            StateType::Hard => "HARD",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcknowledgementType {
    #[default]
    None,
    Normal,
    Sticky,
}

/// Operational state of a monitored object. Implemented by [`HostState`] and [`ServiceState`].
pub trait ObjectState:
    Copy + Eq + Ord + fmt::Debug + Serialize + Send + Sync + 'static
{
    /// The fully-OK state (Up for hosts, Ok for services).
    const OK: Self;
    const KIND: ObjectKind;

    fn label(self) -> &'static str;
    fn code(self) -> u8;
    fn from_code(code: i32) -> Option<Self>;

    fn is_ok(self) -> bool {
        self == Self::OK
    }

    fn subject<'a>(object: &'a MonitoredObject<Self>, host: Option<&'a Host>) -> Subject<'a>;
}

impl ObjectState for HostState {
    const OK: Self = HostState::Up;
    const KIND: ObjectKind = ObjectKind::Host;

    fn label(self) -> &'static str {
        match self {
            HostState::Up => "UP",
            HostState::Down => "DOWN",
            HostState::Unreachable => "UNREACHABLE",
        }
    }

    fn code(self) -> u8 {
        match self {
            HostState::Up => 0,
            HostState::Down => 1,
            HostState::Unreachable => 2,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(HostState::Up),
            1 => Some(HostState::Down),
            2 => Some(HostState::Unreachable),
            _ => None,
        }
    }

    fn subject<'a>(object: &'a Host, _host: Option<&'a Host>) -> Subject<'a> {
        Subject::Host(object)
    }
}

impl ObjectState for ServiceState {
    const OK: Self = ServiceState::Ok;
    const KIND: ObjectKind = ObjectKind::Service;

    fn label(self) -> &'static str {
        match self {
            ServiceState::Ok => "OK",
            ServiceState::Warning => "WARNING",
            ServiceState::Critical => "CRITICAL",
            ServiceState::Unknown => "UNKNOWN",
        }
    }

    fn code(self) -> u8 {
        match self {
            ServiceState::Ok => 0,
            ServiceState::Warning => 1,
            ServiceState::Critical => 2,
            ServiceState::Unknown => 3,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ServiceState::Ok),
            1 => Some(ServiceState::Warning),
            2 => Some(ServiceState::Critical),
            3 => Some(ServiceState::Unknown),
            _ => None,
        }
    }

    fn subject<'a>(object: &'a Service, host: Option<&'a Host>) -> Subject<'a> {
        Subject::Service {
            service: object,
            host,
        }
    }
}

/// Identity of a monitored object. A service refers to its host by name only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectId {
    Host {
        name: String,
    },
    Service {
        host_name: String,
        description: String,
    },
}

impl ObjectId {
    pub fn host(name: impl Into<String>) -> Self {
        ObjectId::Host { name: name.into() }
    }

    pub fn service(host_name: impl Into<String>, description: impl Into<String>) -> Self {
        ObjectId::Service {
            host_name: host_name.into(),
            description: description.into(),
        }
    }

    pub fn host_name(&self) -> &str {
        match self {
            ObjectId::Host { name } => name,
            ObjectId::Service { host_name, .. } => host_name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            ObjectId::Host { .. } => None,
            ObjectId::Service { description, .. } => Some(description),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Host { name } => f.write_str(name),
            ObjectId::Service {
                host_name,
                description,
            } => write!(f, "{};{}", host_name, description),
        }
    }
}

/// In-memory record of a host or service.
///
/// Created at configuration load and mutated in place for the life of the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoredObject<S: ObjectState> {
    pub id: ObjectId,

    pub current_state: S,
    pub last_state: S,
    pub last_hard_state: S,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub max_attempts: u32,
    pub plugin_output: String,

    pub current_event_id: u64,
    pub last_event_id: u64,

    pub acknowledgement_type: AcknowledgementType,
    pub problem_has_been_acknowledged: bool,

    pub event_handler_enabled: bool,
    pub event_handler: Option<String>,
    pub obsess: bool,

    pub last_time_in_state: BTreeMap<S, DateTime<Utc>>,
    pub last_state_change: Option<DateTime<Utc>>,
    pub last_hard_state_change: Option<DateTime<Utc>>,
    pub last_notification: Option<DateTime<Utc>>,
    pub next_notification: Option<DateTime<Utc>>,
    pub no_more_notifications: bool,
    pub current_notification_number: u32,
    pub notified_on: BTreeSet<S>,
}

pub type Host = MonitoredObject<HostState>;
pub type Service = MonitoredObject<ServiceState>;

impl<S: ObjectState> MonitoredObject<S> {
    pub fn new(id: ObjectId, initial_state: S, max_attempts: u32) -> Self {
        Self {
            id,
            current_state: initial_state,
            last_state: initial_state,
            last_hard_state: initial_state,
            state_type: StateType::Hard,
            current_attempt: 1,
            max_attempts: max_attempts.max(1),
            plugin_output: String::new(),
            current_event_id: 0,
            last_event_id: 0,
            acknowledgement_type: AcknowledgementType::None,
            problem_has_been_acknowledged: false,
            event_handler_enabled: true,
            event_handler: None,
            obsess: true,
            last_time_in_state: BTreeMap::new(),
            last_state_change: None,
            last_hard_state_change: None,
            last_notification: None,
            next_notification: None,
            no_more_notifications: false,
            current_notification_number: 0,
            notified_on: BTreeSet::new(),
        }
    }

    pub fn last_time_in(&self, state: S) -> Option<DateTime<Utc>> {
        self.last_time_in_state.get(&state).copied()
    }
}

/// Borrowed view of the object a side effect is about.
///
/// A service view carries its owning host when the lookup succeeded.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Host(&'a Host),
    Service {
        service: &'a Service,
        host: Option<&'a Host>,
    },
}

macro_rules! with_object {
    ($subject:expr, $object:ident => $body:expr) => {
        match $subject {
            Subject::Host($object) => $body,
            Subject::Service {
                service: $object, ..
            } => $body,
        }
    };
}

impl<'a> Subject<'a> {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Subject::Host(_) => ObjectKind::Host,
            Subject::Service { .. } => ObjectKind::Service,
        }
    }

    pub fn id(&self) -> &'a ObjectId {
        with_object!(*self, o => &o.id)
    }

    pub fn host_name(&self) -> &'a str {
        self.id().host_name()
    }

    pub fn description(&self) -> Option<&'a str> {
        self.id().description()
    }

    pub fn state_label(&self) -> &'static str {
        with_object!(*self, o => o.current_state.label())
    }

    pub fn is_ok(&self) -> bool {
        with_object!(*self, o => o.current_state.is_ok())
    }

    pub fn state_type(&self) -> StateType {
        with_object!(*self, o => o.state_type)
    }

    pub fn current_attempt(&self) -> u32 {
        with_object!(*self, o => o.current_attempt)
    }

    pub fn max_attempts(&self) -> u32 {
        with_object!(*self, o => o.max_attempts)
    }

    pub fn output(&self) -> &'a str {
        with_object!(*self, o => o.plugin_output.as_str())
    }

    pub fn current_event_id(&self) -> u64 {
        with_object!(*self, o => o.current_event_id)
    }

    pub fn problem_acknowledged(&self) -> bool {
        with_object!(*self, o => o.problem_has_been_acknowledged)
    }

    pub fn event_handler_enabled(&self) -> bool {
        with_object!(*self, o => o.event_handler_enabled)
    }

    pub fn event_handler(&self) -> Option<&'a str> {
        with_object!(*self, o => o.event_handler.as_deref())
    }

    pub fn obsess(&self) -> bool {
        with_object!(*self, o => o.obsess)
    }

    /// The host record this subject belongs to. Fails for a service whose host is missing.
    pub fn owning_host(&self) -> Result<&'a Host, HandlerError> {
        match *self {
            Subject::Host(host) => Ok(host),
            Subject::Service {
                host: Some(host), ..
            } => Ok(host),
            Subject::Service { service, host: None } => Err(HandlerError::HostNotFound {
                host_name: service.id.host_name().to_string(),
            }),
        }
    }
}

/// Registry of all hosts and services, keyed by identity.
#[derive(Debug, Default)]
pub struct ObjectStore {
    hosts: BTreeMap<String, Host>,
    services: BTreeMap<(String, String), Service>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_host(&mut self, host: Host) {
        self.hosts.insert(host.id.host_name().to_string(), host);
    }

    pub fn insert_service(&mut self, service: Service) {
        let key = (
            service.id.host_name().to_string(),
            service.id.description().unwrap_or_default().to_string(),
        );
        self.services.insert(key, service);
    }

    /// Follows a service's back-reference to its host.
    pub fn host(&self, name: &str) -> Result<&Host, HandlerError> {
        self.hosts.get(name).ok_or_else(|| HandlerError::HostNotFound {
            host_name: name.to_string(),
        })
    }

    pub fn host_mut(&mut self, name: &str) -> Option<&mut Host> {
        self.hosts.get_mut(name)
    }

    pub fn service(&self, host_name: &str, description: &str) -> Option<&Service> {
        self.services
            .get(&(host_name.to_string(), description.to_string()))
    }

    pub fn service_mut(&mut self, host_name: &str, description: &str) -> Option<&mut Service> {
        self.services
            .get_mut(&(host_name.to_string(), description.to_string()))
    }

    /// Mutable service together with its owning host, if that host exists.
    pub fn service_with_host(
        &mut self,
        host_name: &str,
        description: &str,
    ) -> Option<(&mut Service, Option<&Host>)> {
        let service = self
            .services
            .get_mut(&(host_name.to_string(), description.to_string()))?;
        Some((service, self.hosts.get(host_name)))
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_host_back_reference_is_not_found() {
        let mut store = ObjectStore::new();
        store.insert_service(Service::new(
            ObjectId::service("ghost", "HTTP"),
            ServiceState::Ok,
            3,
        ));

        let (service, host) = store.service_with_host("ghost", "HTTP").unwrap();
        assert!(host.is_none());

        let subject = ServiceState::subject(service, host);
        assert_eq!(
            subject.owning_host().unwrap_err(),
            HandlerError::HostNotFound {
                host_name: "ghost".into()
            }
        );
        assert!(store.host("ghost").is_err());
    }

    #[test]
    fn object_id_display() {
        assert_eq!(ObjectId::host("web01").to_string(), "web01");
        assert_eq!(ObjectId::service("web01", "HTTP").to_string(), "web01;HTTP");
    }

    #[test]
    fn state_codes_round_trip_through_labels() {
        assert_eq!(HostState::from_code(2), Some(HostState::Unreachable));
        assert_eq!(HostState::from_code(3), None);
        assert_eq!(ServiceState::from_code(3).map(ServiceState::label), Some("UNKNOWN"));
        assert!(HostState::Up.is_ok());
        assert!(!ServiceState::Warning.is_ok());
    }
}
