//! NetPulse reaction core.
//!
//! Given a freshly completed check written into a host or service record, the [`Reactor`]
//! decides whether the object changed state, updates its bookkeeping and fires the side
//! effects that hang off that decision: obsessive forwarding, event handlers, notification
//! requests, event logging and downtime checks.

pub mod api;
pub mod collaborators;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_handler;
pub mod event_id;
pub mod event_log;
pub mod external;
pub mod intake;
pub mod macros;
pub mod models;
pub mod notify;
pub mod obsess;
pub mod store;
pub mod telemetry;
pub mod transition;

pub use collaborators::Collaborators;
pub use command::{CommandOutcome, CommandRunner, CommandTable, ShellRunner};
pub use config::{DaemonConfig, ReactorSettings};
pub use engine::{Reactor, StateOutcome};
pub use error::{ConfigError, HandlerError, ReactorError};
pub use event_handler::{DispatchReport, HandlerRun};
pub use event_id::EventIdCounter;
pub use models::{
    AcknowledgementType, Host, HostState, ObjectId, ObjectStore, Service, ServiceState, StateType,
};
pub use transition::{ChangeReason, Step};
