use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use crate::error::ConfigError;
use crate::models::{Host, HostState, ObjectId, ObjectKind, ObjectStore, Service, ServiceState};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub reactor: ReactorSettings,
    #[serde(default)]
    pub commands: HashMap<String, String>,
    #[serde(default)]
    pub hosts: Vec<HostDefinition>,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
    #[serde(default = "default_first_event_id")]
    pub first_event_id: u64,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    pub webhook_url: Option<String>,
    #[serde(default = "default_notification_interval")]
    pub notification_interval_secs: u64,
}

fn default_first_event_id() -> u64 { 1 }
fn default_api_port() -> u16 { 3000 }
fn default_notification_interval() -> u64 { 3600 }

/// Upper bound for any interval or timeout in the config (one year).
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 3600;

/// Process-wide switches and commands consulted by the reactor.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReactorSettings {
    pub enable_event_handlers: bool,
    pub obsess_over_hosts: bool,
    pub obsess_over_services: bool,
    pub log_event_handlers: bool,
    pub log_host_retries: bool,
    pub log_service_retries: bool,
    pub event_handler_timeout_secs: u64,
    pub ochp_timeout_secs: u64,
    pub ocsp_timeout_secs: u64,
    pub global_host_event_handler: Option<String>,
    pub global_service_event_handler: Option<String>,
    pub ochp_command: Option<String>,
    pub ocsp_command: Option<String>,
    pub illegal_macro_output_chars: String,
}

impl Default for ReactorSettings {
    fn default() -> Self {
        Self {
            enable_event_handlers: true,
            obsess_over_hosts: false,
            obsess_over_services: false,
            log_event_handlers: true,
            log_host_retries: false,
            log_service_retries: false,
            event_handler_timeout_secs: 30,
            ochp_timeout_secs: 15,
            ocsp_timeout_secs: 15,
            global_host_event_handler: None,
            global_service_event_handler: None,
            ochp_command: None,
            ocsp_command: None,
            illegal_macro_output_chars: "`~$&|'\"<>".into(),
        }
    }
}

impl ReactorSettings {
    pub fn event_handler_timeout(&self) -> Duration {
        Duration::from_secs(self.event_handler_timeout_secs)
    }

    pub fn global_event_handler(&self, kind: ObjectKind) -> Option<&str> {
        match kind {
            ObjectKind::Host => self.global_host_event_handler.as_deref(),
            ObjectKind::Service => self.global_service_event_handler.as_deref(),
        }
    }

    pub fn obsess_enabled(&self, kind: ObjectKind) -> bool {
        match kind {
            ObjectKind::Host => self.obsess_over_hosts,
            ObjectKind::Service => self.obsess_over_services,
        }
    }

    pub fn obsess_command(&self, kind: ObjectKind) -> Option<&str> {
        match kind {
            ObjectKind::Host => self.ochp_command.as_deref(),
            ObjectKind::Service => self.ocsp_command.as_deref(),
        }
    }

    pub fn obsess_timeout_secs(&self, kind: ObjectKind) -> u64 {
        match kind {
            ObjectKind::Host => self.ochp_timeout_secs,
            ObjectKind::Service => self.ocsp_timeout_secs,
        }
    }

    pub fn log_retries(&self, kind: ObjectKind) -> bool {
        match kind {
            ObjectKind::Host => self.log_host_retries,
            ObjectKind::Service => self.log_service_retries,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HostDefinition {
    pub name: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub event_handler: Option<String>,
    #[serde(default = "default_true")]
    pub event_handler_enabled: bool,
    #[serde(default = "default_true")]
    pub obsess: bool,
    #[serde(default)]
    pub initial_state: Option<HostState>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceDefinition {
    pub host_name: String,
    pub description: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub event_handler: Option<String>,
    #[serde(default = "default_true")]
    pub event_handler_enabled: bool,
    #[serde(default = "default_true")]
    pub obsess: bool,
    #[serde(default)]
    pub initial_state: Option<ServiceState>,
}

fn default_max_attempts() -> u32 { 3 }
fn default_true() -> bool { true }

impl DaemonConfig {
    /// Rejects values that cannot be turned into durations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("notification_interval_secs", self.notification_interval_secs),
            ("event_handler_timeout_secs", self.reactor.event_handler_timeout_secs),
            ("ochp_timeout_secs", self.reactor.ochp_timeout_secs),
            ("ocsp_timeout_secs", self.reactor.ocsp_timeout_secs),
        ];
        for (field, value) in limits {
            if value > MAX_INTERVAL_SECS {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    max: MAX_INTERVAL_SECS,
                });
            }
        }
        Ok(())
    }

    /// Builds the object registry from the host and service definitions.
    pub fn build_objects(&self) -> ObjectStore {
        let mut store = ObjectStore::new();

        for def in &self.hosts {
            let mut host = Host::new(
                ObjectId::host(&def.name),
                def.initial_state.unwrap_or(HostState::Up),
                def.max_attempts,
            );
            host.event_handler = def.event_handler.clone();
            host.event_handler_enabled = def.event_handler_enabled;
            host.obsess = def.obsess;
            store.insert_host(host);
        }

        for def in &self.services {
            if store.host(&def.host_name).is_err() {
                warn!(
                    host = %def.host_name,
                    service = %def.description,
                    "Service refers to an undefined host; its handlers will not run"
                );
            }
            let mut service = Service::new(
                ObjectId::service(&def.host_name, &def.description),
                def.initial_state.unwrap_or(ServiceState::Ok),
                def.max_attempts,
            );
            service.event_handler = def.event_handler.clone();
            service.event_handler_enabled = def.event_handler_enabled;
            service.obsess = def.obsess;
            store.insert_service(service);
        }

        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: DaemonConfig = serde_json::from_str(
            r#"{
                "hosts": [{ "name": "web01" }],
                "services": [{ "host_name": "web01", "description": "HTTP", "max_attempts": 5 }]
            }"#,
        )
        .unwrap();

        assert!(config.reactor.enable_event_handlers);
        assert!(!config.reactor.obsess_over_hosts);
        assert_eq!(config.reactor.event_handler_timeout(), Duration::from_secs(30));
        assert_eq!(config.api_port, 3000);
        assert_eq!(config.first_event_id, 1);

        let store = config.build_objects();
        let service = store.service("web01", "HTTP").unwrap();
        assert_eq!(service.max_attempts, 5);
        assert_eq!(service.current_state, ServiceState::Ok);
        assert!(service.event_handler_enabled);
    }

    #[test]
    fn per_kind_settings_are_selected() {
        let settings = ReactorSettings {
            ochp_command: Some("ochp".into()),
            ocsp_timeout_secs: 7,
            log_service_retries: true,
            ..Default::default()
        };

        assert_eq!(settings.obsess_command(ObjectKind::Host), Some("ochp"));
        assert_eq!(settings.obsess_command(ObjectKind::Service), None);
        assert_eq!(settings.obsess_timeout_secs(ObjectKind::Service), 7);
        assert!(!settings.log_retries(ObjectKind::Host));
        assert!(settings.log_retries(ObjectKind::Service));
    }

    #[test]
    fn sample_config_parses() {
        let config: DaemonConfig =
            serde_json::from_str(include_str!("../config.example.json")).unwrap();

        assert!(config.webhook_url.is_none());
        assert_eq!(config.reactor.ocsp_command.as_deref(), Some("forward-service"));
        assert!(config.commands.contains_key("restart-service"));

        let store = config.build_objects();
        assert_eq!(store.hosts().count(), 2);
        assert!(!store.host("db01").unwrap().obsess);
        assert_eq!(
            store.service("web01", "HTTP").unwrap().event_handler.as_deref(),
            Some("restart-service!nginx")
        );
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        let mut config: DaemonConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.validate(), Ok(()));

        config.notification_interval_secs = u64::MAX;
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "notification_interval_secs",
                value: u64::MAX,
                max: MAX_INTERVAL_SECS,
            })
        );

        config.notification_interval_secs = 3600;
        config.reactor.event_handler_timeout_secs = MAX_INTERVAL_SECS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "event_handler_timeout_secs", .. })
        ));
    }
}
