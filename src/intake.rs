//! Passive check result intake used by the daemon.
//!
//! Writes the raw state fields of a record before the reactor looks at it, and settles the
//! hard state afterwards.

use crate::error::IntakeError;
use crate::models::{
    HostState, MonitoredObject, ObjectId, ObjectState, ObjectStore, ServiceState, StateType,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassiveResult {
    pub object: ObjectId,
    pub return_code: i32,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    CheckResult(PassiveResult),
    /// Any other control directive, passed on to the external command queue.
    Other(String),
}

/// Parses `[ts] PROCESS_HOST_CHECK_RESULT;host;code;output` and the service form.
/// Returns `None` for blank lines.
pub fn parse_line(line: &str) -> Option<Result<Directive, IntakeError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let body = match line.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
        Some((_, body)) => body.trim_start(),
        None => line,
    };

    let (name, args) = body.split_once(';').unwrap_or((body, ""));
    let parsed = match name {
        "PROCESS_HOST_CHECK_RESULT" => {
            let fields: Vec<&str> = args.splitn(3, ';').collect();
            match fields.as_slice() {
                [host, code, output] => parse_code(code, line).map(|return_code| PassiveResult {
                    object: ObjectId::host(*host),
                    return_code,
                    output: output.to_string(),
                }),
                _ => Err(IntakeError::Malformed(line.to_string())),
            }
        }
        "PROCESS_SERVICE_CHECK_RESULT" => {
            let fields: Vec<&str> = args.splitn(4, ';').collect();
            match fields.as_slice() {
                [host, service, code, output] => {
                    parse_code(code, line).map(|return_code| PassiveResult {
                        object: ObjectId::service(*host, *service),
                        return_code,
                        output: output.to_string(),
                    })
                }
                _ => Err(IntakeError::Malformed(line.to_string())),
            }
        }
        _ => return Some(Ok(Directive::Other(line.to_string()))),
    };

    Some(parsed.map(Directive::CheckResult))
}

fn parse_code(code: &str, line: &str) -> Result<i32, IntakeError> {
    code.trim()
        .parse()
        .map_err(|_| IntakeError::Malformed(line.to_string()))
}

/// Writes a passive result into the object's record.
pub fn apply_result(objects: &mut ObjectStore, result: &PassiveResult) -> Result<(), IntakeError> {
    let unknown = || IntakeError::UnknownObject(result.object.clone());
    let invalid = || IntakeError::InvalidReturnCode {
        object: result.object.clone(),
        code: result.return_code,
    };

    match &result.object {
        ObjectId::Host { name } => {
            let host = objects.host_mut(name).ok_or_else(unknown)?;
            let state = HostState::from_code(result.return_code).ok_or_else(invalid)?;
            record_check(host, state, &result.output);
        }
        ObjectId::Service {
            host_name,
            description,
        } => {
            let service = objects
                .service_mut(host_name, description)
                .ok_or_else(unknown)?;
            let state = ServiceState::from_code(result.return_code).ok_or_else(invalid)?;
            record_check(service, state, &result.output);
        }
    }
    Ok(())
}

/// Shifts the current state into `last_state` and derives the attempt and state type.
pub fn record_check<S: ObjectState>(object: &mut MonitoredObject<S>, state: S, output: &str) {
    let previous = object.current_state;
    object.last_state = previous;
    object.current_state = state;
    object.plugin_output = output.to_string();

    if state.is_ok() {
        // A recovery from a soft problem stays soft.
        if previous.is_ok() || object.state_type == StateType::Hard {
            object.state_type = StateType::Hard;
        }
        object.current_attempt = 1;
    } else if previous.is_ok() || object.state_type == StateType::Soft {
        object.current_attempt = if previous.is_ok() {
            1
        } else {
            (object.current_attempt + 1).min(object.max_attempts)
        };
        object.state_type = if object.current_attempt >= object.max_attempts {
            StateType::Hard
        } else {
            StateType::Soft
        };
    }
}

/// Records the hard state once the reactor has processed the check.
pub fn finish_check(objects: &mut ObjectStore, id: &ObjectId) {
    match id {
        ObjectId::Host { name } => {
            if let Some(host) = objects.host_mut(name) {
                settle_hard_state(host);
            }
        }
        ObjectId::Service {
            host_name,
            description,
        } => {
            if let Some(service) = objects.service_mut(host_name, description) {
                settle_hard_state(service);
            }
        }
    }
}

fn settle_hard_state<S: ObjectState>(object: &mut MonitoredObject<S>) {
    if object.state_type == StateType::Hard {
        object.last_hard_state = object.current_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Host;

    #[test]
    fn parses_check_results_and_other_directives() {
        assert_eq!(
            parse_line("[1700000000] PROCESS_HOST_CHECK_RESULT;web01;1;PING CRITICAL;extra"),
            Some(Ok(Directive::CheckResult(PassiveResult {
                object: ObjectId::host("web01"),
                return_code: 1,
                output: "PING CRITICAL;extra".into(),
            })))
        );
        assert_eq!(
            parse_line("PROCESS_SERVICE_CHECK_RESULT;web01;HTTP;2;refused"),
            Some(Ok(Directive::CheckResult(PassiveResult {
                object: ObjectId::service("web01", "HTTP"),
                return_code: 2,
                output: "refused".into(),
            })))
        );
        assert_eq!(
            parse_line("[1] ENABLE_EVENT_HANDLERS"),
            Some(Ok(Directive::Other("[1] ENABLE_EVENT_HANDLERS".into())))
        );
        assert_eq!(parse_line("   "), None);
        assert!(matches!(
            parse_line("PROCESS_HOST_CHECK_RESULT;web01;x;out"),
            Some(Err(IntakeError::Malformed(_)))
        ));
    }

    #[test]
    fn retries_promote_to_hard_at_max_attempts() {
        let mut host = Host::new(ObjectId::host("web01"), HostState::Up, 3);

        record_check(&mut host, HostState::Down, "down");
        assert_eq!((host.state_type, host.current_attempt), (StateType::Soft, 1));
        assert_eq!(host.last_state, HostState::Up);

        record_check(&mut host, HostState::Down, "down");
        assert_eq!((host.state_type, host.current_attempt), (StateType::Soft, 2));

        record_check(&mut host, HostState::Down, "down");
        assert_eq!((host.state_type, host.current_attempt), (StateType::Hard, 3));

        record_check(&mut host, HostState::Unreachable, "unreachable");
        assert_eq!((host.state_type, host.current_attempt), (StateType::Hard, 3));
    }

    #[test]
    fn recovery_from_soft_problem_is_soft() {
        let mut host = Host::new(ObjectId::host("web01"), HostState::Up, 3);
        record_check(&mut host, HostState::Down, "down");
        record_check(&mut host, HostState::Up, "up");
        assert_eq!((host.state_type, host.current_attempt), (StateType::Soft, 1));

        record_check(&mut host, HostState::Up, "up");
        assert_eq!(host.state_type, StateType::Hard);
    }

    #[test]
    fn unknown_objects_and_codes_are_rejected() {
        let mut objects = ObjectStore::new();
        objects.insert_host(Host::new(ObjectId::host("web01"), HostState::Up, 3));

        let result = PassiveResult {
            object: ObjectId::host("web01"),
            return_code: 7,
            output: String::new(),
        };
        assert!(matches!(
            apply_result(&mut objects, &result),
            Err(IntakeError::InvalidReturnCode { code: 7, .. })
        ));

        let result = PassiveResult {
            object: ObjectId::service("web01", "SSH"),
            return_code: 0,
            output: String::new(),
        };
        assert!(matches!(
            apply_result(&mut objects, &result),
            Err(IntakeError::UnknownObject(_))
        ));
    }
}
