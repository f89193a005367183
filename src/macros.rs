//! Macro expansion for command-line templates.
//!
//! Templates reference object attributes as `$NAME$`. `$$` yields a literal dollar sign and
//! unknown macros are copied through unchanged.

use chrono::Local;

use crate::models::{Host, ObjectState, Service, Subject};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MacroOptions {
    /// Remove illegal characters from plugin output macros.
    pub strip_illegal_chars: bool,
}

impl MacroOptions {
    pub const STRIP: Self = Self {
        strip_illegal_chars: true,
    };
}

pub trait MacroContext: Send + Sync {
    /// Expands every macro in `template` for `subject`. Must not block.
    fn expand(&self, template: &str, subject: &Subject<'_>, options: MacroOptions) -> String;
}

/// Host, service and date/time macros.
#[derive(Debug, Clone)]
pub struct StandardMacros {
    illegal_output_chars: String,
}

impl StandardMacros {
    pub fn new(illegal_output_chars: impl Into<String>) -> Self {
        Self {
            illegal_output_chars: illegal_output_chars.into(),
        }
    }

    fn strip(&self, value: &str) -> String {
        value
            .chars()
            .filter(|c| !self.illegal_output_chars.contains(*c))
            .collect()
    }

    fn lookup(&self, name: &str, subject: &Subject<'_>, options: MacroOptions) -> Option<String> {
        let host = subject.owning_host().ok();
        let service = match *subject {
            Subject::Service { service, .. } => Some(service),
            Subject::Host(_) => None,
        };
        let now = Local::now();

        let value = match name {
            "HOSTNAME" => subject.host_name().to_string(),
            "HOSTOUTPUT" => return host.map(|h| self.output(&h.plugin_output, options)),
            "SERVICEOUTPUT" => return service.map(|s| self.output(&s.plugin_output, options)),
            "TIMET" => now.timestamp().to_string(),
            "LONGDATETIME" => now.format("%a %b %d %H:%M:%S %Z %Y").to_string(),
            "SHORTDATETIME" => now.format("%m-%d-%Y %H:%M:%S").to_string(),
            "DATE" => now.format("%m-%d-%Y").to_string(),
            "TIME" => now.format("%H:%M:%S").to_string(),
            _ => {
                return host
                    .and_then(|h| host_macro(name, h))
                    .or_else(|| service.and_then(|s| service_macro(name, s)))
            }
        };
        Some(value)
    }

    fn output(&self, value: &str, options: MacroOptions) -> String {
        if options.strip_illegal_chars {
            self.strip(value)
        } else {
            value.to_string()
        }
    }
}

impl Default for StandardMacros {
    fn default() -> Self {
        Self::new("`~$&|'\"<>")
    }
}

fn host_macro(name: &str, host: &Host) -> Option<String> {
    let value = match name {
        "HOSTSTATE" => host.current_state.label().to_string(),
        "HOSTSTATEID" => host.current_state.code().to_string(),
        "HOSTSTATETYPE" => host.state_type.label().to_string(),
        "HOSTATTEMPT" => host.current_attempt.to_string(),
        "MAXHOSTATTEMPTS" => host.max_attempts.to_string(),
        "HOSTEVENTID" => host.current_event_id.to_string(),
        "LASTHOSTEVENTID" => host.last_event_id.to_string(),
        _ => return None,
    };
    Some(value)
}

fn service_macro(name: &str, service: &Service) -> Option<String> {
    let value = match name {
        "SERVICEDESC" => service.id.description().unwrap_or_default().to_string(),
        "SERVICESTATE" => service.current_state.label().to_string(),
        "SERVICESTATEID" => service.current_state.code().to_string(),
        "SERVICESTATETYPE" => service.state_type.label().to_string(),
        "SERVICEATTEMPT" => service.current_attempt.to_string(),
        "MAXSERVICEATTEMPTS" => service.max_attempts.to_string(),
        "SERVICEEVENTID" => service.current_event_id.to_string(),
        "LASTSERVICEEVENTID" => service.last_event_id.to_string(),
        _ => return None,
    };
    Some(value)
}

impl MacroContext for StandardMacros {
    fn expand(&self, template: &str, subject: &Subject<'_>, options: MacroOptions) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('$') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let Some(close) = after.find('$') else {
                out.push('$');
                rest = after;
                continue;
            };

            let name = &after[..close];
            if name.is_empty() {
                out.push('$');
                rest = &after[close + 1..];
            } else if let Some(value) = self.lookup(name, subject, options) {
                out.push_str(&value);
                rest = &after[close + 1..];
            } else {
                // Unknown: keep the dollar and rescan from the next one.
                out.push('$');
                rest = after;
            }
        }
        out.push_str(rest);
        out
    }
}
