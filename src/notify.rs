use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::collaborators::{NotificationKind, NotificationTrigger};
use crate::models::{ObjectId, StateType, Subject};

/// Owned snapshot of the object a notification is about.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRequest {
    pub object: ObjectId,
    pub kind: NotificationKind,
    pub state: &'static str,
    pub state_type: StateType,
    pub is_ok: bool,
    pub current_attempt: u32,
    pub max_attempts: u32,
    pub event_id: u64,
    pub acknowledged: bool,
    pub output: String,
}

impl NotificationRequest {
    pub fn from_subject(subject: &Subject<'_>, kind: NotificationKind) -> Self {
        Self {
            object: subject.id().clone(),
            kind,
            state: subject.state_label(),
            state_type: subject.state_type(),
            is_ok: subject.is_ok(),
            current_attempt: subject.current_attempt(),
            max_attempts: subject.max_attempts(),
            event_id: subject.current_event_id(),
            acknowledged: subject.problem_acknowledged(),
            output: subject.output().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentNotification {
    pub event_id: u64,
    pub at: DateTime<Utc>,
    pub problem: bool,
}

/// Suppression rules of the webhook notifier.
pub fn should_send(
    previous: Option<&SentNotification>,
    request: &NotificationRequest,
    now: DateTime<Utc>,
    interval: Duration,
) -> bool {
    if request.state_type == StateType::Soft {
        return false;
    }
    if request.is_ok {
        return matches!(previous, Some(p) if p.problem);
    }
    if request.acknowledged {
        return false;
    }
    match previous {
        Some(p) if p.problem && p.event_id == request.event_id => now - p.at >= interval,
        _ => true,
    }
}

/// Notification trigger that posts a webhook embed for each alert it lets through.
/// Without a URL the alert is only written to the event log.
pub struct WebhookNotifier {
    url: Option<String>,
    http_client: reqwest::Client,
    interval: Duration,
    sent: Arc<Mutex<HashMap<ObjectId, SentNotification>>>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, interval_secs: u64) -> Self {
        Self {
            url,
            http_client: reqwest::Client::new(),
            interval: i64::try_from(interval_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            sent: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl NotificationTrigger for WebhookNotifier {
    fn notify(&self, subject: &Subject<'_>, kind: NotificationKind) {
        let request = NotificationRequest::from_subject(subject, kind);
        let now = Utc::now();

        {
            let mut sent = self.sent.lock();
            if !should_send(sent.get(&request.object), &request, now, self.interval) {
                debug!(object = %request.object, state = request.state, "Notification suppressed");
                return;
            }
            sent.insert(
                request.object.clone(),
                SentNotification {
                    event_id: request.event_id,
                    at: now,
                    problem: !request.is_ok,
                },
            );
        }

        info!(
            target: "netpulse::events",
            object = %request.object,
            "{} NOTIFICATION: {};{};{}",
            if request.object.description().is_some() { "SERVICE" } else { "HOST" },
            request.object,
            request.state,
            request.output
        );

        if let Some(url) = self.url.clone() {
            let client = self.http_client.clone();
            tokio::spawn(async move { send_webhook(&client, &url, &request).await });
        }
    }
}

async fn send_webhook(client: &reqwest::Client, url: &str, request: &NotificationRequest) {
    let (title, color) = if request.is_ok {
        ("Recovery", 0x2ECC71)
    } else {
        ("Problem", 0xE74C3C)
    };
    let payload = serde_json::json!({
        "username": "NetPulse Engine",
        "embeds": [{
            "title": title,
            "color": color,
            "fields": [
                { "name": "Object", "value": request.object.to_string(), "inline": true },
                { "name": "State", "value": format!("{} ({})", request.state, request.state_type.label()), "inline": true },
                { "name": "Attempt", "value": format!("{}/{}", request.current_attempt, request.max_attempts), "inline": true },
                { "name": "Event", "value": request.event_id.to_string(), "inline": true },
                { "name": "Output", "value": request.output.as_str(), "inline": false }
            ],
            "timestamp": Utc::now().to_rfc3339(),
            "footer": { "text": "NetPulse Infrastructure Intelligence" }
        }]
    });

    if let Err(e) = client.post(url).json(&payload).send().await {
        warn!(object = %request.object, error = %e, "Webhook notification failed");
    }
}
