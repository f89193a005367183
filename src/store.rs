use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::collaborators::{AcknowledgementStore, DowntimeStore};
use crate::models::{ObjectId, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommentKind {
    User,
    Acknowledgement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: u64,
    pub object: ObjectId,
    pub kind: CommentKind,
    pub author: String,
    pub text: String,
    pub persistent: bool,
    pub entry_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downtime {
    pub id: u64,
    pub object: ObjectId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub fixed: bool,
    /// Length of a flexible downtime once triggered.
    pub duration: Duration,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    comments: Vec<Comment>,
    downtimes: Vec<Downtime>,
}

/// Comment and scheduled downtime store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_comment(
        &self,
        object: ObjectId,
        kind: CommentKind,
        author: impl Into<String>,
        text: impl Into<String>,
        persistent: bool,
    ) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.comments.push(Comment {
            id,
            object,
            kind,
            author: author.into(),
            text: text.into(),
            persistent,
            entry_time: Utc::now(),
        });
        id
    }

    pub fn schedule_downtime(
        &self,
        object: ObjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        fixed: bool,
        duration: Duration,
    ) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.downtimes.push(Downtime {
            id,
            object,
            start,
            end,
            fixed,
            duration,
            started_at: None,
        });
        id
    }

    pub fn comments(&self, object: &ObjectId) -> Vec<Comment> {
        self.inner
            .lock()
            .comments
            .iter()
            .filter(|c| &c.object == object)
            .cloned()
            .collect()
    }

    pub fn downtimes(&self, object: &ObjectId) -> Vec<Downtime> {
        self.inner
            .lock()
            .downtimes
            .iter()
            .filter(|d| &d.object == object)
            .cloned()
            .collect()
    }
}

impl AcknowledgementStore for InMemoryStore {
    fn delete_acknowledgement_comments(&self, object: &ObjectId) {
        self.inner.lock().comments.retain(|c| {
            &c.object != object || c.kind != CommentKind::Acknowledgement || c.persistent
        });
    }
}

impl DowntimeStore for InMemoryStore {
    fn check_pending_flex_downtime(&self, subject: &Subject<'_>, now: DateTime<Utc>) {
        if subject.is_ok() {
            return;
        }

        let object = subject.id();
        let mut inner = self.inner.lock();
        for downtime in inner.downtimes.iter_mut().filter(|d| {
            &d.object == object
                && !d.fixed
                && d.started_at.is_none()
                && d.start <= now
                && now <= d.end
        }) {
            downtime.started_at = Some(now);
            info!(
                target: "netpulse::events",
                %object,
                downtime = downtime.id,
                "{} DOWNTIME ALERT: {};STARTED; Object has entered a period of scheduled downtime",
                if object.description().is_some() { "SERVICE" } else { "HOST" },
                object
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Host, HostState, ObjectState};

    #[test]
    fn only_non_persistent_ack_comments_are_removed() {
        let store = InMemoryStore::new();
        let web = ObjectId::host("web01");
        let db = ObjectId::host("db01");

        store.add_comment(web.clone(), CommentKind::Acknowledgement, "ops", "on it", false);
        store.add_comment(web.clone(), CommentKind::Acknowledgement, "ops", "keep", true);
        store.add_comment(web.clone(), CommentKind::User, "ops", "note", false);
        store.add_comment(db.clone(), CommentKind::Acknowledgement, "ops", "other", false);

        store.delete_acknowledgement_comments(&web);

        let texts: Vec<String> = store.comments(&web).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["keep", "note"]);
        assert_eq!(store.comments(&db).len(), 1);
    }

    #[test]
    fn flexible_downtime_starts_for_problem_inside_window() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let mut host = Host::new(ObjectId::host("web01"), HostState::Down, 3);

        let flexible = store.schedule_downtime(
            host.id.clone(),
            now - Duration::minutes(5),
            now + Duration::minutes(55),
            false,
            Duration::minutes(30),
        );
        let fixed = store.schedule_downtime(
            host.id.clone(),
            now - Duration::minutes(5),
            now + Duration::minutes(55),
            true,
            Duration::zero(),
        );
        let later = store.schedule_downtime(
            host.id.clone(),
            now + Duration::hours(1),
            now + Duration::hours(2),
            false,
            Duration::minutes(30),
        );

        host.current_state = HostState::Up;
        store.check_pending_flex_downtime(&HostState::subject(&host, None), now);
        assert!(store.downtimes(&host.id).iter().all(|d| d.started_at.is_none()));

        host.current_state = HostState::Down;
        store.check_pending_flex_downtime(&HostState::subject(&host, None), now);
        let started: Vec<u64> = store
            .downtimes(&host.id)
            .into_iter()
            .filter(|d| d.started_at.is_some())
            .map(|d| d.id)
            .collect();
        assert_eq!(started, vec![flexible]);
        assert!(!started.contains(&fixed) && !started.contains(&later));
    }
}
