//! Per-subscriber delivery filtering.

use raven_security::{glob_match, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{Event, EventScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    Global,
    Session,
}

/// The shape an event takes on its way to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendEvent {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: DeliveryChannel,
    pub data: Value,
    /// Subscription patterns that matched the event path.
    pub subscribers: Vec<String>,
}

impl FrontendEvent {
    fn new(event: &Event, subscribers: Vec<String>) -> Self {
        Self {
            id: event.id.clone(),
            source: event.source.clone(),
            kind: event.path().to_string(),
            channel: if event.scope.is_global() {
                DeliveryChannel::Global
            } else {
                DeliveryChannel::Session
            },
            data: event.payload.data(),
            subscribers,
        }
    }
}

/// A connected client: its principal (if authenticated) and subscription globs.
#[derive(Debug, Clone, Default)]
pub struct Subscriber {
    pub user: Option<User>,
    pub subscriptions: Vec<String>,
}

impl Subscriber {
    pub fn new(user: Option<User>) -> Self {
        Self {
            user,
            subscriptions: Vec::new(),
        }
    }

    pub fn with_subscriptions<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(paths);
        self
    }

    /// Add patterns, skipping ones already held.
    pub fn subscribe<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            let path = path.into();
            if !self.subscriptions.contains(&path) {
                self.subscriptions.push(path);
            }
        }
    }

    pub fn unsubscribe<S: AsRef<str>>(&mut self, paths: &[S]) {
        self.subscriptions
            .retain(|held| !paths.iter().any(|p| p.as_ref() == held));
    }

    /// Whether this subscriber may see an event with `scope`.
    pub fn authorized_for(&self, scope: &EventScope) -> bool {
        match scope {
            EventScope::Global => true,
            EventScope::Scoped(required) => self
                .user
                .as_ref()
                .is_some_and(|user| user.has_scope(required)),
        }
    }

    /// The normalized event to send, or `None` if it should not be delivered.
    pub fn deliver(&self, event: &Event) -> Option<FrontendEvent> {
        let matches = glob_match(event.path(), &self.subscriptions);
        if matches.is_empty() || !self.authorized_for(&event.scope) {
            return None;
        }
        let matches = matches.into_iter().map(str::to_string).collect();
        Some(FrontendEvent::new(event, matches))
    }
}
