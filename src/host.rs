/// Host capabilities (Telegram Mini App bridge and friends).
///
/// The web client reached for a global `Telegram.WebApp` object whenever it
/// wanted the current user or a haptic tap. Here the host is an explicit
/// dependency: flows receive a `HostCapabilities` and call it, and code
/// running outside a recognized host gets `NoopHost`.
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl HostUser {
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: None,
            username: None,
            language_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactStyle {
    Light,
    Medium,
    Heavy,
    Rigid,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

/// Haptic feedback kinds exposed by the Mini App bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticFeedback {
    Impact(ImpactStyle),
    Notification(NotificationKind),
    Selection,
}

/// What the surrounding host can do for us. Every method must be safe to
/// call when the host has nothing to offer.
pub trait HostCapabilities: Send + Sync {
    /// Whether a real host is present. Flows only trust `user()` when it is.
    fn is_available(&self) -> bool;

    fn user(&self) -> Option<HostUser>;

    fn show_alert(&self, message: &str);

    fn haptic(&self, feedback: HapticFeedback);

    /// Signal that the app finished loading.
    fn ready(&self);
}

/// Host used outside any recognized container: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl HostCapabilities for NoopHost {
    fn is_available(&self) -> bool {
        false
    }

    fn user(&self) -> Option<HostUser> {
        None
    }

    fn show_alert(&self, _message: &str) {}

    fn haptic(&self, _feedback: HapticFeedback) {}

    fn ready(&self) {}
}

/// Everything a `StaticHost` was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Alert(String),
    Haptic(HapticFeedback),
    Ready,
}

/// Host with a fixed user that records the calls made on it.
#[derive(Debug, Default)]
pub struct StaticHost {
    user: Option<HostUser>,
    events: Mutex<Vec<HostEvent>>,
}

impl StaticHost {
    pub fn new(user: Option<HostUser>) -> Self {
        Self {
            user,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: HostEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl HostCapabilities for StaticHost {
    fn is_available(&self) -> bool {
        true
    }

    fn user(&self) -> Option<HostUser> {
        self.user.clone()
    }

    fn show_alert(&self, message: &str) {
        tracing::info!(message = %message, "Host alert");
        self.record(HostEvent::Alert(message.to_string()));
    }

    fn haptic(&self, feedback: HapticFeedback) {
        self.record(HostEvent::Haptic(feedback));
    }

    fn ready(&self) {
        self.record(HostEvent::Ready);
    }
}
