pub mod events;
#[cfg(test)]
pub mod fake;
pub mod telegram;

use std::future::Future;

use thiserror::Error;

pub use events::{EventBus, EventHandler, Subscription};

/// What the hosting application reports about the frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostContext {
    /// The frame is already pinned/added by the user.
    pub added: bool,
    pub safe_area_insets: Option<SafeAreaInsets>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SafeAreaInsets {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDetails {
    pub url: String,
    pub token: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    #[error("Not added: {0}")]
    RejectedByUser(String),
    #[error("Not added: {0}")]
    InvalidRegistration(String),
    #[error("Error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PinAdded,
    PinRejected,
    Removed,
    NotificationsEnabled,
    NotificationsDisabled,
    PrimaryActionInvoked,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::PinAdded,
        EventKind::PinRejected,
        EventKind::Removed,
        EventKind::NotificationsEnabled,
        EventKind::NotificationsDisabled,
        EventKind::PrimaryActionInvoked,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    PinAdded {
        notifications: Option<NotificationDetails>,
    },
    PinRejected {
        reason: String,
    },
    Removed,
    NotificationsEnabled {
        notifications: NotificationDetails,
    },
    NotificationsDisabled,
    PrimaryActionInvoked,
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::PinAdded { .. } => EventKind::PinAdded,
            HostEvent::PinRejected { .. } => EventKind::PinRejected,
            HostEvent::Removed => EventKind::Removed,
            HostEvent::NotificationsEnabled { .. } => EventKind::NotificationsEnabled,
            HostEvent::NotificationsDisabled => EventKind::NotificationsDisabled,
            HostEvent::PrimaryActionInvoked => EventKind::PrimaryActionInvoked,
        }
    }
}

/// The capabilities a frame needs from the application hosting it.
pub trait Host: Send + Sync + 'static {
    /// `None` when the frame is not running inside a host.
    fn context(&self) -> impl Future<Output = Option<HostContext>> + Send;

    fn request_pin(&self) -> impl Future<Output = Result<(), PinError>> + Send;

    /// Tells the host the frame finished loading.
    fn signal_ready(&self) -> impl Future<Output = ()> + Send;

    /// Registers `handler` for events of `kind`; dropping the returned
    /// subscription unregisters it.
    fn on_event(&self, kind: EventKind, handler: EventHandler) -> Subscription;
}
