use log::{debug, warn};
use teloxide::{
    prelude::*,
    types::{MessageId, UserId},
    ApiError, RequestError,
};

use super::{
    EventBus, EventHandler, EventKind, Host, HostContext, HostEvent, NotificationDetails, PinError,
    Subscription,
};

/// A Telegram chat acting as the frame's host.
///
/// The frame is anchored to one bot message; pinning the frame pins that
/// message, and the frame counts as added while the chat's pinned message
/// is one of ours.
pub struct TelegramHost {
    bot: Bot,
    chat_id: ChatId,
    anchor: MessageId,
    bot_id: UserId,
    ready_text: String,
    events: EventBus,
}

impl TelegramHost {
    pub fn new(
        bot: Bot,
        chat_id: ChatId,
        anchor: MessageId,
        bot_id: UserId,
        ready_text: String,
    ) -> Self {
        Self {
            bot,
            chat_id,
            anchor,
            bot_id,
            ready_text,
            events: EventBus::new(),
        }
    }

    pub fn notification_details(&self) -> NotificationDetails {
        NotificationDetails {
            url: format!("tg://openmessage?chat_id={}", self.chat_id.0),
            token: self.chat_id.0.to_string(),
        }
    }

    /// Delivers an event observed in the chat to the frame's listeners.
    pub fn dispatch(&self, event: HostEvent) {
        let delivered = self.events.emit(&event);
        debug!(
            "Chat {}: {:?} reached {} listener(s)",
            self.chat_id.0, event, delivered
        );
    }
}

fn pin_error(err: RequestError) -> PinError {
    match err {
        RequestError::Api(ApiError::NotEnoughRightsToPinMessage)
        | RequestError::Api(ApiError::BotBlocked) => PinError::RejectedByUser(err.to_string()),
        RequestError::Api(ApiError::ChatNotFound) => {
            PinError::InvalidRegistration(err.to_string())
        }
        err => PinError::Other(err.to_string()),
    }
}

impl Host for TelegramHost {
    async fn context(&self) -> Option<HostContext> {
        match self.bot.get_chat(self.chat_id).await {
            Ok(chat) => {
                let added = chat
                    .pinned_message
                    .as_ref()
                    .and_then(|pinned| pinned.from())
                    .map_or(false, |author| author.id == self.bot_id);
                // Telegram draws no chrome over messages
                Some(HostContext {
                    added,
                    safe_area_insets: None,
                })
            }
            Err(err) => {
                warn!("Could not fetch chat {}: {}", self.chat_id.0, err);
                None
            }
        }
    }

    async fn request_pin(&self) -> Result<(), PinError> {
        let result = self
            .bot
            .pin_chat_message(self.chat_id, self.anchor)
            .disable_notification(true)
            .await;

        match result {
            Ok(_) => {
                self.dispatch(HostEvent::PinAdded {
                    notifications: None,
                });
                Ok(())
            }
            Err(err) => {
                let err = pin_error(err);
                self.dispatch(HostEvent::PinRejected {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn signal_ready(&self) {
        if let Err(err) = self
            .bot
            .edit_message_text(self.chat_id, self.anchor, self.ready_text.clone())
            .await
        {
            warn!("Could not replace the loading message: {}", err);
        }
    }

    fn on_event(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        self.events.subscribe(kind, handler)
    }
}
