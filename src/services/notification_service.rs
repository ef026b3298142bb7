use chrono::{ DateTime, Utc };
use teloxide::prelude::*;

use crate::db::entity::user;

/// Telegram messages for subscription changes. A no-op without a bot token.
pub struct NotificationService {
    bot: Option<Bot>,
}

fn chat_target(user: &user::Model) -> Option<ChatId> {
    if !user.telegram_notifications_enabled {
        return None;
    }
    user.telegram_chat_id
        .as_deref()
        .and_then(|id| id.trim().parse::<i64>().ok())
        .map(ChatId)
}

fn granted_message(expiry: DateTime<Utc>) -> String {
    format!(
        "✅ Payment confirmed. Your Yield Bearer subscription is active until {}.",
        expiry.format("%Y-%m-%d %H:%M UTC")
    )
}

fn expired_message() -> String {
    "⏰ Your Yield Bearer subscription has expired. Renew to keep seeing every opportunity.".to_string()
}

impl NotificationService {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            bot: token.map(Bot::new),
        }
    }

    pub fn disabled() -> Self {
        Self { bot: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.bot.is_some()
    }

    pub async fn subscription_granted(&self, user: &user::Model, expiry: DateTime<Utc>) {
        self.send(user, granted_message(expiry)).await;
    }

    pub async fn subscription_expired(&self, user: &user::Model) {
        self.send(user, expired_message()).await;
    }

    // Delivery failures never affect entitlement
    async fn send(&self, user: &user::Model, text: String) {
        let (Some(bot), Some(chat_id)) = (&self.bot, chat_target(user)) else {
            return;
        };

        if let Err(e) = bot.send_message(chat_id, text).await {
            tracing::warn!(address = %user.address, "Telegram notification failed: {}", e);
        }
    }
}
