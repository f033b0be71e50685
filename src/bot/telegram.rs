use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bot::{BotTransport, Inbound, Poll};
use crate::config::TelegramConfig;
use crate::error::TransportError;
use crate::model::OwnerId;

/// Extra time on top of the long-poll duration before the HTTP request
/// itself is abandoned.
const HTTP_GRACE_SECS: u64 = 10;

/// Telegram Bot API transport using `getUpdates` long polling.
pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self, Report<TransportError>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                config.poll_timeout_secs + HTTP_GRACE_SECS,
            ))
            .build()
            .change_context(TransportError::Client)?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, Report<TransportError>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);

        // The URL embeds the bot token, so reqwest errors are reported
        // without it.
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .change_context(TransportError::Request { method })?;

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .change_context(TransportError::ResponseParse { method })?;

        envelope.into_result(method)
    }

    /// The bot's own `@username`, from `getMe`. Doubles as a token check at
    /// startup.
    pub async fn username(&self) -> Result<String, Report<TransportError>> {
        let me: User = self.call("getMe", &serde_json::json!({})).await?;
        bot_username(me)
    }
}

impl BotTransport for TelegramTransport {
    fn poll(&self, offset: i64) -> BoxFuture<'_, Result<Poll, Report<TransportError>>> {
        Box::pin(async move {
            let request = GetUpdates {
                offset,
                timeout: self.poll_timeout_secs,
                allowed_updates: &["message"],
            };
            let updates: Vec<Update> = self.call("getUpdates", &request).await?;
            debug!(count = updates.len(), offset, "telegram updates received");
            Ok(into_poll(updates))
        })
    }

    fn send_message(
        &self,
        owner: OwnerId,
        text: String,
    ) -> BoxFuture<'_, Result<(), Report<TransportError>>> {
        Box::pin(async move {
            let request = SendMessage {
                chat_id: owner.0,
                text: &text,
            };
            let _: serde_json::Value = self.call("sendMessage", &request).await?;
            Ok(())
        })
    }
}

fn bot_username(me: User) -> Result<String, Report<TransportError>> {
    me.username.ok_or_else(|| {
        Report::new(TransportError::Api {
            method: "getMe",
            description: "bot account has no username".into(),
        })
    })
}

fn into_poll(updates: Vec<Update>) -> Poll {
    let next_offset = updates.iter().map(|u| u.update_id + 1).max();
    let messages = updates
        .into_iter()
        .filter_map(|update| {
            let message = update.message?;
            Some(Inbound {
                update_id: update.update_id,
                owner: OwnerId(message.chat.id),
                text: message.text?,
            })
        })
        .collect();

    Poll {
        messages,
        next_offset,
    }
}

// ── Telegram wire types ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &'static str) -> Result<T, Report<TransportError>> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Report::new(TransportError::Api {
                method,
                description: self
                    .description
                    .unwrap_or_else(|| "no description".into()),
            })),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
}
