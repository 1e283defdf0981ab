use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::TelegramConfig;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("missing telegram bot token")]
    MissingToken,
    #[error("no telegram channel configured")]
    MissingChannel,
    #[error("http error: {0}")]
    Http(String),
    #[error("telegram api error: {0}")]
    Api(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    pub parse_mode: String,
    pub silent: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            parse_mode: "HTML".to_string(),
            silent: true,
        }
    }
}

/// Outbound channel able to post a photo with a formatted caption.
pub trait MessageChannel {
    fn send(&self, photo_url: &str, caption: &str, options: &SendOptions)
        -> Result<(), ChannelError>;
}

#[derive(Serialize)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'a str,
    disable_notification: bool,
}

/// Posts to a channel through the Telegram Bot API `sendPhoto` method.
pub struct TelegramChannel {
    token: String,
    channel_id: String,
    api_base: String,
    client: Client,
}

impl TelegramChannel {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, ChannelError> {
        let token = config.bot_api_token.trim().to_string();
        if token.is_empty() {
            return Err(ChannelError::MissingToken);
        }

        let channel_id = config.channel_id.trim().to_string();
        if channel_id.is_empty() {
            return Err(ChannelError::MissingChannel);
        }

        let api_base = config
            .api_base
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ChannelError::Http(err.to_string()))?;

        Ok(Self {
            token,
            channel_id,
            api_base,
            client,
        })
    }
}

impl MessageChannel for TelegramChannel {
    fn send(
        &self,
        photo_url: &str,
        caption: &str,
        options: &SendOptions,
    ) -> Result<(), ChannelError> {
        let url = format!("{}/bot{}/sendPhoto", self.api_base, self.token);
        let payload = SendPhoto {
            chat_id: &self.channel_id,
            photo: photo_url,
            caption,
            parse_mode: &options.parse_mode,
            disable_notification: options.silent,
        };

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .map_err(|err| ChannelError::Http(err.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .map_err(|err| ChannelError::Http(err.to_string()))?;

        let ok = body.get("ok").and_then(|val| val.as_bool()).unwrap_or(false);
        if !status.is_success() || !ok {
            let description = body
                .get("description")
                .and_then(|val| val.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            return Err(ChannelError::Api(description));
        }

        Ok(())
    }
}
