//! Discord REST adapter
//!
//! Status messages are plain channel messages carrying one embed. A message
//! is posted once per host and edited on every refresh afterwards; its id is
//! the [`ArtifactHandle`] kept in the anchors file.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::presenter::{ArtifactHandle, PresentationError, Presenter};
use crate::render::status_message;
use crate::storage::UptimeWindow;
use crate::{HostIdentity, ProbeOutcome};

const USER_AGENT: &str = concat!("DiscordBot (fleetwatch, ", env!("CARGO_PKG_VERSION"), ")");
const MAX_ATTEMPTS: usize = 3;
const READY_BACKOFF_START: Duration = Duration::from_secs(5);
const READY_BACKOFF_MAX: Duration = Duration::from_secs(300);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// The parts of a Discord user object we look at
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

/// The parts of a Discord channel object we look at
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RateLimited {
    retry_after: f64,
}

/// Wait requested by a 429 body, capped at [`MAX_RETRY_AFTER`].
fn retry_delay(retry_after: f64) -> Duration {
    if retry_after.is_nan() {
        return DEFAULT_RETRY_AFTER;
    }
    Duration::try_from_secs_f64(retry_after.max(0.0))
        .map(|delay| delay.min(MAX_RETRY_AFTER))
        .unwrap_or(MAX_RETRY_AFTER)
}

/// Thin client for the few REST endpoints the bot needs.
#[derive(Debug, Clone)]
pub struct DiscordClient {
    client: Client,
    api_base: String,
    token: String,
    channel_id: String,
}

impl DiscordClient {
    pub fn new(api_base: &str, token: &str, channel_id: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn messages_url(&self) -> String {
        self.url(&format!("/channels/{}/messages", self.channel_id))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bot {}", self.token))
            .header("User-Agent", USER_AGENT)
    }

    /// Send the request built by `build`, waiting out rate limits.
    async fn execute(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, PresentationError> {
        let mut attempt = 1;
        loop {
            let response = self.authorized(build()).send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS || attempt >= MAX_ATTEMPTS {
                return Ok(response);
            }

            let retry_after = response
                .json::<RateLimited>()
                .await
                .map(|limit| retry_delay(limit.retry_after))
                .unwrap_or(DEFAULT_RETRY_AFTER);
            warn!("rate limited by discord, retrying in {retry_after:?}");
            tokio::time::sleep(retry_after).await;
            attempt += 1;
        }
    }

    async fn expect_success(response: Response) -> Result<Response, PresentationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PresentationError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn current_user(&self) -> Result<CurrentUser, PresentationError> {
        let url = self.url("/users/@me");
        let response = self.execute(|| self.client.get(&url)).await?;
        let response = Self::expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| PresentationError::Decode(e.to_string()))
    }

    pub async fn channel(&self) -> Result<Channel, PresentationError> {
        let url = self.url(&format!("/channels/{}", self.channel_id));
        let response = self.execute(|| self.client.get(&url)).await?;
        let response = Self::expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| PresentationError::Decode(e.to_string()))
    }

    #[instrument(skip_all)]
    pub async fn create_message(
        &self,
        message: &Message,
    ) -> Result<ArtifactHandle, PresentationError> {
        let url = self.messages_url();
        let response = self
            .execute(|| self.client.post(&url).json(message))
            .await?;
        let response = Self::expect_success(response).await?;
        let created: CreatedMessage = response
            .json()
            .await
            .map_err(|e| PresentationError::Decode(e.to_string()))?;

        Ok(ArtifactHandle(created.id))
    }

    /// Edit an existing message. `Ok(false)` when it no longer exists.
    #[instrument(skip(self, message))]
    pub async fn edit_message(
        &self,
        handle: &ArtifactHandle,
        message: &Message,
    ) -> Result<bool, PresentationError> {
        let url = format!("{}/{}", self.messages_url(), handle);
        let response = self
            .execute(|| self.client.patch(&url).json(message))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response).await?;
        Ok(true)
    }
}

/// Presenter posting host status embeds into one channel.
pub struct DiscordPresenter {
    client: DiscordClient,
    window_hours: u32,
}

impl DiscordPresenter {
    pub fn new(client: DiscordClient, window_hours: u32) -> Self {
        Self {
            client,
            window_hours,
        }
    }

    async fn check_ready(&self) -> Result<(), PresentationError> {
        let user = self.client.current_user().await?;
        info!("logged in as {} ({})", user.username, user.id);

        let channel = self.client.channel().await?;
        info!(
            "posting into channel {} ({})",
            channel.name.as_deref().unwrap_or("unnamed"),
            channel.id
        );
        Ok(())
    }
}

/// Statuses that will not go away by retrying
fn is_fatal(error: &PresentationError) -> bool {
    matches!(
        error,
        PresentationError::Status {
            status: 401 | 403 | 404,
            ..
        }
    )
}

#[async_trait]
impl Presenter for DiscordPresenter {
    async fn wait_until_ready(&self) -> Result<(), PresentationError> {
        let mut backoff = READY_BACKOFF_START;
        loop {
            match self.check_ready().await {
                Ok(()) => return Ok(()),
                Err(e) if is_fatal(&e) => {
                    error!("discord is not usable: {e}");
                    return Err(PresentationError::Fatal(format!(
                        "discord rejected the bot token or channel: {e}"
                    )));
                }
                Err(e) => {
                    warn!("discord not ready ({e}), retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(READY_BACKOFF_MAX);
                }
            }
        }
    }

    fn render_snapshot(
        &self,
        identity: &HostIdentity,
        outcome: &ProbeOutcome,
        window: &UptimeWindow,
    ) -> Message {
        status_message(identity, outcome, window, self.window_hours)
    }

    async fn post_or_update(
        &self,
        message: &Message,
        prior: Option<&ArtifactHandle>,
    ) -> Result<ArtifactHandle, PresentationError> {
        if let Some(handle) = prior {
            if self.client.edit_message(handle, message).await? {
                return Ok(handle.clone());
            }
            debug!("message {handle} is gone, posting a new one");
        }

        self.client.create_message(message).await
    }
}
