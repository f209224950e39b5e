// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Discord interaction wire types, request signing and the REST calls the bot makes.

use std::time::Duration;

use anime_common::{
    Difficulty, ListSort, ListStatus, MAX_POOL_LIMIT, MAX_RATING, MIN_POOL_LIMIT, MIN_RATING,
    RankingType, Season, UserId,
};
use anyhow::Context;
use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

pub const EPHEMERAL_FLAG: u64 = 1 << 6;

pub const COLOR_GREEN: u32 = 0x2ECC71;
pub const COLOR_BLUE: u32 = 0x3498DB;
pub const COLOR_PURPLE: u32 = 0x9B59B6;
pub const COLOR_GOLD: u32 = 0xF1C40F;
pub const COLOR_RED: u32 = 0xE74C3C;
pub const COLOR_BLURPLE: u32 = 0x5865F2;

const SELECT_LABEL_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Ping,
    ApplicationCommand,
    MessageComponent,
    Other(u8),
}

impl From<u8> for InteractionKind {
    fn from(value: u8) -> Self {
        match value {
            1 => InteractionKind::Ping,
            2 => InteractionKind::ApplicationCommand,
            3 => InteractionKind::MessageComponent,
            other => InteractionKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        InteractionKind::from(self.kind)
    }

    /// Guild interactions carry the user inside `member`, direct messages carry it at the top level.
    pub fn user_id(&self) -> Option<UserId> {
        self.member
            .as_ref()
            .and_then(|member| member.user.as_ref())
            .or(self.user.as_ref())
            .and_then(|user| user.id.parse().ok())
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().and_then(|data| data.name.as_deref())
    }

    pub fn custom_id(&self) -> Option<&str> {
        self.data.as_ref().and_then(|data| data.custom_id.as_deref())
    }

    pub fn selected_values(&self) -> &[String] {
        self.data
            .as_ref()
            .map(|data| data.values.as_slice())
            .unwrap_or_default()
    }

    fn option(&self, name: &str) -> Option<&Value> {
        self.data
            .as_ref()?
            .options
            .iter()
            .find(|option| option.name == name)?
            .value
            .as_ref()
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.option(name).and_then(Value::as_str)
    }

    pub fn option_i64(&self, name: &str) -> Option<i64> {
        self.option(name).and_then(Value::as_i64)
    }

    pub fn option_f64(&self, name: &str) -> Option<f64> {
        self.option(name).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MessagePayload>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self { kind: 1, data: None }
    }

    pub fn message(payload: MessagePayload) -> Self {
        Self {
            kind: 4,
            data: Some(payload),
        }
    }

    /// "Thinking..." placeholder, replaced later through the webhook.
    pub fn deferred() -> Self {
        Self { kind: 5, data: None }
    }

    /// Acknowledges a component press without touching the message.
    pub fn deferred_update() -> Self {
        Self { kind: 6, data: None }
    }

    pub fn update(payload: MessagePayload) -> Self {
        Self {
            kind: 7,
            data: Some(payload),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub components: Vec<ActionRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl MessagePayload {
    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Self::default()
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn with_row(mut self, row: ActionRow) -> Self {
        self.components.push(row);
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.flags = Some(EPHEMERAL_FLAG);
        self
    }

    pub fn is_ephemeral(&self) -> bool {
        self.flags.is_some_and(|flags| flags & EPHEMERAL_FLAG != 0)
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
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
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

impl Embed {
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: Some(title.into()),
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn image(mut self, url: Option<&str>) -> Self {
        self.image = url.map(|url| EmbedImage {
            url: url.to_string(),
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    #[cfg(test)]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Component>,
}

impl ActionRow {
    pub fn new(components: Vec<Component>) -> Self {
        Self {
            kind: 1,
            components,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Component {
    #[serde(rename = "type")]
    kind: u8,
    pub custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<u8>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u8>,
}

impl Component {
    pub fn button(
        custom_id: impl Into<String>,
        label: impl Into<String>,
        style: ButtonStyle,
        disabled: bool,
    ) -> Self {
        Self {
            kind: 2,
            custom_id: custom_id.into(),
            label: Some(label.into()),
            style: Some(style as u8),
            disabled,
            placeholder: None,
            options: Vec::new(),
            min_values: None,
            max_values: None,
        }
    }

    pub fn select(
        custom_id: impl Into<String>,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Self {
            kind: 3,
            custom_id: custom_id.into(),
            label: None,
            style: None,
            disabled: false,
            placeholder: Some(placeholder.into()),
            options,
            min_values: Some(1),
            max_values: Some(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: anime_common::truncate_chars(label, SELECT_LABEL_MAX_CHARS),
            value: value.into(),
        }
    }
}

/// Checks the ed25519 signature Discord puts on every interaction request.
#[derive(Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn from_hex(public_key: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(public_key.trim()).context("public key is not valid hex")?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("public key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&bytes).context("invalid ed25519 public key")?;
        Ok(Self { key })
    }

    pub fn verify(&self, signature_hex: &str, timestamp: &str, body: &[u8]) -> bool {
        let Ok(signature_bytes) = hex::decode(signature_hex.trim()) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&signature_bytes) else {
            return false;
        };

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &signature).is_ok()
    }
}

/// Follow-up channel for interactions that were answered with a deferred response.
#[async_trait]
pub trait InteractionWebhook: Send + Sync {
    async fn edit_original(&self, token: &str, payload: &MessagePayload) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct DiscordClient {
    client: reqwest::Client,
    api_base_url: String,
    application_id: String,
    bot_token: Option<String>,
}

impl DiscordClient {
    pub fn new(
        api_base_url: impl Into<String>,
        application_id: impl Into<String>,
        bot_token: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build discord http client")?;
        Ok(Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            application_id: application_id.into(),
            bot_token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    /// Replaces the global command set with [`command_definitions`].
    pub async fn register_commands(&self) -> anyhow::Result<usize> {
        let token = self
            .bot_token
            .as_deref()
            .context("DISCORD_BOT_TOKEN is required to register commands")?;
        let definitions = command_definitions();
        let count = definitions.as_array().map_or(0, Vec::len);

        let response = self
            .client
            .put(self.endpoint(&format!("applications/{}/commands", self.application_id)))
            .header("Authorization", format!("Bot {token}"))
            .json(&definitions)
            .send()
            .await
            .context("failed to call discord command registration")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_string());
            anyhow::bail!("discord returned {status} while registering commands: {body}");
        }

        info!(count, "registered application commands");
        Ok(count)
    }
}

#[async_trait]
impl InteractionWebhook for DiscordClient {
    async fn edit_original(&self, token: &str, payload: &MessagePayload) -> anyhow::Result<()> {
        let url = self.endpoint(&format!(
            "webhooks/{}/{token}/messages/@original",
            self.application_id
        ));
        let response = self
            .client
            .patch(&url)
            .json(payload)
            .send()
            .await
            .context("failed to edit original interaction response")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_string());
            anyhow::bail!("discord returned {status} while editing response: {body}");
        }

        debug!("edited original interaction response");
        Ok(())
    }
}

fn choices(values: impl IntoIterator<Item = &'static str>) -> Vec<Value> {
    values
        .into_iter()
        .map(|value| serde_json::json!({"name": value, "value": value}))
        .collect()
}

/// Longest query the search command accepts.
pub const SEARCH_QUERY_MAX_CHARS: usize = 200;

/// Slash command set registered with Discord.
pub fn command_definitions() -> Value {
    const STRING: u8 = 3;
    const INTEGER: u8 = 4;
    const NUMBER: u8 = 10;

    let ranking_types = choices(RankingType::ALL.map(RankingType::as_str));
    let difficulties = choices(Difficulty::ALL.map(Difficulty::as_str));
    let seasons = choices(Season::ALL.map(Season::as_str));
    let sorts = choices(ListSort::ALL.map(ListSort::as_str));
    let statuses = choices(ListStatus::ALL.map(ListStatus::as_str));

    serde_json::json!([
        {
            "name": "search",
            "description": "Search MyAnimeList for anime by title",
            "options": [
                {"type": STRING, "name": "query", "description": "Anime title to search for", "required": true, "max_length": SEARCH_QUERY_MAX_CHARS}
            ]
        },
        {
            "name": "anime",
            "description": "Get detailed information for an anime by ID",
            "options": [
                {"type": INTEGER, "name": "id", "description": "MyAnimeList anime ID", "required": true, "min_value": 1}
            ]
        },
        {
            "name": "list",
            "description": "View a user's anime list with pagination",
            "options": [
                {"type": STRING, "name": "username", "description": "MyAnimeList username", "required": true},
                {"type": STRING, "name": "sort", "description": "Sort order", "choices": sorts},
                {"type": STRING, "name": "status", "description": "Only show entries with this status", "choices": statuses}
            ]
        },
        {
            "name": "seasonal",
            "description": "View anime from a specific season",
            "options": [
                {"type": INTEGER, "name": "year", "description": "Year, e.g. 2024", "required": true},
                {"type": STRING, "name": "season", "description": "Season", "required": true, "choices": seasons}
            ]
        },
        {
            "name": "guessgame",
            "description": "Start the guess-the-rating game",
            "options": [
                {"type": STRING, "name": "difficulty", "description": "Difficulty", "choices": difficulties},
                {"type": INTEGER, "name": "limit", "description": "Anime pool size", "min_value": MIN_POOL_LIMIT, "max_value": MAX_POOL_LIMIT},
                {"type": STRING, "name": "ranking_type", "description": "Ranking the pool is drawn from", "choices": ranking_types.clone()}
            ]
        },
        {
            "name": "guess",
            "description": "Submit your rating guess",
            "options": [
                {"type": NUMBER, "name": "value", "description": "Your rating guess (0-10)", "required": true, "min_value": MIN_RATING, "max_value": MAX_RATING}
            ]
        },
        {
            "name": "higherlower",
            "description": "Play the higher or lower rating game",
            "options": [
                {"type": INTEGER, "name": "limit", "description": "Anime pool size", "min_value": MIN_POOL_LIMIT, "max_value": MAX_POOL_LIMIT},
                {"type": STRING, "name": "ranking_type", "description": "Ranking the pool is drawn from", "choices": ranking_types}
            ]
        },
        {
            "name": "help",
            "description": "Display help information for commands",
            "options": [
                {"type": STRING, "name": "command", "description": "Command name to get help for"}
            ]
        }
    ])
}
