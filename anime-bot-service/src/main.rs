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

mod discord;
mod error;
mod games;
mod interactions;
mod mal;
mod render;
mod sessions;
mod views;

use std::{net::SocketAddr, sync::Arc};

use anime_common::{DEFAULT_POOL_LIMIT, MAX_POOL_LIMIT, MIN_POOL_LIMIT, expand_env_vars};
use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    discord::{DiscordClient, InteractionWebhook, SignatureVerifier},
    games::{GuessEngine, HigherLowerEngine, PoolOrder},
    mal::{AnimeSource, MalClient},
    sessions::SessionStore,
    views::ViewRegistry,
};

const DEFAULT_DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";
const DEFAULT_MAL_BASE_URL: &str = "https://api.myanimelist.net/v2";
const DEFAULT_VIEW_TIMEOUT_SECONDS: u32 = 300;
const DEFAULT_HELP_FOOTER: &str = "Powered by MyAnimeList";

#[derive(Debug, Clone)]
struct BotSettings {
    default_pool_limit: u32,
    view_timeout_seconds: u32,
    pool_order: PoolOrder,
    help_footer: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            default_pool_limit: DEFAULT_POOL_LIMIT,
            view_timeout_seconds: DEFAULT_VIEW_TIMEOUT_SECONDS,
            pool_order: PoolOrder::default(),
            help_footer: DEFAULT_HELP_FOOTER.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct BotSettingsFile {
    #[serde(default)]
    default_pool_limit: Option<u32>,
    #[serde(default)]
    view_timeout_seconds: Option<u32>,
    #[serde(default)]
    pool_order: Option<PoolOrder>,
    #[serde(default)]
    help_footer: Option<String>,
}

#[derive(Clone)]
struct AppState {
    verifier: SignatureVerifier,
    source: Arc<dyn AnimeSource>,
    webhook: Arc<dyn InteractionWebhook>,
    guess: GuessEngine,
    higher_lower: HigherLowerEngine,
    sessions: Arc<SessionStore>,
    views: Arc<ViewRegistry>,
    settings: Arc<BotSettings>,
}

impl AppState {
    fn new(
        verifier: SignatureVerifier,
        source: Arc<dyn AnimeSource>,
        webhook: Arc<dyn InteractionWebhook>,
        settings: BotSettings,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let views = ViewRegistry::new(chrono::Duration::seconds(i64::from(
            settings.view_timeout_seconds,
        )));
        Self {
            verifier,
            guess: GuessEngine::new(source.clone(), sessions.clone(), settings.pool_order),
            higher_lower: HigherLowerEngine::new(
                source.clone(),
                sessions.clone(),
                settings.pool_order,
            ),
            source,
            sessions,
            webhook,
            views: Arc::new(views),
            settings: Arc::new(settings),
        }
    }

    fn from_env(discord: DiscordClient) -> anyhow::Result<Self> {
        let public_key = required_env("DISCORD_PUBLIC_KEY")?;
        let verifier = SignatureVerifier::from_hex(&public_key)
            .context("invalid DISCORD_PUBLIC_KEY")?;
        let mal = MalClient::new(
            std::env::var("MAL_BASE_URL")
                .ok()
                .unwrap_or_else(|| DEFAULT_MAL_BASE_URL.to_string()),
            required_env("MAL_CLIENT_ID")?,
        )?;
        let settings = load_settings(std::env::var("ANIME_BOT_CONFIG_PATH").ok().as_deref());
        Ok(Self::new(
            verifier,
            Arc::new(mal),
            Arc::new(discord),
            settings,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "anime_bot_service=debug,tower_http=info".to_string()),
        )
        .init();

    let discord = DiscordClient::new(
        std::env::var("DISCORD_API_BASE_URL")
            .ok()
            .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE_URL.to_string()),
        std::env::var("DISCORD_APPLICATION_ID").ok().unwrap_or_default(),
        normalize_optional_string(std::env::var("DISCORD_BOT_TOKEN").ok()),
    )?;
    if parse_env_bool("ANIME_BOT_REGISTER_COMMANDS", false) {
        discord
            .register_commands()
            .await
            .context("failed to register application commands")?;
    }

    let state = AppState::from_env(discord)?;
    info!(
        default_pool_limit = state.settings.default_pool_limit,
        view_timeout_seconds = state.settings.view_timeout_seconds,
        pool_order = ?state.settings.pool_order,
        "anime-bot-service configured"
    );

    let app = build_router(state);
    let bind_addr = parse_bind_addr("ANIME_BOT_BIND", "0.0.0.0:8095")?;
    info!(%bind_addr, "anime-bot-service listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/interactions", post(interactions::interactions_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

fn required_env(var_name: &str) -> anyhow::Result<String> {
    normalize_optional_string(std::env::var(var_name).ok())
        .with_context(|| format!("{var_name} must be set"))
}

fn load_settings(path: Option<&str>) -> BotSettings {
    let defaults = BotSettings::default();
    let Some(path) = path.map(str::trim).filter(|value| !value.is_empty()) else {
        return defaults;
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read anime-bot config path");
            return defaults;
        }
    };

    let parsed = match serde_yaml::from_str::<BotSettingsFile>(&expand_env_vars(&raw)) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to parse anime-bot config yaml");
            return defaults;
        }
    };

    let default_pool_limit = match parsed.default_pool_limit {
        Some(limit) if (MIN_POOL_LIMIT..=MAX_POOL_LIMIT).contains(&limit) => limit,
        Some(limit) => {
            warn!(path = %path, limit, "default_pool_limit out of range; using default");
            defaults.default_pool_limit
        }
        None => defaults.default_pool_limit,
    };
    let settings = BotSettings {
        default_pool_limit,
        view_timeout_seconds: parsed
            .view_timeout_seconds
            .unwrap_or(defaults.view_timeout_seconds),
        pool_order: parsed.pool_order.unwrap_or(defaults.pool_order),
        help_footer: normalize_optional_string(parsed.help_footer)
            .unwrap_or(defaults.help_footer),
    };
    info!(path = %path, "loaded anime-bot config");
    settings
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
}

fn parse_env_bool(var_name: &str, default: bool) -> bool {
    parse_bool(std::env::var(var_name).ok().as_deref(), default)
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    value
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            if normalized.is_empty() {
                default
            } else {
                !matches!(normalized.as_str(), "0" | "false" | "no" | "off")
            }
        })
        .unwrap_or(default)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": "anime-bot-service",
        "guess_sessions": state.sessions.guess.len(),
        "higher_lower_sessions": state.sessions.higher_lower.len(),
        "live_views": state.views.len(),
    }))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "anime-bot-service request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
