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

//! `POST /interactions`: command parsing, component dispatch and deferred completion.

use anime_common::{AnimeId, Difficulty, ListSort, ListStatus, RankingType, Season, UserId};
use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use tracing::{info, warn};

use crate::{
    ApiError, AppState,
    discord::{Interaction, InteractionKind, InteractionResponse, MessagePayload},
    error::{BotError, BotResult},
    mal::validate_pool_limit,
    render,
    views::{ComponentEvent, Listing, Paginator, SearchSelector, View},
};

const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

const GUESS_GAME: &str = "guessgame";
const HIGHER_LOWER: &str = "higherlower";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Search {
        query: String,
    },
    Anime {
        id: AnimeId,
    },
    List {
        username: String,
        sort: ListSort,
        status: Option<ListStatus>,
    },
    Seasonal {
        year: i32,
        season: Season,
    },
    GuessGame {
        difficulty: Difficulty,
        ranking_type: RankingType,
        limit: u32,
    },
    Guess {
        value: f64,
    },
    HigherLower {
        ranking_type: RankingType,
        limit: u32,
    },
    Help {
        command: Option<String>,
    },
}

impl Command {
    fn game_hint(&self) -> Option<&'static str> {
        match self {
            Command::GuessGame { .. } | Command::Guess { .. } => Some(GUESS_GAME),
            Command::HigherLower { .. } => Some(HIGHER_LOWER),
            _ => None,
        }
    }

    fn parse(interaction: &Interaction, default_limit: u32) -> BotResult<Self> {
        let name = interaction.command_name().unwrap_or_default();
        let command = match name {
            "search" => {
                let query = interaction
                    .option_str("query")
                    .map(str::trim)
                    .filter(|query| !query.is_empty())
                    .ok_or_else(|| {
                        BotError::invalid("Missing search query. Use `/help search` for more info.")
                    })?;
                Command::Search {
                    query: query.to_string(),
                }
            }
            "anime" => {
                let raw = interaction.option_i64("id").ok_or_else(|| {
                    BotError::invalid("Missing anime ID. Use `/help anime` for more info.")
                })?;
                let id = AnimeId::try_from(raw)
                    .ok()
                    .filter(|id| *id > 0)
                    .ok_or_else(|| {
                        BotError::invalid(format!(
                            "Invalid anime ID \"{raw}\". ID must be a positive number. Use `/help anime` for more info."
                        ))
                    })?;
                Command::Anime { id }
            }
            "list" => {
                let username = interaction
                    .option_str("username")
                    .map(str::trim)
                    .filter(|username| !username.is_empty())
                    .ok_or_else(|| {
                        BotError::invalid("Missing username. Use `/help list` for more info.")
                    })?;
                let sort = match interaction.option_str("sort") {
                    None => ListSort::default(),
                    Some(raw) => ListSort::parse(raw).ok_or_else(|| {
                        BotError::invalid(format!(
                            "Cannot sort by \"{raw}\". Use `/help list` for more info."
                        ))
                    })?,
                };
                let status = match interaction.option_str("status") {
                    None => None,
                    Some(raw) => Some(ListStatus::parse(raw).ok_or_else(|| {
                        BotError::invalid(format!(
                            "Invalid status \"{raw}\". Valid options: {}. Use `/help list` for more info.",
                            ListStatus::ALL.map(ListStatus::label).join(", ")
                        ))
                    })?),
                };
                Command::List {
                    username: username.to_string(),
                    sort,
                    status,
                }
            }
            "seasonal" => {
                let year = interaction
                    .option_i64("year")
                    .and_then(|year| i32::try_from(year).ok())
                    .ok_or_else(|| {
                        BotError::invalid("Missing or invalid year. Use `/help seasonal` for more info.")
                    })?;
                let raw = interaction.option_str("season").unwrap_or_default();
                let season = Season::parse(raw).ok_or_else(|| {
                    BotError::invalid(format!(
                        "Invalid season \"{raw}\". Valid options: {}. Use `/help seasonal` for more info.",
                        Season::ALL.map(Season::as_str).join(", ")
                    ))
                })?;
                Command::Seasonal { year, season }
            }
            GUESS_GAME => {
                let difficulty = match interaction.option_str("difficulty") {
                    None => Difficulty::default(),
                    Some(raw) => Difficulty::parse(raw).ok_or_else(|| {
                        BotError::invalid(format!(
                            "Invalid difficulty \"{raw}\". Valid options: {}. Use `/help guessgame` for more info.",
                            Difficulty::ALL.map(Difficulty::as_str).join(", ")
                        ))
                    })?,
                };
                Command::GuessGame {
                    difficulty,
                    ranking_type: parse_ranking_type(interaction, GUESS_GAME)?,
                    limit: parse_limit(interaction, default_limit)?,
                }
            }
            "guess" => {
                let value = interaction.option_f64("value").ok_or_else(|| {
                    BotError::invalid("Missing rating value. Use `/help guess` for more info.")
                })?;
                Command::Guess { value }
            }
            HIGHER_LOWER => Command::HigherLower {
                ranking_type: parse_ranking_type(interaction, HIGHER_LOWER)?,
                limit: parse_limit(interaction, default_limit)?,
            },
            "help" => Command::Help {
                command: interaction.option_str("command").map(str::to_string),
            },
            other => {
                return Err(BotError::invalid(format!(
                    "Unknown command \"{other}\". Use `/help` to see all available commands."
                )));
            }
        };
        Ok(command)
    }
}

fn parse_ranking_type(interaction: &Interaction, command: &str) -> BotResult<RankingType> {
    match interaction.option_str("ranking_type") {
        None => Ok(RankingType::Popularity),
        Some(raw) => RankingType::parse(raw).ok_or_else(|| {
            BotError::invalid(format!(
                "Invalid ranking type \"{raw}\". Valid options: {}. Use `/help {command}` for more info.",
                RankingType::ALL.map(RankingType::as_str).join(", ")
            ))
        }),
    }
}

fn parse_limit(interaction: &Interaction, default_limit: u32) -> BotResult<u32> {
    let Some(raw) = interaction.option_i64("limit") else {
        return Ok(default_limit);
    };
    let limit = u32::try_from(raw).unwrap_or(0);
    validate_pool_limit(limit)?;
    Ok(limit)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub(crate) async fn interactions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InteractionResponse>, ApiError> {
    let (Some(signature), Some(timestamp)) = (
        header_str(&headers, SIGNATURE_HEADER),
        header_str(&headers, TIMESTAMP_HEADER),
    ) else {
        return Err(ApiError::unauthorized("missing request signature"));
    };
    if !state.verifier.verify(signature, timestamp, &body) {
        return Err(ApiError::unauthorized("invalid request signature"));
    }

    let interaction: Interaction = serde_json::from_slice(&body)
        .map_err(|error| ApiError::bad_request(format!("invalid interaction payload: {error}")))?;

    let response = match interaction.kind() {
        InteractionKind::Ping => InteractionResponse::pong(),
        InteractionKind::ApplicationCommand => handle_command(&state, &interaction),
        InteractionKind::MessageComponent => handle_component(&state, &interaction),
        InteractionKind::Other(kind) => {
            return Err(ApiError::bad_request(format!(
                "unsupported interaction type {kind}"
            )));
        }
    };
    Ok(Json(response))
}

fn handle_command(state: &AppState, interaction: &Interaction) -> InteractionResponse {
    let Some(owner) = interaction.user_id() else {
        return InteractionResponse::message(MessagePayload::text(
            "Could not identify who sent this command.",
        ));
    };

    let command = match Command::parse(interaction, state.settings.default_pool_limit) {
        Ok(command) => command,
        Err(error) => {
            info!(
                interaction_id = %interaction.id,
                user_id = owner,
                error = %error,
                "rejected command arguments"
            );
            return InteractionResponse::message(render::error_message(&error, None));
        }
    };
    info!(
        interaction_id = %interaction.id,
        user_id = owner,
        command = interaction.command_name().unwrap_or_default(),
        "handling command"
    );

    match command {
        Command::Guess { value } => {
            let payload = match state.guess.submit_guess(owner, value) {
                Ok(outcome) => render::guess_outcome(&outcome),
                Err(error) => render::error_message(&error, Some(GUESS_GAME)),
            };
            InteractionResponse::message(payload)
        }
        Command::Help { command } => InteractionResponse::message(MessagePayload::embed(
            render::help(command.as_deref(), &state.settings.help_footer),
        )),
        command => {
            spawn_deferred(state.clone(), interaction.token.clone(), owner, command);
            InteractionResponse::deferred()
        }
    }
}

fn spawn_deferred(state: AppState, token: String, owner: UserId, command: Command) {
    tokio::spawn(async move {
        let hint = command.game_hint();
        let payload = match run_command(&state, owner, command).await {
            Ok(payload) => payload,
            Err(error) => {
                warn!(user_id = owner, error = %error, "command failed");
                render::error_message(&error, hint)
            }
        };
        deliver(&state, &token, &payload).await;
    });
}

async fn deliver(state: &AppState, token: &str, payload: &MessagePayload) {
    if let Err(error) = state.webhook.edit_original(token, payload).await {
        warn!(error = %error, "failed to deliver deferred interaction response");
    }
}

async fn run_command(state: &AppState, owner: UserId, command: Command) -> BotResult<MessagePayload> {
    match command {
        Command::Search { query } => {
            let results = state.source.search(&query).await?;
            if results.is_empty() {
                return Ok(render::no_search_results());
            }
            let selector = SearchSelector::new(owner, query, results);
            let view_id = state.views.insert(View::Search(selector.clone()));
            Ok(render::search_results(&selector, view_id))
        }
        Command::Anime { id } => {
            let anime = state.source.fetch_by_id(id).await?;
            Ok(MessagePayload::embed(render::anime_detail(&anime)))
        }
        Command::List {
            username,
            sort,
            status,
        } => {
            let entries = state.source.fetch_user_list(&username, sort, status).await?;
            Ok(register_paginator(
                state,
                Paginator::new(
                    owner,
                    Listing::UserList {
                        username,
                        sort,
                        status,
                        entries,
                    },
                ),
            ))
        }
        Command::Seasonal { year, season } => {
            let entries = state.source.fetch_seasonal(year, season).await?;
            Ok(register_paginator(
                state,
                Paginator::new(
                    owner,
                    Listing::Seasonal {
                        year,
                        season,
                        entries,
                    },
                ),
            ))
        }
        Command::GuessGame {
            difficulty,
            ranking_type,
            limit,
        } => {
            let start = state
                .guess
                .start(owner, difficulty, ranking_type, limit)
                .await?;
            Ok(render::guess_start(&start))
        }
        Command::HigherLower {
            ranking_type,
            limit,
        } => {
            let start = state.higher_lower.start(owner, ranking_type, limit).await?;
            Ok(render::higher_lower_start(owner, &start))
        }
        Command::Guess { .. } | Command::Help { .. } => Err(BotError::Internal(anyhow::anyhow!(
            "inline command routed to deferred completion"
        ))),
    }
}

fn register_paginator(state: &AppState, paginator: Paginator) -> MessagePayload {
    let payload_view = paginator.clone();
    let view_id = state.views.insert(View::Paginator(paginator));
    render::paginator_page(&payload_view, view_id)
}

fn handle_component(state: &AppState, interaction: &Interaction) -> InteractionResponse {
    let Some(actor) = interaction.user_id() else {
        return InteractionResponse::message(
            MessagePayload::text("Could not identify who pressed this.").ephemeral(),
        );
    };
    let custom_id = interaction.custom_id().unwrap_or_default();

    let event = match ComponentEvent::parse(custom_id, interaction.selected_values()) {
        Ok(event) => event,
        Err(error) => {
            warn!(user_id = actor, custom_id, "unrecognized component interaction");
            return InteractionResponse::message(render::error_message(&error, None).ephemeral());
        }
    };

    match event {
        ComponentEvent::PageNav { view_id, nav } => {
            let navigated = state.views.with_view(view_id, |view| match view {
                View::Paginator(paginator) => Ok(paginator
                    .navigate(actor, nav)?
                    .then(|| render::paginator_page(paginator, view_id))),
                View::Search(_) => Err(BotError::invalid("This view cannot be paged.")),
            });
            match navigated {
                Ok(Some(payload)) => InteractionResponse::update(payload),
                Ok(None) => InteractionResponse::deferred_update(),
                Err(error) => component_error(actor, &error, None),
            }
        }
        ComponentEvent::Selection { view_id, index } => {
            let selected = state.views.with_view(view_id, |view| match view {
                View::Search(selector) => selector.select(actor, index),
                View::Paginator(_) => Err(BotError::invalid("This view has nothing to select.")),
            });
            match selected {
                Ok(anime_id) => {
                    info!(user_id = actor, anime_id, "search result selected");
                    spawn_deferred(
                        state.clone(),
                        interaction.token.clone(),
                        actor,
                        Command::Anime { id: anime_id },
                    );
                    InteractionResponse::deferred()
                }
                Err(error) => component_error(actor, &error, None),
            }
        }
        ComponentEvent::Prediction {
            owner,
            game_id,
            direction,
        } => {
            if owner != actor {
                return component_error(actor, &BotError::Unauthorized, None);
            }
            match state
                .higher_lower
                .submit_prediction(owner, game_id, direction)
            {
                Ok(outcome) => {
                    InteractionResponse::update(render::prediction_outcome(owner, &outcome))
                }
                Err(error) => component_error(actor, &error, Some(HIGHER_LOWER)),
            }
        }
    }
}

fn component_error(actor: UserId, error: &BotError, game_hint: Option<&str>) -> InteractionResponse {
    info!(user_id = actor, error = %error, "component interaction rejected");
    InteractionResponse::message(render::error_message(error, game_hint))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anime_common::{AnimeRecord, UserListEntry};
    use async_trait::async_trait;
    use axum::http::{HeaderValue, StatusCode};
    use ed25519_dalek::Signer;

    use super::*;
    use crate::{
        BotSettings,
        discord::{InteractionWebhook, SignatureVerifier, tests::signing_key},
        games::{PoolOrder, tests::StaticAnimeSource},
        views::{PageNav, page_button_id},
    };

    const TIMESTAMP: &str = "1700000000";

    #[derive(Default)]
    struct RecordingWebhook {
        edits: Mutex<Vec<(String, MessagePayload)>>,
    }

    #[async_trait]
    impl InteractionWebhook for RecordingWebhook {
        async fn edit_original(&self, token: &str, payload: &MessagePayload) -> anyhow::Result<()> {
            self.edits
                .lock()
                .unwrap()
                .push((token.to_string(), payload.clone()));
            Ok(())
        }
    }

    fn app_state(source: StaticAnimeSource) -> (AppState, Arc<RecordingWebhook>) {
        let webhook = Arc::new(RecordingWebhook::default());
        let verifier =
            SignatureVerifier::from_hex(&hex::encode(signing_key().verifying_key().to_bytes()))
                .unwrap();
        let settings = BotSettings {
            pool_order: PoolOrder::Ranked,
            ..BotSettings::default()
        };
        let state = AppState::new(verifier, Arc::new(source), webhook.clone(), settings);
        (state, webhook)
    }

    fn catalog_source() -> StaticAnimeSource {
        let mut source =
            StaticAnimeSource::with_ratings(&[Some(7.0), Some(6.5), Some(8.0)]);
        source.catalog = vec![
            AnimeRecord::new(1, "Cowboy Bebop").with_mean(8.75),
            AnimeRecord::new(5, "Cowboy Bebop: Tengoku no Tobira").with_mean(8.38),
        ];
        source.user_list = Some(
            (1..=23)
                .map(|id| UserListEntry {
                    anime: AnimeRecord::new(id, format!("Entry {id:02}")),
                    score: (id % 10) as u8,
                    status: Some(ListStatus::Completed),
                })
                .collect(),
        );
        source
    }

    fn signed_request(body: &serde_json::Value) -> (HeaderMap, Bytes) {
        let bytes = serde_json::to_vec(body).unwrap();
        let signature = signing_key().sign(&[TIMESTAMP.as_bytes(), bytes.as_slice()].concat());
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&hex::encode(signature.to_bytes())).unwrap(),
        );
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static(TIMESTAMP));
        (headers, Bytes::from(bytes))
    }

    fn command(user_id: UserId, name: &str, options: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": "900",
            "type": 2,
            "token": format!("token-{name}"),
            "member": {"user": {"id": user_id.to_string()}},
            "data": {"name": name, "options": options}
        })
    }

    fn component(user_id: UserId, custom_id: &str, values: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "id": "901",
            "type": 3,
            "token": "token-component",
            "member": {"user": {"id": user_id.to_string()}},
            "data": {"custom_id": custom_id, "component_type": 2, "values": values}
        })
    }

    async fn send(state: &AppState, body: serde_json::Value) -> InteractionResponse {
        let (headers, bytes) = signed_request(&body);
        interactions_handler(State(state.clone()), headers, bytes)
            .await
            .unwrap()
            .0
    }

    async fn wait_for_edits(webhook: &RecordingWebhook, count: usize) -> Vec<MessagePayload> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if webhook.edits.lock().unwrap().len() >= count {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("deferred response was never delivered");
        webhook
            .edits
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    fn custom_ids(payload: &MessagePayload) -> Vec<String> {
        payload
            .components
            .iter()
            .flat_map(|row| row.components.iter().map(|c| c.custom_id.clone()))
            .collect()
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (state, _) = app_state(catalog_source());
        let response = send(&state, serde_json::json!({"id": "1", "type": 1})).await;
        assert_eq!(response, InteractionResponse::pong());
    }

    #[tokio::test]
    async fn unsigned_or_tampered_requests_are_rejected() {
        let (state, _) = app_state(catalog_source());

        let error = interactions_handler(
            State(state.clone()),
            HeaderMap::new(),
            Bytes::from_static(br#"{"type":1}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);

        let (headers, _) = signed_request(&serde_json::json!({"type": 1}));
        let error = interactions_handler(
            State(state),
            headers,
            Bytes::from_static(br#"{"type":2}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signed_garbage_is_a_bad_request() {
        let (state, _) = app_state(catalog_source());
        let bytes = b"not json".to_vec();
        let signature = signing_key().sign(&[TIMESTAMP.as_bytes(), bytes.as_slice()].concat());
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&hex::encode(signature.to_bytes())).unwrap(),
        );
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static(TIMESTAMP));

        let error = interactions_handler(State(state), headers, Bytes::from(bytes))
            .await
            .unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn help_and_argument_errors_answer_inline() {
        let (state, webhook) = app_state(catalog_source());

        let response = send(
            &state,
            command(1, "help", serde_json::json!([{"name": "command", "value": "seasonal"}])),
        )
        .await;
        assert_eq!(response.kind, 4);
        let embed = &response.data.as_ref().unwrap().embeds[0];
        assert_eq!(embed.title.as_deref(), Some("📖 Help: /seasonal"));

        let response = send(
            &state,
            command(1, "guessgame", serde_json::json!([{"name": "limit", "value": 2501}])),
        )
        .await;
        assert_eq!(response.kind, 4);
        assert!(
            response.data.unwrap().content.unwrap().contains("between 1-2500")
        );
        assert!(webhook.edits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn guess_without_game_points_to_guessgame() {
        let (state, _) = app_state(catalog_source());
        let response = send(
            &state,
            command(1, "guess", serde_json::json!([{"name": "value", "value": 8.0}])),
        )
        .await;
        assert_eq!(
            response.data.unwrap().content.as_deref(),
            Some("You have no game running. Start a new one with /guessgame")
        );
    }

    #[tokio::test]
    async fn guess_game_runs_through_deferred_start_and_inline_guesses() {
        let (state, webhook) = app_state(catalog_source());

        let response = send(
            &state,
            command(
                3,
                "guessgame",
                serde_json::json!([
                    {"name": "difficulty", "value": "easy"},
                    {"name": "limit", "value": 3}
                ]),
            ),
        )
        .await;
        assert_eq!(response, InteractionResponse::deferred());

        let edits = wait_for_edits(&webhook, 1).await;
        let prompt = &edits[0].embeds[0];
        assert_eq!(prompt.title.as_deref(), Some("Guess The Rating Game"));
        assert_eq!(prompt.field_value("Anime"), Some("Anime 1"));
        assert_eq!(webhook.edits.lock().unwrap()[0].0, "token-guessgame");

        let response = send(
            &state,
            command(3, "guess", serde_json::json!([{"name": "value", "value": 7.4}])),
        )
        .await;
        let embed = &response.data.unwrap().embeds[0];
        assert_eq!(embed.title.as_deref(), Some("✓ Correct!"));
        assert_eq!(embed.field_value("Current Score"), Some("1"));

        // Another player's guess only addresses their own (missing) session.
        let response = send(
            &state,
            command(4, "guess", serde_json::json!([{"name": "value", "value": 6.5}])),
        )
        .await;
        assert!(response.data.unwrap().content.unwrap().contains("/guessgame"));
    }

    #[tokio::test]
    async fn remote_failures_are_delivered_as_friendly_text() {
        let (state, webhook) = app_state(StaticAnimeSource::default());
        send(
            &state,
            command(1, "anime", serde_json::json!([{"name": "id", "value": 404}])),
        )
        .await;
        let edits = wait_for_edits(&webhook, 1).await;
        assert_eq!(
            edits[0].content.as_deref(),
            Some("Anime with ID 404 was not found.")
        );
    }

    #[tokio::test]
    async fn list_paginator_navigates_for_owner_only() {
        let (state, webhook) = app_state(catalog_source());
        send(
            &state,
            command(
                1,
                "list",
                serde_json::json!([
                    {"name": "username", "value": "nelly"},
                    {"name": "sort", "value": "score"}
                ]),
            ),
        )
        .await;
        let edits = wait_for_edits(&webhook, 1).await;
        let first = &edits[0];
        assert!(first.embeds[0].description.as_deref().unwrap().contains("Page 1/3"));

        let next_id = custom_ids(first)
            .into_iter()
            .find(|id| id.ends_with(":next"))
            .unwrap();

        let response = send(&state, component(2, &next_id, &[])).await;
        let notice = response.data.unwrap();
        assert!(notice.is_ephemeral());
        assert_eq!(notice.content.as_deref(), Some("This is not your session."));

        let response = send(&state, component(1, &next_id, &[])).await;
        assert_eq!(response.kind, 7);
        let page = response.data.unwrap();
        assert!(page.embeds[0].description.as_deref().unwrap().contains("Page 2/3"));

        let last_id = next_id.replace(":next", &format!(":{}", PageNav::Forward5.as_str()));
        send(&state, component(1, &last_id, &[])).await;
        let response = send(&state, component(1, &next_id, &[])).await;
        assert_eq!(response, InteractionResponse::deferred_update());
    }

    #[tokio::test]
    async fn unknown_view_reports_expiry() {
        let (state, _) = app_state(catalog_source());
        let custom_id = page_button_id(uuid::Uuid::new_v4(), PageNav::Next);
        let response = send(&state, component(1, &custom_id, &[])).await;
        let payload = response.data.unwrap();
        assert!(payload.is_ephemeral());
        assert!(payload.content.unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn search_selection_opens_detail_view() {
        let (state, webhook) = app_state(catalog_source());
        send(
            &state,
            command(1, "search", serde_json::json!([{"name": "query", "value": "bebop"}])),
        )
        .await;
        let edits = wait_for_edits(&webhook, 1).await;
        let menu_id = custom_ids(&edits[0]).remove(0);
        assert!(menu_id.starts_with("select:"));

        let response = send(&state, component(2, &menu_id, &["1"])).await;
        assert!(response.data.unwrap().is_ephemeral());

        let response = send(&state, component(1, &menu_id, &["1"])).await;
        assert_eq!(response, InteractionResponse::deferred());
        let edits = wait_for_edits(&webhook, 2).await;
        let detail = &edits[1].embeds[0];
        assert_eq!(detail.field_value("ID"), Some("5"));
    }

    #[tokio::test]
    async fn empty_search_says_so() {
        let (state, webhook) = app_state(catalog_source());
        send(
            &state,
            command(1, "search", serde_json::json!([{"name": "query", "value": "nothing like this"}])),
        )
        .await;
        let edits = wait_for_edits(&webhook, 1).await;
        assert_eq!(edits[0].content.as_deref(), Some("No anime found."));
    }

    #[tokio::test]
    async fn higher_lower_buttons_drive_the_game() {
        let (state, webhook) = app_state(catalog_source());
        send(
            &state,
            command(7, "higherlower", serde_json::json!([{"name": "limit", "value": 3}])),
        )
        .await;
        let edits = wait_for_edits(&webhook, 1).await;
        let ids = custom_ids(&edits[0]);
        assert_eq!(ids.len(), 2);
        assert!(ids[0].starts_with("hl:7:") && ids[0].ends_with(":higher"));
        assert!(ids[1].starts_with("hl:7:") && ids[1].ends_with(":lower"));

        let lower = ids[1].clone();
        let response = send(&state, component(8, &lower, &[])).await;
        assert!(response.data.unwrap().is_ephemeral());

        let response = send(&state, component(7, &lower, &[])).await;
        assert_eq!(response.kind, 7);
        let payload = response.data.unwrap();
        assert_eq!(payload.embeds[0].field_value("Streak"), Some("1"));
        assert_eq!(payload.components.len(), 1);

        let higher = custom_ids(&payload).remove(0);
        assert_eq!(higher, ids[0]);
        let response = send(&state, component(7, &higher, &[])).await;
        let payload = response.data.unwrap();
        assert_eq!(payload.embeds[0].field_value("Final Streak"), Some("2"));
        assert!(payload.components.is_empty());

        let response = send(&state, component(7, &higher, &[])).await;
        assert!(response.data.unwrap().content.unwrap().contains("/higherlower"));
    }

    #[tokio::test]
    async fn buttons_from_a_replaced_game_are_expired() {
        let (state, webhook) = app_state(catalog_source());
        let start = command(7, "higherlower", serde_json::json!([{"name": "limit", "value": 3}]));
        send(&state, start.clone()).await;
        let edits = wait_for_edits(&webhook, 1).await;
        let stale_lower = custom_ids(&edits[0]).remove(1);

        send(&state, start).await;
        let edits = wait_for_edits(&webhook, 2).await;
        let fresh_lower = custom_ids(&edits[1]).remove(1);
        assert_ne!(stale_lower, fresh_lower);

        let response = send(&state, component(7, &stale_lower, &[])).await;
        let notice = response.data.unwrap();
        assert!(notice.is_ephemeral());
        assert!(notice.content.unwrap().contains("expired"));

        let response = send(&state, component(7, &fresh_lower, &[])).await;
        assert_eq!(response.kind, 7);
        let payload = response.data.unwrap();
        assert_eq!(payload.embeds[0].field_value("Streak"), Some("1"));
    }

    #[test]
    fn command_parsing_applies_defaults_and_aliases() {
        let interaction: Interaction = serde_json::from_value(command(
            1,
            "higherlower",
            serde_json::json!([{"name": "ranking_type", "value": "bypopularity"}]),
        ))
        .unwrap();
        assert_eq!(
            Command::parse(&interaction, 500).unwrap(),
            Command::HigherLower {
                ranking_type: RankingType::Popularity,
                limit: 500
            }
        );

        let interaction: Interaction = serde_json::from_value(command(
            1,
            "list",
            serde_json::json!([
                {"name": "username", "value": "nelly"},
                {"name": "status", "value": "plan to watch"}
            ]),
        ))
        .unwrap();
        assert_eq!(
            Command::parse(&interaction, 500).unwrap(),
            Command::List {
                username: "nelly".to_string(),
                sort: ListSort::Title,
                status: Some(ListStatus::PlanToWatch)
            }
        );
    }

    #[test]
    fn command_parsing_rejects_bad_arguments() {
        let cases = [
            command(1, "search", serde_json::json!([{"name": "query", "value": "  "}])),
            command(1, "anime", serde_json::json!([{"name": "id", "value": -3}])),
            command(1, "list", serde_json::json!([{"name": "username", "value": "a"}, {"name": "sort", "value": "date"}])),
            command(1, "seasonal", serde_json::json!([{"name": "year", "value": 2024}, {"name": "season", "value": "autumn"}])),
            command(1, "guessgame", serde_json::json!([{"name": "difficulty", "value": "brutal"}])),
            command(1, "higherlower", serde_json::json!([{"name": "limit", "value": 0}])),
            command(1, "guess", serde_json::json!([])),
            command(1, "dance", serde_json::json!([])),
        ];
        for case in cases {
            let interaction: Interaction = serde_json::from_value(case.clone()).unwrap();
            assert!(
                matches!(
                    Command::parse(&interaction, 500),
                    Err(BotError::InvalidArgument(_))
                ),
                "{case} should be rejected"
            );
        }
    }
}
