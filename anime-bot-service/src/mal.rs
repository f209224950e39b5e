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

//! Remote data client for the MyAnimeList v2 API.

use std::time::Duration;

use anime_common::{
    AnimeId, AnimeRecord, ListSort, ListStatus, MAX_POOL_LIMIT, MIN_POOL_LIMIT, RankingType,
    RelatedAnime, SEARCH_RESULT_LIMIT, Season, UserListEntry, sort_user_list,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::error::{BotError, BotResult};

const SEARCH_FIELDS: &str = "id,title,main_picture,synopsis,start_date,alternative_titles,mean";
const DETAIL_FIELDS: &str = "synopsis,main_picture,status,genres,related_anime,studios,\
num_episodes,mean,rank,start_date,end_date,alternative_titles";
const LIST_FIELDS: &str = "list_status,synopsis,main_picture,alternative_titles,mean";
const RANKING_FIELDS: &str = "rank,mean,main_picture,alternative_titles";

const RANKING_PAGE_SIZE: u32 = 500;
const SEASONAL_PAGE_SIZE: u32 = 500;
const USER_LIST_PAGE_SIZE: u32 = 100;
const EARLIEST_SEASON_YEAR: i32 = 1917;

/// Lookup operations against the anime database.
///
/// Implementations never cache; every call goes upstream.
#[async_trait]
pub trait AnimeSource: Send + Sync {
    async fn search(&self, query: &str) -> BotResult<Vec<AnimeRecord>>;

    async fn fetch_by_id(&self, id: AnimeId) -> BotResult<AnimeRecord>;

    async fn fetch_user_list(
        &self,
        username: &str,
        sort: ListSort,
        status: Option<ListStatus>,
    ) -> BotResult<Vec<UserListEntry>>;

    async fn fetch_seasonal(&self, year: i32, season: Season) -> BotResult<Vec<AnimeRecord>>;

    /// Best ranked first. `limit` must already be within the pool bounds.
    async fn fetch_ranking(
        &self,
        ranking_type: RankingType,
        limit: u32,
    ) -> BotResult<Vec<AnimeRecord>>;
}

#[derive(Clone)]
pub struct MalClient {
    client: reqwest::Client,
    base_url: Url,
    client_id: String,
}

impl MalClient {
    pub fn new(base_url: impl AsRef<str>, client_id: impl Into<String>) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.as_ref()).context("invalid MyAnimeList base url")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("MyAnimeList base url {base_url} cannot carry a path");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build MyAnimeList http client")?;
        Ok(Self {
            client,
            base_url,
            client_id: client_id.into(),
        })
    }

    /// Appends each segment percent-encoded, so user input never changes the route.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `Ok(None)` when upstream says the resource does not exist or is not public.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, String)],
    ) -> BotResult<Option<T>> {
        let url = self.endpoint(path);
        let response = self
            .client
            .get(url.clone())
            .header("X-MAL-Client-ID", &self.client_id)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|error| {
                warn!(url = %url, error = %error, "MyAnimeList request failed");
                BotError::remote(error)
            })?;

        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::FORBIDDEN) {
            debug!(url = %url, %status, "MyAnimeList resource not available");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, %status, body = %body, "MyAnimeList returned an error status");
            return Err(BotError::remote(format!("MyAnimeList returned {status}")));
        }

        response.json::<T>().await.map(Some).map_err(|error| {
            warn!(url = %url, error = %error, "invalid MyAnimeList payload");
            BotError::remote(error)
        })
    }

    /// Walks upstream offset pages until `max_items` are collected or a short page arrives.
    async fn fetch_paged(
        &self,
        path: &[&str],
        base_query: &[(&str, String)],
        page_size: u32,
        max_items: Option<u32>,
    ) -> BotResult<Option<Vec<MalEntry>>> {
        let mut collected = Vec::new();
        let mut offset = 0_u32;
        let mut remaining = max_items;

        loop {
            let batch = remaining.map_or(page_size, |left| left.min(page_size));
            if batch == 0 {
                break;
            }

            let mut query = base_query.to_vec();
            query.push(("limit", batch.to_string()));
            query.push(("offset", offset.to_string()));

            let Some(page) = self.get_json::<MalPage>(path, &query).await? else {
                if offset == 0 {
                    return Ok(None);
                }
                break;
            };

            let received = page.data.len() as u32;
            collected.extend(page.data);
            if received < batch {
                break;
            }

            offset += batch;
            remaining = remaining.map(|left| left - batch);
        }

        Ok(Some(collected))
    }
}

#[async_trait]
impl AnimeSource for MalClient {
    async fn search(&self, query: &str) -> BotResult<Vec<AnimeRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BotError::invalid(
                "Missing search query. Use `/help search` for more info.",
            ));
        }

        let params = [
            ("q", query.to_string()),
            ("limit", SEARCH_RESULT_LIMIT.to_string()),
            ("offset", "0".to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
        ];
        let page = self.get_json::<MalPage>(&["anime"], &params).await?;
        Ok(page
            .map(|page| page.data)
            .unwrap_or_default()
            .into_iter()
            .take(SEARCH_RESULT_LIMIT)
            .map(|entry| AnimeRecord::from(entry.node))
            .collect())
    }

    async fn fetch_by_id(&self, id: AnimeId) -> BotResult<AnimeRecord> {
        let params = [("fields", DETAIL_FIELDS.to_string())];
        self.get_json::<MalAnime>(&["anime", &id.to_string()], &params)
            .await?
            .map(AnimeRecord::from)
            .ok_or_else(|| BotError::not_found(format!("Anime with ID {id} was not found.")))
    }

    async fn fetch_user_list(
        &self,
        username: &str,
        sort: ListSort,
        status: Option<ListStatus>,
    ) -> BotResult<Vec<UserListEntry>> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BotError::invalid(
                "Missing username. Use `/help list` for more info.",
            ));
        }

        let mut params = vec![("fields", LIST_FIELDS.to_string())];
        if let Some(status) = status {
            params.push(("status", status.as_str().to_string()));
        }

        let entries = self
            .fetch_paged(
                &["users", username, "animelist"],
                &params,
                USER_LIST_PAGE_SIZE,
                None,
            )
            .await?
            .ok_or_else(|| {
                BotError::not_found(format!(
                    "Could not find a public anime list for \"{username}\"."
                ))
            })?;

        let mut list: Vec<UserListEntry> = entries
            .into_iter()
            .map(|entry| {
                let list_status = entry.list_status.unwrap_or_default();
                UserListEntry {
                    anime: AnimeRecord::from(entry.node),
                    score: list_status.score,
                    status: list_status.status.as_deref().and_then(ListStatus::parse),
                }
            })
            .collect();
        sort_user_list(&mut list, sort);
        Ok(list)
    }

    async fn fetch_seasonal(&self, year: i32, season: Season) -> BotResult<Vec<AnimeRecord>> {
        let latest = Utc::now().year() + 1;
        if !(EARLIEST_SEASON_YEAR..=latest).contains(&year) {
            return Err(BotError::invalid(format!(
                "Year must be between {EARLIEST_SEASON_YEAR} and {latest}. Use `/help seasonal` for more info."
            )));
        }

        let params = [
            ("fields", RANKING_FIELDS.to_string()),
            ("sort", "anime_num_list_users".to_string()),
        ];
        let entries = self
            .fetch_paged(
                &["anime", "season", &year.to_string(), season.as_str()],
                &params,
                SEASONAL_PAGE_SIZE,
                None,
            )
            .await?
            .unwrap_or_default();
        Ok(entries
            .into_iter()
            .map(|entry| AnimeRecord::from(entry.node))
            .collect())
    }

    async fn fetch_ranking(
        &self,
        ranking_type: RankingType,
        limit: u32,
    ) -> BotResult<Vec<AnimeRecord>> {
        validate_pool_limit(limit)?;

        let params = [
            ("ranking_type", ranking_type.upstream_name().to_string()),
            ("fields", RANKING_FIELDS.to_string()),
        ];
        let entries = self
            .fetch_paged(&["anime", "ranking"], &params, RANKING_PAGE_SIZE, Some(limit))
            .await?
            .unwrap_or_default();

        let mut records: Vec<AnimeRecord> = entries
            .into_iter()
            .map(|entry| {
                let rank = entry.ranking.map(|ranking| ranking.rank);
                let mut record = AnimeRecord::from(entry.node);
                record.rank = record.rank.or(rank);
                record
            })
            .collect();
        records.sort_by_key(|record| record.rank.unwrap_or(u32::MAX));
        Ok(records)
    }
}

pub fn validate_pool_limit(limit: u32) -> BotResult<()> {
    if (MIN_POOL_LIMIT..=MAX_POOL_LIMIT).contains(&limit) {
        Ok(())
    } else {
        Err(BotError::invalid(format!(
            "Limit must be a number between {MIN_POOL_LIMIT}-{MAX_POOL_LIMIT}."
        )))
    }
}

#[derive(Debug, Deserialize)]
struct MalPage {
    #[serde(default)]
    data: Vec<MalEntry>,
}

#[derive(Debug, Deserialize)]
struct MalEntry {
    node: MalAnime,
    #[serde(default)]
    list_status: Option<MalListStatus>,
    #[serde(default)]
    ranking: Option<MalRanking>,
}

#[derive(Debug, Default, Deserialize)]
struct MalListStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    score: u8,
}

#[derive(Debug, Deserialize)]
struct MalRanking {
    rank: u32,
}

#[derive(Debug, Deserialize)]
struct MalNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MalPicture {
    #[serde(default)]
    medium: Option<String>,
    #[serde(default)]
    large: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MalAlternativeTitles {
    #[serde(default)]
    en: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MalAnimeRef {
    id: AnimeId,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct MalRelated {
    node: MalAnimeRef,
    #[serde(default)]
    relation_type: String,
}

#[derive(Debug, Deserialize)]
struct MalAnime {
    id: AnimeId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    alternative_titles: Option<MalAlternativeTitles>,
    #[serde(default)]
    mean: Option<f64>,
    #[serde(default)]
    genres: Vec<MalNamed>,
    #[serde(default)]
    studios: Vec<MalNamed>,
    #[serde(default)]
    synopsis: Option<String>,
    #[serde(default)]
    related_anime: Vec<MalRelated>,
    #[serde(default)]
    main_picture: Option<MalPicture>,
    #[serde(default)]
    num_episodes: Option<u32>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    rank: Option<u32>,
}

impl From<MalAnime> for AnimeRecord {
    fn from(anime: MalAnime) -> Self {
        AnimeRecord {
            id: anime.id,
            title: anime.title,
            english_title: anime
                .alternative_titles
                .and_then(|titles| titles.en)
                .filter(|title| !title.trim().is_empty()),
            mean: anime.mean,
            genres: anime.genres.into_iter().map(|genre| genre.name).collect(),
            studios: anime.studios.into_iter().map(|studio| studio.name).collect(),
            synopsis: anime.synopsis.unwrap_or_default(),
            related: anime
                .related_anime
                .into_iter()
                .map(|related| RelatedAnime {
                    id: related.node.id,
                    title: related.node.title,
                    relation: related.relation_type,
                })
                .collect(),
            picture_url: anime
                .main_picture
                .and_then(|picture| picture.large.or(picture.medium)),
            num_episodes: anime.num_episodes.filter(|episodes| *episodes > 0),
            status: anime.status,
            start_date: anime.start_date,
            end_date: anime.end_date,
            rank: anime.rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> MalClient {
        MalClient::new("http://127.0.0.1:9/v2/", "test-client").unwrap()
    }

    #[test]
    fn detail_payload_maps_to_record() {
        let payload = serde_json::json!({
            "id": 5114,
            "title": "Hagane no Renkinjutsushi: Fullmetal Alchemist",
            "alternative_titles": {"en": "Fullmetal Alchemist: Brotherhood", "ja": "鋼の錬金術師"},
            "mean": 9.1,
            "genres": [{"id": 1, "name": "Action"}, {"id": 2, "name": "Adventure"}, {"id": 1, "name": "Action"}],
            "studios": [{"id": 4, "name": "Bones"}],
            "synopsis": "After a horrific alchemy experiment goes wrong...",
            "related_anime": [
                {"node": {"id": 121, "title": "Fullmetal Alchemist"}, "relation_type": "alternative_version"}
            ],
            "main_picture": {"medium": "https://cdn/m.jpg", "large": "https://cdn/l.jpg"},
            "num_episodes": 64,
            "status": "finished_airing",
            "start_date": "2009-04-05",
            "end_date": "2010-07-04",
            "rank": 1
        });

        let anime: MalAnime = serde_json::from_value(payload).unwrap();
        let record = AnimeRecord::from(anime);

        assert_eq!(record.id, 5114);
        assert_eq!(record.english_title.as_deref(), Some("Fullmetal Alchemist: Brotherhood"));
        assert_eq!(record.mean, Some(9.1));
        assert_eq!(record.genres.len(), 2);
        assert_eq!(record.studios, vec!["Bones".to_string()]);
        assert_eq!(record.related_ids(), vec![121]);
        assert_eq!(record.related[0].relation, "alternative_version");
        assert_eq!(record.picture_url.as_deref(), Some("https://cdn/l.jpg"));
        assert_eq!(record.num_episodes, Some(64));
    }

    #[test]
    fn sparse_ranking_payload_leaves_optional_fields_empty() {
        let payload = serde_json::json!({
            "data": [
                {"node": {"id": 1, "title": "Unrated"}, "ranking": {"rank": 2}},
                {"node": {"id": 2, "title": "Rated", "mean": 7.5, "num_episodes": 0}, "ranking": {"rank": 1}}
            ],
            "paging": {"next": "https://api.myanimelist.net/v2/anime/ranking?offset=2"}
        });

        let page: MalPage = serde_json::from_value(payload).unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].ranking.as_ref().map(|r| r.rank), Some(2));

        let records: Vec<AnimeRecord> = page.data.into_iter().map(|e| e.node.into()).collect();
        assert_eq!(records[0].mean, None);
        assert!(records[0].synopsis.is_empty());
        assert_eq!(records[1].num_episodes, None);
    }

    #[test]
    fn user_list_status_is_parsed_from_wire_form() {
        let payload = serde_json::json!({
            "data": [
                {"node": {"id": 1, "title": "A"}, "list_status": {"status": "plan_to_watch", "score": 0}},
                {"node": {"id": 2, "title": "B"}, "list_status": {"status": "completed", "score": 9}}
            ]
        });
        let page: MalPage = serde_json::from_value(payload).unwrap();
        let statuses: Vec<Option<ListStatus>> = page
            .data
            .iter()
            .map(|entry| {
                entry
                    .list_status
                    .as_ref()
                    .and_then(|status| status.status.as_deref())
                    .and_then(ListStatus::parse)
            })
            .collect();
        assert_eq!(
            statuses,
            vec![Some(ListStatus::PlanToWatch), Some(ListStatus::Completed)]
        );
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let client = offline_client();
        assert_eq!(
            client.endpoint(&["anime", "ranking"]).as_str(),
            "http://127.0.0.1:9/v2/anime/ranking"
        );
        let bare = MalClient::new("http://127.0.0.1:9/v2", "test-client").unwrap();
        assert_eq!(
            bare.endpoint(&["anime", "5114"]).as_str(),
            "http://127.0.0.1:9/v2/anime/5114"
        );
    }

    #[test]
    fn usernames_are_encoded_as_one_path_segment() {
        let client = offline_client();
        assert_eq!(
            client.endpoint(&["users", "a/b?c d", "animelist"]).as_str(),
            "http://127.0.0.1:9/v2/users/a%2Fb%3Fc%20d/animelist"
        );
    }

    #[test]
    fn base_url_must_be_hierarchical() {
        assert!(MalClient::new("mailto:someone@example.com", "id").is_err());
        assert!(MalClient::new("not a url", "id").is_err());
    }

    #[tokio::test]
    async fn ranking_limit_outside_bounds_is_rejected_before_any_request() {
        let client = offline_client();
        for limit in [0, MAX_POOL_LIMIT + 1] {
            let error = client
                .fetch_ranking(RankingType::Popularity, limit)
                .await
                .unwrap_err();
            assert!(matches!(error, BotError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn seasonal_year_outside_bounds_is_rejected() {
        let client = offline_client();
        let error = client.fetch_seasonal(1900, Season::Winter).await.unwrap_err();
        assert!(matches!(error, BotError::InvalidArgument(_)));

        let far_future = Utc::now().year() + 5;
        let error = client
            .fetch_seasonal(far_future, Season::Fall)
            .await
            .unwrap_err();
        assert!(matches!(error, BotError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn blank_search_query_is_an_invalid_argument() {
        let client = offline_client();
        let error = client.search("   ").await.unwrap_err();
        assert!(matches!(error, BotError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_remote_unavailable() {
        let client = offline_client();
        let error = client.fetch_by_id(1).await.unwrap_err();
        assert!(matches!(error, BotError::RemoteUnavailable(_)));
    }
}
