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

use std::{cmp::Ordering, collections::BTreeSet, sync::LazyLock};

use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

pub const PAGE_SIZE: usize = 10;
pub const SEARCH_RESULT_LIMIT: usize = 10;
pub const MIN_POOL_LIMIT: u32 = 1;
pub const MAX_POOL_LIMIT: u32 = 2500;
pub const DEFAULT_POOL_LIMIT: u32 = 500;
pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 10.0;
pub const MAL_WEB_BASE_URL: &str = "https://myanimelist.net";

/// Platform user identity (a Discord snowflake).
pub type UserId = u64;
pub type AnimeId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RankingType {
    Popularity,
    Airing,
    Movie,
    Favorite,
}

impl RankingType {
    pub const ALL: [RankingType; 4] = [
        RankingType::Popularity,
        RankingType::Airing,
        RankingType::Movie,
        RankingType::Favorite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RankingType::Popularity => "popularity",
            RankingType::Airing => "airing",
            RankingType::Movie => "movie",
            RankingType::Favorite => "favorite",
        }
    }

    /// Name of the ranking type on the MyAnimeList ranking endpoint.
    pub fn upstream_name(self) -> &'static str {
        match self {
            RankingType::Popularity => "bypopularity",
            other => other.as_str(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "popularity" | "bypopularity" => Some(RankingType::Popularity),
            "airing" => Some(RankingType::Airing),
            "movie" => Some(RankingType::Movie),
            "favorite" => Some(RankingType::Favorite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Season::ALL
            .into_iter()
            .find(|season| season.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListStatus {
    Watching,
    Completed,
    OnHold,
    Dropped,
    PlanToWatch,
}

impl ListStatus {
    pub const ALL: [ListStatus; 5] = [
        ListStatus::Watching,
        ListStatus::Completed,
        ListStatus::OnHold,
        ListStatus::Dropped,
        ListStatus::PlanToWatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ListStatus::Watching => "watching",
            ListStatus::Completed => "completed",
            ListStatus::OnHold => "on_hold",
            ListStatus::Dropped => "dropped",
            ListStatus::PlanToWatch => "plan_to_watch",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListStatus::Watching => "watching",
            ListStatus::Completed => "completed",
            ListStatus::OnHold => "on hold",
            ListStatus::Dropped => "dropped",
            ListStatus::PlanToWatch => "plan to watch",
        }
    }

    /// Accepts both the wire form (`on_hold`) and the spoken form (`on hold`).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(' ', "_");
        ListStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListSort {
    Score,
    #[default]
    Title,
    Status,
}

impl ListSort {
    pub const ALL: [ListSort; 3] = [ListSort::Score, ListSort::Title, ListSort::Status];

    pub fn as_str(self) -> &'static str {
        match self {
            ListSort::Score => "score",
            ListSort::Title => "title",
            ListSort::Status => "status",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "score" => Some(ListSort::Score),
            "title" | "alphabetical" => Some(ListSort::Title),
            "status" => Some(ListSort::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Largest absolute rating difference still counted as a correct guess.
    pub fn margin(self) -> f64 {
        match self {
            Difficulty::Easy => 0.5,
            Difficulty::Medium => 0.25,
            Difficulty::Hard => 0.1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Difficulty::ALL
            .into_iter()
            .find(|difficulty| difficulty.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Higher,
    Lower,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Higher => "higher",
            Direction::Lower => "lower",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "higher" => Some(Direction::Higher),
            "lower" => Some(Direction::Lower),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelatedAnime {
    pub id: AnimeId,
    pub title: String,
    pub relation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnimeRecord {
    pub id: AnimeId,
    pub title: String,
    pub english_title: Option<String>,
    /// Mean community rating on the 0-10 scale; `None` while unrated.
    pub mean: Option<f64>,
    pub genres: BTreeSet<String>,
    pub studios: Vec<String>,
    pub synopsis: String,
    pub related: Vec<RelatedAnime>,
    pub picture_url: Option<String>,
    pub num_episodes: Option<u32>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub rank: Option<u32>,
}

impl AnimeRecord {
    pub fn new(id: AnimeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_mean(mut self, mean: f64) -> Self {
        self.mean = Some(mean);
        self
    }

    pub fn related_ids(&self) -> Vec<AnimeId> {
        self.related.iter().map(|related| related.id).collect()
    }

    pub fn mal_url(&self) -> String {
        anime_url(self.id)
    }

    /// English title on top with the original title underneath, when the two differ.
    pub fn display_title(&self) -> String {
        match self.english_title.as_deref().map(str::trim) {
            Some(english) if !english.is_empty() && english != self.title => {
                format!("{english}\n({})", self.title)
            }
            _ => self.title.clone(),
        }
    }

    /// Single-line variant of [`AnimeRecord::display_title`] for list rows and menus.
    pub fn inline_title(&self) -> String {
        match self.english_title.as_deref().map(str::trim) {
            Some(english) if !english.is_empty() && english != self.title => {
                format!("{english} ({})", self.title)
            }
            _ => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserListEntry {
    pub anime: AnimeRecord,
    /// The list owner's own score, 0 when unscored.
    pub score: u8,
    pub status: Option<ListStatus>,
}

/// An anime that made it into a game pool, with its rating unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub anime: AnimeRecord,
    pub rating: f64,
}

/// Drops every record without a usable mean rating, keeping upstream order.
///
/// This is the only place pool candidates are filtered; both games build their pools
/// from its output.
pub fn rated_pool(records: Vec<AnimeRecord>) -> Vec<PoolEntry> {
    records
        .into_iter()
        .filter_map(|anime| match anime.mean {
            Some(rating) if rating.is_finite() => Some(PoolEntry { anime, rating }),
            _ => None,
        })
        .collect()
}

pub fn shuffle_pool(entries: &mut [PoolEntry]) {
    let mut rng = rand::rng();
    entries.shuffle(&mut rng);
}

pub fn sort_user_list(entries: &mut [UserListEntry], sort: ListSort) {
    let by_title = |a: &UserListEntry, b: &UserListEntry| {
        a.anime
            .title
            .to_lowercase()
            .cmp(&b.anime.title.to_lowercase())
    };

    match sort {
        ListSort::Title => entries.sort_by(by_title),
        ListSort::Score => entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| by_title(a, b))),
        ListSort::Status => entries.sort_by(|a, b| {
            compare_status(a.status, b.status).then_with(|| by_title(a, b))
        }),
    }
}

// Entries without a status sort last.
fn compare_status(a: Option<ListStatus>, b: Option<ListStatus>) -> Ordering {
    a.is_none().cmp(&b.is_none()).then(a.cmp(&b))
}

/// Number of pages needed to show `total` items; an empty listing still has one page.
pub fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE).max(1)
}

pub fn anime_url(id: AnimeId) -> String {
    format!("{MAL_WEB_BASE_URL}/anime/{id}")
}

static PROFILE_BASE_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse(&format!("{MAL_WEB_BASE_URL}/profile/")).expect("profile base url is valid")
});

/// Profile link with the username encoded as a single path segment.
pub fn profile_url(username: &str) -> String {
    let mut url = PROFILE_BASE_URL.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().push(username);
    }
    url.into()
}

pub fn format_rating(rating: Option<f64>) -> String {
    match rating {
        Some(value) => format!("{value:.2}"),
        None => "N/A".to_string(),
    }
}

/// Cuts `value` to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is a valid regex")
});

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned()
}
