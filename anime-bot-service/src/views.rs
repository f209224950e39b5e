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

//! Interactive views (paginator, search selector) and component event parsing.

use anime_common::{
    AnimeId, AnimeRecord, Direction, ListSort, ListStatus, PAGE_SIZE, Season, UserId,
    UserListEntry, page_count,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;
use uuid::Uuid;

use crate::error::{BotError, BotResult};

const PAGE_PREFIX: &str = "page";
const SELECT_PREFIX: &str = "select";
const PREDICTION_PREFIX: &str = "hl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    Previous,
    Back5,
    Forward5,
    Next,
}

impl PageNav {
    pub const ALL: [PageNav; 4] = [
        PageNav::Previous,
        PageNav::Back5,
        PageNav::Forward5,
        PageNav::Next,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PageNav::Previous => "prev",
            PageNav::Back5 => "back5",
            PageNav::Forward5 => "forward5",
            PageNav::Next => "next",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PageNav::Previous => "◀ Previous",
            PageNav::Back5 => "⏮ -5 Pages",
            PageNav::Forward5 => "+5 Pages ⏭",
            PageNav::Next => "Next ▶",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        PageNav::ALL.into_iter().find(|nav| nav.as_str() == value)
    }

    /// Target page for this move, clamped to `[0, pages - 1]`.
    pub fn apply(self, page: usize, pages: usize) -> usize {
        let last = pages.saturating_sub(1);
        let target = match self {
            PageNav::Previous => page.saturating_sub(1),
            PageNav::Back5 => page.saturating_sub(5),
            PageNav::Forward5 => page.saturating_add(5),
            PageNav::Next => page.saturating_add(1),
        };
        target.min(last)
    }

    /// Whether the button moves towards the first page.
    pub fn is_backward(self) -> bool {
        matches!(self, PageNav::Previous | PageNav::Back5)
    }
}

/// A button press or menu choice, decoded from its component custom id.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentEvent {
    Selection { view_id: Uuid, index: usize },
    PageNav { view_id: Uuid, nav: PageNav },
    Prediction {
        owner: UserId,
        game_id: Uuid,
        direction: Direction,
    },
}

impl ComponentEvent {
    pub fn parse(custom_id: &str, values: &[String]) -> BotResult<Self> {
        let malformed = || BotError::invalid(format!("Unrecognized component \"{custom_id}\"."));
        let mut parts = custom_id.split(':');
        let prefix = parts.next().unwrap_or_default();

        let event = match prefix {
            PAGE_PREFIX => {
                let view_id = parts.next().and_then(|id| Uuid::parse_str(id).ok());
                let nav = parts.next().and_then(PageNav::parse);
                match (view_id, nav) {
                    (Some(view_id), Some(nav)) => ComponentEvent::PageNav { view_id, nav },
                    _ => return Err(malformed()),
                }
            }
            SELECT_PREFIX => {
                let view_id = parts
                    .next()
                    .and_then(|id| Uuid::parse_str(id).ok())
                    .ok_or_else(malformed)?;
                let index = values
                    .first()
                    .and_then(|value| value.parse::<usize>().ok())
                    .ok_or_else(malformed)?;
                ComponentEvent::Selection { view_id, index }
            }
            PREDICTION_PREFIX => {
                let owner = parts.next().and_then(|id| id.parse::<UserId>().ok());
                let game_id = parts.next().and_then(|id| Uuid::parse_str(id).ok());
                let direction = parts.next().and_then(Direction::parse);
                match (owner, game_id, direction) {
                    (Some(owner), Some(game_id), Some(direction)) => ComponentEvent::Prediction {
                        owner,
                        game_id,
                        direction,
                    },
                    _ => return Err(malformed()),
                }
            }
            _ => return Err(malformed()),
        };

        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(event)
    }
}

pub fn page_button_id(view_id: Uuid, nav: PageNav) -> String {
    format!("{PAGE_PREFIX}:{view_id}:{}", nav.as_str())
}

pub fn select_menu_id(view_id: Uuid) -> String {
    format!("{SELECT_PREFIX}:{view_id}")
}

pub fn prediction_button_id(owner: UserId, game_id: Uuid, direction: Direction) -> String {
    format!("{PREDICTION_PREFIX}:{owner}:{game_id}:{}", direction.as_str())
}

/// Rows shown by a paginator.
#[derive(Debug, Clone)]
pub enum Listing {
    Seasonal {
        year: i32,
        season: Season,
        entries: Vec<AnimeRecord>,
    },
    UserList {
        username: String,
        sort: ListSort,
        status: Option<ListStatus>,
        entries: Vec<UserListEntry>,
    },
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Listing::Seasonal { entries, .. } => entries.len(),
            Listing::UserList { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Paginator {
    owner: UserId,
    listing: Listing,
    page: usize,
}

impl Paginator {
    pub fn new(owner: UserId, listing: Listing) -> Self {
        Self {
            owner,
            listing,
            page: 0,
        }
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        page_count(self.listing.len())
    }

    /// Index range of the rows on the current page.
    pub fn page_range(&self) -> std::ops::Range<usize> {
        let start = (self.page * PAGE_SIZE).min(self.listing.len());
        let end = (start + PAGE_SIZE).min(self.listing.len());
        start..end
    }

    pub fn is_first_page(&self) -> bool {
        self.page == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.page + 1 >= self.page_count()
    }

    /// Moves the page for `actor`. Returns `false` when the move was a no-op at a bound.
    pub fn navigate(&mut self, actor: UserId, nav: PageNav) -> BotResult<bool> {
        if actor != self.owner {
            return Err(BotError::Unauthorized);
        }
        let target = nav.apply(self.page, self.page_count());
        let moved = target != self.page;
        self.page = target;
        Ok(moved)
    }
}

#[derive(Debug, Clone)]
pub struct SearchSelector {
    owner: UserId,
    query: String,
    results: Vec<AnimeRecord>,
}

impl SearchSelector {
    pub fn new(owner: UserId, query: impl Into<String>, results: Vec<AnimeRecord>) -> Self {
        Self {
            owner,
            query: query.into(),
            results,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[AnimeRecord] {
        &self.results
    }

    pub fn select(&self, actor: UserId, index: usize) -> BotResult<AnimeId> {
        if actor != self.owner {
            return Err(BotError::Unauthorized);
        }
        self.results
            .get(index)
            .map(|anime| anime.id)
            .ok_or_else(|| BotError::invalid("That search result is no longer available."))
    }
}

#[derive(Debug, Clone)]
pub enum View {
    Paginator(Paginator),
    Search(SearchSelector),
}

struct StoredView {
    view: View,
    expires_at: DateTime<Utc>,
}

/// Live views keyed by the id embedded in their component custom ids.
///
/// A view lives for the configured timeout after its last successful interaction.
pub struct ViewRegistry {
    views: DashMap<Uuid, StoredView>,
    ttl: Duration,
}

impl ViewRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            views: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, view: View) -> Uuid {
        self.prune_expired();
        let view_id = Uuid::new_v4();
        self.views.insert(
            view_id,
            StoredView {
                view,
                expires_at: Utc::now() + self.ttl,
            },
        );
        view_id
    }

    /// Runs `act` against a live view. Expiry is only extended when `act` succeeds.
    pub fn with_view<R>(
        &self,
        view_id: Uuid,
        act: impl FnOnce(&mut View) -> BotResult<R>,
    ) -> BotResult<R> {
        let now = Utc::now();
        match self.views.entry(view_id) {
            Entry::Vacant(_) => Err(BotError::ViewExpired),
            Entry::Occupied(occupied) if occupied.get().expires_at <= now => {
                occupied.remove();
                debug!(%view_id, "view expired");
                Err(BotError::ViewExpired)
            }
            Entry::Occupied(mut occupied) => {
                let stored = occupied.get_mut();
                let result = act(&mut stored.view)?;
                stored.expires_at = now + self.ttl;
                Ok(result)
            }
        }
    }

    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.views.len();
        self.views.retain(|_, stored| stored.expires_at > now);
        let pruned = before.saturating_sub(self.views.len());
        if pruned > 0 {
            debug!(pruned, "pruned expired views");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
