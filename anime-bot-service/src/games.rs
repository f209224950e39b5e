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

//! Guess-the-Rating and Higher-or-Lower game engines.

use std::sync::Arc;

use anime_common::{
    AnimeId, AnimeRecord, Difficulty, Direction, MAX_RATING, MIN_RATING, PoolEntry, RankingType,
    UserId, rated_pool, shuffle_pool,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{BotError, BotResult},
    mal::{AnimeSource, validate_pool_limit},
    sessions::{SessionStore, Transition},
};

/// Absorbs binary floating point noise so that a guess exactly one margin away
/// (for example 8.4 against 8.3 on hard) still counts.
const RATING_TOLERANCE: f64 = 1e-9;

pub fn is_within_margin(guess: f64, rating: f64, margin: f64) -> bool {
    (guess - rating).abs() <= margin + RATING_TOLERANCE
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolOrder {
    #[default]
    Shuffled,
    Ranked,
}

impl PoolOrder {
    fn arrange(self, mut pool: Vec<PoolEntry>) -> Vec<PoolEntry> {
        if self == PoolOrder::Shuffled {
            shuffle_pool(&mut pool);
        }
        pool
    }
}

/// What a player may see about an anime before answering.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimePrompt {
    pub id: AnimeId,
    pub title: String,
    pub english_title: Option<String>,
    pub picture_url: Option<String>,
}

impl AnimePrompt {
    pub fn display_title(&self) -> String {
        self.as_record().display_title()
    }

    fn as_record(&self) -> AnimeRecord {
        AnimeRecord {
            english_title: self.english_title.clone(),
            ..AnimeRecord::new(self.id, self.title.clone())
        }
    }
}

impl From<&AnimeRecord> for AnimePrompt {
    fn from(anime: &AnimeRecord) -> Self {
        Self {
            id: anime.id,
            title: anime.title.clone(),
            english_title: anime.english_title.clone(),
            picture_url: anime.picture_url.clone(),
        }
    }
}

/// An anime together with its now-public rating.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealedAnime {
    pub anime: AnimePrompt,
    pub rating: f64,
}

impl From<&PoolEntry> for RevealedAnime {
    fn from(entry: &PoolEntry) -> Self {
        Self {
            anime: AnimePrompt::from(&entry.anime),
            rating: entry.rating,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuessSession {
    owner: UserId,
    difficulty: Difficulty,
    pool: Vec<PoolEntry>,
    index: usize,
    score: u32,
}

impl GuessSession {
    pub fn new(owner: UserId, difficulty: Difficulty, pool: Vec<PoolEntry>) -> BotResult<Self> {
        if pool.is_empty() {
            return Err(BotError::empty_pool(
                "None of the fetched anime have a rating to guess.",
            ));
        }
        Ok(Self {
            owner,
            difficulty,
            pool,
            index: 0,
            score: 0,
        })
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn remaining(&self) -> usize {
        self.pool.len() - self.index
    }

    pub fn prompt(&self) -> AnimePrompt {
        AnimePrompt::from(&self.pool[self.index].anime)
    }

    fn apply_guess(&mut self, guess: f64) -> (GuessOutcome, Transition) {
        let answered = RevealedAnime::from(&self.pool[self.index]);
        let difficulty = self.difficulty;

        if !is_within_margin(guess, answered.rating, difficulty.margin()) {
            return (
                GuessOutcome::Wrong {
                    guess,
                    answered,
                    difficulty,
                    final_score: self.score,
                },
                Transition::End,
            );
        }

        self.score += 1;
        self.index += 1;

        if self.index == self.pool.len() {
            return (
                GuessOutcome::PoolExhausted {
                    guess,
                    answered,
                    difficulty,
                    final_score: self.score,
                },
                Transition::End,
            );
        }

        (
            GuessOutcome::Continue {
                guess,
                answered,
                difficulty,
                score: self.score,
                next: self.prompt(),
            },
            Transition::Keep,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuessOutcome {
    Continue {
        guess: f64,
        answered: RevealedAnime,
        difficulty: Difficulty,
        score: u32,
        next: AnimePrompt,
    },
    PoolExhausted {
        guess: f64,
        answered: RevealedAnime,
        difficulty: Difficulty,
        final_score: u32,
    },
    Wrong {
        guess: f64,
        answered: RevealedAnime,
        difficulty: Difficulty,
        final_score: u32,
    },
}

impl GuessOutcome {
    pub fn is_correct(&self) -> bool {
        !matches!(self, GuessOutcome::Wrong { .. })
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, GuessOutcome::Continue { .. })
    }
}

#[derive(Debug, Clone)]
pub struct GuessStart {
    pub prompt: AnimePrompt,
    pub difficulty: Difficulty,
    pub pool_size: usize,
    pub replaced_previous: bool,
}

#[derive(Clone)]
pub struct GuessEngine {
    source: Arc<dyn AnimeSource>,
    sessions: Arc<SessionStore>,
    pool_order: PoolOrder,
}

impl GuessEngine {
    pub fn new(
        source: Arc<dyn AnimeSource>,
        sessions: Arc<SessionStore>,
        pool_order: PoolOrder,
    ) -> Self {
        Self {
            source,
            sessions,
            pool_order,
        }
    }

    pub async fn start(
        &self,
        owner: UserId,
        difficulty: Difficulty,
        ranking_type: RankingType,
        limit: u32,
    ) -> BotResult<GuessStart> {
        validate_pool_limit(limit)?;
        let records = self.source.fetch_ranking(ranking_type, limit).await?;
        let pool = self.pool_order.arrange(rated_pool(records));
        let session = GuessSession::new(owner, difficulty, pool)?;

        let prompt = session.prompt();
        let pool_size = session.remaining();
        let replaced_previous = self.sessions.guess.start(session.owner(), session);

        info!(
            user_id = owner,
            difficulty = difficulty.as_str(),
            ranking_type = ranking_type.as_str(),
            limit,
            pool_size,
            replaced_previous,
            "guess game started"
        );

        Ok(GuessStart {
            prompt,
            difficulty,
            pool_size,
            replaced_previous,
        })
    }

    pub fn submit_guess(&self, owner: UserId, guess: f64) -> BotResult<GuessOutcome> {
        if !guess.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&guess) {
            return Err(BotError::invalid(
                "Rating must be between 0 and 10. Use `/help guess` for more info.",
            ));
        }

        let outcome = self
            .sessions
            .guess
            .advance(owner, |session| session.apply_guess(guess))?;

        info!(
            user_id = owner,
            guess,
            correct = outcome.is_correct(),
            finished = outcome.is_final(),
            "guess submitted"
        );
        Ok(outcome)
    }
}

#[derive(Debug, Clone)]
pub struct HigherLowerSession {
    owner: UserId,
    game_id: Uuid,
    pool: Vec<PoolEntry>,
    index: usize,
    streak: u32,
}

impl HigherLowerSession {
    pub fn new(owner: UserId, pool: Vec<PoolEntry>) -> BotResult<Self> {
        if pool.len() < 2 {
            return Err(BotError::empty_pool(
                "Higher or Lower needs at least two rated anime.",
            ));
        }
        Ok(Self {
            owner,
            game_id: Uuid::new_v4(),
            pool,
            index: 0,
            streak: 0,
        })
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Identifies this game on its buttons, so presses from an older game's message are told apart.
    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    pub fn current(&self) -> RevealedAnime {
        RevealedAnime::from(&self.pool[self.index])
    }

    pub fn next_prompt(&self) -> AnimePrompt {
        AnimePrompt::from(&self.pool[self.index + 1].anime)
    }

    fn apply_prediction(&mut self, direction: Direction) -> (PredictionOutcome, Transition) {
        let previous = self.current();
        let challenger = RevealedAnime::from(&self.pool[self.index + 1]);

        // Equal ratings satisfy either prediction.
        let correct = match direction {
            Direction::Higher => challenger.rating >= previous.rating,
            Direction::Lower => challenger.rating <= previous.rating,
        };

        if !correct {
            return (
                PredictionOutcome::Wrong {
                    direction,
                    previous,
                    challenger,
                    final_streak: self.streak,
                },
                Transition::End,
            );
        }

        self.streak += 1;
        self.index += 1;

        if self.index + 1 >= self.pool.len() {
            return (
                PredictionOutcome::PoolExhausted {
                    direction,
                    previous,
                    last: challenger,
                    final_streak: self.streak,
                },
                Transition::End,
            );
        }

        (
            PredictionOutcome::Continue {
                game_id: self.game_id,
                direction,
                previous,
                current: challenger,
                next: self.next_prompt(),
                streak: self.streak,
            },
            Transition::Keep,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Continue {
        game_id: Uuid,
        direction: Direction,
        previous: RevealedAnime,
        current: RevealedAnime,
        next: AnimePrompt,
        streak: u32,
    },
    PoolExhausted {
        direction: Direction,
        previous: RevealedAnime,
        last: RevealedAnime,
        final_streak: u32,
    },
    Wrong {
        direction: Direction,
        previous: RevealedAnime,
        challenger: RevealedAnime,
        final_streak: u32,
    },
}

impl PredictionOutcome {
    pub fn is_correct(&self) -> bool {
        !matches!(self, PredictionOutcome::Wrong { .. })
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, PredictionOutcome::Continue { .. })
    }
}

#[derive(Debug, Clone)]
pub struct HigherLowerStart {
    pub game_id: Uuid,
    pub current: RevealedAnime,
    pub next: AnimePrompt,
    pub pool_size: usize,
    pub replaced_previous: bool,
}

#[derive(Clone)]
pub struct HigherLowerEngine {
    source: Arc<dyn AnimeSource>,
    sessions: Arc<SessionStore>,
    pool_order: PoolOrder,
}

impl HigherLowerEngine {
    pub fn new(
        source: Arc<dyn AnimeSource>,
        sessions: Arc<SessionStore>,
        pool_order: PoolOrder,
    ) -> Self {
        Self {
            source,
            sessions,
            pool_order,
        }
    }

    pub async fn start(
        &self,
        owner: UserId,
        ranking_type: RankingType,
        limit: u32,
    ) -> BotResult<HigherLowerStart> {
        validate_pool_limit(limit)?;
        let records = self.source.fetch_ranking(ranking_type, limit).await?;
        let pool = self.pool_order.arrange(rated_pool(records));
        let pool_size = pool.len();
        let session = HigherLowerSession::new(owner, pool)?;

        let game_id = session.game_id();
        let current = session.current();
        let next = session.next_prompt();
        let replaced_previous = self.sessions.higher_lower.start(session.owner(), session);

        info!(
            user_id = owner,
            %game_id,
            ranking_type = ranking_type.as_str(),
            limit,
            pool_size,
            replaced_previous,
            "higher or lower game started"
        );

        Ok(HigherLowerStart {
            game_id,
            current,
            next,
            pool_size,
            replaced_previous,
        })
    }

    /// Applies a button press to the owner's game. A press carrying the id of a game
    /// that has since been replaced is rejected as expired and leaves the live game untouched.
    pub fn submit_prediction(
        &self,
        owner: UserId,
        game_id: Uuid,
        direction: Direction,
    ) -> BotResult<PredictionOutcome> {
        let outcome = self.sessions.higher_lower.advance(owner, |session| {
            if session.game_id != game_id {
                return (Err(BotError::ViewExpired), Transition::Keep);
            }
            let (outcome, transition) = session.apply_prediction(direction);
            (Ok(outcome), transition)
        })??;

        info!(
            user_id = owner,
            direction = direction.as_str(),
            correct = outcome.is_correct(),
            finished = outcome.is_final(),
            "higher or lower prediction submitted"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
impl GuessSession {
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}

#[cfg(test)]
impl HigherLowerSession {
    pub fn streak(&self) -> u32 {
        self.streak
    }
}
