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

//! Process-wide game session store.
//!
//! Sessions are keyed by `(user id, game kind)`: each kind has its own map, so a
//! user can hold one guess session and one higher/lower session at the same time.
//! Every read-modify-write on an entry runs under that entry's shard lock and
//! never awaits, so callers must finish any network fetch before touching a session.

use anime_common::UserId;
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;

use crate::{
    error::{BotError, BotResult},
    games::{GuessSession, HigherLowerSession},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameKind {
    Guess,
    HigherLower,
}

impl GameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Guess => "guess",
            GameKind::HigherLower => "higher_lower",
        }
    }
}

/// What a step does to the session it ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Keep,
    End,
}

pub struct SessionMap<S> {
    kind: GameKind,
    entries: DashMap<UserId, S>,
}

impl<S> SessionMap<S> {
    pub fn new(kind: GameKind) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    /// Installs `session` for `owner`, silently dropping any previous one.
    /// Returns `true` when a previous session was replaced.
    pub fn start(&self, owner: UserId, session: S) -> bool {
        let replaced = self.entries.insert(owner, session).is_some();
        debug!(user_id = owner, kind = self.kind.as_str(), replaced, "session started");
        replaced
    }

    /// Runs one atomic step against the owner's session and removes it when the
    /// step reports [`Transition::End`].
    pub fn advance<R>(
        &self,
        owner: UserId,
        step: impl FnOnce(&mut S) -> (R, Transition),
    ) -> BotResult<R> {
        match self.entries.entry(owner) {
            Entry::Vacant(_) => Err(BotError::NoActiveSession),
            Entry::Occupied(mut occupied) => {
                let (result, transition) = step(occupied.get_mut());
                if transition == Transition::End {
                    occupied.remove();
                    debug!(user_id = owner, kind = self.kind.as_str(), "session ended");
                }
                Ok(result)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
impl<S> SessionMap<S> {
    pub fn inspect<R>(&self, owner: UserId, read: impl FnOnce(&S) -> R) -> Option<R> {
        self.entries.get(&owner).map(|session| read(session.value()))
    }

    pub fn contains(&self, owner: UserId) -> bool {
        self.entries.contains_key(&owner)
    }

    pub fn end(&self, owner: UserId) -> Option<S> {
        self.entries.remove(&owner).map(|(_, session)| session)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct SessionStore {
    pub guess: SessionMap<GuessSession>,
    pub higher_lower: SessionMap<HigherLowerSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            guess: SessionMap::new(GameKind::Guess),
            higher_lower: SessionMap::new(GameKind::HigherLower),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
