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

use thiserror::Error;

/// Failures a command or component interaction can end in.
///
/// Every variant is recovered at the interaction boundary and turned into a
/// user-visible message via [`BotError::user_message`].
#[derive(Debug, Error)]
pub enum BotError {
    #[error("remote anime database unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no active session")]
    NoActiveSession,
    #[error("pool has too few rated entries: {0}")]
    EmptyPool(String),
    #[error("interaction from a user who does not own this view")]
    Unauthorized,
    #[error("view expired")]
    ViewExpired,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type BotResult<T> = Result<T, BotError>;

impl BotError {
    pub fn remote(error: impl std::fmt::Display) -> Self {
        Self::RemoteUnavailable(error.to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn empty_pool(message: impl Into<String>) -> Self {
        Self::EmptyPool(message.into())
    }

    /// Notices about someone else's view are shown only to the person who clicked.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::ViewExpired)
    }

    pub fn user_message(&self, game_hint: Option<&str>) -> String {
        match self {
            Self::RemoteUnavailable(_) => {
                "MyAnimeList is not responding right now. Please try again later.".to_string()
            }
            Self::NotFound(message) | Self::InvalidArgument(message) => message.clone(),
            Self::NoActiveSession => match game_hint {
                Some(command) => format!("You have no game running. Start a new one with /{command}"),
                None => "You have no game running. Start a new one first.".to_string(),
            },
            Self::EmptyPool(message) => {
                format!("{message} Try a larger limit or a different ranking type.")
            }
            Self::Unauthorized => "This is not your session.".to_string(),
            Self::ViewExpired => {
                "This view has expired. Run the command again to get a fresh one.".to_string()
            }
            Self::Internal(_) => "An error occurred while processing the command.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failure_hides_transport_details() {
        let error = BotError::remote("connection reset by peer");
        let message = error.user_message(None);
        assert!(message.contains("try again later"));
        assert!(!message.contains("connection reset"));
    }

    #[test]
    fn no_active_session_points_at_start_command() {
        let message = BotError::NoActiveSession.user_message(Some("guessgame"));
        assert!(message.ends_with("/guessgame"));
    }

    #[test]
    fn only_ownership_and_expiry_notices_are_ephemeral() {
        assert!(BotError::Unauthorized.is_ephemeral());
        assert!(BotError::ViewExpired.is_ephemeral());
        assert!(!BotError::NoActiveSession.is_ephemeral());
        assert!(!BotError::not_found("Anime not found.").is_ephemeral());
    }

    #[test]
    fn internal_errors_are_reported_generically() {
        let error = BotError::from(anyhow::anyhow!("index out of bounds"));
        assert_eq!(
            error.user_message(None),
            "An error occurred while processing the command."
        );
    }
}
