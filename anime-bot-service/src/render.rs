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

use anime_common::{
    AnimeRecord, Direction, RelatedAnime, UserId, anime_url, format_rating, profile_url,
    truncate_chars,
};
use uuid::Uuid;

use crate::{
    discord::{
        ActionRow, ButtonStyle, COLOR_BLUE, COLOR_BLURPLE, COLOR_GOLD, COLOR_GREEN, COLOR_PURPLE,
        COLOR_RED, Component, Embed, MessagePayload, SEARCH_QUERY_MAX_CHARS, SelectOption,
    },
    error::BotError,
    games::{GuessOutcome, GuessStart, HigherLowerStart, PredictionOutcome, RevealedAnime},
    views::{
        Listing, PageNav, Paginator, SearchSelector, page_button_id, prediction_button_id,
        select_menu_id,
    },
};

const FIELD_MAX_CHARS: usize = 1024;
const DESCRIPTION_MAX_CHARS: usize = 2048;
const SEARCH_EXCERPT_CHARS: usize = 200;
const RELATED_OVERFLOW_FOOTER: &str = "…more related anime available on the MyAnimeList page.";
const NO_DESCRIPTION: &str = "No description available";

pub fn error_message(error: &BotError, game_hint: Option<&str>) -> MessagePayload {
    let payload = MessagePayload::text(error.user_message(game_hint));
    if error.is_ephemeral() {
        payload.ephemeral()
    } else {
        payload
    }
}

fn humanize(value: &str) -> String {
    value
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_or_na<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    let joined = values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "N/A".to_string()
    } else {
        joined
    }
}

fn aired(anime: &AnimeRecord) -> String {
    match (anime.start_date.as_deref(), anime.end_date.as_deref()) {
        (Some(start), Some(end)) => format!("{start} to {end}"),
        (Some(start), None) => start.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// One markdown line per related anime, cut to the embed field limit.
pub fn related_anime_field(related: &[RelatedAnime]) -> String {
    if related.is_empty() {
        return "None".to_string();
    }

    let footer_chars = RELATED_OVERFLOW_FOOTER.chars().count();
    let mut lines: Vec<String> = Vec::new();
    let mut used = 0;

    for (position, entry) in related.iter().enumerate() {
        let line = format!(
            "[{}]({}) ({}, ID: {})",
            entry.title,
            anime_url(entry.id),
            humanize(&entry.relation),
            entry.id
        );
        let separator = usize::from(!lines.is_empty());
        let next_used = used + separator + line.chars().count();
        let is_last = position + 1 == related.len();
        let room_needed = if is_last { 0 } else { 1 + footer_chars };

        if next_used + room_needed > FIELD_MAX_CHARS {
            lines.push(RELATED_OVERFLOW_FOOTER.to_string());
            break;
        }
        used = next_used;
        lines.push(line);
    }

    lines.join("\n")
}

pub fn anime_detail(anime: &AnimeRecord) -> Embed {
    let synopsis = if anime.synopsis.trim().is_empty() {
        NO_DESCRIPTION.to_string()
    } else {
        truncate_chars(&anime.synopsis, DESCRIPTION_MAX_CHARS)
    };

    Embed::new(anime.display_title(), COLOR_GREEN)
        .description(synopsis)
        .image(anime.picture_url.as_deref())
        .field("Rating", format_rating(anime.mean), true)
        .field(
            "Episodes",
            anime
                .num_episodes
                .map_or_else(|| "?".to_string(), |episodes| episodes.to_string()),
            true,
        )
        .field(
            "Status",
            anime
                .status
                .as_deref()
                .map_or_else(|| "Unknown".to_string(), |status| status.replace('_', " ")),
            true,
        )
        .field("Aired", aired(anime), true)
        .field("Genres", join_or_na(&anime.genres), false)
        .field("Related Anime:", related_anime_field(&anime.related), false)
        .field("Studios", join_or_na(&anime.studios), false)
        .field("ID", anime.id.to_string(), false)
        .field("MyAnimeList", format!("[View on MAL]({})", anime.mal_url()), false)
}

pub fn search_results(selector: &SearchSelector, view_id: Uuid) -> MessagePayload {
    let mut embed = Embed::new(
        format!(
            "Search results for '{}'",
            truncate_chars(selector.query(), SEARCH_QUERY_MAX_CHARS)
        ),
        COLOR_BLUE,
    )
    .footer("Use /anime <ID> to get more details or use the dropdown and select an anime");

    for (position, anime) in selector.results().iter().enumerate() {
        let excerpt = if anime.synopsis.trim().is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            format!("{}...", truncate_chars(&anime.synopsis, SEARCH_EXCERPT_CHARS))
        };
        embed = embed.field(
            format!("{}. {}\n(ID: {})", position + 1, anime.inline_title(), anime.id),
            excerpt,
            false,
        );
    }

    let options = selector
        .results()
        .iter()
        .enumerate()
        .map(|(position, anime)| SelectOption::new(&anime.inline_title(), position.to_string()))
        .collect();

    MessagePayload::embed(embed).with_row(ActionRow::new(vec![Component::select(
        select_menu_id(view_id),
        "Select an anime to view details...",
        options,
    )]))
}

pub fn no_search_results() -> MessagePayload {
    MessagePayload::text("No anime found.")
}

fn listing_title(listing: &Listing) -> String {
    match listing {
        Listing::Seasonal { year, season, .. } => format!("{} {year} Anime", season.label()),
        Listing::UserList {
            username, status, ..
        } => format!(
            "{username}'s Anime List ({})",
            status.map_or("All", |status| status.label())
        ),
    }
}

pub fn paginator_page(paginator: &Paginator, view_id: Uuid) -> MessagePayload {
    let listing = paginator.listing();
    let mut description = String::new();
    if let Listing::UserList { username, .. } = listing {
        description.push_str(&format!("[View profile on MAL]({})\n\n", profile_url(username)));
    }
    description.push_str(&format!(
        "Page {}/{}",
        paginator.page() + 1,
        paginator.page_count()
    ));
    if listing.is_empty() {
        description.push_str("\n\nNothing to show here.");
    }

    let mut embed = Embed::new(listing_title(listing), COLOR_PURPLE).description(description);
    let range = paginator.page_range();

    match listing {
        Listing::Seasonal { entries, .. } => {
            for anime in &entries[range] {
                embed = embed.field(
                    format!("{}\n(ID: {})", anime.display_title(), anime.id),
                    format!(
                        "[View on MAL]({})\nRank: {} | Score: {}",
                        anime.mal_url(),
                        anime
                            .rank
                            .map_or_else(|| "N/A".to_string(), |rank| rank.to_string()),
                        format_rating(anime.mean)
                    ),
                    false,
                );
            }
        }
        Listing::UserList { entries, .. } => {
            for entry in &entries[range] {
                embed = embed.field(
                    format!("{}\n(ID: {})", entry.anime.display_title(), entry.anime.id),
                    format!(
                        "[View on MAL]({})\nScore: {}/10 | Status: {}",
                        entry.anime.mal_url(),
                        entry.score,
                        entry.status.map_or("unknown", |status| status.label())
                    ),
                    false,
                );
            }
        }
    }

    let buttons = PageNav::ALL
        .into_iter()
        .map(|nav| {
            let disabled = if nav.is_backward() {
                paginator.is_first_page()
            } else {
                paginator.is_last_page()
            };
            let style = match nav {
                PageNav::Previous | PageNav::Next => ButtonStyle::Primary,
                PageNav::Back5 | PageNav::Forward5 => ButtonStyle::Secondary,
            };
            Component::button(page_button_id(view_id, nav), nav.label(), style, disabled)
        })
        .collect();

    MessagePayload::embed(embed).with_row(ActionRow::new(buttons))
}

fn revealed_line(revealed: &RevealedAnime) -> String {
    format!(
        "{}\nRating: {}",
        revealed.anime.display_title(),
        format_rating(Some(revealed.rating))
    )
}

pub fn guess_start(start: &GuessStart) -> MessagePayload {
    let mut embed = Embed::new("Guess The Rating Game", COLOR_GOLD)
        .field("Anime", start.prompt.display_title(), false)
        .field(
            "Instructions",
            format!(
                "Guess the rating (0-10) within ±{} points!\nUse: /guess <number>",
                start.difficulty.margin()
            ),
            false,
        )
        .image(start.prompt.picture_url.as_deref());
    if start.replaced_previous {
        embed = embed.footer("Your previous guess game was replaced.");
    }
    MessagePayload::embed(embed)
}

pub fn guess_outcome(outcome: &GuessOutcome) -> MessagePayload {
    let embed = match outcome {
        GuessOutcome::Continue {
            guess,
            answered,
            difficulty,
            score,
            next,
        } => Embed::new("✓ Correct!", COLOR_GREEN)
            .field("Anime", answered.anime.display_title(), false)
            .field("Your Guess", guess.to_string(), true)
            .field("Actual Rating", format_rating(Some(answered.rating)), true)
            .field("Difficulty", difficulty.as_str(), true)
            .field("Current Score", score.to_string(), false)
            .field("Next Anime", next.display_title(), false)
            .image(next.picture_url.as_deref()),
        GuessOutcome::PoolExhausted {
            guess,
            answered,
            difficulty,
            final_score,
        } => Embed::new("✓ Correct!", COLOR_GREEN)
            .field("Anime", answered.anime.display_title(), false)
            .field("Final Guess", guess.to_string(), true)
            .field("Actual Rating", format_rating(Some(answered.rating)), true)
            .field("Difficulty", difficulty.as_str(), true)
            .field("Final Score", final_score.to_string(), false)
            .field("Game Over", "Anime pool exhausted! You did it!", false)
            .image(answered.anime.picture_url.as_deref()),
        GuessOutcome::Wrong {
            guess,
            answered,
            difficulty,
            final_score,
        } => Embed::new("✗ Wrong!", COLOR_RED)
            .field("Anime", answered.anime.display_title(), false)
            .field("Your Guess", guess.to_string(), true)
            .field("Actual Rating", format_rating(Some(answered.rating)), true)
            .field("Difficulty", difficulty.as_str(), true)
            .field("Final Score", final_score.to_string(), false)
            .image(answered.anime.picture_url.as_deref()),
    };
    MessagePayload::embed(embed)
}

fn prediction_buttons(owner: UserId, game_id: Uuid) -> ActionRow {
    ActionRow::new(vec![
        Component::button(
            prediction_button_id(owner, game_id, Direction::Higher),
            "📈 Higher",
            ButtonStyle::Success,
            false,
        ),
        Component::button(
            prediction_button_id(owner, game_id, Direction::Lower),
            "📉 Lower",
            ButtonStyle::Danger,
            false,
        ),
    ])
}

pub fn higher_lower_start(owner: UserId, start: &HigherLowerStart) -> MessagePayload {
    let mut current = Embed::new("Higher or Lower Game", COLOR_GOLD)
        .field("Anime", start.current.anime.display_title(), false)
        .field("Rating", format_rating(Some(start.current.rating)), false)
        .field(
            "Instructions",
            "Is the next anime rated higher or lower?\nUse the buttons below!",
            false,
        )
        .image(start.current.anime.picture_url.as_deref());
    if start.replaced_previous {
        current = current.footer("Your previous higher or lower game was replaced.");
    }

    let next = Embed::new("Next Anime", COLOR_GOLD)
        .field("Title", start.next.display_title(), false)
        .image(start.next.picture_url.as_deref());

    MessagePayload::embed(current)
        .with_embed(next)
        .with_row(prediction_buttons(owner, start.game_id))
}

/// Outcome of a button press. Buttons stay attached only while the game continues.
pub fn prediction_outcome(owner: UserId, outcome: &PredictionOutcome) -> MessagePayload {
    match outcome {
        PredictionOutcome::Continue {
            game_id,
            current,
            next,
            streak,
            ..
        } => MessagePayload::embed(
            Embed::new("✓ Correct!", COLOR_GREEN)
                .field("Streak", streak.to_string(), false)
                .field("Current Anime", revealed_line(current), false)
                .field("Next Anime", next.display_title(), false)
                .image(next.picture_url.as_deref()),
        )
        .with_row(prediction_buttons(owner, *game_id)),
        PredictionOutcome::PoolExhausted {
            last, final_streak, ..
        } => MessagePayload::embed(
            Embed::new("✓ Correct!", COLOR_GREEN)
                .field("Final Streak", final_streak.to_string(), false)
                .field("Final Anime", revealed_line(last), false)
                .field("Game Over", "Anime pool exhausted! You did it!", false)
                .image(last.anime.picture_url.as_deref()),
        ),
        PredictionOutcome::Wrong {
            previous,
            challenger,
            final_streak,
            ..
        } => MessagePayload::embed(
            Embed::new("✗ Wrong!", COLOR_RED)
                .field("Previous Anime", revealed_line(previous), true)
                .field("Final Anime", revealed_line(challenger), true)
                .field("Final Streak", final_streak.to_string(), false)
                .image(challenger.anime.picture_url.as_deref()),
        ),
    }
}

struct CommandHelp {
    name: &'static str,
    usage: &'static str,
    description: &'static str,
    example: &'static str,
    extras: &'static [(&'static str, &'static str)],
}

const RANKING_TYPES: &str = "popularity (default), airing, movie, favorite";

static COMMAND_HELP: &[CommandHelp] = &[
    CommandHelp {
        name: "search",
        usage: "/search <anime name>",
        description: "Search MyAnimeList for anime titles. Returns anime ID and brief overview. Use the dropdown to get more info.",
        example: "/search Demon Slayer",
        extras: &[],
    },
    CommandHelp {
        name: "anime",
        usage: "/anime <anime_id>",
        description: "Get detailed information for an anime by ID.",
        example: "/anime 5114",
        extras: &[],
    },
    CommandHelp {
        name: "list",
        usage: "/list <username> [sort] [status]",
        description: "View a user's anime list with pagination. Sort by title (default), score or status. Optionally, filter by status.",
        example: "/list username completed",
        extras: &[
            ("Valid Statuses", "watching, completed, on hold, dropped, plan to watch"),
            ("Sort Options", "title (default), score, status"),
        ],
    },
    CommandHelp {
        name: "seasonal",
        usage: "/seasonal <year> <season>",
        description: "View anime from a specific season with pagination.",
        example: "/seasonal 2024 spring",
        extras: &[("Valid Seasons", "winter, spring, summer, fall")],
    },
    CommandHelp {
        name: "guessgame",
        usage: "/guessgame [difficulty] [limit] [ranking type]",
        description: "Start the guess-the-rating game. Guess the rating within margin. Optional limit for anime pool size (default: 500, min is 1, max is 2500) and ranking type.",
        example: "/guessgame or /guessgame hard 100 airing",
        extras: &[
            ("Ranking Types", RANKING_TYPES),
            (
                "Difficulties",
                "easy (margin: 0.5), medium (default margin: 0.25), hard (margin: 0.1)",
            ),
        ],
    },
    CommandHelp {
        name: "guess",
        usage: "/guess <number>",
        description: "Submit your rating guess in the guess game.",
        example: "/guess 8.5",
        extras: &[],
    },
    CommandHelp {
        name: "higherlower",
        usage: "/higherlower [limit] [ranking type]",
        description: "Play the higher or lower rating game using buttons. Optional limit for anime pool size (default: 500, max is 2500; at least two rated anime are needed) and ranking type.",
        example: "/higherlower or /higherlower 100 favorite",
        extras: &[("Ranking Types", RANKING_TYPES)],
    },
];

pub fn help(command: Option<&str>, footer: &str) -> Embed {
    let Some(command) = command.map(|name| name.trim().trim_start_matches('/').to_lowercase())
    else {
        return help_overview(footer);
    };

    let Some(entry) = COMMAND_HELP.iter().find(|entry| entry.name == command) else {
        return Embed::new("❌ Unknown Command", COLOR_RED).description(format!(
            "'{command}' is not a valid command.\nUse `/help` to see all available commands."
        ));
    };

    let mut embed = Embed::new(format!("📖 Help: /{}", entry.name), COLOR_GREEN)
        .field("Usage", format!("`{}`", entry.usage), false)
        .field("Description", entry.description, false);
    for (name, value) in entry.extras {
        embed = embed.field(*name, *value, false);
    }
    embed.field("Example", entry.example, false).footer(footer)
}

fn help_overview(footer: &str) -> Embed {
    Embed::new("📖 Bot Command Help", COLOR_BLURPLE)
        .description(
            "Use `/help <command>` for detailed info\nExample: `/help search`\n`< >` are required fields\n`[ ]` are optional fields",
        )
        .field(
            "🔍 Search & Info",
            "`/search <name>` - Search for anime\n`/anime <id>` - Get anime details",
            false,
        )
        .field(
            "📚 Anime Lists",
            "`/list <username> [sort] [status]` - View a user's list\n`/seasonal <year> <season>` - View seasonal anime in a list",
            false,
        )
        .field(
            "🎮 Games",
            "`/guessgame [difficulty] [limit] [ranking type]` - Guess the rating\n`/guess <number>` - Submit guess for guess the rating game\n`/higherlower [limit] [ranking type]` - Higher or lower game",
            false,
        )
        .footer(footer)
}
