//! Team table, stat types and one-line game summaries
//!
//! The same table drives intent detection on the client and sport lookup
//! on the relay, so both agree on which words name a team.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A team the assistant knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Team {
    /// Lowercase keyword matched against transcripts (e.g. "lakers")
    pub key: &'static str,
    /// Full name as reported by the odds provider
    pub name: &'static str,
    /// Odds provider sport key
    pub sport: &'static str,
}

const NBA: &str = "basketball_nba";
const NFL: &str = "americanfootball_nfl";
const MLB: &str = "baseball_mlb";
const NHL: &str = "icehockey_nhl";

/// Known teams, in match order
pub const TEAMS: &[Team] = &[
    Team { key: "lakers", name: "Los Angeles Lakers", sport: NBA },
    Team { key: "warriors", name: "Golden State Warriors", sport: NBA },
    Team { key: "celtics", name: "Boston Celtics", sport: NBA },
    Team { key: "bulls", name: "Chicago Bulls", sport: NBA },
    Team { key: "knicks", name: "New York Knicks", sport: NBA },
    Team { key: "nuggets", name: "Denver Nuggets", sport: NBA },
    Team { key: "suns", name: "Phoenix Suns", sport: NBA },
    Team { key: "mavericks", name: "Dallas Mavericks", sport: NBA },
    Team { key: "cowboys", name: "Dallas Cowboys", sport: NFL },
    Team { key: "chiefs", name: "Kansas City Chiefs", sport: NFL },
    Team { key: "eagles", name: "Philadelphia Eagles", sport: NFL },
    Team { key: "patriots", name: "New England Patriots", sport: NFL },
    Team { key: "packers", name: "Green Bay Packers", sport: NFL },
    Team { key: "49ers", name: "San Francisco 49ers", sport: NFL },
    Team { key: "steelers", name: "Pittsburgh Steelers", sport: NFL },
    Team { key: "bears", name: "Chicago Bears", sport: NFL },
    Team { key: "yankees", name: "New York Yankees", sport: MLB },
    Team { key: "dodgers", name: "Los Angeles Dodgers", sport: MLB },
    Team { key: "red sox", name: "Boston Red Sox", sport: MLB },
    Team { key: "cubs", name: "Chicago Cubs", sport: MLB },
    Team { key: "mets", name: "New York Mets", sport: MLB },
    Team { key: "astros", name: "Houston Astros", sport: MLB },
    Team { key: "bruins", name: "Boston Bruins", sport: NHL },
    Team { key: "rangers", name: "New York Rangers", sport: NHL },
    Team { key: "maple leafs", name: "Toronto Maple Leafs", sport: NHL },
    Team { key: "blackhawks", name: "Chicago Blackhawks", sport: NHL },
];

/// Look up a team by its keyword
#[must_use]
pub fn team(key: &str) -> Option<&'static Team> {
    let key = key.trim().to_lowercase();
    TEAMS.iter().find(|t| t.key == key)
}

/// Find the first team whose keyword appears in lowercase text
#[must_use]
pub fn find_team(lowercase_text: &str) -> Option<&'static Team> {
    TEAMS.iter().find(|t| lowercase_text.contains(t.key))
}

/// Kind of sports information requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Scores,
    Schedule,
    Summary,
    Odds,
}

impl StatType {
    /// Keyword groups in precedence order
    const KEYWORDS: &[(Self, &[&str])] = &[
        (Self::Scores, &["score", "won", "win", "lost", "result", "final"]),
        (
            Self::Schedule,
            &["schedule", "next game", "play next", "playing next", "when do", "when does", "when is"],
        ),
        (Self::Summary, &["summary", "recap", "how did", "how are", "doing"]),
        (Self::Odds, &["odds", "spread", "moneyline", "favored", "bet"]),
    ];

    /// First stat type whose keywords appear in lowercase text
    #[must_use]
    pub fn detect(lowercase_text: &str) -> Option<Self> {
        Self::KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lowercase_text.contains(w)))
            .map(|(stat, _)| *stat)
    }

    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scores => "scores",
            Self::Schedule => "schedule",
            Self::Summary => "summary",
            Self::Odds => "odds",
        }
    }
}

impl std::fmt::Display for StatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score line for one side of a game
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TeamScore {
    pub name: String,
    pub score: String,
}

/// Moneyline price for one side of a game (American format)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TeamOdds {
    pub name: String,
    pub price: f64,
}

/// A single game as relayed by the backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub home_team: String,
    pub away_team: String,
    pub commence_time: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub scores: Vec<TeamScore>,
    #[serde(default)]
    pub odds: Vec<TeamOdds>,
}

impl Game {
    /// Whether the given full team name plays in this game
    #[must_use]
    pub fn involves(&self, name: &str) -> bool {
        self.home_team.eq_ignore_ascii_case(name) || self.away_team.eq_ignore_ascii_case(name)
    }

    /// Opponent of the given team
    #[must_use]
    pub fn opponent_of(&self, name: &str) -> &str {
        if self.home_team.eq_ignore_ascii_case(name) {
            &self.away_team
        } else {
            &self.home_team
        }
    }

    fn score_of(&self, name: &str) -> Option<&str> {
        self.scores
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.score.as_str())
    }

    fn price_of(&self, name: &str) -> Option<f64> {
        self.odds
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
            .map(|o| o.price)
    }
}

/// Pick the game that answers a stat request for a team
///
/// Scores and summaries look back at the latest game that has started;
/// schedule and odds look ahead to the earliest game that has not.
#[must_use]
pub fn select_game<'a>(
    games: &'a [Game],
    team_name: &str,
    stat: StatType,
    now: DateTime<Utc>,
) -> Option<&'a Game> {
    let mut relevant = games.iter().filter(|g| g.involves(team_name));

    match stat {
        StatType::Scores | StatType::Summary => relevant
            .filter(|g| g.completed || g.commence_time <= now)
            .max_by_key(|g| g.commence_time),
        StatType::Schedule | StatType::Odds => relevant
            .filter(|g| !g.completed && g.commence_time > now)
            .min_by_key(|g| g.commence_time),
    }
}

fn when(time: DateTime<Utc>) -> String {
    time.format("%a %b %-d at %-I:%M %p UTC").to_string()
}

fn american(price: f64) -> String {
    if price > 0.0 {
        format!("+{price}")
    } else {
        format!("{price}")
    }
}

/// Format a one-line spoken summary of a game for a team
#[must_use]
pub fn format_game(team: &Team, stat: StatType, game: &Game) -> String {
    let opponent = game.opponent_of(team.name);

    match stat {
        StatType::Scores => match (game.score_of(team.name), game.score_of(opponent)) {
            (Some(ours), Some(theirs)) => {
                let status = if game.completed { "Final" } else { "Live" };
                format!("{status}: {} {ours}, {opponent} {theirs}.", team.name)
            }
            _ => format!(
                "The {} haven't started against the {opponent} yet. Tip-off is {}.",
                team.name,
                when(game.commence_time)
            ),
        },
        StatType::Schedule => format!(
            "The {} play the {opponent} next, on {}.",
            team.name,
            when(game.commence_time)
        ),
        StatType::Summary => {
            let (Some(ours), Some(theirs)) = (game.score_of(team.name), game.score_of(opponent))
            else {
                return format!(
                    "The {} last faced the {opponent} on {}, but I don't have the score.",
                    team.name,
                    when(game.commence_time)
                );
            };
            if !game.completed {
                return format!(
                    "The {} are playing the {opponent} right now, {ours} to {theirs}.",
                    team.name
                );
            }
            let verdict = match (ours.parse::<i64>(), theirs.parse::<i64>()) {
                (Ok(a), Ok(b)) if a > b => "beat",
                (Ok(a), Ok(b)) if a < b => "lost to",
                _ => "played",
            };
            format!(
                "The {} {verdict} the {opponent} {ours} to {theirs} on {}.",
                team.name,
                when(game.commence_time)
            )
        }
        StatType::Odds => match (game.price_of(team.name), game.price_of(opponent)) {
            (Some(ours), Some(theirs)) => format!(
                "For {} against the {opponent}: {} {}, {opponent} {}.",
                when(game.commence_time),
                team.name,
                american(ours),
                american(theirs)
            ),
            _ => format!(
                "No odds are posted yet for the {} against the {opponent}.",
                team.name
            ),
        },
    }
}

/// Message spoken when no game matches a request
#[must_use]
pub fn no_game_message(team: &Team, stat: StatType) -> String {
    match stat {
        StatType::Scores | StatType::Summary => {
            format!("I couldn't find a recent game for the {}.", team.name)
        }
        StatType::Schedule | StatType::Odds => {
            format!("I couldn't find an upcoming game for the {}.", team.name)
        }
    }
}
