//! Scores, schedules and moneylines from The Odds API

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{endpoint, require_key};
use crate::config::RelayConfig;
use crate::sports::{self, Game, StatType, Team, TeamOdds, TeamScore};
use crate::{Error, Result};

/// How far back the scores endpoint looks for finished games
const DAYS_FROM: &str = "3";

#[derive(Debug, Deserialize)]
struct ScoreEvent {
    commence_time: DateTime<Utc>,
    #[serde(default)]
    completed: bool,
    home_team: String,
    away_team: String,
    #[serde(default)]
    scores: Option<Vec<ScoreEntry>>,
}

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    name: String,
    score: String,
}

#[derive(Debug, Deserialize)]
struct OddsEvent {
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    #[serde(default)]
    outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    name: String,
    price: f64,
}

impl From<ScoreEvent> for Game {
    fn from(event: ScoreEvent) -> Self {
        Self {
            home_team: event.home_team,
            away_team: event.away_team,
            commence_time: event.commence_time,
            completed: event.completed,
            scores: event
                .scores
                .unwrap_or_default()
                .into_iter()
                .map(|s| TeamScore {
                    name: s.name,
                    score: s.score,
                })
                .collect(),
            odds: Vec::new(),
        }
    }
}

impl From<OddsEvent> for Game {
    fn from(event: OddsEvent) -> Self {
        // First bookmaker offering a moneyline
        let odds = event
            .bookmakers
            .iter()
            .flat_map(|b| &b.markets)
            .find(|m| m.key == "h2h")
            .map(|m| {
                m.outcomes
                    .iter()
                    .map(|o| TeamOdds {
                        name: o.name.clone(),
                        price: o.price,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            home_team: event.home_team,
            away_team: event.away_team,
            commence_time: event.commence_time,
            completed: false,
            scores: Vec::new(),
            odds,
        }
    }
}

/// The Odds API client
pub struct OddsClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl OddsClient {
    /// Create an odds client from relay configuration
    ///
    /// # Errors
    ///
    /// Returns error if the odds API key is missing
    pub fn from_config(client: reqwest::Client, config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            client,
            api_key: require_key(config.api_keys.odds.as_ref(), "Odds")?,
            base_url: config.upstreams.odds.clone(),
        })
    }

    /// Find the game answering `stat` for `team`
    ///
    /// # Errors
    ///
    /// Returns error if the upstream call fails
    pub async fn game(&self, team: &Team, stat: StatType) -> Result<Option<Game>> {
        let games: Vec<Game> = match stat {
            StatType::Odds => self
                .fetch::<OddsEvent>(team.sport, "odds", &[
                    ("regions", "us"),
                    ("markets", "h2h"),
                    ("oddsFormat", "american"),
                ])
                .await?
                .into_iter()
                .map(Game::from)
                .collect(),
            StatType::Scores | StatType::Schedule | StatType::Summary => self
                .fetch::<ScoreEvent>(team.sport, "scores", &[("daysFrom", DAYS_FROM)])
                .await?
                .into_iter()
                .map(Game::from)
                .collect(),
        };

        let found = sports::select_game(&games, team.name, stat, Utc::now()).cloned();
        tracing::debug!(
            team = team.key,
            stat = %stat,
            events = games.len(),
            found = found.is_some(),
            "sports lookup"
        );
        Ok(found)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        sport: &str,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .get(endpoint(&self.base_url, &format!("sports/{sport}/{resource}")))
            .query(&[("apiKey", self.api_key.expose_secret())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "odds API error");
            return Err(Error::DownstreamCallFailed(format!(
                "odds API error {status}"
            )));
        }

        Ok(response.json().await?)
    }
}
