//! Scheduling commands
//!
//! Turns a spoken reminder/calendar command into a repository operation and
//! a one-line answer. Deleting by keyword returns candidate options when more
//! than one item matches.

use crate::Result;
use crate::db::{ScheduleItem, ScheduleRepo};
use crate::protocol::ScheduleResponse;

/// Lead-ins stripped from creation commands, longest first
const CREATE_PREFIXES: &[&str] = &[
    "set a reminder to ",
    "set a reminder for ",
    "set a reminder ",
    "create a reminder to ",
    "create a reminder for ",
    "add a reminder to ",
    "add a reminder for ",
    "remind me to ",
    "remind me about ",
    "remind me ",
    "schedule a ",
    "schedule an ",
    "schedule ",
    "add ",
    "put ",
];

/// Trailing phrases naming the calendar itself
const CALENDAR_SUFFIXES: &[&str] = &[
    " to my calendar",
    " on my calendar",
    " to my schedule",
    " on my schedule",
    " to the calendar",
    " to the schedule",
];

/// Words that start the "when" part of a creation command
const TIME_MARKERS: &[&str] = &[
    " tomorrow", " today", " tonight", " this ", " next ", " on ", " at ", " in ", " every ",
];

/// Words that make a scheduling command a deletion
pub const DELETE_WORDS: &[&str] = &["delete", "remove", "cancel"];

const LIST_PHRASES: &[&str] = &[
    "show",
    "list",
    "what's on",
    "what is on",
    "what do i have",
    "agenda",
];

/// Words dropped when extracting a deletion keyword
const DELETE_FILLER: &[&str] = &[
    "delete", "remove", "cancel", "please", "my", "the", "a", "an", "reminder", "reminders",
    "event", "appointment", "from", "schedule", "calendar", "to", "for", "about", "on", "in",
];

/// A parsed scheduling command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleCommand {
    /// Add an entry
    Create { title: String, due: Option<String> },
    /// Read back all entries
    List,
    /// Delete entries whose title contains `keyword`
    Delete { keyword: String },
}

impl ScheduleCommand {
    /// Parse a command; `None` when nothing usable was said
    #[must_use]
    pub fn parse(prompt: &str) -> Option<Self> {
        let text = prompt.trim().trim_end_matches(['.', '!', '?']).trim();
        // ASCII lowering keeps byte offsets aligned with `text`
        let lower = text.to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }

        if DELETE_WORDS.iter().any(|w| lower.contains(w)) {
            let keyword = lower
                .split_whitespace()
                .filter(|w| !DELETE_FILLER.contains(w))
                .collect::<Vec<_>>()
                .join(" ");
            return (!keyword.is_empty()).then_some(Self::Delete { keyword });
        }

        if matches!(
            lower.as_str(),
            "schedule" | "calendar" | "my schedule" | "my calendar"
        ) {
            return Some(Self::List);
        }

        // Trailing space lets a bare lead-in ("remind me to") match
        let spaced = format!("{lower} ");
        let prefix = CREATE_PREFIXES.iter().find(|p| spaced.starts_with(*p));
        if prefix.is_none() && LIST_PHRASES.iter().any(|p| lower.contains(p)) {
            return Some(Self::List);
        }

        let start = prefix.map_or(0, |p| p.len().min(text.len()));
        parse_create(&text[start..], &lower[start..])
    }
}

/// Split "<title> <when>" out of a creation command, keeping original casing
fn parse_create(body: &str, body_lower: &str) -> Option<ScheduleCommand> {
    let (body, body_lower) = match CALENDAR_SUFFIXES.iter().find(|s| body_lower.ends_with(*s)) {
        Some(suffix) => {
            let end = body.len() - suffix.len();
            (&body[..end], &body_lower[..end])
        }
        None => (body, body_lower),
    };

    // Pad so offsets into `padded` are one past offsets into `body`
    let padded = format!(" {body_lower}");
    let split = TIME_MARKERS
        .iter()
        .filter_map(|m| padded.find(m))
        .filter(|&i| i > 0)
        .min();

    let (title, due) = match split {
        Some(i) => (&body[..i - 1], Some(body[i - 1..].trim())),
        None => (body, None),
    };

    let title = title.trim();
    if title.is_empty() {
        return None;
    }

    Some(ScheduleCommand::Create {
        title: title.to_string(),
        due: due.filter(|d| !d.is_empty()).map(str::to_string),
    })
}

/// Executes scheduling commands against the repository
#[derive(Clone)]
pub struct ScheduleService {
    repo: ScheduleRepo,
}

impl ScheduleService {
    /// Create a service over a repository
    #[must_use]
    pub const fn new(repo: ScheduleRepo) -> Self {
        Self { repo }
    }

    /// Underlying repository
    #[must_use]
    pub const fn repo(&self) -> &ScheduleRepo {
        &self.repo
    }

    /// Run a spoken command
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn execute(&self, prompt: &str) -> Result<ScheduleResponse> {
        let Some(command) = ScheduleCommand::parse(prompt) else {
            return Ok(message(
                "Sorry, I didn't understand that. Try \"remind me to call mom tomorrow\".",
            ));
        };
        tracing::debug!(?command, "schedule command");

        match command {
            ScheduleCommand::Create { title, due } => {
                let item = self.repo.create(&title, due.as_deref())?;
                Ok(message(match &item.due {
                    Some(due) => format!("Okay, I added \"{}\" for {due}.", item.title),
                    None => format!("Okay, I added \"{}\" to your schedule.", item.title),
                }))
            }
            ScheduleCommand::List => {
                let items = self.repo.list()?;
                Ok(message(list_message(&items)))
            }
            ScheduleCommand::Delete { keyword } => self.delete_matching(&keyword),
        }
    }

    fn delete_matching(&self, keyword: &str) -> Result<ScheduleResponse> {
        let mut matches = self.repo.find_matching(keyword)?;
        match matches.len() {
            0 => Ok(message(format!(
                "I couldn't find anything matching \"{keyword}\" on your schedule."
            ))),
            1 => {
                let item = matches.remove(0);
                self.repo.delete(&item.id)?;
                Ok(message(format!("Deleted \"{}\".", item.title)))
            }
            n => Ok(ScheduleResponse {
                message: format!("I found {n} matches. Which one should I delete?"),
                options: Some(matches.iter().map(ScheduleItem::to_option).collect()),
            }),
        }
    }

    /// Delete a specific item chosen from a disambiguation prompt
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn delete_by_id(&self, id: &str) -> Result<ScheduleResponse> {
        let Some(item) = self.repo.get(id)? else {
            return Ok(message("That item is no longer on your schedule."));
        };

        self.repo.delete(&item.id)?;
        Ok(message(format!("Deleted \"{}\".", item.title)))
    }
}

fn message(text: impl Into<String>) -> ScheduleResponse {
    ScheduleResponse {
        message: text.into(),
        options: None,
    }
}

fn list_message(items: &[ScheduleItem]) -> String {
    if items.is_empty() {
        return "Your schedule is empty.".to_string();
    }

    let entries = items
        .iter()
        .map(|item| item.to_option().label())
        .collect::<Vec<_>>()
        .join(", ");
    match items.len() {
        1 => format!("You have one item: {entries}."),
        n => format!("You have {n} items: {entries}."),
    }
}
