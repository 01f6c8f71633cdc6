mod ask;
mod dashboard;
mod feedback;
mod manage;
mod sources;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::api::types::{InteractionId, Rating};
use crate::chat::store::{ConversationEntry, Snapshot};
use crate::state::AppState;

/// Handle passed to every command: shared state plus the console sink.
#[derive(Clone)]
pub struct Context {
    state: Arc<AppState>,
    out: mpsc::UnboundedSender<String>,
}

impl Context {
    pub fn new(state: Arc<AppState>, out: mpsc::UnboundedSender<String>) -> Self {
        Self { state, out }
    }

    pub fn data(&self) -> &AppState {
        &self.state
    }

    /// Queue a block of text for the console.
    pub fn say(&self, text: impl Into<String>) {
        // The printer only goes away at shutdown.
        let _ = self.out.send(text.into());
    }
}

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Rate(Rating, Option<String>),
    Details(Option<String>),
    Open(String),
    Close,
    Dashboard,
    Search(String),
    New,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Ask(line.trim_end_matches(['\r', '\n']).to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let optional = (!arg.is_empty()).then(|| arg.to_string());

        match name {
            "good" | "up" => Command::Rate(Rating::Positive, optional),
            "bad" | "down" => Command::Rate(Rating::Negative, optional),
            "details" => Command::Details(optional),
            "open" if !arg.is_empty() => Command::Open(arg.to_string()),
            "close" => Command::Close,
            "dashboard" => Command::Dashboard,
            "search" if !arg.is_empty() => Command::Search(arg.to_string()),
            "new" => Command::New,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run one line of input.
pub async fn dispatch(ctx: &Context, line: &str) -> Result<Flow> {
    match Command::parse(line) {
        Command::Ask(question) => ask::ask(ctx, &question)?,
        Command::Rate(rating, id) => feedback::rate(ctx, rating, id.as_deref())?,
        Command::Details(id) => sources::details(ctx, id.as_deref())?,
        Command::Open(target) => sources::open(ctx, &target)?,
        Command::Close => sources::close(ctx)?,
        Command::Dashboard => dashboard::dashboard(ctx).await?,
        Command::Search(query) => dashboard::search(ctx, &query).await?,
        Command::New => manage::new_conversation(ctx)?,
        Command::Help => manage::help(ctx)?,
        Command::Quit => return Ok(Flow::Quit),
        Command::Unknown(input) => {
            ctx.say(format!("Unknown command `{}`. Type /help for usage.", input));
        }
    }
    Ok(Flow::Continue)
}

/// Resolve an explicit interaction id, or default to the latest answer.
fn resolve_answer(snapshot: &Snapshot, id: Option<&str>) -> Option<InteractionId> {
    match id {
        Some(raw) => {
            // Prefer the stored id so feedback echoes the backend's own form.
            let typed = InteractionId::new(raw.trim_start_matches('#'));
            let stored = snapshot
                .entries
                .iter()
                .filter_map(ConversationEntry::as_answer)
                .find(|a| a.id == typed)
                .map(|a| a.id.clone());
            Some(stored.unwrap_or(typed))
        }
        None => snapshot.last_answer().map(|a| a.id.clone()),
    }
}
