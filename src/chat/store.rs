use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::types::{InteractionId, Rating, RetrievalMetrics};

/// Feedback recorded on an answer after the backend confirmed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feedback {
    #[default]
    None,
    Positive,
    Negative,
}

impl From<Rating> for Feedback {
    fn from(rating: Rating) -> Self {
        match rating {
            Rating::Positive => Feedback::Positive,
            Rating::Negative => Feedback::Negative,
        }
    }
}

/// A successful backend answer. Only `feedback` and `disclosure_open` ever change.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub id: InteractionId,
    pub text: String,
    pub file_references: Vec<String>,
    pub metrics: Option<RetrievalMetrics>,
    pub feedback: Feedback,
    pub disclosure_open: bool,
}

impl Answer {
    pub fn new(
        id: InteractionId,
        text: String,
        file_references: Vec<String>,
        metrics: Option<RetrievalMetrics>,
    ) -> Self {
        Self {
            id,
            text,
            file_references,
            metrics,
            feedback: Feedback::None,
            disclosure_open: false,
        }
    }
}

/// One message unit in the chat log.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEntry {
    User { text: String },
    Answer(Answer),
    Error { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

impl ConversationEntry {
    pub fn text(&self) -> &str {
        match self {
            ConversationEntry::User { text } | ConversationEntry::Error { text } => text,
            ConversationEntry::Answer(answer) => &answer.text,
        }
    }

    pub fn sender(&self) -> Sender {
        match self {
            ConversationEntry::User { .. } => Sender::User,
            ConversationEntry::Answer(_) | ConversationEntry::Error { .. } => Sender::Bot,
        }
    }

    pub fn id(&self) -> Option<&InteractionId> {
        match self {
            ConversationEntry::Answer(answer) => Some(&answer.id),
            _ => None,
        }
    }

    pub fn as_answer(&self) -> Option<&Answer> {
        match self {
            ConversationEntry::Answer(answer) => Some(answer),
            _ => None,
        }
    }
}

/// Partial update for an answer entry. Unset fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub feedback: Option<Feedback>,
    pub disclosure_open: Option<bool>,
}

impl EntryPatch {
    pub fn feedback(feedback: Feedback) -> Self {
        Self {
            feedback: Some(feedback),
            ..Self::default()
        }
    }

    pub fn disclosure(open: bool) -> Self {
        Self {
            disclosure_open: Some(open),
            ..Self::default()
        }
    }

    fn apply(self, answer: &mut Answer) {
        if let Some(feedback) = self.feedback {
            answer.feedback = feedback;
        }
        if let Some(open) = self.disclosure_open {
            answer.disclosure_open = open;
        }
    }
}

/// Read-only view of the log handed to renderers.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub generation: u64,
    pub entries: Arc<[ConversationEntry]>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            entries: Arc::from(Vec::new()),
        }
    }
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }

    /// The most recent answer, if any.
    pub fn last_answer(&self) -> Option<&Answer> {
        self.entries.iter().rev().find_map(ConversationEntry::as_answer)
    }
}

#[derive(Default)]
struct Inner {
    entries: Vec<ConversationEntry>,
    /// Interaction id to position in `entries`.
    index: HashMap<InteractionId, usize>,
    generation: u64,
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            generation: self.generation,
            entries: self.entries.clone().into(),
        }
    }
}

/// Ordered, append-only log of conversation entries.
///
/// Cloning yields another handle to the same log. Every mutation publishes a
/// fresh [`Snapshot`] to subscribers before the call returns.
#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<Mutex<Inner>>,
    publisher: Arc<watch::Sender<Snapshot>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(Snapshot::default());
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            publisher: Arc::new(publisher),
        }
    }

    /// Receive a snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.publisher.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an entry. Never rejects.
    pub fn append(&self, entry: ConversationEntry) {
        let mut inner = self.inner.lock();
        Self::push(&mut inner, entry);
        self.publish(&inner);
    }

    /// Append only if the log is still at `generation`.
    /// Returns false when the result belongs to a discarded conversation.
    pub fn append_if_current(&self, generation: u64, entry: ConversationEntry) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(
                expected = generation,
                current = inner.generation,
                "dropping stale entry"
            );
            return false;
        }
        Self::push(&mut inner, entry);
        self.publish(&inner);
        true
    }

    /// Merge a patch into the answer with `id`. The closure sees the current
    /// answer under the lock. Unknown ids are a no-op and return false.
    pub fn update<F>(&self, id: &InteractionId, patch: F) -> bool
    where
        F: FnOnce(&Answer) -> EntryPatch,
    {
        self.update_inner(None, id, patch)
    }

    /// Like [`update`](Self::update) but only while the log is at `generation`.
    pub fn update_if_current<F>(&self, generation: u64, id: &InteractionId, patch: F) -> bool
    where
        F: FnOnce(&Answer) -> EntryPatch,
    {
        self.update_inner(Some(generation), id, patch)
    }

    fn update_inner<F>(&self, generation: Option<u64>, id: &InteractionId, patch: F) -> bool
    where
        F: FnOnce(&Answer) -> EntryPatch,
    {
        let mut inner = self.inner.lock();
        if let Some(expected) = generation {
            if inner.generation != expected {
                debug!(%id, expected, current = inner.generation, "dropping stale update");
                return false;
            }
        }
        let Some(&pos) = inner.index.get(id) else {
            debug!(%id, "update for unknown entry ignored");
            return false;
        };
        let ConversationEntry::Answer(answer) = &mut inner.entries[pos] else {
            return false;
        };
        patch(answer).apply(answer);
        self.publish(&inner);
        true
    }

    /// Start a fresh conversation. Results of in-flight work issued before
    /// this call will be discarded on arrival.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.index.clear();
        inner.generation += 1;
        self.publish(&inner);
    }

    fn push(inner: &mut Inner, entry: ConversationEntry) {
        if let ConversationEntry::Answer(answer) = &entry {
            let pos = inner.entries.len();
            if inner.index.contains_key(&answer.id) {
                warn!(id = %answer.id, "duplicate interaction id; keeping the first entry addressable");
            } else {
                inner.index.insert(answer.id.clone(), pos);
            }
        }
        inner.entries.push(entry);
    }

    fn publish(&self, inner: &Inner) {
        self.publisher.send_replace(inner.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(id: &str, text: &str) -> ConversationEntry {
        ConversationEntry::Answer(Answer::new(
            InteractionId::new(id),
            text.to_string(),
            vec![],
            None,
        ))
    }

    #[test]
    fn test_append_preserves_order() {
        let store = MessageStore::new();
        store.append(ConversationEntry::User {
            text: "hi".to_string(),
        });
        store.append(answer("1", "hello"));
        store.append(ConversationEntry::Error {
            text: "oops".to_string(),
        });

        let snap = store.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.entries[0].sender(), Sender::User);
        assert_eq!(snap.entries[1].id().map(|i| i.as_str()), Some("1"));
        assert_eq!(snap.entries[2].id(), None);
        assert_eq!(snap.entries[2].sender(), Sender::Bot);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let store = MessageStore::new();
        store.append(answer("1", "hello"));
        let before = store.snapshot();

        let applied = store.update(&InteractionId::new("missing"), |_| {
            EntryPatch::feedback(Feedback::Positive)
        });

        assert!(!applied);
        assert_eq!(store.snapshot().entries, before.entries);
    }

    #[test]
    fn test_update_merges_only_given_fields() {
        let store = MessageStore::new();
        store.append(answer("1", "hello"));
        let id = InteractionId::new("1");

        store.update(&id, |_| EntryPatch::disclosure(true));
        store.update(&id, |_| EntryPatch::feedback(Feedback::Negative));

        let snap = store.snapshot();
        let answer = snap.entries[0].as_answer().unwrap();
        assert!(answer.disclosure_open);
        assert_eq!(answer.feedback, Feedback::Negative);
        assert_eq!(answer.text, "hello");
    }

    #[test]
    fn test_every_mutation_publishes_snapshot() {
        let store = MessageStore::new();
        let mut rx = store.subscribe();

        store.append(answer("1", "hello"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.update(&InteractionId::new("1"), |_| EntryPatch::disclosure(true));
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert!(snap.entries[0].as_answer().unwrap().disclosure_open);
    }

    #[test]
    fn test_reset_discards_stale_results() {
        let store = MessageStore::new();
        let generation = store.generation();
        store.append(answer("1", "hello"));

        store.reset();

        assert!(store.is_empty());
        assert!(!store.append_if_current(generation, answer("2", "late")));
        assert!(!store.update_if_current(generation, &InteractionId::new("1"), |_| {
            EntryPatch::feedback(Feedback::Positive)
        }));
        assert!(store.is_empty());
        assert!(store.append_if_current(store.generation(), answer("3", "fresh")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_id_keeps_first_addressable() {
        let store = MessageStore::new();
        store.append(answer("7", "first"));
        store.append(answer("7", "second"));

        store.update(&InteractionId::new("7"), |_| EntryPatch::disclosure(true));

        let snap = store.snapshot();
        assert!(snap.entries[0].as_answer().unwrap().disclosure_open);
        assert!(!snap.entries[1].as_answer().unwrap().disclosure_open);
    }

    #[test]
    fn test_last_answer_skips_errors() {
        let store = MessageStore::new();
        store.append(answer("1", "hello"));
        store.append(ConversationEntry::Error {
            text: "oops".to_string(),
        });
        assert_eq!(store.snapshot().last_answer().unwrap().id.as_str(), "1");
    }
}
