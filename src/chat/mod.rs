pub mod store;
pub mod viewer;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::types::{FeedbackRequest, InteractionId, QueryRequest, Rating};
use crate::api::Backend;
use store::{Answer, ConversationEntry, EntryPatch, MessageStore, Snapshot};

/// Shown in place of an answer when the question request fails.
pub const ERROR_TEXT: &str = "Sorry, there was an error processing your request.";

/// Counts a question request as outstanding until dropped.
struct LoadingGuard(Arc<AtomicUsize>);

impl LoadingGuard {
    fn raise(in_flight: &Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight.clone())
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives the conversation: sends questions, records feedback, toggles
/// disclosure panels. All mutation goes through the [`MessageStore`].
pub struct ChatController {
    backend: Arc<dyn Backend>,
    store: MessageStore,
    input: Mutex<String>,
    in_flight: Arc<AtomicUsize>,
}

impl ChatController {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            store: MessageStore::new(),
            input: Mutex::new(String::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.store.subscribe()
    }

    /// True while at least one question request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn input(&self) -> String {
        self.input.lock().clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        *self.input.lock() = text.into();
    }

    /// Send whatever is in the input buffer.
    pub fn submit(&self) -> Option<JoinHandle<()>> {
        let text = self.input();
        self.send(&text)
    }

    /// Ask a question.
    ///
    /// Blank input is ignored and returns `None`. Otherwise the user entry is
    /// appended, the input buffer cleared and the loading flag raised before
    /// this returns; the request itself runs on the returned task, which
    /// appends exactly one answer or error entry.
    pub fn send(&self, question: &str) -> Option<JoinHandle<()>> {
        if question.trim().is_empty() {
            debug!("ignoring blank question");
            return None;
        }

        let generation = self.store.generation();
        self.store.append(ConversationEntry::User {
            text: question.to_string(),
        });
        self.input.lock().clear();
        let guard = LoadingGuard::raise(&self.in_flight);

        let backend = self.backend.clone();
        let store = self.store.clone();
        let request = QueryRequest {
            question: question.to_string(),
        };

        Some(tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();

            let entry = match backend.query(&request).await {
                Ok(resp) => {
                    info!(
                        interaction_id = %resp.interaction_id,
                        references = resp.file_references.as_ref().map_or(0, Vec::len),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "answer received"
                    );
                    ConversationEntry::Answer(Answer::new(
                        resp.interaction_id,
                        resp.answer,
                        resp.file_references.unwrap_or_default(),
                        resp.retrieval_metrics,
                    ))
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "question request failed"
                    );
                    ConversationEntry::Error {
                        text: ERROR_TEXT.to_string(),
                    }
                }
            };

            store.append_if_current(generation, entry);
        }))
    }

    /// Rate an answer. The request is sent even if `id` is unknown; the entry
    /// is only marked once the backend confirms. Failures are logged.
    pub fn submit_feedback(&self, id: &InteractionId, rating: Rating) -> JoinHandle<()> {
        let generation = self.store.generation();
        let backend = self.backend.clone();
        let store = self.store.clone();
        let request = FeedbackRequest::new(id.clone(), rating);

        tokio::spawn(async move {
            match backend.feedback(&request).await {
                Ok(()) => {
                    let id = &request.interaction_id;
                    let applied = store.update_if_current(generation, id, |_| {
                        EntryPatch::feedback(rating.into())
                    });
                    info!(%id, rating = request.rating, applied, "feedback recorded");
                }
                Err(e) => {
                    warn!(
                        id = %request.interaction_id,
                        rating = request.rating,
                        error = %e,
                        "feedback request failed"
                    );
                }
            }
        })
    }

    /// Flip the metrics/references panel of an answer. Returns false if no
    /// answer has this id.
    pub fn toggle_disclosure(&self, id: &InteractionId) -> bool {
        self.store
            .update(id, |answer| EntryPatch::disclosure(!answer.disclosure_open))
    }

    /// Drop the conversation. Replies still in flight are discarded.
    pub fn reset(&self) {
        self.store.reset();
        self.input.lock().clear();
        info!("conversation reset");
    }
}
