use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Backend};
use crate::state::ClientConfig;

/// What the viewer modal should currently show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerState {
    Closed,
    Loading,
    Loaded(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    Loading,
    Loaded(String),
    Failed(String),
}

#[derive(Debug)]
struct Inner {
    selected: Option<String>,
    open: bool,
    content: Content,
    /// Bumped on every `open`; late replies for older requests are dropped.
    request_seq: u64,
}

/// Strip an optional leading `./` (or `.`, `/`) and the corpus-root segment
/// from a document path as returned in answer references.
pub fn normalize_document_path(path: &str, corpus_root: &str) -> String {
    let rest = path.strip_prefix('.').unwrap_or(path);
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let rest = if corpus_root.is_empty() {
        rest
    } else {
        rest.strip_prefix(corpus_root)
            .and_then(|r| r.strip_prefix('/'))
            .unwrap_or(rest)
    };
    rest.to_string()
}

/// Last path segment, used as the viewer heading.
pub fn document_title(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn failure_message(err: &ApiError) -> String {
    match err {
        ApiError::Status {
            status,
            status_text,
        } => format!("Error loading markdown content: {} {}", status, status_text),
        other => format!("Error loading markdown content: {}", other),
    }
}

/// Modal that fetches and shows a referenced source document.
pub struct DocumentViewer {
    backend: Arc<dyn Backend>,
    corpus_root: String,
    inner: Arc<Mutex<Inner>>,
}

impl DocumentViewer {
    pub fn new(backend: Arc<dyn Backend>, config: &ClientConfig) -> Self {
        Self {
            backend,
            corpus_root: config.corpus_root.clone(),
            inner: Arc::new(Mutex::new(Inner {
                selected: None,
                open: false,
                content: Content::Loading,
                request_seq: 0,
            })),
        }
    }

    /// Open the modal on `document_path` and start fetching its rendered content.
    pub fn open(&self, document_path: &str) -> JoinHandle<()> {
        let relative = normalize_document_path(document_path, &self.corpus_root);
        let seq = {
            let mut inner = self.inner.lock();
            inner.selected = Some(document_path.to_string());
            inner.open = true;
            inner.content = Content::Loading;
            inner.request_seq += 1;
            inner.request_seq
        };
        debug!(path = document_path, %relative, "opening document");

        let backend = self.backend.clone();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let content = match backend.render_markdown(&relative).await {
                Ok(markdown) => {
                    info!(%relative, bytes = markdown.len(), "document loaded");
                    Content::Loaded(markdown)
                }
                Err(e) => {
                    warn!(%relative, error = %e, "document render failed");
                    Content::Failed(failure_message(&e))
                }
            };

            let mut inner = inner.lock();
            if inner.request_seq == seq {
                inner.content = content;
            } else {
                debug!(%relative, "discarding superseded document");
            }
        })
    }

    /// Hide the modal. The last selection is kept.
    pub fn close(&self) {
        self.inner.lock().open = false;
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    pub fn selected(&self) -> Option<String> {
        self.inner.lock().selected.clone()
    }

    pub fn title(&self) -> Option<String> {
        self.selected().map(|path| document_title(&path).to_string())
    }

    pub fn state(&self) -> ViewerState {
        let inner = self.inner.lock();
        if !inner.open {
            return ViewerState::Closed;
        }
        match &inner.content {
            Content::Loading => ViewerState::Loading,
            Content::Loaded(markdown) => ViewerState::Loaded(markdown.clone()),
            Content::Failed(message) => ViewerState::Failed(message.clone()),
        }
    }
}
