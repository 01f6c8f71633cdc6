use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::Backend;
use crate::chat::viewer::DocumentViewer;
use crate::chat::ChatController;

/// Connection settings injected into every controller at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL, no trailing slash.
    pub base_url: String,
    /// Corpus-root segment stripped from document paths before rendering.
    pub corpus_root: String,
    /// `None` means requests never time out.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            corpus_root: "data/dnd_srd".to_string(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let base_url = lookup("SRD_CHAT_API_URL")
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let corpus_root = lookup("SRD_CHAT_CORPUS_ROOT")
            .map(|s| s.trim().trim_matches('/').to_string())
            .unwrap_or(defaults.corpus_root);

        let request_timeout = match lookup("SRD_CHAT_TIMEOUT_SECS") {
            Some(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("SRD_CHAT_TIMEOUT_SECS is not a number: {raw}"))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            _ => None,
        };

        Ok(Self {
            base_url,
            corpus_root,
            request_timeout,
        })
    }
}

pub struct AppState {
    pub config: ClientConfig,
    pub backend: Arc<dyn Backend>,
    pub chat: ChatController,
    pub viewer: DocumentViewer,
}

impl AppState {
    pub fn new(config: ClientConfig, backend: Arc<dyn Backend>) -> Self {
        let chat = ChatController::new(backend.clone());
        let viewer = DocumentViewer::new(backend.clone(), &config);
        Self {
            config,
            backend,
            chat,
            viewer,
        }
    }
}
