use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::api::types::{
    AnswerMetrics, FeedbackRequest, FeedbackStats, InteractionId, QueryRequest, QueryResponse,
    QueryTopics, ResponseTimeStats, SearchHit, UsageStats,
};
use crate::api::{ApiError, Backend};
use crate::dashboard::DashboardData;

type Reply<T> = Result<T, ApiError>;

enum Scripted<T> {
    Ready(Reply<T>),
    Gated(oneshot::Receiver<Reply<T>>),
}

struct Script<T> {
    queue: Mutex<VecDeque<Scripted<T>>>,
}

impl<T> Script<T> {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, reply: Reply<T>) {
        self.queue.lock().push_back(Scripted::Ready(reply));
    }

    fn gate(&self) -> oneshot::Sender<Reply<T>> {
        let (tx, rx) = oneshot::channel();
        self.queue.lock().push_back(Scripted::Gated(rx));
        tx
    }

    /// Replies are consumed in call order. Runs out into a transport error.
    async fn next(&self) -> Reply<T> {
        let scripted = self.queue.lock().pop_front();
        match scripted {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Transport("gate dropped".to_string()))),
            None => Err(ApiError::Transport("no scripted reply".to_string())),
        }
    }
}

/// Scriptable in-memory [`Backend`]. Calls are recorded before any reply is
/// awaited, and gated replies let a test decide completion order.
pub struct FakeBackend {
    queries: Script<QueryResponse>,
    feedback: Script<()>,
    markdown: Script<String>,
    query_calls: Mutex<Vec<QueryRequest>>,
    feedback_calls: Mutex<Vec<FeedbackRequest>>,
    render_calls: Mutex<Vec<String>>,
    dashboard: Mutex<Option<DashboardData>>,
    search_hits: Mutex<Option<Vec<SearchHit>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            queries: Script::new(),
            feedback: Script::new(),
            markdown: Script::new(),
            query_calls: Mutex::new(Vec::new()),
            feedback_calls: Mutex::new(Vec::new()),
            render_calls: Mutex::new(Vec::new()),
            dashboard: Mutex::new(None),
            search_hits: Mutex::new(None),
        }
    }

    pub fn answer(id: &str, text: &str) -> QueryResponse {
        QueryResponse {
            answer: text.to_string(),
            interaction_id: InteractionId::new(id),
            file_references: None,
            retrieval_metrics: None,
        }
    }

    pub fn push_query(&self, reply: Reply<QueryResponse>) {
        self.queries.push(reply);
    }

    pub fn gate_query(&self) -> oneshot::Sender<Reply<QueryResponse>> {
        self.queries.gate()
    }

    pub fn push_feedback(&self, reply: Reply<()>) {
        self.feedback.push(reply);
    }

    pub fn gate_feedback(&self) -> oneshot::Sender<Reply<()>> {
        self.feedback.gate()
    }

    pub fn push_markdown(&self, reply: Reply<String>) {
        self.markdown.push(reply);
    }

    pub fn gate_markdown(&self) -> oneshot::Sender<Reply<String>> {
        self.markdown.gate()
    }

    /// `None` makes every dashboard endpoint fail.
    pub fn set_dashboard(&self, data: Option<DashboardData>) {
        *self.dashboard.lock() = data;
    }

    /// `None` makes search fail.
    pub fn set_search(&self, hits: Option<Vec<SearchHit>>) {
        *self.search_hits.lock() = hits;
    }

    pub fn query_calls(&self) -> Vec<QueryRequest> {
        self.query_calls.lock().clone()
    }

    pub fn feedback_calls(&self) -> Vec<FeedbackRequest> {
        self.feedback_calls.lock().clone()
    }

    pub fn render_calls(&self) -> Vec<String> {
        self.render_calls.lock().clone()
    }

    fn panel<T>(&self, pick: impl FnOnce(&DashboardData) -> T) -> Reply<T> {
        self.dashboard.lock().as_ref().map(pick).ok_or(ApiError::Status {
            status: 503,
            status_text: "Service Unavailable".to_string(),
        })
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn query(&self, request: &QueryRequest) -> Reply<QueryResponse> {
        self.query_calls.lock().push(request.clone());
        self.queries.next().await
    }

    async fn feedback(&self, request: &FeedbackRequest) -> Reply<()> {
        self.feedback_calls.lock().push(request.clone());
        self.feedback.next().await
    }

    async fn render_markdown(&self, relative_path: &str) -> Reply<String> {
        self.render_calls.lock().push(relative_path.to_string());
        self.markdown.next().await
    }

    async fn feedback_stats(&self) -> Reply<FeedbackStats> {
        self.panel(|d| d.feedback.clone())
    }

    async fn response_time_stats(&self) -> Reply<ResponseTimeStats> {
        self.panel(|d| d.response_time.clone())
    }

    async fn query_topics(&self) -> Reply<QueryTopics> {
        self.panel(|d| d.query_topics.clone())
    }

    async fn usage_stats(&self) -> Reply<UsageStats> {
        self.panel(|d| d.usage.clone())
    }

    async fn answer_metrics(&self) -> Reply<AnswerMetrics> {
        self.panel(|d| d.answer_metrics.clone())
    }

    async fn search(&self, _query: &str) -> Reply<Vec<SearchHit>> {
        self.search_hits
            .lock()
            .clone()
            .ok_or(ApiError::Transport("search offline".to_string()))
    }
}

/// The reply used throughout the chat tests.
pub fn goblin_answer() -> QueryResponse {
    let metrics = serde_json::json!({ "score": 0.9 });
    QueryResponse {
        answer: "A small humanoid.".to_string(),
        interaction_id: InteractionId::new("42"),
        file_references: Some(vec!["monsters/goblin.md".to_string()]),
        retrieval_metrics: metrics.as_object().cloned(),
    }
}

pub fn sample_dashboard() -> DashboardData {
    DashboardData {
        feedback: FeedbackStats {
            positive_feedback: 8,
            negative_feedback: 2,
        },
        response_time: ResponseTimeStats {
            min_response_time: 0.4,
            average_response_time: 1.5,
            max_response_time: 6.25,
        },
        query_topics: [("what", 12), ("how", 4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        usage: UsageStats {
            total_queries: 120,
            queries_last_week: 17,
        },
        answer_metrics: AnswerMetrics {
            average_tokens: 212.5,
        },
    }
}
