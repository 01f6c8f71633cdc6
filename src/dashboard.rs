use tracing::warn;

use crate::api::types::{
    AnswerMetrics, FeedbackStats, QueryTopics, ResponseTimeStats, SearchHit, UsageStats,
};
use crate::api::{ApiError, Backend};

/// All aggregate panels, fetched together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardData {
    pub feedback: FeedbackStats,
    pub response_time: ResponseTimeStats,
    pub query_topics: QueryTopics,
    pub usage: UsageStats,
    pub answer_metrics: AnswerMetrics,
}

/// Fetch every panel concurrently. One failure fails the whole dashboard.
pub async fn fetch_dashboard(backend: &dyn Backend) -> Result<DashboardData, ApiError> {
    let (feedback, response_time, query_topics, usage, answer_metrics) = futures::try_join!(
        backend.feedback_stats(),
        backend.response_time_stats(),
        backend.query_topics(),
        backend.usage_stats(),
        backend.answer_metrics(),
    )?;

    Ok(DashboardData {
        feedback,
        response_time,
        query_topics,
        usage,
        answer_metrics,
    })
}

/// Topics by count, highest first, ties broken by name.
pub fn top_topics(topics: &QueryTopics, limit: usize) -> Vec<(&str, u64)> {
    let mut ranked: Vec<(&str, u64)> = topics.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(limit);
    ranked
}

/// Positive and negative share of all ratings, in percent.
pub fn feedback_shares(stats: &FeedbackStats) -> (f64, f64) {
    let total = stats.positive_feedback + stats.negative_feedback;
    if total == 0 {
        return (0.0, 0.0);
    }
    let total = total as f64;
    (
        stats.positive_feedback as f64 / total * 100.0,
        stats.negative_feedback as f64 / total * 100.0,
    )
}

/// Search the corpus. Errors are logged and yield no results.
pub async fn search(backend: &dyn Backend, query: &str) -> Vec<SearchHit> {
    match backend.search(query).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(query, error = %e, "search failed");
            Vec::new()
        }
    }
}
