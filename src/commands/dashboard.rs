use anyhow::Result;
use tracing::warn;

use super::Context;
use crate::dashboard::{fetch_dashboard, search as search_corpus};
use crate::render::{render_dashboard, render_search};

/// Show aggregate usage statistics.
pub async fn dashboard(ctx: &Context) -> Result<()> {
    match fetch_dashboard(ctx.data().backend.as_ref()).await {
        Ok(data) => ctx.say(render_dashboard(&data)),
        Err(e) => {
            warn!(error = %e, "dashboard fetch failed");
            ctx.say("Dashboard unavailable.");
        }
    }
    Ok(())
}

/// Keyword search over the reference documents.
pub async fn search(ctx: &Context, query: &str) -> Result<()> {
    let hits = search_corpus(ctx.data().backend.as_ref(), query).await;
    ctx.say(render_search(query, &hits));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::tests::{drain, harness};
    use crate::test_support::{sample_dashboard, FakeBackend};

    #[tokio::test]
    async fn test_dashboard_renders_or_degrades() {
        let backend = Arc::new(FakeBackend::new());
        let (ctx, mut rx) = harness(&backend);

        dashboard(&ctx).await.unwrap();
        assert_eq!(drain(&mut rx), vec!["Dashboard unavailable.".to_string()]);

        backend.set_dashboard(Some(sample_dashboard()));
        dashboard(&ctx).await.unwrap();
        assert!(drain(&mut rx)[0].starts_with("Dashboard\n"));
    }

    #[tokio::test]
    async fn test_search_reports_no_results_on_failure() {
        let backend = Arc::new(FakeBackend::new());
        let (ctx, mut rx) = harness(&backend);

        search(&ctx, "goblin").await.unwrap();

        assert_eq!(drain(&mut rx), vec!["No results for 'goblin'.".to_string()]);
    }
}
