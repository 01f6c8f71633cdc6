use anyhow::Result;
use tracing::info;

use super::Context;

/// Ask the assistant a question. The answer is printed by the transcript
/// renderer once it arrives.
pub fn ask(ctx: &Context, question: &str) -> Result<()> {
    let chat = &ctx.data().chat;
    chat.set_input(question);
    if chat.submit().is_some() {
        info!(len = question.len(), "question sent");
        ctx.say("(thinking...)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::tests::{drain, harness};
    use crate::test_support::{goblin_answer, FakeBackend};

    #[tokio::test]
    async fn test_ask_sends_and_acknowledges() {
        let backend = Arc::new(FakeBackend::new());
        let reply = backend.gate_query();
        let (ctx, mut rx) = harness(&backend);

        ask(&ctx, "What is a goblin?").unwrap();

        assert_eq!(drain(&mut rx), vec!["(thinking...)".to_string()]);
        assert!(ctx.data().chat.is_loading());
        assert_eq!(ctx.data().chat.snapshot().len(), 1);
        reply.send(Ok(goblin_answer())).unwrap();
    }

    #[tokio::test]
    async fn test_blank_question_is_silent() {
        let backend = Arc::new(FakeBackend::new());
        let (ctx, mut rx) = harness(&backend);

        ask(&ctx, "  ").unwrap();

        assert!(drain(&mut rx).is_empty());
        assert!(ctx.data().chat.snapshot().is_empty());
    }
}
