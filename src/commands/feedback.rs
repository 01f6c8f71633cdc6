use anyhow::Result;

use super::{resolve_answer, Context};
use crate::api::types::Rating;

/// Rate an answer (latest one when no id is given).
pub fn rate(ctx: &Context, rating: Rating, id: Option<&str>) -> Result<()> {
    let chat = &ctx.data().chat;
    let Some(id) = resolve_answer(&chat.snapshot(), id) else {
        ctx.say("There is no answer to rate yet.");
        return Ok(());
    };
    chat.submit_feedback(&id, rating);
    Ok(())
}
