use anyhow::Result;

use super::Context;

const HELP: &str = "\
Type a question and press Enter to ask it.
  /good [id]      rate an answer helpful (latest by default)
  /bad [id]       rate an answer unhelpful
  /details [id]   show or hide retrieval metrics and sources
  /open <n|path>  view source n of the latest answer, or a document path
  /close          close the document viewer
  /search <text>  search the reference documents
  /dashboard      show usage statistics
  /new            start a new conversation
  /quit           exit";

/// Start over with an empty conversation.
pub fn new_conversation(ctx: &Context) -> Result<()> {
    ctx.data().chat.reset();
    ctx.data().viewer.close();
    ctx.say("Started a new conversation.");
    Ok(())
}

pub fn help(ctx: &Context) -> Result<()> {
    ctx.say(HELP);
    Ok(())
}
