use anyhow::Result;

use super::{resolve_answer, Context};
use crate::render::render_viewer;

/// Toggle the metrics/sources panel of an answer.
pub fn details(ctx: &Context, id: Option<&str>) -> Result<()> {
    let chat = &ctx.data().chat;
    let Some(id) = resolve_answer(&chat.snapshot(), id) else {
        ctx.say("There is no answer to expand yet.");
        return Ok(());
    };
    if !chat.toggle_disclosure(&id) {
        ctx.say(format!("No answer with id #{}.", id));
    }
    Ok(())
}

/// Open a source document, either by its number in the latest answer's
/// source list or by path.
pub fn open(ctx: &Context, target: &str) -> Result<()> {
    let path = match target.parse::<usize>() {
        Ok(n) => {
            let snapshot = ctx.data().chat.snapshot();
            let reference = snapshot
                .last_answer()
                .and_then(|a| n.checked_sub(1).and_then(|i| a.file_references.get(i)))
                .cloned();
            match reference {
                Some(path) => path,
                None => {
                    ctx.say(format!("The latest answer has no source [{}].", n));
                    return Ok(());
                }
            }
        }
        Err(_) => target.to_string(),
    };

    let viewer = &ctx.data().viewer;
    let fetch = viewer.open(&path);
    let title = viewer.title().unwrap_or_default();
    ctx.say(render_viewer(&title, &viewer.state()));

    // Show the document once the fetch settles, unless the user moved on.
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if fetch.await.is_err() {
            return;
        }
        let viewer = &ctx.data().viewer;
        if viewer.selected().as_deref() == Some(path.as_str()) {
            let text = render_viewer(&title, &viewer.state());
            if !text.is_empty() {
                ctx.say(text);
            }
        }
    });
    Ok(())
}

pub fn close(ctx: &Context) -> Result<()> {
    ctx.data().viewer.close();
    Ok(())
}
