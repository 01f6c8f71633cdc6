use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use srd_chat::api::{Backend, HttpBackend};
use srd_chat::chat::store::ConversationEntry;
use srd_chat::commands::{self, Context, Flow};
use srd_chat::render;
use srd_chat::state::{AppState, ClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    // Logs go to stderr so they never interleave with the transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env().context("Invalid configuration")?;
    info!(
        base_url = %config.base_url,
        corpus_root = %config.corpus_root,
        timeout = ?config.request_timeout,
        "Backend configured"
    );

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config)?);
    let state = Arc::new(AppState::new(config, backend));

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            println!("{}", text);
        }
    });

    // Print answers, errors and panel changes as the store publishes them.
    // User entries are not echoed; the user just typed them.
    let mut snapshots = state.chat.subscribe();
    let transcript_tx = out_tx.clone();
    let renderer = tokio::spawn(async move {
        let mut shown = snapshots.borrow_and_update().clone();
        while snapshots.changed().await.is_ok() {
            let next = snapshots.borrow_and_update().clone();
            for i in render::changed_entries(&shown, &next) {
                let entry = &next.entries[i];
                if matches!(entry, ConversationEntry::User { .. }) {
                    continue;
                }
                let _ = transcript_tx.send(render::render_entry(entry));
            }
            shown = next;
        }
    });

    let ctx = Context::new(state.clone(), out_tx);
    ctx.say("Ask anything about the D&D 5e SRD. Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match commands::dispatch(&ctx, &line).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => {
                error!("Command failed: {:#}", e);
                ctx.say(format!("Error: {:#}", e));
            }
        }
    }

    // Tear the view down: anything still in flight is discarded on arrival.
    state.chat.reset();
    renderer.abort();
    drop(ctx);
    if tokio::time::timeout(Duration::from_millis(250), printer)
        .await
        .is_err()
    {
        info!("Exiting with requests still in flight");
    }
    info!("Goodbye");

    Ok(())
}
