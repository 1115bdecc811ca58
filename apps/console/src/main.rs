use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use session_core::{Renderer, SessionController};
use tokio::io::{AsyncBufReadExt, BufReader};
use transport::{ConferenceTransport, MissingConferenceTransport};

mod config;
mod renderer;

use renderer::TerminalRenderer;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the conference settings file.
    #[arg(long, default_value = "conference.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings(&args.config);

    // TODO: wire an SDK-backed ConferenceTransport implementation.
    let transport: Arc<dyn ConferenceTransport> = Arc::new(MissingConferenceTransport::new());
    let renderer = Arc::new(TerminalRenderer);
    let controller =
        SessionController::new(transport, Arc::clone(&renderer) as Arc<dyn Renderer>);

    renderer.render(&controller.snapshot().await);

    let mut notices = controller.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            tracing::warn!(?notice, "session notice");
        }
    });

    println!("commands: join | publish | unpublish | leave | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "join" => match controller.join(settings.join_options()).await {
                Ok(uid) => println!("joined channel {} as {uid}", settings.channel),
                Err(err) => eprintln!("join failed: {err}"),
            },
            "publish" => {
                if let Err(err) = controller.publish().await {
                    eprintln!("publish failed: {err}");
                }
            }
            "unpublish" => {
                if let Err(err) = controller.unpublish().await {
                    eprintln!("unpublish failed: {err}");
                }
            }
            "leave" => {
                if let Err(err) = controller.leave().await {
                    eprintln!("leave failed: {err}");
                }
            }
            "quit" | "exit" => break,
            other => eprintln!("unknown command: {other} (expected join|publish|unpublish|leave|quit)"),
        }
    }

    Ok(())
}
