//! Subcommand definitions and dispatch.

use anyhow::{Result, bail};
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use tsync_client::{Request, RequestMode, Response};
use tsync_engine::Engine;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Precache critical assets, then activate
    Install,

    /// Delete stale caches, open the offline store and claim pages
    Activate,

    /// Send a request through the interceptor
    Fetch {
        /// Path or absolute URL
        target: String,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(long, short = 'd')]
        data: Option<String>,

        /// Issue the request as a page navigation
        #[arg(long)]
        navigate: bool,
    },

    /// Replay queued result writes
    Sync {
        /// Sync tag to fire (defaults to the configured tag)
        #[arg(long)]
        tag: Option<String>,
    },

    /// Download a quiz for offline use
    Download { id: i64 },

    /// Remove a downloaded quiz
    Remove { id: i64 },

    /// Refresh quiz summaries from the listing
    Refresh,

    /// List downloaded quizzes
    Downloads,

    /// List stored quiz summaries
    Summaries,

    /// List queued result writes
    Pending,

    /// Unregister and reload open pages
    Unregister,

    /// Delete every named cache
    ClearCaches,
}

pub async fn run(engine: &Engine, command: Command) -> Result<()> {
    match command {
        Command::Install => {
            let install = engine.install().await?;
            let activate = engine.activate().await?;
            print(&json!({ "install": install, "activate": activate }))
        }
        Command::Activate => {
            engine.resume().await?;
            print(&engine.activate().await?)
        }
        Command::Fetch { target, method, data, navigate } => {
            if !engine.resume().await? {
                tracing::warn!("engine not installed, request goes straight to the network");
            }
            let mut request = Request::new(&method, engine.url(&target)?);
            if navigate {
                request = request.with_mode(RequestMode::Navigate);
            }
            if let Some(data) = data {
                request = request.with_header("content-type", "application/json").with_body(data);
            }
            print_response(&engine.handle(request).await)
        }
        Command::Sync { tag } => {
            let tag = tag.unwrap_or_else(|| engine.config().sync_tag.clone());
            let report = engine.scheduler().fire(&tag).await?;
            if report.skipped {
                bail!("sync tag {tag} is not registered");
            }
            print(&report)
        }
        Command::Download { id } => print(&engine.download_for_offline(id).await?.to_value()),
        Command::Remove { id } => print(&json!({ "id": id, "removed": engine.remove_offline(id).await? })),
        Command::Refresh => print(&json!({ "saved": engine.refresh_summaries().await? })),
        Command::Downloads => print(&engine.list_downloads().await?),
        Command::Summaries => print(&engine.list_summaries().await?),
        Command::Pending => print(&engine.list_pending().await?),
        Command::Unregister => {
            engine.resume().await?;
            print(&json!({ "reloaded": engine.unregister_and_reload().await? }))
        }
        Command::ClearCaches => print(&json!({ "deleted": engine.clear_caches().await? })),
    }
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_response(response: &Response) -> Result<()> {
    let body = response
        .body_json()
        .unwrap_or_else(|_| serde_json::Value::String(response.text()));
    print(&json!({
        "status": response.status,
        "ok": response.ok(),
        "network_error": response.is_network_error(),
        "headers": response.headers,
        "body": body,
    }))
}
