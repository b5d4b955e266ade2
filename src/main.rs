//! doc-relink CLI
//!
//! Rewrites relative links in Markdown docs into absolute repository URLs
//! so they keep working once the docs are published elsewhere.

use anyhow::Result;
use clap::{ArgAction, Parser};
use doc_relink::relink_docs::{run_relink_docs, RelinkArgs};

#[derive(Parser)]
#[command(name = "doc-relink")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Rewrite relative Markdown links into repository blob/tree URLs")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    args: RelinkArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    run_relink_docs(cli.args).await
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries the JSON summary
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
