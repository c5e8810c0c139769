use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guild_state::{GatewayEvent, State, StateConfig};

/// Guild creates for large guilds are big; anything past this is not a frame.
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Replay newline-delimited gateway dispatch frames into a state cache and
/// report what ended up cached.
#[derive(Parser, Debug)]
#[command(name = "guild-state-replay", version)]
struct Args {
    /// File of `{"t": ..., "d": ...}` frames, one per line. Reads stdin when omitted.
    input: Option<PathBuf>,
    #[arg(long, default_value = "guild-state.toml")]
    config: PathBuf,
    /// Seconds to wait after the input ends, so pending offline evictions fire.
    #[arg(long)]
    linger: Option<u64>,
}

#[derive(Debug, Default)]
struct ReplayCounts {
    frames: usize,
    applied: usize,
    ignored: usize,
    undecodable: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = StateConfig::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    let state = State::new(config);

    let counts = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            replay(&state, file).await?
        }
        None => replay(&state, tokio::io::stdin()).await?,
    };

    if let Some(secs) = args.linger {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    let stats = state.stats();
    info!(
        frames = counts.frames,
        applied = counts.applied,
        ignored = counts.ignored,
        undecodable = counts.undecodable,
        "replay finished"
    );
    info!(
        guilds = stats.guilds,
        channels = stats.channels,
        private_channels = stats.private_channels,
        members = stats.members,
        messages = stats.messages,
        "state summary"
    );
    Ok(())
}

async fn replay(state: &State, input: impl AsyncRead + Unpin) -> Result<ReplayCounts> {
    let mut lines = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
    let mut counts = ReplayCounts::default();

    while let Some(line) = lines.next().await {
        let line = line.context("failed to read frame")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        counts.frames += 1;

        match serde_json::from_str::<GatewayEvent>(line) {
            Ok(event) => {
                if state.dispatch(&event) {
                    counts.applied += 1;
                } else {
                    counts.ignored += 1;
                }
            }
            Err(e) => {
                counts.undecodable += 1;
                warn!(frame = counts.frames, error = %e, "skipping undecodable frame");
            }
        }
    }

    Ok(counts)
}
