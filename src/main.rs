//! pixeldump CLI: one-shot canvas snapshots and recorded time-lapses.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

use pixeldump::{export, Dumper, DEFAULT_BATCH_SIZE, DEFAULT_GRID_SPLIT, DEFAULT_POOL_SIZE};

#[derive(Debug, Parser)]
#[command(
    name = "pixeldump",
    about = "Dump a Pixelflut canvas to PNG snapshots",
    version
)]
struct Args {
    /// Host of the Pixelflut server.
    #[arg(long, env = "PIXELFLUT_HOST", default_value = "localhost")]
    host: String,

    /// Port of the server.
    #[arg(short, long, env = "PIXELFLUT_PORT", default_value_t = 1234)]
    port: u16,

    /// Number of pooled connections.
    #[arg(short, long, default_value_t = DEFAULT_POOL_SIZE)]
    connections: usize,

    /// Grid cells per axis used to partition the canvas.
    #[arg(long, default_value_t = DEFAULT_GRID_SPLIT)]
    grid: u32,

    /// Read requests pipelined per flush.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Output file (snapshot mode) or directory (record mode).
    #[arg(short, long, default_value = "canvas.png")]
    output: PathBuf,

    /// Keep dumping and write a numbered frame on every interval tick
    /// until Ctrl-C.
    #[arg(long)]
    record: bool,

    /// Seconds between frames in record mode.
    #[arg(long, default_value_t = 5, value_name = "SECONDS")]
    interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(host = %args.host, port = args.port, "dumping from server");

    let dumper = Dumper::builder(args.host.clone(), args.port)
        .pool_size(args.connections)
        .grid(args.grid, args.grid)
        .batch_size(args.batch_size)
        .connect()
        .await?;

    let result = if args.record {
        record(&dumper, &args).await
    } else {
        snapshot(&dumper, &args).await
    };

    dumper.shutdown().await;
    let masked = dumper.parse_failures().await;
    if masked > 0 {
        tracing::warn!(
            masked,
            "response lines failed to decode and were masked by fallback values"
        );
    }

    result
}

async fn snapshot(dumper: &Dumper<TcpStream>, args: &Args) -> anyhow::Result<()> {
    let buffer = dumper.snapshot().await?;
    export::export_png(&buffer, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}

/// Run the area loops and export a frame per interval tick until Ctrl-C.
/// The timer is independent of the loops, so frames may tear across area
/// generations.
async fn record(dumper: &Dumper<TcpStream>, args: &Args) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let recording = dumper.start_recording().await?;
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately; discard it so frame 1 has a
    // full interval of data behind it.
    ticker.tick().await;

    let mut frame = 0u32;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                frame += 1;
                write_frame(&recording, &args.output, frame);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping recording");
                break;
            }
        }
    }

    let buffer = recording.stop().await;
    frame += 1;
    let path = frame_path(&args.output, frame);
    export::export_png(&buffer, &path)
        .with_context(|| format!("writing final frame {}", path.display()))?;
    tracing::info!(frames = frame, "recording finished");
    Ok(())
}

fn write_frame(recording: &pixeldump::Recording, dir: &std::path::Path, frame: u32) {
    let path = frame_path(dir, frame);
    if let Err(err) = export::export_png(recording.buffer(), &path) {
        tracing::error!(frame, error = %err, "frame export failed");
    }
}

fn frame_path(dir: &std::path::Path, frame: u32) -> PathBuf {
    dir.join(format!("frame-{frame:05}.png"))
}
