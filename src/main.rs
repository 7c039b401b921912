//! scope-link - Main Entry Point
//!
//! Runs the pipeline controller headless. With `--synthetic` a ramp source
//! feeds the data queue; packets reaching the host side are counted and
//! logged.

use anyhow::Context;
use clap::Parser;
use scope_link::{
    config::{ScopeConfig, DEFAULT_CONFIG_FILE},
    pipeline::{Buffer, ChannelQueue, Controller, HandoffQueue, SyntheticSource, RAMP_MIDPOINT},
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "scope-link")]
#[command(about = "Acquisition-to-host pipeline controller", long_about = None)]
struct Args {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Also write a daily rolling log file into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Feed the pipeline from the synthetic ramp source
    #[arg(short, long)]
    synthetic: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let file_layer = args.log_dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "scope-link.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (layer, guard)
    });
    let (file_layer, _log_guard) = match file_layer {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,scope_link=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    tracing::info!("Starting scope-link");

    let config = if args.config.exists() {
        ScopeConfig::load(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        tracing::info!("No config at {:?}, using defaults", args.config);
        ScopeConfig::default()
    };

    let queues = &config.queues;
    let data_queue: Arc<dyn HandoffQueue<Buffer>> = Arc::new(ChannelQueue::with_capacity(
        "data",
        queues.data.capacity,
        queues.data.overflow,
    ));

    let synthetic = config.synthetic.clone();
    let controller =
        Controller::new(config, Arc::clone(&data_queue)).context("starting controller")?;

    let mut source = if args.synthetic {
        controller.set_channel_count(synthetic.channel_count)?;
        controller.set_trigger_level(RAMP_MIDPOINT);
        Some(SyntheticSource::spawn(Arc::clone(&data_queue), &synthetic)?)
    } else {
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    controller.unpause();

    let link = controller.host_link();
    let started = Instant::now();
    let deadline = args.duration_secs.map(Duration::from_secs);
    let mut received = 0usize;
    let mut received_bytes = 0usize;

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        for packet in link.drain() {
            received += 1;
            received_bytes += packet.data_size();
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    tracing::info!("Shutting down");
    if let Some(source) = source.as_mut() {
        source.stop();
    }
    let stats = controller.stats();
    drop(controller);

    tracing::info!(
        "Received {} packets ({} bytes); {} commands dispatched, {} rejected, {} flushes",
        received,
        received_bytes,
        stats.commands_dispatched,
        stats.commands_rejected,
        stats.flushes
    );
    Ok(())
}
