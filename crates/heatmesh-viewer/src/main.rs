use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use heatmesh_core::wire::Metric;
use heatmesh_field::inpaint::{FallbackTable, DEFAULT_MAX_PASSES};
use heatmesh_field::layout::CoordinateMap;

mod app;
mod sink;
mod transport;

#[derive(Parser, Debug)]
#[command(
    name = "heatmesh-viewer",
    about = "Turns sensor telemetry into interpolated field frames"
)]
struct Args {
    /// Input source: a capture file path, or `-` for stdin.
    #[arg(long, default_value = "")]
    input: String,

    /// Metric to render: t, h or p.
    #[arg(long, default_value = "t")]
    metric: String,

    /// Device layout JSON; the built-in 4x4 classroom map when omitted.
    #[arg(long, default_value = "")]
    layout: String,

    /// Readings older than this stop contributing to the field.
    #[arg(long, default_value_t = 30)]
    stale_seconds: u64,

    #[arg(long, default_value_t = 1000)]
    render_interval_ms: u64,

    /// Output resolution, `80x80` or a single edge length.
    #[arg(long, default_value = "80x80")]
    fine: String,

    #[arg(long, default_value_t = DEFAULT_MAX_PASSES)]
    max_passes: usize,

    /// Fill used when a metric has no data at all, `metric=value`.
    /// Repeatable; temperature defaults to 25.
    #[arg(long)]
    fallback: Vec<String>,

    /// Clamp emitted values to the metric's display range.
    #[arg(long, default_value_t = false)]
    clamp: bool,

    /// Re-emit classified messages as NDJSON instead of rendering.
    #[arg(long, default_value_t = false)]
    raw: bool,

    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input: String,
    pub metric: Metric,
    pub layout_path: Option<PathBuf>,
    pub stale_after: Duration,
    pub render_interval: Duration,
    pub fine_width: usize,
    pub fine_height: usize,
    pub max_passes: usize,
    pub fallbacks: FallbackTable,
    pub clamp: bool,
    pub raw: bool,
    pub debug: bool,
}

fn env_true(name: &str) -> bool {
    std::env::var(name)
        .map(|value| {
            let value = value.trim().to_lowercase();
            value == "1" || value == "true" || value == "yes" || value == "on"
        })
        .unwrap_or(false)
}

fn resolve_input(flag: &str) -> String {
    if !flag.is_empty() {
        return flag.to_string();
    }
    match std::env::var("HEATMESH_INPUT") {
        Ok(value) if !value.is_empty() => value,
        _ => "-".to_string(),
    }
}

fn parse_fine(spec: &str) -> Result<(usize, usize)> {
    let (width, height) = match spec.split_once(['x', 'X']) {
        Some((width, height)) => (
            width
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse fine width in '{spec}'"))?,
            height
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse fine height in '{spec}'"))?,
        ),
        None => {
            let edge: usize = spec
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse fine resolution '{spec}'"))?;
            (edge, edge)
        }
    };
    if width == 0 || height == 0 {
        bail!("fine resolution must be at least 1x1, got '{spec}'");
    }
    Ok((width, height))
}

fn parse_fallbacks(specs: &[String]) -> Result<FallbackTable> {
    let mut table = FallbackTable::default();
    for spec in specs {
        let Some((metric, value)) = spec.split_once('=') else {
            bail!("fallback must look like metric=value, got '{spec}'");
        };
        let metric: Metric = metric.trim().parse().map_err(anyhow::Error::msg)?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse fallback value in '{spec}'"))?;
        if !value.is_finite() {
            bail!("fallback value must be finite, got '{spec}'");
        }
        table.set(metric, value);
    }
    Ok(table)
}

fn load_config() -> Result<Config> {
    let args = Args::parse();

    let metric: Metric = args.metric.parse().map_err(anyhow::Error::msg)?;
    let (fine_width, fine_height) = parse_fine(&args.fine)?;
    let fallbacks = parse_fallbacks(&args.fallback)?;
    let layout_path = if args.layout.is_empty() {
        None
    } else {
        Some(PathBuf::from(&args.layout))
    };

    Ok(Config {
        input: resolve_input(&args.input),
        metric,
        layout_path,
        stale_after: Duration::from_secs(args.stale_seconds),
        // interval() panics on a zero period
        render_interval: Duration::from_millis(args.render_interval_ms.max(1)),
        fine_width,
        fine_height,
        max_passes: args.max_passes,
        fallbacks,
        clamp: args.clamp,
        raw: args.raw,
        debug: args.debug || env_true("HEATMESH_DEBUG"),
    })
}

/// Logs go to stderr; stdout is reserved for the NDJSON frame stream.
fn init_logging(config: &Config) {
    let level = if config.debug {
        "debug".to_string()
    } else {
        std::env::var("HEATMESH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config);

    let layout = match &config.layout_path {
        Some(path) => CoordinateMap::from_path(path)
            .with_context(|| format!("Failed to load layout {}", path.display()))?,
        None => CoordinateMap::classroom_4x4(),
    };
    info!(
        event = "layout_ready",
        devices = layout.len(),
        width = layout.width(),
        height = layout.height()
    );

    let stream = transport::open_input(&config.input)
        .await
        .context("Failed to open input")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    app::run(
        config,
        layout,
        stream,
        sink::NdjsonSink::stdout(),
        shutdown_rx,
    )
    .await
}
