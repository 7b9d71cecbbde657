//! The viewer loop: read telemetry lines, keep the device registry
//! current, and render an interpolated field at a fixed cadence.
//!
//! Everything runs on one task. Reads are short (the line stream is
//! cancel-safe) so a slow or silent input never starves the render
//! tick, and a burst of input never piles up frames.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use heatmesh_core::ingest::ingest_line;
use heatmesh_core::registry::{DeviceRegistry, SnapshotEntry};
use heatmesh_core::wire::Message;
use heatmesh_field::grid::CoarseGrid;
use heatmesh_field::inpaint::inpaint;
use heatmesh_field::layout::CoordinateMap;
use heatmesh_field::upsample::upsample;

use crate::sink::{display_range, FieldFrame, GatewayInfo, Marker, RenderSink};
use crate::transport::LineStream;
use crate::Config;

/// Consecutive read errors tolerated before the loop gives up on the
/// transport. A single hiccup is logged and retried.
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 5;

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone)]
struct IngestStats {
    lines: u64,
    frames: u64,
    samples: u64,
    boots: u64,
    unrecognized: u64,
    rejected: u64,
}

struct Pipeline<'a, S> {
    config: &'a Config,
    layout: &'a CoordinateMap,
    sink: S,
    registry: DeviceRegistry,
    stats: IngestStats,
    gateway: Option<GatewayInfo>,
    session_id: String,
    seq: u64,
}

impl<'a, S: RenderSink> Pipeline<'a, S> {
    fn new(config: &'a Config, layout: &'a CoordinateMap, sink: S) -> Self {
        Self {
            config,
            layout,
            sink,
            registry: DeviceRegistry::new(),
            stats: IngestStats::default(),
            gateway: None,
            session_id: Uuid::new_v4().to_string(),
            seq: 0,
        }
    }

    fn ingest(&mut self, line: &str) -> Result<()> {
        let report = ingest_line(line);
        self.stats.lines += 1;
        self.stats.frames += report.frames() as u64;
        self.stats.rejected += report.errors.len() as u64;
        for err in &report.errors {
            debug!(event = "sample_rejected", error = %err);
        }
        let now = Instant::now();
        for message in report.messages {
            if self.config.raw {
                self.sink.emit_message(&message)?;
            }
            match message {
                Message::Sample(reading) => {
                    self.stats.samples += 1;
                    debug!(event = "sample_applied", device_id = %reading.device_id);
                    self.registry.upsert(reading, now);
                }
                Message::GatewayBoot(boot) => {
                    self.stats.boots += 1;
                    info!(event = "gateway_boot", mac = %boot.mac, channel = ?boot.channel);
                    let boots = self.gateway.as_ref().map(|g| g.boots).unwrap_or(0) + 1;
                    self.gateway = Some(GatewayInfo {
                        mac: boot.mac,
                        channel: boot.channel,
                        boots,
                        last_boot_at: Utc::now().to_rfc3339(),
                    });
                }
                Message::Unrecognized { raw } => {
                    self.stats.unrecognized += 1;
                    debug!(event = "unrecognized_frame", raw = %raw);
                }
            }
        }
        Ok(())
    }

    /// Snapshot, grid, inpaint, upsample, emit. A field with no data
    /// and no fallback is logged and skipped rather than emitted.
    fn render_once(&mut self) -> Result<()> {
        let snapshot = self
            .registry
            .snapshot(Instant::now(), self.config.stale_after);
        let grid = CoarseGrid::build(&snapshot, self.layout, self.config.metric);
        let filled = match inpaint(&grid, &self.config.fallbacks, self.config.max_passes) {
            Ok(filled) => filled,
            Err(err) => {
                warn!(event = "render_skipped", error = %err);
                return Ok(());
            }
        };
        let mut fine = upsample(&filled, (self.config.fine_height, self.config.fine_width));
        let range = display_range(self.config.metric);
        if self.config.clamp {
            if let Some((lo, hi)) = range {
                fine.mapv_inplace(|value| value.clamp(lo, hi));
            }
        }

        self.seq += 1;
        let frame = FieldFrame {
            kind: "field_frame",
            session_id: self.session_id.clone(),
            seq: self.seq,
            at: Utc::now().to_rfc3339(),
            metric: self.config.metric,
            rows: fine.nrows(),
            cols: fine.ncols(),
            values: fine.outer_iter().map(|row| row.to_vec()).collect(),
            markers: self.markers(&snapshot, &grid),
            gateway: self.gateway.clone(),
            display_range: range,
        };
        self.sink.emit_frame(&frame)?;
        debug!(
            event = "field_frame_emitted",
            seq = self.seq,
            known = grid.known_count()
        );
        Ok(())
    }

    fn markers(&self, snapshot: &[SnapshotEntry], grid: &CoarseGrid) -> Vec<Marker> {
        let by_id: HashMap<&str, &SnapshotEntry> = snapshot
            .iter()
            .map(|entry| (entry.device_id.as_str(), entry))
            .collect();
        self.layout
            .devices()
            .into_iter()
            .map(|(device_id, (x, y))| {
                let entry = by_id.get(device_id);
                Marker {
                    id: device_id.to_string(),
                    x,
                    y,
                    fresh: grid.value_at(x, y).is_some(),
                    value: entry.map(|e| e.reading.value(self.config.metric)),
                    age_secs: entry.map(|e| e.age.as_secs_f64()),
                }
            })
            .collect()
    }

    fn log_stats(&self, event: &'static str) {
        info!(
            event = event,
            lines = self.stats.lines,
            frames = self.stats.frames,
            samples = self.stats.samples,
            boots = self.stats.boots,
            unrecognized = self.stats.unrecognized,
            rejected = self.stats.rejected
        );
    }
}

pub async fn run<S: RenderSink>(
    config: Config,
    layout: CoordinateMap,
    mut stream: LineStream,
    sink: S,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut pipeline = Pipeline::new(&config, &layout, sink);
    let mut render_tick = tokio::time::interval(config.render_interval);
    let mut stats_tick = tokio::time::interval(STATS_LOG_INTERVAL);
    let mut read_failures: u32 = 0;

    info!(
        event = "viewer_start",
        session_id = %pipeline.session_id,
        input = %config.input,
        metric = %config.metric,
        raw = config.raw
    );

    let result = loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_ok() && *shutdown.borrow() {
                    info!(event = "shutdown_signal");
                    break Ok(());
                }
            }
            line = stream.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        read_failures = 0;
                        if let Err(err) = pipeline.ingest(&line) {
                            break Err(err);
                        }
                    }
                    Ok(None) => {
                        info!(event = "input_closed");
                        // Render what arrived before the input ended;
                        // this is what makes capture replays useful.
                        if config.raw {
                            break Ok(());
                        }
                        break pipeline.render_once();
                    }
                    Err(err) => {
                        read_failures += 1;
                        warn!(
                            event = "transport_read_error",
                            error = %err,
                            consecutive = read_failures
                        );
                        if read_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                            break Err(err.into());
                        }
                    }
                }
            }
            _ = render_tick.tick(), if !config.raw => {
                if let Err(err) = pipeline.render_once() {
                    break Err(err);
                }
            }
            _ = stats_tick.tick() => {
                pipeline.log_stats("ingest_stats");
            }
        }
    };

    pipeline.log_stats("ingest_stats_final");
    if let Err(err) = pipeline.sink.flush() {
        warn!(event = "sink_flush_failed", error = %err);
    }
    if let Err(err) = &result {
        error!(event = "viewer_stopped", error = %err);
    }
    result
}
