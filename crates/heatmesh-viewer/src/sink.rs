//! Render output.
//!
//! Each render tick produces one [`FieldFrame`]: the upsampled field
//! plus per-device markers, serialized as a single NDJSON line on
//! stdout. A renderer (or `jq`) consumes the stream; the viewer itself
//! never draws.

use std::io::{self, Write};

use serde::Serialize;

use heatmesh_core::wire::{Message, Metric};

/// One rendered field, ready for a downstream drawing surface.
#[derive(Debug, Clone, Serialize)]
pub struct FieldFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub session_id: String,
    pub seq: u64,
    pub at: String,
    pub metric: Metric,
    pub rows: usize,
    pub cols: usize,
    /// Row-major: `values[y][x]`, `rows` outer entries of `cols` each.
    pub values: Vec<Vec<f64>>,
    pub markers: Vec<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_range: Option<(f64, f64)>,
}

/// Where a mapped device sits on the coarse grid and what it last said.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub id: String,
    pub x: usize,
    pub y: usize,
    pub fresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayInfo {
    pub mac: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u16>,
    pub boots: u64,
    pub last_boot_at: String,
}

/// Suggested color scale per metric. Presentation hint only; values in
/// the frame are not clamped to it unless the operator asks.
pub fn display_range(metric: Metric) -> Option<(f64, f64)> {
    match metric {
        Metric::Temperature => Some((10.0, 40.0)),
        Metric::Humidity => Some((0.0, 100.0)),
        Metric::Pressure => None,
    }
}

pub trait RenderSink {
    fn emit_frame(&mut self, frame: &FieldFrame) -> io::Result<()>;
    fn emit_message(&mut self, message: &Message) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// NDJSON writer: one JSON document per line, flushed per emission so
/// a piped consumer sees frames as they render.
pub struct NdjsonSink<W: Write> {
    out: W,
}

impl NdjsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> RenderSink for NdjsonSink<W> {
    fn emit_frame(&mut self, frame: &FieldFrame) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, frame)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    fn emit_message(&mut self, message: &Message) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_frame() -> FieldFrame {
        FieldFrame {
            kind: "field_frame",
            session_id: "s-1".to_string(),
            seq: 7,
            at: "2026-08-21T10:00:00+00:00".to_string(),
            metric: Metric::Temperature,
            rows: 2,
            cols: 3,
            values: vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
            markers: vec![Marker {
                id: "A1".to_string(),
                x: 0,
                y: 0,
                fresh: true,
                value: Some(21.5),
                age_secs: Some(2.0),
            }],
            gateway: None,
            display_range: Some((10.0, 40.0)),
        }
    }

    #[test]
    fn frame_serializes_as_one_json_line() {
        let mut buf = Vec::new();
        {
            let mut sink = NdjsonSink::new(&mut buf);
            sink.emit_frame(&sample_frame()).expect("emit");
        }
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);

        let value: Value = serde_json::from_str(text.trim_end()).expect("json");
        assert_eq!(value["type"], "field_frame");
        assert_eq!(value["metric"], "temperature");
        assert_eq!(value["rows"], 2);
        assert_eq!(value["values"][1][2], 6.0);
        assert_eq!(value["markers"][0]["id"], "A1");
        assert_eq!(value["display_range"][0], 10.0);
        assert!(value.get("gateway").is_none());
    }

    #[test]
    fn absent_marker_value_is_omitted() {
        let mut frame = sample_frame();
        frame.markers[0].value = None;
        frame.markers[0].age_secs = None;
        frame.markers[0].fresh = false;

        let mut buf = Vec::new();
        {
            let mut sink = NdjsonSink::new(&mut buf);
            sink.emit_frame(&frame).expect("emit");
        }
        let value: Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["markers"][0]["fresh"], false);
        assert!(value["markers"][0].get("value").is_none());
    }

    #[test]
    fn pressure_has_no_display_range() {
        assert_eq!(display_range(Metric::Pressure), None);
        assert_eq!(display_range(Metric::Humidity), Some((0.0, 100.0)));
    }
}
