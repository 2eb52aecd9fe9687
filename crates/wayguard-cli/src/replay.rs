//! `wayguard replay` – drives the hazard loop from a recorded scenario.
//!
//! A scenario is JSON Lines, one record per tick:
//!
//! ```text
//! {"t": 0.00, "speed": 1.2, "heading": 90, "detections": [{"label": "car", "bbox": [0.4, 0.4, 0.2, 0.2], "confidence": 0.9}]}
//! {"t": 0.10, "speed": 1.2, "heading": 91}
//! {"t": 0.25, "detections": [], "backend": {"hazards": ["car"]}}
//! ```
//!
//! A record with `detections` stands for a detector result queried at `t`
//! (subject to the detector throttle); a record without is a plain tick.
//! Blank lines and lines starting with `#` are skipped.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use serde::Deserialize;
use tracing::{debug, warn};
use wayguard_middleware::{Topic, TopicReceiver};
use wayguard_perception::backend::confirmation_value_or_empty;
use wayguard_perception::{RawDetection, TieredDepthResolver};
use wayguard_runtime::{DetectionBatch, EngineConfig, HazardLoop, TickOutput};
use wayguard_types::{HazardEvent, MotionSample};

/// One line of a scenario file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameRecord {
    /// Engine time in seconds.
    pub t: f64,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub heading: f32,
    #[serde(default)]
    pub detections: Option<Vec<RawDetection>>,
    /// Raw backend payload; malformed payloads confirm nothing.
    #[serde(default)]
    pub backend: Option<serde_json::Value>,
}

/// Totals printed at the end of a replay.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub detector_runs: usize,
    pub throttled: usize,
    pub removals: usize,
    pub max_visible: usize,
    pub interrupted: bool,
}

/// Parse one scenario line.  `Ok(None)` for blank lines and comments.
pub fn parse_record(line: &str) -> Result<Option<FrameRecord>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some).map_err(|e| e.to_string())
}

/// Replay every record from `reader`, writing one block per tick to `out`.
///
/// With `json` set, the events published on the hazard bus are written as
/// JSON Lines instead of the coloured summary.  Stops early when `stop` is
/// raised.
pub fn run<R: BufRead, W: Write>(
    reader: R,
    config: EngineConfig,
    stop: &AtomicBool,
    json: bool,
    out: &mut W,
) -> Result<ReplaySummary, String> {
    let (mut hazards, inbox) = HazardLoop::new(config, Box::new(TieredDepthResolver::new()))
        .map_err(|e| e.to_string())?;
    let bus = hazards.bus();
    let mut placements = bus.subscribe_to(Topic::Placements);
    let mut removals = bus.subscribe_to(Topic::Removals);

    let mut summary = ReplaySummary::default();
    let mut last_t = f64::NEG_INFINITY;

    for (idx, line) in reader.lines().enumerate() {
        if stop.load(Ordering::SeqCst) {
            summary.interrupted = true;
            break;
        }
        let line = line.map_err(|e| format!("line {}: {}", idx + 1, e))?;
        let Some(record) = parse_record(&line).map_err(|e| format!("line {}: {}", idx + 1, e))?
        else {
            continue;
        };
        if record.t.is_nan() || record.t < last_t {
            warn!(line = idx + 1, t = record.t, "skipping out-of-order record");
            continue;
        }
        last_t = record.t;

        if let Some(detections) = record.detections {
            if hazards.should_request_detection(record.t) {
                summary.detector_runs += 1;
                inbox.deliver(DetectionBatch {
                    query_ts: record.t,
                    detections,
                    confirmation: confirmation_value_or_empty(record.backend),
                });
            } else {
                summary.throttled += 1;
                debug!(t = record.t, "detector throttled");
            }
        }

        let motion = MotionSample {
            speed_mps: record.speed,
            heading_deg: record.heading,
        };
        let output = hazards.tick(record.t, &motion);
        summary.ticks += 1;
        summary.removals += output.removed.len();
        summary.max_visible = summary.max_visible.max(output.hazards.len());

        if json {
            write_events(out, &mut removals)?;
            write_events(out, &mut placements)?;
        } else {
            write_tick(out, record.t, &output)?;
            drain(&mut removals);
            drain(&mut placements);
        }
    }

    let removed = hazards.shutdown();
    if json {
        write_events(out, &mut removals)?;
        write_events(out, &mut placements)?;
    } else if !removed.is_empty() {
        writeln!(out, "  {} {}", "end".dimmed(), removed.join(", ").dimmed())
            .map_err(|e| e.to_string())?;
    }
    Ok(summary)
}

fn write_tick<W: Write>(out: &mut W, t: f64, output: &TickOutput) -> Result<(), String> {
    let refreshed = if output.spatial_refreshed { "*" } else { " " };
    writeln!(out, "{} t={:>7.2}s", refreshed.cyan(), t).map_err(|e| e.to_string())?;
    for h in &output.hazards {
        let distance = h
            .distance
            .map(|d| format!("{d:.1}m"))
            .unwrap_or_else(|| "?".to_string());
        writeln!(
            out,
            "    {:<10} {:>6.1}  {:>6}  lateral {:+.2}m  {}",
            h.id.bold(),
            h.severity,
            distance,
            h.placement.lateral,
            h.explanation
        )
        .map_err(|e| e.to_string())?;
    }
    if !output.removed.is_empty() {
        writeln!(out, "    {} {}", "removed".red(), output.removed.join(", "))
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn write_events<W: Write>(out: &mut W, rx: &mut TopicReceiver) -> Result<(), String> {
    while let Some(event) = rx.try_next() {
        write_event(out, &event)?;
    }
    Ok(())
}

fn write_event<W: Write>(out: &mut W, event: &HazardEvent) -> Result<(), String> {
    let line = serde_json::to_string(event).map_err(|e| e.to_string())?;
    writeln!(out, "{line}").map_err(|e| e.to_string())
}

fn drain(rx: &mut TopicReceiver) {
    while rx.try_next().is_some() {}
}
