//! Progress-state machine: latches stream metadata and converts ffmpeg
//! progress markers into bar ticks.
//!
//! Duration, source name, and frame rate are each latched on first
//! sight and never overwritten; ffmpeg re-prints header-style lines in
//! some modes, and a late re-print must not corrupt a bar that has
//! already been sized. When a frame rate is known, both the marker and
//! the total are scaled by it so the bar counts frames instead of
//! seconds and the percentage math stays consistent.

use std::sync::Arc;

use log::debug;

use crate::extract;
use crate::render::BarCell;

/// Bar title used when no source name was seen before the first
/// progress marker.
const FALLBACK_TITLE: &str = "Processing";

/// Tracks latched metadata and drives the progress bar from completed
/// stderr lines. Owned by the single stderr consumer.
pub struct ProgressState {
    bar: Arc<BarCell>,
    duration_secs: Option<u64>,
    frame_rate: Option<u32>,
    source_name: Option<String>,
}

impl ProgressState {
    pub fn new(bar: Arc<BarCell>) -> Self {
        Self {
            bar,
            duration_secs: None,
            frame_rate: None,
            source_name: None,
        }
    }

    /// Processes one completed stderr line: latches metadata that is
    /// still unset, then derives a tick update from the progress marker
    /// if the line carries one. Lines without a marker are a no-op.
    pub fn observe_line(&mut self, line: &str) {
        if self.duration_secs.is_none() {
            if let Some(secs) = extract::parse_duration(line) {
                debug!("latched duration: {secs}s");
                self.duration_secs = Some(secs);
            }
        }
        if self.source_name.is_none() {
            if let Some(name) = extract::parse_source_name(line) {
                debug!("latched source: {name}");
                self.source_name = Some(name);
            }
        }
        if self.frame_rate.is_none() {
            if let Some(fps) = extract::parse_fps(line) {
                debug!("latched frame rate: {fps} fps");
                self.frame_rate = Some(fps);
            }
        }

        let Some(seconds) = extract::parse_progress_time(line) else {
            return;
        };

        let scale = u64::from(self.frame_rate.unwrap_or(1));
        let current = seconds.saturating_mul(scale);
        let bar = self.bar.init(
            Some(
                self.source_name
                    .clone()
                    .unwrap_or_else(|| FALLBACK_TITLE.to_string()),
            ),
            self.duration_secs.map(|d| d.saturating_mul(scale)),
            if self.frame_rate.is_some() {
                "frames"
            } else {
                "seconds"
            },
        );

        // Out-of-order or duplicate markers never regress the bar.
        let delta = current as i64 - bar.position() as i64;
        if delta > 0 {
            bar.advance(delta);
        }
    }
}
