//! In-place single-line terminal progress rendering.
//!
//! The bar repaints one stderr line per tick update: carriage return,
//! enough blanks to cover whatever the previous repaint left behind,
//! carriage return again, then the new content, flushed immediately.
//! Rendering is strictly best-effort; no failure in here may ever
//! disturb the supervision of the child process.

use std::io::{self, Write};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use console::Term;
use log::debug;

/// Fill glyphs, shared by every repaint.
const BAR_FILL: char = '#';
const BAR_EMPTY: char = '.';
/// Columns reserved for the percentage, counts, and timing decorations.
const RESERVED_COLS: usize = 50;
const MIN_BAR_WIDTH: usize = 20;
const MAX_BAR_WIDTH: usize = 60;

/// Where the bar writes. Defaults to stderr; tests inject a buffer.
pub type Sink = Box<dyn Write + Send>;

struct BarState {
    position: u64,
    /// Character count of the previous repaint, for erase-and-redraw.
    painted: usize,
    closed: bool,
    out: Sink,
}

/// Stateful single-line progress bar.
///
/// `advance` and `close` are called from different threads (tick updates
/// from the stderr parsing path, finalization from teardown); all mutable
/// state sits behind one mutex that is never held across child-process
/// I/O.
pub struct ProgressBar {
    title: Option<String>,
    total: Option<u64>,
    unit: &'static str,
    fixed_width: Option<usize>,
    started: Instant,
    state: Mutex<BarState>,
}

impl ProgressBar {
    fn new(
        title: Option<String>,
        total: Option<u64>,
        unit: &'static str,
        fixed_width: Option<usize>,
        out: Sink,
    ) -> Self {
        Self {
            title,
            total,
            unit,
            fixed_width,
            started: Instant::now(),
            state: Mutex::new(BarState {
                position: 0,
                painted: 0,
                closed: false,
                out,
            }),
        }
    }

    /// Current tick position.
    pub fn position(&self) -> u64 {
        self.state.lock().map(|s| s.position).unwrap_or(0)
    }

    /// Advances the bar by `delta` ticks and repaints. Non-positive
    /// deltas are ignored: progress never regresses. The position is
    /// clamped to the total.
    pub fn advance(&self, delta: i64) {
        if delta <= 0 {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            if state.closed {
                return;
            }
            let next = state.position.saturating_add(delta as u64);
            state.position = match self.total {
                Some(total) => next.min(total),
                None => next,
            };
            self.repaint(&mut state);
        }
    }

    /// Finalizes the bar: forces the position to the total (when one is
    /// known), repaints once, and terminates the line. Idempotent, and
    /// safe even if no tick was ever recorded.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.closed {
                return;
            }
            if let Some(total) = self.total {
                state.position = total;
            }
            self.repaint(&mut state);
            let _ = writeln!(state.out);
            let _ = state.out.flush();
            state.closed = true;
        }
    }

    /// Whether a progress line is currently on screen (painted at least
    /// once and not yet finalized with a trailing newline).
    pub fn line_active(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.painted > 0 && !s.closed)
            .unwrap_or(false)
    }

    fn repaint(&self, state: &mut BarState) {
        let line = self.compose(state.position);
        let width = line.chars().count();
        let blank = " ".repeat(width.max(state.painted));
        let _ = write!(state.out, "\r{blank}\r{line}");
        let _ = state.out.flush();
        state.painted = width;
    }

    fn compose(&self, position: u64) -> String {
        let progress = match self.total {
            Some(total) if total > 0 => (position as f64 / total as f64).min(1.0),
            _ => 0.0,
        };

        let mut line = String::new();
        if let Some(title) = &self.title {
            line.push_str(title);
            line.push_str(": ");
        }
        line.push_str(&format!("{}% ", (progress * 100.0).round() as u64));

        let width = self.bar_width();
        let filled = (progress * width as f64).floor() as usize;
        line.push('[');
        for _ in 0..filled {
            line.push(BAR_FILL);
        }
        for _ in filled..width {
            line.push(BAR_EMPTY);
        }
        line.push(']');

        match self.total {
            Some(total) => line.push_str(&format!(" {position}/{total}")),
            None => line.push_str(&format!(" {position}")),
        }
        line.push(' ');
        line.push_str(self.unit);

        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            let remaining = if progress > 0.0 {
                elapsed / progress - elapsed
            } else {
                -1.0
            };
            if remaining > 0.0 {
                line.push_str(&format!(
                    " [{}<{}]",
                    format_mmss(elapsed),
                    format_mmss(remaining)
                ));
            } else {
                line.push_str(&format!(" [{}]", format_mmss(elapsed)));
            }
        }
        line
    }

    fn bar_width(&self) -> usize {
        if let Some(width) = self.fixed_width {
            return width;
        }
        let reserved =
            self.title.as_ref().map_or(0, |t| t.chars().count() + 2) + RESERVED_COLS;
        match Term::stderr().size_checked() {
            Some((_, cols)) => {
                (cols as usize).saturating_sub(reserved).clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH)
            }
            None => MIN_BAR_WIDTH,
        }
    }
}

/// Formats seconds as MM:SS; minutes grow past 59 rather than rolling
/// over into hours.
fn format_mmss(seconds: f64) -> String {
    let total = seconds as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Holds the lazily created progress bar.
///
/// The stderr parsing path creates the bar when the first progress marker
/// arrives; teardown closes it. Closing a cell whose bar was never
/// created is a no-op, so teardown can run unconditionally.
pub struct BarCell {
    fixed_width: Option<usize>,
    sink: Mutex<Option<Sink>>,
    slot: OnceLock<ProgressBar>,
}

impl BarCell {
    /// Cell whose bar paints to stderr with terminal-width-aware sizing.
    pub fn stderr() -> Self {
        Self {
            fixed_width: None,
            sink: Mutex::new(None),
            slot: OnceLock::new(),
        }
    }

    /// Cell with an explicit sink and optional fixed bar width.
    pub fn with_sink(sink: Sink, fixed_width: Option<usize>) -> Self {
        Self {
            fixed_width,
            sink: Mutex::new(Some(sink)),
            slot: OnceLock::new(),
        }
    }

    /// Returns the bar, creating it on first use.
    pub fn init(
        &self,
        title: Option<String>,
        total: Option<u64>,
        unit: &'static str,
    ) -> &ProgressBar {
        self.slot.get_or_init(|| {
            debug!(
                "creating progress bar: title={title:?} total={total:?} unit={unit}"
            );
            let out = self
                .sink
                .lock()
                .ok()
                .and_then(|mut sink| sink.take())
                .unwrap_or_else(|| Box::new(io::stderr()));
            ProgressBar::new(title, total, unit, self.fixed_width, out)
        })
    }

    /// The bar, if one has been created.
    pub fn get(&self) -> Option<&ProgressBar> {
        self.slot.get()
    }

    /// Finalizes the bar if one was ever created.
    pub fn close(&self) {
        if let Some(bar) = self.slot.get() {
            bar.close();
        }
    }

    /// Whether a progress line is currently on screen.
    pub fn line_active(&self) -> bool {
        self.slot.get().map(ProgressBar::line_active).unwrap_or(false)
    }
}
