//! Incremental line classification over the child's stderr stream.
//!
//! ffmpeg terminates its diagnostic lines with `\n`, repaints its status
//! line with a bare `\r`, and leaves interactive confirmation prompts
//! (`File 'out.mp4' already exists. Overwrite? [y/N] `) with no terminator
//! at all while it waits for input. The accumulator consumes the stream
//! one byte at a time and reports all three cases to its caller.

/// Trailing byte sequence of an ffmpeg confirmation prompt.
const PROMPT_SUFFIX: &[u8] = b"[y/N] ";

/// Outcome of feeding one byte to the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// The byte extended the pending line; nothing to act on yet.
    Pending,
    /// A `\r` or `\n` terminated the pending line.
    Completed(String),
    /// The pending line now ends with the confirmation prompt. The line
    /// is force-completed so accumulation restarts cleanly; the caller
    /// must pass the prompt text through to the user before ffmpeg's
    /// next output overwrites it.
    Prompt(String),
}

/// Splits a byte stream into completed lines and detects un-terminated
/// `[y/N] ` confirmation prompts inside a partial line.
///
/// Only the most recent completed line is retained; it is the diagnostic
/// reported back to the user when the child exits non-zero.
#[derive(Debug, Default)]
pub struct LineAccumulator {
    pending: Vec<u8>,
    last_line: Option<String>,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one byte of the stream.
    pub fn push(&mut self, byte: u8) -> LineEvent {
        match byte {
            b'\r' | b'\n' => LineEvent::Completed(self.complete()),
            _ => {
                self.pending.push(byte);
                if self.pending.len() >= PROMPT_SUFFIX.len()
                    && self.pending.ends_with(PROMPT_SUFFIX)
                {
                    LineEvent::Prompt(self.complete())
                } else {
                    LineEvent::Pending
                }
            }
        }
    }

    /// The most recent completed line, if any. Partial content that has
    /// not seen a terminator is never reported here.
    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }

    fn complete(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        self.last_line = Some(line.clone());
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(acc: &mut LineAccumulator, text: &str) -> Vec<LineEvent> {
        text.bytes()
            .map(|b| acc.push(b))
            .filter(|e| *e != LineEvent::Pending)
            .collect()
    }

    #[test]
    fn newline_completes_a_line() {
        let mut acc = LineAccumulator::new();
        let events = feed(&mut acc, "hello\n");
        assert_eq!(events, vec![LineEvent::Completed("hello".to_string())]);
    }

    #[test]
    fn carriage_return_completes_a_line() {
        let mut acc = LineAccumulator::new();
        let events = feed(&mut acc, "frame=1\r");
        assert_eq!(events, vec![LineEvent::Completed("frame=1".to_string())]);
    }

    #[test]
    fn crlf_yields_an_extra_empty_line() {
        let mut acc = LineAccumulator::new();
        let events = feed(&mut acc, "a\r\nb\n");
        assert_eq!(
            events,
            vec![
                LineEvent::Completed("a".to_string()),
                LineEvent::Completed(String::new()),
                LineEvent::Completed("b".to_string()),
            ]
        );
    }

    #[test]
    fn last_line_ignores_pending_content() {
        let mut acc = LineAccumulator::new();
        feed(&mut acc, "a\nb\nc");
        assert_eq!(acc.last_line(), Some("b"));
    }

    #[test]
    fn prompt_is_detected_without_a_terminator() {
        let mut acc = LineAccumulator::new();
        let events = feed(&mut acc, "Overwrite? [y/N] ");
        assert_eq!(
            events,
            vec![LineEvent::Prompt("Overwrite? [y/N] ".to_string())]
        );
        // Accumulation restarts cleanly after the forced completion.
        let events = feed(&mut acc, "next\n");
        assert_eq!(events, vec![LineEvent::Completed("next".to_string())]);
    }

    #[test]
    fn prompt_requires_exact_case() {
        let mut acc = LineAccumulator::new();
        let events = feed(&mut acc, "Overwrite? [Y/n] ");
        assert!(events.is_empty());
    }

    #[test]
    fn bare_prompt_suffix_is_a_prompt() {
        let mut acc = LineAccumulator::new();
        let events = feed(&mut acc, "[y/N] ");
        assert_eq!(events, vec![LineEvent::Prompt("[y/N] ".to_string())]);
    }

    #[test]
    fn multibyte_content_survives_line_completion() {
        let mut acc = LineAccumulator::new();
        let mut events = Vec::new();
        for b in "título=ßé\n".bytes() {
            let event = acc.push(b);
            if event != LineEvent::Pending {
                events.push(event);
            }
        }
        assert_eq!(events, vec![LineEvent::Completed("título=ßé".to_string())]);
    }
}
