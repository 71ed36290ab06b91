//! Fixed-pattern metadata scanners for ffmpeg diagnostic lines.
//!
//! Each function inspects one completed line and extracts a single
//! signal. A non-match is the normal outcome for the vast majority of
//! lines, not an error.

/// Parses the `Duration: HH:MM:SS.ff` header ffmpeg prints for each
/// input, returning the total seconds with the fraction discarded.
///
/// ```
/// assert_eq!(ffbar_core::extract::parse_duration("  Duration: 01:02:03.00, start: 0.0"), Some(3723));
/// ```
pub fn parse_duration(line: &str) -> Option<u64> {
    parse_clock(line.split("Duration: ").nth(1)?)
}

/// Parses the `time=HH:MM:SS.ff` field of a progress status line,
/// returning the elapsed media seconds with the fraction discarded.
pub fn parse_progress_time(line: &str) -> Option<u64> {
    parse_clock(line.split("time=").nth(1)?)
}

/// Extracts the source file name from an input header such as
/// `Input #0, matroska,webm, from '/videos/input.mkv':`; only the final
/// path segment is kept.
pub fn parse_source_name(line: &str) -> Option<String> {
    let (path, _) = line.split("from '").nth(1)?.split_once("':")?;
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Finds the first `<digits>[.<digits>] fps` occurrence anywhere in the
/// line and rounds it to the nearest whole frame rate. The first match
/// wins even when a later one would be more specific; callers latch the
/// value once and ignore the rest of the stream.
pub fn parse_fps(line: &str) -> Option<u32> {
    for (idx, _) in line.match_indices(" fps") {
        let head = &line[..idx];
        let start = head
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
            .last()
            .map_or(head.len(), |(i, _)| i);
        let token = &head[start..];
        let bytes = token.as_bytes();
        if bytes.is_empty()
            || !bytes[0].is_ascii_digit()
            || !bytes[bytes.len() - 1].is_ascii_digit()
            || bytes.iter().filter(|&&b| b == b'.').count() > 1
        {
            continue;
        }
        if let Ok(value) = token.parse::<f64>() {
            return Some(value.round() as u32);
        }
    }
    None
}

/// Reads a leading `HH:MM:SS.ff` clock (two-digit fields, at least two
/// fractional digits) and folds it into whole seconds.
fn parse_clock(s: &str) -> Option<u64> {
    let b = s.as_bytes();
    if b.len() < 11 || b[2] != b':' || b[5] != b':' || b[8] != b'.' {
        return None;
    }
    if !b[9].is_ascii_digit() || !b[10].is_ascii_digit() {
        return None;
    }
    let hours = two_digits(b, 0)?;
    let minutes = two_digits(b, 3)?;
    let seconds = two_digits(b, 6)?;
    Some((hours * 60 + minutes) * 60 + seconds)
}

fn two_digits(b: &[u8], at: usize) -> Option<u64> {
    if b[at].is_ascii_digit() && b[at + 1].is_ascii_digit() {
        Some(u64::from(b[at] - b'0') * 10 + u64::from(b[at + 1] - b'0'))
    } else {
        None
    }
}
