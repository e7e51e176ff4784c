//! strftime-style templating for banner timestamps, filenames and commands.
//!
//! Two flavours exist. [`format_time`] renders into a fixed capacity and
//! silently truncates, matching the filename and timestamp paths.
//! [`expand_time`] grows its buffer until the whole expansion fits, which is
//! what command lines need.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use std::borrow::Cow;
use std::fmt::{self, Write};

use crate::error::TemplateError;

/// Capacity used for rendered output filenames.
pub const FILENAME_CAPACITY: usize = 4096;

/// Capacity used for the banner timestamp.
pub const TIMESTAMP_CAPACITY: usize = 200;

/// A `fmt::Write` sink that stops accepting text at a byte limit.
struct BoundedWriter<'a> {
    out: &'a mut String,
    limit: usize,
    truncated: bool,
}

impl Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.truncated {
            return Ok(());
        }
        let room = self.limit.saturating_sub(self.out.len());
        if s.len() <= room {
            self.out.push_str(s);
            return Ok(());
        }
        let mut end = room;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        self.out.push_str(&s[..end]);
        self.truncated = true;
        Ok(())
    }
}

/// Longest conversion chrono accepts, e.g. `%::z` or `%.3f`.
const MAX_SPEC_CHARS: usize = 5;

fn is_conversion(spec: &str) -> bool {
    StrftimeItems::new(spec).all(|i| !matches!(i, Item::Error))
}

/// Escape every `%` that does not start a known conversion so it renders
/// literally, the way C `strftime` copies unknown conversions through.
fn escape_unknown(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains('%') {
        return Cow::Borrowed(pattern);
    }

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        let spec_len = tail
            .char_indices()
            .skip(2)
            .map(|(i, _)| i)
            .chain(std::iter::once(tail.len()))
            .take(MAX_SPEC_CHARS - 1)
            .find(|&end| is_conversion(&tail[..end]));
        match spec_len {
            Some(end) if end > 1 => {
                out.push_str(&tail[..end]);
                rest = &tail[end..];
            }
            _ => {
                out.push_str("%%");
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn parse_items(pattern: &str) -> Vec<Item<'_>> {
    StrftimeItems::new(pattern).collect()
}

/// Render `items` into `w`, converting `timestamp` to UTC or local time.
fn render<W: Write>(
    w: &mut W,
    items: &[Item<'_>],
    timestamp: DateTime<Utc>,
    use_gmt: bool,
) -> fmt::Result {
    if use_gmt {
        write!(w, "{}", timestamp.format_with_items(items.iter()))
    } else {
        let local = timestamp.with_timezone(&Local);
        write!(w, "{}", local.format_with_items(items.iter()))
    }
}

/// Render `pattern` against `timestamp` into at most `capacity - 1` bytes.
///
/// An absent pattern yields an empty string. Output longer than the capacity
/// is cut at the nearest character boundary. Unknown conversions are copied
/// through as literal text.
pub fn format_time(
    pattern: Option<&str>,
    timestamp: DateTime<Utc>,
    use_gmt: bool,
    capacity: usize,
) -> String {
    let mut out = String::new();
    let Some(pattern) = pattern else {
        return out;
    };

    let pattern = escape_unknown(pattern);
    let items = parse_items(&pattern);

    let mut writer = BoundedWriter {
        out: &mut out,
        limit: capacity.saturating_sub(1),
        truncated: false,
    };
    if render(&mut writer, &items, timestamp, use_gmt).is_err() {
        out.clear();
    }
    out
}

/// Render `pattern` against `timestamp` without ever truncating.
///
/// The buffer starts at twice the pattern length and doubles until the
/// rendered text fits. A pattern that legitimately renders to nothing yields
/// an empty string. Unknown conversions are copied through as literal text.
pub fn expand_time(
    pattern: &str,
    timestamp: DateTime<Utc>,
    use_gmt: bool,
) -> Result<String, TemplateError> {
    let escaped = escape_unknown(pattern);
    let items = parse_items(&escaped);
    let mut capacity = pattern.len() * 2;
    let mut out = String::new();

    loop {
        out.clear();
        out.try_reserve(capacity)
            .map_err(|_| TemplateError::Allocation)?;

        let mut writer = BoundedWriter {
            out: &mut out,
            limit: capacity,
            truncated: false,
        };
        render(&mut writer, &items, timestamp, use_gmt)
            .map_err(|_| TemplateError::Invalid(pattern.to_string()))?;
        if !writer.truncated {
            return Ok(out);
        }

        capacity = capacity
            .max(1)
            .checked_mul(2)
            .ok_or(TemplateError::Allocation)?;
    }
}
