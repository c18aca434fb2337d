//! Character-level wrapping of styled segments to a pixel width.

use crate::ansi::Segment;
use crate::render::TextMeasure;

/// Break `segments` into display rows no wider than `max_width`.
///
/// Tokens are split anywhere. Every row holds at least one character, so a
/// character wider than the whole row still makes progress. A line with no
/// segments yields one empty row.
pub fn wrap_segments(
    segments: &[Segment],
    max_width: f32,
    measure: &dyn TextMeasure,
) -> Vec<Vec<Segment>> {
    let mut rows = Vec::new();
    let mut row: Vec<Segment> = Vec::new();
    let mut width = 0.0;
    let mut row_chars = 0usize;

    for segment in segments {
        let mut run = String::new();
        for c in segment.text.chars() {
            let char_width = measure.char_width(c);
            if row_chars > 0 && width + char_width > max_width {
                if !run.is_empty() {
                    row.push(piece(segment, std::mem::take(&mut run)));
                }
                rows.push(std::mem::take(&mut row));
                width = 0.0;
                row_chars = 0;
            }
            run.push(c);
            width += char_width;
            row_chars += 1;
        }
        if !run.is_empty() {
            row.push(piece(segment, run));
        }
    }
    if !row.is_empty() || rows.is_empty() {
        rows.push(row);
    }
    rows
}

fn piece(segment: &Segment, text: String) -> Segment {
    Segment {
        text,
        style: segment.style,
        link: segment.link.clone(),
    }
}
