//! Mouse text selection over wrapped display lines.

use crate::interpreter::DisplayLine;
use std::ops::Range;

/// A caret position: display line and char offset within it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextPos {
    pub line: usize,
    pub col: usize,
}

impl TextPos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Selection between two carets. `head` follows the mouse and may sit
/// before `anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: TextPos,
    pub head: TextPos,
}

impl Selection {
    pub fn new(at: TextPos) -> Self {
        Self {
            anchor: at,
            head: at,
        }
    }

    pub fn extend_to(&mut self, head: TextPos) {
        self.head = head;
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// `(start, end)` in reading order.
    pub fn normalized(&self) -> (TextPos, TextPos) {
        if self.anchor <= self.head {
            (self.anchor, self.head)
        } else {
            (self.head, self.anchor)
        }
    }

    /// Selected char range of display line `line`, which holds `len` chars.
    pub fn columns_in(&self, line: usize, len: usize) -> Option<Range<usize>> {
        let (start, end) = self.normalized();
        if self.is_empty() || line < start.line || line > end.line {
            return None;
        }
        let from = if line == start.line { start.col.min(len) } else { 0 };
        let to = if line == end.line { end.col.min(len) } else { len };
        (from < to).then_some(from..to)
    }

    /// Selected text, lines joined with `\n`.
    pub fn selected_text(&self, lines: &[DisplayLine]) -> String {
        if self.is_empty() {
            return String::new();
        }
        let (start, end) = self.normalized();
        let mut parts = Vec::new();
        for line in start.line..=end.line {
            let Some(display) = lines.get(line) else {
                break;
            };
            let text = display.text();
            let len = text.chars().count();
            let from = if line == start.line { start.col.min(len) } else { 0 };
            let to = if line == end.line { end.col.min(len) } else { len };
            parts.push(
                text.chars()
                    .skip(from)
                    .take(to.saturating_sub(from))
                    .collect::<String>(),
            );
        }
        parts.join("\n")
    }
}
