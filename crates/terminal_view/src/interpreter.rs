//! Turns scrollback text into styled, wrapped display lines.

use crate::ansi::{parse_line, plain_text, strip_ansi, Segment};
use crate::highlight::highlight;
use crate::render::TextMeasure;
use crate::status_line::{parse_status_line, StatusBar};
use crate::wrap::wrap_segments;
use terminal::ScrollbackBuffer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// Decode SGR styling. When unset, escapes are stripped.
    pub ansi_aware: bool,
}

/// One wrapped row of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub segments: Vec<Segment>,
    /// Index of the logical line this row came from.
    pub source: usize,
}

impl DisplayLine {
    pub fn text(&self) -> String {
        plain_text(&self.segments)
    }

    pub fn char_len(&self) -> usize {
        self.segments.iter().map(|s| s.text.chars().count()).sum()
    }
}

/// Result of one render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedOutput {
    pub lines: Vec<DisplayLine>,
    /// The most recent status line, kept out of `lines`.
    pub status: Option<StatusBar>,
}

/// Owns the scrollback it renders. Rendering is a pure function of a
/// snapshot, so readers may keep appending while a pass runs.
#[derive(Debug, Clone)]
pub struct OutputInterpreter {
    options: InterpreterOptions,
    scrollback: ScrollbackBuffer,
}

impl OutputInterpreter {
    pub fn new(options: InterpreterOptions) -> Self {
        Self::with_scrollback(options, ScrollbackBuffer::new())
    }

    pub fn with_scrollback(options: InterpreterOptions, scrollback: ScrollbackBuffer) -> Self {
        Self { options, scrollback }
    }

    pub fn options(&self) -> InterpreterOptions {
        self.options
    }

    pub fn set_ansi_aware(&mut self, ansi_aware: bool) {
        self.options.ansi_aware = ansi_aware;
    }

    pub fn scrollback(&self) -> &ScrollbackBuffer {
        &self.scrollback
    }

    /// Append raw output. Does not render.
    pub fn feed(&self, chunk: &str) {
        self.scrollback.append(chunk);
    }

    /// Render the current scrollback.
    pub fn render_scrollback(&self, max_width: f32, measure: &dyn TextMeasure) -> RenderedOutput {
        self.render(&self.scrollback.lines(), max_width, measure)
    }

    /// Render logical `lines` to rows no wider than `max_width`.
    pub fn render(
        &self,
        lines: &[String],
        max_width: f32,
        measure: &dyn TextMeasure,
    ) -> RenderedOutput {
        let mut output = RenderedOutput::default();
        for (source, line) in lines.iter().enumerate() {
            if let Some(status) = parse_status_line(&strip_ansi(line)) {
                output.status = Some(status);
                continue;
            }
            let segments = highlight(parse_line(line, self.options.ansi_aware));
            output.lines.extend(
                wrap_segments(&segments, max_width, measure)
                    .into_iter()
                    .map(|segments| DisplayLine { segments, source }),
            );
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors;
    use crate::render::MonospaceMeasure;
    use pretty_assertions::assert_eq;

    fn measure() -> MonospaceMeasure {
        MonospaceMeasure::new(6.0, 9.0)
    }

    fn ansi() -> OutputInterpreter {
        OutputInterpreter::new(InterpreterOptions { ansi_aware: true })
    }

    #[test]
    fn red_hello_default_world() {
        let interpreter = ansi();
        interpreter.feed("\u{1b}[31mHELLO\u{1b}[0mWORLD\n");
        let output = interpreter.render_scrollback(600.0, &measure());
        assert_eq!(output.lines.len(), 1);
        let segments = &output.lines[0].segments;
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "HELLO");
        assert_eq!(segments[0].style.fg, colors::standard_color(1));
        assert_eq!(segments[1].text, "WORLD");
        assert_eq!(segments[1].style.fg, colors::DEFAULT_FOREGROUND);
        assert_eq!(output.lines[0].text(), "HELLOWORLD");
    }

    #[test]
    fn local_sessions_strip_escapes() {
        let interpreter = OutputInterpreter::new(InterpreterOptions::default());
        let output = interpreter.render(&["\u{1b}[31mred".to_string()], 600.0, &measure());
        assert_eq!(output.lines[0].segments.len(), 1);
        assert_eq!(output.lines[0].segments[0].style.fg, colors::DEFAULT_FOREGROUND);
    }

    #[test]
    fn status_line_is_diverted() {
        let lines = vec![
            "before".to_string(),
            "[0] 0:bash*      12:00".to_string(),
            "after".to_string(),
        ];
        let output = ansi().render(&lines, 600.0, &measure());
        let texts: Vec<_> = output.lines.iter().map(DisplayLine::text).collect();
        assert_eq!(texts, vec!["before", "after"]);
        assert_eq!(output.lines[1].source, 2);
        let status = output.status.expect("status bar");
        assert_eq!(status.left, "[0] 0:bash*");
        assert_eq!(status.right, "12:00");
    }

    #[test]
    fn latest_status_line_wins() {
        let lines = vec!["[0] one".to_string(), "[1] two".to_string()];
        let output = ansi().render(&lines, 600.0, &measure());
        assert!(output.lines.is_empty());
        assert_eq!(output.status.map(|s| s.left), Some("[1] two".to_string()));
    }

    #[test]
    fn empty_lines_are_kept_and_wrapped_rows_share_source() {
        let lines = vec![String::new(), "abcdef".to_string()];
        let output = ansi().render(&lines, 18.0, &measure());
        let sources: Vec<_> = output.lines.iter().map(|l| l.source).collect();
        assert_eq!(sources, vec![0, 1, 1]);
        assert_eq!(output.lines[0].char_len(), 0);
    }

    #[test]
    fn render_is_idempotent() {
        let interpreter = ansi();
        interpreter.feed("[12:00 INFO] up https://example.com\nnext\n");
        let first = interpreter.render_scrollback(60.0, &measure());
        let second = interpreter.render_scrollback(60.0, &measure());
        assert_eq!(first, second);
    }
}
