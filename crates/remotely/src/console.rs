//! Streams rendered output to a plain terminal with 24-bit SGR colors.

use settings::ViewConfig;
use terminal_view::{
    colors, DisplayLine, InputLine, MonospaceMeasure, RenderSink, RenderedOutput, Rgb, Rgba,
    StatusBar, TextMeasure,
};

/// A [`RenderSink`] that turns draw calls into SGR-colored text.
///
/// Rectangles are ignored except one-pixel underlines, which mark the next
/// run of text.
pub struct AnsiSink {
    measure: MonospaceMeasure,
    out: String,
    underline: bool,
}

impl AnsiSink {
    pub fn new(view: &ViewConfig) -> Self {
        Self {
            measure: MonospaceMeasure::from_config(view),
            out: String::new(),
            underline: false,
        }
    }

    pub fn set_underline(&mut self, underline: bool) {
        self.underline = underline;
    }

    pub fn newline(&mut self) {
        self.out.push('\n');
    }

    /// Everything written so far, leaving the sink empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.out)
    }
}

impl TextMeasure for AnsiSink {
    fn text_width(&self, text: &str) -> f32 {
        self.measure.text_width(text)
    }

    fn line_height(&self) -> f32 {
        self.measure.line_height()
    }
}

impl RenderSink for AnsiSink {
    fn draw_text(&mut self, _x: f32, _y: f32, text: &str, color: Rgb) {
        if text.is_empty() {
            return;
        }
        let underline = if self.underline { "4;" } else { "" };
        self.out.push_str(&format!(
            "\x1b[{}38;2;{};{};{}m{}\x1b[0m",
            underline, color.r, color.g, color.b, text
        ));
        self.underline = false;
    }

    fn fill_rect(&mut self, _x: f32, _y: f32, _width: f32, height: f32, _color: Rgba) {
        if height <= 1.0 {
            self.underline = true;
        }
    }
}

pub fn write_line(sink: &mut AnsiSink, line: &DisplayLine) {
    for segment in &line.segments {
        sink.set_underline(segment.style.underline);
        sink.draw_text(0.0, 0.0, &segment.text, segment.style.fg);
    }
    sink.newline();
}

pub fn write_status(sink: &mut AnsiSink, status: &StatusBar) {
    sink.draw_text(0.0, 0.0, &status.left, colors::STATUS_TEXT);
    if !status.right.is_empty() {
        sink.draw_text(0.0, 0.0, "  |  ", colors::SUGGESTION);
        sink.draw_text(0.0, 0.0, &status.right, colors::STATUS_TEXT);
    }
    sink.newline();
}

/// Prompt plus ghost text, without a trailing newline.
pub fn write_prompt(sink: &mut AnsiSink, input: &InputLine) {
    sink.draw_text(0.0, 0.0, &input.prompt, colors::PROMPT);
    sink.draw_text(0.0, 0.0, &input.text, colors::DEFAULT_FOREGROUND);
    if let Some(ghost) = &input.suggestion {
        sink.draw_text(0.0, 0.0, ghost, colors::SUGGESTION);
    }
}

/// Tracks which logical lines have already been printed.
#[derive(Debug, Default)]
pub struct OutputCursor {
    printed: usize,
    status: Option<StatusBar>,
}

impl OutputCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write rows for logical lines completed since the last call.
    /// `complete` is how many logical lines end in a newline.
    pub fn write_new(&mut self, sink: &mut AnsiSink, output: &RenderedOutput, complete: usize) {
        if complete < self.printed {
            tracing::debug!("Scrollback shrank, restarting output");
            self.printed = 0;
        }
        for line in output
            .lines
            .iter()
            .filter(|line| line.source >= self.printed && line.source < complete)
        {
            write_line(sink, line);
        }
        self.printed = complete;

        if output.status != self.status {
            if let Some(status) = &output.status {
                write_status(sink, status);
            }
            self.status = output.status.clone();
        }
    }
}

/// Logical lines in `text` that end with a newline.
pub fn complete_lines(text: &str) -> usize {
    text.matches('\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use terminal_view::{InterpreterOptions, OutputInterpreter};

    fn render(lines: &[&str]) -> RenderedOutput {
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        OutputInterpreter::new(InterpreterOptions::default()).render(
            &lines,
            1000.0,
            &MonospaceMeasure::default(),
        )
    }

    fn sink() -> AnsiSink {
        AnsiSink::new(&ViewConfig::default())
    }

    #[test]
    fn draws_truecolor_runs() {
        let mut sink = sink();
        sink.draw_text(0.0, 0.0, "hi", Rgb::new(0x4A, 0xF6, 0x26));
        assert_eq!(sink.take(), "\x1b[38;2;74;246;38mhi\x1b[0m");
        assert_eq!(sink.take(), "");
    }

    #[test]
    fn underline_applies_to_the_next_run_only() {
        let mut sink = sink();
        sink.fill_rect(0.0, 0.0, 10.0, 1.0, colors::SELECTION);
        sink.draw_text(0.0, 0.0, "a", Rgb::new(0, 0, 0));
        sink.draw_text(0.0, 0.0, "b", Rgb::new(0, 0, 0));
        assert_eq!(
            sink.take(),
            "\x1b[4;38;2;0;0;0ma\x1b[0m\x1b[38;2;0;0;0mb\x1b[0m"
        );
    }

    #[test]
    fn links_are_underlined() {
        let mut sink = sink();
        let output = render(&["see http://x.io"]);
        write_line(&mut sink, &output.lines[0]);
        assert!(sink.take().contains("\x1b[4;38;2;0;170;255mhttp://x.io"));
    }

    #[test]
    fn only_completed_lines_are_written_once() {
        let mut sink = sink();
        let mut cursor = OutputCursor::new();

        cursor.write_new(&mut sink, &render(&["one", "tw"]), 1);
        let first = sink.take();
        assert!(first.contains("one"));
        assert!(!first.contains("tw"));

        cursor.write_new(&mut sink, &render(&["one", "two"]), 2);
        let second = sink.take();
        assert!(!second.contains("one"));
        assert!(second.contains("two"));
    }

    #[test]
    fn restarts_after_clear() {
        let mut sink = sink();
        let mut cursor = OutputCursor::new();
        cursor.write_new(&mut sink, &render(&["a", "b"]), 2);
        sink.take();

        cursor.write_new(&mut sink, &render(&["c"]), 1);
        assert!(sink.take().contains('c'));
    }

    #[test]
    fn status_is_written_when_it_changes() {
        let mut sink = sink();
        let mut cursor = OutputCursor::new();
        let output = render(&["[1] tps 20     players 3"]);

        cursor.write_new(&mut sink, &output, 1);
        let text = sink.take();
        assert!(text.contains("[1] tps 20"));
        assert!(text.contains("players 3"));

        cursor.write_new(&mut sink, &output, 1);
        assert_eq!(sink.take(), "");
    }

    #[test]
    fn counts_complete_lines() {
        assert_eq!(complete_lines(""), 0);
        assert_eq!(complete_lines("a\nb"), 1);
        assert_eq!(complete_lines("a\nb\n"), 2);
    }
}
