//! Drawing through a host-provided sink.
//!
//! The host supplies text metrics and two primitives (draw text, fill a
//! rectangle). [`paint`] lays out the visible rows and returns a [`Layout`]
//! that maps pointer positions back to text and links.

use crate::colors::{self, Rgb, Rgba};
use crate::input::InputLine;
use crate::interpreter::RenderedOutput;
use crate::selection::{Selection, TextPos};
use crate::status_line::StatusBar;
use settings::ViewConfig;

pub trait TextMeasure {
    fn text_width(&self, text: &str) -> f32;
    fn line_height(&self) -> f32;

    fn char_width(&self, c: char) -> f32 {
        let mut buf = [0u8; 4];
        self.text_width(c.encode_utf8(&mut buf))
    }
}

pub trait RenderSink: TextMeasure {
    fn draw_text(&mut self, x: f32, y: f32, text: &str, color: Rgb);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba);
}

/// Fixed-cell metrics for hosts without a font.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasure {
    pub cell_width: f32,
    pub line_height: f32,
}

impl MonospaceMeasure {
    pub fn new(cell_width: f32, line_height: f32) -> Self {
        Self {
            cell_width,
            line_height,
        }
    }

    pub fn from_config(config: &ViewConfig) -> Self {
        Self::new(config.cell_width, config.line_height)
    }
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl TextMeasure for MonospaceMeasure {
    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.cell_width
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }

    fn char_width(&self, _c: char) -> f32 {
        self.cell_width
    }
}

/// Area to paint, in host pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Rows scrolled up from the bottom.
    pub scroll: usize,
}

/// A link painted on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpan {
    pub line: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
struct RowLayout {
    line: usize,
    y: f32,
    /// Left edge of every char, plus the right edge of the last one.
    edges: Vec<f32>,
}

/// Geometry of the last paint, for hit testing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    line_height: f32,
    rows: Vec<RowLayout>,
    links: Vec<LinkSpan>,
    scroll: usize,
    max_scroll: usize,
}

impl Layout {
    /// Caret nearest to `(x, y)`. Points above or below the rows clamp to
    /// the first or last painted row.
    pub fn position_at(&self, x: f32, y: f32) -> Option<TextPos> {
        let row = self
            .rows
            .iter()
            .find(|row| y < row.y + self.line_height)
            .or_else(|| self.rows.last())?;
        let col = row
            .edges
            .windows(2)
            .position(|edge| x < (edge[0] + edge[1]) / 2.0)
            .unwrap_or(row.edges.len().saturating_sub(1));
        Some(TextPos::new(row.line, col))
    }

    pub fn link_at(&self, x: f32, y: f32) -> Option<&str> {
        self.links
            .iter()
            .find(|link| {
                x >= link.x
                    && x < link.x + link.width
                    && y >= link.y
                    && y < link.y + self.line_height
            })
            .map(|link| link.url.as_str())
    }

    pub fn links(&self) -> &[LinkSpan] {
        &self.links
    }

    /// Display lines that were painted, top to bottom.
    pub fn visible_lines(&self) -> Vec<usize> {
        self.rows.iter().map(|row| row.line).collect()
    }

    /// Scroll offset actually used, after clamping.
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn max_scroll(&self) -> usize {
        self.max_scroll
    }
}

/// Paint `output` bottom-aligned into `viewport`.
pub fn paint<S: RenderSink + ?Sized>(
    sink: &mut S,
    output: &RenderedOutput,
    viewport: Viewport,
    selection: Option<&Selection>,
) -> Layout {
    sink.fill_rect(
        viewport.x,
        viewport.y,
        viewport.width,
        viewport.height,
        colors::BACKGROUND,
    );
    let line_height = sink.line_height();
    let mut layout = Layout {
        line_height,
        ..Layout::default()
    };
    if line_height <= 0.0 {
        return layout;
    }

    let mut text_height = viewport.height;
    if let Some(status) = &output.status {
        text_height -= line_height;
        paint_status(sink, status, viewport, viewport.y + text_height.max(0.0));
    }

    let capacity = (text_height / line_height).floor().max(0.0) as usize;
    let total = output.lines.len();
    layout.max_scroll = total.saturating_sub(capacity);
    layout.scroll = viewport.scroll.min(layout.max_scroll);
    let end = total - layout.scroll;
    let start = end.saturating_sub(capacity);

    for (row, index) in (start..end).enumerate() {
        let line = &output.lines[index];
        let y = viewport.y + row as f32 * line_height;

        let mut edges = vec![viewport.x];
        let mut x = viewport.x;
        for segment in &line.segments {
            for c in segment.text.chars() {
                x += sink.char_width(c);
                edges.push(x);
            }
        }

        if let Some(columns) = selection.and_then(|s| s.columns_in(index, edges.len() - 1)) {
            let left = edges[columns.start];
            sink.fill_rect(left, y, edges[columns.end] - left, line_height, colors::SELECTION);
        }

        let mut col = 0;
        for segment in &line.segments {
            let len = segment.text.chars().count();
            let left = edges[col];
            let width = edges[col + len] - left;
            sink.draw_text(left, y, &segment.text, segment.style.fg);
            if segment.style.underline {
                sink.fill_rect(left, y + line_height - 1.0, width, 1.0, segment.style.fg.with_alpha(0xFF));
            }
            if let Some(url) = &segment.link {
                layout.links.push(LinkSpan {
                    line: index,
                    x: left,
                    y,
                    width,
                    url: url.clone(),
                });
            }
            col += len;
        }

        layout.rows.push(RowLayout {
            line: index,
            y,
            edges,
        });
    }
    layout
}

fn paint_status<S: RenderSink + ?Sized>(sink: &mut S, status: &StatusBar, viewport: Viewport, y: f32) {
    let line_height = sink.line_height();
    sink.fill_rect(viewport.x, y, viewport.width, line_height, colors::STATUS_BACKGROUND);
    sink.draw_text(viewport.x, y, &status.left, colors::STATUS_TEXT);
    if !status.right.is_empty() {
        let right_x = viewport.x + viewport.width - sink.text_width(&status.right);
        sink.draw_text(right_x.max(viewport.x), y, &status.right, colors::STATUS_TEXT);
    }
}

/// Paint the prompt, the (possibly masked) input, the ghost suggestion and
/// the caret.
pub fn paint_input<S: RenderSink + ?Sized>(
    sink: &mut S,
    input: &InputLine,
    x: f32,
    y: f32,
    cursor_visible: bool,
) {
    let shown = format!("{}{}", input.prompt, input.text);
    sink.draw_text(x, y, &shown, colors::PROMPT);
    if let Some(suggestion) = &input.suggestion {
        sink.draw_text(x + sink.text_width(&shown), y, suggestion, colors::SUGGESTION);
    }
    if cursor_visible {
        let before: String = input.text.chars().take(input.cursor).collect();
        let caret_x = x + sink.text_width(&input.prompt) + sink.text_width(&before);
        let height = sink.line_height();
        sink.fill_rect(caret_x, y, 1.0, height, colors::CURSOR);
    }
}
