//! Output interpretation, drawing and input handling for one terminal tab.
//!
//! [`OutputInterpreter`] turns raw scrollback into styled, wrapped rows;
//! [`paint`] draws them through a host [`RenderSink`]; [`SessionController`]
//! routes [`InputEvent`]s to the local or remote session.

mod ansi;
pub mod colors;
mod controller;
mod highlight;
mod history;
mod input;
mod interpreter;
mod render;
mod selection;
mod status_line;
mod wrap;

pub use ansi::{parse_line, plain_text, strip_ansi, Segment, Style};
pub use colors::{bright_color, indexed_color, standard_color, Rgb, Rgba};
pub use controller::{HostServices, SessionController, SessionMode, SystemHost};
pub use highlight::{find_urls, highlight};
pub use history::History;
pub use input::{InputEvent, InputLine, Key, LineEditor, Modifiers, PasswordPrompt, MASK};
pub use interpreter::{DisplayLine, InterpreterOptions, OutputInterpreter, RenderedOutput};
pub use render::{
    paint, paint_input, Layout, LinkSpan, MonospaceMeasure, RenderSink, TextMeasure, Viewport,
};
pub use selection::{Selection, TextPos};
pub use status_line::{parse_status_line, StatusBar};
pub use wrap::wrap_segments;
