//! ANSI escape decoding.
//!
//! Only SGR (`ESC [ ... m`) changes style. Every other CSI sequence, OSC
//! strings and two-byte escapes are dropped. Malformed parameters are skipped
//! and the current style carries on.

use crate::colors::{self, Rgb};
use std::iter::Peekable;
use std::str::CharIndices;

const ESC: char = '\x1b';
const BEL: char = '\x07';
const TAB_WIDTH: usize = 4;

/// Visual attributes of a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Style {
    pub fg: Rgb,
    /// Parsed but not painted by hosts without background fills.
    pub bg: Option<Rgb>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fg: colors::DEFAULT_FOREGROUND,
            bg: None,
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

/// A run of text sharing one style, optionally part of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: Style,
    pub link: Option<String>,
}

impl Segment {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
            link: None,
        }
    }
}

/// Concatenated text of `segments`.
pub fn plain_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

/// Split one logical line into styled segments.
///
/// With `ansi_aware` unset, escapes are removed and everything gets the
/// default style.
pub fn parse_line(line: &str, ansi_aware: bool) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut style = Style::default();
    let mut text = String::new();

    for token in Tokens::new(line) {
        match token {
            Token::Text(c) => text.push(c),
            Token::Sgr(params) if ansi_aware => {
                let next = apply_sgr(style, params);
                if next != style && !text.is_empty() {
                    segments.push(Segment::new(std::mem::take(&mut text), style));
                }
                style = next;
            }
            Token::Sgr(_) => {}
        }
    }
    if !text.is_empty() {
        segments.push(Segment::new(text, style));
    }
    segments
}

/// `line` without escape sequences or control characters.
pub fn strip_ansi(line: &str) -> String {
    Tokens::new(line)
        .filter_map(|token| match token {
            Token::Text(c) => Some(c),
            Token::Sgr(_) => None,
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Text(char),
    /// Parameter bytes of an SGR sequence.
    Sgr(&'a str),
}

struct Tokens<'a> {
    line: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pending_spaces: usize,
}

impl<'a> Tokens<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            chars: line.char_indices().peekable(),
            pending_spaces: 0,
        }
    }

    fn escape(&mut self, start: usize) -> Option<Token<'a>> {
        let (_, kind) = self.chars.next()?;
        match kind {
            '[' => {
                let line = self.line;
                let params = start + 2;
                for (end, c) in self.chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        return (c == 'm').then(|| Token::Sgr(&line[params..end]));
                    }
                }
                None
            }
            ']' => {
                while let Some((_, c)) = self.chars.next() {
                    if c == BEL {
                        break;
                    }
                    if c == ESC {
                        self.chars.next_if(|&(_, c)| c == '\\');
                        break;
                    }
                }
                None
            }
            // Character set designation carries one more byte.
            '(' | ')' | '*' | '+' => {
                self.chars.next();
                None
            }
            _ => None,
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pending_spaces > 0 {
            self.pending_spaces -= 1;
            return Some(Token::Text(' '));
        }
        loop {
            let (index, c) = self.chars.next()?;
            match c {
                ESC => {
                    if let Some(token) = self.escape(index) {
                        return Some(token);
                    }
                }
                '\t' => {
                    self.pending_spaces = TAB_WIDTH - 1;
                    return Some(Token::Text(' '));
                }
                c if c.is_control() => {}
                c => return Some(Token::Text(c)),
            }
        }
    }
}

/// Apply SGR parameters to `style`.
fn apply_sgr(style: Style, params: &str) -> Style {
    let mut next = style;
    // An empty parameter means 0; anything non-numeric is ignored on its own.
    let mut codes = params.split(';').map(|p| {
        if p.is_empty() {
            Some(0u16)
        } else {
            p.parse::<u16>().ok()
        }
    });

    while let Some(code) = codes.next() {
        let Some(code) = code else {
            continue;
        };
        match code {
            0 => next = Style::default(),
            1 => next.bold = true,
            22 => next.bold = false,
            3 => next.italic = true,
            23 => next.italic = false,
            4 => next.underline = true,
            24 => next.underline = false,
            30..=37 => next.fg = colors::standard_color((code - 30) as u8),
            39 => next.fg = colors::DEFAULT_FOREGROUND,
            40..=47 => next.bg = Some(colors::standard_color((code - 40) as u8)),
            49 => next.bg = None,
            90..=97 => next.fg = colors::bright_color((code - 90) as u8),
            100..=107 => next.bg = Some(colors::bright_color((code - 100) as u8)),
            38 | 48 => {
                let Some(color) = extended_color(&mut codes) else {
                    break;
                };
                if code == 38 {
                    next.fg = color;
                } else {
                    next.bg = Some(color);
                }
            }
            _ => {}
        }
    }
    next
}

/// `5;N` or `2;R;G;B` following a 38/48.
fn extended_color(codes: &mut impl Iterator<Item = Option<u16>>) -> Option<Rgb> {
    match codes.next()?? {
        5 => {
            let index = u8::try_from(codes.next()??).ok()?;
            Some(colors::indexed_color(index))
        }
        2 => {
            let mut channel = || u8::try_from(codes.next()??).ok();
            let r = channel()?;
            let g = channel()?;
            let b = channel()?;
            Some(Rgb::new(r, g, b))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn red() -> Style {
        Style {
            fg: colors::standard_color(1),
            ..Style::default()
        }
    }

    #[test]
    fn red_then_reset() {
        let segments = parse_line("\u{1b}[31mHELLO\u{1b}[0mWORLD", true);
        assert_eq!(
            segments,
            vec![
                Segment::new("HELLO", red()),
                Segment::new("WORLD", Style::default()),
            ]
        );
        assert_eq!(plain_text(&segments), "HELLOWORLD");
        assert!(!plain_text(&segments).contains('\u{1b}'));
    }

    #[test]
    fn not_ansi_aware_strips_and_keeps_default_style() {
        let segments = parse_line("\u{1b}[31mHELLO\u{1b}[0mWORLD", false);
        assert_eq!(segments, vec![Segment::new("HELLOWORLD", Style::default())]);
    }

    #[test]
    fn empty_line_has_no_segments() {
        assert!(parse_line("", true).is_empty());
        assert!(parse_line("\u{1b}[0m", true).is_empty());
    }

    #[test_case("\u{1b}[2Jclear", "clear" ; "erase display")]
    #[test_case("a\u{1b}[?25lb", "ab" ; "private mode")]
    #[test_case("\u{1b}]0;title\u{7}prompt", "prompt" ; "osc with bel")]
    #[test_case("\u{1b}]0;title\u{1b}\\prompt", "prompt" ; "osc with st")]
    #[test_case("x\u{1b}(By", "xy" ; "charset select")]
    #[test_case("a\u{1b}[12", "a" ; "unterminated csi")]
    #[test_case("a\u{0}b\rc", "abc" ; "control characters")]
    #[test_case("a\tb", "a    b" ; "tab")]
    #[test_case("héllo ✓", "héllo ✓" ; "unicode")]
    fn strips_escapes(input: &str, expected: &str) {
        assert_eq!(strip_ansi(input), expected);
    }

    #[test_case("1", |s: &Style| s.bold ; "bold")]
    #[test_case("3", |s: &Style| s.italic ; "italic")]
    #[test_case("4", |s: &Style| s.underline ; "underline")]
    #[test_case("1;4", |s: &Style| s.bold && s.underline ; "combined")]
    fn attributes_turn_on(params: &str, check: fn(&Style) -> bool) {
        assert!(check(&apply_sgr(Style::default(), params)));
    }

    #[test]
    fn attributes_turn_off() {
        let on = apply_sgr(Style::default(), "1;3;4");
        let off = apply_sgr(on, "22;23;24");
        assert_eq!(off, Style::default());
    }

    #[test_case("32", colors::standard_color(2) ; "standard green")]
    #[test_case("92", colors::bright_color(2) ; "bright green")]
    #[test_case("38;5;196", Rgb::new(255, 0, 0) ; "indexed cube")]
    #[test_case("38;5;232", Rgb::new(8, 8, 8) ; "indexed gray")]
    #[test_case("38;2;1;2;3", Rgb::new(1, 2, 3) ; "truecolor")]
    #[test_case("31;39", colors::DEFAULT_FOREGROUND ; "default foreground")]
    #[test_case("", colors::DEFAULT_FOREGROUND ; "empty resets")]
    fn foreground(params: &str, expected: Rgb) {
        assert_eq!(apply_sgr(Style::default(), params).fg, expected);
    }

    #[test]
    fn background_does_not_touch_foreground() {
        let style = apply_sgr(red(), "48;2;10;20;30");
        assert_eq!(style.fg, colors::standard_color(1));
        assert_eq!(style.bg, Some(Rgb::new(10, 20, 30)));
        assert_eq!(apply_sgr(style, "49").bg, None);
    }

    #[test_case("38;5;300" ; "index out of range")]
    #[test_case("38;5" ; "missing index")]
    #[test_case("38;2;1;2" ; "missing channel")]
    #[test_case("38;7;1" ; "unknown selector")]
    #[test_case("x" ; "not a number")]
    fn malformed_keeps_current_style(params: &str) {
        assert_eq!(apply_sgr(red(), params), red());
    }

    #[test]
    fn malformed_code_does_not_discard_the_rest() {
        assert_eq!(apply_sgr(Style::default(), "x;31"), red());
    }

    #[test]
    fn style_survives_non_sgr_sequences() {
        let segments = parse_line("\u{1b}[31mA\u{1b}[KB", true);
        assert_eq!(segments, vec![Segment::new("AB", red())]);
    }
}
