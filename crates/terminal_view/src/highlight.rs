//! Keyword tags and URLs, recolored on top of whatever ANSI styling a line has.

use crate::ansi::{plain_text, Segment, Style};
use crate::colors::{self, Rgb};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\[\]]*?(WARNING|WARN|ERROR|INFO)[^\[\]]*\]")
        .expect("KEYWORD is a compile-time constant")
});

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("URL is a compile-time constant"));

/// Byte ranges of URLs in `text`, without trailing punctuation.
pub fn find_urls(text: &str) -> Vec<Range<usize>> {
    URL.find_iter(text)
        .filter_map(|m| {
            let trimmed = m.as_str().trim_end_matches(|c| {
                matches!(c, '.' | ',' | ';' | ':' | ')' | ']' | '>' | '\'' | '"')
            });
            // "https://" alone is not a link.
            (!trimmed.ends_with("//")).then(|| m.start()..m.start() + trimmed.len())
        })
        .collect()
}

fn keyword_color(keyword: &str) -> Rgb {
    match keyword {
        "ERROR" => colors::keyword::ERROR,
        "INFO" => colors::keyword::INFO,
        _ => colors::keyword::WARN,
    }
}

struct Cell {
    byte: usize,
    c: char,
    style: Style,
    link: Option<usize>,
}

/// Recolor bracketed level tags and mark URLs as underlined links.
pub fn highlight(segments: Vec<Segment>) -> Vec<Segment> {
    let text = plain_text(&segments);
    let keywords: Vec<(Range<usize>, Rgb)> = KEYWORD
        .captures_iter(&text)
        .filter_map(|caps| Some((caps.get(0)?.range(), keyword_color(caps.get(1)?.as_str()))))
        .collect();
    let urls = find_urls(&text);
    if keywords.is_empty() && urls.is_empty() {
        return segments;
    }

    let mut cells = Vec::with_capacity(text.len());
    let mut byte = 0;
    for segment in &segments {
        for c in segment.text.chars() {
            cells.push(Cell {
                byte,
                c,
                style: segment.style,
                link: None,
            });
            byte += c.len_utf8();
        }
    }

    for cell in &mut cells {
        if let Some((_, color)) = keywords.iter().find(|(range, _)| range.contains(&cell.byte)) {
            cell.style.fg = *color;
        }
        if let Some(index) = urls.iter().position(|range| range.contains(&cell.byte)) {
            cell.style.fg = colors::URL;
            cell.style.underline = true;
            cell.link = Some(index);
        }
    }

    let mut out: Vec<Segment> = Vec::new();
    let mut current: Option<(Style, Option<usize>, String)> = None;
    for cell in cells {
        if let Some((style, link, run)) = &mut current {
            if *style == cell.style && *link == cell.link {
                run.push(cell.c);
                continue;
            }
        }
        if let Some(run) = current.take() {
            out.push(finish(run, &text, &urls));
        }
        current = Some((cell.style, cell.link, cell.c.to_string()));
    }
    if let Some(run) = current {
        out.push(finish(run, &text, &urls));
    }
    out
}

fn finish(
    (style, link, run): (Style, Option<usize>, String),
    text: &str,
    urls: &[Range<usize>],
) -> Segment {
    Segment {
        text: run,
        style,
        link: link
            .and_then(|index| urls.get(index))
            .map(|range| text[range.clone()].to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::parse_line;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn colored(segments: &[Segment], needle: &str) -> Rgb {
        segments
            .iter()
            .find(|s| s.text == needle)
            .map(|s| s.style.fg)
            .unwrap_or_else(|| panic!("no segment {needle:?} in {segments:?}"))
    }

    #[test_case("[12:00:01 WARN]", colors::keyword::WARN ; "warn")]
    #[test_case("[12:00:01 WARNING]", colors::keyword::WARN ; "warning")]
    #[test_case("[Server thread/ERROR]", colors::keyword::ERROR ; "error")]
    #[test_case("[Server thread/INFO]", colors::keyword::INFO ; "info")]
    fn bracketed_keyword_is_recolored(tag: &str, color: Rgb) {
        let line = format!("{tag}: Done (1.2s)!");
        let segments = highlight(parse_line(&line, false));
        assert_eq!(colored(&segments, tag), color);
        assert_eq!(colored(&segments, ": Done (1.2s)!"), colors::DEFAULT_FOREGROUND);
    }

    #[test]
    fn keyword_outside_brackets_is_left_alone() {
        let segments = highlight(parse_line("ERROR without brackets", false));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].style.fg, colors::DEFAULT_FOREGROUND);
    }

    #[test]
    fn keyword_overrides_ansi_color() {
        let segments = highlight(parse_line("\u{1b}[34m[INFO] ready", true));
        assert_eq!(colored(&segments, "[INFO]"), colors::keyword::INFO);
        assert_eq!(colored(&segments, " ready"), colors::standard_color(4));
    }

    #[test]
    fn url_becomes_link() {
        let segments = highlight(parse_line("see https://example.com/docs. thanks", false));
        let link = segments
            .iter()
            .find(|s| s.link.is_some())
            .expect("link segment");
        assert_eq!(link.text, "https://example.com/docs");
        assert_eq!(link.link.as_deref(), Some("https://example.com/docs"));
        assert!(link.style.underline);
        assert_eq!(link.style.fg, colors::URL);
        assert_eq!(plain_text(&segments), "see https://example.com/docs. thanks");
    }

    #[test]
    fn two_urls_stay_separate() {
        let segments = highlight(parse_line("http://a.io http://b.io", false));
        let links: Vec<_> = segments.iter().filter_map(|s| s.link.clone()).collect();
        assert_eq!(links, vec!["http://a.io".to_string(), "http://b.io".to_string()]);
    }

    #[test_case("https://" ; "scheme only")]
    #[test_case("ftp://example.com" ; "other scheme")]
    fn not_links(text: &str) {
        assert!(find_urls(text).is_empty());
    }

    #[test]
    fn plain_line_is_unchanged() {
        let segments = parse_line("nothing to see", false);
        assert_eq!(highlight(segments.clone()), segments);
    }
}
