//! tmux-style status lines (`[0] 0:bash*      "host" 12:00`).

use once_cell::sync::Lazy;
use regex::Regex;
use settings::constants::view::STATUS_SPLIT_SPACES;

static STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\d+\]").expect("STATUS is a compile-time constant"));

/// A status line, split for left and right alignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBar {
    pub left: String,
    pub right: String,
}

/// Parse an ANSI-stripped line as a status line.
///
/// The halves are split at the first run of at least five spaces; without one
/// the whole line goes left.
pub fn parse_status_line(plain: &str) -> Option<StatusBar> {
    if !STATUS.is_match(plain) {
        return None;
    }
    let gap = " ".repeat(STATUS_SPLIT_SPACES);
    let bar = match plain.find(&gap) {
        Some(split) => StatusBar {
            left: plain[..split].trim().to_string(),
            right: plain[split..].trim().to_string(),
        },
        None => StatusBar {
            left: plain.trim().to_string(),
            right: String::new(),
        },
    };
    Some(bar)
}
