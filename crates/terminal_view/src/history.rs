//! Submitted-command history with up/down navigation.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    /// `entries.len()` means "past the end", where a fresh line is edited.
    cursor: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a command log, collapsing consecutive repeats.
    pub fn from_entries(entries: impl IntoIterator<Item = String>) -> Self {
        let mut history = Self::new();
        for entry in entries {
            history.push(&entry);
        }
        history
    }

    /// Record a submitted command. Empty commands and repeats of the last
    /// entry are skipped. The cursor always moves past the end.
    pub fn push(&mut self, command: &str) -> bool {
        let added = !command.is_empty() && self.entries.last().map(String::as_str) != Some(command);
        if added {
            self.entries.push(command.to_string());
        }
        self.cursor = self.entries.len();
        added
    }

    /// Step to the older entry. Stays on the oldest one.
    pub fn previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = self.cursor.saturating_sub(1);
        self.entries.get(self.cursor).map(String::as_str)
    }

    /// Step to the newer entry, or `None` once past the newest.
    pub fn next(&mut self) -> Option<&str> {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
            self.entries.get(self.cursor).map(String::as_str)
        } else {
            self.cursor = self.entries.len();
            None
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
