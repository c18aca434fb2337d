//! Host-independent input events, the single-line editor and password entry.

use secrecy::zeroize::Zeroize;
use secrecy::SecretString;
use std::fmt;

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub control: bool,
    /// Cmd on macOS, Super elsewhere.
    pub platform: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn control() -> Self {
        Self {
            control: true,
            ..Self::default()
        }
    }

    /// Control, or the platform key on macOS.
    pub fn is_command(&self) -> bool {
        if cfg!(target_os = "macos") {
            self.platform
        } else {
            self.control
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Tab,
    Backspace,
    Delete,
    Escape,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    /// A printable key pressed as a shortcut (with Control, for example).
    Character(char),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Typed text.
    Char(char),
    Key { key: Key, modifiers: Modifiers },
    Paste(String),
    MouseDown { x: f32, y: f32, modifiers: Modifiers },
    MouseDrag { x: f32, y: f32, modifiers: Modifiers },
    MouseUp { x: f32, y: f32, modifiers: Modifiers },
    /// Positive scrolls towards older output.
    Scroll(i32),
}

impl InputEvent {
    pub fn key(key: Key) -> Self {
        Self::Key {
            key,
            modifiers: Modifiers::none(),
        }
    }
}

/// What the host should draw on the input row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputLine {
    pub prompt: String,
    /// The buffer as shown; masked while a password is typed.
    pub text: String,
    /// Caret position in chars of `text`.
    pub cursor: usize,
    /// Ghost completion drawn after the text.
    pub suggestion: Option<String>,
}

/// Editable command line. The cursor counts chars, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineEditor {
    buffer: String,
    cursor: usize,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_index)
            .map_or(self.buffer.len(), |(byte, _)| byte)
    }

    /// Replace the contents and put the cursor at the end.
    pub fn set(&mut self, text: &str) {
        self.buffer = text.to_string();
        self.cursor = self.len();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Return the contents, leaving the editor empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
    }

    /// Insert pasted text at the cursor. Line breaks become spaces.
    pub fn insert_str(&mut self, text: &str) {
        let cleaned: String = text
            .chars()
            .filter(|&c| c != '\r')
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        let at = self.byte_index(self.cursor);
        self.buffer.insert_str(at, &cleaned);
        self.cursor += cleaned.chars().count();
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.buffer.remove(at);
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.len() {
            return false;
        }
        let at = self.byte_index(self.cursor);
        self.buffer.remove(at);
        true
    }

    /// Delete back to the start of the previous word.
    pub fn delete_word(&mut self) -> bool {
        let start = self.word_start_before(self.cursor);
        if start == self.cursor {
            return false;
        }
        let (from, to) = (self.byte_index(start), self.byte_index(self.cursor));
        self.buffer.replace_range(from..to, "");
        self.cursor = start;
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.len());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.len();
    }

    pub fn word_left(&mut self) {
        self.cursor = self.word_start_before(self.cursor);
    }

    pub fn word_right(&mut self) {
        let chars: Vec<char> = self.buffer.chars().collect();
        let mut i = self.cursor;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        self.cursor = i;
    }

    /// Splice `text` in at the cursor and move past it.
    pub fn accept_completion(&mut self, text: &str) {
        let at = self.byte_index(self.cursor);
        self.buffer.insert_str(at, text);
        self.cursor += text.chars().count();
    }

    fn word_start_before(&self, from: usize) -> usize {
        let chars: Vec<char> = self.buffer.chars().collect();
        let mut i = from.min(chars.len());
        while i > 0 && chars[i - 1].is_whitespace() {
            i -= 1;
        }
        while i > 0 && !chars[i - 1].is_whitespace() {
            i -= 1;
        }
        i
    }
}

/// Shown for every hidden password character.
pub const MASK: char = '*';

/// Password being typed. Only mask characters ever leave this type, except
/// through [`PasswordPrompt::take`].
#[derive(Default)]
pub struct PasswordPrompt {
    secret: String,
}

impl PasswordPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: char) {
        if c != '\n' && c != '\r' {
            self.secret.push(c);
        }
    }

    pub fn push_str(&mut self, text: &str) {
        for c in text.chars() {
            self.push(c);
        }
    }

    pub fn backspace(&mut self) -> bool {
        self.secret.pop().is_some()
    }

    pub fn len(&self) -> usize {
        self.secret.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    /// One [`MASK`] per typed character.
    pub fn masked(&self) -> String {
        std::iter::repeat(MASK).take(self.len()).collect()
    }

    /// Hand the password over and leave the prompt empty.
    pub fn take(&mut self) -> SecretString {
        tracing::debug!(chars = self.len(), "Password submitted");
        SecretString::from(std::mem::take(&mut self.secret))
    }

    pub fn clear(&mut self) {
        self.secret.zeroize();
    }
}

impl fmt::Debug for PasswordPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordPrompt")
            .field("len", &self.len())
            .finish()
    }
}

impl Drop for PasswordPrompt {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use test_case::test_case;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn password_is_masked_and_cleared() {
        let mut prompt = PasswordPrompt::new();
        for c in "hunter2".chars() {
            prompt.push(c);
        }
        assert_eq!(prompt.masked(), "*******");
        assert!(!format!("{prompt:?}").contains("hunter2"));

        let secret = prompt.take();
        assert_eq!(secret.expose_secret(), "hunter2");
        assert!(prompt.is_empty());
        assert_eq!(prompt.masked(), "");
        assert!(logs_contain("Password submitted"));
        assert!(!logs_contain("hunter2"));
    }

    #[test]
    fn password_paste_and_backspace() {
        let mut prompt = PasswordPrompt::new();
        prompt.push_str("ab\r\nc");
        assert_eq!(prompt.masked(), "***");
        assert!(prompt.backspace());
        assert_eq!(prompt.len(), 2);
        prompt.clear();
        assert!(!prompt.backspace());
    }

    fn editor(text: &str, cursor: usize) -> LineEditor {
        let mut editor = LineEditor::new();
        editor.set(text);
        editor.cursor = cursor;
        editor
    }

    #[test]
    fn inserts_at_cursor() {
        let mut e = editor("held", 3);
        e.insert_char('l');
        e.insert_char('o');
        assert_eq!((e.text(), e.cursor()), ("hellod", 5));
    }

    #[test]
    fn multibyte_insert_and_backspace() {
        let mut e = editor("caf", 3);
        e.insert_char('é');
        e.insert_char('!');
        assert_eq!(e.text(), "café!");
        assert!(e.backspace());
        assert!(e.backspace());
        assert_eq!((e.text(), e.cursor()), ("caf", 3));
    }

    #[test]
    fn backspace_and_delete_at_edges() {
        let mut e = editor("ab", 0);
        assert!(!e.backspace());
        assert!(e.delete());
        assert_eq!(e.text(), "b");
        e.move_end();
        assert!(!e.delete());
    }

    #[test_case("git commit -m", 13, "git commit ", 11 ; "last word")]
    #[test_case("git commit   ", 13, "git ", 4 ; "trailing spaces")]
    #[test_case("git commit", 6, "git mmit", 4 ; "inside a word")]
    #[test_case("", 0, "", 0 ; "empty")]
    fn delete_word(text: &str, cursor: usize, expected: &str, expected_cursor: usize) {
        let mut e = editor(text, cursor);
        e.delete_word();
        assert_eq!((e.text(), e.cursor()), (expected, expected_cursor));
    }

    #[test]
    fn word_jumps() {
        let mut e = editor("ls  -la /tmp", 12);
        e.word_left();
        assert_eq!(e.cursor(), 8);
        e.word_left();
        assert_eq!(e.cursor(), 4);
        e.word_left();
        assert_eq!(e.cursor(), 0);
        e.word_right();
        assert_eq!(e.cursor(), 2);
        e.word_right();
        assert_eq!(e.cursor(), 7);
    }

    #[test]
    fn home_end_left_right_are_clamped() {
        let mut e = editor("abc", 1);
        e.move_home();
        e.move_left();
        assert_eq!(e.cursor(), 0);
        e.move_end();
        e.move_right();
        assert_eq!(e.cursor(), 3);
    }

    #[test]
    fn paste_flattens_newlines() {
        let mut e = editor("echo ", 5);
        e.insert_str("a\r\nb");
        assert_eq!((e.text(), e.cursor()), ("echo a b", 8));
    }

    #[test]
    fn accept_completion_moves_past_suffix() {
        let mut e = editor("cd su", 5);
        e.accept_completion("b1/");
        assert_eq!((e.text(), e.cursor()), ("cd sub1/", 8));
    }

    #[test]
    fn take_empties() {
        let mut e = editor("ls", 2);
        assert_eq!(e.take(), "ls");
        assert!(e.is_empty());
        assert_eq!(e.cursor(), 0);
    }
}
