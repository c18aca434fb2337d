//! Shared, append-only terminal output.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    text: String,
    dirty: bool,
}

/// Raw output text shared between background readers and the render pass.
///
/// Cloning is cheap and every clone refers to the same buffer. Mutation is
/// limited to appends and an explicit [`clear`](Self::clear).
#[derive(Clone, Default)]
pub struct ScrollbackBuffer {
    inner: Arc<Mutex<Inner>>,
}

impl ScrollbackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.text.push_str(text);
        inner.dirty = true;
    }

    pub fn append_line(&self, line: &str) {
        let mut inner = self.inner.lock();
        inner.text.push_str(line);
        inner.text.push('\n');
        inner.dirty = true;
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.text.clear();
        inner.dirty = true;
    }

    /// Copy of the whole buffer. The lock is released before returning.
    pub fn snapshot(&self) -> String {
        self.inner.lock().text.clone()
    }

    /// Logical lines of the current snapshot.
    ///
    /// The empty segment after a trailing newline is not a line; a prompt
    /// without a newline (e.g. `Password: `) is.
    pub fn lines(&self) -> Vec<String> {
        let text = self.snapshot();
        let body = text.strip_suffix('\n').unwrap_or(&text);
        if text.is_empty() {
            return Vec::new();
        }
        body.split('\n').map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().text.is_empty()
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn take_dirty(&self) -> bool {
        std::mem::take(&mut self.inner.lock().dirty)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let text = self.snapshot();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, text)
            .with_context(|| format!("Failed to save transcript to {}", path.display()))
    }

    /// Append a saved transcript to the buffer.
    pub fn load_from(&self, path: &Path) -> Result<()> {
        let size = std::fs::metadata(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .len();
        let limit = settings::constants::scrollback::MAX_TRANSCRIPT_BYTES;
        if size > limit {
            anyhow::bail!("Transcript too large ({} bytes, limit {})", size, limit);
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        self.append(&String::from_utf8_lossy(&bytes));
        Ok(())
    }
}

impl std::fmt::Debug for ScrollbackBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollbackBuffer")
            .field("len", &self.inner.lock().text.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lines_drop_trailing_empty_segment() {
        let buffer = ScrollbackBuffer::new();
        buffer.append("one\ntwo\n");
        assert_eq!(buffer.lines(), vec!["one", "two"]);
    }

    #[test]
    fn partial_line_is_a_line() {
        let buffer = ScrollbackBuffer::new();
        buffer.append("Connecting...\nPassword: ");
        assert_eq!(buffer.lines(), vec!["Connecting...", "Password: "]);
    }

    #[test]
    fn blank_lines_are_kept() {
        let buffer = ScrollbackBuffer::new();
        buffer.append("a\n\nb\n");
        assert_eq!(buffer.lines(), vec!["a", "", "b"]);
    }

    #[test]
    fn empty_buffer_has_no_lines() {
        assert!(ScrollbackBuffer::new().lines().is_empty());
    }

    #[test]
    fn clones_share_state() {
        let buffer = ScrollbackBuffer::new();
        let writer = buffer.clone();
        writer.append_line("hello");
        assert_eq!(buffer.snapshot(), "hello\n");
    }

    #[test]
    fn dirty_flag_tracks_mutations() {
        let buffer = ScrollbackBuffer::new();
        assert!(!buffer.take_dirty());
        buffer.append("x");
        assert!(buffer.take_dirty());
        assert!(!buffer.take_dirty());
        buffer.clear();
        assert!(buffer.take_dirty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn transcript_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("session.txt");

        let buffer = ScrollbackBuffer::new();
        buffer.append("first\nsecond\n");
        buffer.save_to(&path).expect("save");

        let restored = ScrollbackBuffer::new();
        restored.append_line("existing");
        restored.load_from(&path).expect("load");
        assert_eq!(restored.lines(), vec!["existing", "first", "second"]);
    }

    #[test]
    fn loading_missing_transcript_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(ScrollbackBuffer::new()
            .load_from(&dir.path().join("missing.txt"))
            .is_err());
    }
}
