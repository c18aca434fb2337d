//! Byte stream to line conversion for process and channel readers.

use anyhow::{Context, Result};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Splits a byte stream into cleaned text lines.
///
/// Splitting happens on raw bytes, so a multi-byte character cut in half by
/// a read boundary is decoded only once the line is complete.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them (without `\n`).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(clean(&line[..line.len() - 1]));
        }
        lines
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = clean(&std::mem::take(&mut self.pending));
        (!tail.is_empty()).then_some(tail)
    }
}

fn clean(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != '\0' && c != '\r')
        .collect()
}

/// Read `reader` on a named thread, handing each line to `on_line`.
///
/// Stops at end of stream, on the first read error (reported once through
/// `on_line`), or when `alive` is cleared.
pub fn spawn_line_reader<R, F>(
    name: String,
    mut reader: R,
    alive: Arc<AtomicBool>,
    mut on_line: F,
) -> Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    let reader_name = name.clone();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let mut assembler = LineAssembler::new();
            let mut buf = [0u8; settings::constants::process::READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        for line in assembler.push(&buf[..n]) {
                            if !alive.load(Ordering::SeqCst) {
                                return;
                            }
                            on_line(line);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        if alive.load(Ordering::SeqCst) {
                            on_line(format!("Error reading output: {}", e));
                        }
                        break;
                    }
                }
            }
            if let Some(tail) = assembler.finish() {
                if alive.load(Ordering::SeqCst) {
                    on_line(tail);
                }
            }
            tracing::debug!("Reader {} finished", reader_name);
        })
        .with_context(|| format!("Failed to spawn reader thread {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(b"hello\n", &["hello"] ; "single line")]
    #[test_case(b"a\nb\n", &["a", "b"] ; "two lines")]
    #[test_case(b"win\r\n", &["win"] ; "carriage return stripped")]
    #[test_case(b"n\0u\0l\n", &["nul"] ; "nul stripped")]
    #[test_case(b"\n", &[""] ; "empty line")]
    #[test_case(b"partial", &[] ; "no newline yet")]
    fn push_splits_lines(input: &[u8], expected: &[&str]) {
        let mut assembler = LineAssembler::new();
        assert_eq!(assembler.push(input), expected);
    }

    #[test]
    fn utf8_split_across_reads() {
        let bytes = "héllo\n".as_bytes();
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(&bytes[..2]).is_empty());
        assert_eq!(assembler.push(&bytes[2..]), vec!["héllo"]);
    }

    #[test]
    fn finish_flushes_tail() {
        let mut assembler = LineAssembler::new();
        assert_eq!(assembler.push(b"line\nprompt> "), vec!["line"]);
        assert_eq!(assembler.finish(), Some("prompt> ".to_string()));
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn finish_skips_bare_carriage_return() {
        let mut assembler = LineAssembler::new();
        assembler.push(b"\r");
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn reader_thread_forwards_lines_and_tail() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let handle = spawn_line_reader(
            "test-reader".to_string(),
            std::io::Cursor::new(b"one\ntwo\nthree".to_vec()),
            Arc::new(AtomicBool::new(true)),
            move |line| sink.lock().push(line),
        )
        .expect("spawn");
        handle.join().expect("join");
        assert_eq!(*lines.lock(), vec!["one", "two", "three"]);
    }

    #[test]
    fn reader_thread_stops_when_not_alive() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let handle = spawn_line_reader(
            "test-reader".to_string(),
            std::io::Cursor::new(b"one\ntwo\n".to_vec()),
            Arc::new(AtomicBool::new(false)),
            move |line| sink.lock().push(line),
        )
        .expect("spawn");
        handle.join().expect("join");
        assert!(lines.lock().is_empty());
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_lines(text in "[a-zé\n]{0,64}", split in 0usize..64) {
            let bytes = text.as_bytes();
            let split = split.min(bytes.len());

            let mut whole = LineAssembler::new();
            let mut expected = whole.push(bytes);
            expected.extend(whole.finish());

            let mut chunked = LineAssembler::new();
            let mut actual = chunked.push(&bytes[..split]);
            actual.extend(chunked.push(&bytes[split..]));
            actual.extend(chunked.finish());

            prop_assert_eq!(actual, expected);
        }
    }
}
