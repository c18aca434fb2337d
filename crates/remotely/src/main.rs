//! Remotely - headless console host for a terminal session.
//!
//! Lines typed on stdin are submitted to a local shell (or a server, or a
//! remote shell after `ssh user@host`). Output is streamed to stdout with
//! colors. `:tab [text]` accepts the completion for the pending input and
//! `:quit` exits.

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use console::{AnsiSink, OutputCursor};
use once_cell::sync::Lazy;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use terminal_view::{InputEvent, Key, SessionController, SessionMode, SystemHost};
use tracing::{debug, error, info};
use uuid::Uuid;

static STARTUP_TIME: Lazy<Instant> = Lazy::new(Instant::now);

const TICK: Duration = Duration::from_millis(50);

/// Check if debug mode is enabled via environment variable.
fn is_debug_mode() -> bool {
    std::env::var("REMOTELY_DEBUG").is_ok()
}

/// Initialize the logging system. Logs go to stderr so stdout stays the console.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if is_debug_mode() {
        "remotely=trace,terminal=trace,terminal_view=debug,info"
    } else {
        "remotely=info,warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    if is_debug_mode() {
        info!(
            "Remotely v{} starting up (DEBUG MODE ENABLED)",
            env!("CARGO_PKG_VERSION")
        );
    } else {
        info!("Remotely v{} starting up", env!("CARGO_PKG_VERSION"));
    }
}

/// Headless console host for a Remotely terminal session.
#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "remotely")]
#[command(version)]
struct Args {
    /// Run a server instead of a shell, from JAR or the configured `jar-path`
    #[arg(long, value_name = "JAR", num_args = 0..=1)]
    server: Option<Option<PathBuf>>,

    /// Resume the command history of an earlier tab
    #[arg(long, value_name = "UUID")]
    tab: Option<Uuid>,
}

/// The session plus the view settings used to render it.
fn build_session(args: Args) -> (SessionController, settings::ViewConfig) {
    let config_path = match settings::ensure_config_file() {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to create config file: {:#}", e);
            settings::config_path()
        }
    };
    let config = settings::load_config_from(&config_path);
    debug!("Loaded config from {:?}", config_path);
    let view = config.view.clone();

    let host = Box::new(SystemHost::new());
    let session = match args.server {
        Some(jar) => {
            let jar = jar.or_else(|| config.server.jar_path.clone());
            SessionController::new_server(config, jar, host)
        }
        None => SessionController::new_shell(config, host),
    };
    let session = session.with_config_path(config_path);
    let session = match args.tab {
        Some(id) => session.with_id(id),
        None => session,
    };
    (session, view)
}

/// Forward stdin lines over a channel so the main loop can keep draining output.
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
            debug!("stdin closed");
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

fn type_text(session: &mut SessionController, text: &str) {
    for c in text.chars() {
        session.handle_event(InputEvent::Char(c));
    }
}

/// `:tab [text]` types `text` and accepts the completion without submitting;
/// the next line continues the same input. Returns false on `:quit`.
fn handle_line(session: &mut SessionController, line: &str) -> bool {
    if line.trim() == ":quit" {
        return false;
    }
    if let Some(rest) = line.strip_prefix(":tab") {
        type_text(session, rest.strip_prefix(' ').unwrap_or(rest));
        session.handle_event(InputEvent::key(Key::Tab));
        return true;
    }
    type_text(session, line);
    session.handle_event(InputEvent::key(Key::Enter));
    true
}

fn flush(
    session: &mut SessionController,
    sink: &mut AnsiSink,
    cursor: &mut OutputCursor,
    width: f32,
) -> Result<()> {
    let complete = console::complete_lines(&session.scrollback().snapshot());
    let output = session.render(width, &*sink);
    cursor.write_new(sink, output, complete);
    write_stdout(&sink.take())
}

fn write_stdout(text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .context("Failed to write to stdout")
}

fn run(args: Args) -> Result<()> {
    let (mut session, view) = build_session(args);
    let width = view.columns as f32 * view.cell_width;
    let mut sink = AnsiSink::new(&view);
    let mut cursor = OutputCursor::new();
    let input = spawn_stdin_reader()?;

    info!(
        "Session {} ready in {:?}",
        session.id(),
        STARTUP_TIME.elapsed()
    );

    let mut mode = session.mode();
    loop {
        match input.recv_timeout(TICK) {
            Ok(line) => {
                if !handle_line(&mut session, &line) {
                    break;
                }
                if line.starts_with(":tab") {
                    console::write_prompt(&mut sink, &session.input_line());
                    sink.newline();
                    write_stdout(&sink.take())?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if session.scrollback().take_dirty() {
            flush(&mut session, &mut sink, &mut cursor, width)?;
        }
        let next = session.mode();
        if next != mode {
            debug!("Mode {:?} -> {:?}", mode, next);
            if next == SessionMode::RemoteAwaitingPassword {
                console::write_prompt(&mut sink, &session.input_line());
                sink.newline();
                write_stdout(&sink.take())?;
            }
            mode = next;
        }
    }

    flush(&mut session, &mut sink, &mut cursor, width)?;
    session.close();
    info!("Session {} closed", session.id());
    Ok(())
}

fn main() {
    let _ = *STARTUP_TIME;

    let args = Args::parse();

    init_logging();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("remotely").chain(list.iter().copied()))
    }

    #[test]
    fn no_arguments_means_a_shell() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test_case(&["--server"], None ; "jar from config")]
    #[test_case(&["--server", "/srv/server.jar"], Some("/srv/server.jar") ; "explicit jar")]
    fn server_arguments(list: &[&str], jar: Option<&str>) {
        assert_eq!(args(list).unwrap().server, Some(jar.map(PathBuf::from)));
    }

    #[test]
    fn server_flag_does_not_swallow_the_next_flag() {
        let id = Uuid::new_v4();
        let parsed = args(&["--server", "--tab", &id.to_string()]).unwrap();
        assert_eq!(parsed.server, Some(None));
        assert_eq!(parsed.tab, Some(id));
    }

    #[test_case(&["--tab"] ; "missing id")]
    #[test_case(&["--tab", "nope"] ; "bad id")]
    #[test_case(&["--verbose"] ; "unknown")]
    fn rejects_bad_arguments(list: &[&str]) {
        assert!(args(list).is_err());
    }
}
