//! Shared helpers for controller tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use terminal_view::{
    HostServices, InputEvent, Key, Rgb, Rgba, RenderSink, SessionController, TextMeasure,
};

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// `/bin/sh` shell, no command log, no user config.
pub fn test_config() -> settings::Config {
    settings::Config {
        shell: Some("/bin/sh".to_string()),
        log_commands: false,
        ..settings::Config::default()
    }
}

#[derive(Clone, Default)]
pub struct RecordingHost {
    pub clipboard: Arc<Mutex<Vec<String>>>,
    pub opened: Arc<Mutex<Vec<String>>>,
}

impl HostServices for RecordingHost {
    fn set_clipboard(&self, text: &str) {
        self.clipboard.lock().push(text.to_string());
    }

    fn open_url(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

pub fn shell() -> (SessionController, RecordingHost) {
    let host = RecordingHost::default();
    let controller = SessionController::new_shell(test_config(), Box::new(host.clone()));
    (controller, host)
}

pub fn type_text(controller: &mut SessionController, text: &str) {
    for c in text.chars() {
        controller.handle_event(InputEvent::Char(c));
    }
}

pub fn submit(controller: &mut SessionController, text: &str) {
    type_text(controller, text);
    controller.handle_event(InputEvent::key(Key::Enter));
}

pub fn output_contains(controller: &SessionController, needle: &str) -> bool {
    wait_until(TIMEOUT, || controller.scrollback().snapshot().contains(needle))
}

/// 10x10 pixel cells; drawing is discarded.
pub struct NullSink;

impl TextMeasure for NullSink {
    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * 10.0
    }

    fn line_height(&self) -> f32 {
        10.0
    }
}

impl RenderSink for NullSink {
    fn draw_text(&mut self, _x: f32, _y: f32, _text: &str, _color: Rgb) {}

    fn fill_rect(&mut self, _x: f32, _y: f32, _width: f32, _height: f32, _color: Rgba) {}
}
