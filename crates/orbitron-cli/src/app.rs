//! Application state.
//!
//! The `App` owns the single [`Session`] and everything the renderer needs
//! besides it: the input line, scroll offsets, the theme, the backend status
//! flag and the handle of the reply currently streaming in.

use std::sync::Arc;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use orbitron_core::{ContentSet, Effect, ImageView, Payload, Record, Session};
use ratatui::text::Line;
use tokio::sync::mpsc;

use crate::client::ChatTransport;
use crate::highlight::Highlighter;
use crate::stream::{self, StreamEvent, StreamHandle};
use crate::theme::Theme;

/// Screenshot decoder that accepts data with or without padding.
const SCREENSHOT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// =============================================================================
// Screenshot Inspection
// =============================================================================

/// What the renderer knows about a screenshot it can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotInfo {
    /// Image format detected from the decoded bytes.
    pub format: &'static str,
    /// Decoded size in bytes.
    pub bytes: usize,
}

/// Decode a screenshot far enough to know it is a real image.
///
/// Returns `None` when the declared type is not an image, the data is not
/// base64, or the bytes do not start with a known image signature.
fn inspect_screenshot(image: &ImageView) -> Option<ScreenshotInfo> {
    if !image.content_type.starts_with("image/") {
        return None;
    }

    let data: String = image
        .data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = SCREENSHOT_ENGINE.decode(data).ok()?;

    Some(ScreenshotInfo {
        format: image_format(&bytes)?,
        bytes: bytes.len(),
    })
}

fn image_format(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("PNG"),
        [0xFF, 0xD8, 0xFF, ..] => Some("JPEG"),
        [b'G', b'I', b'F', b'8', ..] => Some("GIF"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("WebP"),
        [b'B', b'M', ..] => Some("BMP"),
        _ => None,
    }
}

// =============================================================================
// App
// =============================================================================

/// Application state.
pub struct App {
    /// Backend transport shared with reply tasks.
    transport: Arc<dyn ChatTransport>,
    /// Backend URL for display.
    server_url: String,
    /// Transcript and desktop panel.
    pub session: Session,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in input, in characters.
    pub cursor_position: usize,
    /// Reply currently streaming in, if any.
    stream: Option<StreamHandle>,
    /// Chat scroll position, in lines up from the bottom.
    pub chat_scroll: usize,
    /// Desktop scroll position, in lines away from the view's anchor
    /// (the bottom for the terminal, the top for files).
    pub desktop_scroll: usize,
    /// Active color scheme.
    pub theme: Theme,
    /// Last observed backend status.
    pub connected: bool,
    /// Status message to display.
    pub status_message: Option<String>,
    /// Error message to display.
    pub error_message: Option<String>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for loading indicators.
    pub animation_frame: usize,
    /// Malformed lines skipped in the current reply.
    pub malformed_lines: usize,
    /// Highlighted lines of the loaded file.
    pub file_lines: Vec<Line<'static>>,
    /// Inspection result of the loaded screenshot.
    pub screenshot: Option<ScreenshotInfo>,
    highlighter: Highlighter,
}

impl App {
    /// Create a new application.
    pub fn new(transport: Arc<dyn ChatTransport>, server_url: impl Into<String>) -> Self {
        Self {
            transport,
            server_url: server_url.into(),
            session: Session::new(),
            input: String::new(),
            cursor_position: 0,
            stream: None,
            chat_scroll: 0,
            desktop_scroll: 0,
            theme: Theme::default(),
            connected: false,
            status_message: None,
            error_message: None,
            should_quit: false,
            animation_frame: 0,
            malformed_lines: 0,
            file_lines: Vec::new(),
            screenshot: None,
            highlighter: Highlighter::new(),
        }
    }

    /// Tick the animation frame (call on each render).
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Get current spinner character for loading animation.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Get the backend URL for display.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Set the status message (also clears any error).
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// Record the backend status. Returns `true` if it changed.
    pub fn set_connected(&mut self, connected: bool) -> bool {
        if self.connected == connected {
            return false;
        }
        self.connected = connected;
        if connected {
            self.set_status("Backend connected");
        }
        true
    }

    /// Switch between the dark and light scheme.
    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        self.highlight_file();
        self.set_status(format!("Theme: {}", self.theme.label()));
    }

    // =========================================================================
    // Scrolling
    // =========================================================================

    /// Scroll chat up (view older messages).
    pub fn scroll_chat_up(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_add(amount);
    }

    /// Scroll chat down (view newer messages).
    pub fn scroll_chat_down(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_sub(amount);
    }

    /// Whether the desktop view is anchored at its bottom.
    #[must_use]
    pub fn desktop_follows_tail(&self) -> bool {
        !matches!(self.session.active_payload(), Payload::File(_))
    }

    /// Scroll the desktop panel up.
    pub fn scroll_desktop_up(&mut self, amount: usize) {
        self.desktop_scroll = if self.desktop_follows_tail() {
            self.desktop_scroll.saturating_add(amount)
        } else {
            self.desktop_scroll.saturating_sub(amount)
        };
    }

    /// Scroll the desktop panel down.
    pub fn scroll_desktop_down(&mut self, amount: usize) {
        self.desktop_scroll = if self.desktop_follows_tail() {
            self.desktop_scroll.saturating_sub(amount)
        } else {
            self.desktop_scroll.saturating_add(amount)
        };
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    /// Byte offset of the cursor in `input`.
    fn cursor_byte(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    /// Input text left of the cursor.
    #[must_use]
    pub fn input_before_cursor(&self) -> &str {
        &self.input[..self.cursor_byte()]
    }

    fn input_chars(&self) -> usize {
        self.input.chars().count()
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        let at = self.cursor_byte();
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.cursor_byte();
            self.input.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.input_chars() {
            let at = self.cursor_byte();
            self.input.remove(at);
        }
    }

    /// Delete the word before the cursor, and the spaces after it.
    pub fn delete_word(&mut self) {
        let chars: Vec<char> = self.input.chars().collect();
        let end = self.cursor_position;
        let mut start = end;

        while start > 0 && chars[start - 1] == ' ' {
            start -= 1;
        }
        while start > 0 && chars[start - 1] != ' ' {
            start -= 1;
        }

        self.input = chars[..start].iter().chain(&chars[end..]).collect();
        self.cursor_position = start;
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input_chars() {
            self.cursor_position += 1;
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input_chars();
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Take the current input (clears it).
    pub fn take_input(&mut self) -> String {
        let input = std::mem::take(&mut self.input);
        self.cursor_position = 0;
        input
    }

    // =========================================================================
    // Replies
    // =========================================================================

    /// Whether a reply is streaming in.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Check if UI needs high-frequency redraws (during streaming).
    #[must_use]
    pub fn needs_immediate_redraw(&self) -> bool {
        self.is_streaming()
    }

    /// Send the input line as a chat message.
    ///
    /// Does nothing while a reply is streaming or when the input is blank.
    /// Returns `true` if a message was sent.
    pub fn submit(&mut self, events: &mpsc::Sender<StreamEvent>) -> bool {
        if self.is_streaming() || self.input.trim().is_empty() {
            return false;
        }

        let message = self.take_input();
        self.session.push_user(message.clone());
        self.malformed_lines = 0;
        self.chat_scroll = 0;
        self.clear_error();

        let handle = stream::spawn(Arc::clone(&self.transport), message, events.clone());
        tracing::debug!(request_id = %handle.request_id(), "Reply started");
        self.stream = Some(handle);
        self.set_status("Orbitron is working... (Esc to cancel)");
        true
    }

    /// Cancel the reply streaming in.
    ///
    /// Returns `true` if a cancel was requested, `false` if not streaming.
    pub fn cancel_streaming(&mut self) -> bool {
        let cancelled = self.stream.as_mut().is_some_and(StreamHandle::cancel);
        if cancelled {
            self.set_status("Cancelling...");
        }
        cancelled
    }

    /// Apply an event from the reply task.
    ///
    /// Returns `true` if the UI should be redrawn.
    pub fn handle_stream_event(&mut self, event: StreamEvent) -> bool {
        if event.is_terminal() {
            self.stream = None;
        }

        match event {
            StreamEvent::Record(record) => {
                self.apply_record(&record);
                true
            }
            StreamEvent::Malformed(line) => {
                tracing::debug!(line = %line.line, "Malformed line skipped");
                self.malformed_lines += 1;
                self.set_status(format!(
                    "Skipped {} malformed line(s)",
                    self.malformed_lines
                ));
                true
            }
            StreamEvent::Failed(message) => {
                self.apply_record(&Record::Error { content: message });
                self.set_status("Reply failed");
                true
            }
            StreamEvent::Cancelled => {
                self.set_status("Cancelled");
                true
            }
            StreamEvent::Finished => {
                if self.malformed_lines == 0 {
                    self.set_status("Reply complete");
                } else {
                    self.set_status(format!(
                        "Reply complete, {} malformed line(s) skipped",
                        self.malformed_lines
                    ));
                }
                true
            }
        }
    }

    fn apply_record(&mut self, record: &Record) {
        match self.session.apply(record) {
            Effect::Transcript => self.chat_scroll = 0,
            Effect::Desktop => self.refresh_desktop_view(record),
            Effect::Ignored => {}
        }
    }

    /// Rebuild derived desktop state after `record` changed the panel.
    ///
    /// Highlighting and screenshot decoding only rerun when their payload
    /// was replaced or dropped, not on every line of terminal output.
    fn refresh_desktop_view(&mut self, record: &Record) {
        let terminal_output = matches!(record, Record::DesktopContentStream { .. });
        if !terminal_output || matches!(self.session.active_payload(), Payload::Terminal(_)) {
            self.desktop_scroll = 0;
        }

        let desktop = self.session.desktop();
        let file_replaced = matches!(record, Record::DesktopContentSet(ContentSet::File(_)));
        if file_replaced || (desktop.file().is_none() && !self.file_lines.is_empty()) {
            self.highlight_file();
        }

        if matches!(record, Record::DesktopContentSet(ContentSet::Image(_))) {
            self.screenshot = self.session.desktop().image().and_then(inspect_screenshot);
            if self.screenshot.is_none() {
                tracing::warn!("Screenshot could not be decoded");
                self.session.desktop_mut().mark_image_load_failed();
            }
        } else if self.session.desktop().image().is_none() {
            self.screenshot = None;
        }
    }

    fn highlight_file(&mut self) {
        self.file_lines = match self.session.desktop().file() {
            Some(file) => {
                self.highlighter
                    .highlight(&file.content, &file.language, &file.filename, self.theme)
            }
            None => Vec::new(),
        };
    }

    /// Name of the syntax used for the loaded file.
    #[must_use]
    pub fn file_syntax(&self) -> Option<&str> {
        self.session
            .desktop()
            .file()
            .map(|file| self.highlighter.syntax_name(&file.language, &file.filename))
    }
}
