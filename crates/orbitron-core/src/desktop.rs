//! The desktop panel: one display area, one active mode.
//!
//! Setting a file or a screenshot clears the other payloads, and a mode
//! switch drops payloads that do not belong to the new mode. Terminal output
//! only appends, so a stray output line never blanks an open file.

use serde::{Deserialize, Serialize};

/// Content type assumed for screenshots that do not declare one.
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/png";

/// Which view the desktop panel shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesktopMode {
    /// Nothing to show.
    #[default]
    Idle,
    /// Streaming command output.
    Terminal,
    /// A single file with syntax highlighting.
    FileEditor,
    /// A browser screenshot.
    Browser,
}

impl DesktopMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Terminal => "terminal",
            Self::FileEditor => "file_editor",
            Self::Browser => "browser",
        }
    }
}

/// A file shown in the file viewer. Replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileView {
    /// Display name of the file.
    pub filename: String,
    /// Full file contents.
    pub content: String,
    /// Highlighting hint, e.g. `py` or `plaintext`.
    pub language: String,
}

/// A screenshot shown in the browser view. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageView {
    /// Base64-encoded image bytes, kept opaque.
    pub data: String,
    /// MIME type of the decoded image.
    pub content_type: String,
    /// Name used as a caption.
    pub filename: String,
}

/// The payload the renderer should draw for the active mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Terminal mode; the text may be empty.
    Terminal(&'a str),
    /// File editor mode with a file loaded.
    File(&'a FileView),
    /// Browser mode with a screenshot loaded.
    Image(&'a ImageView),
    /// Idle, or the active mode has nothing loaded yet.
    Empty,
}

/// Desktop panel state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Desktop {
    mode: DesktopMode,
    terminal: String,
    file: Option<FileView>,
    image: Option<ImageView>,
    image_load_error: bool,
}

impl Desktop {
    /// An idle, empty panel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active mode.
    #[must_use]
    pub const fn mode(&self) -> DesktopMode {
        self.mode
    }

    /// Accumulated terminal output.
    #[must_use]
    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    /// Loaded file, if any.
    #[must_use]
    pub const fn file(&self) -> Option<&FileView> {
        self.file.as_ref()
    }

    /// Loaded screenshot, if any.
    #[must_use]
    pub const fn image(&self) -> Option<&ImageView> {
        self.image.as_ref()
    }

    /// Whether the renderer failed to display the current screenshot.
    #[must_use]
    pub const fn image_load_error(&self) -> bool {
        self.image_load_error
    }

    /// Record that the current screenshot could not be displayed.
    ///
    /// Owned by the rendering layer; the state machine only ever resets it.
    pub fn mark_image_load_failed(&mut self) {
        self.image_load_error = true;
    }

    /// What to draw for the active mode.
    #[must_use]
    pub fn active_payload(&self) -> Payload<'_> {
        match self.mode {
            DesktopMode::Idle => Payload::Empty,
            DesktopMode::Terminal => Payload::Terminal(&self.terminal),
            DesktopMode::FileEditor => self.file.as_ref().map_or(Payload::Empty, Payload::File),
            DesktopMode::Browser => self.image.as_ref().map_or(Payload::Empty, Payload::Image),
        }
    }

    /// Number of payloads currently held, active or not.
    #[must_use]
    pub fn payload_count(&self) -> usize {
        usize::from(!self.terminal.is_empty())
            + usize::from(self.file.is_some())
            + usize::from(self.image.is_some())
    }

    pub(crate) fn clear_payloads(&mut self) {
        self.terminal.clear();
        self.file = None;
        self.image = None;
    }

    pub(crate) fn switch_mode(&mut self, mode: DesktopMode) {
        self.mode = mode;
        if mode != DesktopMode::FileEditor {
            self.file = None;
        }
        if mode != DesktopMode::Terminal {
            self.terminal.clear();
        }
        if mode != DesktopMode::Browser {
            self.image = None;
        }
    }

    pub(crate) fn start_stream(&mut self) {
        self.clear_payloads();
        self.image_load_error = false;
    }

    pub(crate) fn append_terminal(&mut self, text: &str) {
        self.terminal.push_str(text);
    }

    pub(crate) fn set_image(&mut self, image: ImageView) {
        self.file = None;
        self.terminal.clear();
        self.image = Some(image);
        self.image_load_error = false;
    }

    pub(crate) fn set_file(&mut self, file: FileView) {
        self.image = None;
        self.terminal.clear();
        self.file = Some(file);
    }
}
