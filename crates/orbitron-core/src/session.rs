//! The chat/desktop state machine.
//!
//! [`Session`] is the only writer of the transcript and the desktop panel.
//! Records are applied one at a time in arrival order; every record kind has
//! a defined transition, including unknown ones (a logged no-op).

use crate::desktop::{Desktop, Payload};
use crate::record::{ContentSet, Record, StreamKind};
use crate::transcript::{Speaker, Transcript};

/// Exit code text used when an `exit_code` record carries none.
const UNKNOWN_EXIT_CODE: &str = "unknown";

/// Which part of the state a record touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// An entry was appended to the transcript.
    Transcript,
    /// The desktop panel changed (or was reset).
    Desktop,
    /// Nothing changed.
    Ignored,
}

/// Client-side state for one UI session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    transcript: Transcript,
    desktop: Desktop,
}

impl Session {
    /// Empty transcript, idle desktop.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The chat log.
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The desktop panel.
    #[must_use]
    pub const fn desktop(&self) -> &Desktop {
        &self.desktop
    }

    /// Mutable desktop access for the renderer's image-load flag.
    pub fn desktop_mut(&mut self) -> &mut Desktop {
        &mut self.desktop
    }

    /// Append a message typed by the user.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.transcript.push(Speaker::User, text);
    }

    /// Apply a record and return the new state.
    #[must_use]
    pub fn step(mut self, record: &Record) -> Self {
        self.apply(record);
        self
    }

    /// Apply one record in place.
    pub fn apply(&mut self, record: &Record) -> Effect {
        tracing::debug!(kind = %record.kind(), "Applying record");

        match record {
            Record::Message { content } => {
                self.transcript.push(Speaker::Agent, content.as_str());
                Effect::Transcript
            }
            Record::Error { content } => {
                self.transcript.push_error(format!("Error: {content}"));
                Effect::Transcript
            }
            Record::ClearDesktop => {
                self.desktop.clear_payloads();
                Effect::Desktop
            }
            Record::DesktopModeSwitch { mode: Some(mode) } => {
                self.desktop.switch_mode(*mode);
                Effect::Desktop
            }
            Record::DesktopModeSwitch { mode: None } => {
                tracing::warn!("Mode switch without a usable mode, keeping current mode");
                Effect::Ignored
            }
            Record::DesktopContentStreamStart => {
                self.desktop.start_stream();
                Effect::Desktop
            }
            Record::DesktopContentStream {
                stream_kind,
                content,
                exit_code,
            } => {
                let text = terminal_text(stream_kind, content, exit_code.as_deref());
                self.desktop.append_terminal(&text);
                Effect::Desktop
            }
            Record::DesktopContentStreamEnd => {
                tracing::debug!(
                    bytes = self.desktop.terminal().len(),
                    "Terminal stream ended"
                );
                Effect::Ignored
            }
            Record::DesktopContentSet(ContentSet::Image(image)) => {
                self.desktop.set_image(image.clone());
                Effect::Desktop
            }
            Record::DesktopContentSet(ContentSet::File(file)) => {
                self.desktop.set_file(file.clone());
                Effect::Desktop
            }
            Record::Unknown { kind } => {
                tracing::warn!(kind = ?kind, "Received unknown record type");
                Effect::Ignored
            }
        }
    }

    /// What the desktop panel should currently draw.
    #[must_use]
    pub fn active_payload(&self) -> Payload<'_> {
        self.desktop.active_payload()
    }
}

/// Format one piece of terminal output for the terminal buffer.
fn terminal_text(kind: &StreamKind, content: &str, exit_code: Option<&str>) -> String {
    match kind {
        StreamKind::Stdout => format!("{content}\n"),
        StreamKind::Stderr => format!("STDERR: {content}\n"),
        StreamKind::ExitCode => {
            let code = exit_code.unwrap_or(UNKNOWN_EXIT_CODE);
            format!("\n--- {content} (Code: {code}) ---\n")
        }
        StreamKind::ExecutionError => format!("EXECUTION ERROR: {content}\n"),
        StreamKind::Other(other) => {
            tracing::debug!(stream_type = ?other, "Unrecognized stream type, appending as plain output");
            format!("{content}\n")
        }
    }
}
