//! Append-only chat transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The person at the keyboard.
    User,
    /// The remote agent.
    Agent,
}

impl Speaker {
    /// Label used when rendering the entry.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Agent => "Orbitron",
        }
    }
}

/// Whether an entry is ordinary conversation or a reported failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A message from either side.
    #[default]
    Chat,
    /// An error surfaced by the agent or the transport.
    Error,
}

/// One line of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Author of the entry.
    pub speaker: Speaker,
    /// Entry text.
    pub text: String,
    /// Chat or error.
    #[serde(default)]
    pub kind: EntryKind,
    /// When the entry was appended.
    pub at: DateTime<Utc>,
}

impl TranscriptEntry {
    /// Whether the entry reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == EntryKind::Error
    }
}

/// Ordered chat log. Entries can only be appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// An empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub(crate) fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.push_entry(speaker, text.into(), EntryKind::Chat);
    }

    /// Append an agent-side error line.
    pub(crate) fn push_error(&mut self, text: impl Into<String>) {
        self.push_entry(Speaker::Agent, text.into(), EntryKind::Error);
    }

    fn push_entry(&mut self, speaker: Speaker, text: String, kind: EntryKind) {
        self.entries.push(TranscriptEntry {
            speaker,
            text,
            kind,
            at: Utc::now(),
        });
    }
}
