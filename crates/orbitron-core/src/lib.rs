//! Core protocol handling for the Orbitron client.
//!
//! The agent backend answers every chat message with a response body made of
//! newline-delimited JSON records. This crate turns that byte stream into
//! records and applies them to the client-side state:
//!
//! - **Decoder**: buffers partial lines across chunk boundaries and yields one
//!   parsed JSON value per line ([`LineDecoder`], [`decode_stream`])
//! - **Records**: tolerant, tagged decoding of each line ([`Record`])
//! - **Session**: the chat transcript plus the single desktop panel, mutated
//!   only through [`Session::apply`]
//!
//! # Example
//!
//! ```
//! use orbitron_core::{LineDecoder, Record, Session};
//!
//! let mut decoder = LineDecoder::new();
//! let mut session = Session::new();
//!
//! for chunk in [&b"{\"type\":\"mess"[..], &b"age\",\"content\":\"hi\"}\n"[..]] {
//!     for line in decoder.push(chunk) {
//!         if let Ok(value) = line {
//!             session.apply(&Record::from_value(&value));
//!         }
//!     }
//! }
//!
//! assert_eq!(session.transcript().len(), 1);
//! assert_eq!(session.transcript().entries()[0].text, "hi");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod decoder;
pub mod desktop;
pub mod error;
pub mod record;
pub mod session;
pub mod transcript;

pub use decoder::{decode_stream, DecodedLine, LineDecoder, MalformedLine, StreamError};
pub use desktop::{Desktop, DesktopMode, FileView, ImageView, Payload, DEFAULT_IMAGE_CONTENT_TYPE};
pub use error::{CoreError, Result};
pub use record::{ContentSet, Record, StreamKind};
pub use session::{Effect, Session};
pub use transcript::{EntryKind, Speaker, Transcript, TranscriptEntry};
