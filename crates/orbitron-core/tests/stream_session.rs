//! End-to-end tests: raw response bytes through the decoder into a session.
//!
//! Run with:
//!   cargo test -p orbitron-core --test stream_session

use futures::stream::{self, StreamExt};
use orbitron_core::{
    decode_stream, DecodedLine, DesktopMode, ImageView, LineDecoder, MalformedLine, Payload,
    Record, Session, Speaker, StreamError,
};

// =============================================================================
// Helpers
// =============================================================================

/// Feed chunks through a decoder and a fresh session, returning the session
/// plus every malformed line seen.
fn run(chunks: &[&[u8]]) -> (Session, Vec<MalformedLine>) {
    let mut decoder = LineDecoder::new();
    let mut session = Session::new();
    let mut malformed = Vec::new();

    let mut apply = |line: DecodedLine| match line {
        Ok(value) => {
            session.apply(&Record::from_value(&value));
        }
        Err(err) => malformed.push(err),
    };

    for chunk in chunks {
        for line in decoder.push(chunk) {
            apply(line);
        }
    }
    if let Some(line) = decoder.finish() {
        apply(line);
    }

    (session, malformed)
}

/// Decode a whole body, returning parsed values and malformed lines.
fn decode_all(body: &str) -> (Vec<serde_json::Value>, Vec<MalformedLine>) {
    let mut decoder = LineDecoder::new();
    let mut values = Vec::new();
    let mut malformed = Vec::new();

    let lines = decoder.push(body.as_bytes()).into_iter().chain(decoder.finish());
    for line in lines {
        match line {
            Ok(value) => values.push(value),
            Err(err) => malformed.push(err),
        }
    }
    (values, malformed)
}

/// Transcript as `(speaker, text)` pairs, timestamps dropped.
fn said(session: &Session) -> Vec<(Speaker, String)> {
    session
        .transcript()
        .entries()
        .iter()
        .map(|e| (e.speaker, e.text.clone()))
        .collect()
}

/// A body touching every record kind.
const MIXED_BODY: &str = concat!(
    "{\"type\":\"message\",\"content\":\"Running ls\"}\n",
    "{\"type\":\"desktop_mode_switch\",\"mode\":\"terminal\"}\n",
    "{\"type\":\"desktop_content_stream_start\"}\n",
    "{\"type\":\"desktop_content_stream\",\"stream_type\":\"stdout\",\"content\":\"caf\u{e9}.txt\"}\n",
    "\n",
    "{\"type\":\"desktop_content_stream\",\"stream_type\":\"exit_code\",\"content\":\"Command finished\",\"exit_code\":0}\n",
    "{\"type\":\"desktop_content_stream_end\"}\n",
    "{\"type\":\"desktop_mode_switch\",\"mode\":\"file_editor\"}\n",
    "{\"type\":\"desktop_content_set\",\"filename\":\"a.py\",\"content\":\"x = 1\",\"language\":\"py\"}\n",
    "{\"type\":\"desktop_content_stream\",\"stream_type\":\"stderr\",\"content\":\"E501 line too long\"}\n",
    "{\"type\":\"error\",\"content\":\"lint failed\"}\n",
    "{\"type\":\"desktop_mode_switch\",\"mode\":\"browser\"}\n",
    "{\"type\":\"desktop_content_set\",\"content_type\":\"image_base64\",\"data\":\"AAA\",\"filename\":\"x.png\"}\n",
    "{\"type\":\"clear_desktop\"}\n",
    "{\"type\":\"message\",\"content\":\"done \u{1f680}\"}",
);

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn single_message() {
    let (session, malformed) = run(&[b"{\"type\":\"message\",\"content\":\"hi\"}\n"]);

    assert!(malformed.is_empty());
    assert_eq!(said(&session), vec![(Speaker::Agent, "hi".to_string())]);
}

#[test]
fn message_split_across_chunks() {
    let (whole, _) = run(&[b"{\"type\":\"message\",\"content\":\"hi\"}\n"]);
    let (split, _) = run(&[b"{\"type\":\"mess", b"age\",\"content\":\"hi\"}\n"]);

    assert_eq!(said(&split), said(&whole));
    assert_eq!(split.desktop(), whole.desktop());
}

#[test]
fn terminal_stream() {
    let (session, _) = run(&[
        b"{\"type\":\"desktop_content_stream_start\"}\n{\"type\":\"desktop_content_stream\",\"stream_type\":\"stdout\",\"content\":\"ok\"}\n",
    ]);

    let desktop = session.desktop();
    assert_eq!(desktop.terminal(), "ok\n");
    assert!(desktop.file().is_none());
    assert!(desktop.image().is_none());
}

#[test]
fn screenshot_defaults_content_type() {
    let (session, _) = run(&[
        b"{\"type\":\"desktop_content_set\",\"content_type\":\"image_base64\",\"data\":\"AAA\",\"filename\":\"x.png\"}\n",
    ]);

    let desktop = session.desktop();
    assert_eq!(
        desktop.image(),
        Some(&ImageView {
            data: "AAA".to_string(),
            content_type: "image/png".to_string(),
            filename: "x.png".to_string(),
        })
    );
    assert!(desktop.file().is_none());
    assert_eq!(desktop.terminal(), "");
}

#[test]
fn malformed_line_is_isolated() {
    let (session, malformed) = run(&[b"not json\n{\"type\":\"message\",\"content\":\"hi\"}\n"]);

    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].line, "not json");
    assert_eq!(said(&session), vec![(Speaker::Agent, "hi".to_string())]);
}

#[test]
fn terminal_output_keeps_open_file() {
    let (session, malformed) = run(&[concat!(
        "{\"type\":\"desktop_mode_switch\",\"mode\":\"file_editor\"}\n",
        "{\"type\":\"desktop_content_set\",\"filename\":\"a.py\",\"content\":\"x = 1\",\"language\":\"py\"}\n",
        "{\"type\":\"desktop_content_stream\",\"stream_type\":\"stdout\",\"content\":\"log\"}\n",
    )
    .as_bytes()]);

    assert!(malformed.is_empty());
    let desktop = session.desktop();
    assert_eq!(desktop.file().map(|f| f.filename.as_str()), Some("a.py"));
    assert_eq!(desktop.terminal(), "log\n");
    assert!(matches!(session.active_payload(), Payload::File(f) if f.filename == "a.py"));
}

#[test]
fn terminal_output_keeps_open_screenshot() {
    let (session, _) = run(&[concat!(
        "{\"type\":\"desktop_mode_switch\",\"mode\":\"browser\"}\n",
        "{\"type\":\"desktop_content_set\",\"content_type\":\"image_base64\",\"data\":\"AAA\",\"filename\":\"x.png\"}\n",
        "{\"type\":\"desktop_content_stream\",\"stream_type\":\"stdout\",\"content\":\"log\"}\n",
    )
    .as_bytes()]);

    assert!(matches!(session.active_payload(), Payload::Image(i) if i.filename == "x.png"));
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn result_is_independent_of_chunk_boundaries() {
    let body = MIXED_BODY.as_bytes();
    let (expected, malformed) = run(&[body]);
    assert!(malformed.is_empty());

    for split in 0..=body.len() {
        let (session, malformed) = run(&[&body[..split], &body[split..]]);
        assert!(malformed.is_empty(), "split at {split} produced malformed lines");
        assert_eq!(said(&session), said(&expected), "split at {split}");
        assert_eq!(session.desktop(), expected.desktop(), "split at {split}");
    }
}

#[test]
fn byte_at_a_time_matches_single_chunk() {
    let body = MIXED_BODY.as_bytes();
    let (expected, _) = run(&[body]);

    let chunks: Vec<&[u8]> = body.chunks(1).collect();
    let (session, malformed) = run(&chunks);

    assert!(malformed.is_empty());
    assert_eq!(said(&session), said(&expected));
    assert_eq!(session.desktop(), expected.desktop());
}

#[test]
fn mixed_body_final_state() {
    let (session, _) = run(&[MIXED_BODY.as_bytes()]);

    assert_eq!(
        said(&session),
        vec![
            (Speaker::Agent, "Running ls".to_string()),
            (Speaker::Agent, "Error: lint failed".to_string()),
            (Speaker::Agent, "done \u{1f680}".to_string()),
        ]
    );
    assert_eq!(session.desktop().mode(), DesktopMode::Browser);
    assert_eq!(session.active_payload(), Payload::Empty);
}

#[test]
fn blank_lines_change_nothing() {
    let plain = b"{\"type\":\"message\",\"content\":\"a\"}\n{\"type\":\"message\",\"content\":\"b\"}\n";
    let padded = b"\n\n{\"type\":\"message\",\"content\":\"a\"}\n  \n\r\n{\"type\":\"message\",\"content\":\"b\"}\n\n";

    let (a, _) = run(&[plain]);
    let (b, malformed) = run(&[padded]);

    assert!(malformed.is_empty());
    assert_eq!(said(&a), said(&b));
}

#[test]
fn any_single_malformed_line_is_isolated() {
    let lines: Vec<&str> = MIXED_BODY.split('\n').collect();

    for i in 0..lines.len() {
        let mut broken = lines.clone();
        broken[i] = "not json";
        let mut rest = lines.clone();
        rest.remove(i);

        let (values, malformed) = decode_all(&broken.join("\n"));
        let (expected, _) = decode_all(&rest.join("\n"));

        assert_eq!(malformed.len(), 1, "line {i}");
        assert_eq!(malformed[0].line, "not json", "line {i}");
        assert_eq!(values, expected, "line {i}");
    }
}

#[test]
fn active_payload_matches_mode_after_every_record() {
    let mut decoder = LineDecoder::new();
    let mut session = Session::new();

    for line in decoder.push(MIXED_BODY.as_bytes()) {
        let Ok(value) = line else { continue };
        session.apply(&Record::from_value(&value));

        let desktop = session.desktop();
        let consistent = match session.active_payload() {
            Payload::Terminal(_) => desktop.mode() == DesktopMode::Terminal,
            Payload::File(_) => desktop.mode() == DesktopMode::FileEditor,
            Payload::Image(_) => desktop.mode() == DesktopMode::Browser,
            Payload::Empty => true,
        };
        assert!(consistent, "payload does not match mode {:?}", desktop.mode());
        assert!(desktop.file().is_none() || desktop.image().is_none());
    }
}

#[test]
fn transcript_only_grows() {
    let mut decoder = LineDecoder::new();
    let mut session = Session::new();
    let mut previous: Vec<(Speaker, String)> = Vec::new();

    for line in decoder.push(MIXED_BODY.as_bytes()) {
        let Ok(value) = line else { continue };
        session.apply(&Record::from_value(&value));

        let now = said(&session);
        assert!(now.len() >= previous.len());
        assert_eq!(&now[..previous.len()], &previous[..]);
        previous = now;
    }
}

// =============================================================================
// Async stream adapter
// =============================================================================

#[tokio::test]
async fn decode_stream_drives_a_session() {
    let body = MIXED_BODY.as_bytes();
    let chunks = stream::iter(
        body.chunks(7)
            .map(|c| Ok::<_, std::io::Error>(c.to_vec()))
            .collect::<Vec<_>>(),
    );

    let mut session = Session::new();
    let mut records = Box::pin(decode_stream(chunks));
    while let Some(item) = records.next().await {
        match item {
            Ok(value) => {
                session.apply(&Record::from_value(&value));
            }
            Err(StreamError::Malformed(err)) => panic!("Unexpected malformed line: {err}"),
            Err(StreamError::Transport(err)) => panic!("Unexpected transport error: {err}"),
        }
    }

    let (expected, _) = run(&[body]);
    assert_eq!(said(&session), said(&expected));
    assert_eq!(session.desktop(), expected.desktop());
}

#[tokio::test]
async fn records_before_a_transport_error_are_kept() {
    let chunks = stream::iter(vec![
        Ok(b"{\"type\":\"message\",\"content\":\"first\"}\n{\"type\":\"mess".to_vec()),
        Err(std::io::Error::other("reset")),
    ]);

    let mut session = Session::new();
    let mut failures = 0;
    let mut records = Box::pin(decode_stream(chunks));
    while let Some(item) = records.next().await {
        match item {
            Ok(value) => {
                session.apply(&Record::from_value(&value));
            }
            Err(err) => {
                assert!(err.is_fatal());
                failures += 1;
            }
        }
    }

    assert_eq!(failures, 1);
    assert_eq!(said(&session), vec![(Speaker::Agent, "first".to_string())]);
}
