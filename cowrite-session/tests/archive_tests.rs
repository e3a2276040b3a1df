use cowrite_ot::Text;
use cowrite_session::{
    ArchiveError, ArchivedDocument, ArchivedUser, ChatMessage, SessionArchive, ARCHIVE_HEADER,
};
use cowrite_types::{Colour, DocRef, DocumentId, UserId};
use pretty_assertions::assert_eq;

fn sample_archive() -> SessionArchive {
    let mut text = Text::new();
    text.append_str("hello ", Some(UserId::new(1)));
    text.append_str("world", Some(UserId::new(2)));

    SessionArchive {
        users: vec![
            ArchivedUser {
                id: UserId::new(1),
                name: "alice".to_string(),
                colour: Colour::new(255, 0, 0),
            },
            ArchivedUser {
                id: UserId::new(2),
                name: "bob".to_string(),
                colour: Colour::new(0, 0, 255),
            },
        ],
        chat: vec![
            ChatMessage::User {
                from: UserId::new(1),
                text: "hi there".to_string(),
            },
            ChatMessage::Server {
                text: "server restarted".to_string(),
            },
            ChatMessage::Emote {
                from: UserId::new(2),
                text: "waves".to_string(),
            },
        ],
        documents: vec![ArchivedDocument {
            doc_ref: DocRef::new(UserId::new(1), DocumentId::new(1)),
            title: "notes".to_string(),
            encoding: "UTF-8".to_string(),
            text,
        }],
    }
}

// ── Round trip ───────────────────────────────────────────────────

#[test]
fn round_trip_preserves_everything() {
    let archive = sample_archive();
    let rendered = archive.serialise();
    let parsed = SessionArchive::deserialise(&rendered).unwrap();
    assert_eq!(parsed, archive);
}

#[test]
fn rendered_form_starts_with_header() {
    let rendered = sample_archive().serialise();
    assert!(rendered.starts_with(ARCHIVE_HEADER));
    assert!(rendered.contains("session version=\"1\""));
}

#[test]
fn round_trip_escapes_awkward_strings() {
    let mut archive = sample_archive();
    archive.chat.push(ChatMessage::Server {
        text: "line one\nline\ttwo \"quoted\" \\slash".to_string(),
    });
    archive.documents[0].title = "a \"b\"\nc".to_string();
    let parsed = SessionArchive::deserialise(&archive.serialise()).unwrap();
    assert_eq!(parsed, archive);
}

#[test]
fn empty_archive_round_trips() {
    let archive = SessionArchive::default();
    let parsed = SessionArchive::deserialise(&archive.serialise()).unwrap();
    assert_eq!(parsed, archive);
}

#[test]
fn document_authorship_survives() {
    let parsed = SessionArchive::deserialise(&sample_archive().serialise()).unwrap();
    let authors: Vec<_> = parsed.documents[0]
        .text
        .chunks()
        .map(|c| c.author())
        .collect();
    assert_eq!(authors, vec![Some(UserId::new(1)), Some(UserId::new(2))]);
}

// ── Errors carry line numbers ────────────────────────────────────

fn parse_err(input: &str) -> (usize, String) {
    match SessionArchive::deserialise(input).unwrap_err() {
        ArchiveError::Parse { line, reason } => (line, reason),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn missing_header_is_line_one() {
    let (line, _) = parse_err("session version=\"1\"\n");
    assert_eq!(line, 1);
}

#[test]
fn unterminated_string_reports_its_line() {
    let input = "!cowrite\nsession version=\"1\"\n user_table\n  user id=\"1\" name=\"broken\n";
    let (line, reason) = parse_err(input);
    assert_eq!(line, 4);
    assert!(reason.contains("unterminated"));
}

#[test]
fn unexpected_object_reports_its_line() {
    let input = "!cowrite\nsession version=\"1\"\n mystery\n";
    let (line, reason) = parse_err(input);
    assert_eq!(line, 3);
    assert!(reason.contains("mystery"));
}

#[test]
fn indentation_jump_reports_its_line() {
    let input = "!cowrite\nsession version=\"1\"\n   user id=\"1\"\n";
    let (line, _) = parse_err(input);
    assert_eq!(line, 3);
}

#[test]
fn missing_attribute_reports_its_line() {
    let input = "!cowrite\nsession version=\"1\"\n user_table\n  user id=\"1\" colour=\"ff0000\"\n";
    let (line, reason) = parse_err(input);
    assert_eq!(line, 4);
    assert!(reason.contains("name"));
}

#[test]
fn bad_escape_reports_its_line() {
    let input = "!cowrite\nsession version=\"1\"\n chat\n  message kind=\"server\" text=\"bad\\q\"\n";
    let (line, _) = parse_err(input);
    assert_eq!(line, 4);
}
