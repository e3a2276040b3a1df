use cowrite_session::{read_packet, write_packet, Packet, SessionError};
use cowrite_types::{Colour, DocRef, DocumentId, UserId};

// ── Encoding ─────────────────────────────────────────────────────

#[test]
fn encode_joins_with_colons() {
    let packet = Packet::new("login").arg("alice").arg("ff0000");
    assert_eq!(packet.encode(), "login:alice:ff0000");
}

#[test]
fn decode_round_trip() {
    let packet = Packet::new("document")
        .arg("1 2")
        .arg("record")
        .arg("plain text");
    let decoded = Packet::decode(&packet.encode()).unwrap();
    assert_eq!(decoded, packet);
}

#[test]
fn escapes_separator_backslash_and_newline() {
    let packet = Packet::new("message").arg("a:b\\c\nd");
    let payload = packet.encode();
    assert_eq!(payload, "message:a\\:b\\\\c\\nd");
    let decoded = Packet::decode(&payload).unwrap();
    assert_eq!(decoded.param(0).unwrap(), "a:b\\c\nd");
}

#[test]
fn empty_params_survive() {
    let packet = Packet::new("login").arg("bob").arg("00ff00").arg("").arg("");
    let decoded = Packet::decode(&packet.encode()).unwrap();
    assert_eq!(decoded.param_count(), 4);
    assert_eq!(decoded.param(2).unwrap(), "");
}

#[test]
fn bad_escape_is_error() {
    assert!(Packet::decode("msg:\\x").is_err());
    assert!(Packet::decode("msg:trailing\\").is_err());
}

// ── Typed parameters ─────────────────────────────────────────────

#[test]
fn typed_accessors() {
    let packet = Packet::new("test")
        .arg("42")
        .arg("-7")
        .arg("ff8800")
        .arg(UserId::new(16).to_hex())
        .arg(DocRef::new(UserId::new(3), DocumentId::new(255)).to_wire());
    assert_eq!(packet.param_u32(0).unwrap(), 42);
    assert_eq!(packet.param_i32(1).unwrap(), -7);
    assert_eq!(packet.param_colour(2).unwrap(), Colour::new(255, 136, 0));
    assert_eq!(packet.param_user_ref(3).unwrap(), UserId::new(16));
    assert_eq!(
        packet.param_doc_ref(4).unwrap(),
        DocRef::new(UserId::new(3), DocumentId::new(255))
    );
}

#[test]
fn missing_param_is_bad_value() {
    let packet = Packet::new("test");
    assert!(matches!(
        packet.param(0),
        Err(SessionError::BadValue(_))
    ));
}

#[test]
fn undecodable_param_is_bad_value() {
    let packet = Packet::new("test").arg("not a number");
    assert!(matches!(
        packet.param_u32(0),
        Err(SessionError::BadValue(_))
    ));
    assert!(matches!(
        packet.param_colour(0),
        Err(SessionError::BadValue(_))
    ));
}

// ── Framing ──────────────────────────────────────────────────────

#[tokio::test]
async fn frame_round_trip() {
    let (mut left, mut right) = tokio::io::duplex(4096);
    let packet = Packet::new("message").arg("hello:world");

    write_packet(&mut left, &packet).await.unwrap();
    let decoded = read_packet(&mut right).await.unwrap().unwrap();
    assert_eq!(decoded, packet);
}

#[tokio::test]
async fn frame_clean_eof_is_none() {
    let (left, mut right) = tokio::io::duplex(64);
    drop(left);
    assert!(read_packet(&mut right).await.unwrap().is_none());
}

#[tokio::test]
async fn frame_oversize_is_rejected() {
    let (mut left, mut right) = tokio::io::duplex(64);
    // A fabricated header claiming a 1 GB frame.
    use tokio::io::AsyncWriteExt;
    left.write_all(&(1u32 << 30).to_be_bytes()).await.unwrap();
    let err = read_packet(&mut right).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[tokio::test]
async fn frames_preserve_order() {
    let (mut left, mut right) = tokio::io::duplex(4096);
    for i in 0..10 {
        write_packet(&mut left, &Packet::new("seq").arg(i.to_string()))
            .await
            .unwrap();
    }
    for i in 0..10 {
        let packet = read_packet(&mut right).await.unwrap().unwrap();
        assert_eq!(packet.param_u32(0).unwrap(), i);
    }
}
