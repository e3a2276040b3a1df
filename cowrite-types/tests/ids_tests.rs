use cowrite_types::{DocRef, DocumentId, UserId, SERVER_OWNER};

// ── UserId ───────────────────────────────────────────────────────

#[test]
fn user_id_display_and_parse() {
    let id = UserId::new(42);
    assert_eq!(id.to_string(), "42");
    assert_eq!("42".parse::<UserId>().unwrap(), id);
}

#[test]
fn user_id_hex_round_trip() {
    let id = UserId::new(0xdead);
    assert_eq!(id.to_hex(), "dead");
    assert_eq!(UserId::from_hex("dead").unwrap(), id);
}

#[test]
fn user_id_server_sentinel() {
    assert!(SERVER_OWNER.is_server());
    assert!(!UserId::new(1).is_server());
}

#[test]
fn user_id_parse_invalid() {
    assert!("".parse::<UserId>().is_err());
    assert!("abc".parse::<UserId>().is_err());
    assert!(UserId::from_hex("zz").is_err());
}

// ── DocumentId ───────────────────────────────────────────────────

#[test]
fn document_id_hex_round_trip() {
    let id = DocumentId::new(255);
    assert_eq!(id.to_hex(), "ff");
    assert_eq!(DocumentId::from_hex("ff").unwrap(), id);
}

// ── DocRef ───────────────────────────────────────────────────────

#[test]
fn doc_ref_wire_round_trip() {
    let r = DocRef::new(UserId::new(3), DocumentId::new(17));
    assert_eq!(r.to_wire(), "3 11");
    assert_eq!(DocRef::from_wire("3 11").unwrap(), r);
}

#[test]
fn doc_ref_server_owner() {
    let r = DocRef::server(DocumentId::new(1));
    assert!(r.owner.is_server());
    assert_eq!(r.to_wire(), "0 1");
}

#[test]
fn doc_ref_from_wire_rejects_malformed() {
    assert!(DocRef::from_wire("").is_err());
    assert!(DocRef::from_wire("1").is_err());
    assert!(DocRef::from_wire("1 2 3").is_err());
    assert!(DocRef::from_wire("x y").is_err());
}

#[test]
fn doc_ref_distinguishes_owners() {
    let a = DocRef::new(UserId::new(1), DocumentId::new(1));
    let b = DocRef::new(UserId::new(2), DocumentId::new(1));
    assert_ne!(a, b);
}
