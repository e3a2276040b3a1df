use cowrite_ot::{Operation, Record, Text, VectorTime};
use cowrite_types::UserId;
use pretty_assertions::assert_eq;

const U1: Option<UserId> = Some(UserId::new(1));
const U2: Option<UserId> = Some(UserId::new(2));

fn apply(op: &Operation, base: &str) -> String {
    let mut doc = Text::authored(base, None);
    op.apply(&mut doc, U1).unwrap();
    doc.to_string()
}

/// Applies `a` then `b` transformed against `a`, and `b` then `a`
/// transformed against `b`; both orders must yield the same content.
fn converge(base: &str, a: &Operation, b: &Operation) -> String {
    let mut left = Text::authored(base, None);
    a.apply(&mut left, U1).unwrap();
    a.transform(b).apply(&mut left, U2).unwrap();

    let mut right = Text::authored(base, None);
    b.apply(&mut right, U2).unwrap();
    b.transform(a).apply(&mut right, U1).unwrap();

    assert_eq!(left.to_string(), right.to_string(), "TP1 violated");
    left.to_string()
}

// ── Apply ────────────────────────────────────────────────────────

#[test]
fn insert_applies_with_author_hint() {
    let mut doc = Text::authored("ab", U2);
    Operation::insert(1, "X").apply(&mut doc, U1).unwrap();
    assert_eq!(doc.to_string(), "aXb");
    let authors: Vec<_> = doc.chunks().map(|c| c.author()).collect();
    assert_eq!(authors, vec![U2, U1, U2]);
}

#[test]
fn delete_ignores_author_hint() {
    let mut doc = Text::authored("abcd", U2);
    Operation::delete(1, 2).apply(&mut doc, U1).unwrap();
    assert_eq!(doc.to_string(), "ad");
    assert!(doc.chunks().all(|c| c.author() == U2));
}

#[test]
fn noop_applies_without_effect() {
    let mut doc = Text::authored("ab", U1);
    Operation::Noop.apply(&mut doc, U2).unwrap();
    assert_eq!(doc.to_string(), "ab");
}

#[test]
fn split_apply_retargets_second_half() {
    // Deleting [1,3) and [5,7) of "abcdefg", both expressed against the
    // original document.
    let op = Operation::split(Operation::delete(1, 2), Operation::delete(5, 2));
    assert_eq!(apply(&op, "abcdefg"), "ade".to_string());
}

#[test]
fn reversible_insert_keeps_embedded_authorship() {
    let mut snippet = Text::new();
    snippet.append_str("x", U1);
    snippet.append_str("y", U2);
    let op = Operation::ReversibleInsert {
        pos: 1,
        text: snippet,
    };

    let mut doc = Text::authored("ab", None);
    // The hint names a different user; the embedded authors win.
    op.apply(&mut doc, None).unwrap();
    assert_eq!(doc.to_string(), "axyb");
    let authors: Vec<_> = doc.chunks().map(|c| c.author()).collect();
    assert_eq!(authors, vec![None, U1, U2, None]);
}

// ── Reverse ──────────────────────────────────────────────────────

#[test]
fn insert_reverse_is_delete() {
    let doc = Text::authored("ab", None);
    let rev = Operation::insert(1, "xyz").reverse(&doc).unwrap();
    assert_eq!(rev, Operation::delete(1, 3));
}

#[test]
fn delete_reverse_restores_text_and_authorship() {
    let mut doc = Text::new();
    doc.append_str("foo", U1);
    doc.append_str("bar", U2);
    let op = Operation::delete(1, 4);
    let rev = op.reverse(&doc).unwrap();

    let mut working = doc.clone();
    op.apply(&mut working, None).unwrap();
    assert_eq!(working.to_string(), "fr");
    rev.apply(&mut working, None).unwrap();

    assert_eq!(working.to_string(), "foobar");
    assert!(working.eq_with_authors(&doc));
}

#[test]
fn noop_reverse_is_noop() {
    let doc = Text::new();
    assert_eq!(Operation::Noop.reverse(&doc).unwrap(), Operation::Noop);
}

#[test]
fn split_reverse_reverses_both_halves() {
    let doc = Text::authored("abcdef", U1);
    let op = Operation::split(Operation::delete(0, 1), Operation::insert(3, "Z"));
    let rev = op.reverse(&doc).unwrap();
    match rev {
        Operation::Split { first, second } => {
            assert!(matches!(*first, Operation::ReversibleInsert { pos: 0, .. }));
            assert_eq!(*second, Operation::delete(3, 1));
        }
        other => panic!("expected split, got {other:?}"),
    }
}

// ── Transform: insert vs insert ──────────────────────────────────

#[test]
fn insert_before_insert_shifts_later_one() {
    let earlier = Operation::insert(1, "AA");
    let later = Operation::insert(4, "B");
    assert_eq!(earlier.transform(&later), Operation::insert(6, "B"));
    assert_eq!(later.transform(&earlier), Operation::insert(1, "AA"));
}

#[test]
fn equal_position_inserts_tiebreak_on_text() {
    let h = Operation::insert(0, "H");
    let l = Operation::insert(0, "L");
    // The lexicographically smaller text lands first: transforming the
    // larger leaves it in place, transforming the smaller shifts it.
    assert_eq!(h.transform(&l), Operation::insert(0, "L"));
    assert_eq!(l.transform(&h), Operation::insert(1, "H"));
    assert_eq!(converge("obby", &h, &l), "LHobby");
}

#[test]
fn equal_position_equal_text_converges() {
    let a = Operation::insert(2, "xx");
    let b = Operation::insert(2, "xx");
    assert_eq!(converge("abcd", &a, &b), "abxxxxcd");
}

// ── Transform: insert vs delete ──────────────────────────────────

#[test]
fn insert_before_delete_range_is_unchanged() {
    let ins = Operation::insert(1, "X");
    let del = Operation::delete(2, 3);
    assert_eq!(del.transform(&ins), Operation::insert(1, "X"));
}

#[test]
fn insert_after_delete_range_shifts_left() {
    let ins = Operation::insert(6, "X");
    let del = Operation::delete(1, 3);
    assert_eq!(del.transform(&ins), Operation::insert(3, "X"));
}

#[test]
fn insert_inside_delete_range_collapses() {
    let ins = Operation::insert(3, "X");
    let del = Operation::delete(1, 4);
    assert_eq!(del.transform(&ins), Operation::insert(1, "X"));
    assert_eq!(converge("abcdef", &del, &ins), "aXf");
}

// ── Transform: delete vs insert ──────────────────────────────────

#[test]
fn delete_after_insert_shifts_right() {
    let del = Operation::delete(2, 3);
    let ins = Operation::insert(1, "XY");
    assert_eq!(ins.transform(&del), Operation::delete(4, 3));
}

#[test]
fn delete_before_insert_is_unchanged() {
    let del = Operation::delete(0, 2);
    let ins = Operation::insert(4, "X");
    assert_eq!(ins.transform(&del), Operation::delete(0, 2));
}

#[test]
fn insert_inside_delete_splits_it() {
    let del = Operation::delete(1, 4);
    let ins = Operation::insert(3, "X");
    assert_eq!(
        ins.transform(&del),
        Operation::split(Operation::delete(1, 2), Operation::delete(4, 2))
    );
}

#[test]
fn insert_at_delete_end_leaves_it_unchanged() {
    let del = Operation::delete(1, 3);
    let ins = Operation::insert(4, "X");
    assert_eq!(ins.transform(&del), Operation::delete(1, 3));
    assert_eq!(converge("abcdef", &del, &ins), "aXef");
}

// ── Transform: delete vs delete ──────────────────────────────────

#[test]
fn disjoint_deletes() {
    let front = Operation::delete(0, 2);
    let back = Operation::delete(4, 2);
    assert_eq!(front.transform(&back), Operation::delete(2, 2));
    assert_eq!(back.transform(&front), Operation::delete(0, 2));
}

#[test]
fn covered_delete_becomes_noop() {
    let small = Operation::delete(2, 2);
    let big = Operation::delete(1, 4);
    assert_eq!(big.transform(&small), Operation::Noop);
}

#[test]
fn delete_tail_covered() {
    // Other deletion removes our tail: keep only the head.
    let ours = Operation::delete(2, 3);
    let other = Operation::delete(3, 3);
    assert_eq!(other.transform(&ours), Operation::delete(2, 1));
}

#[test]
fn delete_head_covered() {
    let ours = Operation::delete(3, 3);
    let other = Operation::delete(2, 3);
    assert_eq!(other.transform(&ours), Operation::delete(2, 1));
}

#[test]
fn delete_strictly_inside() {
    let ours = Operation::delete(1, 5);
    let other = Operation::delete(2, 2);
    assert_eq!(other.transform(&ours), Operation::delete(1, 3));
}

#[test]
fn overlapping_deletes_converge() {
    // Union of the two ranges ("cde" and "def") is removed.
    let a = Operation::delete(2, 3);
    let b = Operation::delete(3, 3);
    assert_eq!(converge("abcdefgh", &a, &b), "abgh");
}

// ── Transform: split and noop ────────────────────────────────────

#[test]
fn noop_transform_leaves_base_unchanged() {
    let base = Operation::insert(3, "X");
    assert_eq!(Operation::Noop.transform(&base), base);
}

#[test]
fn split_produced_operations_still_converge() {
    // A deletion split by a concurrent insert, then raced against a
    // third-party edit expressed on the post-insert document.
    let del = Operation::delete(1, 4);
    let ins = Operation::insert(3, "X");
    let split = ins.transform(&del);
    assert!(matches!(split, Operation::Split { .. }));

    let mut base = Text::authored("abcdef", None);
    ins.apply(&mut base, U1).unwrap();
    let base = base.to_string();
    assert_eq!(base, "abcXdef");

    let other = Operation::insert(6, "Y");
    converge(&base, &split, &other);
}

// ── Wire round-trip ──────────────────────────────────────────────

fn round_trip(op: &Operation) -> Operation {
    let mut params = Vec::new();
    op.push_params(&mut params);
    let mut index = 0;
    let decoded = Operation::parse_params(&params, &mut index).unwrap();
    assert_eq!(index, params.len(), "trailing parameters");
    decoded
}

#[test]
fn insert_round_trip() {
    let op = Operation::insert(7, "hello world");
    assert_eq!(round_trip(&op), op);
}

#[test]
fn delete_round_trip() {
    let op = Operation::delete(3, 9);
    assert_eq!(round_trip(&op), op);
}

#[test]
fn noop_round_trip() {
    assert_eq!(round_trip(&Operation::Noop), Operation::Noop);
}

#[test]
fn split_round_trip() {
    let op = Operation::split(
        Operation::delete(1, 2),
        Operation::split(Operation::insert(4, "x"), Operation::Noop),
    );
    assert_eq!(round_trip(&op), op);
}

#[test]
fn reversible_insert_round_trip() {
    let mut text = Text::new();
    text.append_str("ab", U1);
    text.append_str("cd", U2);
    let op = Operation::ReversibleInsert { pos: 5, text };
    assert_eq!(round_trip(&op), op);
}

#[test]
fn unknown_tag_is_error() {
    let params = vec!["frobnicate".to_string()];
    let mut index = 0;
    assert!(Operation::parse_params(&params, &mut index).is_err());
}

#[test]
fn record_round_trip() {
    let rec = Record::new(VectorTime::new(4, 9), Operation::insert(2, "hi"));
    let mut params = Vec::new();
    rec.push_params(&mut params);
    let mut index = 0;
    let decoded = Record::parse_params(&params, &mut index).unwrap();
    assert_eq!(index, params.len());
    assert_eq!(decoded, rec);
}

#[test]
fn round_tripped_operation_applies_identically() {
    let op = Operation::insert(2, "XY");
    let decoded = round_trip(&op);
    assert_eq!(apply(&op, "abcd"), apply(&decoded, "abcd"));
}
