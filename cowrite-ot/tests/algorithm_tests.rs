use cowrite_ot::{Jupiter, JupiterError, Operation, OtError, Record, VectorTime};

fn protocol_err(result: Result<Operation, JupiterError>) -> bool {
    matches!(result, Err(JupiterError::Protocol(_)))
}

// ── Local operations ─────────────────────────────────────────────

#[test]
fn local_op_stamps_current_time_then_advances() {
    let mut pair = Jupiter::new();
    let rec = pair.local_op(&Operation::insert(0, "a"));
    assert_eq!(rec.time, VectorTime::new(0, 0));
    assert_eq!(pair.time(), VectorTime::new(1, 0));

    let rec = pair.local_op(&Operation::insert(1, "b"));
    assert_eq!(rec.time, VectorTime::new(1, 0));
    assert_eq!(pair.time(), VectorTime::new(2, 0));
    assert_eq!(pair.pending(), 2);
}

// ── Remote operations ────────────────────────────────────────────

#[test]
fn remote_op_with_empty_ack_passes_through() {
    let mut pair = Jupiter::new();
    let rec = Record::new(VectorTime::new(0, 0), Operation::insert(0, "x"));
    let op = pair.remote_op(&rec).unwrap();
    assert_eq!(op, Operation::insert(0, "x"));
    assert_eq!(pair.time(), VectorTime::new(0, 1));
}

#[test]
fn remote_op_transforms_against_pending_local_ops() {
    let mut pair = Jupiter::new();
    pair.local_op(&Operation::insert(0, "AA"));

    // Peer inserted at 3 without having seen our insert at 0.
    let rec = Record::new(VectorTime::new(0, 0), Operation::insert(3, "x"));
    let op = pair.remote_op(&rec).unwrap();
    assert_eq!(op, Operation::insert(5, "x"));
}

#[test]
fn acknowledged_ops_are_discarded() {
    let mut pair = Jupiter::new();
    pair.local_op(&Operation::insert(0, "a"));
    pair.local_op(&Operation::insert(1, "b"));
    pair.local_op(&Operation::insert(2, "c"));
    assert_eq!(pair.pending(), 3);

    // The peer acknowledges our first two operations: only the third
    // (count 2) survives in the acknowledgement buffer.
    let rec = Record::new(VectorTime::new(0, 2), Operation::insert(0, "x"));
    pair.remote_op(&rec).unwrap();
    assert_eq!(pair.pending(), 1);
}

#[test]
fn fully_acknowledged_remote_op_is_untransformed() {
    let mut pair = Jupiter::new();
    pair.local_op(&Operation::insert(0, "abc"));

    // remote = 1: the peer saw our insert before producing its own.
    let rec = Record::new(VectorTime::new(0, 1), Operation::insert(0, "x"));
    let op = pair.remote_op(&rec).unwrap();
    assert_eq!(op, Operation::insert(0, "x"));
    assert_eq!(pair.pending(), 0);
}

// ── Preconditions ────────────────────────────────────────────────

#[test]
fn reordered_records_are_rejected() {
    let mut peer = Jupiter::new();
    let first = peer.local_op(&Operation::insert(0, "a"));
    let second = peer.local_op(&Operation::insert(1, "b"));

    let mut pair = Jupiter::new();
    // Delivering the second record before the first violates the
    // sequence precondition.
    assert!(protocol_err(pair.remote_op(&second)));
    // A correctly ordered stream is accepted.
    pair.remote_op(&first).unwrap();
    pair.remote_op(&second).unwrap();
}

#[test]
fn fabricated_remote_time_is_rejected() {
    let mut pair = Jupiter::new();
    // The peer claims to have applied an operation we never produced.
    let rec = Record::new(VectorTime::new(0, 1), Operation::insert(0, "x"));
    assert!(protocol_err(pair.remote_op(&rec)));
}

#[test]
fn stale_remote_time_is_rejected() {
    let mut pair = Jupiter::new();
    pair.local_op(&Operation::insert(0, "a"));
    pair.local_op(&Operation::insert(1, "b"));

    // Acknowledge both ops...
    let rec = Record::new(VectorTime::new(0, 2), Operation::insert(0, "x"));
    pair.remote_op(&rec).unwrap();
    pair.local_op(&Operation::insert(2, "c"));

    // ...then claim an acknowledgement older than the oldest tracked op.
    let stale = Record::new(VectorTime::new(1, 1), Operation::insert(0, "y"));
    assert!(protocol_err(pair.remote_op(&stale)));
}

#[test]
fn pair_error_converts_into_crate_error() {
    let mut pair = Jupiter::new();
    let rec = Record::new(VectorTime::new(7, 0), Operation::Noop);
    let err: OtError = pair.remote_op(&rec).unwrap_err().into();
    assert!(matches!(err, OtError::Jupiter(JupiterError::Protocol(_))));
}

// ── Two pairs in conversation ────────────────────────────────────

#[test]
fn symmetric_pairs_stay_in_step() {
    let mut left = Jupiter::new();
    let mut right = Jupiter::new();

    let from_left = left.local_op(&Operation::insert(0, "l"));
    let from_right = right.local_op(&Operation::insert(0, "r"));

    right.remote_op(&from_left).unwrap();
    left.remote_op(&from_right).unwrap();

    assert_eq!(left.time(), VectorTime::new(1, 1));
    assert_eq!(right.time(), VectorTime::new(1, 1));
    assert_eq!(left.pending(), 1);
    assert_eq!(right.pending(), 1);

    // The next exchange acknowledges the outstanding operations.
    let from_left = left.local_op(&Operation::Noop);
    right.remote_op(&from_left).unwrap();
    assert_eq!(right.pending(), 0);
}
