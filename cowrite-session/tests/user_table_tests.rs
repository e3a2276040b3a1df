use cowrite_session::UserTable;
use cowrite_types::{Colour, UserId};

const RED: Colour = Colour::new(255, 0, 0);
const BLUE: Colour = Colour::new(0, 0, 255);
const GREEN: Colour = Colour::new(0, 200, 0);

// ── Id allocation ────────────────────────────────────────────────

#[test]
fn ids_start_at_one_and_increase() {
    let mut table = UserTable::new();
    assert_eq!(table.connect("alice", RED), UserId::new(1));
    assert_eq!(table.connect("bob", BLUE), UserId::new(2));
}

#[test]
fn find_free_id_fills_gaps() {
    let mut table = UserTable::new();
    table.install(UserId::new(1), "a", RED, false);
    table.install(UserId::new(3), "c", BLUE, false);
    assert_eq!(table.find_free_id(), UserId::new(2));
}

#[test]
fn removed_ids_are_reused() {
    let mut table = UserTable::new();
    let a = table.connect("alice", RED);
    table.connect("bob", BLUE);
    table.remove(a).unwrap();
    assert_eq!(table.find_free_id(), a);
}

// ── Connect / disconnect ─────────────────────────────────────────

#[test]
fn disconnect_keeps_identity() {
    let mut table = UserTable::new();
    let id = table.connect("alice", RED);
    table.disconnect(id).unwrap();

    let user = table.get(id).unwrap();
    assert!(!user.is_connected());
    assert_eq!(user.name(), "alice");
    assert_eq!(table.len(), 1);
}

#[test]
fn reconnect_by_name_reuses_id_and_updates_colour() {
    let mut table = UserTable::new();
    let id = table.connect("alice", RED);
    table.disconnect(id).unwrap();

    let again = table.connect("Alice", GREEN);
    assert_eq!(again, id);
    let user = table.get(id).unwrap();
    assert!(user.is_connected());
    assert_eq!(user.colour(), GREEN);
}

#[test]
fn disconnect_unknown_user_is_logic_error() {
    let mut table = UserTable::new();
    assert!(table.disconnect(UserId::new(9)).is_err());
}

// ── Lookups and conflict checks ──────────────────────────────────

#[test]
fn find_by_name_is_case_insensitive() {
    let mut table = UserTable::new();
    let id = table.connect("Alice", RED);
    assert_eq!(table.find_by_name("alice").unwrap().id(), id);
    assert!(table.find_by_name("nobody").is_none());
}

#[test]
fn name_in_use_only_counts_connected_users() {
    let mut table = UserTable::new();
    let id = table.connect("alice", RED);
    assert!(table.name_in_use("ALICE", None));
    assert!(!table.name_in_use("alice", Some(id)));

    table.disconnect(id).unwrap();
    assert!(!table.name_in_use("alice", None));
}

#[test]
fn colour_in_use_matches_similar_colours() {
    let mut table = UserTable::new();
    let id = table.connect("alice", RED);
    assert!(table.colour_in_use(Colour::new(250, 10, 5), None));
    assert!(!table.colour_in_use(BLUE, None));
    assert!(!table.colour_in_use(RED, Some(id)));
}

#[test]
fn connected_and_offline_iterators_partition() {
    let mut table = UserTable::new();
    let a = table.connect("alice", RED);
    table.connect("bob", BLUE);
    table.disconnect(a).unwrap();

    let connected: Vec<_> = table.connected().map(|u| u.name().to_string()).collect();
    let offline: Vec<_> = table.offline().map(|u| u.name().to_string()).collect();
    assert_eq!(connected, vec!["bob"]);
    assert_eq!(offline, vec!["alice"]);
}

// ── Removal ──────────────────────────────────────────────────────

#[test]
fn remove_returns_the_entry() {
    let mut table = UserTable::new();
    let id = table.connect("alice", RED);
    // Lookups still work right up to the removal, so departure
    // notifications can be produced first.
    assert!(table.get(id).is_some());
    let removed = table.remove(id).unwrap();
    assert_eq!(removed.name(), "alice");
    assert!(table.get(id).is_none());
}

#[test]
fn remove_unknown_user_is_logic_error() {
    let mut table = UserTable::new();
    assert!(table.remove(UserId::new(4)).is_err());
}
