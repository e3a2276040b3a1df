//! Property-based tests for the transformation algebra.
//!
//! TP1 is what convergence rests on: for any two concurrent operations
//! on the same starting text, both application orders must yield the
//! same content. The inverse property backs the reversible-insert path.

use cowrite_ot::{Operation, Text};
use cowrite_types::UserId;
use proptest::prelude::*;

const U1: Option<UserId> = Some(UserId::new(1));
const U2: Option<UserId> = Some(UserId::new(2));

fn base_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{0,16}").unwrap()
}

/// An operation valid against a document of length `len`.
fn op_strategy(len: usize) -> BoxedStrategy<Operation> {
    let insert = (0..=len, prop::string::string_regex("[A-Z]{1,4}").unwrap())
        .prop_map(|(pos, text)| Operation::insert(pos, text));
    if len == 0 {
        insert.boxed()
    } else {
        let delete = (0..len)
            .prop_flat_map(move |pos| (Just(pos), 1..=len - pos))
            .prop_map(|(pos, len)| Operation::delete(pos, len));
        prop_oneof![insert, delete].boxed()
    }
}

fn pair_strategy() -> impl Strategy<Value = (String, Operation, Operation)> {
    base_strategy().prop_flat_map(|base| {
        let len = base.len();
        (Just(base), op_strategy(len), op_strategy(len))
    })
}

/// Applies `first`, then `second` transformed against `first`.
fn apply_ordered(base: &str, first: &Operation, second: &Operation) -> String {
    let mut doc = Text::authored(base, U1);
    first.apply(&mut doc, U1).unwrap();
    first.transform(second).apply(&mut doc, U2).unwrap();
    doc.to_string()
}

proptest! {
    /// TP1: both orders of two concurrent operations converge.
    #[test]
    fn transforms_satisfy_tp1((base, a, b) in pair_strategy()) {
        let ab = apply_ordered(&base, &a, &b);
        let ba = apply_ordered(&base, &b, &a);
        prop_assert_eq!(ab, ba);
    }

    /// Applying an operation and then its reverse restores the
    /// document exactly, content and authorship included.
    #[test]
    fn reverse_undoes_apply((base, op, _) in pair_strategy()) {
        let mut doc = Text::new();
        // Alternate authors so reversal has authorship to restore.
        for (i, chunk) in base.as_bytes().chunks(3).enumerate() {
            let author = if i % 2 == 0 { U1 } else { U2 };
            doc.append_str(std::str::from_utf8(chunk).unwrap(), author);
        }

        let reverse = op.reverse(&doc).unwrap();
        let mut working = doc.clone();
        op.apply(&mut working, U2).unwrap();
        reverse.apply(&mut working, U1).unwrap();
        prop_assert!(working.eq_with_authors(&doc));
    }

    /// TP1 still holds when one side is a split produced by an earlier
    /// delete-vs-insert transform.
    #[test]
    fn split_products_satisfy_tp1(
        base in prop::string::string_regex("[a-z]{6,16}").unwrap(),
        del_pos in 0usize..4,
        ins_text in prop::string::string_regex("[A-Z]{1,3}").unwrap(),
    ) {
        let del_len = (base.len() - del_pos).min(4).max(2);
        let ins_pos = del_pos + 1;
        let del = Operation::delete(del_pos, del_len);
        let ins = Operation::insert(ins_pos, ins_text);

        // The delete as it applies after the insert has landed.
        let split = ins.transform(&del);

        let mut post_insert = Text::authored(&base, U1);
        ins.apply(&mut post_insert, U1).unwrap();
        let post_insert = post_insert.to_string();

        let other = Operation::insert(post_insert.len() / 2, "Q".to_string());
        let ab = apply_ordered(&post_insert, &split, &other);
        let ba = apply_ordered(&post_insert, &other, &split);
        prop_assert_eq!(ab, ba);
    }

    /// Wire round-trip for arbitrary generated operations.
    #[test]
    fn wire_round_trip((_, op, _) in pair_strategy()) {
        let mut params = Vec::new();
        op.push_params(&mut params);
        let mut index = 0;
        let decoded = Operation::parse_params(&params, &mut index).unwrap();
        prop_assert_eq!(index, params.len());
        prop_assert_eq!(decoded, op);
    }
}
