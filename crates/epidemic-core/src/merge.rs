//! Last-write-wins merge of [`Record`]s keyed by [`Timestamp`].

use crate::model::{Record, Timestamp};

/// Types that can absorb another instance of themselves, keeping only the
/// state that should survive. Implementations must be commutative,
/// associative, and idempotent so that applying merges in any order (or
/// more than once) converges to the same result.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

impl Merge for Record {
    /// Keep `other` only if its timestamp strictly beats this record's.
    /// Equal timestamps never occur for distinct writes since `replica_id`
    /// breaks every tie, so this reduces to `other.ts > self.ts`.
    fn merge(&mut self, other: Self) {
        if other.ts > self.ts {
            *self = other;
        }
    }
}

/// Decide whether an incoming timestamp should overwrite a possibly-absent
/// current one. Shared by replica application and anti-entropy repair so
/// both paths use identical LWW semantics.
#[must_use]
pub fn wins(current: Option<&Timestamp>, incoming: &Timestamp) -> bool {
    match current {
        None => true,
        Some(cur) => incoming > cur,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_later_timestamp() {
        let mut a = Record::set(serde_json::json!(1), Timestamp::new(1, "R0"));
        let b = Record::set(serde_json::json!(2), Timestamp::new(2, "R0"));
        a.merge(b.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn merge_ignores_earlier_timestamp() {
        let original = Record::set(serde_json::json!(1), Timestamp::new(5, "R0"));
        let mut a = original.clone();
        let stale = Record::set(serde_json::json!(2), Timestamp::new(1, "R0"));
        a.merge(stale);
        assert_eq!(a, original);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = Record::set(serde_json::json!(1), Timestamp::new(3, "R0"));
        let b = a.clone();
        a.merge(b.clone());
        a.merge(b);
        assert_eq!(a, Record::set(serde_json::json!(1), Timestamp::new(3, "R0")));
    }

    #[test]
    fn merge_is_commutative() {
        let a0 = Record::set(serde_json::json!(1), Timestamp::new(1, "R0"));
        let b0 = Record::set(serde_json::json!(2), Timestamp::new(2, "R1"));

        let mut ab = a0.clone();
        ab.merge(b0.clone());

        let mut ba = b0;
        ba.merge(a0);

        assert_eq!(ab, ba);
    }

    #[test]
    fn wins_is_true_when_no_current_record() {
        assert!(wins(None, &Timestamp::new(1, "R0")));
    }

    #[test]
    fn wins_compares_timestamps() {
        let cur = Timestamp::new(5, "R0");
        assert!(!wins(Some(&cur), &Timestamp::new(4, "R1")));
        assert!(wins(Some(&cur), &Timestamp::new(6, "R1")));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_record() -> impl Strategy<Value = Record> {
            (any::<i64>(), 0u64..20, "[a-c]").prop_map(|(v, counter, replica_id)| {
                Record::set(serde_json::json!(v), Timestamp::new(counter, replica_id))
            })
        }

        proptest! {
            #[test]
            fn merge_is_idempotent_for_any_pair(a in arb_record(), b in arb_record()) {
                let mut once = a.clone();
                once.merge(b.clone());
                let mut twice = once.clone();
                twice.merge(b);
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn merge_is_commutative_for_any_pair(a in arb_record(), b in arb_record()) {
                let mut ab = a.clone();
                ab.merge(b.clone());
                let mut ba = b;
                ba.merge(a);
                prop_assert_eq!(ab, ba);
            }

            #[test]
            fn merge_result_ts_is_the_max_of_the_two(a in arb_record(), b in arb_record()) {
                let expected_ts = if b.ts > a.ts { b.ts.clone() } else { a.ts.clone() };
                let mut merged = a;
                merged.merge(b);
                prop_assert_eq!(merged.ts, expected_ts);
            }
        }
    }
}
