//! Property tests for change detection.

use proptest::prelude::*;
use reactive_state::{deep_equal, Tracker, TrackerConfig, Value};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn arb_json() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        (-1000i64..1000).prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(serde_json::Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z_]{1,6}", inner, 0..6)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn deep_equal_is_reflexive_across_copies(json in arb_json()) {
        let value = Value::from(json);
        prop_assert!(deep_equal(&value, &value));
        prop_assert!(deep_equal(&value, &value.deep_clone()));
    }

    #[test]
    fn deep_equal_is_symmetric(a in arb_json(), b in arb_json()) {
        let (a, b) = (Value::from(a), Value::from(b));
        prop_assert_eq!(deep_equal(&a, &b), deep_equal(&b, &a));
    }

    #[test]
    fn deep_equal_agrees_with_json_equality(a in arb_json(), b in arb_json()) {
        // Generated trees have no "_owner" values that differ independently,
        // so structural equality matches JSON equality unless the skip key
        // is present on both sides.
        let skip_free = !a.to_string().contains("\"_owner\"")
            && !b.to_string().contains("\"_owner\"");
        prop_assume!(skip_free);
        prop_assert_eq!(deep_equal(&Value::from(a.clone()), &Value::from(b.clone())), a == b);
    }

    #[test]
    fn equal_reassignment_never_notifies(json in arb_json()) {
        let tracker = Tracker::new(TrackerConfig::default());
        let state = tracker.track(json!({})).unwrap();
        state.set("k", json.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _ = state.subscribe_self(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        state.set("k", json);
        tracker.run_until_idle();
        prop_assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn changed_value_notifies_once(a in arb_json(), b in arb_json()) {
        prop_assume!(a != b);
        let tracker = Tracker::new(TrackerConfig {
            equality_skip_key: None,
            ..Default::default()
        });
        let state = tracker.track(json!({})).unwrap();
        state.set("k", a);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _ = state.subscribe_self(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        state.set("k", b);
        prop_assert_eq!(tracker.run_until_idle(), 1);
        prop_assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
