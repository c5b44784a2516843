//! Event bus tests

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};

use super::*;
use crate::plugin::manifest::PluginManifest;

/// Records the order listeners fire in
#[derive(Clone, Default)]
struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    fn recorder(&self, label: &str) -> impl Fn(&str, &Value) -> ListenerResult + Send + Sync + 'static {
        let entries = Arc::clone(&self.entries);
        let label = label.to_string();
        move |_event: &str, _payload: &Value| {
            entries.lock().push(label.clone());
            Ok(())
        }
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

struct PlayerGreeter {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl Listener for PlayerGreeter {
    fn handle(&self, _event: &str, payload: &Value) -> ListenerResult {
        self.seen.lock().push(payload.clone());
        Ok(())
    }
}

#[test]
fn test_dispatch_without_listeners_is_noop() {
    let bus = EventBus::new();
    let report = bus.dispatch("nobody.listens", &Value::Null);
    assert_eq!(report.invoked, 0);
    assert!(report.is_clean());
}

#[test]
fn test_dispatch_orders_by_descending_priority() {
    let bus = EventBus::new();
    let journal = Journal::default();

    bus.listen("order.paid", journal.recorder("p5"), 5);
    bus.listen("order.paid", journal.recorder("p1"), 1);
    bus.listen("order.paid", journal.recorder("p10"), 10);

    let report = bus.dispatch("order.paid", &json!({"order": 42}));
    assert_eq!(report.invoked, 3);
    assert_eq!(journal.entries(), vec!["p10", "p5", "p1"]);
}

#[test]
fn test_equal_priorities_keep_registration_order() {
    let bus = EventBus::new();
    let journal = Journal::default();

    bus.listen("user.registered", journal.recorder("A"), 0);
    bus.listen("user.registered", journal.recorder("B"), 0);

    bus.dispatch("user.registered", &Value::Null);
    assert_eq!(journal.entries(), vec!["A", "B"]);
}

#[test]
fn test_failing_listener_does_not_stop_dispatch() {
    let bus = EventBus::new();
    let journal = Journal::default();

    bus.listen("vote.cast", journal.recorder("first"), 3);
    let failing = bus.listen("vote.cast", |_event, _payload| anyhow::bail!("reward server offline"), 2);
    bus.listen("vote.cast", journal.recorder("third"), 1);

    let report = bus.dispatch("vote.cast", &json!({"player": "alex"}));
    assert_eq!(report.invoked, 3);
    assert_eq!(journal.entries(), vec!["first", "third"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].listener, failing);
    assert!(report.failures[0].message.contains("reward server offline"));
}

#[test]
fn test_panicking_listener_does_not_stop_dispatch() {
    let bus = EventBus::new();
    let journal = Journal::default();

    bus.listen("vote.cast", journal.recorder("first"), 3);
    let panicking = bus.listen(
        "vote.cast",
        |_event: &str, payload: &Value| -> ListenerResult {
            let site = payload["site"].as_str().unwrap();
            assert!(!site.is_empty());
            Ok(())
        },
        2,
    );
    bus.listen("vote.cast", journal.recorder("third"), 1);

    let report = bus.dispatch("vote.cast", &json!({"player": "alex"}));
    assert_eq!(report.invoked, 3);
    assert_eq!(journal.entries(), vec!["first", "third"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].listener, panicking);
    assert!(report.failures[0].message.starts_with("listener panicked"));

    // The bus stays usable afterwards
    assert_eq!(bus.dispatch("vote.cast", &json!({"site": "top"})).failures.len(), 0);
}

#[test]
fn test_dispatch_report_serializes_listener_ids() {
    let bus = EventBus::new();
    let failing = bus.listen("order.paid", |_event, _payload| anyhow::bail!("ledger locked"), 0);

    let report = bus.dispatch("order.paid", &json!({}));
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["event"], "order.paid");
    assert_eq!(value["failures"][0]["listener"], serde_json::to_value(failing).unwrap());
    assert!(value["failures"][0]["listener"].is_string());
}

#[test]
fn test_duplicate_registrations_fire_twice() {
    let bus = EventBus::new();
    let journal = Journal::default();
    let recorder = Arc::new(journal.recorder("same"));

    bus.listen_arc("ticket.opened", recorder.clone(), 0);
    bus.listen_arc("ticket.opened", recorder, 0);

    bus.dispatch("ticket.opened", &Value::Null);
    assert_eq!(journal.entries(), vec!["same", "same"]);
}

#[test]
fn test_listener_receives_event_name_and_payload() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);

    bus.listen("post.published", move |event, payload| {
        captured.lock().push((event.to_string(), payload.clone()));
        Ok(())
    }, 0);

    bus.dispatch("post.published", &json!({"slug": "hello"}));
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "post.published");
    assert_eq!(seen[0].1["slug"], "hello");
}

#[test]
fn test_forget_only_touches_one_event() {
    let bus = EventBus::new();
    let journal = Journal::default();
    bus.listen("a", journal.recorder("a"), 0);
    bus.listen("b", journal.recorder("b"), 0);

    bus.forget("a");
    assert!(!bus.has_listeners("a"));
    assert!(bus.has_listeners("b"));
    assert_eq!(bus.dispatch("a", &Value::Null).invoked, 0);
}

#[test]
fn test_flush_empties_everything() {
    let bus = EventBus::new();
    let journal = Journal::default();
    bus.listen("a", journal.recorder("a"), 0);
    bus.listen("b", journal.recorder("b"), 0);

    bus.flush();
    assert!(!bus.has_listeners("a"));
    assert!(!bus.has_listeners("b"));
    assert!(bus.events().is_empty());
}

#[test]
fn test_remove_single_registration() {
    let bus = EventBus::new();
    let journal = Journal::default();
    let keep = journal.recorder("keep");
    bus.listen("a", keep, 0);
    let drop_id = bus.listen("a", journal.recorder("drop"), 0);

    assert!(bus.remove(drop_id));
    assert!(!bus.remove(drop_id));
    assert_eq!(bus.listener_count("a"), 1);

    bus.dispatch("a", &Value::Null);
    assert_eq!(journal.entries(), vec!["keep"]);
}

#[test]
fn test_clones_share_the_table() {
    let bus = EventBus::new();
    let handle = bus.clone();
    handle.listen("shop.item.bought", |_e, _p| Ok(()), 0);
    assert!(bus.has_listeners("shop.item.bought"));

    bus.reset();
    assert!(!handle.has_listeners("shop.item.bought"));
}

#[test]
fn test_listener_may_register_during_dispatch() {
    let bus = EventBus::new();
    let inner = bus.clone();
    bus.listen("boot", move |_e, _p| {
        inner.listen("later", |_e, _p| Ok(()), 0);
        Ok(())
    }, 0);

    assert_eq!(bus.dispatch("boot", &Value::Null).invoked, 1);
    assert!(bus.has_listeners("later"));
}

#[test]
fn test_subscribe_listener_object() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe("player.joined", PlayerGreeter { seen: Arc::clone(&seen) }, 0);

    bus.dispatch("player.joined", &json!({"name": "steve"}));
    assert_eq!(seen.lock().as_slice(), &[json!({"name": "steve"})]);
}

#[test]
fn test_studly_case() {
    assert_eq!(studly_case("user.registered"), "UserRegistered");
    assert_eq!(studly_case("order_paid"), "OrderPaid");
    assert_eq!(studly_case("vote-site.reward"), "VoteSiteReward");
    assert_eq!(studly_case("blog"), "Blog");
    assert_eq!(studly_case(""), "");
}

#[test]
fn test_listener_class_name_convention() {
    assert_eq!(
        listener_class_name("Plugins", "blog", "post.published"),
        "Plugins\\Blog\\Listeners\\PostPublishedListener"
    );
    assert_eq!(
        listener_class_name("Plugins", "vote", "vote_cast"),
        "Plugins\\Vote\\Listeners\\VoteCastListener"
    );
}

#[test]
fn test_register_plugin_listeners_from_manifest() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::clone(&seen);
    let catalog = ListenerCatalog::new()
        .with("Plugins\\Shop\\Listeners\\OrderPaidListener", move || PlayerGreeter { seen: Arc::clone(&shared) });

    let manifest = PluginManifest {
        events: vec!["order.paid".to_string(), "order.refunded".to_string()],
    };

    let registered = bus.register_plugin_listeners("Plugins", "shop", &manifest, &catalog);
    assert_eq!(registered, 1);
    assert!(bus.has_listeners("order.paid"));
    assert!(!bus.has_listeners("order.refunded"));

    bus.dispatch("order.paid", &json!({"total": 10}));
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn test_register_plugin_listeners_with_empty_manifest() {
    let bus = EventBus::new();
    let registered = bus.register_plugin_listeners("Plugins", "blog", &PluginManifest::default(), &ListenerCatalog::new());
    assert_eq!(registered, 0);
    assert!(bus.events().is_empty());
}

proptest! {
    #[test]
    fn prop_dispatch_order_is_stable_descending(priorities in proptest::collection::vec(-5i32..5, 0..24)) {
        let bus = EventBus::new();
        let journal = Journal::default();
        for (index, priority) in priorities.iter().enumerate() {
            bus.listen("prop", journal.recorder(&format!("{}:{}", priority, index)), *priority);
        }

        bus.dispatch("prop", &Value::Null);

        let mut expected: Vec<(i32, usize)> = priorities.iter().cloned().zip(0..).collect();
        // sort_by is stable, so equal priorities stay in registration order
        expected.sort_by(|a, b| b.0.cmp(&a.0));
        let expected: Vec<String> = expected.iter().map(|(p, i)| format!("{}:{}", p, i)).collect();
        prop_assert_eq!(journal.entries(), expected);
    }
}
