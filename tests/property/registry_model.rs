//! Property-based tests for the participant registry.
//!
//! Replays random connect/disconnect sequences against both the registry
//! and a plain model, and checks they agree after every step.

use std::collections::BTreeSet;

use lanchat_relay::registry::Registry;
use lanchat_relay::transport::Endpoint;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Event {
    Connect(String),
    Disconnect(String),
}

fn arb_alias() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["alice", "bob", "carol", "dave", "erin"]).prop_map(String::from)
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_alias().prop_map(Event::Connect),
        arb_alias().prop_map(Event::Disconnect),
    ]
}

proptest! {
    /// Registry contents equal the aliases with a connect not yet matched by
    /// a disconnect, and register/unregister report whether they mutated.
    #[test]
    fn registry_tracks_unmatched_connects(events in prop::collection::vec(arb_event(), 0..64)) {
        let registry = Registry::new();
        let mut model = BTreeSet::new();

        for event in &events {
            match event {
                Event::Connect(alias) => {
                    let added = registry.register(alias, Endpoint::new(format!("host-{alias}")));
                    prop_assert_eq!(added, model.insert(alias.clone()));
                }
                Event::Disconnect(alias) => {
                    let removed = registry.unregister(alias);
                    prop_assert_eq!(removed, model.remove(alias));
                }
            }
        }

        let actual: BTreeSet<String> = registry.snapshot().into_iter().map(|p| p.alias).collect();
        prop_assert_eq!(actual, model);
    }

    /// `all_except` never includes the excluded alias and includes everyone else.
    #[test]
    fn all_except_excludes_only_the_sender(
        connects in prop::collection::vec(arb_alias(), 0..16),
        sender in arb_alias(),
    ) {
        let registry = Registry::new();
        for alias in &connects {
            registry.register(alias, Endpoint::new(alias.as_str()));
        }

        let others = registry.all_except(&sender);
        prop_assert!(others.iter().all(|p| p.alias != sender));
        let expected = registry.len() - usize::from(registry.contains(&sender));
        prop_assert_eq!(others.len(), expected);
    }
}
