//! Property tests for policy validation against the handler registry

use lookout_core::*;
use proptest::collection::btree_map;
use proptest::prelude::*;
use tokio::sync::mpsc;

const REGISTERED: [&str; 2] = ["tcp", "system_data"];

fn idle_handler(_: &Policy, _: CancelSignal) -> Result<EventStream> {
    let (_tx, rx) = mpsc::channel(1);
    Ok(rx)
}

fn registry() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    for policy_type in REGISTERED {
        registry.register(policy_type, idle_handler).unwrap();
    }
    registry
}

fn policy_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("tcp".to_string()),
        Just("system_data".to_string()),
        "[a-z_]{0,12}",
    ]
}

proptest! {
    #[test]
    fn unknown_type_iff_unregistered(
        name in "[a-zA-Z0-9_-]{1,24}",
        policy_type in policy_type(),
        params in btree_map("[a-z]{1,8}", ".{0,16}", 0..6),
    ) {
        let registry = registry();
        let mut policy = Policy::new(name, "agent", policy_type.as_str());
        policy.params = params;

        let unknown = matches!(policy.validate(&registry), Err(LookoutError::UnknownType { .. }));
        prop_assert_eq!(unknown, !REGISTERED.contains(&policy_type.as_str()));
    }

    #[test]
    fn named_policy_of_registered_type_is_valid(
        name in ".{1,32}",
        index in 0..REGISTERED.len(),
    ) {
        let registry = registry();
        let policy = Policy::new(name, "agent", REGISTERED[index]);
        prop_assert!(policy.validate(&registry).is_ok());
    }

    #[test]
    fn empty_type_never_registers(suffix in "[a-z]{0,4}") {
        let registry = HandlerRegistry::new();
        prop_assert!(registry.register("", idle_handler).is_err());
        let first = registry.register(format!("x{suffix}"), idle_handler);
        prop_assert!(first.is_ok());
        let duplicate = registry.register(format!("x{suffix}"), idle_handler);
        prop_assert!(
            matches!(duplicate, Err(LookoutError::AlreadyRegistered { .. })),
            "expected AlreadyRegistered on second registration"
        );
    }
}
