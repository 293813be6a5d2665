//! Factory Tests
//!
//! Unit tests for the container cache plus end-to-end scenarios wiring
//! factories, containers, the in-process store and the applier together.
//!
//! ## Test Scopes
//! - **ContainerCache**: first-writer-wins installation, LRU eviction order,
//!   eviction callback.
//! - **Acquisition**: validation errors, idempotent re-acquisition, generated
//!   keys, disposal semantics.
//! - **Scenarios**: concurrent increments from several clients, injected lost
//!   responses, duplicated deliveries, state surviving container disposal.

#[cfg(test)]
mod tests {
    use crate::config::ProtocolConfig;
    use crate::container::container::{Container, Modes};
    use crate::container::pending::PendingCalls;
    use crate::error::FactoryError;
    use crate::factory::cache::ContainerCache;
    use crate::factory::factory::Factory;
    use crate::object::registry::{ObjectTypeRegistry, ReplicatedObject};
    use crate::object::types::{Call, CallId, Reference};
    use crate::store::api::{ObjectStore, ResponseListener};
    use crate::store::memory::InProcessStore;

    use anyhow::Result;
    use dashmap::DashMap;
    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Counter {
        value: i64,
    }

    impl ReplicatedObject for Counter {
        const TYPE_NAME: &'static str = "counter";

        fn construct(init_args: &[Value]) -> Result<Self> {
            match init_args {
                [] => Ok(Self::default()),
                [initial] => Ok(Self {
                    value: initial
                        .as_i64()
                        .ok_or_else(|| anyhow::anyhow!("initial value must be an integer"))?,
                }),
                _ => Err(anyhow::anyhow!("counter takes at most one init arg")),
            }
        }

        fn invoke(&mut self, method: &str, _args: &[Value]) -> Result<Value> {
            match method {
                "inc" => {
                    self.value += 1;
                    Ok(json!(self.value))
                }
                "get" => Ok(json!(self.value)),
                other => Err(anyhow::anyhow!("Unknown method: {}", other)),
            }
        }

        fn read_only_methods() -> &'static [&'static str] {
            &["get"]
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    fn test_registry() -> Arc<ObjectTypeRegistry> {
        let registry = ObjectTypeRegistry::new();
        registry.register::<Counter>();
        registry
    }

    fn fast_config() -> ProtocolConfig {
        ProtocolConfig {
            call_timeout: Duration::from_millis(60),
            max_attempts: 3,
            ..ProtocolConfig::default()
        }
    }

    /// Swallows the first submission of every call id; retries get through.
    struct FlakyStore {
        inner: Arc<InProcessStore>,
        seen: DashMap<CallId, ()>,
        dropped: AtomicUsize,
    }

    impl FlakyStore {
        fn new(inner: Arc<InProcessStore>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                seen: DashMap::new(),
                dropped: AtomicUsize::new(0),
            })
        }
    }

    impl ObjectStore for FlakyStore {
        fn submit(&self, call: Call) -> Result<()> {
            if self.seen.insert(call.call_id.clone(), ()).is_none() {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
            self.inner.submit(call)
        }

        fn read_entry(&self, reference: &Reference) -> Option<Vec<u8>> {
            self.inner.read_entry(reference)
        }

        fn remove_entry(&self, reference: &Reference) {
            self.inner.remove_entry(reference);
        }

        fn register_listener(&self, listener: ResponseListener) {
            self.inner.register_listener(listener);
        }
    }

    /// Delivers every submission twice, simulating a duplicating network.
    struct DuplicatingStore {
        inner: Arc<InProcessStore>,
    }

    impl ObjectStore for DuplicatingStore {
        fn submit(&self, call: Call) -> Result<()> {
            self.inner.submit(call.clone())?;
            self.inner.submit(call)
        }

        fn read_entry(&self, reference: &Reference) -> Option<Vec<u8>> {
            self.inner.read_entry(reference)
        }

        fn remove_entry(&self, reference: &Reference) {
            self.inner.remove_entry(reference);
        }

        fn register_listener(&self, listener: ResponseListener) {
            self.inner.register_listener(listener);
        }
    }

    // ============================================================
    // TEST 1: ContainerCache mechanics
    // ============================================================

    fn make_container(registry: &Arc<ObjectTypeRegistry>, reference: Reference) -> Arc<Container> {
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        Container::new(
            reference,
            store,
            registry.clone(),
            PendingCalls::new(),
            ProtocolConfig::default(),
            Modes::default(),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_cache_first_writer_wins() {
        let registry = test_registry();
        let cache = ContainerCache::new(4, Box::new(|_, _| {}));
        let reference = Reference::new("counter", "k1");

        let first = make_container(&registry, reference.clone());
        let second = make_container(&registry, reference.clone());

        let winner = cache.insert_if_absent(reference.clone(), first.clone());
        assert!(Arc::ptr_eq(&winner, &first));

        // The race loser gets the winner's container back.
        let winner = cache.insert_if_absent(reference.clone(), second.clone());
        assert!(Arc::ptr_eq(&winner, &first));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recently_used() {
        let registry = test_registry();
        let evicted: Arc<Mutex<Vec<Reference>>> = Arc::new(Mutex::new(Vec::new()));
        let evicted_log = evicted.clone();

        let cache = ContainerCache::new(
            2,
            Box::new(move |reference, _container| {
                evicted_log.lock().unwrap().push(reference.clone());
            }),
        );

        let a = Reference::new("counter", "a");
        let b = Reference::new("counter", "b");
        let c = Reference::new("counter", "c");

        cache.insert_if_absent(a.clone(), make_container(&registry, a.clone()));
        cache.insert_if_absent(b.clone(), make_container(&registry, b.clone()));

        // Touch `a` so `b` becomes the oldest.
        assert!(cache.get(&a).is_some());

        cache.insert_if_absent(c.clone(), make_container(&registry, c.clone()));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(*evicted.lock().unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn test_cache_remove() {
        let registry = test_registry();
        let cache = ContainerCache::new(4, Box::new(|_, _| {}));
        let reference = Reference::new("counter", "k1");

        cache.insert_if_absent(reference.clone(), make_container(&registry, reference.clone()));
        assert!(cache.remove(&reference).is_some());
        assert!(cache.remove(&reference).is_none());
        assert!(cache.is_empty());
    }

    // ============================================================
    // TEST 2: Acquisition
    // ============================================================

    #[tokio::test]
    async fn test_unknown_type_is_configuration_error() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        let result = factory.instance_by_name("ghost", Some("k1"), Modes::default(), vec![]);
        assert!(matches!(result, Err(FactoryError::UnknownType(_))));
    }

    #[tokio::test]
    async fn test_bad_init_args_fail_at_acquisition() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        let result = factory.instance_of::<Counter>(
            Some("k1"),
            Modes::default(),
            vec![json!("not a number")],
        );

        match result {
            Err(FactoryError::Constructor { type_name, .. }) => assert_eq!(type_name, "counter"),
            other => panic!("Expected a constructor error, got {:?}", other.err()),
        }
        assert_eq!(factory.container_count(), 0);
    }

    #[tokio::test]
    async fn test_reacquisition_reuses_container() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        let first = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");
        let second = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");

        assert_eq!(first.reference(), second.reference());
        assert_eq!(factory.container_count(), 1);
    }

    #[tokio::test]
    async fn test_acquisition_without_key_generates_one() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        let a = factory
            .instance_of::<Counter>(None, Modes::default(), vec![])
            .expect("Acquisition failed");
        let b = factory
            .instance_of::<Counter>(None, Modes::default(), vec![])
            .expect("Acquisition failed");

        assert_ne!(a.reference(), b.reference());
        assert_eq!(factory.container_count(), 2);
    }

    #[tokio::test]
    async fn test_factory_bound_evicts_oldest_container() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let config = ProtocolConfig {
            max_containers: 2,
            ..ProtocolConfig::default()
        };
        let factory = Factory::new(store.clone(), registry, config);

        let a = factory
            .instance_of::<Counter>(Some("a"), Modes::default(), vec![])
            .expect("Acquisition failed");
        factory
            .instance_of::<Counter>(Some("b"), Modes::default(), vec![])
            .expect("Acquisition failed");

        // Put some state behind `a` before it gets evicted.
        a.invoke("inc", vec![]).await.expect("Call failed");

        factory
            .instance_of::<Counter>(Some("c"), Modes::default(), vec![])
            .expect("Acquisition failed");

        assert_eq!(factory.container_count(), 2);

        // Eviction dropped the local container, not the authoritative state.
        let a_again = factory
            .instance_of::<Counter>(Some("a"), Modes::default(), vec![])
            .expect("Acquisition failed");
        let value = a_again.invoke("get", vec![]).await.expect("Call failed");
        assert_eq!(value, json!(1));
    }

    // ============================================================
    // TEST 3: End-to-end invocation
    // ============================================================

    #[tokio::test]
    async fn test_invoke_through_factory() {
        init_tracing();
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        let counter = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");

        assert_eq!(counter.invoke("inc", vec![]).await.unwrap(), json!(1));
        assert_eq!(counter.invoke("inc", vec![]).await.unwrap(), json!(2));
        assert_eq!(counter.invoke("get", vec![]).await.unwrap(), json!(2));
        assert_eq!(factory.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_init_args_shape_first_construction() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        let counter = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![json!(100)])
            .expect("Acquisition failed");

        assert_eq!(counter.invoke("inc", vec![]).await.unwrap(), json!(101));
    }

    #[tokio::test]
    async fn test_application_failure_reraised_unchanged() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        let counter = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");

        let error = counter
            .invoke("shrink", vec![])
            .await
            .expect_err("Unknown method should fail");
        assert!(error.to_string().contains("Unknown method"));
    }

    // ============================================================
    // TEST 4: Concurrency scenarios
    // ============================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_from_two_factories() {
        init_tracing();
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());

        let factory_a = Factory::new(store.clone(), registry.clone(), ProtocolConfig::default());
        let factory_b = Factory::new(store.clone(), registry.clone(), ProtocolConfig::default());

        let a = factory_a
            .instance_of::<Counter>(Some("shared"), Modes::default(), vec![])
            .expect("Acquisition failed");
        let b = factory_b
            .instance_of::<Counter>(Some("shared"), Modes::default(), vec![])
            .expect("Acquisition failed");

        let (r1, r2, r3) = tokio::join!(
            a.invoke("inc", vec![]),
            a.invoke("inc", vec![]),
            b.invoke("inc", vec![]),
        );
        r1.expect("Call failed");
        r2.expect("Call failed");
        r3.expect("Call failed");

        let value = a.invoke("get", vec![]).await.expect("Call failed");
        assert_eq!(value, json!(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lost_responses_do_not_double_apply() {
        init_tracing();
        let registry = test_registry();
        let inner = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let store = FlakyStore::new(inner);

        let factory = Factory::new(store.clone(), registry, fast_config());
        let counter = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");

        for _ in 0..3 {
            counter.invoke("inc", vec![]).await.expect("Call failed");
        }

        // Every call lost its first attempt and was retried, yet the counter
        // holds exactly 3.
        assert_eq!(store.dropped.load(Ordering::SeqCst), 3);
        let value = counter.invoke("get", vec![]).await.expect("Call failed");
        assert_eq!(value, json!(3));
    }

    #[tokio::test]
    async fn test_duplicated_deliveries_are_suppressed() {
        let registry = test_registry();
        let inner = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let store = Arc::new(DuplicatingStore { inner });

        let factory = Factory::new(store, registry, ProtocolConfig::default());
        let counter = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");

        for _ in 0..3 {
            counter.invoke("inc", vec![]).await.expect("Call failed");
        }

        let value = counter.invoke("get", vec![]).await.expect("Call failed");
        assert_eq!(value, json!(3));
    }

    // ============================================================
    // TEST 5: Disposal semantics
    // ============================================================

    #[tokio::test]
    async fn test_dispose_keeps_authoritative_state() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());

        let factory_a = Factory::new(store.clone(), registry.clone(), ProtocolConfig::default());
        let factory_b = Factory::new(store.clone(), registry.clone(), ProtocolConfig::default());

        let a = factory_a
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");
        a.invoke("inc", vec![]).await.expect("Call failed");

        let reference = a.reference().clone();
        factory_a.dispose_instance_of(&reference);
        assert_eq!(factory_a.container_count(), 0);

        // The other process still observes the authoritative value.
        let b = factory_b
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");
        let value = b.invoke("get", vec![]).await.expect("Call failed");
        assert_eq!(value, json!(1));
    }

    #[tokio::test]
    async fn test_dispose_unknown_reference_is_noop() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        factory.dispose_instance_of(&Reference::new("counter", "nope"));
        assert_eq!(factory.container_count(), 0);
    }

    #[tokio::test]
    async fn test_destroy_removes_store_entry() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store.clone(), registry, ProtocolConfig::default());

        let counter = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");
        counter.invoke("inc", vec![]).await.expect("Call failed");
        assert_eq!(store.entry_count(), 1);

        let reference = counter.reference().clone();
        factory.destroy_instance_of(&reference);
        assert_eq!(store.entry_count(), 0);

        // A fresh acquisition starts a new lifecycle from scratch.
        let reborn = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");
        let value = reborn.invoke("get", vec![]).await.expect("Call failed");
        assert_eq!(value, json!(0));
    }

    #[tokio::test]
    async fn test_force_new_discards_existing_backing_state() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());
        let factory = Factory::new(store, registry, ProtocolConfig::default());

        let counter = factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");
        counter.invoke("inc", vec![]).await.expect("Call failed");
        counter.invoke("inc", vec![]).await.expect("Call failed");

        let reference = counter.reference().clone();
        factory.dispose_instance_of(&reference);

        let fresh = factory
            .instance_of::<Counter>(
                Some("k1"),
                Modes {
                    force_new: true,
                    ..Modes::default()
                },
                vec![],
            )
            .expect("Acquisition failed");

        let value = fresh.invoke("get", vec![]).await.expect("Call failed");
        assert_eq!(value, json!(0));
    }

    // ============================================================
    // TEST 6: Read optimization end-to-end
    // ============================================================

    #[tokio::test]
    async fn test_read_optimized_copy_matches_authoritative_state() {
        let registry = test_registry();
        let store = InProcessStore::new(registry.clone(), &ProtocolConfig::default());

        let factory = Factory::new(store.clone(), registry.clone(), ProtocolConfig::default());
        let optimized = factory
            .instance_of::<Counter>(
                Some("k1"),
                Modes {
                    read_optimization: true,
                    ..Modes::default()
                },
                vec![],
            )
            .expect("Acquisition failed");

        // The forwarded inc carries a snapshot back; the local read then
        // matches what a full round trip would return.
        optimized.invoke("inc", vec![]).await.expect("Call failed");
        let local = optimized.invoke("get", vec![]).await.expect("Call failed");

        let strict_factory =
            Factory::new(store.clone(), registry.clone(), ProtocolConfig::default());
        let strict = strict_factory
            .instance_of::<Counter>(Some("k1"), Modes::default(), vec![])
            .expect("Acquisition failed");
        let authoritative = strict.invoke("get", vec![]).await.expect("Call failed");

        assert_eq!(local, authoritative);
        assert_eq!(local, json!(1));
    }
}
