mod common;

use std::sync::Arc;

use common::{Gate, Widget, probed_manager};
use lodestone::asset::{
    AssetError, AssetInfo, AssetKey, AssetLoader, AssetManager, AssetRef, AsyncLoadExecutor, CachePolicy,
    LoaderFactory,
};

#[test_log::test]
fn submitted_keys_resolve_on_workers() {
    let (manager, probe, _) = probed_manager(&[("a.txt", "a"), ("b.txt", "b"), ("c.wdg", "c")]);
    let executor = AsyncLoadExecutor::with_workers(Arc::new(manager), 2).unwrap();
    assert_eq!(executor.workers(), 2);

    let futures: Vec<_> = ["a.txt", "b.txt"]
        .into_iter()
        .map(|name| executor.submit(AssetKey::new(name)))
        .collect();
    let texts: Vec<String> = futures
        .into_iter()
        .map(|future| future.wait().unwrap().downcast_ref::<String>().unwrap().clone())
        .collect();
    assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);

    let widget = pollster::block_on(executor.submit(AssetKey::model("c.wdg"))).unwrap();
    assert_eq!(widget.downcast_ref::<Widget>().unwrap().label, "c");
    assert!(widget.is_tracked());

    // the calling thread never ran a loader
    let caller = std::thread::current().id();
    assert!(probe.seen.lock().unwrap().iter().all(|(thread, _)| *thread != caller));
}

#[test]
fn failures_are_reported_through_the_future() {
    let (manager, _, _) = probed_manager(&[]);
    let executor = AsyncLoadExecutor::new(Arc::new(manager)).unwrap();
    assert!(executor.workers() >= 1);

    let err = executor.submit(AssetKey::new("missing.txt")).wait().unwrap_err();
    assert!(err.is_not_found());
}

/// Blocks until its gate opens.
struct GatedLoader {
    gate: Gate,
}

impl AssetLoader for GatedLoader {
    fn load(&mut self, _manager: &AssetManager, info: &AssetInfo) -> anyhow::Result<Option<AssetRef>> {
        self.gate.wait();
        Ok(Some(Arc::new(String::from_utf8(info.read_owned()?)?)))
    }
}

#[test_log::test]
fn queued_loads_can_be_cancelled() {
    let (manager, probe, store) = probed_manager(&[("later.txt", "later")]);
    store.insert("slow.gated", b"slow".to_vec());
    let gate = Gate::default();
    let loader_gate = gate.clone();
    manager.register_loader(
        &["gated"],
        LoaderFactory::new("GatedLoader", move || {
            Ok(Box::new(GatedLoader {
                gate: loader_gate.clone(),
            }))
        }),
    );

    let executor = AsyncLoadExecutor::with_workers(Arc::new(manager), 1).unwrap();
    let slow = executor.submit(AssetKey::new("slow.gated").with_cache(CachePolicy::None));
    let queued = executor.submit(AssetKey::new("later.txt"));

    assert!(queued.cancel());
    assert!(queued.is_cancelled());
    assert!(!queued.cancel());

    gate.open();
    let slow = slow.wait().unwrap();
    assert_eq!(slow.downcast_ref::<String>().unwrap(), "slow");

    let err = queued.wait().unwrap_err();
    assert!(matches!(&err, AssetError::Cancelled { key } if key.name() == "later.txt"));
    assert_eq!(probe.loads(), 0);
}

#[test]
fn started_loads_cannot_be_cancelled() {
    let (manager, _, _) = probed_manager(&[("done.txt", "done")]);
    let executor = AsyncLoadExecutor::with_workers(Arc::new(manager), 1).unwrap();

    let future = executor.submit(AssetKey::new("done.txt"));
    while !future.is_finished() {
        std::thread::yield_now();
    }

    assert!(!future.cancel());
    assert_eq!(future.wait().unwrap().downcast_ref::<String>().unwrap(), "done");
}
