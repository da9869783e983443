//! Per-thread plugin instances.
//!
//! Locators and loaders may keep mutable per-call state (an open archive, a half read stream, a
//! root path), so they are never shared between threads. A [`ThreadOwned`] lazily constructs one
//! instance per calling thread from its factory and keeps it in a thread local slot table keyed
//! by the pool id.
//!
//! Instances are not `Send`, so dropping a pool can only free the instance of the dropping
//! thread. Every other thread frees its instance the next time it checks out any pool, or when
//! it exits. A thread that stays idle keeps the instance until then.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::trace;

use crate::asset::error::{AssetError, AssetResult};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

struct Slot {
    owner: Weak<()>,
    /// `None` while the instance is checked out.
    instance: Option<Box<dyn Any>>,
}

thread_local! {
    static SLOTS: RefCell<HashMap<u64, Slot>> = RefCell::new(HashMap::new());
}

type Build<T> = dyn Fn() -> anyhow::Result<Box<T>> + Send + Sync;

pub struct ThreadOwned<T: ?Sized + 'static> {
    id: u64,
    name: String,
    alive: Arc<()>,
    build: Arc<Build<T>>,
}

impl<T: ?Sized + 'static> ThreadOwned<T> {
    pub fn new<F>(name: &str, build: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<T>> + Send + Sync + 'static,
    {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            alive: Arc::new(()),
            build: Arc::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `f` with the calling thread's instance, constructing it on first use. A failing
    /// factory leaves no slot behind, so the next call tries again.
    ///
    /// If the instance is already in use further up this thread's stack (a loader resolving a
    /// dependency of its own type), `f` gets a temporary instance that is discarded afterwards.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> AssetResult<R> {
        let mut checkout = self.checkout()?;
        Ok(f(checkout.instance_mut()))
    }

    /// Whether the calling thread has constructed its instance.
    pub fn is_materialized(&self) -> bool {
        SLOTS.with(|slots| slots.borrow().contains_key(&self.id))
    }

    fn checkout(&self) -> AssetResult<Checkout<T>> {
        enum State<T: ?Sized> {
            Missing,
            Busy,
            Ready(Box<T>),
        }

        drop(prune_dead_slots());

        let state = SLOTS.with(|slots| {
            let mut slots = slots.borrow_mut();
            match slots.get_mut(&self.id) {
                None => State::Missing,
                Some(slot) => match slot.instance.take().map(|any| any.downcast::<Box<T>>()) {
                    Some(Ok(instance)) => State::Ready(*instance),
                    // ids are unique, so a slot always holds the type of its pool
                    Some(Err(_)) => State::Missing,
                    None => State::Busy,
                },
            }
        });

        match state {
            State::Ready(instance) => Ok(Checkout {
                id: self.id,
                instance: Some(instance),
                owned: true,
            }),
            State::Busy => {
                trace!(
                    "{} is in use further up the stack, using a temporary instance",
                    self.name
                );
                Ok(Checkout {
                    id: self.id,
                    instance: Some(self.construct()?),
                    owned: false,
                })
            }
            State::Missing => {
                let instance = self.construct()?;
                self.claim_slot();
                Ok(Checkout {
                    id: self.id,
                    instance: Some(instance),
                    owned: true,
                })
            }
        }
    }

    fn construct(&self) -> AssetResult<Box<T>> {
        (self.build)().map_err(|err| {
            AssetError::Configuration(format!("Failed to construct {}: {:#}", self.name, err))
        })
    }

    fn claim_slot(&self) {
        SLOTS.with(|slots| {
            slots.borrow_mut().insert(
                self.id,
                Slot {
                    owner: Arc::downgrade(&self.alive),
                    instance: None,
                },
            )
        });
    }
}

/// Takes the slots of dropped pools out of this thread's table. The caller drops them, so plugin
/// destructors run outside of the borrow.
fn prune_dead_slots() -> Vec<Slot> {
    SLOTS
        .try_with(|slots| {
            let mut slots = slots.borrow_mut();
            let dead_ids: Vec<u64> = slots
                .iter()
                .filter(|(_, slot)| slot.owner.strong_count() == 0)
                .map(|(id, _)| *id)
                .collect();
            dead_ids.iter().filter_map(|id| slots.remove(id)).collect()
        })
        .unwrap_or_default()
}

impl<T: ?Sized + 'static> Drop for ThreadOwned<T> {
    fn drop(&mut self) {
        let removed = SLOTS.try_with(|slots| slots.borrow_mut().remove(&self.id));
        drop(removed);
    }
}

struct Checkout<T: ?Sized + 'static> {
    id: u64,
    instance: Option<Box<T>>,
    owned: bool,
}

impl<T: ?Sized + 'static> Checkout<T> {
    fn instance_mut(&mut self) -> &mut T {
        self.instance
            .as_deref_mut()
            .expect("instance is present until the checkout is dropped")
    }
}

impl<T: ?Sized + 'static> Drop for Checkout<T> {
    fn drop(&mut self) {
        let Some(instance) = self.instance.take() else {
            return;
        };

        if !self.owned {
            return;
        }

        let rejected = SLOTS
            .try_with(|slots| match slots.borrow_mut().get_mut(&self.id) {
                Some(slot) => {
                    slot.instance = Some(Box::new(instance));
                    None
                }
                // the pool has been dropped in the meantime
                None => Some(instance),
            })
            .ok()
            .flatten();
        drop(rejected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Probe {
        id: usize,
        dropped: Arc<AtomicUsize>,
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn probe_pool(built: Arc<AtomicUsize>, dropped: Arc<AtomicUsize>) -> ThreadOwned<Probe> {
        ThreadOwned::new("Probe", move || {
            Ok(Box::new(Probe {
                id: built.fetch_add(1, Ordering::SeqCst),
                dropped: dropped.clone(),
            }))
        })
    }

    #[test]
    fn one_instance_per_thread() {
        let built = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(probe_pool(built.clone(), Arc::default()));

        assert!(!pool.is_materialized());
        let first = pool.with(|probe| probe.id).unwrap();
        let second = pool.with(|probe| probe.id).unwrap();
        assert_eq!(first, second);
        assert!(pool.is_materialized());

        let remote_pool = pool.clone();
        let remote = std::thread::spawn(move || remote_pool.with(|probe| probe.id).unwrap())
            .join()
            .unwrap();
        assert_ne!(first, remote);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_construction_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let pool: ThreadOwned<usize> = ThreadOwned::new("Flaky", move || {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(anyhow::anyhow!("disk not ready")),
                n => Ok(Box::new(n)),
            }
        });

        let err = pool.with(|value| *value).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("Flaky"));
        assert!(!pool.is_materialized());

        assert_eq!(pool.with(|value| *value).unwrap(), 1);
        assert_eq!(pool.with(|value| *value).unwrap(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reentrant_use_gets_a_temporary() {
        let built = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        let pool = probe_pool(built.clone(), dropped.clone());

        let (outer, inner) = pool
            .with(|probe| (probe.id, pool.with(|nested| nested.id).unwrap()))
            .unwrap();
        assert_ne!(outer, inner);
        // the temporary is gone, the owned instance went back into its slot
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        assert_eq!(pool.with(|probe| probe.id).unwrap(), outer);
    }

    #[test]
    fn dropping_the_pool_drops_the_instance() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let pool = probe_pool(Arc::default(), dropped.clone());
        pool.with(|_| ()).unwrap();
        assert_eq!(dropped.load(Ordering::SeqCst), 0);

        drop(pool);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn other_threads_free_instances_of_dropped_pools() {
        use std::sync::mpsc::channel;

        let dropped = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(probe_pool(Arc::default(), dropped.clone()));
        let other = Arc::new(probe_pool(Arc::default(), Arc::default()));

        let (to_worker, worker_inbox) = channel::<()>();
        let (to_main, main_inbox) = channel::<()>();
        let worker_pool = pool.clone();
        let worker_other = other.clone();
        let worker = std::thread::spawn(move || {
            worker_pool.with(|_| ()).unwrap();
            worker_other.with(|_| ()).unwrap();
            drop(worker_pool);
            to_main.send(()).unwrap();

            // keeps running while the pool is dropped elsewhere
            worker_inbox.recv().unwrap();
            worker_other.with(|_| ()).unwrap();
            to_main.send(()).unwrap();
            worker_inbox.recv().unwrap();
        });

        main_inbox.recv().unwrap();
        drop(pool);
        assert_eq!(dropped.load(Ordering::SeqCst), 0);

        to_worker.send(()).unwrap();
        main_inbox.recv().unwrap();
        assert_eq!(dropped.load(Ordering::SeqCst), 1);

        to_worker.send(()).unwrap();
        worker.join().unwrap();
        drop(other);
    }
}
