#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;

use lodestone::asset::{
    Asset, AssetEventListener, AssetInfo, AssetKey, AssetLoader, AssetManager, AssetRef, LoaderFactory,
};
use lodestone::io::memory::{MemoryLocator, MemoryStore};

/// A smart asset: every consumer gets its own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub label: String,
}

impl Asset for Widget {
    fn is_smart_clone(&self) -> bool {
        true
    }

    fn clone_asset(&self) -> Option<AssetRef> {
        Some(Arc::new(self.clone()))
    }
}

/// Counts decodes and constructed instances, and remembers which instance ran on which thread.
#[derive(Clone, Default)]
pub struct Probe {
    pub loads: Arc<AtomicUsize>,
    pub instances: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<(ThreadId, usize)>>>,
}

impl Probe {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }
}

/// Decodes text into a [`String`] or, for `wdg` files, into a [`Widget`].
pub struct ProbeLoader {
    id: usize,
    probe: Probe,
}

impl ProbeLoader {
    pub fn factory(probe: &Probe) -> LoaderFactory {
        let probe = probe.clone();
        LoaderFactory::new("ProbeLoader", move || {
            Ok(Box::new(ProbeLoader {
                id: probe.instances.fetch_add(1, Ordering::SeqCst),
                probe: probe.clone(),
            }))
        })
    }
}

impl AssetLoader for ProbeLoader {
    fn load(&mut self, _manager: &AssetManager, info: &AssetInfo) -> anyhow::Result<Option<AssetRef>> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        self.probe
            .seen
            .lock()
            .unwrap()
            .push((std::thread::current().id(), self.id));

        let text = String::from_utf8(info.read_owned()?)?;
        if info.key().extension() == "wdg" {
            return Ok(Some(Arc::new(Widget { label: text })));
        }

        Ok(Some(Arc::new(text)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Requested(String),
    Loaded(String),
    DependencyNotFound { parent: String, dependency: String },
}

#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn missing_dependencies(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, Event::DependencyNotFound { .. }))
            .collect()
    }
}

impl AssetEventListener for RecordingListener {
    fn asset_requested(&self, key: &AssetKey) {
        self.events.lock().unwrap().push(Event::Requested(key.name().to_string()));
    }

    fn asset_loaded(&self, key: &AssetKey) {
        self.events.lock().unwrap().push(Event::Loaded(key.name().to_string()));
    }

    fn asset_dependency_not_found(&self, parent: &AssetKey, dependency: &AssetKey) {
        self.events.lock().unwrap().push(Event::DependencyNotFound {
            parent: parent.name().to_string(),
            dependency: dependency.name().to_string(),
        });
    }
}

/// A manager with one memory locator and the probe loader for `txt` and `wdg`.
pub fn probed_manager(blobs: &[(&str, &str)]) -> (AssetManager, Probe, MemoryStore) {
    let manager = AssetManager::new();
    let probe = Probe::default();
    let store = MemoryStore::new();
    for (name, content) in blobs {
        store.insert(name, content.as_bytes().to_vec());
    }

    manager.register_locator("/", MemoryLocator::factory(store.clone()));
    manager.register_loader(&["txt", "wdg"], ProbeLoader::factory(&probe));
    (manager, probe, store)
}

/// Closed until [`Gate::open`] is called.
#[derive(Clone, Default)]
pub struct Gate {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn open(&self) {
        let (open, signal) = &*self.state;
        *open.lock().unwrap() = true;
        signal.notify_all();
    }

    pub fn wait(&self) {
        let (open, signal) = &*self.state;
        let mut guard = open.lock().unwrap();
        while !*guard {
            guard = signal.wait(guard).unwrap();
        }
    }
}
