use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};

use log::{debug, trace};
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;

use crate::asset::error::{AssetError, AssetResult};
use crate::asset::handle::LoadedAsset;
use crate::asset::key::AssetKey;
use crate::asset::manager::AssetManager;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

/// Runs [`AssetManager::resolve`] on a bounded pool of background threads.
///
/// Each worker thread owns its own locator and loader instances. Dropping the executor doesn't
/// wait for running loads, tasks that haven't started yet are discarded.
pub struct AsyncLoadExecutor {
    manager: Arc<AssetManager>,
    runtime: Option<Runtime>,
    workers: usize,
}

impl AsyncLoadExecutor {
    /// One worker per available core.
    pub fn new(manager: Arc<AssetManager>) -> std::io::Result<Self> {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_workers(manager, workers)
    }

    pub fn with_workers(manager: Arc<AssetManager>, workers: usize) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("asset-loader")
            .build()?;

        debug!("Started asset loader pool with {} workers", workers);
        Ok(Self {
            manager,
            runtime: Some(runtime),
            workers,
        })
    }

    pub fn manager(&self) -> &Arc<AssetManager> {
        &self.manager
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queues the resolution of `key`. Never blocks.
    pub fn submit(&self, key: AssetKey) -> AssetFuture {
        let state = Arc::new(AtomicU8::new(PENDING));
        let manager = self.manager.clone();
        let task_state = state.clone();
        let task_key = key.clone();

        let task = move || {
            if task_state
                .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(AssetError::Cancelled { key: task_key });
            }

            manager.resolve(&task_key)
        };

        let Some(runtime) = &self.runtime else {
            unreachable!("the runtime is only taken on drop");
        };
        let handle = runtime.spawn_blocking(task);

        trace!("Submitted {}", key);
        AssetFuture { key, state, handle }
    }
}

impl Drop for AsyncLoadExecutor {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Pending result of [`AsyncLoadExecutor::submit`]. Can be awaited from any executor or waited
/// on synchronously.
pub struct AssetFuture {
    key: AssetKey,
    state: Arc<AtomicU8>,
    handle: JoinHandle<AssetResult<LoadedAsset>>,
}

impl AssetFuture {
    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    /// Prevents the load from starting. Returns `false` if it already started (or finished), in
    /// which case it runs to completion.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if cancelled {
            self.handle.abort();
            debug!("Cancelled loading of {}", self.key);
        }

        cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks the calling thread until the load has finished.
    pub fn wait(self) -> AssetResult<LoadedAsset> {
        pollster::block_on(self)
    }
}

impl Future for AssetFuture {
    type Output = AssetResult<LoadedAsset>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) if err.is_cancelled() => Poll::Ready(Err(AssetError::Cancelled {
                key: this.key.clone(),
            })),
            Poll::Ready(Err(err)) => Poll::Ready(Err(AssetError::Worker {
                key: this.key.clone(),
                reason: err.to_string(),
            })),
        }
    }
}
