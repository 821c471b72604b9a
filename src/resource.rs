use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::FetchError;

/// Something that re-renders when a resource it displays changes state.
pub trait Host: Send + Sync {
    fn request_update(&self);
}

/// Notifying a detached or dropped host is a no-op.
#[derive(Clone)]
pub struct HostLink {
    host: Weak<dyn Host>,
    attached: Arc<AtomicBool>,
}

impl HostLink {
    pub fn new<H: Host + 'static>(host: &Arc<H>) -> Self {
        let host: Arc<dyn Host> = host.clone();
        Self {
            host: Arc::downgrade(&host),
            attached: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn attach(&self) {
        self.attached.store(true, Ordering::SeqCst);
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst) && self.host.strong_count() > 0
    }

    pub fn notify(&self) {
        if !self.attached.load(Ordering::SeqCst) {
            return;
        }
        if let Some(host) = self.host.upgrade() {
            host.request_update();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus<T, E = FetchError> {
    Pending,
    Complete(T),
    Error(E),
}

struct Inner<T, E> {
    status: TaskStatus<T, E>,
    generation: u64,
}

pub struct AsyncResource<T, E = FetchError> {
    inner: Arc<Mutex<Inner<T, E>>>,
    host: HostLink,
}

impl<T, E> Clone for AsyncResource<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            host: self.host.clone(),
        }
    }
}

impl<T, E> AsyncResource<T, E> {
    pub fn host(&self) -> &HostLink {
        &self.host
    }
}

impl<T, E> AsyncResource<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(host: HostLink) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                status: TaskStatus::Pending,
                generation: 0,
            })),
            host,
        }
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.lock().status, TaskStatus::Pending)
    }

    pub fn start<F, Fut>(&self, producer: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let generation = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.status = TaskStatus::Pending;
            inner.generation
        };
        debug!(generation, "fetch started");
        self.host.notify();

        let pending = producer();
        let resource = self.clone();
        tokio::spawn(async move {
            let outcome = pending.await;
            resource.settle(generation, outcome);
        })
    }

    /// Applies `outcome` if `generation` is still current and notifies the
    /// host. Returns `false` when the outcome was stale and dropped.
    pub(crate) fn settle(&self, generation: u64, outcome: Result<T, E>) -> bool {
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!(
                    generation,
                    current = inner.generation,
                    "discarding stale fetch result"
                );
                return false;
            }
            inner.status = match outcome {
                Ok(value) => TaskStatus::Complete(value),
                Err(err) => TaskStatus::Error(err),
            };
        }
        debug!(generation, "fetch settled");
        self.host.notify();
        true
    }

    /// The resource stays locked while the closure runs; closures must not
    /// call back into it.
    pub fn render<R>(
        &self,
        pending: impl FnOnce() -> R,
        complete: impl FnOnce(&T) -> R,
        error: impl FnOnce(&E) -> R,
    ) -> R {
        let inner = self.lock();
        match &inner.status {
            TaskStatus::Pending => pending(),
            TaskStatus::Complete(value) => complete(value),
            TaskStatus::Error(err) => error(err),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> AsyncResource<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn status(&self) -> TaskStatus<T, E> {
        self.lock().status.clone()
    }
}
