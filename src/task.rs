use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::api::ApiClient;
use crate::errors::FetchError;
use crate::models::{Play, Stats};
use crate::resource::{AsyncResource, Host, HostLink};

pub const DEFAULT_PAGE_SIZE: u32 = 50;

type Pending<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;
type Accessor<A, T, E> = Arc<dyn Fn(A) -> Pending<T, E> + Send + Sync>;

/// Nothing is fetched until [`FetchTask::attach`].
pub struct FetchTask<A, T, E = FetchError> {
    accessor: Accessor<A, T, E>,
    args: A,
    resource: AsyncResource<T, E>,
}

impl<A, T, E> FetchTask<A, T, E> {
    pub fn resource(&self) -> &AsyncResource<T, E> {
        &self.resource
    }

    pub fn args(&self) -> &A {
        &self.args
    }

    pub fn is_attached(&self) -> bool {
        self.resource.host().is_attached()
    }

    /// Stops notifying the host. Outstanding invocations still settle.
    pub fn detach(&mut self) {
        self.resource.host().detach();
    }
}

impl<A, T, E> FetchTask<A, T, E>
where
    A: Clone + PartialEq + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new<H, F, Fut>(host: &Arc<H>, accessor: F, args: A) -> Self
    where
        H: Host + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let accessor: Accessor<A, T, E> =
            Arc::new(move |args| -> Pending<T, E> { Box::pin(accessor(args)) });
        Self {
            accessor,
            args,
            resource: AsyncResource::new(HostLink::new(host)),
        }
    }

    /// Connects the host and starts the first invocation.
    pub fn attach(&mut self) {
        if self.is_attached() {
            return;
        }
        self.resource.host().attach();
        self.run();
    }

    /// Rebinds the arguments; restarts only when they changed by value.
    pub fn update(&mut self, args: A) -> bool {
        if args == self.args {
            return false;
        }
        self.args = args;
        if self.is_attached() {
            self.run();
        }
        true
    }

    pub fn refresh(&mut self) {
        if self.is_attached() {
            self.run();
        }
    }

    pub fn render<R>(
        &self,
        pending: impl FnOnce() -> R,
        complete: impl FnOnce(&T) -> R,
        error: impl FnOnce(&E) -> R,
    ) -> R {
        self.resource.render(pending, complete, error)
    }

    fn run(&self) {
        let accessor = Arc::clone(&self.accessor);
        let args = self.args.clone();
        // Superseded invocations are not aborted; their results are dropped
        // by the generation check.
        drop(self.resource.start(move || accessor(args)));
    }
}

pub fn fetch_plays_task<H>(host: &Arc<H>, api: ApiClient) -> FetchTask<(u32, u32), Vec<Play>>
where
    H: Host + 'static,
{
    FetchTask::new(
        host,
        move |(limit, offset): (u32, u32)| {
            let api = api.clone();
            async move { api.get_plays(limit, offset).await }
        },
        (DEFAULT_PAGE_SIZE, 0),
    )
}

pub fn fetch_stats_task<H>(host: &Arc<H>, api: ApiClient) -> FetchTask<(), Stats>
where
    H: Host + 'static,
{
    FetchTask::new(
        host,
        move |_: ()| {
            let api = api.clone();
            async move { api.get_stats().await }
        },
        (),
    )
}
