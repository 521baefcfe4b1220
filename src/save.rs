//! Debounced saves
//!
//! Every edit of a document asks for a save, but only the last one of a burst of edits actually
//! reaches the fragment store. Timers are provided by a [`Scheduler`], so that hosts can bring their own.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;

/// A unit of deferred work
pub type SaveTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Something that can run a task after a delay, and forget about it before it runs
pub trait Scheduler: Send + Sync {
    type Handle: Send;

    fn schedule(&self, delay: Duration, task: SaveTask) -> Self::Handle;
    /// Cancelling a task that already ran is a no-op
    fn cancel(&self, handle: Self::Handle);
}


/// A [`Scheduler`] backed by the tokio runtime it has been created in
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime this is called from
    pub fn current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl Scheduler for TokioScheduler {
    type Handle = JoinHandle<()>;

    fn schedule(&self, delay: Duration, task: SaveTask) -> JoinHandle<()> {
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        })
    }

    fn cancel(&self, handle: JoinHandle<()>) {
        handle.abort();
    }
}


/// Keeps at most one pending task, and restarts the delay every time a new one comes in
pub struct Debouncer<S: Scheduler> {
    scheduler: S,
    delay: Duration,
    pending: Option<S::Handle>,
}

impl<S: Scheduler> Debouncer<S> {
    pub fn new(scheduler: S, delay: Duration) -> Self {
        Self { scheduler, delay, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace the pending task (if any) with this one
    pub fn schedule(&mut self, task: SaveTask) {
        if let Some(previous) = self.pending.take() {
            log::trace!("Superseding a pending save");
            self.scheduler.cancel(previous);
        }
        log::debug!("Scheduling a save in {:?}", self.delay);
        self.pending = Some(self.scheduler.schedule(self.delay, task));
    }

    /// Drop the pending task (if any)
    pub fn cancel(&mut self) {
        if let Some(previous) = self.pending.take() {
            log::debug!("Cancelling a pending save");
            self.scheduler.cancel(previous);
        }
    }
}
