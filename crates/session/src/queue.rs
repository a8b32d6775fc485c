//! Bounded-concurrency FIFO task queue.
//!
//! Tasks are admitted strictly in submission order: a single dispatcher
//! task pulls submissions off a channel and waits for a semaphore permit
//! before spawning each one.  At most `limit` tasks run at any moment.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot, Notify, Semaphore};

use crate::guard::panic_message;
use crate::types::SessionError;

type Job = BoxFuture<'static, ()>;

#[derive(Default)]
struct QueueStats {
    pending: AtomicUsize,
    running: AtomicUsize,
    idle: Notify,
}

impl QueueStats {
    fn is_idle(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0 && self.running.load(Ordering::Acquire) == 0
    }

    fn notify_if_idle(&self) {
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }
}

/// Counts a submitted task as pending until it starts (or is dropped
/// unstarted because the queue closed).
struct Ticket {
    stats: Arc<QueueStats>,
    started: bool,
}

impl Ticket {
    fn new(stats: Arc<QueueStats>) -> Self {
        stats.pending.fetch_add(1, Ordering::AcqRel);
        Self {
            stats,
            started: false,
        }
    }

    fn start(mut self) -> Running {
        self.started = true;
        self.stats.running.fetch_add(1, Ordering::AcqRel);
        self.stats.pending.fetch_sub(1, Ordering::AcqRel);
        Running {
            stats: self.stats.clone(),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.started {
            self.stats.pending.fetch_sub(1, Ordering::AcqRel);
            self.stats.notify_if_idle();
        }
    }
}

struct Running {
    stats: Arc<QueueStats>,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.stats.running.fetch_sub(1, Ordering::AcqRel);
        self.stats.notify_if_idle();
    }
}

/// A FIFO queue that runs at most `limit` tasks concurrently.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct CallQueue {
    jobs: mpsc::UnboundedSender<Job>,
    semaphore: Arc<Semaphore>,
    stats: Arc<QueueStats>,
    limit: usize,
}

impl CallQueue {
    /// Create a queue admitting up to `limit` concurrent tasks (minimum 1).
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime: the dispatcher task is
    /// spawned immediately.
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, Semaphore::MAX_PERMITS);
        let (jobs, rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(limit));
        tokio::spawn(admit(rx, semaphore.clone()));

        Self {
            jobs,
            semaphore,
            stats: Arc::new(QueueStats::default()),
            limit,
        }
    }

    /// A queue with no practical concurrency limit.
    pub fn unbounded() -> Self {
        Self::new(Semaphore::MAX_PERMITS)
    }

    /// Enqueue `fut` now and return a handle to its output.
    ///
    /// Submission happens synchronously, so tasks are admitted in the
    /// order `submit` was called.  Dropping the returned [`QueuedTask`]
    /// does not cancel the task.
    pub fn submit<F, T>(&self, fut: F) -> QueuedTask<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let ticket = Ticket::new(self.stats.clone());

        let job = async move {
            let _running = ticket.start();
            let outcome = AssertUnwindSafe(fut).catch_unwind().await;
            let _ = tx.send(outcome);
        }
        .boxed();

        if self.jobs.send(job).is_err() {
            tracing::debug!("queue dispatcher gone, task dropped");
        }

        QueuedTask { rx }
    }

    /// Submit `fut` and wait for its output.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, SessionError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(fut).await
    }

    /// Submit `fut` without waiting for it.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.submit(fut));
    }

    /// Wait until no task is pending or running.
    pub async fn idle(&self) {
        loop {
            let notified = self.stats.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.stats.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks currently executing.
    pub fn running(&self) -> usize {
        self.stats.running.load(Ordering::Acquire)
    }

    /// Tasks submitted but not yet admitted.
    pub fn pending(&self) -> usize {
        self.stats.pending.load(Ordering::Acquire)
    }

    /// Stop admitting tasks.  Running tasks finish; tasks still waiting
    /// resolve to [`SessionError::QueueClosed`].
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

impl std::fmt::Debug for CallQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallQueue")
            .field("limit", &self.limit)
            .field("running", &self.running())
            .field("pending", &self.pending())
            .finish()
    }
}

async fn admit(mut jobs: mpsc::UnboundedReceiver<Job>, semaphore: Arc<Semaphore>) {
    while let Some(job) = jobs.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        tokio::spawn(async move {
            job.await;
            drop(permit);
        });
    }
    jobs.close();
    while jobs.try_recv().is_ok() {}
    tracing::debug!("queue dispatcher stopped");
}

/// Output of a queued task.
pub struct QueuedTask<T> {
    rx: oneshot::Receiver<std::thread::Result<T>>,
}

impl<T> Future for QueuedTask<T> {
    type Output = Result<T, SessionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(Err(panic))) => {
                tracing::warn!(panic = %panic_message(panic.as_ref()), "queued task panicked");
                Poll::Ready(Err(SessionError::TaskPanicked))
            }
            Poll::Ready(Err(_)) => Poll::Ready(Err(SessionError::QueueClosed)),
        }
    }
}
