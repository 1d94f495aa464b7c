//! Fixed-size worker pool over a shared FIFO queue.
//!
//! The caller's thread enqueues every task followed by one close signal per
//! worker. Joining the scoped workers is the completion barrier: once it
//! returns, every enqueued task has produced exactly one outcome.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, trace, warn};

/// What a worker pulls from the queue.
enum Task<T> {
    Process(T),
    Close,
}

/// Result of running the unit of work on one item.
#[derive(Debug)]
pub enum Outcome<R> {
    /// Work was done and produced a result.
    Analyzed(R),
    /// Nothing to do: the item had not changed since the last run.
    Unchanged,
    /// The item could not be processed. Already logged by the unit.
    Failed,
}

/// Everything collected after the barrier.
#[derive(Debug)]
pub struct DispatchReport<R> {
    pub results: Vec<R>,
    pub analyzed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl<R> Default for DispatchReport<R> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            analyzed: 0,
            unchanged: 0,
            failed: 0,
        }
    }
}

impl<R> DispatchReport<R> {
    /// Outcomes received; equals the number of dispatched items.
    pub fn total(&self) -> usize {
        self.analyzed + self.unchanged + self.failed
    }
}

/// Bounded worker pool.
#[derive(Debug, Clone, Copy)]
pub struct TaskDispatcher {
    workers: usize,
}

impl TaskDispatcher {
    /// Pool with `workers` threads; zero means one per available core.
    pub fn new(workers: usize) -> Self {
        if workers == 0 {
            return Self::with_available_parallelism();
        }
        Self { workers }
    }

    /// Pool sized to the machine, never less than one.
    pub fn with_available_parallelism() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `unit` over every item and collect the outcomes.
    ///
    /// Items are processed in no particular order. A panic inside `unit` is
    /// caught and counted as a failure; it never takes down other work.
    /// `progress` is called once per collected outcome with a non-decreasing
    /// percentage, on the calling thread, after all workers have finished.
    pub fn run<T, R, F>(
        &self,
        items: Vec<T>,
        unit: F,
        mut progress: Option<&mut dyn FnMut(u8)>,
    ) -> DispatchReport<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Outcome<R> + Sync,
    {
        let total = items.len();
        let (task_tx, task_rx) = unbounded::<Task<T>>();
        let (out_tx, out_rx) = unbounded::<Outcome<R>>();

        debug!(tasks = total, workers = self.workers, "dispatching");

        thread::scope(|scope| {
            for id in 0..self.workers {
                let tasks = task_rx.clone();
                let outcomes = out_tx.clone();
                let unit = &unit;
                scope.spawn(move || worker_loop(id, tasks, outcomes, unit));
            }

            // The scope holds `task_rx`, so sends cannot fail here.
            for item in items {
                let _ = task_tx.send(Task::Process(item));
            }
            for _ in 0..self.workers {
                let _ = task_tx.send(Task::Close);
            }
        });
        drop(out_tx);

        let mut report = DispatchReport::default();
        for (done, outcome) in out_rx.iter().enumerate() {
            match outcome {
                Outcome::Analyzed(result) => {
                    report.analyzed += 1;
                    report.results.push(result);
                }
                Outcome::Unchanged => report.unchanged += 1,
                Outcome::Failed => report.failed += 1,
            }
            if let Some(cb) = progress.as_mut() {
                cb((((done + 1) * 100) / total) as u8);
            }
        }

        report
    }
}

impl Default for TaskDispatcher {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}

fn worker_loop<T, R, F>(
    id: usize,
    tasks: Receiver<Task<T>>,
    outcomes: Sender<Outcome<R>>,
    unit: &F,
) where
    F: Fn(T) -> Outcome<R>,
{
    while let Ok(task) = tasks.recv() {
        let item = match task {
            Task::Process(item) => item,
            Task::Close => break,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| unit(item))).unwrap_or_else(|_| {
            warn!(worker = id, "unit of work panicked");
            Outcome::Failed
        });
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    trace!(worker = id, "worker closed");
}
