//! Transactions and their serial task timeline.
//!
//! Every operation that reads or writes the store is submitted as a task.
//! Tasks of one transaction run one at a time, in submission order, when the
//! queue is drained by [`Transaction::run_pending`], [`Transaction::commit`],
//! or by awaiting a [`Reply`].

mod queue;
mod reply;

pub use reply::Reply;

pub(crate) use queue::{DebugLog, Task, TaskContext};
pub(crate) use reply::reply_channel;

use crate::{
    config::Config,
    db::{
        cursor::{CursorCore, CursorId, CursorRegistry},
        object_store::ObjectStore,
        schema::SchemaRegistry,
        store::MemoryStore,
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    obs::sink::{self, MetricsEvent},
};
use queue::TaskQueue;
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};
use thiserror::Error as ThisError;

///
/// TransactionMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

///
/// TransactionStatus
///
/// `Finishing` is entered by `commit`: queued tasks still run, new ones are
/// refused.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionStatus {
    Active,
    Finishing,
    Committed,
    Aborted,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Finishing => "finishing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        write!(f, "{label}")
    }
}

///
/// TransactionError
///

#[derive(Debug, ThisError)]
pub enum TransactionError {
    #[error("transaction {id} is {status}")]
    NotActive { id: u64, status: TransactionStatus },

    #[error("transaction {id} already has {max} pending tasks")]
    QueueFull { id: u64, max: usize },

    #[error("transaction {id} is read-only")]
    ReadOnly { id: u64 },
}

impl From<TransactionError> for InternalError {
    fn from(err: TransactionError) -> Self {
        let class = match err {
            TransactionError::NotActive { .. } | TransactionError::QueueFull { .. } => {
                ErrorClass::NotAllowed
            }
            TransactionError::ReadOnly { .. } => ErrorClass::ReadOnly,
        };

        Self::new(class, ErrorOrigin::Transaction, err.to_string())
    }
}

///
/// TransactionInner
///
/// Shared state behind a [`Transaction`]. Cursors and replies hold it only
/// weakly; the cursor registry lives here, so cursor state never outlives
/// the transaction.
///

pub(crate) struct TransactionInner {
    id: u64,
    mode: TransactionMode,
    debug: Cell<bool>,
    config: Rc<Config>,
    schema: Rc<SchemaRegistry>,
    store: Rc<RefCell<MemoryStore>>,
    rollback: RefCell<Option<MemoryStore>>,
    status: Cell<TransactionStatus>,
    running: Cell<bool>,
    queue: RefCell<TaskQueue>,
    cursors: RefCell<CursorRegistry>,
}

///
/// Transaction
///

#[derive(Clone)]
pub struct Transaction {
    inner: Rc<TransactionInner>,
}

impl Transaction {
    pub(crate) fn new(
        id: u64,
        mode: TransactionMode,
        config: Rc<Config>,
        schema: Rc<SchemaRegistry>,
        store: Rc<RefCell<MemoryStore>>,
    ) -> Self {
        let rollback = match mode {
            TransactionMode::ReadOnly => None,
            TransactionMode::ReadWrite => Some(store.borrow().clone()),
        };

        Self {
            inner: Rc::new(TransactionInner {
                id,
                mode,
                debug: Cell::new(config.debug),
                config,
                schema,
                store,
                rollback: RefCell::new(rollback),
                status: Cell::new(TransactionStatus::Active),
                running: Cell::new(false),
                queue: RefCell::new(TaskQueue::default()),
                cursors: RefCell::new(CursorRegistry::default()),
            }),
        }
    }

    pub(crate) const fn from_inner(inner: Rc<TransactionInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<TransactionInner> {
        Rc::downgrade(&self.inner)
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.inner.mode
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.inner.status.get()
    }

    /// Enable or disable `[debug]` tracing for this transaction.
    #[must_use]
    pub fn debug(self, enabled: bool) -> Self {
        self.inner.debug.set(enabled);
        self
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Handle to a registered object store.
    pub fn object_store(&self, name: &str) -> Result<ObjectStore, InternalError> {
        self.ensure_active()?;
        let id = self.inner.schema.store_id(name)?;

        Ok(ObjectStore::new(self.clone(), id))
    }

    // ─────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────

    /// Enqueue a task. Returns `false`, and enqueues nothing, when the
    /// transaction is no longer active or its queue is full.
    pub(crate) fn schedule_task(&self, label: &'static str, task: Task) -> bool {
        if let Err(err) = self.admit() {
            sink::record(MetricsEvent::TaskRejected);
            self.log().log(format!("rejected task '{label}': {err}"));
            return false;
        }

        self.inner.queue.borrow_mut().push(label, task);
        sink::record(MetricsEvent::TaskScheduled);
        self.log().log(format!("scheduled task '{label}'"));

        true
    }

    /// Enqueue a task, reporting a refusal as `NotAllowed`.
    pub(crate) fn schedule(&self, label: &'static str, task: Task) -> Result<(), InternalError> {
        if self.schedule_task(label, task) {
            Ok(())
        } else {
            Err(self.admit().err().map_or_else(
                || InternalError::transaction_not_allowed("task was not scheduled"),
                InternalError::from,
            ))
        }
    }

    fn admit(&self) -> Result<(), TransactionError> {
        self.ensure_active()?;

        let max = self.inner.config.max_pending_tasks;
        if self.pending_tasks() >= max {
            return Err(TransactionError::QueueFull {
                id: self.inner.id,
                max,
            });
        }

        Ok(())
    }

    fn ensure_active(&self) -> Result<(), TransactionError> {
        match self.status() {
            TransactionStatus::Active => Ok(()),
            status => Err(TransactionError::NotActive {
                id: self.inner.id,
                status,
            }),
        }
    }

    pub(crate) fn ensure_writable(&self) -> Result<(), InternalError> {
        match self.inner.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => {
                Err(TransactionError::ReadOnly { id: self.inner.id }.into())
            }
        }
    }

    // ─────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────

    /// Run queued tasks in submission order until the queue is empty.
    ///
    /// A failing task aborts the transaction; its error is returned and the
    /// remaining tasks are discarded. Returns the number of tasks run.
    pub fn run_pending(&self) -> Result<usize, InternalError> {
        if self.inner.running.replace(true) {
            return Ok(0);
        }
        let result = self.run_queue();
        self.inner.running.set(false);

        result
    }

    fn run_queue(&self) -> Result<usize, InternalError> {
        let mut ran = 0;

        loop {
            let Some(queued) = self.inner.queue.borrow_mut().pop() else {
                return Ok(ran);
            };
            let log = self.log();
            log.log(format!("running task '{}'", queued.label));

            let result = {
                let mut store = self.inner.store.borrow_mut();
                let mut cursors = self.inner.cursors.borrow_mut();
                let mut cx = TaskContext {
                    store: &mut store,
                    cursors: &mut cursors,
                    schema: &self.inner.schema,
                    log,
                };

                (queued.task)(&mut cx)
            };
            ran += 1;

            if let Err(err) = result {
                sink::record(MetricsEvent::TaskFailed);
                log.log(format!("task '{}' failed: {err}", queued.label));
                self.abort_now();

                return Err(err);
            }
        }
    }

    /// Drain the queue on behalf of a waiting reply. Failures have already
    /// been delivered to the failing task's reply.
    pub(crate) fn drive(&self) {
        if let Err(err) = self.run_pending() {
            self.log().log(format!("queue stopped: {err}"));
        }
    }

    // ─────────────────────────────────────────────
    // Completion
    // ─────────────────────────────────────────────

    /// Stop accepting tasks, run everything already queued, and commit.
    pub fn commit(&self) -> Result<(), InternalError> {
        self.ensure_active()?;
        self.inner.status.set(TransactionStatus::Finishing);

        self.run_pending()?;

        self.inner.status.set(TransactionStatus::Committed);
        self.inner.rollback.borrow_mut().take();
        self.release_cursors();
        self.log().log("committed");

        Ok(())
    }

    /// Discard queued tasks and roll back every write made so far.
    pub fn abort(&self) -> Result<(), InternalError> {
        match self.status() {
            TransactionStatus::Active | TransactionStatus::Finishing => {
                self.abort_now();
                Ok(())
            }
            status => Err(TransactionError::NotActive {
                id: self.inner.id,
                status,
            }
            .into()),
        }
    }

    fn abort_now(&self) {
        self.inner.status.set(TransactionStatus::Aborted);

        let discarded = self.inner.queue.borrow_mut().take_all();
        let count = discarded.len();
        drop(discarded);

        self.release_cursors();
        if let Some(snapshot) = self.inner.rollback.borrow_mut().take() {
            *self.inner.store.borrow_mut() = snapshot;
        }

        self.log()
            .log(format!("aborted, {count} queued task(s) discarded"));
    }

    fn release_cursors(&self) {
        self.inner.cursors.borrow_mut().release_all();
    }

    // ─────────────────────────────────────────────
    // Crate accessors
    // ─────────────────────────────────────────────

    pub(crate) fn log(&self) -> DebugLog {
        DebugLog::new(self.inner.debug.get(), self.inner.id)
    }

    pub(crate) fn schema(&self) -> &SchemaRegistry {
        &self.inner.schema
    }

    pub(crate) fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Read a registered cursor outside of any task.
    pub(crate) fn with_cursor<R>(&self, id: CursorId, f: impl FnOnce(&CursorCore) -> R) -> Option<R> {
        self.inner.cursors.borrow().get(id).map(f)
    }

    #[cfg(test)]
    pub(crate) fn with_cursor_mut<R>(
        &self,
        id: CursorId,
        f: impl FnOnce(&mut CursorCore) -> R,
    ) -> Option<R> {
        self.inner.cursors.borrow_mut().get_mut(id).map(f)
    }

    #[cfg(test)]
    pub(crate) fn live_cursors(&self) -> usize {
        self.inner.cursors.borrow().iter().flatten().count()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
