use crate::{
    db::{cursor::CursorRegistry, schema::SchemaRegistry, store::MemoryStore},
    error::InternalError,
};
use derive_more::Deref;
use std::collections::VecDeque;

/// A unit of work on a transaction's serial timeline.
pub(crate) type Task = Box<dyn FnOnce(&mut TaskContext<'_>) -> Result<(), InternalError>>;

///
/// TaskContext
///
/// Everything a running task may touch. Built fresh for each task, so no
/// two tasks of one transaction ever hold it at the same time.
///

pub(crate) struct TaskContext<'a> {
    pub store: &'a mut MemoryStore,
    pub cursors: &'a mut CursorRegistry,
    pub schema: &'a SchemaRegistry,
    pub log: DebugLog,
}

///
/// DebugLog
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct DebugLog {
    enabled: bool,
    txn: u64,
}

impl DebugLog {
    pub(crate) const fn new(enabled: bool, txn: u64) -> Self {
        Self { enabled, txn }
    }

    pub(crate) const fn enabled(self) -> bool {
        self.enabled
    }

    pub(crate) fn log(self, s: impl AsRef<str>) {
        if self.enabled {
            println!("[debug] txn {}: {}", self.txn, s.as_ref());
        }
    }
}

///
/// QueuedTask
///

pub(crate) struct QueuedTask {
    pub label: &'static str,
    pub task: Task,
}

///
/// TaskQueue
/// FIFO of tasks waiting to run, in submission order.
///

#[derive(Default, Deref)]
pub(crate) struct TaskQueue(VecDeque<QueuedTask>);

impl TaskQueue {
    pub(crate) fn push(&mut self, label: &'static str, task: Task) {
        self.0.push_back(QueuedTask { label, task });
    }

    pub(crate) fn pop(&mut self) -> Option<QueuedTask> {
        self.0.pop_front()
    }

    /// Remove every waiting task. Dropping a task drops its responder, which
    /// resolves the matching reply as aborted.
    pub(crate) fn take_all(&mut self) -> Vec<QueuedTask> {
        self.0.drain(..).collect()
    }
}
