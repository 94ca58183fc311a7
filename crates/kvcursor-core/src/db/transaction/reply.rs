//! Single-shot result delivery.
//!
//! Every scheduled operation hands its caller a [`Reply`]. The task that
//! performs the operation owns the matching [`Responder`] and consumes it to
//! send exactly one result.

use crate::{
    db::transaction::{Transaction, TransactionInner},
    error::InternalError,
};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    rc::Weak,
    task::{Context, Poll},
};
use tokio::sync::oneshot::{self, error::TryRecvError};

pub(crate) fn reply_channel<T>(driver: Weak<TransactionInner>) -> (Responder<T>, Reply<T>) {
    let (tx, rx) = oneshot::channel();

    (Responder { tx }, Reply { rx, driver })
}

fn never_ran() -> InternalError {
    InternalError::transaction_aborted("request was discarded before it ran")
}

///
/// Reply
///
/// Pending result of a scheduled operation.
///
/// Awaiting a reply (or calling [`Reply::resolve`]) first drains the owning
/// transaction's queue, so no separate executor is needed to make progress.
/// A reply whose task is discarded by an abort resolves to an `Aborted`
/// error.
///

#[must_use = "a reply carries the only result of its operation"]
pub struct Reply<T> {
    rx: oneshot::Receiver<Result<T, InternalError>>,
    driver: Weak<TransactionInner>,
}

impl<T> Reply<T> {
    /// Take the result if it has been delivered.
    ///
    /// Returns `None` while the task is still queued. Once a result has been
    /// taken, further calls report the request as aborted.
    pub fn try_take(&mut self) -> Option<Result<T, InternalError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(never_ran())),
        }
    }

    /// Run the owning transaction's queue and return the result.
    pub fn resolve(mut self) -> Result<T, InternalError> {
        if let Some(result) = self.try_take() {
            return result;
        }
        self.drive();

        self.try_take().unwrap_or_else(|| Err(never_ran()))
    }

    fn drive(&self) {
        if let Some(inner) = self.driver.upgrade() {
            Transaction::from_inner(inner).drive();
        }
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("driver_alive", &(self.driver.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T, InternalError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(result) = this.try_take() {
            return Poll::Ready(result);
        }

        this.drive();

        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(never_ran())))
    }
}

///
/// Responder
///

pub(crate) struct Responder<T> {
    tx: oneshot::Sender<Result<T, InternalError>>,
}

impl<T> Responder<T> {
    /// Send a result. A dropped reply just means nobody is listening.
    pub(crate) fn send(self, result: Result<T, InternalError>) {
        let _ = self.tx.send(result);
    }

    /// Send a result and hand any error back to the running task, so the
    /// failure also stops the transaction.
    pub(crate) fn deliver(self, result: Result<T, InternalError>) -> Result<(), InternalError> {
        match result {
            Ok(value) => {
                self.send(Ok(value));
                Ok(())
            }
            Err(err) => {
                self.send(Err(err.clone()));
                Err(err)
            }
        }
    }
}
