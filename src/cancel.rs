//! Cooperative cancellation for in-flight loads.
//!
//! A [`CancelToken`] is a shared flag. Raising it wakes whichever future is
//! currently parked on [`CancelToken::cancelled`], which is how a pending
//! network request gets dropped (and thereby aborted). Conversion and mesh
//! building cannot be interrupted; they only check the flag before and after
//! running.

use std::{
    future::Future,
    pin::{Pin, pin},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use futures::{
    future::{Either, select},
    task::AtomicWaker,
};

use crate::error::{LoadError, LoadResult};

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

/// Cancellation flag shared between a viewer and the request it started.
///
/// Only one task may wait on [`cancelled`](Self::cancelled) at a time; the
/// pipeline only ever parks its fetch stage there.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.waker.wake();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(LoadError::Cancelled)` once the flag is raised.
    pub fn check(&self) -> LoadResult<()> {
        if self.is_cancelled() {
            Err(LoadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves as soon as the flag is raised.
    pub fn cancelled(&self) -> Cancelled<'_> {
        Cancelled { token: self }
    }

    /// Drive `fut` until it completes or the token is cancelled, whichever
    /// happens first. Cancellation wins if both are ready; `fut` is then dropped.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> LoadResult<F::Output> {
        self.check()?;
        let fut = pin!(fut);
        match select(self.cancelled(), fut).await {
            Either::Left(((), _)) => Err(LoadError::Cancelled),
            Either::Right((output, _)) => Ok(output),
        }
    }
}

/// Future returned by [`CancelToken::cancelled`].
#[derive(Debug)]
pub struct Cancelled<'a> {
    token: &'a CancelToken,
}

impl Future for Cancelled<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.token.is_cancelled() {
            return Poll::Ready(());
        }
        self.token.inner.waker.register(cx.waker());
        // the flag may have been raised between the check and the registration
        if self.token.is_cancelled() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
