//! Subtree walk streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;

use super::Client;

/// Termination and loop-protection bookkeeping shared by the walk streams.
struct WalkGuard {
    base: Oid,
    cursor: Oid,
    last_returned: Option<Oid>,
}

enum Vet {
    /// Emit this binding and keep walking.
    Emit(VarBind),
    /// Subtree exhausted; end the stream.
    Done,
    /// Agent returned a non-increasing OID.
    Broken(Error),
}

impl WalkGuard {
    fn new(base: Oid) -> Self {
        Self {
            cursor: base.clone(),
            base,
            last_returned: None,
        }
    }

    fn vet(&mut self, vb: VarBind) -> Vet {
        if matches!(vb.value, Value::EndOfMibView) || !vb.oid.starts_with(&self.base) {
            return Vet::Done;
        }

        // A non-increasing OID would walk forever on a non-conformant agent.
        if let Some(last) = self.last_returned.take()
            && vb.oid <= last
        {
            return Vet::Broken(Error::NonIncreasingOid {
                previous: last,
                current: vb.oid,
            });
        }

        self.cursor = vb.oid.clone();
        self.last_returned = Some(vb.oid.clone());
        Vet::Emit(vb)
    }
}

/// Async stream of bindings under one subtree, one GETNEXT per item.
///
/// Created by [`Client::walk()`].
pub struct Walk<T: Transport> {
    client: Client<T>,
    guard: WalkGuard,
    done: bool,
    pending: Option<Pin<Box<dyn Future<Output = Result<VarBind>> + Send>>>,
}

impl<T: Transport> Walk<T> {
    pub(crate) fn new(client: Client<T>, base: Oid) -> Self {
        Self {
            client,
            guard: WalkGuard::new(base),
            done: false,
            pending: None,
        }
    }
}

// Nothing is pinned structurally; the in-flight future is boxed separately.
impl<T: Transport> Unpin for Walk<T> {}

impl<T: Transport + 'static> Stream for Walk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        if self.pending.is_none() {
            let client = self.client.clone();
            let oid = self.guard.cursor.clone();
            self.pending = Some(Box::pin(async move { client.get_next(&oid).await }));
        }

        let pending = self.pending.as_mut().expect("pending was just set");
        match pending.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                self.pending = None;
                match result {
                    Ok(vb) => match self.guard.vet(vb) {
                        Vet::Emit(vb) => Poll::Ready(Some(Ok(vb))),
                        Vet::Done => {
                            self.done = true;
                            Poll::Ready(None)
                        }
                        Vet::Broken(e) => {
                            self.done = true;
                            Poll::Ready(Some(Err(e)))
                        }
                    },
                    Err(e) => {
                        self.done = true;
                        Poll::Ready(Some(Err(e)))
                    }
                }
            }
        }
    }
}

/// Async stream of bindings under one subtree, fetched in GETBULK batches.
///
/// Created by [`Client::bulk_walk()`].
pub struct BulkWalk<T: Transport> {
    client: Client<T>,
    guard: WalkGuard,
    max_repetitions: u32,
    done: bool,
    buffer: std::vec::IntoIter<VarBind>,
    pending: Option<Pin<Box<dyn Future<Output = Result<Vec<VarBind>>> + Send>>>,
}

impl<T: Transport> BulkWalk<T> {
    pub(crate) fn new(client: Client<T>, base: Oid, max_repetitions: u32) -> Self {
        Self {
            client,
            guard: WalkGuard::new(base),
            max_repetitions,
            done: false,
            buffer: Vec::new().into_iter(),
            pending: None,
        }
    }
}

// Nothing is pinned structurally; the in-flight future is boxed separately.
impl<T: Transport> Unpin for BulkWalk<T> {}

impl<T: Transport + 'static> Stream for BulkWalk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            if let Some(vb) = self.buffer.next() {
                match self.guard.vet(vb) {
                    Vet::Emit(vb) => return Poll::Ready(Some(Ok(vb))),
                    Vet::Done => {
                        self.done = true;
                        return Poll::Ready(None);
                    }
                    Vet::Broken(e) => {
                        self.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }

            if self.pending.is_none() {
                let client = self.client.clone();
                let oid = self.guard.cursor.clone();
                let max_rep = self.max_repetitions;
                self.pending =
                    Some(Box::pin(
                        async move { client.get_bulk(&[oid], 0, max_rep).await },
                    ));
            }

            let pending = self.pending.as_mut().expect("pending was just set");
            match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => {
                    self.pending = None;
                    match result {
                        Ok(varbinds) => {
                            if varbinds.is_empty() {
                                self.done = true;
                                return Poll::Ready(None);
                            }
                            self.buffer = varbinds.into_iter();
                        }
                        Err(e) => {
                            self.done = true;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
            }
        }
    }
}
