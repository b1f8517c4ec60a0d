use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
};

use log::error;
use tokio::sync::oneshot;

type QueuedOp = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<(QueuedOp, oneshot::Sender<()>)>,
    draining: bool,
}

/// Resolves once the enqueued operation has run to completion.
pub struct QueueTicket(oneshot::Receiver<()>);

impl QueueTicket {
    pub async fn finished(self) {
        // A dropped sender means the operation panicked; it is over either way.
        let _ = self.0.await;
    }
}

/// FIFO serializer for page transitions: at most one operation runs at a
/// time, each is awaited fully, and they start in submission order.
#[derive(Clone, Default)]
pub struct TransitionQueue {
    state: Arc<Mutex<QueueState>>,
}

impl TransitionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
        match state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn enqueue<F>(&self, operation: F) -> QueueTicket
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let start_drain = {
            let mut state = Self::lock(&self.state);
            state.pending.push_back((Box::pin(operation), done_tx));
            !std::mem::replace(&mut state.draining, true)
        };

        if start_drain {
            tokio::spawn(Self::drain(self.state.clone()));
        }

        QueueTicket(done_rx)
    }

    async fn drain(state: Arc<Mutex<QueueState>>) {
        loop {
            let next = {
                let mut guard = Self::lock(&state);
                match guard.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        guard.draining = false;
                        return;
                    }
                }
            };

            let (operation, done) = next;
            // Run each operation in its own task so a panic cannot wedge the queue.
            if let Err(err) = tokio::spawn(operation).await {
                error!("Queued transition failed: {err}");
            }
            let _ = done.send(());
        }
    }

    pub fn is_idle(&self) -> bool {
        let state = Self::lock(&self.state);
        !state.draining && state.pending.is_empty()
    }
}
