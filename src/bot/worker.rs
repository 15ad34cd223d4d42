use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, warn};

use super::dispatcher::Dispatcher;
use super::telegram::Update;

/// Single consumer queue in front of the dispatcher. Updates are handled one
/// at a time, in arrival order.
#[derive(Clone)]
pub struct UpdateWorker {
    tx: mpsc::Sender<Update>,
}

impl UpdateWorker {
    pub fn new(dispatcher: Arc<Dispatcher>, queue_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_size);
        tokio::spawn(worker_loop(dispatcher, rx));
        Self { tx }
    }

    /// A worker whose queue is drained by the caller instead of a dispatcher.
    #[cfg(test)]
    pub fn channel(queue_size: usize) -> (Self, mpsc::Receiver<Update>) {
        let (tx, rx) = mpsc::channel(queue_size);
        (Self { tx }, rx)
    }

    pub async fn enqueue(&self, update: Update) -> Result<(), mpsc::error::SendError<Update>> {
        self.tx.send(update).await
    }
}

async fn worker_loop(dispatcher: Arc<Dispatcher>, mut rx: mpsc::Receiver<Update>) {
    while let Some(update) = rx.recv().await {
        let update_id = update.update_id;
        let dispatcher = dispatcher.clone();

        let handled = tokio::spawn(async move { dispatcher.handle_update(update).await }).await;

        match handled {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(update_id, error = %err, "update handling failed"),
            Err(err) => error!(update_id, error = %err, "update handler panicked"),
        }
    }
}
