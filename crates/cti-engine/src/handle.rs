//! Single-owner access to the domain store
//!
//! A worker task owns the [`DomainStore`]; everybody else sends it closures
//! and awaits the result. Jobs run one at a time in submission order, so the
//! store never needs a lock.

use cti_core::{AppError, AppResult};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::store::DomainStore;

type Job = Box<dyn FnOnce(&mut DomainStore) + Send>;

#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl StoreHandle {
    /// Move the store into its worker task
    pub fn spawn(store: DomainStore) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            let mut store = store;
            while let Some(job) = rx.recv().await {
                job(&mut store);
            }
            debug!("Store worker stopped");
        });

        Self { tx }
    }

    /// Run `f` against the store and return its result
    pub async fn update<F, R>(&self, f: F) -> AppResult<R>
    where
        F: FnOnce(&mut DomainStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job = Box::new(move |store| {
            let _ = reply.send(f(store));
        });

        self.tx
            .send(job)
            .map_err(|_| AppError::Internal("store worker is gone".to_string()))?;

        rx.await
            .map_err(|_| AppError::Internal("store job dropped".to_string()))
    }

    /// Read-only variant of [`StoreHandle::update`]
    pub async fn read<F, R>(&self, f: F) -> AppResult<R>
    where
        F: FnOnce(&DomainStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.update(move |store| f(store)).await
    }
}
