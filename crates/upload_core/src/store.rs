use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{Transition, UploadId, UploadRecord},
    error::UploadError,
    protocol::UploadSummary,
};
use tokio::sync::{watch, RwLock};

pub type RecordView = Arc<Vec<UploadRecord>>;

/// Owned collection of upload records, kept in submission order.
///
/// Clones share the same records. Every append and every effective update
/// refreshes the view handed out by [`UploadStore::subscribe`].
#[derive(Clone)]
pub struct UploadStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: RwLock<StoreState>,
    view: watch::Sender<RecordView>,
}

#[derive(Default)]
struct StoreState {
    records: Vec<UploadRecord>,
    index: HashMap<UploadId, usize>,
}

impl StoreState {
    /// Writes one changed record into the published view. The view's `Vec` is
    /// only copied when a subscriber still holds the previous `Arc`.
    fn publish_one(&self, position: usize, view: &watch::Sender<RecordView>) {
        let record = self.records[position].clone();
        view.send_modify(|records| {
            if let Some(slot) = Arc::make_mut(records).get_mut(position) {
                *slot = record;
            }
        });
    }

    fn publish_appended(&self, from: usize, view: &watch::Sender<RecordView>) {
        let appended = &self.records[from..];
        view.send_modify(|records| Arc::make_mut(records).extend_from_slice(appended));
    }
}

impl Default for UploadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadStore {
    pub fn new() -> Self {
        let (view, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::default()),
                view,
            }),
        }
    }

    pub async fn append(&self, records: impl IntoIterator<Item = UploadRecord>) {
        let mut state = self.inner.state.write().await;
        let from = state.records.len();
        for record in records {
            let position = state.records.len();
            state.index.insert(record.id, position);
            state.records.push(record);
        }
        state.publish_appended(from, &self.inner.view);
    }

    /// Applies `apply` to the single record keyed by `id`.
    ///
    /// Terminal records are never handed to `apply`.
    pub async fn update<F>(
        &self,
        id: UploadId,
        apply: F,
    ) -> Result<(UploadRecord, Transition), UploadError>
    where
        F: FnOnce(&mut UploadRecord) -> Result<Transition, UploadError>,
    {
        let mut state = self.inner.state.write().await;
        let position = *state.index.get(&id).ok_or(UploadError::NotFound(id))?;
        let record = &mut state.records[position];
        if record.is_terminal() {
            return Err(UploadError::AlreadyTerminal {
                id,
                status: record.status,
            });
        }

        let transition = apply(record)?;
        let snapshot = record.clone();
        if transition != Transition::Unchanged {
            state.publish_one(position, &self.inner.view);
        }
        Ok((snapshot, transition))
    }

    pub async fn get(&self, id: UploadId) -> Option<UploadRecord> {
        let state = self.inner.state.read().await;
        state
            .index
            .get(&id)
            .map(|position| state.records[*position].clone())
    }

    pub async fn snapshot(&self) -> Vec<UploadRecord> {
        self.inner.state.read().await.records.clone()
    }

    pub async fn summary(&self) -> UploadSummary {
        UploadSummary::from_records(&self.inner.state.read().await.records)
    }

    pub async fn len(&self) -> usize {
        self.inner.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<RecordView> {
        self.inner.view.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
